//! pulsedata - list the contents of defective fADC250 blocks found in a DAQ log
//!
//! Usage:
//!   pulsedata run.log                      # List every bad block in run.log
//!   pulsedata a.log b.log                  # Files are read as one stream
//!   cat run.log | pulsedata                # Read standard input
//!   pulsedata -f pulsedata.toml run.log    # Custom markers / options
//!
//! Exits with status 1 if a report is not followed by its `Dumping binary:` line.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

use anyhow::Context;
use clap::Parser;
use pulsedata_rs::common::{ListingArgs, PulseDataError};
use pulsedata_rs::config::Config;
use pulsedata_rs::listing::Lister;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the listing on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pulsedata_rs=warn".parse()?))
        .with_writer(io::stderr)
        .init();

    let args = ListingArgs::parse();

    let mut config = match &args.common.config_file {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            info!(config_file = %path.display(), "Loaded configuration");
            config
        }
        None => Config::default(),
    };
    if args.no_coalesce {
        config.listing.coalesce_repeats = false;
    }
    if args.show_invalid_samples {
        config.decoder.show_invalid_samples = true;
    }

    if args.reads_stdin() {
        info!("Reading log from standard input");
    }

    let stdout = io::stdout();
    let mut lister = Lister::new(&config, BufWriter::new(stdout.lock()));

    match run(&args, &mut lister) {
        Ok(()) => {
            lister.finish()?;
            Ok(())
        }
        Err(e) if e.is_fatal_scan() => {
            lister.flush()?;
            eprintln!("{}", e);
            eprintln!("cannot continue, aborting");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn run<W: Write>(args: &ListingArgs, lister: &mut Lister<W>) -> Result<(), PulseDataError> {
    if args.inputs.is_empty() {
        return lister.process(io::stdin().lock());
    }

    for path in &args.inputs {
        if path.as_os_str() == "-" {
            lister.process(io::stdin().lock())?;
        } else {
            info!(input = %path.display(), "Reading log");
            let file = File::open(path)?;
            lister.process(BufReader::new(file))?;
        }
    }
    Ok(())
}
