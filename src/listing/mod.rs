//! Listing output
//!
//! Couples the log scanner, the block decoder and a text writer:
//! scanner events become a banner line per report and one indented,
//! de-duplicated listing per completed block, terminated by a blank line.

pub mod dedup;

pub use dedup::{Coalesced, Deduplicator};

use std::io::{self, BufRead, Write};

use tracing::info;

use crate::common::PulseDataResult;
use crate::config::{Config, ListingConfig};
use crate::reader::decoder::{DecodedLine, F250Decoder};
use crate::reader::{LogScanner, ScanEvent};

/// Counters for one listing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingStats {
    /// Trigger phrases seen
    pub reports: u64,
    /// Blocks decoded
    pub blocks: u64,
    /// Words decoded over all blocks
    pub words: u64,
    /// Output lines written, annotations and blank separators excluded
    pub lines: u64,
    /// Inline error lines produced by the decoder
    pub errors: u64,
    /// Dumps dropped by a resend marker, a new report or end of input
    pub discarded_dumps: u64,
}

/// Text writer for banners and decoded blocks
pub struct ListingWriter<W: Write> {
    out: W,
    options: ListingConfig,
    stats: ListingStats,
}

impl<W: Write> ListingWriter<W> {
    pub fn new(out: W, options: ListingConfig) -> Self {
        Self {
            out,
            options,
            stats: ListingStats::default(),
        }
    }

    /// Echo the start of a defective-block report
    pub fn write_banner(&mut self, banner: &str) -> io::Result<()> {
        self.stats.reports += 1;
        writeln!(self.out, "{}", banner)
    }

    /// Write one decoded block followed by a blank line
    pub fn write_block(&mut self, block_words: usize, lines: &[DecodedLine]) -> io::Result<()> {
        let mut dedup = Deduplicator::new();

        for line in lines {
            if line.is_error() {
                self.stats.errors += 1;
            }
            let rendered = line.render(self.options.indent_width);

            if self.options.coalesce_repeats {
                if let Some(released) = dedup.feed(rendered) {
                    self.write_coalesced(&released)?;
                }
            } else {
                self.write_line(&rendered)?;
            }
        }

        if let Some(released) = dedup.finish() {
            self.write_coalesced(&released)?;
        }
        writeln!(self.out)?;

        self.stats.blocks += 1;
        self.stats.words += block_words as u64;
        Ok(())
    }

    pub fn note_discarded(&mut self) {
        self.stats.discarded_dumps += 1;
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> (W, ListingStats) {
        (self.out, self.stats)
    }

    fn write_coalesced(&mut self, released: &Coalesced) -> io::Result<()> {
        self.write_line(&released.line)?;
        if let Some(annotation) = released.annotation() {
            writeln!(self.out, "{}", annotation)?;
        }
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.stats.lines += 1;
        writeln!(self.out, "{}", line)
    }
}

/// Scanner, decoder and writer for one run over any number of inputs
pub struct Lister<W: Write> {
    scanner: LogScanner,
    decoder: F250Decoder,
    writer: ListingWriter<W>,
}

impl<W: Write> Lister<W> {
    pub fn new(config: &Config, out: W) -> Self {
        Self {
            scanner: LogScanner::new(config.scanner.clone()),
            decoder: F250Decoder::new(config.decoder.clone()),
            writer: ListingWriter::new(out, config.listing.clone()),
        }
    }

    /// Consume every line of `reader`.
    ///
    /// Scanner state carries over between calls, so several inputs behave
    /// like one concatenated log. Invalid UTF-8 is replaced, not rejected.
    pub fn process<R: BufRead>(&mut self, mut reader: R) -> PulseDataResult<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(());
            }
            let line = String::from_utf8_lossy(&buf);
            self.process_line(&line)?;
        }
    }

    /// Feed a single log line
    pub fn process_line(&mut self, line: &str) -> PulseDataResult<()> {
        let was_collecting = self.scanner.is_collecting();

        match self.scanner.feed_line(line)? {
            Some(ScanEvent::Trigger) => {
                if was_collecting {
                    self.writer.note_discarded();
                }
                self.writer.write_banner(&self.scanner.config().trigger_banner)?;
            }
            Some(ScanEvent::Completed(block)) => {
                let lines = self.decoder.decode(&block.words);
                self.writer.write_block(block.words.len(), &lines)?;
            }
            Some(ScanEvent::Restarted { .. }) => self.writer.note_discarded(),
            Some(ScanEvent::Header(_)) | None => {}
        }
        Ok(())
    }

    /// Flush output written so far
    pub fn flush(&mut self) -> PulseDataResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Close the run and hand back the writer and final counters
    pub fn finish(mut self) -> PulseDataResult<(W, ListingStats)> {
        if self.scanner.finish().is_some() {
            self.writer.note_discarded();
        }
        self.writer.flush()?;

        let (out, stats) = self.writer.into_inner();
        info!(
            reports = stats.reports,
            blocks = stats.blocks,
            words = stats.words,
            errors = stats.errors,
            discarded = stats.discarded_dumps,
            "Listing complete"
        );
        Ok((out, stats))
    }
}
