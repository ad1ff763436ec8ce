//! Reader module for defective-block reports in DAQ logs
//!
//! This module provides:
//! - The log scanner: finds `Bad f250 Pulse Data` reports and reassembles
//!   the printed hex dump into an ordered word sequence
//! - Block decoder (decoder)
//!
//! # Log format
//! ```text
//! ... Bad f250 Pulse Data ...
//! Dumping binary: istart=0x0 iend=0x10 MaxWords=16
//!     0  0x80c40502  0x90c05008  0x98000010* 0x00000001  ...   (up to 8 words)
//!     8  0xf8c00000  0xf8c00000  ...
//! JANA ERROR>>...
//! ```
//! A `*` after a word marks an address region and is discarded.

pub mod decoder;

pub use decoder::{DecodedLine, F250Decoder, Tag, Word};

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::common::ScanError;
use crate::config::ScannerConfig;

/// `Dumping binary:` header that must follow the trigger phrase
static DUMP_HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Dumping binary: istart=(0x[0-9a-f]+) iend=(0x[0-9a-f]+) MaxWords=([0-9]+)")
        .expect("Invalid regex pattern")
});

/// Table row: decimal index followed by 1 to 8 hex words
static TABLE_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9]+)((?:\s+0x[0-9a-fA-F]+\**){1,8})").expect("Invalid regex pattern")
});

/// One hex word inside a table row, with its optional region flag
static TABLE_WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x([0-9a-fA-F]+)\**").expect("Invalid regex pattern"));

/// Bytes per dumped word
const WORD_BYTES: u64 = 4;

/// Upper bound on the preallocation taken from `MaxWords`
const MAX_PREALLOC_WORDS: usize = 1 << 16;

/// Dump bounds printed on the `Dumping binary:` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpHeader {
    pub istart: u64,
    pub iend: u64,
    pub max_words: u64,
}

impl DumpHeader {
    /// Number of words the table should contain.
    ///
    /// `istart` and `iend` are byte addresses of 32-bit words.
    pub fn expected_words(&self) -> u64 {
        (self.iend.saturating_sub(self.istart) / WORD_BYTES).min(self.max_words)
    }
}

/// A completely reassembled dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpedBlock {
    pub header: DumpHeader,
    pub words: Vec<Word>,
}

/// Something the caller has to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// Trigger phrase seen; a dump header must follow
    Trigger,
    /// Dump header accepted; table rows follow. A header printed again
    /// inside a dump only refreshes the bounds.
    Header(DumpHeader),
    /// Resend marker seen; the words collected so far were dropped and
    /// collection starts over under the same header
    Restarted { discarded_words: usize },
    /// Completion marker seen; the block is ready for decoding
    Completed(DumpedBlock),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanMode {
    Idle,
    AwaitingHeader,
    Collecting { header: DumpHeader, words: Vec<Word> },
}

/// Line-by-line scanner over a DAQ log
#[derive(Debug)]
pub struct LogScanner {
    config: ScannerConfig,
    mode: ScanMode,
    line_no: usize,
}

impl LogScanner {
    /// Create a new scanner with given markers
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            config,
            mode: ScanMode::Idle,
            line_no: 0,
        }
    }

    /// Create a scanner with the default markers
    pub fn with_defaults() -> Self {
        Self::new(ScannerConfig::default())
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// True when not inside a report
    pub fn is_idle(&self) -> bool {
        self.mode == ScanMode::Idle
    }

    /// True while table rows are being collected
    pub fn is_collecting(&self) -> bool {
        matches!(self.mode, ScanMode::Collecting { .. })
    }

    /// Feed one log line.
    ///
    /// Returns `Err` only when the line after the trigger phrase is not a
    /// dump header; the run cannot continue after that.
    pub fn feed_line(&mut self, line: &str) -> Result<Option<ScanEvent>, ScanError> {
        self.line_no += 1;
        let line = line.trim_end();

        if line.contains(&self.config.trigger_phrase) {
            if let ScanMode::Collecting { words, .. } = &self.mode {
                warn!(
                    line_no = self.line_no,
                    words = words.len(),
                    "New report started before dump completed, discarding"
                );
            }
            self.mode = ScanMode::AwaitingHeader;
            return Ok(Some(ScanEvent::Trigger));
        }

        match std::mem::replace(&mut self.mode, ScanMode::Idle) {
            ScanMode::Idle => Ok(None),

            ScanMode::AwaitingHeader => {
                let caps = DUMP_HEADER_REGEX.captures(line).ok_or_else(|| {
                    ScanError::MissingDumpHeader {
                        line_no: self.line_no,
                        line: line.to_string(),
                    }
                })?;

                // An undecodable header is skipped; the next line must be a header again
                let Some(header) = self.decode_header(&caps) else {
                    self.mode = ScanMode::AwaitingHeader;
                    return Ok(None);
                };

                debug!(
                    line_no = self.line_no,
                    istart = header.istart,
                    iend = header.iend,
                    max_words = header.max_words,
                    "Dump header"
                );
                let capacity = usize::try_from(header.max_words)
                    .unwrap_or(MAX_PREALLOC_WORDS)
                    .min(MAX_PREALLOC_WORDS);
                self.mode = ScanMode::Collecting {
                    header,
                    words: Vec::with_capacity(capacity),
                };
                Ok(Some(ScanEvent::Header(header)))
            }

            ScanMode::Collecting { header, mut words } => {
                if let Some(caps) = TABLE_LINE_REGEX.captures(line) {
                    self.push_table_words(&caps[2], &mut words);
                    self.mode = ScanMode::Collecting { header, words };
                    Ok(None)
                } else if line.contains(&self.config.resend_marker) {
                    debug!(
                        line_no = self.line_no,
                        words = words.len(),
                        "Dump is being resent, restarting"
                    );
                    let discarded_words = words.len();
                    words.clear();
                    self.mode = ScanMode::Collecting { header, words };
                    Ok(Some(ScanEvent::Restarted { discarded_words }))
                } else if let Some(caps) = DUMP_HEADER_REGEX.captures(line) {
                    let header = self.decode_header(&caps).unwrap_or(header);
                    self.mode = ScanMode::Collecting { header, words };
                    Ok(Some(ScanEvent::Header(header)))
                } else if line.contains(&self.config.completion_marker) {
                    if words.len() as u64 != header.expected_words() {
                        warn!(
                            line_no = self.line_no,
                            words = words.len(),
                            expected = header.expected_words(),
                            "Dump word count differs from header"
                        );
                    }
                    Ok(Some(ScanEvent::Completed(DumpedBlock { header, words })))
                } else {
                    self.mode = ScanMode::Collecting { header, words };
                    Ok(None)
                }
            }
        }
    }

    /// Signal end of input.
    ///
    /// Returns the number of words dropped if a dump was still open.
    pub fn finish(&mut self) -> Option<usize> {
        match std::mem::replace(&mut self.mode, ScanMode::Idle) {
            ScanMode::Collecting { words, .. } => {
                warn!(
                    words = words.len(),
                    "Input ended inside a dump, block discarded"
                );
                Some(words.len())
            }
            ScanMode::AwaitingHeader => {
                warn!("Input ended right after the trigger phrase");
                None
            }
            ScanMode::Idle => None,
        }
    }

    fn decode_header(&self, caps: &Captures<'_>) -> Option<DumpHeader> {
        let mut values = [0u64; 3];
        for (value, index) in values.iter_mut().zip(1..=3) {
            match parse_literal(&caps[index]) {
                Some(v) => *value = v,
                None => {
                    warn!(
                        line_no = self.line_no,
                        value = &caps[index],
                        "Bad decode of dump header value, ignoring header"
                    );
                    return None;
                }
            }
        }

        let [istart, iend, max_words] = values;
        Some(DumpHeader {
            istart,
            iend,
            max_words,
        })
    }

    fn push_table_words(&self, columns: &str, words: &mut Vec<Word>) {
        for caps in TABLE_WORD_REGEX.captures_iter(columns) {
            match u32::from_str_radix(&caps[1], 16) {
                Ok(word) => words.push(word),
                Err(_) => warn!(
                    line_no = self.line_no,
                    token = &caps[0],
                    "Dump word does not fit in 32 bits, skipped"
                ),
            }
        }
    }
}

/// Parse a `0x`-prefixed hex or plain decimal integer literal
pub fn parse_literal(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
