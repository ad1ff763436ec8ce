//! Common types for decoder module

use std::fmt;

/// One 32-bit readout word as printed in the log dump
pub type Word = u32;

/// Word classification
///
/// Each variant except `Unrecognized` is identified by a (mask, value) pair
/// on the word's high bits; see `f250::TAG_RULES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    BlockHeader,
    BlockTrailer,
    EventHeader,
    EventTrailer,
    /// Two-word 48-bit trigger time record
    TriggerTime,
    WindowRawData,
    PulseRawData,
    PulseIntegral,
    PulseTime,
    PulsePeak,
    /// Pulse parameters header followed by integral/time sub-record pairs
    PulseParameters,
    Filler,
    /// Word that matched no rule
    Unrecognized,
}

impl Tag {
    /// Human-readable tag name
    pub fn name(&self) -> &'static str {
        match self {
            Tag::BlockHeader => "block header",
            Tag::BlockTrailer => "block trailer",
            Tag::EventHeader => "event header",
            Tag::EventTrailer => "event trailer",
            Tag::TriggerTime => "trigger time",
            Tag::WindowRawData => "window raw data",
            Tag::PulseRawData => "pulse raw data",
            Tag::PulseIntegral => "pulse integral",
            Tag::PulseTime => "pulse time",
            Tag::PulsePeak => "pulse peak",
            Tag::PulseParameters => "pulse parameters",
            Tag::Filler => "filler word",
            Tag::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Nesting depth of a listing line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Depth {
    /// Block header/trailer, filler and diagnostics
    Block,
    /// Event header/trailer and trigger time
    Event,
    /// Pulse and window records
    Pulse,
    /// Samples and pulse-parameter sub-records
    Sample,
}

impl Depth {
    /// Indentation level (0 = unindented)
    pub fn level(self) -> usize {
        self as usize
    }
}

/// Line severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// One rendered structure (or diagnostic) produced by the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    /// Tag of the word that produced this line (the owning tag for samples)
    pub tag: Tag,
    pub depth: Depth,
    pub severity: Severity,
    /// Message text without indentation or severity prefix
    pub text: String,
}

impl DecodedLine {
    /// Descriptive line for a recognized structure
    pub fn record(tag: Tag, depth: Depth, text: impl Into<String>) -> Self {
        Self {
            tag,
            depth,
            severity: Severity::Info,
            text: text.into(),
        }
    }

    /// Inline diagnostic; always rendered unindented
    pub fn error(tag: Tag, text: impl Into<String>) -> Self {
        Self {
            tag,
            depth: Depth::Block,
            severity: Severity::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render with `indent_width` spaces per nesting level
    pub fn render(&self, indent_width: usize) -> String {
        match self.severity {
            Severity::Error => format!("ERROR - {}", self.text),
            Severity::Info => format!(
                "{:indent$}{}",
                "",
                self.text,
                indent = self.depth.level() * indent_width
            ),
        }
    }
}

impl fmt::Display for DecodedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(2))
    }
}
