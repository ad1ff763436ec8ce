//! Decoder module for fADC250 readout blocks
//!
//! Converts an assembled sequence of 32-bit words into listing lines.

pub mod common;
pub mod f250;

pub use common::{DecodedLine, Depth, Severity, Tag, Word};
pub use f250::{classify, decode, DecoderConfig, DecoderState, F250Decoder, TagRule, TAG_RULES};
