//! PULSEDATA-RS: structural listings of defective fADC250 readout blocks
//!
//! This crate scans a DAQ log for blocks the readout flagged as bad pulse
//! data, reassembles each printed hex dump and decodes it word by word.

pub mod common;
pub mod config;
pub mod listing;
pub mod reader;
