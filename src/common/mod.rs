//! Common types shared across components

pub mod cli;
pub mod error;

pub use cli::{CommonArgs, ListingArgs};
pub use error::{PulseDataError, PulseDataResult, ScanError};
