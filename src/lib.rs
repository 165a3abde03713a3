//! Scanner Calibration - keyboard-layout calibration for barcode scanners
//!
//! Barcode scanners emulate a keyboard. When the scanner and the host disagree
//! on the keyboard layout, characters and control codes arrive substituted.
//! This crate learns the substitution from a few probe barcodes and uses it to
//! decode live scans into pack identifiers.

pub mod calibration;
pub mod config;
pub mod error;
pub mod keyboard;
pub mod parser;
pub mod report;

pub use calibration::{CalibrationData, CalibrationToken, Calibrator, ProbeSize};
pub use config::Config;
pub use error::{CalibrationError, ParseError};
pub use parser::{PackIdentifier, Parser, RecognisedDataElement};
