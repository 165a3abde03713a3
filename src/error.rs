//! Error types for calibration and parsing
//!
//! Neither the calibration engine nor the parser returns these through
//! `Result`: calibration errors accumulate on the token and parse errors
//! accumulate on the pack identifier.

use crate::keyboard::template::Separator;
use crate::parser::catalog::{FieldRole, Syntax};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Calibration round in which a problem was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Round {
    Baseline,
    DeadKey(char),
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Round::Baseline => write!(f, "baseline"),
            Round::DeadKey(lead) => write!(f, "dead key {:?}", lead),
        }
    }
}

/// A problem found while calibrating
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CalibrationError {
    /// One observed report would need two or more canonical targets
    #[error("Ambiguous mapping: {observed} resolves to {candidates:?}")]
    AmbiguousMapping {
        observed: String,
        candidates: Vec<char>,
    },

    /// Nothing was reported at a separator slot
    #[error("Missing separator: no report for {separator}")]
    MissingSeparator { separator: Separator },

    /// The report cannot be aligned with the probe that was requested
    #[error("Structural mismatch in {round} round: {detail}")]
    StructuralMismatch { round: Round, detail: String },

    /// A dead-key lead was never resolved within the round budget
    #[error("Unresolved dead key {lead:?} (typed for {canonical:?})")]
    UnresolvedDeadKey { lead: char, canonical: char },
}

impl CalibrationError {
    /// Whether this error stops the session from scheduling further rounds
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingSeparator { .. } | Self::StructuralMismatch { .. }
        )
    }
}

/// A format violation found while parsing a scan
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ParseError {
    /// The scan matches none of the declared grammars
    #[error("No declared identifier grammar matches the scan")]
    UnknownScheme,

    /// A field starts with an identifier that is not declared
    #[error("Unrecognised {syntax} element at offset {offset}: {found:?}")]
    UnrecognisedElement {
        syntax: Syntax,
        offset: usize,
        found: String,
    },

    /// Field value is too short or too long
    #[error("Element {code}: length {actual} outside {min}..={max}")]
    InvalidLength {
        code: String,
        min: usize,
        max: usize,
        actual: usize,
    },

    /// Field value contains a character outside its class
    #[error("Element {code}: invalid character {character:?} at position {position}")]
    InvalidCharacter {
        code: String,
        position: usize,
        character: char,
    },

    /// Check digit(s) do not match
    #[error("Element {code}: check digit mismatch in {value:?}")]
    InvalidCheckDigit { code: String, value: String },

    /// Date field is not a valid YYMMDD date
    #[error("Element {code}: invalid date {value:?}")]
    InvalidDate { code: String, value: String },

    /// A mandatory field for the detected scheme is absent
    #[error("Missing mandatory {role:?}")]
    MissingMandatory { role: FieldRole },

    /// The same identifier appears twice with different values
    #[error("Element {code} repeated with a different value")]
    DuplicateElement { code: String },

    /// An ISO/IEC 15434 envelope was opened but not closed
    #[error("Envelope header without trailer")]
    UnterminatedEnvelope,
}
