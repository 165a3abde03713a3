//! Informational notes attached to calibration tokens

use serde::{Deserialize, Serialize};

/// A single note about the calibration session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Information {
    pub label: String,
    pub value: String,
    pub level: InformationLevel,
}

impl Information {
    pub fn new(
        label: impl Into<String>,
        value: impl Into<String>,
        level: InformationLevel,
    ) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            level,
        }
    }

    pub fn ok(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, InformationLevel::Ok)
    }

    pub fn warning(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, InformationLevel::Warning)
    }

    pub fn error(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, InformationLevel::Error)
    }

    pub fn info(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, InformationLevel::Info)
    }
}

/// Severity of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InformationLevel {
    Ok,
    Warning,
    Error,
    Info,
}

impl InformationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}
