//! Calibration report and export functionality

use crate::calibration::{
    CalibrationData, CalibrationState, CalibrationToken, Information, InformationLevel,
};
use crate::error::CalibrationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete report of a calibration session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Summary of the outcome
    pub summary: CalibrationSummary,
    /// Notes collected during the session
    pub entries: Vec<ResultEntry>,
    /// Errors that decided the outcome
    pub errors: Vec<CalibrationError>,
    /// Resulting calibration, absent on failure
    pub calibration: Option<CalibrationData>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report generation timestamp
    pub generated_at: String,
    /// Library version
    pub version: String,
    /// Probe rounds taken, baseline included
    pub rounds: usize,
}

/// Session outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSummary {
    /// Final state
    pub state: CalibrationState,
    /// Plain character substitutions found
    pub substitutions: usize,
    /// Dead keys found
    pub dead_keys: usize,
    /// Whether separators arrive as multi-character substitutes
    pub separator_substitutes: bool,
    /// Warnings and errors raised
    pub issues_detected: u32,
}

/// Single result entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEntry {
    pub label: String,
    pub value: String,
    pub status: String,
}

impl From<&Information> for ResultEntry {
    fn from(info: &Information) -> Self {
        Self {
            label: info.label.clone(),
            value: info.value.clone(),
            status: info.level.as_str().to_string(),
        }
    }
}

impl CalibrationReport {
    /// Build a report from the last token of a session
    pub fn new(token: &CalibrationToken) -> Self {
        let now: DateTime<Utc> = Utc::now();
        let data = token.calibration_data().map(|d| d.as_ref().clone());

        let warnings = token
            .information()
            .iter()
            .filter(|i| matches!(i.level, InformationLevel::Warning | InformationLevel::Error))
            .count();

        Self {
            metadata: ReportMetadata {
                generated_at: now.to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                rounds: token.rounds(),
            },
            summary: CalibrationSummary {
                state: token.state().clone(),
                substitutions: data.as_ref().map_or(0, |d| d.character_map().len()),
                dead_keys: token.dead_key_leads().count(),
                separator_substitutes: data
                    .as_ref()
                    .is_some_and(|d| d.separators().uses_substitutes()),
                issues_detected: (warnings + token.errors().len()) as u32,
            },
            entries: token.information().iter().map(ResultEntry::from).collect(),
            errors: token.errors().to_vec(),
            calibration: data,
        }
    }

    /// Export report to JSON file
    pub fn export_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Export report to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
