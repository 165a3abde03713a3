//! Structured pack identifier

use super::catalog::FieldRole;
use crate::error::ParseError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier grammar a scan was read with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    /// No declared grammar matched
    #[default]
    Unknown,
    /// GS1 Application Identifiers
    Gs1,
    /// IFA coding: ASC MH Data Identifiers
    Ifa,
}

/// One element read from the scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataElement {
    pub code: String,
    pub value: String,
    pub role: FieldRole,
}

/// Result of parsing one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackIdentifier {
    pub scheme: Scheme,
    pub product_code: Option<String>,
    pub serial_number: Option<String>,
    pub batch_identifier: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub is_valid: bool,
    /// Elements in scan order
    pub elements: Vec<DataElement>,
    /// Every format violation found
    pub diagnostics: Vec<ParseError>,
}

impl PackIdentifier {
    /// The (scheme, product, serial, batch, expiry) tuple
    pub fn key_fields(
        &self,
    ) -> (
        Scheme,
        Option<&str>,
        Option<&str>,
        Option<&str>,
        Option<NaiveDate>,
    ) {
        (
            self.scheme,
            self.product_code.as_deref(),
            self.serial_number.as_deref(),
            self.batch_identifier.as_deref(),
            self.expiry,
        )
    }

    /// Whether an element with `role` was read
    pub fn has_role(&self, role: FieldRole) -> bool {
        self.elements.iter().any(|e| e.role == role)
    }

    pub fn element(&self, code: &str) -> Option<&DataElement> {
        self.elements.iter().find(|e| e.code == code)
    }
}
