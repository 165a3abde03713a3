//! Identifier grammar catalog
//!
//! Only the subset of GS1 Application Identifiers and ASC MH Data
//! Identifiers that make up a pack identifier ships by default. Callers may
//! supply their own catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier grammar a data element belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Syntax {
    /// GS1 Application Identifiers
    Gs1ApplicationIdentifiers,
    /// ASC MH 10.8.2 Data Identifiers
    AscMhDataIdentifiers,
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gs1ApplicationIdentifiers => write!(f, "GS1 AI"),
            Self::AscMhDataIdentifiers => write!(f, "ASC MH DI"),
        }
    }
}

/// A (syntax, code) pair the caller wants recognised
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecognisedDataElement {
    pub syntax: Syntax,
    pub code: String,
}

impl RecognisedDataElement {
    pub fn new(syntax: Syntax, code: impl Into<String>) -> Self {
        Self {
            syntax,
            code: code.into(),
        }
    }

    pub fn gs1(code: impl Into<String>) -> Self {
        Self::new(Syntax::Gs1ApplicationIdentifiers, code)
    }

    pub fn asc_mh(code: impl Into<String>) -> Self {
        Self::new(Syntax::AscMhDataIdentifiers, code)
    }

    /// Every element of the default catalog
    pub fn pack_identifier_defaults() -> Vec<Self> {
        IdentifierCatalog::default()
            .elements()
            .map(|def| Self::new(def.syntax, def.code.clone()))
            .collect()
    }
}

/// Allowed value length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthRule {
    Fixed(usize),
    Variable { min: usize, max: usize },
}

impl LengthRule {
    /// (min, max) bounds
    pub fn bounds(&self) -> (usize, usize) {
        match *self {
            Self::Fixed(n) => (n, n),
            Self::Variable { min, max } => (min, max),
        }
    }
}

/// Character class of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharSet {
    /// Digits only
    Numeric,
    /// GS1 AI encodable character set 82
    Gs1Set82,
    /// Upper-case letters and digits
    Alphanumeric,
}

/// Semantic role of a value within a pack identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldRole {
    ProductCode,
    SerialNumber,
    BatchIdentifier,
    Expiry,
    Other,
}

/// Extra value check beyond length and character class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Check {
    None,
    /// GTIN mod-10 check digit
    Gtin,
    /// PPN mod-97 check digits
    Ppn,
    /// YYMMDD date
    Date,
}

/// Grammar of one data element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDefinition {
    pub syntax: Syntax,
    pub code: String,
    pub title: String,
    pub length: LengthRule,
    pub charset: CharSet,
    pub role: FieldRole,
    pub check: Check,
}

/// Set of element definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierCatalog {
    elements: Vec<ElementDefinition>,
}

/// Built-in pack identifier elements:
/// (syntax, code, title, length, charset, role, check)
const DEFAULT_ELEMENTS: [(Syntax, &str, &str, LengthRule, CharSet, FieldRole, Check); 15] = {
    use CharSet::*;
    use FieldRole::*;
    use LengthRule::*;
    use Syntax::{AscMhDataIdentifiers as Di, Gs1ApplicationIdentifiers as Ai};

    const UP_TO_20: LengthRule = Variable { min: 1, max: 20 };
    [
        (Ai, "01", "GTIN", Fixed(14), Numeric, ProductCode, Check::Gtin),
        (Ai, "10", "BATCH/LOT", UP_TO_20, Gs1Set82, BatchIdentifier, Check::None),
        (Ai, "11", "PROD DATE", Fixed(6), Numeric, Other, Check::Date),
        (Ai, "17", "USE BY OR EXPIRY", Fixed(6), Numeric, Expiry, Check::Date),
        (Ai, "21", "SERIAL", UP_TO_20, Gs1Set82, SerialNumber, Check::None),
        (Ai, "710", "NHRN", UP_TO_20, Gs1Set82, Other, Check::None),
        (Ai, "711", "NHRN", UP_TO_20, Gs1Set82, Other, Check::None),
        (Ai, "712", "NHRN", UP_TO_20, Gs1Set82, Other, Check::None),
        (Ai, "713", "NHRN", UP_TO_20, Gs1Set82, Other, Check::None),
        (Ai, "714", "NHRN", UP_TO_20, Gs1Set82, Other, Check::None),
        (Di, "9N", "PPN", Variable { min: 4, max: 22 }, Alphanumeric, ProductCode, Check::Ppn),
        (Di, "8P", "GTIN", Fixed(14), Numeric, ProductCode, Check::Gtin),
        (Di, "1T", "BATCH", UP_TO_20, Alphanumeric, BatchIdentifier, Check::None),
        (Di, "D", "EXPIRY", Fixed(6), Numeric, Expiry, Check::Date),
        (Di, "S", "SERIAL", UP_TO_20, Alphanumeric, SerialNumber, Check::None),
    ]
};

impl Default for IdentifierCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        for (syntax, code, title, length, charset, role, check) in DEFAULT_ELEMENTS {
            catalog.add(ElementDefinition {
                syntax,
                code: code.to_string(),
                title: title.to_string(),
                length,
                charset,
                role,
                check,
            });
        }
        catalog
    }
}

impl IdentifierCatalog {
    /// A catalog with no definitions
    pub fn empty() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    /// Add a definition, replacing any with the same syntax and code
    pub fn add(&mut self, definition: ElementDefinition) {
        self.elements
            .retain(|d| !(d.syntax == definition.syntax && d.code == definition.code));
        self.elements.push(definition);
    }

    pub fn get(&self, syntax: Syntax, code: &str) -> Option<&ElementDefinition> {
        self.elements
            .iter()
            .find(|d| d.syntax == syntax && d.code == code)
    }

    pub fn elements(&self) -> impl Iterator<Item = &ElementDefinition> {
        self.elements.iter()
    }

    /// Longest declared code of `syntax` that `text` starts with
    pub fn longest_prefix(
        &self,
        syntax: Syntax,
        text: &str,
        declared: &BTreeSet<RecognisedDataElement>,
    ) -> Option<&ElementDefinition> {
        self.elements
            .iter()
            .filter(|d| d.syntax == syntax && text.starts_with(d.code.as_str()))
            .filter(|d| declared.contains(&RecognisedDataElement::new(d.syntax, d.code.clone())))
            .max_by_key(|d| d.code.len())
    }
}
