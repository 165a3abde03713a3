//! Host keyboard layout emulation
//!
//! A [`LayoutProfile`] describes how a host interprets the keystrokes of a
//! scanner configured for a different layout: which template characters come
//! out as something else, which keys are dead keys, what each dead key
//! composes with the following key, and what the host reports for the four
//! separator control codes.
//!
//! Profiles are loaded from TOML so that national layouts stay data:
//!
//! ```toml
//! name = "German (QWERTZ)"
//!
//! [keys]
//! "y" = "z"
//! "z" = "y"
//!
//! [dead_keys]
//! "=" = "´"
//!
//! [compositions."´"]
//! "e" = "é"
//!
//! [separators]
//! GS = ""
//! ```

use super::template::{Separator, DEAD_KEY_MARKER, TERMINATOR};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Error type for loading layout profiles
#[derive(Debug, Error)]
pub enum LayoutError {
    /// IO error reading the profile
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The profile is not valid TOML
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// A key or dead key entry is not a single character
    #[error("Layout key {0:?} must be a single character")]
    InvalidKey(String),
    /// The same character is both a plain key and a dead key
    #[error("Character {0:?} is declared as both a plain key and a dead key")]
    KeyConflict(char),
    /// Unknown separator name
    #[error("Unknown separator {0:?}, expected GS, FS, RS or US")]
    InvalidSeparator(String),
}

/// Raw, serializable form of a layout profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutDefinition {
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Template character -> what the host reports (may be empty)
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
    /// Template character -> dead key it lands on
    #[serde(default)]
    pub dead_keys: BTreeMap<String, String>,
    /// Dead key -> (following report -> composed character)
    #[serde(default)]
    pub compositions: BTreeMap<String, BTreeMap<String, String>>,
    /// Separator name -> what the host reports
    #[serde(default)]
    pub separators: BTreeMap<String, String>,
}

/// What the host produces for one scanner keystroke
#[derive(Debug, Clone, PartialEq, Eq)]
enum Keystroke {
    Plain(String),
    Dead(char),
}

/// Emulates a host layout for a scanner typing canonical text
#[derive(Debug, Clone)]
pub struct LayoutProfile {
    name: String,
    keys: HashMap<char, Keystroke>,
    compositions: HashMap<char, HashMap<char, char>>,
    separators: HashMap<Separator, String>,
}

fn single_char(s: &str) -> Result<char, LayoutError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(LayoutError::InvalidKey(s.to_string())),
    }
}

impl LayoutProfile {
    /// A host that interprets every keystroke exactly as the scanner intends
    pub fn baseline() -> Self {
        Self {
            name: "Baseline".to_string(),
            keys: HashMap::new(),
            compositions: HashMap::new(),
            separators: HashMap::new(),
        }
    }

    /// Build a profile from its raw definition, validating every entry
    pub fn from_definition(def: LayoutDefinition) -> Result<Self, LayoutError> {
        let mut keys = HashMap::new();
        for (key, report) in &def.keys {
            keys.insert(single_char(key)?, Keystroke::Plain(report.clone()));
        }
        for (key, dead) in &def.dead_keys {
            let key = single_char(key)?;
            if keys.contains_key(&key) {
                return Err(LayoutError::KeyConflict(key));
            }
            keys.insert(key, Keystroke::Dead(single_char(dead)?));
        }

        let mut compositions: HashMap<char, HashMap<char, char>> = HashMap::new();
        for (dead, table) in &def.compositions {
            let entry = compositions.entry(single_char(dead)?).or_default();
            for (following, composed) in table {
                entry.insert(single_char(following)?, single_char(composed)?);
            }
        }

        let mut separators = HashMap::new();
        for (name, report) in &def.separators {
            let sep = Separator::from_name(name)
                .ok_or_else(|| LayoutError::InvalidSeparator(name.clone()))?;
            separators.insert(sep, report.clone());
        }

        Ok(Self {
            name: def.name,
            keys,
            compositions,
            separators,
        })
    }

    /// Parse a profile from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, LayoutError> {
        let def: LayoutDefinition = toml::from_str(contents)?;
        Self::from_definition(def)
    }

    /// Load a profile from a TOML file
    pub fn load_from(path: &Path) -> Result<Self, LayoutError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dead keys this host has for template characters, sorted
    pub fn dead_keys(&self) -> Vec<char> {
        let mut leads: Vec<char> = self
            .keys
            .values()
            .filter_map(|k| match k {
                Keystroke::Dead(d) => Some(*d),
                Keystroke::Plain(_) => None,
            })
            .collect();
        leads.sort_unstable();
        leads.dedup();
        leads
    }

    fn keystroke(&self, c: char) -> Keystroke {
        if let Some(sep) = Separator::from_code(c) {
            let report = self
                .separators
                .get(&sep)
                .cloned()
                .unwrap_or_else(|| c.to_string());
            return Keystroke::Plain(report);
        }
        self.keys
            .get(&c)
            .cloned()
            .unwrap_or_else(|| Keystroke::Plain(c.to_string()))
    }

    /// Report the codes the host produces when the scanner types `text`.
    ///
    /// Dead keys are reported as NUL followed by the dead key itself. The
    /// keystroke after a dead key is reported as its composition when the
    /// host has one, otherwise as its plain report. Separators and CR never
    /// compose.
    pub fn type_text(&self, text: &str) -> Vec<char> {
        let mut out = Vec::with_capacity(text.len() + 8);
        let mut pending: Option<char> = None;

        for c in text.chars() {
            let composable = c != TERMINATOR && Separator::from_code(c).is_none();
            match self.keystroke(c) {
                Keystroke::Dead(d) => {
                    out.push(DEAD_KEY_MARKER);
                    out.push(d);
                    pending = Some(d);
                }
                Keystroke::Plain(report) => {
                    let dead = pending.take().filter(|_| composable);
                    let composed = dead.and_then(|d| {
                        let mut chars = report.chars();
                        match (chars.next(), chars.next()) {
                            (Some(k), None) => self.compositions.get(&d)?.get(&k).copied(),
                            _ => None,
                        }
                    });
                    match composed {
                        Some(x) => out.push(x),
                        None => out.extend(report.chars()),
                    }
                }
            }
        }

        out
    }
}
