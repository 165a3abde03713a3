//! Immutable result of a successful calibration
//!
//! `CalibrationData` is built once at the end of a session and never changes
//! afterwards. Every map is ordered, so the JSON form is stable and two
//! calibrations from the same probes serialize byte for byte identically.

use super::ledger::{MappingLedger, Observed};
use crate::keyboard::template::Separator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current serialization format version
pub const FORMAT_VERSION: u32 = 1;

/// Observed code -> canonical code. Only substitutions are stored; every
/// other code translates to itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterMap(BTreeMap<char, char>);

impl CharacterMap {
    /// Canonical code for `observed`, or `observed` itself
    pub fn translate(&self, observed: char) -> char {
        self.0.get(&observed).copied().unwrap_or(observed)
    }

    pub fn get(&self, observed: char) -> Option<char> {
        self.0.get(&observed).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, char)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything known about one dead-key lead
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadKeyTable {
    /// Canonical character whose keystroke lands on this dead key
    canonical: char,
    /// Following code -> canonical character. Only entries the character map
    /// would not already produce are stored.
    sequences: BTreeMap<char, char>,
}

impl DeadKeyTable {
    pub fn canonical(&self) -> char {
        self.canonical
    }

    /// Canonical character for the code reported after this dead key
    pub fn resolve(&self, following: char) -> Option<char> {
        self.sequences.get(&following).copied()
    }

    pub fn sequences(&self) -> impl Iterator<Item = (char, char)> + '_ {
        self.sequences.iter().map(|(&k, &v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

/// What the host reports for one separator slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparatorEntry {
    pub separator: Separator,
    pub reported: String,
}

/// Separator reports in template order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeparatorTable(Vec<SeparatorEntry>);

impl SeparatorTable {
    pub(crate) fn new(entries: Vec<(Separator, String)>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(separator, reported)| SeparatorEntry {
                    separator,
                    reported,
                })
                .collect(),
        )
    }

    /// What the host reports for `separator`
    pub fn report(&self, separator: Separator) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.separator == separator)
            .map(|e| e.reported.as_str())
    }

    /// Longest separator report starting at `raw[index]`, with its length in codes
    pub fn match_at(&self, raw: &[char], index: usize) -> Option<(Separator, usize)> {
        let rest = raw.get(index..)?;
        self.0
            .iter()
            .filter_map(|e| {
                let len = e.reported.chars().count();
                let matches = len > 0
                    && rest.len() >= len
                    && e.reported.chars().zip(rest).all(|(a, &b)| a == b);
                matches.then_some((e.separator, len))
            })
            .max_by_key(|&(_, len)| len)
    }

    /// Whether any separator arrives as a multi-character substitute
    pub fn uses_substitutes(&self) -> bool {
        self.0.iter().any(|e| e.reported.chars().count() > 1)
    }

    pub fn entries(&self) -> &[SeparatorEntry] {
        &self.0
    }
}

/// The complete scanner -> canonical mapping for one scanner/host pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationData {
    version: u32,
    character_map: CharacterMap,
    dead_keys: BTreeMap<char, DeadKeyTable>,
    separators: SeparatorTable,
}

impl CalibrationData {
    /// Assemble the data from a conflict-free ledger.
    pub(crate) fn from_ledger(
        ledger: &MappingLedger,
        leads: &BTreeMap<char, char>,
        separators: SeparatorTable,
    ) -> Self {
        let mut character_map = BTreeMap::new();
        for (observed, canonical) in ledger.resolved() {
            if let Observed::Char(code) = observed {
                if *code != canonical {
                    character_map.insert(*code, canonical);
                }
            }
        }
        let character_map = CharacterMap(character_map);

        let mut dead_keys: BTreeMap<char, DeadKeyTable> = leads
            .iter()
            .map(|(&lead, &canonical)| {
                (
                    lead,
                    DeadKeyTable {
                        canonical,
                        sequences: BTreeMap::new(),
                    },
                )
            })
            .collect();

        for (observed, canonical) in ledger.resolved() {
            if let Observed::Sequence(lead, following) = observed {
                if character_map.translate(*following) == canonical {
                    continue;
                }
                if let Some(table) = dead_keys.get_mut(lead) {
                    table.sequences.insert(*following, canonical);
                }
            }
        }

        Self {
            version: FORMAT_VERSION,
            character_map,
            dead_keys,
            separators,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn character_map(&self) -> &CharacterMap {
        &self.character_map
    }

    pub fn dead_key(&self, lead: char) -> Option<&DeadKeyTable> {
        self.dead_keys.get(&lead)
    }

    pub fn dead_keys(&self) -> impl Iterator<Item = (char, &DeadKeyTable)> + '_ {
        self.dead_keys.iter().map(|(&k, v)| (k, v))
    }

    pub fn separators(&self) -> &SeparatorTable {
        &self.separators
    }

    /// Whether scans pass through this calibration unchanged
    pub fn is_identity(&self) -> bool {
        self.character_map.is_empty()
            && self.dead_keys.is_empty()
            && self
                .separators
                .entries()
                .iter()
                .all(|e| e.reported.chars().eq(std::iter::once(e.separator.code())))
    }

    /// Compact JSON form
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Pretty-printed JSON form
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_separators() -> SeparatorTable {
        SeparatorTable::new(
            Separator::ALL
                .iter()
                .map(|s| (*s, s.code().to_string()))
                .collect(),
        )
    }

    fn german_like() -> CalibrationData {
        let mut ledger = MappingLedger::new();
        ledger.record(Observed::Char('z'), 'y');
        ledger.record(Observed::Char('y'), 'z');
        ledger.record(Observed::Char('a'), 'a');
        ledger.record(Observed::Lead('´'), '=');
        ledger.record(Observed::Sequence('´', 'é'), 'e');
        ledger.record(Observed::Sequence('´', 'a'), 'a');
        let leads = BTreeMap::from([('´', '=')]);
        CalibrationData::from_ledger(&ledger, &leads, identity_separators())
    }

    #[test]
    fn only_substitutions_are_stored() {
        let data = german_like();
        assert_eq!(data.character_map().len(), 2);
        assert_eq!(data.character_map().translate('z'), 'y');
        assert_eq!(data.character_map().translate('a'), 'a');
        assert_eq!(data.character_map().get('a'), None);
    }

    #[test]
    fn dead_key_table_skips_entries_the_map_covers() {
        let data = german_like();
        let table = data.dead_key('´').unwrap();
        assert_eq!(table.canonical(), '=');
        assert_eq!(table.resolve('é'), Some('e'));
        assert_eq!(table.resolve('a'), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn separator_match_prefers_longest_report() {
        let table = SeparatorTable::new(vec![
            (Separator::Gs, "29".to_string()),
            (Separator::Fs, "290".to_string()),
        ]);
        let raw: Vec<char> = "12900".chars().collect();
        assert_eq!(table.match_at(&raw, 1), Some((Separator::Fs, 3)));
        assert_eq!(table.match_at(&raw, 0), None);
        assert_eq!(table.match_at(&raw, 9), None);
        assert!(table.uses_substitutes());
    }

    #[test]
    fn identity_detection() {
        let data = CalibrationData::from_ledger(
            &MappingLedger::new(),
            &BTreeMap::new(),
            identity_separators(),
        );
        assert!(data.is_identity());
        assert!(!german_like().is_identity());
    }

    #[test]
    fn json_roundtrip_is_stable() {
        let data = german_like();
        let json = data.to_json().unwrap();
        let back = CalibrationData::from_json(&json).unwrap();
        assert_eq!(back, data);
        assert_eq!(back.to_json().unwrap(), json);
    }

    #[test]
    fn json_field_order_is_fixed() {
        let json = german_like().to_json().unwrap();
        let version = json.find("\"version\"").unwrap();
        let map = json.find("\"character_map\"").unwrap();
        let dead = json.find("\"dead_keys\"").unwrap();
        let seps = json.find("\"separators\"").unwrap();
        assert!(version < map && map < dead && dead < seps);
    }
}
