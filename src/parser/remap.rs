//! Translation of raw host reports back to canonical text
//!
//! ## Usage
//!
//! ```
//! use scanner_calibration::calibration::{Calibrator, ProbeSize};
//! use scanner_calibration::keyboard::LayoutProfile;
//! use scanner_calibration::parser::Remapper;
//!
//! let host = LayoutProfile::baseline();
//! let token = Calibrator::new().run(ProbeSize::Automatic, |t| {
//!     host.type_text(&t.request().unwrap().barcode_data())
//! });
//! let remapper = Remapper::new(token.calibration_data().unwrap().clone());
//! assert_eq!(remapper.remap(&['0', '1', '\r']), "01");
//! ```

use crate::calibration::CalibrationData;
use crate::keyboard::template::{Separator, DEAD_KEY_MARKER};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

/// What happened to one unit of raw input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemapResult {
    /// Code passed through unchanged
    Unchanged(char),
    /// Code was substituted by the character map
    Remapped { from: char, to: char },
    /// A separator report of `len` codes was recognised
    Separator { separator: Separator, len: usize },
    /// A dead-key lead was replaced by the character that produced it
    DeadKey { lead: char, canonical: char },
    /// The code after a dead key was resolved through the lead's table
    Composed { lead: char, from: char, to: char },
}

impl RemapResult {
    /// Canonical character this step produces
    pub fn output(&self) -> char {
        match *self {
            Self::Unchanged(c) => c,
            Self::Remapped { to, .. } => to,
            Self::Separator { separator, .. } => separator.code(),
            Self::DeadKey { canonical, .. } => canonical,
            Self::Composed { to, .. } => to,
        }
    }
}

/// Statistics about one remap pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapStats {
    /// Canonical characters produced
    pub total_processed: u64,
    /// Codes substituted by the character map
    pub remapped_count: u64,
    /// Separators recognised
    pub separator_count: u64,
    /// Dead-key leads resolved
    pub dead_key_count: u64,
    /// Codes resolved through a dead-key table
    pub composed_count: u64,
}

impl RemapStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a remap result
    pub fn record(&mut self, result: &RemapResult) {
        self.total_processed += 1;
        match result {
            RemapResult::Remapped { .. } => self.remapped_count += 1,
            RemapResult::Separator { .. } => self.separator_count += 1,
            RemapResult::DeadKey { .. } => self.dead_key_count += 1,
            RemapResult::Composed { .. } => self.composed_count += 1,
            RemapResult::Unchanged(_) => {}
        }
    }
}

/// Canonical reading of a scan in which multi-code separator substitutes
/// are kept as literal text.
///
/// Digits such as "0029" may be a GS substitute or plain data. Which one
/// they are depends on where they fall in the identifier grammar, so the
/// positions where a substitute could start are recorded for the reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanText {
    chars: Vec<char>,
    /// Char index -> substitute starting there, with its length in chars
    substitutes: BTreeMap<usize, (Separator, usize)>,
}

impl ScanText {
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Separator substitute that could start at `index`
    pub fn substitute_at(&self, index: usize) -> Option<(Separator, usize)> {
        self.substitutes.get(&index).copied()
    }

    /// Length of `separator` at `index`, either its own code or a substitute
    pub fn separator_at(&self, index: usize, separator: Separator) -> Option<usize> {
        if self.chars.get(index) == Some(&separator.code()) {
            return Some(1);
        }
        self.substitute_at(index)
            .filter(|&(s, _)| s == separator)
            .map(|(_, len)| len)
    }

    /// Literal text of `range`; empty when out of bounds
    pub fn text(&self, range: Range<usize>) -> String {
        self.chars.get(range).unwrap_or_default().iter().collect()
    }
}

/// Applies calibration data to raw host reports
#[derive(Debug, Clone)]
pub struct Remapper {
    data: Arc<CalibrationData>,
}

impl Remapper {
    pub fn new(data: Arc<CalibrationData>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Arc<CalibrationData> {
        &self.data
    }

    /// Translate a raw report into canonical text, reading every separator
    /// substitute as a separator
    pub fn remap(&self, raw: &[char]) -> String {
        self.steps(raw).iter().map(RemapResult::output).collect()
    }

    /// Translate a raw report, counting what was done
    pub fn remap_with_stats(&self, raw: &[char]) -> (String, RemapStats) {
        let mut stats = RemapStats::new();
        let text: String = self
            .steps(raw)
            .iter()
            .inspect(|step| stats.record(step))
            .map(RemapResult::output)
            .collect();
        (text, stats)
    }

    /// Every translation step for a raw report, left to right.
    ///
    /// Trailing CR and LF codes are dropped first.
    pub fn steps(&self, raw: &[char]) -> Vec<RemapResult> {
        self.walk(raw, true)
            .into_iter()
            .map(|(_, step)| step)
            .collect()
    }

    /// Translate a raw report without deciding what multi-code separator
    /// substitutes mean
    pub fn read(&self, raw: &[char]) -> ScanText {
        let steps = self.walk(raw, false);
        let separators = self.data.separators();
        let chars = steps.iter().map(|(_, step)| step.output()).collect();

        // Raw index -> char index, for codes translated one to one
        let single: BTreeMap<usize, usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, (_, step))| {
                matches!(step, RemapResult::Unchanged(_) | RemapResult::Remapped { .. })
            })
            .map(|(k, (i, _))| (*i, k))
            .collect();

        let mut substitutes = BTreeMap::new();
        for (&i, &k) in &single {
            let Some((separator, len)) = separators.match_at(raw, i).filter(|&(_, len)| len > 1)
            else {
                continue;
            };
            if (0..len).all(|j| single.get(&(i + j)) == Some(&(k + j))) {
                substitutes.insert(k, (separator, len));
            }
        }

        ScanText { chars, substitutes }
    }

    /// Steps paired with the raw index they start at. Multi-code separator
    /// substitutes are only matched when `substitutes` is set.
    fn walk(&self, raw: &[char], substitutes: bool) -> Vec<(usize, RemapResult)> {
        let end = raw
            .iter()
            .rposition(|&c| c != '\r' && c != '\n')
            .map_or(0, |i| i + 1);
        let raw = &raw[..end];

        let separators = self.data.separators();
        let map = self.data.character_map();
        let mut steps = Vec::with_capacity(raw.len());
        let mut i = 0;

        while i < raw.len() {
            let separator = separators
                .match_at(raw, i)
                .filter(|&(_, len)| substitutes || len == 1);
            if let Some((separator, len)) = separator {
                steps.push((i, RemapResult::Separator { separator, len }));
                i += len;
                continue;
            }

            let code = raw[i];
            if code == DEAD_KEY_MARKER {
                let table = raw
                    .get(i + 1)
                    .and_then(|&lead| self.data.dead_key(lead).map(|t| (lead, t)));
                if let Some((lead, table)) = table {
                    steps.push((
                        i,
                        RemapResult::DeadKey {
                            lead,
                            canonical: table.canonical(),
                        },
                    ));
                    i += 2;

                    if let Some(&following) = raw.get(i) {
                        let free = following != DEAD_KEY_MARKER
                            && separators.match_at(raw, i).is_none();
                        if let Some(to) = table.resolve(following).filter(|_| free) {
                            steps.push((
                                i,
                                RemapResult::Composed {
                                    lead,
                                    from: following,
                                    to,
                                },
                            ));
                            i += 1;
                        }
                    }
                    continue;
                }
            }

            let step = match map.get(code) {
                Some(to) => RemapResult::Remapped { from: code, to },
                None => RemapResult::Unchanged(code),
            };
            steps.push((i, step));
            i += 1;
        }

        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{Calibrator, ProbeSize};
    use crate::keyboard::LayoutProfile;

    const HOST: &str = r#"
name = "Test host"

[keys]
"y" = "z"
"z" = "y"

[dead_keys]
"=" = "^"

[compositions."^"]
"e" = "ê"

[separators]
GS = "0029"
FS = "0028"
RS = "0030"
US = "0031"
"#;

    fn remapper_for(layout: &LayoutProfile) -> Remapper {
        let token = Calibrator::new().run(ProbeSize::Automatic, |t| {
            layout.type_text(&t.request().unwrap().barcode_data())
        });
        Remapper::new(token.calibration_data().unwrap().clone())
    }

    #[test]
    fn identity_passes_through() {
        let remapper = remapper_for(&LayoutProfile::baseline());
        let raw: Vec<char> = "01\u{1d}21ABC\r\n".chars().collect();
        let (text, stats) = remapper.remap_with_stats(&raw);
        assert_eq!(text, "01\u{1d}21ABC");
        assert_eq!(stats.total_processed, 8);
        assert_eq!(stats.separator_count, 1);
        assert_eq!(stats.remapped_count, 0);
    }

    #[test]
    fn substitutions_dead_keys_and_separators() {
        let layout = LayoutProfile::from_toml_str(HOST).unwrap();
        let remapper = remapper_for(&layout);
        let canonical = "yz=e==\u{1d}=\u{1d}21";
        let raw = layout.type_text(&format!("{}\r", canonical));
        let (text, stats) = remapper.remap_with_stats(&raw);
        assert_eq!(text, canonical);
        assert_eq!(stats.remapped_count, 2);
        assert_eq!(stats.dead_key_count, 4);
        assert_eq!(stats.composed_count, 1);
        assert_eq!(stats.separator_count, 2);
    }

    #[test]
    fn unknown_lead_falls_through() {
        let remapper = remapper_for(&LayoutProfile::baseline());
        assert_eq!(remapper.remap(&['\0', '~', 'a']), "\0~a");
    }

    #[test]
    fn empty_and_terminator_only_reports() {
        let remapper = remapper_for(&LayoutProfile::baseline());
        assert_eq!(remapper.remap(&[]), "");
        assert_eq!(remapper.remap(&['\r', '\n']), "");
    }

    #[test]
    fn remap_stats_record() {
        let mut stats = RemapStats::new();
        stats.record(&RemapResult::Unchanged('a'));
        stats.record(&RemapResult::Remapped { from: 'z', to: 'y' });
        stats.record(&RemapResult::DeadKey {
            lead: '^',
            canonical: '=',
        });
        assert_eq!(stats.total_processed, 3);
        assert_eq!(stats.remapped_count, 1);
        assert_eq!(stats.dead_key_count, 1);
    }

    #[test]
    fn read_keeps_substitutes_literal() {
        let layout = LayoutProfile::from_toml_str(HOST).unwrap();
        let remapper = remapper_for(&layout);
        let raw = layout.type_text("0100290\u{1d}21y\r");
        let text = remapper.read(&raw);

        assert_eq!(text.text(0..text.len()), "0100290002921y");
        assert_eq!(text.substitute_at(2), Some((Separator::Gs, 4)));
        assert_eq!(text.substitute_at(7), Some((Separator::Gs, 4)));
        assert_eq!(text.separator_at(7, Separator::Gs), Some(4));
        assert_eq!(text.separator_at(7, Separator::Us), None);
        assert_eq!(text.substitute_at(3), None);

        // The context-free reading splits at both
        assert_eq!(remapper.remap(&raw), "01\u{1d}0\u{1d}21y");
    }

    #[test]
    fn read_maps_single_code_separators() {
        let remapper = remapper_for(&LayoutProfile::baseline());
        let text = remapper.read(&['0', '1', '\u{1d}', '2', '\r']);
        assert_eq!(text.chars(), &['0', '1', '\u{1d}', '2']);
        assert_eq!(text.separator_at(2, Separator::Gs), Some(1));
        assert_eq!(text.substitute_at(2), None);
        assert_eq!(text.text(5..9), "");
    }
}
