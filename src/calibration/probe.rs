//! Alignment of host reports against the canonical template

use super::ledger::Observed;
use crate::config::CalibrationConfig;
use crate::error::{CalibrationError, Round};
use crate::keyboard::template::{self, Separator, DEAD_KEY_MARKER, PRINTABLE_LEN, TERMINATOR};
use std::collections::BTreeMap;

/// One keystroke as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cell {
    Char(char),
    Lead(char),
}

/// Strip the terminating CR, or explain why the report is malformed.
fn strip_terminator(observed: &[char]) -> Result<&[char], String> {
    match observed.split_last() {
        Some((&TERMINATOR, body)) => Ok(body),
        Some((last, _)) => Err(format!("report ends with {:?} instead of CR", last)),
        None => Err("empty report".to_string()),
    }
}

/// Split a report body into cells: `NUL d` is a dead-key lead, anything
/// else a plain code.
fn cells(codes: &[char]) -> Result<Vec<Cell>, String> {
    let mut out = Vec::with_capacity(codes.len());
    let mut iter = codes.iter().copied();
    while let Some(code) = iter.next() {
        if code == DEAD_KEY_MARKER {
            match iter.next() {
                Some(DEAD_KEY_MARKER) | None => {
                    return Err("dead-key marker without a lead".to_string())
                }
                Some(lead) => out.push(Cell::Lead(lead)),
            }
        } else {
            out.push(Cell::Char(code));
        }
    }
    Ok(out)
}

/// The lead of the first cell, if the report opens with a dead key
pub(crate) fn opening_lead(observed: &[char]) -> Option<char> {
    match observed {
        [DEAD_KEY_MARKER, lead, ..] if *lead != DEAD_KEY_MARKER => Some(*lead),
        _ => None,
    }
}

/// Everything learnt from a baseline report
#[derive(Debug, Default)]
pub(crate) struct BaselineAnalysis {
    /// Observations to record in the ledger
    pub records: Vec<(Observed, char)>,
    /// Dead-key leads with the canonical character they were seen at,
    /// in template order
    pub leads: Vec<(char, char)>,
    /// Separator reports in template order
    pub separators: Vec<(Separator, String)>,
    /// Structural problems; any of these is fatal
    pub errors: Vec<CalibrationError>,
    /// Whether separators arrived as decimal substitutes
    pub decimal_substitutes: bool,
}

fn baseline_mismatch(detail: String) -> CalibrationError {
    CalibrationError::StructuralMismatch {
        round: Round::Baseline,
        detail,
    }
}

pub(crate) fn analyse_baseline(observed: &[char], config: &CalibrationConfig) -> BaselineAnalysis {
    let mut analysis = BaselineAnalysis::default();

    let cells = match strip_terminator(observed).and_then(cells) {
        Ok(cells) => cells,
        Err(detail) => {
            analysis.errors.push(baseline_mismatch(detail));
            return analysis;
        }
    };

    if cells.len() < PRINTABLE_LEN {
        analysis.errors.push(baseline_mismatch(format!(
            "expected at least {} keystrokes before the separators, got {}",
            PRINTABLE_LEN,
            cells.len()
        )));
        return analysis;
    }

    let (printable, tail) = cells.split_at(PRINTABLE_LEN);

    // A short tail with separator codes in the printable section means
    // keystrokes went missing and everything after them shifted
    let shifted = tail.len() < Separator::ALL.len()
        && printable
            .iter()
            .any(|cell| matches!(cell, Cell::Char(code) if Separator::from_code(*code).is_some()));
    if shifted {
        analysis.errors.push(baseline_mismatch(format!(
            "separator codes inside the printable section, {} keystrokes after it",
            tail.len()
        )));
        return analysis;
    }
    let mut previous_lead: Option<char> = None;

    for (cell, canonical) in printable.iter().zip(template::printable()) {
        match *cell {
            Cell::Lead(lead) => {
                analysis.records.push((Observed::Lead(lead), canonical));
                if !analysis.leads.iter().any(|(l, _)| *l == lead) {
                    analysis.leads.push((lead, canonical));
                }
                previous_lead = Some(lead);
            }
            Cell::Char(code) => {
                // The keystroke after a dead key is a composition, not a plain report
                let observed = match previous_lead.take() {
                    Some(lead) => Observed::Sequence(lead, code),
                    None => Observed::Char(code),
                };
                analysis.records.push((observed, canonical));
            }
        }
    }

    analyse_separators(tail, config, &mut analysis);
    analysis
}

fn analyse_separators(tail: &[Cell], config: &CalibrationConfig, analysis: &mut BaselineAnalysis) {
    let mut codes = Vec::with_capacity(tail.len());
    for cell in tail {
        match *cell {
            Cell::Char(c) => codes.push(c),
            Cell::Lead(lead) => {
                analysis.errors.push(baseline_mismatch(format!(
                    "dead key {:?} reported in the separator section",
                    lead
                )));
                return;
            }
        }
    }

    let slots = Separator::ALL.len();

    if codes.len() == slots {
        for (sep, code) in Separator::ALL.into_iter().zip(codes) {
            analysis.records.push((Observed::Char(code), sep.code()));
            analysis.separators.push((sep, code.to_string()));
        }
        return;
    }

    if let Some(width) = decimal_width(&codes, config) {
        for (sep, chunk) in Separator::ALL.into_iter().zip(codes.chunks(width)) {
            let report: String = chunk.iter().collect();
            analysis
                .records
                .push((Observed::Substitute(report.clone()), sep.code()));
            analysis.separators.push((sep, report));
        }
        analysis.decimal_substitutes = true;
        return;
    }

    if codes.len() < slots {
        // Only separators reported as themselves, in template order, tell
        // which slots are absent
        let present: Option<Vec<Separator>> =
            codes.iter().map(|&code| Separator::from_code(code)).collect();
        match present {
            Some(present) if present.windows(2).all(|w| w[0] < w[1]) => {
                for sep in Separator::ALL {
                    if present.contains(&sep) {
                        analysis.records.push((Observed::Char(sep.code()), sep.code()));
                        analysis.separators.push((sep, sep.code().to_string()));
                    } else {
                        analysis
                            .errors
                            .push(CalibrationError::MissingSeparator { separator: sep });
                    }
                }
            }
            _ => analysis.errors.push(baseline_mismatch(format!(
                "expected {} separator reports after the printable section, got {:?}",
                slots, codes
            ))),
        }
        return;
    }

    analysis.errors.push(baseline_mismatch(format!(
        "expected {} separator reports after the printable section, got {} codes",
        slots,
        codes.len()
    )));
}

/// Width of each decimal substitute when the separator section is a run of
/// digits that splits evenly across the four slots.
fn decimal_width(codes: &[char], config: &CalibrationConfig) -> Option<usize> {
    let decimal = &config.decimal_separators;
    if !decimal.enabled || codes.is_empty() || !codes.iter().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let slots = Separator::ALL.len();
    if codes.len() % slots != 0 {
        return None;
    }
    let width = codes.len() / slots;
    (decimal.min_width..=decimal.max_width)
        .contains(&width)
        .then_some(width)
}

/// Check a dead-key round for `lead` and return the observations it yields.
///
/// For every printable position the host must report the lead, then the
/// composition (or another lead), then the plain report (or that same lead
/// again). Nothing is returned unless the whole round lines up.
pub(crate) fn analyse_dead_key(
    observed: &[char],
    lead: char,
    leads: &BTreeMap<char, char>,
) -> Result<Vec<(Observed, char)>, CalibrationError> {
    let mismatch = |detail: String| CalibrationError::StructuralMismatch {
        round: Round::DeadKey(lead),
        detail,
    };

    let cells = strip_terminator(observed).and_then(cells).map_err(mismatch)?;

    let expected = PRINTABLE_LEN * 3;
    if cells.len() != expected {
        return Err(mismatch(format!(
            "expected {} keystrokes, got {}",
            expected,
            cells.len()
        )));
    }

    let mut records = Vec::with_capacity(expected);
    for (triple, canonical) in cells.chunks(3).zip(template::printable()) {
        match *triple {
            [Cell::Lead(first), Cell::Char(composed), Cell::Char(plain)] if first == lead => {
                records.push((Observed::Sequence(lead, composed), canonical));
                records.push((Observed::Char(plain), canonical));
            }
            [Cell::Lead(first), Cell::Lead(second), Cell::Lead(third)]
                if first == lead && second == third =>
            {
                if !leads.contains_key(&second) {
                    return Err(mismatch(format!(
                        "unknown dead key {:?} at {:?}",
                        second, canonical
                    )));
                }
                records.push((Observed::Lead(second), canonical));
            }
            _ => {
                return Err(mismatch(format!(
                    "keystrokes for {:?} do not follow the dead key",
                    canonical
                )))
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::template::{baseline_probe, dead_key_probe};

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn cells_split_dead_keys() {
        let c = cells(&['a', '\0', '´', 'é']).unwrap();
        assert_eq!(c, vec![Cell::Char('a'), Cell::Lead('´'), Cell::Char('é')]);
        assert!(cells(&['a', '\0']).is_err());
        assert!(cells(&['\0', '\0']).is_err());
    }

    #[test]
    fn opening_lead_detects_dead_key_reports() {
        assert_eq!(opening_lead(&['\0', '´', 'x']), Some('´'));
        assert_eq!(opening_lead(&['x', '\0', '´']), None);
        assert_eq!(opening_lead(&['\0']), None);
    }

    #[test]
    fn identity_baseline_records_every_position() {
        let analysis = analyse_baseline(&chars(&baseline_probe()), &CalibrationConfig::default());
        assert!(analysis.errors.is_empty());
        assert!(analysis.leads.is_empty());
        assert_eq!(analysis.records.len(), PRINTABLE_LEN + 4);
        assert_eq!(analysis.separators.len(), 4);
        assert!(!analysis.decimal_substitutes);
        assert_eq!(analysis.records[0], (Observed::Char('!'), '!'));
    }

    #[test]
    fn missing_terminator_is_structural() {
        let mut probe = chars(&baseline_probe());
        probe.pop();
        let analysis = analyse_baseline(&probe, &CalibrationConfig::default());
        assert_eq!(analysis.errors.len(), 1);
        assert!(analysis.errors[0].is_structural());
        assert!(analysis.records.is_empty());
    }

    #[test]
    fn short_report_is_structural() {
        let analysis = analyse_baseline(&chars("abc\r"), &CalibrationConfig::default());
        assert!(matches!(
            analysis.errors.as_slice(),
            [CalibrationError::StructuralMismatch { round: Round::Baseline, .. }]
        ));
    }

    #[test]
    fn absent_separators_are_reported_per_slot() {
        let mut probe: String = template::PRINTABLE.to_string();
        probe.push('\u{1d}');
        probe.push('\r');
        let analysis = analyse_baseline(&chars(&probe), &CalibrationConfig::default());
        let missing: Vec<Separator> = analysis
            .errors
            .iter()
            .filter_map(|e| match e {
                CalibrationError::MissingSeparator { separator } => Some(*separator),
                _ => None,
            })
            .collect();
        assert_eq!(missing, vec![Separator::Fs, Separator::Rs, Separator::Us]);
    }

    #[test]
    fn missing_middle_separator_is_named() {
        let probe = format!("{}\u{1d}\u{1c}\u{1f}\r", template::PRINTABLE);
        let analysis = analyse_baseline(&chars(&probe), &CalibrationConfig::default());
        assert_eq!(
            analysis.errors,
            vec![CalibrationError::MissingSeparator {
                separator: Separator::Rs
            }]
        );
        assert_eq!(analysis.records.len(), PRINTABLE_LEN + 3);
    }

    #[test]
    fn dropped_keystroke_is_structural() {
        let probe: String = template::baseline_probe()
            .chars()
            .filter(|&c| c != '%')
            .collect();
        let analysis = analyse_baseline(&chars(&probe), &CalibrationConfig::default());
        assert!(matches!(
            analysis.errors.as_slice(),
            [CalibrationError::StructuralMismatch { round: Round::Baseline, .. }]
        ));
        assert!(analysis.records.is_empty());
    }

    #[test]
    fn unknown_short_separator_tail_is_structural() {
        let probe = format!("{}\u{1d}x\r", template::PRINTABLE);
        let analysis = analyse_baseline(&chars(&probe), &CalibrationConfig::default());
        assert!(matches!(
            analysis.errors.as_slice(),
            [CalibrationError::StructuralMismatch { round: Round::Baseline, .. }]
        ));
    }

    #[test]
    fn decimal_substitutes_are_recognised() {
        let probe = format!("{}0029002800300031\r", template::PRINTABLE);
        let analysis = analyse_baseline(&chars(&probe), &CalibrationConfig::default());
        assert!(analysis.errors.is_empty());
        assert!(analysis.decimal_substitutes);
        assert_eq!(analysis.separators[0], (Separator::Gs, "0029".to_string()));
        assert_eq!(analysis.separators[3], (Separator::Us, "0031".to_string()));
    }

    #[test]
    fn decimal_substitutes_can_be_disabled() {
        let mut config = CalibrationConfig::default();
        config.decimal_separators.enabled = false;
        let probe = format!("{}0029002800300031\r", template::PRINTABLE);
        let analysis = analyse_baseline(&chars(&probe), &config);
        assert!(analysis.errors.iter().all(|e| e.is_structural()));
        assert_eq!(analysis.errors.len(), 1);
    }

    #[test]
    fn lead_marks_following_cell_as_sequence() {
        // Replace '=' with a dead key and make '>' compose to ':'
        let mut probe = String::new();
        for c in template::printable() {
            match c {
                '=' => probe.push_str("\0´"),
                '>' => probe.push(':'),
                other => probe.push(other),
            }
        }
        probe.push_str("\u{1d}\u{1c}\u{1e}\u{1f}\r");
        let analysis = analyse_baseline(&chars(&probe), &CalibrationConfig::default());
        assert!(analysis.errors.is_empty());
        assert_eq!(analysis.leads, vec![('´', '=')]);
        assert!(analysis
            .records
            .contains(&(Observed::Sequence('´', ':'), '>')));
        assert!(!analysis.records.contains(&(Observed::Char(':'), '>')));
    }

    #[test]
    fn dead_key_round_yields_sequences_and_plain_reports() {
        // Host where '=' is dead key '´' that never composes
        let mut report = Vec::new();
        for p in template::printable() {
            report.extend(['\0', '´']);
            if p == '=' {
                report.extend(['\0', '´', '\0', '´']);
            } else {
                report.push(p);
                report.push(p);
            }
        }
        report.push('\r');
        let leads = BTreeMap::from([('´', '=')]);
        let records = analyse_dead_key(&report, '´', &leads).unwrap();
        assert!(records.contains(&(Observed::Sequence('´', 'a'), 'a')));
        assert!(records.contains(&(Observed::Char('a'), 'a')));
        assert!(records.contains(&(Observed::Lead('´'), '=')));
    }

    #[test]
    fn dead_key_round_rejects_report_without_lead() {
        let leads = BTreeMap::from([('´', '=')]);
        let probe = chars(&dead_key_probe('='));
        let err = analyse_dead_key(&probe, '´', &leads).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::StructuralMismatch { round: Round::DeadKey('´'), .. }
        ));
    }

    #[test]
    fn dead_key_round_rejects_unknown_lead() {
        let mut report = Vec::new();
        for p in template::printable() {
            report.extend(['\0', '´']);
            if p == '+' {
                report.extend(['\0', '`', '\0', '`']);
            } else {
                report.push(p);
                report.push(p);
            }
        }
        report.push('\r');
        let leads = BTreeMap::from([('´', '=')]);
        assert!(analyse_dead_key(&report, '´', &leads).is_err());
    }
}
