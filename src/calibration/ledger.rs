//! Conflict-tracking ledger for observed reports
//!
//! Every observation made during calibration is recorded together with the
//! canonical character it was observed for. Nothing is overwritten: an
//! observation that collects a second, different canonical candidate stays in
//! the ledger as a conflict until the session is finished.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Something the host reported during a probe
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Observed {
    /// A single plain code
    Char(char),
    /// A dead-key lead (reported after the NUL marker)
    Lead(char),
    /// The code reported right after a dead-key lead
    Sequence(char, char),
    /// A multi-character separator substitute
    Substitute(String),
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{:?}", c),
            Self::Lead(d) => write!(f, "dead key {:?}", d),
            Self::Sequence(d, c) => write!(f, "dead key {:?} + {:?}", d, c),
            Self::Substitute(s) => write!(f, "separator substitute {:?}", s),
        }
    }
}

/// Outcome of recording one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// First time this observation was seen
    New,
    /// Seen before with the same canonical target
    Duplicate,
    /// Seen before with a different canonical target
    Conflict,
}

/// Observation -> set of canonical candidates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingLedger {
    entries: BTreeMap<Observed, BTreeSet<char>>,
}

impl MappingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `observed` was reported where `canonical` was expected
    pub fn record(&mut self, observed: Observed, canonical: char) -> Recorded {
        let candidates = self.entries.entry(observed).or_default();
        let was_empty = candidates.is_empty();
        if !candidates.insert(canonical) {
            Recorded::Duplicate
        } else if was_empty {
            Recorded::New
        } else {
            Recorded::Conflict
        }
    }

    /// Whether recording `observed -> canonical` would leave the ledger unchanged
    pub fn agrees(&self, observed: &Observed, canonical: char) -> bool {
        self.entries
            .get(observed)
            .is_some_and(|c| c.len() == 1 && c.contains(&canonical))
    }

    pub fn candidates(&self, observed: &Observed) -> Option<&BTreeSet<char>> {
        self.entries.get(observed)
    }

    /// The single canonical target of `observed`, if it has exactly one
    pub fn resolve(&self, observed: &Observed) -> Option<char> {
        self.entries.get(observed).and_then(|c| {
            if c.len() == 1 {
                c.iter().next().copied()
            } else {
                None
            }
        })
    }

    /// Observations with more than one canonical candidate, in sorted order
    pub fn conflicts(&self) -> impl Iterator<Item = (&Observed, &BTreeSet<char>)> {
        self.entries.iter().filter(|(_, c)| c.len() > 1)
    }

    /// Observations with exactly one canonical candidate, in sorted order
    pub fn resolved(&self) -> impl Iterator<Item = (&Observed, char)> {
        self.entries.iter().filter_map(|(o, c)| {
            if c.len() == 1 {
                c.iter().next().map(|t| (o, *t))
            } else {
                None
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
