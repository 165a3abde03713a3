//! Calibration tokens and the session state they carry
//!
//! A token is one round-trip of the probing protocol. It names the probe the
//! caller should scan next and carries everything the engine has learnt so
//! far, so [`Calibrator::calibrate`](super::Calibrator::calibrate) can be a
//! pure function from (report, token) to token.

use super::data::CalibrationData;
use super::information::Information;
use super::ledger::MappingLedger;
use crate::error::{CalibrationError, Round};
use crate::keyboard::template::{self, Separator};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// Session state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationState {
    /// Waiting for the baseline probe report
    AwaitingBaseline,
    /// Waiting for the report of dead-key round `n` (1-based)
    AwaitingDeadKey(usize),
    /// Finished with calibration data
    Succeeded,
    /// Finished without calibration data
    Failed(FailureReason),
}

impl CalibrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// Why a session failed, by the most fundamental error recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The baseline could not be aligned with the template
    StructuralMismatch,
    /// A separator slot had no report
    MissingSeparator,
    /// Some report resolves to more than one canonical character
    AmbiguousMapping,
    /// A dead key was not resolved within the round budget
    UnresolvedDeadKey,
}

impl FailureReason {
    /// Pick the reason for a list of errors, or `None` if there are none.
    pub(crate) fn from_errors(errors: &[CalibrationError]) -> Option<Self> {
        let has = |f: fn(&CalibrationError) -> bool| errors.iter().any(f);

        if has(|e| {
            matches!(
                e,
                CalibrationError::StructuralMismatch {
                    round: Round::Baseline,
                    ..
                }
            )
        }) {
            Some(Self::StructuralMismatch)
        } else if has(|e| matches!(e, CalibrationError::MissingSeparator { .. })) {
            Some(Self::MissingSeparator)
        } else if has(|e| matches!(e, CalibrationError::AmbiguousMapping { .. })) {
            Some(Self::AmbiguousMapping)
        } else if has(|e| matches!(e, CalibrationError::UnresolvedDeadKey { .. })) {
            Some(Self::UnresolvedDeadKey)
        } else if errors.is_empty() {
            None
        } else {
            Some(Self::StructuralMismatch)
        }
    }
}

/// Which probe barcode the caller should present to the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeRequest {
    /// The fixed baseline template
    Baseline,
    /// The dead-key probe for `lead`, first seen where `canonical` was typed
    DeadKey { lead: char, canonical: char },
}

impl ProbeRequest {
    /// Data to encode in the probe barcode
    pub fn barcode_data(&self) -> String {
        match self {
            Self::Baseline => template::baseline_probe(),
            Self::DeadKey { canonical, .. } => template::dead_key_probe(*canonical),
        }
    }

    /// Barcode data split to fit barcodes of the given capacity
    pub fn segments(&self, size: ProbeSize) -> Vec<String> {
        let data = self.barcode_data();
        match size {
            ProbeSize::Automatic => vec![data],
            ProbeSize::MaxCharacters(max) => {
                let chars: Vec<char> = data.chars().collect();
                chars
                    .chunks(max.max(1))
                    .map(|chunk| chunk.iter().collect())
                    .collect()
            }
        }
    }
}

/// Capacity hint for probe barcodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeSize {
    /// One barcode per probe
    #[default]
    Automatic,
    /// At most this many characters per barcode
    MaxCharacters(usize),
}

/// State carried from round to round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Session {
    /// Every observation made so far
    pub ledger: MappingLedger,
    /// Dead-key lead -> canonical character it was first seen at
    pub leads: BTreeMap<char, char>,
    /// Leads still waiting for a dead-key round
    pub queue: VecDeque<char>,
    /// Leads whose dead-key round completed
    pub resolved: BTreeSet<char>,
    /// Structural problems from dead-key rounds, kept until the lead resolves
    pub deferred: Vec<(char, CalibrationError)>,
    /// Dead-key rounds taken
    pub rounds_used: usize,
    /// Dead-key rounds allowed
    pub budget: usize,
    /// Separator reports from the baseline
    pub separators: Vec<(Separator, String)>,
}

/// One round-trip of the calibration protocol
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationToken {
    pub(crate) state: CalibrationState,
    pub(crate) request: Option<ProbeRequest>,
    pub(crate) size: ProbeSize,
    pub(crate) session: Session,
    pub(crate) errors: Vec<CalibrationError>,
    pub(crate) information: Vec<Information>,
    pub(crate) data: Option<Arc<CalibrationData>>,
}

impl CalibrationToken {
    /// A fresh token requesting the baseline probe
    pub(crate) fn baseline(size: ProbeSize) -> Self {
        Self {
            state: CalibrationState::AwaitingBaseline,
            request: Some(ProbeRequest::Baseline),
            size,
            session: Session::default(),
            errors: Vec::new(),
            information: Vec::new(),
            data: None,
        }
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    /// The probe to scan next; `None` once the session is finished
    pub fn request(&self) -> Option<ProbeRequest> {
        self.request
    }

    /// Probe barcode data for the pending request, split by the size hint
    pub fn barcode_segments(&self) -> Vec<String> {
        self.request
            .map(|r| r.segments(self.size))
            .unwrap_or_default()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn errors(&self) -> &[CalibrationError] {
        &self.errors
    }

    pub fn information(&self) -> &[Information] {
        &self.information
    }

    /// Calibration data, present only after success
    pub fn calibration_data(&self) -> Option<&Arc<CalibrationData>> {
        self.data.as_ref()
    }

    /// Dead-key rounds taken so far
    pub fn dead_key_rounds(&self) -> usize {
        self.session.rounds_used
    }

    /// Total probe rounds taken so far, baseline included
    pub fn rounds(&self) -> usize {
        match self.state {
            CalibrationState::AwaitingBaseline => 0,
            _ => 1 + self.session.rounds_used,
        }
    }

    /// Dead-key leads discovered, with the canonical character of each
    pub fn dead_key_leads(&self) -> impl Iterator<Item = (char, char)> + '_ {
        self.session.leads.iter().map(|(&l, &c)| (l, c))
    }
}

/// Cooperative generator over a session's pending probe requests.
///
/// Each token handed out must be calibrated and fed back with
/// [`resume`](Self::resume) before the next one appears:
///
/// ```
/// use scanner_calibration::calibration::{Calibrator, ProbeSize};
/// use scanner_calibration::keyboard::LayoutProfile;
///
/// let calibrator = Calibrator::new();
/// let host = LayoutProfile::baseline();
/// let mut tokens = calibrator.calibration_tokens(ProbeSize::Automatic);
/// while let Some(token) = tokens.next() {
///     let data = token.request().unwrap().barcode_data();
///     let report = host.type_text(&data);
///     tokens.resume(calibrator.calibrate(&report, token));
/// }
/// assert!(tokens.outcome().unwrap().calibration_data().is_some());
/// ```
#[derive(Debug)]
pub struct CalibrationTokens {
    pending: Option<CalibrationToken>,
    last: Option<CalibrationToken>,
}

impl CalibrationTokens {
    pub(crate) fn new(first: CalibrationToken) -> Self {
        Self {
            pending: Some(first),
            last: None,
        }
    }

    /// Feed back a calibrated token; a non-terminal one becomes the next item
    pub fn resume(&mut self, token: CalibrationToken) {
        if !token.is_terminal() {
            self.pending = Some(token.clone());
        }
        self.last = Some(token);
    }

    /// The most recently resumed token
    pub fn outcome(&self) -> Option<&CalibrationToken> {
        self.last.as_ref()
    }

    pub fn into_outcome(self) -> Option<CalibrationToken> {
        self.last
    }
}

impl Iterator for CalibrationTokens {
    type Item = CalibrationToken;

    fn next(&mut self) -> Option<Self::Item> {
        self.pending.take()
    }
}
