//! Scanner layout calibration
//!
//! A session starts with the baseline probe. Every dead key the host reveals
//! in the baseline gets its own dead-key round, bounded by a round budget.
//! [`Calibrator::calibrate`] is the only transition: it takes the host report
//! for the token's pending probe and returns the next token.

pub mod data;
pub mod information;
pub mod ledger;
mod probe;
pub mod token;

pub use data::{CalibrationData, CharacterMap, DeadKeyTable, SeparatorEntry, SeparatorTable};
pub use information::{Information, InformationLevel};
pub use ledger::{MappingLedger, Observed, Recorded};
pub use token::{
    CalibrationState, CalibrationToken, CalibrationTokens, FailureReason, ProbeRequest, ProbeSize,
};

use crate::config::CalibrationConfig;
use crate::error::CalibrationError;
use std::sync::Arc;

/// Drives calibration sessions with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Start a session. The first token always requests the baseline probe.
    pub fn calibration_tokens(&self, size: ProbeSize) -> CalibrationTokens {
        CalibrationTokens::new(CalibrationToken::baseline(size))
    }

    /// Run a whole session, asking `scan` for the host report of each token.
    ///
    /// `scan` receives the token whose probe should be scanned and returns
    /// everything the host reported for it, segments concatenated.
    pub fn run<F>(&self, size: ProbeSize, mut scan: F) -> CalibrationToken
    where
        F: FnMut(&CalibrationToken) -> Vec<char>,
    {
        let mut tokens = self.calibration_tokens(size);
        while let Some(token) = tokens.next() {
            let observed = scan(&token);
            tokens.resume(self.calibrate(&observed, token));
        }
        tokens
            .into_outcome()
            .unwrap_or_else(|| CalibrationToken::baseline(size))
    }

    /// Apply the host report for the token's pending probe.
    pub fn calibrate(&self, observed: &[char], token: CalibrationToken) -> CalibrationToken {
        match token.state {
            CalibrationState::Succeeded | CalibrationState::Failed(_) => {
                self.resubmitted_after_finish(observed, token)
            }
            CalibrationState::AwaitingBaseline => self.baseline_round(observed, token),
            CalibrationState::AwaitingDeadKey(_) => {
                let current = match token.request {
                    Some(ProbeRequest::DeadKey { lead, .. }) => Some(lead),
                    _ => None,
                };
                match probe::opening_lead(observed) {
                    Some(lead)
                        if Some(lead) != current && token.session.resolved.contains(&lead) =>
                    {
                        self.resubmitted_dead_key(observed, lead, token)
                    }
                    _ => self.dead_key_round(observed, token),
                }
            }
        }
    }

    fn baseline_round(&self, observed: &[char], mut token: CalibrationToken) -> CalibrationToken {
        log::debug!("Baseline round: {} codes reported", observed.len());

        let analysis = probe::analyse_baseline(observed, &self.config);
        // Aligned observations enter the ledger even when the round fails
        for (observed, canonical) in analysis.records {
            token.session.ledger.record(observed, canonical);
        }
        if !analysis.errors.is_empty() {
            token.errors.extend(analysis.errors);
            return self.finish(token);
        }

        let session = &mut token.session;
        session.separators = analysis.separators;
        if analysis.decimal_substitutes {
            token.information.push(Information::info(
                "Separators",
                "Host reports separators as decimal substitutes",
            ));
        }

        for (lead, canonical) in analysis.leads {
            session.leads.insert(lead, canonical);
            let ambiguous = session
                .ledger
                .candidates(&Observed::Lead(lead))
                .is_some_and(|c| c.len() > 1);
            if !ambiguous {
                session.queue.push_back(lead);
            }
        }

        let scheduled = session.queue.len();
        session.budget = if scheduled > self.config.max_dead_key_rounds {
            log::warn!(
                "{} dead keys exceed the limit of {} rounds",
                scheduled,
                self.config.max_dead_key_rounds
            );
            0
        } else {
            (scheduled + self.config.retry_rounds).min(self.config.max_dead_key_rounds)
        };

        token.information.push(Information::ok(
            "Baseline",
            format!(
                "{} observations, {} dead key(s)",
                session.ledger.len(),
                session.leads.len()
            ),
        ));

        self.advance(token)
    }

    fn dead_key_round(&self, observed: &[char], mut token: CalibrationToken) -> CalibrationToken {
        let Some(ProbeRequest::DeadKey { lead, .. }) = token.request else {
            return self.finish(token);
        };
        let session = &mut token.session;
        session.rounds_used += 1;
        log::debug!(
            "Dead-key round {} for {:?}: {} codes reported",
            session.rounds_used,
            lead,
            observed.len()
        );

        match probe::analyse_dead_key(observed, lead, &session.leads) {
            Ok(records) => {
                let count = records.len();
                for (observed, canonical) in records {
                    session.ledger.record(observed, canonical);
                }
                session.resolved.insert(lead);
                session.deferred.retain(|(l, _)| *l != lead);
                token.information.push(Information::ok(
                    format!("Dead key {:?}", lead),
                    format!("{} observations", count),
                ));
            }
            Err(err) => {
                log::warn!("Dead-key round for {:?} rejected: {}", lead, err);
                token
                    .information
                    .push(Information::warning(format!("Dead key {:?}", lead), err.to_string()));
                session.deferred.push((lead, err));
                session.queue.push_back(lead);
            }
        }

        self.advance(token)
    }

    /// A dead-key probe for an already resolved lead arrived again.
    /// Budget and pending request stay as they are.
    fn resubmitted_dead_key(
        &self,
        observed: &[char],
        lead: char,
        mut token: CalibrationToken,
    ) -> CalibrationToken {
        let session = &mut token.session;
        let note = match probe::analyse_dead_key(observed, lead, &session.leads) {
            Ok(records) => {
                let changed = records
                    .into_iter()
                    .map(|(observed, canonical)| session.ledger.record(observed, canonical))
                    .filter(|r| *r != Recorded::Duplicate)
                    .count();
                if changed == 0 {
                    "repeated probe is consistent".to_string()
                } else {
                    format!("repeated probe added {} observation(s)", changed)
                }
            }
            Err(err) => format!("repeated probe ignored: {}", err),
        };
        log::debug!("Resubmission for {:?}: {}", lead, note);
        token
            .information
            .push(Information::info(format!("Dead key {:?}", lead), note));
        token
    }

    /// A report arrived for a finished session. The outcome never changes.
    fn resubmitted_after_finish(
        &self,
        observed: &[char],
        mut token: CalibrationToken,
    ) -> CalibrationToken {
        let session = &token.session;
        let records = match probe::opening_lead(observed) {
            Some(lead) if session.leads.contains_key(&lead) => {
                probe::analyse_dead_key(observed, lead, &session.leads).ok()
            }
            _ => {
                let analysis = probe::analyse_baseline(observed, &self.config);
                analysis.errors.is_empty().then_some(analysis.records)
            }
        };
        let agrees = records.is_some_and(|records| {
            records
                .iter()
                .all(|(observed, canonical)| session.ledger.agrees(observed, *canonical))
        });

        let note = if agrees {
            "Session already finished; report agrees with the result"
        } else {
            "Session already finished; report ignored"
        };
        token.information.push(Information::info("Resubmission", note));
        token
    }

    /// Schedule the next dead-key round or finish the session.
    fn advance(&self, mut token: CalibrationToken) -> CalibrationToken {
        let session = &mut token.session;
        if session.rounds_used < session.budget {
            if let Some(lead) = session.queue.pop_front() {
                let canonical = session.leads.get(&lead).copied().unwrap_or(lead);
                token.state = CalibrationState::AwaitingDeadKey(session.rounds_used + 1);
                token.request = Some(ProbeRequest::DeadKey { lead, canonical });
                log::debug!(
                    "Requesting dead-key round {} for {:?}",
                    session.rounds_used + 1,
                    lead
                );
                return token;
            }
        }
        self.finish(token)
    }

    fn finish(&self, mut token: CalibrationToken) -> CalibrationToken {
        token.request = None;
        let session = &mut token.session;

        for (observed, candidates) in session.ledger.conflicts() {
            token.errors.push(CalibrationError::AmbiguousMapping {
                observed: observed.to_string(),
                candidates: candidates.iter().copied().collect(),
            });
        }

        for (&lead, &canonical) in &session.leads {
            let ambiguous = session
                .ledger
                .candidates(&Observed::Lead(lead))
                .is_some_and(|c| c.len() > 1);
            if ambiguous || session.resolved.contains(&lead) {
                continue;
            }
            token.errors.extend(
                session
                    .deferred
                    .iter()
                    .filter(|(l, _)| *l == lead)
                    .map(|(_, err)| err.clone()),
            );
            token
                .errors
                .push(CalibrationError::UnresolvedDeadKey { lead, canonical });
        }
        session.queue.clear();
        session.deferred.clear();

        match FailureReason::from_errors(&token.errors) {
            Some(reason) => {
                log::warn!(
                    "Calibration failed ({:?}) with {} error(s)",
                    reason,
                    token.errors.len()
                );
                token.information.push(Information::error(
                    "Calibration",
                    format!("failed with {} error(s)", token.errors.len()),
                ));
                token.state = CalibrationState::Failed(reason);
            }
            None => {
                let data = CalibrationData::from_ledger(
                    &session.ledger,
                    &session.leads,
                    SeparatorTable::new(session.separators.clone()),
                );
                log::info!(
                    "Calibration succeeded after {} round(s): {} substitution(s), {} dead key(s)",
                    1 + session.rounds_used,
                    data.character_map().len(),
                    session.leads.len()
                );
                token.state = CalibrationState::Succeeded;
                token.data = Some(Arc::new(data));
            }
        }
        token
    }
}
