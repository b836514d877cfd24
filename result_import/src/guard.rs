use std::collections::BTreeSet;

use log::{debug, info};
use snafu::ensure;

use crate::error::*;
use crate::ids::ResultKey;
use crate::result::{CountingCircleResult, CountingCircleResultState};

/// A state change applied to a result before imported data was merged.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct StateTransition {
    pub key: ResultKey,
    pub from: CountingCircleResultState,
    pub to: CountingCircleResultState,
}

/// Makes sure every result touched by an import is in a state that accepts
/// new data.
///
/// Results that were already submitted or audited are walked back to a
/// merge-eligible state. Each result is queued at most once per import, no
/// matter how many sections or channels touch it.
#[derive(Debug, Clone)]
pub struct StatePreconditionGuard {
    testing_phase_ended: bool,
    queued: BTreeSet<ResultKey>,
    transitions: Vec<StateTransition>,
}

impl StatePreconditionGuard {
    pub fn new(testing_phase_ended: bool) -> StatePreconditionGuard {
        StatePreconditionGuard {
            testing_phase_ended,
            queued: BTreeSet::new(),
            transitions: Vec::new(),
        }
    }

    /// Returns true if the result had to be reset and was not queued yet.
    pub fn ensure_mutable(&mut self, result: &mut CountingCircleResult) -> ImportResult<bool> {
        ensure!(
            !(self.testing_phase_ended && result.state.is_audited()),
            ResultFinalizedSnafu {
                business: result.key.business_id.clone(),
                counting_circle: result.key.counting_circle_id.clone(),
                state: result.state,
            }
        );
        if result.state.is_merge_eligible() {
            debug!("ensure_mutable: {} is {:?}", result.key, result.state);
            return Ok(false);
        }
        while let Some(previous) = result.state.step_back() {
            self.transitions.push(StateTransition {
                key: result.key.clone(),
                from: result.state,
                to: previous,
            });
            result.state = previous;
        }
        info!(
            "ensure_mutable: {} was reset to {:?}",
            result.key, result.state
        );
        Ok(self.queued.insert(result.key.clone()))
    }

    pub fn is_queued(&self, key: &ResultKey) -> bool {
        self.queued.contains(key)
    }

    /// The results whose state was changed, in key order.
    pub fn queued(&self) -> impl Iterator<Item = &ResultKey> {
        self.queued.iter()
    }

    pub fn into_transitions(self) -> Vec<StateTransition> {
        self.transitions
    }
}
