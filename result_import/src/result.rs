use std::collections::BTreeMap;

use crate::config::ImportChannel;
use crate::domain::PoliticalBusinessType;
use crate::ids::ResultKey;
use crate::tally::ResultTally;

/// Workflow state of a counting-circle result.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum CountingCircleResultState {
    Initial,
    SubmissionOngoing,
    SubmissionDone,
    ReadyForCorrection,
    CorrectionDone,
    FlaggedForCorrection,
    AuditedTentatively,
    Plausibilised,
}

impl CountingCircleResultState {
    /// Imported data may only be merged into results in these states.
    pub fn is_merge_eligible(&self) -> bool {
        use CountingCircleResultState::*;
        matches!(
            self,
            Initial | SubmissionOngoing | ReadyForCorrection | FlaggedForCorrection
        )
    }

    /// States reached after the audit. They become final once the testing
    /// phase of the contest has ended.
    pub fn is_audited(&self) -> bool {
        matches!(
            self,
            CountingCircleResultState::AuditedTentatively
                | CountingCircleResultState::Plausibilised
        )
    }

    /// One step backwards towards a merge-eligible state.
    /// `None` if the state is already merge-eligible.
    pub fn step_back(&self) -> Option<CountingCircleResultState> {
        use CountingCircleResultState::*;
        match self {
            Plausibilised => Some(AuditedTentatively),
            AuditedTentatively => Some(SubmissionDone),
            SubmissionDone | CorrectionDone => Some(FlaggedForCorrection),
            Initial | SubmissionOngoing | ReadyForCorrection | FlaggedForCorrection => None,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CountingCircleResult {
    pub key: ResultKey,
    pub business_type: PoliticalBusinessType,
    pub state: CountingCircleResultState,
    /// The imported sub-total per channel. Conventionally counted sub-totals
    /// are maintained elsewhere.
    pub imported: BTreeMap<ImportChannel, ResultTally>,
}

impl CountingCircleResult {
    pub fn new(key: ResultKey, business_type: PoliticalBusinessType) -> CountingCircleResult {
        CountingCircleResult {
            key,
            business_type,
            state: CountingCircleResultState::Initial,
            imported: BTreeMap::new(),
        }
    }

    pub fn imported_tally(&self, channel: ImportChannel) -> Option<&ResultTally> {
        self.imported.get(&channel)
    }
}

#[cfg(test)]
mod tests {
    use super::CountingCircleResultState::*;

    #[test]
    fn step_back_reaches_a_merge_eligible_state() {
        for state in [
            Initial,
            SubmissionOngoing,
            SubmissionDone,
            ReadyForCorrection,
            CorrectionDone,
            FlaggedForCorrection,
            AuditedTentatively,
            Plausibilised,
        ] {
            let mut cur = state;
            let mut steps = 0;
            while let Some(next) = cur.step_back() {
                cur = next;
                steps += 1;
            }
            assert!(cur.is_merge_eligible(), "{:?} ended in {:?}", state, cur);
            assert!(steps <= 3);
        }
    }

    #[test]
    fn plausibilised_walks_back_through_the_audit() {
        assert_eq!(Plausibilised.step_back(), Some(AuditedTentatively));
        assert_eq!(AuditedTentatively.step_back(), Some(SubmissionDone));
        assert_eq!(SubmissionDone.step_back(), Some(FlaggedForCorrection));
        assert_eq!(CorrectionDone.step_back(), Some(FlaggedForCorrection));
        assert_eq!(ReadyForCorrection.step_back(), None);
    }
}
