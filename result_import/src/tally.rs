// ******** Tally deltas *********
//
// What a builder produces out of the ballots of one section. A delta is never
// written directly: it is merged into the imported sub-total of a
// counting-circle result once the whole batch has been validated.

use std::collections::BTreeMap;

use crate::domain::PoliticalBusinessType;
use crate::ids::*;

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct QuestionTally {
    pub yes: u32,
    pub no: u32,
    pub unspecified: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct TieBreakQuestionTally {
    pub q1: u32,
    pub q2: u32,
    pub unspecified: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct BallotTally {
    pub total_ballots: u32,
    pub blank_ballots: u32,
    pub questions: BTreeMap<u32, QuestionTally>,
    pub tie_break_questions: BTreeMap<u32, TieBreakQuestionTally>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct VoteTally {
    pub ballots: BTreeMap<BallotId, BallotTally>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct MajorityElectionTally {
    pub total_ballots: u32,
    pub blank_ballots: u32,
    pub empty_vote_count: u32,
    pub invalid_vote_count: u32,
    pub write_in_count: u32,
    pub candidates: BTreeMap<CandidateId, u32>,
    /// Raw write-in names, kept for the manual write-in mapping.
    pub write_ins: BTreeMap<String, u32>,
}

impl MajorityElectionTally {
    /// Elections without invalid votes report them as empty votes.
    pub fn fold_invalid_votes(&mut self) {
        self.empty_vote_count += self.invalid_vote_count;
        self.invalid_vote_count = 0;
    }

    pub fn candidate_votes(&self) -> u32 {
        self.candidates.values().sum()
    }
}

/// A majority election result holds the tally of its secondary elections.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct MajorityElectionResultTally {
    pub primary: MajorityElectionTally,
    pub secondaries: BTreeMap<PoliticalBusinessId, MajorityElectionTally>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ListTally {
    pub unmodified_ballots: u32,
    pub unmodified_list_votes: u32,
    pub unmodified_blank_rows: u32,
    pub modified_ballots: u32,
    pub modified_list_votes: u32,
    pub modified_blank_rows: u32,
}

/// Modified ballots that were cast without a list.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct WithoutListTally {
    pub modified_ballots: u32,
    pub blank_rows: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct CandidateTally {
    pub unmodified_votes: u32,
    pub modified_votes: u32,
    pub votes_from_accumulations: u32,
    /// Votes from ballots of another list than the candidate's own.
    pub votes_on_other_lists: u32,
    /// Votes per list of the ballot they were cast on (`None`: no list).
    pub vote_sources: BTreeMap<Option<ListId>, u32>,
}

impl CandidateTally {
    pub fn total_votes(&self) -> u32 {
        self.unmodified_votes + self.modified_votes
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ProportionalElectionTally {
    pub total_ballots: u32,
    pub blank_ballots: u32,
    pub invalid_ballots: u32,
    pub lists: BTreeMap<ListId, ListTally>,
    pub without_list: WithoutListTally,
    pub candidates: BTreeMap<CandidateId, CandidateTally>,
}

/// The imported sub-total of one counting-circle result.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ResultTally {
    Vote(VoteTally),
    MajorityElection(MajorityElectionResultTally),
    ProportionalElection(ProportionalElectionTally),
}

impl ResultTally {
    /// The zero-valued tally a result of the given type starts from.
    pub fn empty(business_type: PoliticalBusinessType) -> ResultTally {
        match business_type {
            PoliticalBusinessType::Vote => ResultTally::Vote(VoteTally::default()),
            PoliticalBusinessType::MajorityElection
            | PoliticalBusinessType::SecondaryMajorityElection => {
                ResultTally::MajorityElection(MajorityElectionResultTally::default())
            }
            PoliticalBusinessType::ProportionalElection => {
                ResultTally::ProportionalElection(ProportionalElectionTally::default())
            }
        }
    }

    /// The type of the business owning the result.
    pub fn business_type(&self) -> PoliticalBusinessType {
        match self {
            ResultTally::Vote(_) => PoliticalBusinessType::Vote,
            ResultTally::MajorityElection(_) => PoliticalBusinessType::MajorityElection,
            ResultTally::ProportionalElection(_) => PoliticalBusinessType::ProportionalElection,
        }
    }
}

/// A delta produced by one builder, before it is merged into its result.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TallyDelta {
    Vote(VoteTally),
    MajorityElection(MajorityElectionTally),
    SecondaryMajorityElection(PoliticalBusinessId, MajorityElectionTally),
    ProportionalElection(ProportionalElectionTally),
}

impl TallyDelta {
    /// Places the delta into the tally of its owning result. The tally has
    /// been created for the resolved owner type, so any other combination is
    /// a bug in the caller.
    pub fn merge_into(self, tally: &mut ResultTally) {
        match (self, tally) {
            (TallyDelta::Vote(delta), ResultTally::Vote(t)) => *t = delta,
            (TallyDelta::MajorityElection(delta), ResultTally::MajorityElection(t)) => {
                t.primary = delta
            }
            (
                TallyDelta::SecondaryMajorityElection(id, delta),
                ResultTally::MajorityElection(t),
            ) => {
                t.secondaries.insert(id, delta);
            }
            (TallyDelta::ProportionalElection(delta), ResultTally::ProportionalElection(t)) => {
                *t = delta
            }
            (delta, tally) => unreachable!(
                "merge_into: delta {:?} does not fit into tally {:?}",
                delta, tally
            ),
        }
    }
}
