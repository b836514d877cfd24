// ********* Input data structures ***********
//
// The normalized batch produced by the interchange document parsers. It only
// lives for the duration of one import.

use std::fmt::Display;

use crate::ids::*;

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ImportBatch {
    pub contest_id: ContestId,
    /// The external identifier of the counting circle, for per-counting-circle
    /// channels only.
    pub counting_circle: Option<String>,
    /// Human readable description of the source documents (file names).
    pub source: String,
    pub message_ids: Vec<String>,
    pub results: Vec<CountingCircleResultEntry>,
    pub voting_cards: Vec<VotingCardSummary>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CountingCircleResultEntry {
    /// External identifier, as written in the document.
    pub counting_circle: String,
    pub content: ResultContent,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ResultContent {
    /// The channel explicitly delivered nothing for this counting circle.
    Empty,
    Business(BusinessResultSection),
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BusinessResultSection {
    pub business_id: PoliticalBusinessId,
    pub ballots: SectionBallots,
}

/// The ballots of one section. The variant is the type declared by the
/// document, which is not trusted to tell primary and secondary majority
/// elections apart.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SectionBallots {
    Vote(Vec<VoteBallot>),
    MajorityElection(Vec<MajorityElectionBallot>),
    ProportionalElection(Vec<ProportionalElectionBallot>),
}

impl SectionBallots {
    pub fn declared_type(&self) -> &'static str {
        match self {
            SectionBallots::Vote(_) => "vote",
            SectionBallots::MajorityElection(_) => "majority election",
            SectionBallots::ProportionalElection(_) => "proportional election",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SectionBallots::Vote(b) => b.len(),
            SectionBallots::MajorityElection(b) => b.len(),
            SectionBallots::ProportionalElection(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum BallotAnswer {
    Yes,
    No,
    Unspecified,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum TieBreakAnswer {
    Q1,
    Q2,
    Unspecified,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuestionAnswer {
    pub question_number: u32,
    pub answer: BallotAnswer,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TieBreakQuestionAnswer {
    pub question_number: u32,
    pub answer: TieBreakAnswer,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteBallot {
    pub ballot_id: BallotId,
    pub answers: Vec<QuestionAnswer>,
    pub tie_break_answers: Vec<TieBreakQuestionAnswer>,
}

/// A position on an election ballot.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum ElectionPosition {
    Empty,
    /// A free-text name that is not on the candidate list.
    WriteIn(String),
    Candidate(CandidateId),
}

impl ElectionPosition {
    pub fn is_empty(&self) -> bool {
        matches!(self, ElectionPosition::Empty)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MajorityElectionBallot {
    pub positions: Vec<ElectionPosition>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ProportionalElectionBallot {
    /// `EMPTY_LIST_ID` when the ballot was cast without a list.
    pub list: ListId,
    /// The list was cast in its original candidate order.
    pub unmodified: bool,
    pub positions: Vec<ElectionPosition>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct VotingCardSummary {
    /// External identifier, as written in the document.
    pub counting_circle: String,
    pub count_of_voters: u32,
    pub valid_voting_cards: u32,
    pub invalid_voting_cards: u32,
}

impl Display for VotingCardSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} voters, {} valid / {} invalid voting cards",
            self.counting_circle,
            self.count_of_voters,
            self.valid_voting_cards,
            self.invalid_voting_cards
        )
    }
}
