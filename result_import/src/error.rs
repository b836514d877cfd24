use snafu::Snafu;

use crate::config::{ImportChannel, ImportScope};
use crate::domain::PoliticalBusinessType;
use crate::ids::{
    BallotId, CandidateId, ContestId, CountingCircleId, ImportId, ListId, PoliticalBusinessId,
};
use crate::result::CountingCircleResultState;

/// The families of failures an import can run into.
///
/// Apart from store conflicts, resubmitting the same batch fails the same way.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ErrorCategory {
    /// A reference to a business, candidate, list, question or ballot that
    /// does not exist, or a batch targeting the wrong scope.
    Reference,
    /// Missing, extra or duplicated counting circles, results or voting cards.
    Coverage,
    /// Results that cannot be modified anymore, or history operations that
    /// have nothing to work on.
    StatePrecondition,
    /// Ballots that violate the rules of their business type.
    DataShape,
    /// The store rejected the commit.
    Store,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ImportError {
    // ***** Reference errors *****
    #[snafu(display("Unknown contest {contest}"))]
    UnknownContest { contest: ContestId },

    #[snafu(display("Unknown counting circle {counting_circle} for the import scope"))]
    UnknownCountingCircle { counting_circle: String },

    #[snafu(display("Political business {business} (counting circle {counting_circle}) is unknown"))]
    UnknownPoliticalBusiness {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
    },

    #[snafu(display(
        "Political business {business} (counting circle {counting_circle}) was delivered as a {declared} result but is a {resolved:?}"
    ))]
    BusinessTypeMismatch {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
        declared: String,
        resolved: PoliticalBusinessType,
    },

    #[snafu(display("Political business {business} is not held in counting circle {counting_circle}"))]
    BusinessNotInCountingCircle {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
    },

    #[snafu(display("Ballot {ballot} does not belong to vote {business} (counting circle {counting_circle})"))]
    UnknownBallot {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
        ballot: BallotId,
    },

    #[snafu(display(
        "Question {question_number} does not exist on ballot {ballot} of vote {business} (counting circle {counting_circle})"
    ))]
    UnknownQuestion {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
        ballot: BallotId,
        question_number: u32,
    },

    #[snafu(display(
        "Tie-break question {question_number} does not exist on ballot {ballot} of vote {business} (counting circle {counting_circle})"
    ))]
    UnknownTieBreakQuestion {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
        ballot: BallotId,
        question_number: u32,
    },

    #[snafu(display("Candidate {candidate} does not belong to election {business} (counting circle {counting_circle})"))]
    UnknownCandidate {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
        candidate: CandidateId,
    },

    #[snafu(display("List {list} does not belong to election {business} (counting circle {counting_circle})"))]
    UnknownList {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
        list: ListId,
    },

    #[snafu(display("The batch targets {found} but the import scope is {expected}"))]
    ScopeMismatch { expected: String, found: String },

    // ***** Coverage errors *****
    #[snafu(display("A per-counting-circle import requires a counting circle"))]
    MissingCountingCircleScope {},

    #[snafu(display("A whole-contest import cannot be scoped to counting circle {counting_circle}"))]
    UnexpectedCountingCircleScope { counting_circle: String },

    #[snafu(display("Counting circle {counting_circle} does not support the {channel} channel"))]
    ChannelNotSupported {
        counting_circle: CountingCircleId,
        channel: ImportChannel,
    },

    #[snafu(display("No voting cards were delivered for counting circle {counting_circle}"))]
    MissingVotingCards { counting_circle: CountingCircleId },

    #[snafu(display("Voting cards were delivered twice for counting circle {counting_circle}"))]
    DuplicateVotingCards { counting_circle: CountingCircleId },

    #[snafu(display("Results for {business} were delivered twice for counting circle {counting_circle}"))]
    DuplicateResult {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
    },

    #[snafu(display(
        "Counting circle coverage mismatch: {accepted} accepted, {voting_cards} voting card summaries, {expected} expected (missing: {missing:?}, unexpected: {unexpected:?})"
    ))]
    CoverageMismatch {
        accepted: usize,
        voting_cards: usize,
        expected: usize,
        missing: Vec<CountingCircleId>,
        unexpected: Vec<CountingCircleId>,
    },

    // ***** State precondition errors *****
    #[snafu(display(
        "The result of {business} in counting circle {counting_circle} is {state:?} and the testing phase has ended"
    ))]
    ResultFinalized {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
        state: CountingCircleResultState,
    },

    #[snafu(display(
        "Political business {business} was imported for counting circle {counting_circle} before and is missing from the new import"
    ))]
    PreviouslyImportedBusinessMissing {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
    },

    #[snafu(display("There is no import to delete for {scope}"))]
    NoImportToDelete { scope: ImportScope },

    #[snafu(display("Import {import} of {scope} has no predecessor to revert to"))]
    NothingToRevertTo { scope: ImportScope, import: ImportId },

    // ***** Data shape errors *****
    #[snafu(display(
        "A ballot of {business} (counting circle {counting_circle}) has {positions} filled positions but only {mandates} mandates"
    ))]
    PositionsExceedMandates {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
        positions: usize,
        mandates: u32,
    },

    #[snafu(display(
        "Candidate {candidate} appears more than twice on a ballot of {business} (counting circle {counting_circle})"
    ))]
    TooManyAccumulations {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
        candidate: CandidateId,
    },

    #[snafu(display("Write-ins are not allowed for {business} (counting circle {counting_circle})"))]
    WriteInNotAllowed {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
    },

    #[snafu(display("An unmodified ballot of {business} (counting circle {counting_circle}) has no list"))]
    UnmodifiedBallotWithoutList {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
    },

    #[snafu(display(
        "Question {question_number} is answered twice on a ballot {ballot} of {business} (counting circle {counting_circle})"
    ))]
    DuplicateAnswer {
        business: PoliticalBusinessId,
        counting_circle: CountingCircleId,
        ballot: BallotId,
        question_number: u32,
    },

    // ***** Store errors *****
    #[snafu(display("The history of {scope} moved on: expected latest {expected:?}, found {found:?}"))]
    ChainConflict {
        scope: ImportScope,
        expected: Option<ImportId>,
        found: Option<ImportId>,
    },
}

impl ImportError {
    pub fn category(&self) -> ErrorCategory {
        use ImportError::*;
        match self {
            UnknownContest { .. }
            | UnknownCountingCircle { .. }
            | UnknownPoliticalBusiness { .. }
            | BusinessTypeMismatch { .. }
            | BusinessNotInCountingCircle { .. }
            | UnknownBallot { .. }
            | UnknownQuestion { .. }
            | UnknownTieBreakQuestion { .. }
            | UnknownCandidate { .. }
            | UnknownList { .. }
            | ScopeMismatch { .. } => ErrorCategory::Reference,
            MissingCountingCircleScope { .. }
            | UnexpectedCountingCircleScope { .. }
            | ChannelNotSupported { .. }
            | MissingVotingCards { .. }
            | DuplicateVotingCards { .. }
            | DuplicateResult { .. }
            | CoverageMismatch { .. } => ErrorCategory::Coverage,
            ResultFinalized { .. }
            | PreviouslyImportedBusinessMissing { .. }
            | NoImportToDelete { .. }
            | NothingToRevertTo { .. } => ErrorCategory::StatePrecondition,
            PositionsExceedMandates { .. }
            | TooManyAccumulations { .. }
            | WriteInNotAllowed { .. }
            | UnmodifiedBallotWithoutList { .. }
            | DuplicateAnswer { .. } => ErrorCategory::DataShape,
            ChainConflict { .. } => ErrorCategory::Store,
        }
    }

    /// Only a store conflict may succeed when the same batch is submitted again.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Store
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
