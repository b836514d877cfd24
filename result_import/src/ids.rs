use std::fmt::Display;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> $name {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> $name {
                $name(id.to_string())
            }
        }
    };
}

string_id!(
    /// The contest (election event) an import belongs to.
    ContestId
);
string_id!(
    /// The per-contest snapshot identifier of a counting circle.
    CountingCircleId
);
string_id!(PoliticalBusinessId);
string_id!(
    /// The canonical ballot of a vote. External documents may group questions
    /// differently, so ballots are always matched on this identifier.
    BallotId
);
string_id!(CandidateId);
string_id!(ListId);

/// Reserved list identifier used by the interchange documents for ballots
/// that were cast without a list.
pub const EMPTY_LIST_ID: &str = "00000000-0000-0000-0000-000000000000";

impl ListId {
    pub fn is_empty_list(&self) -> bool {
        self.0.is_empty() || self.0 == EMPTY_LIST_ID
    }
}

/// Sequence number of an import record inside its history chain. Starts at 1.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct ImportId(pub u64);

impl Display for ImportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The key a counting-circle result is stored under.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct ResultKey {
    pub business_id: PoliticalBusinessId,
    pub counting_circle_id: CountingCircleId,
}

impl ResultKey {
    pub fn new(
        business_id: PoliticalBusinessId,
        counting_circle_id: CountingCircleId,
    ) -> ResultKey {
        ResultKey {
            business_id,
            counting_circle_id,
        }
    }
}

impl Display for ResultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.business_id, self.counting_circle_id)
    }
}
