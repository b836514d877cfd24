use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use crate::ids::{ContestId, CountingCircleId};

/// The external channel a batch of results was delivered through.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum ImportChannel {
    /// Electronic voting. Delivers one batch for a whole contest.
    EVoting,
    /// Electronic ballot counting machines. Delivers one batch per counting circle.
    ECounting,
}

impl Display for ImportChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportChannel::EVoting => write!(f, "eVoting"),
            ImportChannel::ECounting => write!(f, "eCounting"),
        }
    }
}

/// The scope of a history chain: a whole contest (e-voting) or one counting
/// circle of a contest (e-counting).
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct ImportScope {
    pub contest_id: ContestId,
    pub counting_circle_id: Option<CountingCircleId>,
}

impl ImportScope {
    pub fn contest(contest_id: ContestId) -> ImportScope {
        ImportScope {
            contest_id,
            counting_circle_id: None,
        }
    }

    pub fn counting_circle(
        contest_id: ContestId,
        counting_circle_id: CountingCircleId,
    ) -> ImportScope {
        ImportScope {
            contest_id,
            counting_circle_id: Some(counting_circle_id),
        }
    }

    pub fn channel(&self) -> ImportChannel {
        match self.counting_circle_id {
            None => ImportChannel::EVoting,
            Some(_) => ImportChannel::ECounting,
        }
    }
}

impl Display for ImportScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.counting_circle_id {
            None => write!(f, "contest {}", self.contest_id),
            Some(cc) => write!(f, "contest {} / counting circle {}", self.contest_id, cc),
        }
    }
}

// ********* Configuration **********

/// Settings of the import engine.
///
/// Test counting circles are configured per channel and per jurisdiction
/// (canton). Results delivered for them are dropped by the counting-circle
/// filter and reported as ignored.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ImportSettings {
    pub test_counting_circles: BTreeMap<ImportChannel, BTreeMap<String, BTreeSet<String>>>,
}

impl ImportSettings {
    pub fn with_test_counting_circle(
        mut self,
        channel: ImportChannel,
        canton: &str,
        external_id: &str,
    ) -> ImportSettings {
        self.test_counting_circles
            .entry(channel)
            .or_default()
            .entry(canton.to_string())
            .or_default()
            .insert(external_id.to_string());
        self
    }

    pub fn test_counting_circles(&self, channel: ImportChannel, canton: &str) -> BTreeSet<String> {
        self.test_counting_circles
            .get(&channel)
            .and_then(|by_canton| by_canton.get(canton))
            .cloned()
            .unwrap_or_default()
    }
}
