// ********* Domain snapshot ***********
//
// Read-only view of the contest an import targets: the counting circles that
// may receive results and the political businesses with their candidates,
// lists and ballots.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use snafu::OptionExt;

use crate::config::ImportChannel;
use crate::error::*;
use crate::ids::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum PoliticalBusinessType {
    Vote,
    MajorityElection,
    SecondaryMajorityElection,
    ProportionalElection,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ContestInfo {
    pub id: ContestId,
    /// The jurisdiction the contest is held in. Test counting circles are
    /// configured per jurisdiction.
    pub canton: String,
    pub testing_phase_ended: bool,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct EligibleCountingCircle {
    pub id: CountingCircleId,
    /// Stable across contests.
    pub basis_id: String,
    /// The identifier used by the interchange documents.
    pub external_id: String,
    pub supports_evoting: bool,
    pub supports_ecounting: bool,
    /// Businesses held in this counting circle. Secondary majority elections
    /// are represented by their primary election.
    pub political_businesses: BTreeSet<PoliticalBusinessId>,
}

impl EligibleCountingCircle {
    pub fn supports(&self, channel: ImportChannel) -> bool {
        match channel {
            ImportChannel::EVoting => self.supports_evoting,
            ImportChannel::ECounting => self.supports_ecounting,
        }
    }

    pub fn matches_external_id(&self, external_id: &str) -> bool {
        self.external_id == external_id || self.basis_id == external_id
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct BallotDefinition {
    pub questions: BTreeSet<u32>,
    pub tie_break_questions: BTreeSet<u32>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteDefinition {
    pub id: PoliticalBusinessId,
    pub ballots: BTreeMap<BallotId, BallotDefinition>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MajorityElectionDefinition {
    pub id: PoliticalBusinessId,
    pub number_of_mandates: u32,
    pub invalid_votes_enabled: bool,
    pub candidates: BTreeSet<CandidateId>,
}

/// A secondary majority election is tallied on the counting-circle result of
/// its primary election. It shares the invalid-vote policy of the primary.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SecondaryMajorityElectionDefinition {
    pub id: PoliticalBusinessId,
    pub primary_election_id: PoliticalBusinessId,
    pub number_of_mandates: u32,
    pub candidates: BTreeSet<CandidateId>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ListCandidate {
    pub id: CandidateId,
    /// Accumulated candidates appear twice on the original list.
    pub accumulated: bool,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ProportionalElectionList {
    pub id: ListId,
    /// In the original order of the list.
    pub candidates: Vec<ListCandidate>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ProportionalElectionDefinition {
    pub id: PoliticalBusinessId,
    pub number_of_mandates: u32,
    pub lists: BTreeMap<ListId, ProportionalElectionList>,
}

impl ProportionalElectionDefinition {
    /// The list a candidate is running on.
    pub fn list_of(&self, candidate: &CandidateId) -> Option<&ListId> {
        self.lists
            .values()
            .find(|l| l.candidates.iter().any(|c| c.id == *candidate))
            .map(|l| &l.id)
    }
}

/// A political business resolved from the catalog.
#[derive(Debug, Clone, Copy)]
pub enum PoliticalBusinessRef<'a> {
    Vote(&'a VoteDefinition),
    MajorityElection(&'a MajorityElectionDefinition),
    SecondaryMajorityElection(
        &'a SecondaryMajorityElectionDefinition,
        &'a MajorityElectionDefinition,
    ),
    ProportionalElection(&'a ProportionalElectionDefinition),
}

impl<'a> PoliticalBusinessRef<'a> {
    pub fn business_type(&self) -> PoliticalBusinessType {
        match self {
            PoliticalBusinessRef::Vote(_) => PoliticalBusinessType::Vote,
            PoliticalBusinessRef::MajorityElection(_) => PoliticalBusinessType::MajorityElection,
            PoliticalBusinessRef::SecondaryMajorityElection(_, _) => {
                PoliticalBusinessType::SecondaryMajorityElection
            }
            PoliticalBusinessRef::ProportionalElection(_) => {
                PoliticalBusinessType::ProportionalElection
            }
        }
    }

    /// The business whose counting-circle result receives the tally.
    pub fn result_owner(&self) -> &'a PoliticalBusinessId {
        match self {
            PoliticalBusinessRef::Vote(v) => &v.id,
            PoliticalBusinessRef::MajorityElection(e) => &e.id,
            PoliticalBusinessRef::SecondaryMajorityElection(_, primary) => &primary.id,
            PoliticalBusinessRef::ProportionalElection(e) => &e.id,
        }
    }
}

/// All political businesses of a contest, per business type.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct PoliticalBusinessCatalog {
    pub votes: BTreeMap<PoliticalBusinessId, VoteDefinition>,
    pub majority_elections: BTreeMap<PoliticalBusinessId, MajorityElectionDefinition>,
    pub secondary_majority_elections:
        BTreeMap<PoliticalBusinessId, SecondaryMajorityElectionDefinition>,
    pub proportional_elections: BTreeMap<PoliticalBusinessId, ProportionalElectionDefinition>,
}

impl PoliticalBusinessCatalog {
    /// The one place where an untyped business identifier gets its type.
    pub fn resolve(&self, id: &PoliticalBusinessId) -> Option<PoliticalBusinessRef<'_>> {
        if let Some(v) = self.votes.get(id) {
            return Some(PoliticalBusinessRef::Vote(v));
        }
        if let Some(e) = self.majority_elections.get(id) {
            return Some(PoliticalBusinessRef::MajorityElection(e));
        }
        if let Some(se) = self.secondary_majority_elections.get(id) {
            // A secondary election without its primary is not importable.
            return self
                .majority_elections
                .get(&se.primary_election_id)
                .map(|primary| PoliticalBusinessRef::SecondaryMajorityElection(se, primary));
        }
        self.proportional_elections
            .get(id)
            .map(PoliticalBusinessRef::ProportionalElection)
    }

    pub fn secondaries_of<'a>(
        &'a self,
        primary: &'a PoliticalBusinessId,
    ) -> impl Iterator<Item = &'a SecondaryMajorityElectionDefinition> + 'a {
        self.secondary_majority_elections
            .values()
            .filter(move |se| se.primary_election_id == *primary)
    }
}

/// Reads the domain model an import is reconciled against.
pub trait DomainSnapshotReader {
    fn contest(&self, contest_id: &ContestId) -> ImportResult<ContestInfo>;

    fn resolve_eligible_counting_circles(
        &self,
        contest_id: &ContestId,
    ) -> ImportResult<Vec<EligibleCountingCircle>>;

    fn resolve_businesses_and_candidates(
        &self,
        contest_id: &ContestId,
    ) -> ImportResult<PoliticalBusinessCatalog>;
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ContestSnapshot {
    pub info: ContestInfo,
    pub counting_circles: Vec<EligibleCountingCircle>,
    pub catalog: PoliticalBusinessCatalog,
}

/// A snapshot reader over data held in memory.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct StaticDomainSnapshot {
    pub contests: BTreeMap<ContestId, ContestSnapshot>,
}

impl StaticDomainSnapshot {
    pub fn new() -> StaticDomainSnapshot {
        StaticDomainSnapshot::default()
    }

    pub fn with_contest(mut self, contest: ContestSnapshot) -> StaticDomainSnapshot {
        self.contests.insert(contest.info.id.clone(), contest);
        self
    }

    fn get(&self, contest_id: &ContestId) -> ImportResult<&ContestSnapshot> {
        debug!("StaticDomainSnapshot: reading contest {}", contest_id);
        self.contests.get(contest_id).context(UnknownContestSnafu {
            contest: contest_id.clone(),
        })
    }
}

impl DomainSnapshotReader for StaticDomainSnapshot {
    fn contest(&self, contest_id: &ContestId) -> ImportResult<ContestInfo> {
        Ok(self.get(contest_id)?.info.clone())
    }

    fn resolve_eligible_counting_circles(
        &self,
        contest_id: &ContestId,
    ) -> ImportResult<Vec<EligibleCountingCircle>> {
        Ok(self.get(contest_id)?.counting_circles.clone())
    }

    fn resolve_businesses_and_candidates(
        &self,
        contest_id: &ContestId,
    ) -> ImportResult<PoliticalBusinessCatalog> {
        Ok(self.get(contest_id)?.catalog.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;

    #[test]
    fn secondary_election_resolves_to_its_primary_result() {
        let catalog = catalog();
        let resolved = catalog.resolve(&PoliticalBusinessId::from(SECONDARY)).unwrap();
        assert_eq!(
            resolved.business_type(),
            PoliticalBusinessType::SecondaryMajorityElection
        );
        assert_eq!(resolved.result_owner(), &PoliticalBusinessId::from(MAJORITY));
        assert_eq!(
            catalog
                .secondaries_of(&PoliticalBusinessId::from(MAJORITY))
                .count(),
            1
        );
        assert!(catalog.resolve(&PoliticalBusinessId::from("nope")).is_none());
    }

    #[test]
    fn unknown_contest_is_a_reference_error() {
        let err = snapshot(false)
            .contest(&ContestId::from("other"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Reference);
    }
}
