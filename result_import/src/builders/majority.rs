use std::collections::{BTreeSet, HashSet};

use snafu::ensure;

use crate::batch::{ElectionPosition, MajorityElectionBallot};
use crate::builders::BallotImportBuilder;
use crate::domain::{
    MajorityElectionDefinition, PoliticalBusinessType, SecondaryMajorityElectionDefinition,
};
use crate::error::*;
use crate::ids::*;
use crate::tally::MajorityElectionTally;

// The ballot rules shared by primary and secondary majority elections.
struct MajorityBallotCounter<'a> {
    business_id: &'a PoliticalBusinessId,
    counting_circle: &'a CountingCircleId,
    number_of_mandates: u32,
    candidates: &'a BTreeSet<CandidateId>,
    invalid_votes_enabled: bool,
}

impl<'a> MajorityBallotCounter<'a> {
    fn empty_tally(&self) -> MajorityElectionTally {
        let mut tally = MajorityElectionTally::default();
        for c in self.candidates.iter() {
            tally.candidates.insert(c.clone(), 0);
        }
        tally
    }

    fn count(
        &self,
        tally: &mut MajorityElectionTally,
        ballot: &MajorityElectionBallot,
    ) -> ImportResult<()> {
        let filled = ballot.positions.iter().filter(|p| !p.is_empty()).count();
        ensure!(
            filled <= self.number_of_mandates as usize,
            PositionsExceedMandatesSnafu {
                business: self.business_id.clone(),
                counting_circle: self.counting_circle.clone(),
                positions: filled,
                mandates: self.number_of_mandates,
            }
        );
        for p in ballot.positions.iter() {
            if let ElectionPosition::Candidate(cid) = p {
                ensure!(
                    self.candidates.contains(cid),
                    UnknownCandidateSnafu {
                        business: self.business_id.clone(),
                        counting_circle: self.counting_circle.clone(),
                        candidate: cid.clone(),
                    }
                );
            }
        }

        tally.total_ballots += 1;
        if filled == 0 {
            tally.blank_ballots += 1;
        }
        tally.empty_vote_count += self.number_of_mandates - filled as u32;

        // The first occurrence of a candidate counts, every further one is invalid.
        let mut seen: HashSet<&CandidateId> = HashSet::new();
        for p in ballot.positions.iter() {
            match p {
                ElectionPosition::Empty => {}
                ElectionPosition::WriteIn(name) => {
                    tally.write_in_count += 1;
                    *tally.write_ins.entry(name.clone()).or_insert(0) += 1;
                }
                ElectionPosition::Candidate(cid) if seen.contains(cid) => {
                    tally.invalid_vote_count += 1;
                }
                ElectionPosition::Candidate(cid) => {
                    seen.insert(cid);
                    *tally.candidates.entry(cid.clone()).or_insert(0) += 1;
                }
            }
        }
        Ok(())
    }

    fn finish(&self, tally: &mut MajorityElectionTally) {
        if !self.invalid_votes_enabled {
            tally.fold_invalid_votes();
        }
    }
}

pub struct MajorityElectionImportBuilder<'a> {
    counter: MajorityBallotCounter<'a>,
}

impl<'a> MajorityElectionImportBuilder<'a> {
    pub fn new(
        election: &'a MajorityElectionDefinition,
        counting_circle: &'a CountingCircleId,
    ) -> MajorityElectionImportBuilder<'a> {
        MajorityElectionImportBuilder {
            counter: MajorityBallotCounter {
                business_id: &election.id,
                counting_circle,
                number_of_mandates: election.number_of_mandates,
                candidates: &election.candidates,
                invalid_votes_enabled: election.invalid_votes_enabled,
            },
        }
    }
}

impl<'a> BallotImportBuilder for MajorityElectionImportBuilder<'a> {
    type Ballot = MajorityElectionBallot;
    type Tally = MajorityElectionTally;

    fn business_id(&self) -> &PoliticalBusinessId {
        self.counter.business_id
    }

    fn business_type(&self) -> PoliticalBusinessType {
        PoliticalBusinessType::MajorityElection
    }

    fn supports_invalid_votes(&self) -> bool {
        self.counter.invalid_votes_enabled
    }

    fn empty_tally(&self) -> MajorityElectionTally {
        self.counter.empty_tally()
    }

    fn process_ballot(
        &self,
        tally: &mut MajorityElectionTally,
        ballot: &MajorityElectionBallot,
    ) -> ImportResult<()> {
        self.counter.count(tally, ballot)
    }

    fn finish(&self, tally: &mut MajorityElectionTally) {
        self.counter.finish(tally)
    }
}

pub struct SecondaryMajorityElectionImportBuilder<'a> {
    counter: MajorityBallotCounter<'a>,
}

impl<'a> SecondaryMajorityElectionImportBuilder<'a> {
    pub fn new(
        election: &'a SecondaryMajorityElectionDefinition,
        primary: &'a MajorityElectionDefinition,
        counting_circle: &'a CountingCircleId,
    ) -> SecondaryMajorityElectionImportBuilder<'a> {
        SecondaryMajorityElectionImportBuilder {
            counter: MajorityBallotCounter {
                business_id: &election.id,
                counting_circle,
                number_of_mandates: election.number_of_mandates,
                candidates: &election.candidates,
                invalid_votes_enabled: primary.invalid_votes_enabled,
            },
        }
    }
}

impl<'a> BallotImportBuilder for SecondaryMajorityElectionImportBuilder<'a> {
    type Ballot = MajorityElectionBallot;
    type Tally = MajorityElectionTally;

    fn business_id(&self) -> &PoliticalBusinessId {
        self.counter.business_id
    }

    fn business_type(&self) -> PoliticalBusinessType {
        PoliticalBusinessType::SecondaryMajorityElection
    }

    fn supports_invalid_votes(&self) -> bool {
        self.counter.invalid_votes_enabled
    }

    fn empty_tally(&self) -> MajorityElectionTally {
        self.counter.empty_tally()
    }

    fn process_ballot(
        &self,
        tally: &mut MajorityElectionTally,
        ballot: &MajorityElectionBallot,
    ) -> ImportResult<()> {
        self.counter.count(tally, ballot)
    }

    fn finish(&self, tally: &mut MajorityElectionTally) {
        self.counter.finish(tally)
    }
}
