use std::collections::BTreeMap;

use snafu::{ensure, OptionExt};

use crate::batch::{ElectionPosition, ProportionalElectionBallot};
use crate::builders::BallotImportBuilder;
use crate::domain::{
    PoliticalBusinessType, ProportionalElectionDefinition, ProportionalElectionList,
};
use crate::error::*;
use crate::ids::*;
use crate::tally::ProportionalElectionTally;

/// A candidate may appear at most twice on a proportional ballot.
const MAX_OCCURRENCES: u32 = 2;

pub struct ProportionalElectionImportBuilder<'a> {
    election: &'a ProportionalElectionDefinition,
    counting_circle: &'a CountingCircleId,
    // Which list each candidate runs on.
    candidate_lists: BTreeMap<&'a CandidateId, &'a ListId>,
}

impl<'a> ProportionalElectionImportBuilder<'a> {
    pub fn new(
        election: &'a ProportionalElectionDefinition,
        counting_circle: &'a CountingCircleId,
    ) -> ProportionalElectionImportBuilder<'a> {
        let candidate_lists = election
            .lists
            .values()
            .flat_map(|l| l.candidates.iter().map(move |c| (&c.id, &l.id)))
            .collect();
        ProportionalElectionImportBuilder {
            election,
            counting_circle,
            candidate_lists,
        }
    }

    fn resolve_list(
        &self,
        ballot: &ProportionalElectionBallot,
    ) -> ImportResult<Option<&'a ProportionalElectionList>> {
        if ballot.list.is_empty_list() {
            return Ok(None);
        }
        let list = self.election.lists.get(&ballot.list).context(UnknownListSnafu {
            business: self.election.id.clone(),
            counting_circle: self.counting_circle.clone(),
            list: ballot.list.clone(),
        })?;
        Ok(Some(list))
    }

    fn check_positions(&self, ballot: &ProportionalElectionBallot) -> ImportResult<()> {
        let mut occurrences: BTreeMap<CandidateId, u32> = BTreeMap::new();
        for p in ballot.positions.iter() {
            match p {
                ElectionPosition::Empty => {}
                ElectionPosition::WriteIn(_) => {
                    return WriteInNotAllowedSnafu {
                        business: self.election.id.clone(),
                        counting_circle: self.counting_circle.clone(),
                    }
                    .fail();
                }
                ElectionPosition::Candidate(cid) => {
                    ensure!(
                        self.candidate_lists.contains_key(cid),
                        UnknownCandidateSnafu {
                            business: self.election.id.clone(),
                            counting_circle: self.counting_circle.clone(),
                            candidate: cid.clone(),
                        }
                    );
                    let count = occurrences.entry(cid.clone()).or_insert(0);
                    *count += 1;
                    ensure!(
                        *count <= MAX_OCCURRENCES,
                        TooManyAccumulationsSnafu {
                            business: self.election.id.clone(),
                            counting_circle: self.counting_circle.clone(),
                            candidate: cid.clone(),
                        }
                    );
                }
            }
        }
        Ok(())
    }

    fn count_unmodified(
        &self,
        tally: &mut ProportionalElectionTally,
        list: &ProportionalElectionList,
    ) {
        let mandates = self.election.number_of_mandates;
        let mut candidate_votes = 0;
        for c in list.candidates.iter() {
            let votes = if c.accumulated { 2 } else { 1 };
            tally.candidates.entry(c.id.clone()).or_default().unmodified_votes += votes;
            candidate_votes += votes;
        }
        let lt = tally.lists.entry(list.id.clone()).or_default();
        lt.unmodified_ballots += 1;
        lt.unmodified_list_votes += mandates;
        lt.unmodified_blank_rows += mandates.saturating_sub(candidate_votes);
    }

    fn count_modified(
        &self,
        tally: &mut ProportionalElectionTally,
        list: Option<&ProportionalElectionList>,
        ballot: &ProportionalElectionBallot,
        filled: u32,
    ) {
        let ballot_list: Option<ListId> = list.map(|l| l.id.clone());
        let blank_rows = self.election.number_of_mandates - filled;

        let mut seen: BTreeMap<&CandidateId, u32> = BTreeMap::new();
        for p in ballot.positions.iter() {
            let cid = match p {
                ElectionPosition::Candidate(cid) => cid,
                _ => continue,
            };
            let occurrence = seen.entry(cid).or_insert(0);
            *occurrence += 1;
            let own_list = self.candidate_lists[cid];

            let ct = tally.candidates.entry(cid.clone()).or_default();
            ct.modified_votes += 1;
            if *occurrence == 2 {
                ct.votes_from_accumulations += 1;
            }
            if ballot_list.as_ref() != Some(own_list) {
                ct.votes_on_other_lists += 1;
            }
            *ct.vote_sources.entry(ballot_list.clone()).or_insert(0) += 1;

            // A candidate vote is a vote for the candidate's own list.
            tally.lists.entry(own_list.clone()).or_default().modified_list_votes += 1;
        }

        match ballot_list {
            Some(id) => {
                let lt = tally.lists.entry(id).or_default();
                lt.modified_ballots += 1;
                lt.modified_blank_rows += blank_rows;
                lt.modified_list_votes += blank_rows;
            }
            None => {
                tally.without_list.modified_ballots += 1;
                tally.without_list.blank_rows += blank_rows;
            }
        }
    }
}

impl<'a> BallotImportBuilder for ProportionalElectionImportBuilder<'a> {
    type Ballot = ProportionalElectionBallot;
    type Tally = ProportionalElectionTally;

    fn business_id(&self) -> &PoliticalBusinessId {
        &self.election.id
    }

    fn business_type(&self) -> PoliticalBusinessType {
        PoliticalBusinessType::ProportionalElection
    }

    fn supports_invalid_votes(&self) -> bool {
        false
    }

    fn empty_tally(&self) -> ProportionalElectionTally {
        let mut tally = ProportionalElectionTally::default();
        for l in self.election.lists.values() {
            tally.lists.insert(l.id.clone(), Default::default());
            for c in l.candidates.iter() {
                tally.candidates.insert(c.id.clone(), Default::default());
            }
        }
        tally
    }

    fn process_ballot(
        &self,
        tally: &mut ProportionalElectionTally,
        ballot: &ProportionalElectionBallot,
    ) -> ImportResult<()> {
        let list = self.resolve_list(ballot)?;
        let filled = ballot.positions.iter().filter(|p| !p.is_empty()).count();
        ensure!(
            filled <= self.election.number_of_mandates as usize,
            PositionsExceedMandatesSnafu {
                business: self.election.id.clone(),
                counting_circle: self.counting_circle.clone(),
                positions: filled,
                mandates: self.election.number_of_mandates,
            }
        );
        self.check_positions(ballot)?;

        if filled == 0 {
            tally.total_ballots += 1;
            match list {
                None => tally.blank_ballots += 1,
                Some(_) => tally.invalid_ballots += 1,
            }
            return Ok(());
        }

        if ballot.unmodified {
            let list = list.context(UnmodifiedBallotWithoutListSnafu {
                business: self.election.id.clone(),
                counting_circle: self.counting_circle.clone(),
            })?;
            tally.total_ballots += 1;
            self.count_unmodified(tally, list);
            return Ok(());
        }

        tally.total_ballots += 1;
        self.count_modified(tally, list, ballot, filled as u32);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::build_tally;
    use crate::fixtures::*;

    fn ballot(
        list: &str,
        unmodified: bool,
        positions: Vec<ElectionPosition>,
    ) -> ProportionalElectionBallot {
        ProportionalElectionBallot {
            list: ListId::from(list),
            unmodified,
            positions,
        }
    }

    fn build(ballots: &[ProportionalElectionBallot]) -> ImportResult<ProportionalElectionTally> {
        let catalog = catalog();
        let election = &catalog.proportional_elections[&PoliticalBusinessId::from(PROPORTIONAL)];
        let cc = CountingCircleId::from(CC_A);
        let builder = ProportionalElectionImportBuilder::new(election, &cc);
        build_tally(&builder, ballots)
    }

    #[test]
    fn empty_ballots_are_blank_or_invalid() {
        let tally = build(&[
            ballot(EMPTY_LIST_ID, false, vec![ElectionPosition::Empty; 3]),
            ballot("l1", false, vec![ElectionPosition::Empty; 3]),
        ])
        .unwrap();
        assert_eq!(tally.total_ballots, 2);
        assert_eq!(tally.blank_ballots, 1);
        assert_eq!(tally.invalid_ballots, 1);
        assert_eq!(tally.lists[&ListId::from("l1")].modified_ballots, 0);
    }

    #[test]
    fn unmodified_ballot_counts_accumulated_candidates_twice() {
        let tally = build(&[ballot(
            "l1",
            true,
            vec![candidate("a1"), candidate("a1"), candidate("a2")],
        )])
        .unwrap();
        let lt = &tally.lists[&ListId::from("l1")];
        assert_eq!(lt.unmodified_ballots, 1);
        assert_eq!(lt.unmodified_list_votes, 3);
        assert_eq!(lt.unmodified_blank_rows, 0);
        assert_eq!(tally.candidates[&CandidateId::from("a1")].unmodified_votes, 2);
        assert_eq!(tally.candidates[&CandidateId::from("a2")].unmodified_votes, 1);
    }

    #[test]
    fn second_occurrence_is_an_accumulation() {
        let tally = build(&[ballot(
            "l1",
            false,
            vec![candidate("a2"), candidate("a2"), ElectionPosition::Empty],
        )])
        .unwrap();
        let ct = &tally.candidates[&CandidateId::from("a2")];
        assert_eq!(ct.modified_votes, 2);
        assert_eq!(ct.votes_from_accumulations, 1);
        assert_eq!(ct.votes_on_other_lists, 0);
        let lt = &tally.lists[&ListId::from("l1")];
        assert_eq!(lt.modified_ballots, 1);
        assert_eq!(lt.modified_blank_rows, 1);
        assert_eq!(lt.modified_list_votes, 3);
    }

    #[test]
    fn third_occurrence_is_rejected() {
        let err = build(&[ballot(
            "l1",
            false,
            vec![candidate("a2"), candidate("a2"), candidate("a2")],
        )])
        .unwrap_err();
        assert!(matches!(err, ImportError::TooManyAccumulations { .. }));
        assert_eq!(err.category(), ErrorCategory::DataShape);
    }

    #[test]
    fn votes_from_other_lists_are_tracked() {
        let tally = build(&[
            ballot("l1", false, vec![candidate("b1"), candidate("a1")]),
            ballot(EMPTY_LIST_ID, false, vec![candidate("b1")]),
        ])
        .unwrap();
        let b1 = &tally.candidates[&CandidateId::from("b1")];
        assert_eq!(b1.modified_votes, 2);
        assert_eq!(b1.votes_on_other_lists, 2);
        assert_eq!(b1.vote_sources[&Some(ListId::from("l1"))], 1);
        assert_eq!(b1.vote_sources[&None], 1);
        assert_eq!(tally.without_list.modified_ballots, 1);
        assert_eq!(tally.without_list.blank_rows, 2);
        assert_eq!(tally.lists[&ListId::from("l2")].modified_list_votes, 2);
        // one candidate vote and one blank row
        assert_eq!(tally.lists[&ListId::from("l1")].modified_list_votes, 2);
    }

    #[test]
    fn write_ins_are_rejected() {
        let err = build(&[ballot(
            "l1",
            false,
            vec![ElectionPosition::WriteIn("Eva".to_string())],
        )])
        .unwrap_err();
        assert!(matches!(err, ImportError::WriteInNotAllowed { .. }));
    }

    #[test]
    fn unknown_list_and_unmodified_without_list_are_rejected() {
        let err = build(&[ballot("l9", false, vec![candidate("a1")])]).unwrap_err();
        assert!(matches!(err, ImportError::UnknownList { .. }));
        let err = build(&[ballot(EMPTY_LIST_ID, true, vec![candidate("a1")])]).unwrap_err();
        assert!(matches!(err, ImportError::UnmodifiedBallotWithoutList { .. }));
    }
}
