//! A small contest used across the unit tests: three e-voting counting
//! circles, one counting circle counted by machines only, and one business
//! of every type.

use std::collections::{BTreeMap, BTreeSet};

use crate::batch::*;
use crate::domain::*;
use crate::ids::*;

pub const CONTEST: &str = "contest-2026-11";
pub const CANTON: &str = "SG";
pub const CC_A: &str = "cc-a";
pub const CC_B: &str = "cc-b";
pub const CC_C: &str = "cc-c";
pub const CC_MACHINE: &str = "cc-machine";
pub const TEST_CC: &str = "9170";

pub const VOTE: &str = "vote-1";
pub const VOTE_BALLOT: &str = "vote-1-ballot";
pub const MAJORITY: &str = "maj-1";
pub const SECONDARY: &str = "maj-1-sec";
pub const PROPORTIONAL: &str = "prop-1";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn candidate(id: &str) -> ElectionPosition {
    ElectionPosition::Candidate(CandidateId::from(id))
}

fn ids<T: From<&'static str> + Ord>(names: &[&'static str]) -> BTreeSet<T> {
    names.iter().map(|n| T::from(*n)).collect()
}

pub fn catalog() -> PoliticalBusinessCatalog {
    let mut catalog = PoliticalBusinessCatalog::default();
    catalog.votes.insert(
        PoliticalBusinessId::from(VOTE),
        VoteDefinition {
            id: PoliticalBusinessId::from(VOTE),
            ballots: BTreeMap::from([(
                BallotId::from(VOTE_BALLOT),
                BallotDefinition {
                    questions: BTreeSet::from([1, 2]),
                    tie_break_questions: BTreeSet::from([1]),
                },
            )]),
        },
    );
    catalog.majority_elections.insert(
        PoliticalBusinessId::from(MAJORITY),
        MajorityElectionDefinition {
            id: PoliticalBusinessId::from(MAJORITY),
            number_of_mandates: 2,
            invalid_votes_enabled: true,
            candidates: ids(&["m1", "m2", "m3"]),
        },
    );
    catalog.secondary_majority_elections.insert(
        PoliticalBusinessId::from(SECONDARY),
        SecondaryMajorityElectionDefinition {
            id: PoliticalBusinessId::from(SECONDARY),
            primary_election_id: PoliticalBusinessId::from(MAJORITY),
            number_of_mandates: 2,
            candidates: ids(&["s1", "s2"]),
        },
    );
    let list = |id: &str, candidates: &[(&str, bool)]| ProportionalElectionList {
        id: ListId::from(id),
        candidates: candidates
            .iter()
            .map(|(c, accumulated)| ListCandidate {
                id: CandidateId::from(*c),
                accumulated: *accumulated,
            })
            .collect(),
    };
    catalog.proportional_elections.insert(
        PoliticalBusinessId::from(PROPORTIONAL),
        ProportionalElectionDefinition {
            id: PoliticalBusinessId::from(PROPORTIONAL),
            number_of_mandates: 3,
            lists: BTreeMap::from([
                (ListId::from("l1"), list("l1", &[("a1", true), ("a2", false)])),
                (ListId::from("l2"), list("l2", &[("b1", false), ("b2", false)])),
            ]),
        },
    );
    catalog
}

fn circle(id: &str, external_id: &str, evoting: bool, ecounting: bool) -> EligibleCountingCircle {
    EligibleCountingCircle {
        id: CountingCircleId::from(id),
        basis_id: format!("basis-{}", id),
        external_id: external_id.to_string(),
        supports_evoting: evoting,
        supports_ecounting: ecounting,
        political_businesses: ids(&[VOTE, MAJORITY, PROPORTIONAL]),
    }
}

pub fn counting_circles() -> Vec<EligibleCountingCircle> {
    vec![
        circle(CC_A, "3201", true, true),
        circle(CC_B, "3202", true, false),
        circle(CC_C, "3203", true, false),
        circle(CC_MACHINE, "3204", false, true),
    ]
}

pub fn contest_info(testing_phase_ended: bool) -> ContestInfo {
    ContestInfo {
        id: ContestId::from(CONTEST),
        canton: CANTON.to_string(),
        testing_phase_ended,
    }
}

pub fn snapshot(testing_phase_ended: bool) -> StaticDomainSnapshot {
    StaticDomainSnapshot::new().with_contest(ContestSnapshot {
        info: contest_info(testing_phase_ended),
        counting_circles: counting_circles(),
        catalog: catalog(),
    })
}

pub fn external_id(cc: &str) -> String {
    counting_circles()
        .into_iter()
        .find(|c| c.id.as_str() == cc)
        .map(|c| c.external_id)
        .unwrap_or_else(|| cc.to_string())
}

pub fn voting_cards(cc: &str, voters: u32) -> VotingCardSummary {
    VotingCardSummary {
        counting_circle: external_id(cc),
        count_of_voters: voters,
        valid_voting_cards: voters,
        invalid_voting_cards: 0,
    }
}

pub fn vote_section(yes: usize, no: usize) -> BusinessResultSection {
    let mut ballots = Vec::new();
    for answer in std::iter::repeat(BallotAnswer::Yes)
        .take(yes)
        .chain(std::iter::repeat(BallotAnswer::No).take(no))
    {
        ballots.push(VoteBallot {
            ballot_id: BallotId::from(VOTE_BALLOT),
            answers: vec![QuestionAnswer {
                question_number: 1,
                answer,
            }],
            tie_break_answers: vec![],
        });
    }
    BusinessResultSection {
        business_id: PoliticalBusinessId::from(VOTE),
        ballots: SectionBallots::Vote(ballots),
    }
}

pub fn majority_section(
    business: &str,
    ballots: Vec<Vec<ElectionPosition>>,
) -> BusinessResultSection {
    BusinessResultSection {
        business_id: PoliticalBusinessId::from(business),
        ballots: SectionBallots::MajorityElection(
            ballots
                .into_iter()
                .map(|positions| MajorityElectionBallot { positions })
                .collect(),
        ),
    }
}

pub fn entry(cc: &str, section: BusinessResultSection) -> CountingCircleResultEntry {
    CountingCircleResultEntry {
        counting_circle: external_id(cc),
        content: ResultContent::Business(section),
    }
}

pub fn empty_entry(cc: &str) -> CountingCircleResultEntry {
    CountingCircleResultEntry {
        counting_circle: external_id(cc),
        content: ResultContent::Empty,
    }
}

/// A whole-contest batch with votes for CC_A and CC_B and an explicitly empty CC_C.
pub fn evoting_batch() -> ImportBatch {
    ImportBatch {
        contest_id: ContestId::from(CONTEST),
        counting_circle: None,
        source: "evoting-export.zip".to_string(),
        message_ids: vec!["msg-1".to_string()],
        results: vec![
            entry(CC_A, vote_section(3, 1)),
            entry(CC_B, vote_section(1, 2)),
            empty_entry(CC_C),
        ],
        voting_cards: vec![
            voting_cards(CC_A, 4),
            voting_cards(CC_B, 3),
            voting_cards(CC_C, 0),
        ],
    }
}

/// A per-counting-circle batch for CC_A with a majority election result.
pub fn ecounting_batch(ballots: Vec<Vec<ElectionPosition>>) -> ImportBatch {
    ImportBatch {
        contest_id: ContestId::from(CONTEST),
        counting_circle: Some(external_id(CC_A)),
        source: "ecounting-cc-a.xml".to_string(),
        message_ids: vec!["msg-ec-1".to_string()],
        results: vec![entry(CC_A, majority_section(MAJORITY, ballots))],
        voting_cards: vec![voting_cards(CC_A, 10)],
    }
}
