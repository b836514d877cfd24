// Reads the domain snapshot of a contest: its counting circles and political
// businesses as exported by the contest management.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::ensure;

use result_import::*;

use crate::interchange::io_common::read_document;
use crate::interchange::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ContestDocument {
    pub id: String,
    pub canton: String,
    #[serde(rename = "testingPhaseEnded")]
    pub testing_phase_ended: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CountingCircleDocument {
    pub id: String,
    #[serde(rename = "basisId")]
    pub basis_id: Option<String>,
    #[serde(rename = "externalId")]
    pub external_id: String,
    #[serde(rename = "eVoting")]
    pub e_voting: Option<bool>,
    #[serde(rename = "eCounting")]
    pub e_counting: Option<bool>,
    #[serde(rename = "politicalBusinesses")]
    pub political_businesses: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BallotDocument {
    pub id: String,
    pub questions: Vec<u32>,
    #[serde(rename = "tieBreakQuestions")]
    pub tie_break_questions: Option<Vec<u32>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteDocument {
    pub id: String,
    pub ballots: Vec<BallotDocument>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MajorityElectionDocument {
    pub id: String,
    #[serde(rename = "numberOfMandates")]
    pub number_of_mandates: u32,
    #[serde(rename = "invalidVotesEnabled")]
    pub invalid_votes_enabled: Option<bool>,
    pub candidates: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryMajorityElectionDocument {
    pub id: String,
    #[serde(rename = "primaryElectionId")]
    pub primary_election_id: String,
    #[serde(rename = "numberOfMandates")]
    pub number_of_mandates: u32,
    pub candidates: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ListCandidateDocument {
    pub id: String,
    pub accumulated: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ListDocument {
    pub id: String,
    pub candidates: Vec<ListCandidateDocument>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ProportionalElectionDocument {
    pub id: String,
    #[serde(rename = "numberOfMandates")]
    pub number_of_mandates: u32,
    pub lists: Vec<ListDocument>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub contest: ContestDocument,
    #[serde(rename = "countingCircles")]
    pub counting_circles: Vec<CountingCircleDocument>,
    #[serde(default)]
    pub votes: Vec<VoteDocument>,
    #[serde(rename = "majorityElections", default)]
    pub majority_elections: Vec<MajorityElectionDocument>,
    #[serde(rename = "secondaryMajorityElections", default)]
    pub secondary_majority_elections: Vec<SecondaryMajorityElectionDocument>,
    #[serde(rename = "proportionalElections", default)]
    pub proportional_elections: Vec<ProportionalElectionDocument>,
}

fn invalid<T>(message: String) -> InterchangeResult<T> {
    InvalidDocumentSnafu {
        document: "snapshot",
        message,
    }
    .fail()
}

fn unique_ids(ids: &[String], what: &str, owner: &str) -> InterchangeResult<()> {
    let mut seen: BTreeSet<&String> = BTreeSet::new();
    for id in ids.iter() {
        ensure!(
            seen.insert(id),
            InvalidDocumentSnafu {
                document: "snapshot",
                message: format!("{} {} appears twice in {}", what, id, owner),
            }
        );
    }
    Ok(())
}

fn mandates(id: &str, number_of_mandates: u32) -> InterchangeResult<u32> {
    if number_of_mandates == 0 {
        return invalid(format!("election {} has no mandates", id));
    }
    Ok(number_of_mandates)
}

fn validate_catalog(doc: &SnapshotDocument) -> InterchangeResult<PoliticalBusinessCatalog> {
    let mut catalog = PoliticalBusinessCatalog::default();
    let mut all_ids: Vec<String> = Vec::new();

    for v in doc.votes.iter() {
        let ballot_ids: Vec<String> = v.ballots.iter().map(|b| b.id.clone()).collect();
        unique_ids(&ballot_ids, "ballot", &v.id)?;
        let mut ballots = BTreeMap::new();
        for b in v.ballots.iter() {
            ballots.insert(
                BallotId::new(b.id.clone()),
                BallotDefinition {
                    questions: b.questions.iter().cloned().collect(),
                    tie_break_questions: b
                        .tie_break_questions
                        .iter()
                        .flatten()
                        .cloned()
                        .collect(),
                },
            );
        }
        all_ids.push(v.id.clone());
        catalog.votes.insert(
            PoliticalBusinessId::new(v.id.clone()),
            VoteDefinition {
                id: PoliticalBusinessId::new(v.id.clone()),
                ballots,
            },
        );
    }

    for e in doc.majority_elections.iter() {
        unique_ids(&e.candidates, "candidate", &e.id)?;
        all_ids.push(e.id.clone());
        catalog.majority_elections.insert(
            PoliticalBusinessId::new(e.id.clone()),
            MajorityElectionDefinition {
                id: PoliticalBusinessId::new(e.id.clone()),
                number_of_mandates: mandates(&e.id, e.number_of_mandates)?,
                invalid_votes_enabled: e.invalid_votes_enabled.unwrap_or(false),
                candidates: e.candidates.iter().map(|c| CandidateId::new(c.clone())).collect(),
            },
        );
    }

    for se in doc.secondary_majority_elections.iter() {
        let primary = PoliticalBusinessId::new(se.primary_election_id.clone());
        if !catalog.majority_elections.contains_key(&primary) {
            return invalid(format!(
                "secondary election {} refers to unknown primary election {}",
                se.id, se.primary_election_id
            ));
        }
        unique_ids(&se.candidates, "candidate", &se.id)?;
        all_ids.push(se.id.clone());
        catalog.secondary_majority_elections.insert(
            PoliticalBusinessId::new(se.id.clone()),
            SecondaryMajorityElectionDefinition {
                id: PoliticalBusinessId::new(se.id.clone()),
                primary_election_id: primary,
                number_of_mandates: mandates(&se.id, se.number_of_mandates)?,
                candidates: se.candidates.iter().map(|c| CandidateId::new(c.clone())).collect(),
            },
        );
    }

    for pe in doc.proportional_elections.iter() {
        let list_ids: Vec<String> = pe.lists.iter().map(|l| l.id.clone()).collect();
        unique_ids(&list_ids, "list", &pe.id)?;
        // A candidate runs on exactly one list.
        let candidate_ids: Vec<String> = pe
            .lists
            .iter()
            .flat_map(|l| l.candidates.iter().map(|c| c.id.clone()))
            .collect();
        unique_ids(&candidate_ids, "candidate", &pe.id)?;
        let mut lists = BTreeMap::new();
        for l in pe.lists.iter() {
            let list_id = ListId::new(l.id.clone());
            if list_id.is_empty_list() {
                return invalid(format!("election {} uses the reserved list id {}", pe.id, l.id));
            }
            lists.insert(
                list_id.clone(),
                ProportionalElectionList {
                    id: list_id,
                    candidates: l
                        .candidates
                        .iter()
                        .map(|c| ListCandidate {
                            id: CandidateId::new(c.id.clone()),
                            accumulated: c.accumulated.unwrap_or(false),
                        })
                        .collect(),
                },
            );
        }
        all_ids.push(pe.id.clone());
        catalog.proportional_elections.insert(
            PoliticalBusinessId::new(pe.id.clone()),
            ProportionalElectionDefinition {
                id: PoliticalBusinessId::new(pe.id.clone()),
                number_of_mandates: mandates(&pe.id, pe.number_of_mandates)?,
                lists,
            },
        );
    }

    unique_ids(&all_ids, "political business", &doc.contest.id)?;
    Ok(catalog)
}

fn validate_counting_circles(
    doc: &SnapshotDocument,
    catalog: &PoliticalBusinessCatalog,
) -> InterchangeResult<Vec<EligibleCountingCircle>> {
    let ids: Vec<String> = doc.counting_circles.iter().map(|c| c.id.clone()).collect();
    unique_ids(&ids, "counting circle", &doc.contest.id)?;
    let external_ids: Vec<String> = doc
        .counting_circles
        .iter()
        .map(|c| c.external_id.clone())
        .collect();
    unique_ids(&external_ids, "external counting circle id", &doc.contest.id)?;

    let mut res = Vec::new();
    for cc in doc.counting_circles.iter() {
        let mut businesses = BTreeSet::new();
        for pb in cc.political_businesses.iter() {
            let id = PoliticalBusinessId::new(pb.clone());
            match catalog.resolve(&id) {
                None => {
                    return invalid(format!(
                        "counting circle {} holds unknown political business {}",
                        cc.id, pb
                    ))
                }
                Some(PoliticalBusinessRef::SecondaryMajorityElection(_, primary)) => {
                    // Secondary elections are held wherever their primary is.
                    businesses.insert(primary.id.clone());
                }
                Some(_) => {
                    businesses.insert(id);
                }
            }
        }
        res.push(EligibleCountingCircle {
            id: CountingCircleId::new(cc.id.clone()),
            basis_id: cc.basis_id.clone().unwrap_or_else(|| cc.id.clone()),
            external_id: cc.external_id.clone(),
            supports_evoting: cc.e_voting.unwrap_or(false),
            supports_ecounting: cc.e_counting.unwrap_or(false),
            political_businesses: businesses,
        });
    }
    Ok(res)
}

pub fn validate_snapshot(doc: &SnapshotDocument) -> InterchangeResult<ContestSnapshot> {
    if doc.contest.canton.trim().is_empty() {
        return invalid(format!("contest {} has no canton", doc.contest.id));
    }
    let catalog = validate_catalog(doc)?;
    let counting_circles = validate_counting_circles(doc, &catalog)?;
    debug!(
        "validate_snapshot: {}: {} counting circles, {} votes, {} majority, {} proportional",
        doc.contest.id,
        counting_circles.len(),
        catalog.votes.len(),
        catalog.majority_elections.len(),
        catalog.proportional_elections.len()
    );
    Ok(ContestSnapshot {
        info: ContestInfo {
            id: ContestId::new(doc.contest.id.clone()),
            canton: doc.contest.canton.clone(),
            testing_phase_ended: doc.contest.testing_phase_ended.unwrap_or(false),
        },
        counting_circles,
        catalog,
    })
}

/// Reads one or more snapshot documents into a snapshot reader.
pub fn read_snapshots(paths: &[String]) -> InterchangeResult<StaticDomainSnapshot> {
    let mut snapshot = StaticDomainSnapshot::new();
    for path in paths.iter() {
        info!("read_snapshots: reading {}", path);
        let doc: SnapshotDocument = read_document(path)?;
        snapshot = snapshot.with_contest(validate_snapshot(&doc)?);
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interchange::io_common::parse_document;

    fn snapshot(js: &str) -> InterchangeResult<ContestSnapshot> {
        let doc: SnapshotDocument = parse_document(js, "snapshot.json")?;
        validate_snapshot(&doc)
    }

    #[test]
    fn secondary_election_is_held_through_its_primary() {
        let s = snapshot(
            r#"{"contest": {"id": "c", "canton": "SG"},
                "countingCircles": [{"id": "cc", "externalId": "1", "eCounting": true,
                                     "politicalBusinesses": ["m-sec"]}],
                "majorityElections": [{"id": "m", "numberOfMandates": 1, "candidates": ["x"]}],
                "secondaryMajorityElections": [{"id": "m-sec", "primaryElectionId": "m",
                                                "numberOfMandates": 1, "candidates": ["y"]}]}"#,
        )
        .unwrap();
        let cc = &s.counting_circles[0];
        assert!(cc.political_businesses.contains(&PoliticalBusinessId::from("m")));
        assert_eq!(cc.basis_id, "cc");
        assert!(!cc.supports_evoting);
        assert!(!s.info.testing_phase_ended);
    }

    #[test]
    fn unknown_primary_is_rejected() {
        let err = snapshot(
            r#"{"contest": {"id": "c", "canton": "SG"}, "countingCircles": [],
                "secondaryMajorityElections": [{"id": "m-sec", "primaryElectionId": "m",
                                                "numberOfMandates": 1, "candidates": []}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InterchangeError::InvalidDocument { .. }));
    }

    #[test]
    fn candidate_on_two_lists_is_rejected() {
        let err = snapshot(
            r#"{"contest": {"id": "c", "canton": "SG"}, "countingCircles": [],
                "proportionalElections": [{"id": "p", "numberOfMandates": 2, "lists": [
                    {"id": "l1", "candidates": [{"id": "a"}]},
                    {"id": "l2", "candidates": [{"id": "a"}]}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InterchangeError::InvalidDocument { .. }));
    }

    #[test]
    fn counting_circle_with_unknown_business_is_rejected() {
        let err = snapshot(
            r#"{"contest": {"id": "c", "canton": "SG"},
                "countingCircles": [{"id": "cc", "externalId": "1",
                                     "politicalBusinesses": ["v"]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InterchangeError::InvalidDocument { .. }));
    }
}
