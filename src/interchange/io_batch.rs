// Reads a normalized result batch. The documents are produced upstream from
// the eCH interchange messages of the e-voting and e-counting systems.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::ensure;

use result_import::*;

use crate::interchange::io_common::{read_document, simplify_file_name};
use crate::interchange::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AnswerDocument {
    pub question: u32,
    pub answer: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteBallotDocument {
    #[serde(rename = "ballotId")]
    pub ballot_id: String,
    #[serde(default)]
    pub answers: Vec<AnswerDocument>,
    #[serde(rename = "tieBreakAnswers", default)]
    pub tie_break_answers: Vec<AnswerDocument>,
}

/// A position on an election ballot. Neither field set means an empty position.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct PositionDocument {
    pub candidate: Option<String>,
    #[serde(rename = "writeIn")]
    pub write_in: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionBallotDocument {
    /// Proportional elections only. Missing when the ballot was cast without a list.
    pub list: Option<String>,
    pub unmodified: Option<bool>,
    pub positions: Vec<PositionDocument>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteSectionDocument {
    #[serde(rename = "businessId")]
    pub business_id: String,
    pub ballots: Vec<VoteBallotDocument>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSectionDocument {
    #[serde(rename = "businessId")]
    pub business_id: String,
    pub ballots: Vec<ElectionBallotDocument>,
}

/// One result entry: either `empty` or exactly one of the sections.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResultEntryDocument {
    #[serde(rename = "countingCircle")]
    pub counting_circle: String,
    pub empty: Option<bool>,
    pub vote: Option<VoteSectionDocument>,
    #[serde(rename = "majorityElection")]
    pub majority_election: Option<ElectionSectionDocument>,
    #[serde(rename = "proportionalElection")]
    pub proportional_election: Option<ElectionSectionDocument>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VotingCardDocument {
    #[serde(rename = "countingCircle")]
    pub counting_circle: String,
    #[serde(rename = "countOfVoters")]
    pub count_of_voters: u32,
    #[serde(rename = "validVotingCards")]
    pub valid_voting_cards: Option<u32>,
    #[serde(rename = "invalidVotingCards")]
    pub invalid_voting_cards: Option<u32>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BatchDocument {
    #[serde(rename = "contestId")]
    pub contest_id: String,
    #[serde(rename = "countingCircle")]
    pub counting_circle: Option<String>,
    pub source: Option<String>,
    #[serde(rename = "messageIds", default)]
    pub message_ids: Vec<String>,
    pub results: Vec<ResultEntryDocument>,
    #[serde(rename = "votingCards")]
    pub voting_cards: Vec<VotingCardDocument>,
}

fn invalid<T>(message: String) -> InterchangeResult<T> {
    InvalidDocumentSnafu {
        document: "batch",
        message,
    }
    .fail()
}

fn read_answer(a: &AnswerDocument) -> InterchangeResult<BallotAnswer> {
    match a.answer.as_str() {
        "yes" => Ok(BallotAnswer::Yes),
        "no" => Ok(BallotAnswer::No),
        "unspecified" | "" => Ok(BallotAnswer::Unspecified),
        x => invalid(format!("unknown answer {:?} to question {}", x, a.question)),
    }
}

fn read_tie_break_answer(a: &AnswerDocument) -> InterchangeResult<TieBreakAnswer> {
    match a.answer.as_str() {
        "q1" => Ok(TieBreakAnswer::Q1),
        "q2" => Ok(TieBreakAnswer::Q2),
        "unspecified" | "" => Ok(TieBreakAnswer::Unspecified),
        x => invalid(format!(
            "unknown answer {:?} to tie-break question {}",
            x, a.question
        )),
    }
}

fn read_vote_ballot(b: &VoteBallotDocument) -> InterchangeResult<VoteBallot> {
    let mut answers = Vec::new();
    for a in b.answers.iter() {
        answers.push(QuestionAnswer {
            question_number: a.question,
            answer: read_answer(a)?,
        });
    }
    let mut tie_break_answers = Vec::new();
    for a in b.tie_break_answers.iter() {
        tie_break_answers.push(TieBreakQuestionAnswer {
            question_number: a.question,
            answer: read_tie_break_answer(a)?,
        });
    }
    Ok(VoteBallot {
        ballot_id: BallotId::new(b.ballot_id.clone()),
        answers,
        tie_break_answers,
    })
}

fn read_position(p: &PositionDocument) -> InterchangeResult<ElectionPosition> {
    match (&p.candidate, &p.write_in) {
        (None, None) => Ok(ElectionPosition::Empty),
        (Some(c), None) => Ok(ElectionPosition::Candidate(CandidateId::new(c.clone()))),
        (None, Some(name)) if name.trim().is_empty() => Ok(ElectionPosition::Empty),
        (None, Some(name)) => Ok(ElectionPosition::WriteIn(name.trim().to_string())),
        (Some(c), Some(name)) => invalid(format!(
            "position holds both candidate {} and write-in {:?}",
            c, name
        )),
    }
}

fn read_positions(positions: &[PositionDocument]) -> InterchangeResult<Vec<ElectionPosition>> {
    positions.iter().map(read_position).collect()
}

fn read_section(entry: &ResultEntryDocument) -> InterchangeResult<ResultContent> {
    let declared = [
        entry.vote.is_some(),
        entry.majority_election.is_some(),
        entry.proportional_election.is_some(),
    ]
    .iter()
    .filter(|x| **x)
    .count();
    let empty = entry.empty.unwrap_or(false);
    ensure!(
        (declared == 1 && !empty) || (declared == 0 && empty),
        InvalidDocumentSnafu {
            document: "batch",
            message: format!(
                "the result entry of counting circle {} must be empty or hold exactly one section",
                entry.counting_circle
            ),
        }
    );
    if empty {
        return Ok(ResultContent::Empty);
    }

    let section = if let Some(v) = &entry.vote {
        let ballots = v
            .ballots
            .iter()
            .map(read_vote_ballot)
            .collect::<InterchangeResult<Vec<VoteBallot>>>()?;
        BusinessResultSection {
            business_id: PoliticalBusinessId::new(v.business_id.clone()),
            ballots: SectionBallots::Vote(ballots),
        }
    } else if let Some(e) = &entry.majority_election {
        let mut ballots = Vec::new();
        for b in e.ballots.iter() {
            ensure!(
                b.list.is_none(),
                InvalidDocumentSnafu {
                    document: "batch",
                    message: format!("majority election {} ballot with a list", e.business_id),
                }
            );
            ballots.push(MajorityElectionBallot {
                positions: read_positions(&b.positions)?,
            });
        }
        BusinessResultSection {
            business_id: PoliticalBusinessId::new(e.business_id.clone()),
            ballots: SectionBallots::MajorityElection(ballots),
        }
    } else if let Some(e) = &entry.proportional_election {
        let mut ballots = Vec::new();
        for b in e.ballots.iter() {
            ballots.push(ProportionalElectionBallot {
                list: ListId::new(b.list.clone().unwrap_or_else(|| EMPTY_LIST_ID.to_string())),
                unmodified: b.unmodified.unwrap_or(false),
                positions: read_positions(&b.positions)?,
            });
        }
        BusinessResultSection {
            business_id: PoliticalBusinessId::new(e.business_id.clone()),
            ballots: SectionBallots::ProportionalElection(ballots),
        }
    } else {
        return invalid(format!(
            "the result entry of counting circle {} has no section",
            entry.counting_circle
        ));
    };
    Ok(ResultContent::Business(section))
}

fn read_voting_cards(vc: &VotingCardDocument) -> InterchangeResult<VotingCardSummary> {
    let valid = vc.valid_voting_cards.unwrap_or(vc.count_of_voters);
    let invalid_cards = vc.invalid_voting_cards.unwrap_or(0);
    ensure!(
        valid + invalid_cards <= vc.count_of_voters,
        InvalidDocumentSnafu {
            document: "batch",
            message: format!(
                "counting circle {} has more voting cards than voters",
                vc.counting_circle
            ),
        }
    );
    Ok(VotingCardSummary {
        counting_circle: vc.counting_circle.clone(),
        count_of_voters: vc.count_of_voters,
        valid_voting_cards: valid,
        invalid_voting_cards: invalid_cards,
    })
}

pub fn validate_batch(doc: &BatchDocument, path: &str) -> InterchangeResult<ImportBatch> {
    let mut results = Vec::new();
    for entry in doc.results.iter() {
        results.push(CountingCircleResultEntry {
            counting_circle: entry.counting_circle.clone(),
            content: read_section(entry)?,
        });
    }
    let voting_cards = doc
        .voting_cards
        .iter()
        .map(read_voting_cards)
        .collect::<InterchangeResult<Vec<VotingCardSummary>>>()?;
    let source = doc
        .source
        .clone()
        .unwrap_or_else(|| simplify_file_name(path));
    debug!(
        "validate_batch: {}: {} result entries, {} voting card summaries",
        source,
        results.len(),
        voting_cards.len()
    );
    Ok(ImportBatch {
        contest_id: ContestId::new(doc.contest_id.clone()),
        counting_circle: doc.counting_circle.clone(),
        source,
        message_ids: doc.message_ids.clone(),
        results,
        voting_cards,
    })
}

pub fn read_batch(path: &str) -> InterchangeResult<ImportBatch> {
    info!("read_batch: reading {}", path);
    let doc: BatchDocument = read_document(path)?;
    validate_batch(&doc, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interchange::io_common::parse_document;

    fn batch(js: &str) -> InterchangeResult<ImportBatch> {
        let doc: BatchDocument = parse_document(js, "/tmp/batch-42.json")?;
        validate_batch(&doc, "/tmp/batch-42.json")
    }

    #[test]
    fn source_defaults_to_the_file_name() {
        let b = batch(r#"{"contestId": "c", "results": [], "votingCards": []}"#).unwrap();
        assert_eq!(b.source, "batch-42.json");
        assert_eq!(b.counting_circle, None);
    }

    #[test]
    fn proportional_ballot_without_list_uses_the_reserved_id() {
        let b = batch(
            r#"{"contestId": "c", "votingCards": [],
                "results": [{"countingCircle": "3201", "proportionalElection": {"businessId": "p",
                  "ballots": [{"positions": [{"candidate": "a1"}, {}, {"writeIn": " "}]}]}}]}"#,
        )
        .unwrap();
        match &b.results[0].content {
            ResultContent::Business(BusinessResultSection {
                ballots: SectionBallots::ProportionalElection(ballots),
                ..
            }) => {
                assert!(ballots[0].list.is_empty_list());
                assert!(!ballots[0].unmodified);
                assert_eq!(ballots[0].positions[1], ElectionPosition::Empty);
                assert_eq!(ballots[0].positions[2], ElectionPosition::Empty);
            }
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn entry_must_hold_exactly_one_section() {
        let err = batch(
            r#"{"contestId": "c", "votingCards": [],
                "results": [{"countingCircle": "3201", "empty": true,
                  "vote": {"businessId": "v", "ballots": []}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InterchangeError::InvalidDocument { .. }));
    }

    #[test]
    fn unknown_answers_are_rejected() {
        let err = batch(
            r#"{"contestId": "c", "votingCards": [],
                "results": [{"countingCircle": "3201", "vote": {"businessId": "v",
                  "ballots": [{"ballotId": "b",
                               "answers": [{"question": 1, "answer": "maybe"}]}]}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InterchangeError::InvalidDocument { .. }));
    }

    #[test]
    fn voting_cards_cannot_exceed_voters() {
        let err = batch(
            r#"{"contestId": "c", "results": [],
                "votingCards": [{"countingCircle": "3201", "countOfVoters": 3,
                                 "validVotingCards": 3, "invalidVotingCards": 1}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InterchangeError::InvalidDocument { .. }));
    }
}
