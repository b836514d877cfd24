use std::collections::BTreeSet;

use snafu::{ensure, OptionExt};

use crate::batch::{BallotAnswer, TieBreakAnswer, VoteBallot};
use crate::builders::BallotImportBuilder;
use crate::domain::{BallotDefinition, PoliticalBusinessType, VoteDefinition};
use crate::error::*;
use crate::ids::*;
use crate::tally::{BallotTally, VoteTally};

pub struct VoteImportBuilder<'a> {
    vote: &'a VoteDefinition,
    counting_circle: &'a CountingCircleId,
}

impl<'a> VoteImportBuilder<'a> {
    pub fn new(
        vote: &'a VoteDefinition,
        counting_circle: &'a CountingCircleId,
    ) -> VoteImportBuilder<'a> {
        VoteImportBuilder {
            vote,
            counting_circle,
        }
    }

    fn check_answers(
        &self,
        definition: &BallotDefinition,
        ballot: &VoteBallot,
    ) -> ImportResult<()> {
        let mut seen: BTreeSet<u32> = BTreeSet::new();
        for a in ballot.answers.iter() {
            ensure!(
                definition.questions.contains(&a.question_number),
                UnknownQuestionSnafu {
                    business: self.vote.id.clone(),
                    counting_circle: self.counting_circle.clone(),
                    ballot: ballot.ballot_id.clone(),
                    question_number: a.question_number,
                }
            );
            ensure!(
                seen.insert(a.question_number),
                DuplicateAnswerSnafu {
                    business: self.vote.id.clone(),
                    counting_circle: self.counting_circle.clone(),
                    ballot: ballot.ballot_id.clone(),
                    question_number: a.question_number,
                }
            );
        }
        seen.clear();
        for a in ballot.tie_break_answers.iter() {
            ensure!(
                definition.tie_break_questions.contains(&a.question_number),
                UnknownTieBreakQuestionSnafu {
                    business: self.vote.id.clone(),
                    counting_circle: self.counting_circle.clone(),
                    ballot: ballot.ballot_id.clone(),
                    question_number: a.question_number,
                }
            );
            ensure!(
                seen.insert(a.question_number),
                DuplicateAnswerSnafu {
                    business: self.vote.id.clone(),
                    counting_circle: self.counting_circle.clone(),
                    ballot: ballot.ballot_id.clone(),
                    question_number: a.question_number,
                }
            );
        }
        Ok(())
    }
}

impl<'a> BallotImportBuilder for VoteImportBuilder<'a> {
    type Ballot = VoteBallot;
    type Tally = VoteTally;

    fn business_id(&self) -> &PoliticalBusinessId {
        &self.vote.id
    }

    fn business_type(&self) -> PoliticalBusinessType {
        PoliticalBusinessType::Vote
    }

    fn supports_invalid_votes(&self) -> bool {
        false
    }

    fn empty_tally(&self) -> VoteTally {
        let mut tally = VoteTally::default();
        for (id, definition) in self.vote.ballots.iter() {
            let bt = tally.ballots.entry(id.clone()).or_default();
            for q in definition.questions.iter() {
                bt.questions.insert(*q, Default::default());
            }
            for q in definition.tie_break_questions.iter() {
                bt.tie_break_questions.insert(*q, Default::default());
            }
        }
        tally
    }

    fn process_ballot(&self, tally: &mut VoteTally, ballot: &VoteBallot) -> ImportResult<()> {
        let definition = self
            .vote
            .ballots
            .get(&ballot.ballot_id)
            .context(UnknownBallotSnafu {
                business: self.vote.id.clone(),
                counting_circle: self.counting_circle.clone(),
                ballot: ballot.ballot_id.clone(),
            })?;
        self.check_answers(definition, ballot)?;

        let bt: &mut BallotTally = tally.ballots.entry(ballot.ballot_id.clone()).or_default();
        bt.total_ballots += 1;

        let is_blank = ballot
            .answers
            .iter()
            .all(|a| a.answer == BallotAnswer::Unspecified)
            && ballot
                .tie_break_answers
                .iter()
                .all(|a| a.answer == TieBreakAnswer::Unspecified);
        if is_blank {
            bt.blank_ballots += 1;
            return Ok(());
        }

        for a in ballot.answers.iter() {
            let q = bt.questions.entry(a.question_number).or_default();
            match a.answer {
                BallotAnswer::Yes => q.yes += 1,
                BallotAnswer::No => q.no += 1,
                BallotAnswer::Unspecified => q.unspecified += 1,
            }
        }
        for a in ballot.tie_break_answers.iter() {
            let q = bt.tie_break_questions.entry(a.question_number).or_default();
            match a.answer {
                TieBreakAnswer::Q1 => q.q1 += 1,
                TieBreakAnswer::Q2 => q.q2 += 1,
                TieBreakAnswer::Unspecified => q.unspecified += 1,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{QuestionAnswer, TieBreakQuestionAnswer};
    use crate::builders::build_tally;
    use crate::fixtures::*;

    fn ballot(answers: &[(u32, BallotAnswer)], tie_breaks: &[(u32, TieBreakAnswer)]) -> VoteBallot {
        VoteBallot {
            ballot_id: BallotId::from(VOTE_BALLOT),
            answers: answers
                .iter()
                .map(|(n, a)| QuestionAnswer {
                    question_number: *n,
                    answer: *a,
                })
                .collect(),
            tie_break_answers: tie_breaks
                .iter()
                .map(|(n, a)| TieBreakQuestionAnswer {
                    question_number: *n,
                    answer: *a,
                })
                .collect(),
        }
    }

    #[test]
    fn all_unspecified_is_one_blank_ballot() {
        let catalog = catalog();
        let vote = &catalog.votes[&PoliticalBusinessId::from(VOTE)];
        let cc = CountingCircleId::from(CC_A);
        let builder = VoteImportBuilder::new(vote, &cc);
        let tally = build_tally(
            &builder,
            &[ballot(
                &[(1, BallotAnswer::Unspecified), (2, BallotAnswer::Unspecified)],
                &[(1, TieBreakAnswer::Unspecified)],
            )],
        )
        .unwrap();
        let bt = &tally.ballots[&BallotId::from(VOTE_BALLOT)];
        assert_eq!(bt.total_ballots, 1);
        assert_eq!(bt.blank_ballots, 1);
        for q in bt.questions.values() {
            assert_eq!((q.yes, q.no, q.unspecified), (0, 0, 0));
        }
        assert_eq!(bt.tie_break_questions[&1].unspecified, 0);
    }

    #[test]
    fn answers_are_counted_per_question() {
        let catalog = catalog();
        let vote = &catalog.votes[&PoliticalBusinessId::from(VOTE)];
        let cc = CountingCircleId::from(CC_A);
        let builder = VoteImportBuilder::new(vote, &cc);
        let tally = build_tally(
            &builder,
            &[
                ballot(
                    &[(1, BallotAnswer::Yes), (2, BallotAnswer::No)],
                    &[(1, TieBreakAnswer::Q2)],
                ),
                ballot(
                    &[(1, BallotAnswer::Yes), (2, BallotAnswer::Unspecified)],
                    &[(1, TieBreakAnswer::Unspecified)],
                ),
            ],
        )
        .unwrap();
        let bt = &tally.ballots[&BallotId::from(VOTE_BALLOT)];
        assert_eq!(bt.total_ballots, 2);
        assert_eq!(bt.blank_ballots, 0);
        assert_eq!(bt.questions[&1].yes, 2);
        assert_eq!(bt.questions[&2].no, 1);
        assert_eq!(bt.questions[&2].unspecified, 1);
        assert_eq!(bt.tie_break_questions[&1].q2, 1);
        assert_eq!(bt.tie_break_questions[&1].unspecified, 1);
    }

    #[test]
    fn unknown_question_fails_even_when_blank() {
        let catalog = catalog();
        let vote = &catalog.votes[&PoliticalBusinessId::from(VOTE)];
        let cc = CountingCircleId::from(CC_A);
        let builder = VoteImportBuilder::new(vote, &cc);
        let err =
            build_tally(&builder, &[ballot(&[(7, BallotAnswer::Unspecified)], &[])]).unwrap_err();
        assert!(matches!(err, ImportError::UnknownQuestion { question_number: 7, .. }));
    }

    #[test]
    fn ballots_are_matched_on_the_canonical_ballot_id() {
        let catalog = catalog();
        let vote = &catalog.votes[&PoliticalBusinessId::from(VOTE)];
        let cc = CountingCircleId::from(CC_A);
        let builder = VoteImportBuilder::new(vote, &cc);
        let mut b = ballot(&[(1, BallotAnswer::Yes)], &[]);
        b.ballot_id = BallotId::from(VOTE);
        let err = build_tally(&builder, &[b]).unwrap_err();
        assert!(matches!(err, ImportError::UnknownBallot { .. }));
    }

    #[test]
    fn duplicate_answer_is_rejected() {
        let catalog = catalog();
        let vote = &catalog.votes[&PoliticalBusinessId::from(VOTE)];
        let cc = CountingCircleId::from(CC_A);
        let builder = VoteImportBuilder::new(vote, &cc);
        let err = build_tally(
            &builder,
            &[ballot(&[(1, BallotAnswer::Yes), (1, BallotAnswer::No)], &[])],
        )
        .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::DataShape);
    }
}
