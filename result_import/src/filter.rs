use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use snafu::ensure;

use crate::batch::*;
use crate::config::ImportChannel;
use crate::domain::{EligibleCountingCircle, PoliticalBusinessCatalog, PoliticalBusinessRef};
use crate::error::*;
use crate::ids::*;

/// Why the results of a counting circle were dropped.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum IgnoreReason {
    TestCountingCircle,
    UnknownCountingCircle,
}

#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct IgnoredCountingCircle {
    pub external_id: String,
    pub reason: IgnoreReason,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AcceptedCountingCircle {
    pub circle: EligibleCountingCircle,
    pub sections: Vec<BusinessResultSection>,
    /// Zero-valued sections were substituted for an explicitly empty result.
    pub zero_filled: bool,
    pub voting_cards: VotingCardSummary,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct FilteredBatch {
    pub accepted: BTreeMap<CountingCircleId, AcceptedCountingCircle>,
    pub ignored: Vec<IgnoredCountingCircle>,
}

enum Classification<'a> {
    Ignored(IgnoreReason),
    Accepted(&'a EligibleCountingCircle),
}

/// Decides which counting circles of a batch take part in an import.
pub struct CountingCircleFilter<'a> {
    channel: ImportChannel,
    circles: &'a [EligibleCountingCircle],
    catalog: &'a PoliticalBusinessCatalog,
    test_counting_circles: BTreeSet<String>,
    // The counting circles that must report.
    expected: BTreeSet<CountingCircleId>,
    // Set for a per-counting-circle import. Results of unknown counting
    // circles are replaced by zero results of this one.
    target: Option<&'a EligibleCountingCircle>,
}

impl<'a> CountingCircleFilter<'a> {
    /// Every counting circle supporting the channel must report.
    pub fn for_contest(
        channel: ImportChannel,
        circles: &'a [EligibleCountingCircle],
        catalog: &'a PoliticalBusinessCatalog,
        test_counting_circles: BTreeSet<String>,
    ) -> CountingCircleFilter<'a> {
        let expected = circles
            .iter()
            .filter(|c| c.supports(channel))
            .map(|c| c.id.clone())
            .collect();
        CountingCircleFilter {
            channel,
            circles,
            catalog,
            test_counting_circles,
            expected,
            target: None,
        }
    }

    /// Only the given counting circle must report. A result delivered for an
    /// unknown counting circle counts as an empty result of the target.
    pub fn for_counting_circle(
        channel: ImportChannel,
        circles: &'a [EligibleCountingCircle],
        catalog: &'a PoliticalBusinessCatalog,
        test_counting_circles: BTreeSet<String>,
        target: &'a EligibleCountingCircle,
    ) -> CountingCircleFilter<'a> {
        CountingCircleFilter {
            channel,
            circles,
            catalog,
            test_counting_circles,
            expected: BTreeSet::from([target.id.clone()]),
            target: Some(target),
        }
    }

    fn classify(&self, external_id: &str) -> ImportResult<Classification<'a>> {
        if self.test_counting_circles.contains(external_id) {
            return Ok(Classification::Ignored(IgnoreReason::TestCountingCircle));
        }
        let circle = match self.circles.iter().find(|c| c.matches_external_id(external_id)) {
            Some(c) => c,
            None => return Ok(Classification::Ignored(IgnoreReason::UnknownCountingCircle)),
        };
        ensure!(
            circle.supports(self.channel),
            ChannelNotSupportedSnafu {
                counting_circle: circle.id.clone(),
                channel: self.channel,
            }
        );
        Ok(Classification::Accepted(circle))
    }

    /// Zero-valued sections for every business held in the counting circle.
    fn zero_sections(&self, circle: &EligibleCountingCircle) -> Vec<BusinessResultSection> {
        let mut sections = Vec::new();
        for id in circle.political_businesses.iter() {
            match self.catalog.resolve(id) {
                Some(PoliticalBusinessRef::Vote(_)) => sections.push(BusinessResultSection {
                    business_id: id.clone(),
                    ballots: SectionBallots::Vote(vec![]),
                }),
                Some(PoliticalBusinessRef::MajorityElection(_)) => {
                    sections.push(BusinessResultSection {
                        business_id: id.clone(),
                        ballots: SectionBallots::MajorityElection(vec![]),
                    });
                    for se in self.catalog.secondaries_of(id) {
                        sections.push(BusinessResultSection {
                            business_id: se.id.clone(),
                            ballots: SectionBallots::MajorityElection(vec![]),
                        });
                    }
                }
                Some(PoliticalBusinessRef::ProportionalElection(_)) => {
                    sections.push(BusinessResultSection {
                        business_id: id.clone(),
                        ballots: SectionBallots::ProportionalElection(vec![]),
                    })
                }
                // Secondary elections are listed through their primary.
                Some(PoliticalBusinessRef::SecondaryMajorityElection(_, _)) => {}
                None => {
                    warn!(
                        "zero_sections: counting circle {} lists unknown business {}",
                        circle.id, id
                    );
                }
            }
        }
        sections
    }

    pub fn filter(
        &self,
        results: &[CountingCircleResultEntry],
        voting_cards: &[VotingCardSummary],
    ) -> ImportResult<FilteredBatch> {
        let mut ignored: BTreeMap<String, IgnoreReason> = BTreeMap::new();
        // counting circle -> (sections, explicitly empty)
        let mut delivered: BTreeMap<
            CountingCircleId,
            (&EligibleCountingCircle, Vec<BusinessResultSection>, bool),
        > = BTreeMap::new();

        for entry in results.iter() {
            let (circle, content) = match self.classify(&entry.counting_circle)? {
                Classification::Ignored(reason) => {
                    warn!(
                        "filter: ignoring results of counting circle {}: {:?}",
                        entry.counting_circle, reason
                    );
                    ignored.entry(entry.counting_circle.clone()).or_insert(reason);
                    match (reason, self.target) {
                        (IgnoreReason::UnknownCountingCircle, Some(target)) => {
                            debug!(
                                "filter: zero results for {} instead of unknown counting circle {}",
                                target.id, entry.counting_circle
                            );
                            (target, None)
                        }
                        _ => continue,
                    }
                }
                Classification::Accepted(circle) => (circle, Some(&entry.content)),
            };
            let slot = delivered
                .entry(circle.id.clone())
                .or_insert_with(|| (circle, Vec::new(), false));
            match content {
                None | Some(ResultContent::Empty) => slot.2 = true,
                Some(ResultContent::Business(section)) => slot.1.push(section.clone()),
            }
        }

        let mut cards: BTreeMap<CountingCircleId, VotingCardSummary> = BTreeMap::new();
        for vc in voting_cards.iter() {
            let circle = match self.classify(&vc.counting_circle)? {
                Classification::Ignored(reason) => {
                    ignored.entry(vc.counting_circle.clone()).or_insert(reason);
                    continue;
                }
                Classification::Accepted(circle) => circle,
            };
            ensure!(
                cards.insert(circle.id.clone(), vc.clone()).is_none(),
                DuplicateVotingCardsSnafu {
                    counting_circle: circle.id.clone(),
                }
            );
        }

        let mut accepted: BTreeMap<CountingCircleId, AcceptedCountingCircle> = BTreeMap::new();
        for (id, (circle, mut sections, empty)) in delivered.into_iter() {
            if empty {
                debug!("filter: counting circle {} delivered an empty result", id);
                for zero in self.zero_sections(circle) {
                    if !sections.iter().any(|s| s.business_id == zero.business_id) {
                        sections.push(zero);
                    }
                }
            }
            let vc = match cards.get(&id) {
                Some(vc) => vc.clone(),
                None => return MissingVotingCardsSnafu { counting_circle: id }.fail(),
            };
            accepted.insert(
                id,
                AcceptedCountingCircle {
                    circle: circle.clone(),
                    sections,
                    zero_filled: empty,
                    voting_cards: vc,
                },
            );
        }

        self.check_coverage(&accepted, &cards)?;

        let ignored: Vec<IgnoredCountingCircle> = ignored
            .into_iter()
            .map(|(external_id, reason)| IgnoredCountingCircle { external_id, reason })
            .collect();
        info!(
            "filter: {} counting circles accepted, {} ignored",
            accepted.len(),
            ignored.len()
        );
        Ok(FilteredBatch { accepted, ignored })
    }

    fn check_coverage(
        &self,
        accepted: &BTreeMap<CountingCircleId, AcceptedCountingCircle>,
        cards: &BTreeMap<CountingCircleId, VotingCardSummary>,
    ) -> ImportResult<()> {
        let reporting: BTreeSet<CountingCircleId> = accepted.keys().cloned().collect();
        let with_cards: BTreeSet<CountingCircleId> = cards.keys().cloned().collect();
        let missing: Vec<CountingCircleId> =
            self.expected.difference(&reporting).cloned().collect();
        let unexpected: Vec<CountingCircleId> = reporting
            .union(&with_cards)
            .filter(|id| !self.expected.contains(*id))
            .cloned()
            .collect();
        let consistent = reporting.len() == with_cards.len()
            && reporting.len() == self.expected.len()
            && missing.is_empty()
            && unexpected.is_empty();
        ensure!(
            consistent,
            CoverageMismatchSnafu {
                accepted: reporting.len(),
                voting_cards: with_cards.len(),
                expected: self.expected.len(),
                missing,
                unexpected,
            }
        );
        Ok(())
    }
}
