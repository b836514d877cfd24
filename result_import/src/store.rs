use std::collections::BTreeMap;

use log::{debug, info};

use crate::batch::VotingCardSummary;
use crate::config::{ImportChannel, ImportScope};
use crate::error::*;
use crate::history::{ImportHistory, ImportRecord};
use crate::ids::*;
use crate::result::CountingCircleResult;

/// Everything one import operation writes. A change set is applied
/// completely or not at all.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ImportChangeSet {
    pub scope: ImportScope,
    pub channel: ImportChannel,
    /// Results to store, replacing the stored ones.
    pub results: Vec<CountingCircleResult>,
    /// Voting cards per counting circle. `None` removes the stored summary.
    pub voting_cards: Vec<(CountingCircleId, Option<VotingCardSummary>)>,
    pub record: ImportRecord,
}

/// Persistence of counting-circle results, voting cards and import histories.
pub trait ResultStore {
    fn counting_circle_result(&self, key: &ResultKey) -> Option<CountingCircleResult>;

    /// The history of the scope. Empty if nothing was imported yet.
    fn import_history(&self, scope: &ImportScope) -> ImportHistory;

    fn voting_cards(
        &self,
        channel: ImportChannel,
        counting_circle: &CountingCircleId,
    ) -> Option<VotingCardSummary>;

    /// Applies the change set atomically. Fails with a store error if the
    /// history of the scope moved on since the change set was planned.
    fn commit(&mut self, changes: ImportChangeSet) -> ImportResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryResultStore {
    results: BTreeMap<ResultKey, CountingCircleResult>,
    histories: BTreeMap<ImportScope, ImportHistory>,
    voting_cards: BTreeMap<(ImportChannel, CountingCircleId), VotingCardSummary>,
}

impl InMemoryResultStore {
    pub fn new() -> InMemoryResultStore {
        InMemoryResultStore::default()
    }

    /// Seeds a result, for example one that went through the submission
    /// workflow outside of the import.
    pub fn insert_result(&mut self, result: CountingCircleResult) {
        self.results.insert(result.key.clone(), result);
    }

    pub fn results(&self) -> &BTreeMap<ResultKey, CountingCircleResult> {
        &self.results
    }
}

impl ResultStore for InMemoryResultStore {
    fn counting_circle_result(&self, key: &ResultKey) -> Option<CountingCircleResult> {
        self.results.get(key).cloned()
    }

    fn import_history(&self, scope: &ImportScope) -> ImportHistory {
        self.histories
            .get(scope)
            .cloned()
            .unwrap_or_else(|| ImportHistory::new(scope.clone()))
    }

    fn voting_cards(
        &self,
        channel: ImportChannel,
        counting_circle: &CountingCircleId,
    ) -> Option<VotingCardSummary> {
        self.voting_cards
            .get(&(channel, counting_circle.clone()))
            .cloned()
    }

    fn commit(&mut self, changes: ImportChangeSet) -> ImportResult<()> {
        // The chain check is the only step that can fail, so it runs first.
        let mut history = self.import_history(&changes.scope);
        let record_id = changes.record.id;
        history.append(changes.record)?;

        for result in changes.results.into_iter() {
            debug!("commit: storing {} ({:?})", result.key, result.state);
            self.results.insert(result.key.clone(), result);
        }
        for (cc, vc) in changes.voting_cards.into_iter() {
            match vc {
                Some(vc) => {
                    self.voting_cards.insert((changes.channel, cc), vc);
                }
                None => {
                    self.voting_cards.remove(&(changes.channel, cc));
                }
            }
        }
        self.histories.insert(changes.scope.clone(), history);
        info!("commit: {} committed for {}", record_id, changes.scope);
        Ok(())
    }
}
