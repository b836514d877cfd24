//! The append-only chain of imports of one scope.
//!
//! Records are never rewritten. Deleting an import appends a record pointing
//! back at the import whose data is current again, and the data in effect is
//! always derived from the tail of the chain.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use snafu::{ensure, OptionExt};

use crate::batch::VotingCardSummary;
use crate::config::{ImportChannel, ImportScope};
use crate::error::*;
use crate::filter::IgnoredCountingCircle;
use crate::ids::*;
use crate::tally::ResultTally;

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ImportRecordKind {
    /// A successful import and the data it brought in.
    Import {
        results: BTreeMap<ResultKey, ResultTally>,
        /// The businesses the batch delivered results for.
        businesses: BTreeSet<PoliticalBusinessId>,
        voting_cards: BTreeMap<CountingCircleId, VotingCardSummary>,
    },
    /// The imported data of the scope was removed.
    DataDeleted,
    /// The import `reverted` was deleted and the data of `restored` is current again.
    Deletion { reverted: ImportId, restored: ImportId },
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ImportRecord {
    pub id: ImportId,
    pub scope: ImportScope,
    pub channel: ImportChannel,
    pub source: String,
    pub message_ids: Vec<String>,
    pub ignored_counting_circles: Vec<IgnoredCountingCircle>,
    pub kind: ImportRecordKind,
    pub predecessor: Option<ImportId>,
    pub successor: Option<ImportId>,
}

impl ImportRecord {
    pub fn results(&self) -> Option<&BTreeMap<ResultKey, ResultTally>> {
        match &self.kind {
            ImportRecordKind::Import { results, .. } => Some(results),
            _ => None,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ImportHistory {
    pub scope: ImportScope,
    records: Vec<ImportRecord>,
}

impl ImportHistory {
    pub fn new(scope: ImportScope) -> ImportHistory {
        ImportHistory {
            scope,
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[ImportRecord] {
        &self.records
    }

    pub fn get(&self, id: ImportId) -> Option<&ImportRecord> {
        // Identifiers are assigned sequentially from 1.
        let idx = (id.0 as usize).checked_sub(1)?;
        self.records.get(idx)
    }

    pub fn latest(&self) -> Option<&ImportRecord> {
        self.records.last()
    }

    /// The record whose data is in effect when `id` is the tail of the chain.
    pub fn effective_at(&self, id: ImportId) -> Option<&ImportRecord> {
        let record = self.get(id)?;
        match record.kind {
            ImportRecordKind::Deletion { restored, .. } => self.get(restored),
            _ => Some(record),
        }
    }

    /// The record whose data is currently in effect.
    pub fn effective(&self) -> Option<&ImportRecord> {
        self.latest().and_then(|r| self.effective_at(r.id))
    }

    /// The results currently in effect for the scope. Empty when nothing was
    /// imported or the data was deleted.
    pub fn effective_results(&self) -> BTreeMap<ResultKey, ResultTally> {
        self.effective()
            .and_then(|r| r.results())
            .cloned()
            .unwrap_or_default()
    }

    pub fn effective_businesses(&self) -> BTreeSet<PoliticalBusinessId> {
        match self.effective().map(|r| &r.kind) {
            Some(ImportRecordKind::Import { businesses, .. }) => businesses.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub fn effective_voting_cards(&self) -> BTreeMap<CountingCircleId, VotingCardSummary> {
        match self.effective().map(|r| &r.kind) {
            Some(ImportRecordKind::Import { voting_cards, .. }) => voting_cards.clone(),
            _ => BTreeMap::new(),
        }
    }

    fn next_record(
        &self,
        channel: ImportChannel,
        source: &str,
        message_ids: Vec<String>,
        ignored_counting_circles: Vec<IgnoredCountingCircle>,
        kind: ImportRecordKind,
    ) -> ImportRecord {
        ImportRecord {
            id: ImportId(self.records.len() as u64 + 1),
            scope: self.scope.clone(),
            channel,
            source: source.to_string(),
            message_ids,
            ignored_counting_circles,
            kind,
            predecessor: self.latest().map(|r| r.id),
            successor: None,
        }
    }

    /// The record of a new import. The history itself is not modified.
    #[allow(clippy::too_many_arguments)]
    pub fn create_import(
        &self,
        channel: ImportChannel,
        source: &str,
        message_ids: Vec<String>,
        ignored_counting_circles: Vec<IgnoredCountingCircle>,
        results: BTreeMap<ResultKey, ResultTally>,
        businesses: BTreeSet<PoliticalBusinessId>,
        voting_cards: BTreeMap<CountingCircleId, VotingCardSummary>,
    ) -> ImportRecord {
        self.next_record(
            channel,
            source,
            message_ids,
            ignored_counting_circles,
            ImportRecordKind::Import {
                results,
                businesses,
                voting_cards,
            },
        )
    }

    /// The record marking the imported data of the scope as deleted.
    pub fn mark_data_deleted(&self, channel: ImportChannel, source: &str) -> ImportRecord {
        self.next_record(channel, source, vec![], vec![], ImportRecordKind::DataDeleted)
    }

    /// The record reverting the import currently in effect to its predecessor.
    pub fn delete_latest(
        &self,
        channel: ImportChannel,
        source: &str,
    ) -> ImportResult<ImportRecord> {
        let current = self.effective().context(NoImportToDeleteSnafu {
            scope: self.scope.clone(),
        })?;
        let predecessor = current.predecessor.context(NothingToRevertToSnafu {
            scope: self.scope.clone(),
            import: current.id,
        })?;
        let restored = self.effective_at(predecessor).context(NothingToRevertToSnafu {
            scope: self.scope.clone(),
            import: current.id,
        })?;
        debug!(
            "delete_latest: {}: reverting {} to {}",
            self.scope, current.id, restored.id
        );
        Ok(self.next_record(
            channel,
            source,
            vec![],
            vec![],
            ImportRecordKind::Deletion {
                reverted: current.id,
                restored: restored.id,
            },
        ))
    }

    /// Appends a record created from this history. Fails if another record
    /// was appended in between.
    pub fn append(&mut self, mut record: ImportRecord) -> ImportResult<()> {
        let tail = self.latest().map(|r| r.id);
        ensure!(
            record.predecessor == tail && record.id == ImportId(self.records.len() as u64 + 1),
            ChainConflictSnafu {
                scope: self.scope.clone(),
                expected: record.predecessor,
                found: tail,
            }
        );
        record.successor = None;
        if let Some(last) = self.records.last_mut() {
            last.successor = Some(record.id);
        }
        self.records.push(record);
        Ok(())
    }
}
