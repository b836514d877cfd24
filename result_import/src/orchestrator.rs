//! The import operations.
//!
//! Every operation is split into a pure planning step, which computes the
//! complete change set from the stored state, the domain snapshot and the
//! batch, and a single commit of that change set. A failure anywhere before
//! the commit leaves the store untouched.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use snafu::{ensure, OptionExt};

use crate::batch::*;
use crate::builders::{build_section_tally, resolve_section_target, SectionTally};
use crate::config::{ImportChannel, ImportScope, ImportSettings};
use crate::domain::*;
use crate::error::*;
use crate::filter::{CountingCircleFilter, FilteredBatch, IgnoredCountingCircle};
use crate::guard::{StatePreconditionGuard, StateTransition};
use crate::history::{ImportRecord, ImportRecordKind};
use crate::ids::*;
use crate::result::CountingCircleResult;
use crate::store::{ImportChangeSet, ResultStore};
use crate::tally::ResultTally;

/// What a successful operation changed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ImportOutcome {
    pub import_id: ImportId,
    pub scope: ImportScope,
    /// The counting-circle results whose imported data or state changed.
    /// End results and seat apportionments depending on them are stale.
    pub changed_results: Vec<ResultKey>,
    pub transitions: Vec<StateTransition>,
    pub ignored_counting_circles: Vec<IgnoredCountingCircle>,
}

/// A planned operation: the change set to commit and the outcome to report
/// once it is committed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ImportPlan {
    pub changes: ImportChangeSet,
    pub outcome: ImportOutcome,
}

/// The part of the domain snapshot an import is reconciled against.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ContestContext {
    pub info: ContestInfo,
    pub counting_circles: Vec<EligibleCountingCircle>,
    pub catalog: PoliticalBusinessCatalog,
}

impl ContestContext {
    pub fn load<R: DomainSnapshotReader + ?Sized>(
        reader: &R,
        contest_id: &ContestId,
    ) -> ImportResult<ContestContext> {
        Ok(ContestContext {
            info: reader.contest(contest_id)?,
            counting_circles: reader.resolve_eligible_counting_circles(contest_id)?,
            catalog: reader.resolve_businesses_and_candidates(contest_id)?,
        })
    }
}

#[derive(Debug, Default)]
struct BuiltImport {
    results: BTreeMap<ResultKey, ResultTally>,
    businesses: BTreeSet<PoliticalBusinessId>,
    voting_cards: BTreeMap<CountingCircleId, VotingCardSummary>,
}

/// Resolves every section of the accepted counting circles and builds the
/// tallies of the results they target.
fn build_import(
    catalog: &PoliticalBusinessCatalog,
    filtered: &FilteredBatch,
) -> ImportResult<BuiltImport> {
    // Targets are checked for all counting circles before any ballot is counted.
    for (cc, accepted) in filtered.accepted.iter() {
        let mut seen: BTreeSet<&PoliticalBusinessId> = BTreeSet::new();
        for section in accepted.sections.iter() {
            ensure!(
                seen.insert(&section.business_id),
                DuplicateResultSnafu {
                    business: section.business_id.clone(),
                    counting_circle: cc.clone(),
                }
            );
            let (key, _) = resolve_section_target(catalog, cc, section)?;
            ensure!(
                accepted.circle.political_businesses.contains(&key.business_id),
                BusinessNotInCountingCircleSnafu {
                    business: section.business_id.clone(),
                    counting_circle: cc.clone(),
                }
            );
        }
    }

    let mut built = BuiltImport::default();
    for (cc, accepted) in filtered.accepted.iter() {
        for section in accepted.sections.iter() {
            let SectionTally {
                key,
                owner_type,
                delta,
            } = build_section_tally(catalog, cc, section)?;
            built.businesses.insert(section.business_id.clone());
            let tally = built
                .results
                .entry(key)
                .or_insert_with(|| ResultTally::empty(owner_type));
            delta.merge_into(tally);
        }
        built
            .voting_cards
            .insert(cc.clone(), accepted.voting_cards.clone());
    }
    debug!(
        "build_import: {} results for {} businesses",
        built.results.len(),
        built.businesses.len()
    );
    Ok(built)
}

/// Replaces the channel sub-total of every result in `previous` or `next`.
/// Results only in `previous` lose their sub-total. Returns the results that
/// actually changed.
fn replace_channel_tallies<S: ResultStore + ?Sized>(
    store: &S,
    guard: &mut StatePreconditionGuard,
    channel: ImportChannel,
    previous: &BTreeMap<ResultKey, ResultTally>,
    next: &BTreeMap<ResultKey, ResultTally>,
) -> ImportResult<Vec<CountingCircleResult>> {
    let keys: BTreeSet<&ResultKey> = previous.keys().chain(next.keys()).collect();
    let mut changed = Vec::new();
    for key in keys {
        let stored = store.counting_circle_result(key);
        let mut result = match (&stored, next.get(key).or_else(|| previous.get(key))) {
            (Some(r), _) => r.clone(),
            (None, Some(tally)) => CountingCircleResult::new(key.clone(), tally.business_type()),
            (None, None) => continue,
        };
        guard.ensure_mutable(&mut result)?;
        match next.get(key) {
            Some(tally) => {
                result.imported.insert(channel, tally.clone());
            }
            None => {
                result.imported.remove(&channel);
            }
        }
        if stored.as_ref() != Some(&result) {
            changed.push(result);
        }
    }
    Ok(changed)
}

fn voting_card_changes(
    previous: &BTreeMap<CountingCircleId, VotingCardSummary>,
    next: &BTreeMap<CountingCircleId, VotingCardSummary>,
) -> Vec<(CountingCircleId, Option<VotingCardSummary>)> {
    let mut changes: Vec<(CountingCircleId, Option<VotingCardSummary>)> = next
        .iter()
        .map(|(cc, vc)| (cc.clone(), Some(vc.clone())))
        .collect();
    for cc in previous.keys().filter(|cc| !next.contains_key(*cc)) {
        changes.push((cc.clone(), None));
    }
    changes
}

fn finish_plan(
    scope: ImportScope,
    channel: ImportChannel,
    results: Vec<CountingCircleResult>,
    voting_cards: Vec<(CountingCircleId, Option<VotingCardSummary>)>,
    record: ImportRecord,
    guard: StatePreconditionGuard,
) -> ImportPlan {
    let outcome = ImportOutcome {
        import_id: record.id,
        scope: scope.clone(),
        changed_results: results.iter().map(|r| r.key.clone()).collect(),
        transitions: guard.into_transitions(),
        ignored_counting_circles: record.ignored_counting_circles.clone(),
    };
    ImportPlan {
        changes: ImportChangeSet {
            scope,
            channel,
            results,
            voting_cards,
            record,
        },
        outcome,
    }
}

/// Plans an e-voting import covering every counting circle of a contest.
pub fn plan_contest_import<S: ResultStore + ?Sized>(
    context: &ContestContext,
    store: &S,
    settings: &ImportSettings,
    batch: &ImportBatch,
) -> ImportResult<ImportPlan> {
    let channel = ImportChannel::EVoting;
    if let Some(cc) = &batch.counting_circle {
        return UnexpectedCountingCircleScopeSnafu {
            counting_circle: cc.clone(),
        }
        .fail();
    }
    ensure!(
        batch.contest_id == context.info.id,
        ScopeMismatchSnafu {
            expected: context.info.id.to_string(),
            found: batch.contest_id.to_string(),
        }
    );
    let scope = ImportScope::contest(context.info.id.clone());
    info!(
        "plan_contest_import: {} from {} ({} result entries)",
        scope,
        batch.source,
        batch.results.len()
    );

    let filter = CountingCircleFilter::for_contest(
        channel,
        &context.counting_circles,
        &context.catalog,
        settings.test_counting_circles(channel, &context.info.canton),
    );
    let filtered = filter.filter(&batch.results, &batch.voting_cards)?;
    let built = build_import(&context.catalog, &filtered)?;

    let history = store.import_history(&scope);
    let mut guard = StatePreconditionGuard::new(context.info.testing_phase_ended);
    let results = replace_channel_tallies(
        store,
        &mut guard,
        channel,
        &history.effective_results(),
        &built.results,
    )?;
    let voting_cards = voting_card_changes(&history.effective_voting_cards(), &built.voting_cards);
    let record = history.create_import(
        channel,
        &batch.source,
        batch.message_ids.clone(),
        filtered.ignored,
        built.results,
        built.businesses,
        built.voting_cards,
    );
    Ok(finish_plan(scope, channel, results, voting_cards, record, guard))
}

/// Plans an e-counting import for the single counting circle named by the batch.
pub fn plan_counting_circle_import<S: ResultStore + ?Sized>(
    context: &ContestContext,
    store: &S,
    settings: &ImportSettings,
    batch: &ImportBatch,
) -> ImportResult<ImportPlan> {
    let channel = ImportChannel::ECounting;
    let external_id = batch
        .counting_circle
        .as_ref()
        .context(MissingCountingCircleScopeSnafu {})?;
    ensure!(
        batch.contest_id == context.info.id,
        ScopeMismatchSnafu {
            expected: context.info.id.to_string(),
            found: batch.contest_id.to_string(),
        }
    );
    let target = context
        .counting_circles
        .iter()
        .find(|c| c.matches_external_id(external_id))
        .context(UnknownCountingCircleSnafu {
            counting_circle: external_id.clone(),
        })?;
    ensure!(
        target.supports(channel),
        ChannelNotSupportedSnafu {
            counting_circle: target.id.clone(),
            channel,
        }
    );
    // Every delivered entry must belong to the target circle.
    let delivered = batch
        .results
        .iter()
        .map(|e| &e.counting_circle)
        .chain(batch.voting_cards.iter().map(|vc| &vc.counting_circle));
    for ext in delivered {
        let other = context
            .counting_circles
            .iter()
            .any(|c| c.id != target.id && c.matches_external_id(ext));
        ensure!(
            !other,
            ScopeMismatchSnafu {
                expected: external_id.clone(),
                found: ext.clone(),
            }
        );
    }
    let scope = ImportScope::counting_circle(context.info.id.clone(), target.id.clone());
    info!(
        "plan_counting_circle_import: {} from {} ({} result entries)",
        scope,
        batch.source,
        batch.results.len()
    );

    let filter = CountingCircleFilter::for_counting_circle(
        channel,
        &context.counting_circles,
        &context.catalog,
        settings.test_counting_circles(channel, &context.info.canton),
        target,
    );
    let filtered = filter.filter(&batch.results, &batch.voting_cards)?;
    let built = build_import(&context.catalog, &filtered)?;

    let history = store.import_history(&scope);
    // A re-import has to deliver everything the previous import did.
    for business in history.effective_businesses() {
        ensure!(
            built.businesses.contains(&business),
            PreviouslyImportedBusinessMissingSnafu {
                business,
                counting_circle: target.id.clone(),
            }
        );
    }

    let mut guard = StatePreconditionGuard::new(context.info.testing_phase_ended);
    let results = replace_channel_tallies(
        store,
        &mut guard,
        channel,
        &history.effective_results(),
        &built.results,
    )?;
    let voting_cards = voting_card_changes(&history.effective_voting_cards(), &built.voting_cards);
    let record = history.create_import(
        channel,
        &batch.source,
        batch.message_ids.clone(),
        filtered.ignored,
        built.results,
        built.businesses,
        built.voting_cards,
    );
    Ok(finish_plan(scope, channel, results, voting_cards, record, guard))
}

/// Plans the deletion of the import in effect, restoring the data of its
/// predecessor.
pub fn plan_delete_latest<S: ResultStore + ?Sized>(
    contest: &ContestInfo,
    store: &S,
    scope: &ImportScope,
    source: &str,
) -> ImportResult<ImportPlan> {
    let channel = scope.channel();
    let history = store.import_history(scope);
    let record = history.delete_latest(channel, source)?;
    let restored = match &record.kind {
        ImportRecordKind::Deletion { restored, .. } => history.get(*restored),
        _ => None,
    };
    let (next_results, next_cards) = match restored.map(|r| &r.kind) {
        Some(ImportRecordKind::Import {
            results,
            voting_cards,
            ..
        }) => (results.clone(), voting_cards.clone()),
        _ => (BTreeMap::new(), BTreeMap::new()),
    };
    info!(
        "plan_delete_latest: {}: {} restores {:?}",
        scope,
        record.id,
        restored.map(|r| r.id)
    );

    let mut guard = StatePreconditionGuard::new(contest.testing_phase_ended);
    let results = replace_channel_tallies(
        store,
        &mut guard,
        channel,
        &history.effective_results(),
        &next_results,
    )?;
    let voting_cards = voting_card_changes(&history.effective_voting_cards(), &next_cards);
    Ok(finish_plan(scope.clone(), channel, results, voting_cards, record, guard))
}

/// Plans the removal of all imported data of the scope.
pub fn plan_mark_data_deleted<S: ResultStore + ?Sized>(
    contest: &ContestInfo,
    store: &S,
    scope: &ImportScope,
    source: &str,
) -> ImportResult<ImportPlan> {
    let channel = scope.channel();
    let history = store.import_history(scope);
    let record = history.mark_data_deleted(channel, source);
    info!("plan_mark_data_deleted: {}: {}", scope, record.id);

    let mut guard = StatePreconditionGuard::new(contest.testing_phase_ended);
    let results = replace_channel_tallies(
        store,
        &mut guard,
        channel,
        &history.effective_results(),
        &BTreeMap::new(),
    )?;
    let voting_cards = voting_card_changes(&history.effective_voting_cards(), &BTreeMap::new());
    Ok(finish_plan(scope.clone(), channel, results, voting_cards, record, guard))
}

/// Runs import operations against a domain snapshot and a result store.
pub struct ResultImporter<'a, R: DomainSnapshotReader, S: ResultStore> {
    snapshot: &'a R,
    store: &'a mut S,
    settings: &'a ImportSettings,
}

impl<'a, R: DomainSnapshotReader, S: ResultStore> ResultImporter<'a, R, S> {
    pub fn new(
        snapshot: &'a R,
        store: &'a mut S,
        settings: &'a ImportSettings,
    ) -> ResultImporter<'a, R, S> {
        ResultImporter {
            snapshot,
            store,
            settings,
        }
    }

    fn commit(&mut self, plan: ImportPlan) -> ImportResult<ImportOutcome> {
        let ImportPlan { changes, outcome } = plan;
        self.store.commit(changes)?;
        info!(
            "commit: {} {}: {} results changed, {} state transitions, {} counting circles ignored",
            outcome.scope,
            outcome.import_id,
            outcome.changed_results.len(),
            outcome.transitions.len(),
            outcome.ignored_counting_circles.len()
        );
        Ok(outcome)
    }

    /// Imports an e-voting batch for a whole contest.
    pub fn import_contest(&mut self, batch: &ImportBatch) -> ImportResult<ImportOutcome> {
        let context = ContestContext::load(self.snapshot, &batch.contest_id)?;
        let plan = plan_contest_import(&context, &*self.store, self.settings, batch)?;
        self.commit(plan)
    }

    /// Imports an e-counting batch for one counting circle.
    pub fn import_counting_circle(&mut self, batch: &ImportBatch) -> ImportResult<ImportOutcome> {
        let context = ContestContext::load(self.snapshot, &batch.contest_id)?;
        let plan = plan_counting_circle_import(&context, &*self.store, self.settings, batch)?;
        self.commit(plan)
    }

    pub fn delete_latest(&mut self, scope: &ImportScope) -> ImportResult<ImportOutcome> {
        let contest = self.snapshot.contest(&scope.contest_id)?;
        let plan = plan_delete_latest(&contest, &*self.store, scope, "delete latest import")?;
        self.commit(plan)
    }

    pub fn mark_data_deleted(
        &mut self,
        scope: &ImportScope,
        source: &str,
    ) -> ImportResult<ImportOutcome> {
        let contest = self.snapshot.contest(&scope.contest_id)?;
        let plan = plan_mark_data_deleted(&contest, &*self.store, scope, source)?;
        self.commit(plan)
    }
}
