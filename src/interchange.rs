use log::info;
use serde_json::json;
use serde_json::Value as JSValue;
use snafu::{prelude::*, Snafu};

use result_import::*;

pub mod config_reader;
mod io_batch;
mod io_common;
mod io_snapshot;

pub use crate::interchange::io_batch::*;
pub use crate::interchange::io_common::simplify_file_name;
pub use crate::interchange::io_snapshot::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InterchangeError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON document {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid {document} document: {message}"))]
    InvalidDocument { document: String, message: String },
    #[snafu(display("Import of {source_name} failed"))]
    Import {
        source: ImportError,
        source_name: String,
    },
}

pub type InterchangeResult<T> = Result<T, InterchangeError>;

impl InterchangeError {
    /// The category of the engine failure, if the import itself failed.
    pub fn import_category(&self) -> Option<ErrorCategory> {
        match self {
            InterchangeError::Import { source, .. } => Some(source.category()),
            _ => None,
        }
    }
}

/// The documents of one import.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ImportFiles {
    pub snapshot: String,
    pub settings: Option<String>,
    pub batch: String,
}

/// Imports a batch into the store. Batches naming a counting circle are
/// e-counting imports, all others e-voting imports of a whole contest.
pub fn run_import_batch<R: DomainSnapshotReader, S: ResultStore>(
    snapshot: &R,
    store: &mut S,
    settings: &ImportSettings,
    batch: &ImportBatch,
) -> InterchangeResult<ImportOutcome> {
    let mut importer = ResultImporter::new(snapshot, store, settings);
    let res = match batch.counting_circle {
        None => importer.import_contest(batch),
        Some(_) => importer.import_counting_circle(batch),
    };
    res.context(ImportSnafu {
        source_name: batch.source.clone(),
    })
}

/// Reads the documents and runs the import against the store.
pub fn run_import<S: ResultStore>(
    files: &ImportFiles,
    store: &mut S,
) -> InterchangeResult<ImportOutcome> {
    let snapshot = read_snapshots(&[files.snapshot.clone()])?;
    let settings = match &files.settings {
        Some(path) => config_reader::read_settings(path)?,
        None => ImportSettings::default(),
    };
    let batch = read_batch(&files.batch)?;
    info!(
        "run_import: importing {} into contest {}",
        batch.source, batch.contest_id
    );
    run_import_batch(&snapshot, store, &settings, &batch)
}

fn ignore_reason_js(reason: IgnoreReason) -> &'static str {
    match reason {
        IgnoreReason::TestCountingCircle => "testCountingCircle",
        IgnoreReason::UnknownCountingCircle => "unknownCountingCircle",
    }
}

/// A JSON summary of an outcome, for the callers recomputing end results.
pub fn outcome_to_json(outcome: &ImportOutcome) -> JSValue {
    let changed: Vec<JSValue> = outcome
        .changed_results
        .iter()
        .map(|k| {
            json!({
                "politicalBusinessId": k.business_id.as_str(),
                "countingCircleId": k.counting_circle_id.as_str(),
            })
        })
        .collect();
    let transitions: Vec<JSValue> = outcome
        .transitions
        .iter()
        .map(|t| {
            json!({
                "politicalBusinessId": t.key.business_id.as_str(),
                "countingCircleId": t.key.counting_circle_id.as_str(),
                "from": format!("{:?}", t.from),
                "to": format!("{:?}", t.to),
            })
        })
        .collect();
    let ignored: Vec<JSValue> = outcome
        .ignored_counting_circles
        .iter()
        .map(|i| json!({"countingCircle": i.external_id, "reason": ignore_reason_js(i.reason)}))
        .collect();
    json!({
        "importId": outcome.import_id.0,
        "contestId": outcome.scope.contest_id.as_str(),
        "countingCircleId": outcome.scope.counting_circle_id.as_ref().map(|cc| cc.as_str()),
        "channel": outcome.scope.channel().to_string(),
        "changedResults": changed,
        "stateTransitions": transitions,
        "ignoredCountingCircles": ignored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn test_dir() -> String {
        format!("{}/testdata", env!("CARGO_MANIFEST_DIR"))
    }

    fn files(batch: &str) -> ImportFiles {
        let d = test_dir();
        ImportFiles {
            snapshot: format!("{}/snapshot.json", d),
            settings: Some(format!("{}/settings.json", d)),
            batch: format!("{}/{}", d, batch),
        }
    }

    fn contest_scope() -> ImportScope {
        ImportScope::contest(ContestId::from("contest-2026-11"))
    }

    #[test]
    fn evoting_import_from_documents() {
        init_logger();
        let mut store = InMemoryResultStore::new();
        let outcome = run_import(&files("evoting_batch.json"), &mut store).unwrap();
        assert_eq!(outcome.import_id, ImportId(1));
        assert_eq!(outcome.scope, contest_scope());
        assert_eq!(outcome.ignored_counting_circles.len(), 1);
        assert_eq!(outcome.ignored_counting_circles[0].external_id, "9170");

        let summary = outcome_to_json(&outcome);
        assert_eq!(summary["channel"], "eVoting");
        assert_eq!(summary["ignoredCountingCircles"][0]["reason"], "testCountingCircle");
        assert!(summary["countingCircleId"].is_null());

        let key = ResultKey::new(
            PoliticalBusinessId::from("vote-1"),
            CountingCircleId::from("cc-a"),
        );
        match store
            .counting_circle_result(&key)
            .and_then(|r| r.imported_tally(ImportChannel::EVoting).cloned())
        {
            Some(ResultTally::Vote(t)) => {
                let bt = &t.ballots[&BallotId::from("vote-1-ballot")];
                assert_eq!(bt.total_ballots, 3);
                assert_eq!(bt.blank_ballots, 1);
                assert_eq!(bt.questions[&1].yes, 1);
                assert_eq!(bt.questions[&1].no, 1);
            }
            other => panic!("unexpected tally {:?}", other),
        }

        let key = ResultKey::new(
            PoliticalBusinessId::from("maj-1"),
            CountingCircleId::from("cc-b"),
        );
        match store
            .counting_circle_result(&key)
            .and_then(|r| r.imported_tally(ImportChannel::EVoting).cloned())
        {
            Some(ResultTally::MajorityElection(t)) => {
                assert_eq!(t.primary.total_ballots, 0);
                assert!(t.secondaries.contains_key(&PoliticalBusinessId::from("maj-1-sec")));
            }
            other => panic!("unexpected tally {:?}", other),
        }
    }

    #[test]
    fn ecounting_import_from_documents() {
        init_logger();
        let mut store = InMemoryResultStore::new();
        let outcome = run_import(&files("ecounting_batch.json"), &mut store).unwrap();
        assert_eq!(
            outcome.scope,
            ImportScope::counting_circle(
                ContestId::from("contest-2026-11"),
                CountingCircleId::from("cc-a"),
            )
        );
        let key = ResultKey::new(
            PoliticalBusinessId::from("prop-1"),
            CountingCircleId::from("cc-a"),
        );
        match store
            .counting_circle_result(&key)
            .and_then(|r| r.imported_tally(ImportChannel::ECounting).cloned())
        {
            Some(ResultTally::ProportionalElection(t)) => {
                assert_eq!(t.total_ballots, 3);
                assert_eq!(t.lists[&ListId::from("l1")].unmodified_ballots, 1);
                assert_eq!(t.candidates[&CandidateId::from("a1")].unmodified_votes, 2);
                assert_eq!(t.candidates[&CandidateId::from("b1")].votes_on_other_lists, 1);
                assert_eq!(t.without_list.modified_ballots, 1);
            }
            other => panic!("unexpected tally {:?}", other),
        }
        let key = ResultKey::new(
            PoliticalBusinessId::from("maj-1"),
            CountingCircleId::from("cc-a"),
        );
        match store
            .counting_circle_result(&key)
            .and_then(|r| r.imported_tally(ImportChannel::ECounting).cloned())
        {
            Some(ResultTally::MajorityElection(t)) => {
                assert_eq!(t.primary.write_ins["Hans Muster"], 1);
                assert_eq!(t.primary.invalid_vote_count, 1);
            }
            other => panic!("unexpected tally {:?}", other),
        }
    }

    #[test]
    fn invalid_batch_leaves_the_store_untouched() {
        let mut store = InMemoryResultStore::new();
        let err = run_import(&files("evoting_batch_overvote.json"), &mut store).unwrap_err();
        assert_eq!(err.import_category(), Some(ErrorCategory::DataShape));
        assert!(store.results().is_empty());
        assert!(store.import_history(&contest_scope()).records().is_empty());
    }

    #[test]
    fn missing_document_is_reported() {
        let mut store = InMemoryResultStore::new();
        let err = run_import(&files("does_not_exist.json"), &mut store).unwrap_err();
        assert!(matches!(err, InterchangeError::OpeningJson { .. }));
        assert_eq!(err.import_category(), None);
    }
}
