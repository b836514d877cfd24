//! Reconciliation of electronically delivered election and referendum results.
//!
//! A batch of results, delivered by e-voting for a whole contest or by an
//! e-counting system for one counting circle, is filtered against the
//! counting circles of the contest, tallied per political business and merged
//! into the stored counting-circle results. Every import is recorded in an
//! append-only history per scope, and is committed completely or not at all.
//!
//! ```ignore
//! let mut importer = ResultImporter::new(&snapshot, &mut store, &settings);
//! let outcome = importer.import_contest(&batch)?;
//! for key in outcome.changed_results.iter() {
//!     // recompute the end result of key.business_id
//! }
//! ```

mod batch;
mod builders;
mod config;
mod domain;
mod error;
mod filter;
mod guard;
mod history;
mod ids;
mod orchestrator;
mod result;
mod store;
mod tally;

#[cfg(test)]
mod fixtures;

pub use crate::batch::*;
pub use crate::builders::*;
pub use crate::config::*;
pub use crate::domain::*;
pub use crate::error::*;
pub use crate::filter::*;
pub use crate::guard::*;
pub use crate::history::*;
pub use crate::ids::*;
pub use crate::orchestrator::*;
pub use crate::result::*;
pub use crate::store::*;
pub use crate::tally::*;
