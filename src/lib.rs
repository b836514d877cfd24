//! JSON interchange layer of the result import engine.
//!
//! Reads the domain snapshot of a contest, the import settings and a
//! normalized result batch, and runs the import against a result store.

mod interchange;

pub use crate::interchange::*;
