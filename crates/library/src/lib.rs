//! Turns a directory of ROMs into sorted output and a report.
//!
//! [`Reconciler`] classifies each file against the hash library (asking the
//! catalog on a miss), [`Sorter`] places the files, and [`Report`] renders
//! what happened.

pub mod error;
mod outcome;
mod reconcile;
mod report;
pub mod sort;
mod summary;

pub use crate::outcome::{ClassifiedRom, Failure, FailureKind, Outcome};
pub use crate::reconcile::{Reconciler, Run, import_catalog, refresh};
pub use crate::report::{Report, ReportedError};
pub use crate::sort::dedupe::{DedupeStats, dedupe_folder, dedupe_output};
pub use crate::sort::{
    Action, DUPLICATES_DIR, Placement, Sorter, Transfer, WITH_ACHIEVEMENTS_DIR, WITHOUT_ACHIEVEMENTS_DIR,
};
pub use crate::summary::Summary;
