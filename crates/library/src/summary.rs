use crate::outcome::{FailureKind, Outcome};
use std::collections::BTreeMap;
use std::time::Duration;
use time::UtcDateTime;

/// Aggregate counters for one run, as consumed by the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub processed: usize,
    pub with_achievements: usize,
    pub without_achievements: usize,
    pub errored: usize,
    /// Subset of `errored`: hashes nobody has heard of.
    pub unknown: usize,
    pub failures: BTreeMap<FailureKind, usize>,
    /// Requests sent to the catalog during the run, retries included.
    pub catalog_calls: u64,
    pub started: UtcDateTime,
    pub duration: Duration,
}

impl Summary {
    pub fn new(started: UtcDateTime) -> Self {
        Self {
            processed: 0,
            with_achievements: 0,
            without_achievements: 0,
            errored: 0,
            unknown: 0,
            failures: BTreeMap::new(),
            catalog_calls: 0,
            started,
            duration: Duration::ZERO,
        }
    }

    pub fn record(&mut self, outcome: &Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::HasAchievements(_) => self.with_achievements += 1,
            Outcome::NoAchievements => self.without_achievements += 1,
            Outcome::Error(failure) => {
                self.errored += 1;
                if failure.kind == FailureKind::UnknownRom {
                    self.unknown += 1;
                }
                *self.failures.entry(failure.kind).or_default() += 1;
            },
        }
    }
}
