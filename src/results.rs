use std::time::Duration;

use crate::entry::EntryMatch;
use crate::error::TrawlError;
use crate::progress::OperationKind;

/// Counters for one search, sync or entry-operation run.
///
/// Only the walker and the engines built on it write these; everyone else
/// gets a copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchTelemetry {
    /// Directories whose entries were enumerated.
    pub searched_directories: usize,

    /// Files encountered (matched or not).
    pub files: usize,

    /// Subdirectories encountered (matched or not).
    pub directories: usize,

    pub matching_files: usize,
    pub matching_directories: usize,

    /// Entries handed to an operation (sync, delete, rename, copy, move).
    pub processed_files: usize,
    pub processed_directories: usize,

    /// Matches yielded by the walker.
    pub matches: usize,

    pub added: usize,
    pub updated: usize,
    pub renamed: usize,
    pub deleted: usize,

    /// Recoverable errors reported while processing.
    pub errors: usize,

    /// Combined size of matched files, in bytes.
    ///
    /// A walker only counts files whose metadata a filter already fetched;
    /// [`SearchBuilder::run`](crate::SearchBuilder::run) counts every match.
    pub total_size: u64,

    /// Wall-clock time from start to completion.
    pub elapsed: Duration,
}

impl SearchTelemetry {
    /// Entries scanned per second, clamped to 0 on zero-duration runs.
    pub fn entries_per_sec(&self) -> usize {
        let total = self.files + self.directories;
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (total as f64 / secs) as usize
        } else {
            0
        }
    }

    pub(crate) fn record(&mut self, kind: OperationKind) {
        match kind {
            OperationKind::Add => self.added += 1,
            OperationKind::Update => self.updated += 1,
            OperationKind::Rename => self.renamed += 1,
            OperationKind::Delete => self.deleted += 1,
            OperationKind::None => {}
        }
    }

    /// Fold in the search counters of a finished walker.
    pub(crate) fn absorb_search(&mut self, other: &SearchTelemetry) {
        self.searched_directories += other.searched_directories;
        self.files += other.files;
        self.directories += other.directories;
        self.matching_files += other.matching_files;
        self.matching_directories += other.matching_directories;
        self.matches += other.matches;
        self.total_size += other.total_size;
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The traversal was exhausted.
    Completed,

    /// The cancellation token fired or a decision provider answered `Cancel`.
    Canceled,

    /// The match limit was reached.
    MaxReached,
}

/// The output of [`SearchBuilder::run`](crate::SearchBuilder::run).
///
/// `matches` and `errors` are both opt-in, disabled by default to avoid
/// holding every match in memory. Enable them on the builder:
/// `.collect_matches(true)` and `.collect_errors(true)`.
#[derive(Debug)]
pub struct SearchResults {
    /// Matched entries, in the order they were found.
    pub matches: Vec<EntryMatch>,

    pub telemetry: SearchTelemetry,

    pub termination: TerminationReason,

    /// Recoverable errors encountered during the search (permission denied, etc.).
    /// Use [`TrawlError::is_recoverable`] to distinguish warnings from failures.
    pub errors: Vec<TrawlError>,
}

/// The output of a sync run or an entry operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub telemetry: SearchTelemetry,
    pub termination: TerminationReason,
}

impl Outcome {
    pub fn is_canceled(&self) -> bool {
        self.termination == TerminationReason::Canceled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_bumps_the_matching_counter() {
        let mut telemetry = SearchTelemetry::default();
        telemetry.record(OperationKind::Add);
        telemetry.record(OperationKind::Rename);
        telemetry.record(OperationKind::None);
        assert_eq!((telemetry.added, telemetry.renamed), (1, 1));
        assert_eq!(telemetry.updated + telemetry.deleted, 0);
    }

    #[test]
    fn entries_per_sec_handles_zero_duration() {
        let telemetry = SearchTelemetry {
            files: 10,
            ..SearchTelemetry::default()
        };
        assert_eq!(telemetry.entries_per_sec(), 0);

        let timed = SearchTelemetry {
            elapsed: Duration::from_secs(2),
            ..telemetry
        };
        assert_eq!(timed.entries_per_sec(), 5);
    }
}
