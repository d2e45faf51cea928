//! Bulk operations over the matches of a search: delete, rename, copy and move.
//!
//! Each operation takes a configured [`SearchBuilder`](crate::SearchBuilder),
//! walks its matches once and reports one progress event per match.

mod copy;
mod delete;
mod rename;

pub use copy::{ConflictResolution, CopyMode, CopyOperation};
pub use delete::DeleteOperation;
pub use rename::{RenameOperation, Replacement};

use std::time::Instant;

use crate::engine::SearchWalker;
use crate::entry::EntryMatch;
use crate::error::Result;
use crate::progress::Reporter;
use crate::results::{Outcome, TerminationReason};

/// Next match of `walker`, with recoverable errors reported and skipped.
fn next_match(walker: &mut SearchWalker, reporter: &mut Reporter<'_>) -> Result<Option<EntryMatch>> {
    loop {
        match walker.next() {
            None => return Ok(None),
            Some(Ok(entry)) => {
                if entry.is_directory() {
                    reporter.telemetry.processed_directories += 1;
                } else {
                    reporter.telemetry.processed_files += 1;
                }
                return Ok(Some(entry));
            }
            Some(Err(e)) if e.is_recoverable() => reporter.fail(walker.root(), e),
            Some(Err(e)) => return Err(e),
        }
    }
}

fn finish(walker: &SearchWalker, reporter: Reporter<'_>, started: Instant, canceled: bool) -> Outcome {
    let mut telemetry = reporter.telemetry;
    telemetry.absorb_search(&walker.telemetry());
    telemetry.elapsed = started.elapsed();

    let termination = if canceled {
        TerminationReason::Canceled
    } else {
        walker.termination().unwrap_or(TerminationReason::Completed)
    };
    Outcome {
        telemetry,
        termination,
    }
}
