//! # trawl
//!
//! Lazy, cancellable filesystem search with two-way directory sync.
//!
//! trawl walks a directory tree breadth-first and yields only the entries
//! that pass a set of filters: name patterns over a chosen part of the path,
//! extensions, attributes, size and time ranges, emptiness and text content
//! (with byte-order-mark sniffing). Each `next()` does just enough I/O to
//! produce the next match, and cheap filters always run before expensive
//! ones.
//!
//! On top of the walker sit the [`sync`] engine, which reconciles two
//! directories in two passes, and the bulk operations in [`ops`]. All of
//! them report what they do through a [`ProgressSink`] and ask for conflict
//! decisions through a [`DecisionProvider`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trawl::{Filter, MatcherOptions};
//!
//! let results = trawl::search("/home/me/documents")
//!     .files(MatcherOptions::named(Filter::new(r"(?i)invoice")?))
//!     .collect_matches(true)
//!     .run()?;
//!
//! for entry in &results.matches {
//!     println!("{}", entry.path().display());
//! }
//! println!(
//!     "{} matches in {:.3}s",
//!     results.telemetry.matches,
//!     results.telemetry.elapsed.as_secs_f64()
//! );
//! # Ok::<(), trawl::TrawlError>(())
//! ```
//!
//! # Lazy walking
//!
//! [`SearchBuilder::build`] returns the walker itself. Stop pulling and
//! nothing more is read:
//!
//! ```rust,no_run
//! use trawl::{Filter, MatcherOptions};
//!
//! let mut walker = trawl::search(".")
//!     .files(MatcherOptions {
//!         content: Some(Filter::new("TODO")?),
//!         ..MatcherOptions::default()
//!     })
//!     .build()?;
//!
//! if let Some(first) = walker.next() {
//!     println!("first TODO in {}", first?.path().display());
//! }
//! # Ok::<(), trawl::TrawlError>(())
//! ```

#![forbid(unsafe_code)]

pub mod encoding;
pub mod engine;
pub mod ops;
pub mod sync;

mod builder;
mod cancel;
mod entry;
mod error;
mod filter;
mod fsops;
mod matcher;
mod predicate;
mod progress;
mod results;
mod span;
mod traits;

use std::path::PathBuf;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::SearchBuilder;
pub use cancel::CancellationToken;
pub use engine::{SearchTarget, SearchWalker};
pub use entry::{EntryKind, EntryMatch, MetadataState};
pub use error::{Result, TrawlError};
pub use filter::{
    Attributes, Capture, EmptyOption, ExtensionFilter, Filter, MatcherOptions, SizeFilter,
    TimeFilter, ValueFilter,
};
pub use matcher::EntryMatcher;
pub use predicate::{DirectoryPredicate, MatchStatus};
pub use progress::{OperationKind, ProgressEvent};
pub use results::{Outcome, SearchResults, SearchTelemetry, TerminationReason};
pub use span::{PathPart, PathSpan};
pub use traits::{Conflict, DecisionProvider, DialogResult, Presence, ProgressSink};

// ── Entry points ──────────────────────────────────────────────────────────────

/// Create a new [`SearchBuilder`] rooted at `root`.
///
/// # Example
///
/// ```rust,no_run
/// use trawl::{ExtensionFilter, MatcherOptions};
///
/// let results = trawl::search("/var/log")
///     .files(MatcherOptions {
///         extension: Some(ExtensionFilter::new(["log", "gz"])),
///         ..MatcherOptions::default()
///     })
///     .limit(100)
///     .run()?;
///
/// println!("{} log files", results.telemetry.matches);
/// # Ok::<(), trawl::TrawlError>(())
/// ```
pub fn search(root: impl Into<PathBuf>) -> SearchBuilder {
    SearchBuilder::new(root.into())
}

/// Create a [`SyncBuilder`](sync::SyncBuilder) that reconciles `first` and
/// `second`.
pub fn sync<'a>(first: impl Into<PathBuf>, second: impl Into<PathBuf>) -> sync::SyncBuilder<'a> {
    sync::SyncBuilder::new(first.into(), second.into())
}
