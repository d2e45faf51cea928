use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use encoding_rs::Encoding;

use crate::builder::SearchBuilder;
use crate::cancel::CancellationToken;
use crate::engine::SearchTarget;
use crate::error::{Result, TrawlError};
use crate::filter::MatcherOptions;
use crate::predicate::DirectoryPredicate;
use crate::progress::Reporter;
use crate::results::Outcome;
use crate::sync::compare::{CompareProperties, SyncConflictResolution};
use crate::sync::engine::{SyncEngine, SyncOptions};
use crate::traits::{DecisionProvider, ProgressSink};

/// Configures a two-way sync between two directories.
///
/// Created via [`trawl::sync()`](crate::sync()). The search setters narrow
/// which entries take part; both passes use the same filters.
///
/// ```rust,no_run
/// use trawl::sync::SyncConflictResolution;
///
/// let outcome = trawl::sync("/data/a", "/data/b")
///     .conflict_resolution(SyncConflictResolution::FirstWins)
///     .dry_run(true)
///     .run()?;
/// println!("{} to add", outcome.telemetry.added);
/// # Ok::<(), trawl::TrawlError>(())
/// ```
pub struct SyncBuilder<'a> {
    second:    PathBuf,
    search:    SearchBuilder,
    options:   SyncOptions,
    decisions: Option<Box<dyn DecisionProvider + 'a>>,
    progress:  Option<Box<dyn ProgressSink + 'a>>,
}

impl<'a> SyncBuilder<'a> {
    pub(crate) fn new(first: PathBuf, second: PathBuf) -> Self {
        Self {
            second,
            search:    SearchBuilder::new(first).target(SearchTarget::All),
            options:   SyncOptions::default(),
            decisions: None,
            progress:  None,
        }
    }

    // ── Search ────────────────────────────────────────────────────────────

    pub fn files(mut self, options: MatcherOptions) -> Self {
        self.search = self.search.files(options);
        self
    }

    pub fn directories(mut self, options: MatcherOptions) -> Self {
        self.search = self.search.directories(options);
        self
    }

    /// Entries taking part. `All` by default.
    pub fn target(mut self, target: SearchTarget) -> Self {
        self.search = self.search.target(target);
        self
    }

    pub fn recurse(mut self, yes: bool) -> Self {
        self.search = self.search.recurse(yes);
        self
    }

    pub fn directory_predicate(mut self, predicate: DirectoryPredicate) -> Self {
        self.search = self.search.directory_predicate(predicate);
        self
    }

    pub fn default_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.search = self.search.default_encoding(encoding);
        self
    }

    pub fn ignore_inaccessible(mut self, yes: bool) -> Self {
        self.search = self.search.ignore_inaccessible(yes);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.search = self.search.cancellation(token);
        self
    }

    // ── Sync ──────────────────────────────────────────────────────────────

    /// Properties two files must share to be left alone. Size and modified
    /// time by default.
    pub fn compare(mut self, properties: CompareProperties) -> Self {
        self.options.compare = properties;
        self
    }

    /// Tolerance for modified-time comparisons.
    pub fn allowed_time_diff(mut self, tolerance: Duration) -> Self {
        self.options.allowed_time_diff = tolerance;
        self
    }

    pub fn conflict_resolution(mut self, resolution: SyncConflictResolution) -> Self {
        self.options.conflict_resolution = resolution;
        self
    }

    pub fn detect_rename(mut self, yes: bool) -> Self {
        self.options.detect_rename = yes;
        self
    }

    /// Decide and report everything, change nothing.
    pub fn dry_run(mut self, yes: bool) -> Self {
        self.options.dry_run = yes;
        self
    }

    /// Required when the resolution is [`SyncConflictResolution::Ask`].
    pub fn decisions(mut self, provider: impl DecisionProvider + 'a) -> Self {
        self.decisions = Some(Box::new(provider));
        self
    }

    pub fn progress(mut self, sink: impl ProgressSink + 'a) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    // ── Execute ───────────────────────────────────────────────────────────

    /// Validate the configuration and create the engine.
    ///
    /// # Errors
    ///
    /// `InvalidSource` if either root is not a directory, `InvalidConfig` if
    /// the roots are the same or nested, or if `Ask` has no decision provider.
    pub fn build(self) -> Result<SyncEngine<'a>> {
        let first = canonical_dir(self.search.root())?;
        let second = canonical_dir(&self.second)?;

        if first == second {
            return Err(TrawlError::InvalidConfig("cannot sync a directory with itself".into()));
        }
        if first.starts_with(&second) || second.starts_with(&first) {
            return Err(TrawlError::InvalidConfig(
                "cannot sync a directory with its own subdirectory".into(),
            ));
        }
        if self.options.conflict_resolution == SyncConflictResolution::Ask && self.decisions.is_none() {
            return Err(TrawlError::InvalidConfig(
                "conflict resolution Ask needs a decision provider".into(),
            ));
        }

        let reporter = Reporter::new(self.progress, self.options.dry_run);
        let search = self.search.with_root(&first);
        Ok(SyncEngine::new(first, second, search, self.options, self.decisions, reporter))
    }

    pub fn run(self) -> Result<Outcome> {
        self.build()?.run()
    }
}

fn canonical_dir(path: &Path) -> Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(canonical) if canonical.is_dir() => Ok(canonical),
        _ => Err(TrawlError::InvalidSource(path.to_path_buf())),
    }
}
