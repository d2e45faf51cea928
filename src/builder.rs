use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;

use crate::cancel::CancellationToken;
use crate::engine::{SearchTarget, SearchWalker, WalkConfig};
use crate::entry::EntryKind;
use crate::error::{Result, TrawlError};
use crate::filter::{Filter, MatcherOptions};
use crate::matcher::EntryMatcher;
use crate::predicate::DirectoryPredicate;
use crate::results::{SearchResults, SearchTelemetry, TerminationReason};

// ---------------------------------------------------------------------------
// SearchBuilder
// ---------------------------------------------------------------------------

/// Entry point for configuring and executing a search.
///
/// Created via [`trawl::search()`](crate::search). Configure with chained
/// builder methods, then call [`build()`](SearchBuilder::build) for a lazy
/// [`SearchWalker`] or [`run()`](SearchBuilder::run) to drain it.
///
/// # Example
///
/// ```rust,no_run
/// use trawl::{Filter, MatcherOptions};
///
/// let results = trawl::search("/var/log")
///     .files(MatcherOptions::named(Filter::new(r"\.log$")?))
///     .limit(10)
///     .collect_matches(true)
///     .run()?;
/// # Ok::<(), trawl::TrawlError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SearchBuilder {
    root:            PathBuf,
    files:           Option<MatcherOptions>,
    directories:     Option<MatcherOptions>,
    target:          Option<SearchTarget>,
    predicate:       Option<DirectoryPredicate>,
    config:          WalkConfig,
    cancel:          CancellationToken,
    collect_matches: bool,
    collect_errors:  bool,
}

impl SearchBuilder {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self {
            root,
            files:           None,
            directories:     None,
            target:          None,
            predicate:       None,
            config:          WalkConfig::default(),
            cancel:          CancellationToken::new(),
            collect_matches: false,
            collect_errors:  false,
        }
    }

    // ── Matchers ──────────────────────────────────────────────────────────

    /// Filters for files.
    ///
    /// Without any filters every file matches.
    pub fn files(mut self, options: MatcherOptions) -> Self {
        self.files = Some(options);
        self
    }

    /// Filters for directories.
    ///
    /// Without any filters every directory matches.
    pub fn directories(mut self, options: MatcherOptions) -> Self {
        self.directories = Some(options);
        self
    }

    /// What to yield.
    ///
    /// Defaults to whatever received filters: both → `All`, only
    /// directories → `Directories`, otherwise `Files`.
    pub fn target(mut self, target: SearchTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Include/exclude rule consulted before files in a directory are matched
    /// and before descending into it.
    pub fn directory_predicate(mut self, predicate: DirectoryPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    // ── Options ───────────────────────────────────────────────────────────

    /// Descend into subdirectories. Enabled by default.
    pub fn recurse(mut self, yes: bool) -> Self {
        self.config.recurse = yes;
        self
    }

    /// Encoding for file content without a byte-order-mark. UTF-8 by default.
    pub fn default_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.config.default_encoding = encoding;
        self
    }

    /// Silently skip entries that cannot be read instead of yielding errors.
    pub fn ignore_inaccessible(mut self, yes: bool) -> Self {
        self.config.ignore_inaccessible = yes;
        self
    }

    /// Descend into directories that were themselves matched. Enabled by default.
    ///
    /// Operations that remove or rename matched directories turn this off so
    /// the walker never enters a subtree that was just altered.
    pub fn can_recurse_match(mut self, yes: bool) -> Self {
        self.config.can_recurse_match = yes;
        self
    }

    /// Stop after `n` matches.
    pub fn limit(mut self, n: usize) -> Self {
        self.config.limit = Some(n);
        self
    }

    /// Token that stops the walk at the next entry boundary once cancelled.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Keep matched entries in [`SearchResults::matches`].
    ///
    /// Disabled by default to avoid holding every match in memory.
    pub fn collect_matches(mut self, yes: bool) -> Self {
        self.collect_matches = yes;
        self
    }

    /// Keep recoverable errors in [`SearchResults::errors`].
    ///
    /// Disabled by default. Errors are still counted in the telemetry.
    pub fn collect_errors(mut self, yes: bool) -> Self {
        self.collect_errors = yes;
        self
    }

    // ── Accessors used by the engines ─────────────────────────────────────

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn with_root(mut self, root: &Path) -> Self {
        self.root = root.to_path_buf();
        self
    }

    /// The name filter applied to entries of `kind`, if any.
    pub(crate) fn name_filter(&self, kind: EntryKind) -> Option<&Filter> {
        let options = match kind {
            EntryKind::File => self.files.as_ref(),
            EntryKind::Directory => self.directories.as_ref(),
        };
        options.and_then(|o| o.name.as_ref())
    }

    fn resolved_target(&self) -> SearchTarget {
        self.target.unwrap_or(match (&self.files, &self.directories) {
            (Some(_), Some(_)) => SearchTarget::All,
            (None, Some(_)) => SearchTarget::Directories,
            _ => SearchTarget::Files,
        })
    }

    // ── Execute ───────────────────────────────────────────────────────────

    /// Validate the configuration and create the walker.
    ///
    /// # Errors
    ///
    /// Returns `Err` for fatal configuration errors: a root that is missing or
    /// not a directory, file-only filters on directories, empty ranges, or a
    /// zero limit. Nothing is traversed until the walker is polled.
    pub fn build(mut self) -> Result<SearchWalker> {
        match fs::metadata(&self.root) {
            Ok(metadata) if metadata.is_dir() => {}
            _ => return Err(TrawlError::InvalidSource(self.root)),
        }
        if self.config.limit == Some(0) {
            return Err(TrawlError::InvalidConfig("limit must be greater than zero".into()));
        }

        self.config.target = self.resolved_target();
        let encoding = self.config.default_encoding;

        let files = match self.config.target.includes_files() {
            true => {
                let options = self.files.unwrap_or_default();
                options.validate(false)?;
                Some(EntryMatcher::files(options).with_default_encoding(encoding))
            }
            false => None,
        };
        let directories = match self.config.target.includes_directories() {
            true => {
                let options = self.directories.unwrap_or_default();
                options.validate(true)?;
                Some(EntryMatcher::directories(options))
            }
            false => None,
        };

        Ok(SearchWalker::new(
            self.root,
            self.config,
            files,
            directories,
            self.predicate,
            self.cancel,
        ))
    }

    /// Drain the walker and return aggregated results.
    ///
    /// Recoverable errors never stop the search; they are counted and, with
    /// `.collect_errors(true)`, kept in [`SearchResults::errors`].
    pub fn run(self) -> Result<SearchResults> {
        let collect_matches = self.collect_matches;
        let collect_errors = self.collect_errors;

        let mut walker = self.build()?;
        let mut matches = Vec::new();
        let mut errors = Vec::new();
        let mut error_count = 0;
        let mut unmeasured = 0;

        for item in walker.by_ref() {
            match item {
                Ok(mut found) => {
                    // The walker only sums sizes it already fetched.
                    if found.is_file() && !found.metadata_state().is_fetched() {
                        if let Ok(metadata) = found.metadata() {
                            unmeasured += metadata.len();
                        }
                    }
                    if collect_matches {
                        matches.push(found);
                    }
                }
                Err(e) => {
                    error_count += 1;
                    if collect_errors {
                        errors.push(e);
                    }
                }
            }
        }

        let walked = walker.telemetry();
        let telemetry = SearchTelemetry {
            errors: error_count,
            total_size: walked.total_size + unmeasured,
            ..walked
        };
        Ok(SearchResults {
            matches,
            telemetry,
            termination: walker.termination().unwrap_or(TerminationReason::Completed),
            errors,
        })
    }
}
