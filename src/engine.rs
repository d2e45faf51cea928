use std::collections::VecDeque;
use std::fs;
use std::iter::FusedIterator;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::Instant;

use encoding_rs::Encoding;
use tracing::{debug, trace};

use crate::cancel::CancellationToken;
use crate::entry::EntryMatch;
use crate::error::{Result, TrawlError};
use crate::matcher::EntryMatcher;
use crate::predicate::{DirectoryPredicate, MatchStatus};
use crate::results::{SearchTelemetry, TerminationReason};

// ---------------------------------------------------------------------------
// WalkConfig
// ---------------------------------------------------------------------------

/// What kind of entries a search yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchTarget {
    #[default]
    Files,
    Directories,
    All,
}

impl SearchTarget {
    pub fn includes_files(self) -> bool {
        matches!(self, Self::Files | Self::All)
    }

    pub fn includes_directories(self) -> bool {
        matches!(self, Self::Directories | Self::All)
    }
}

/// Traversal parameters passed from the builder to the walker.
///
/// Callers configure these via the builder methods (`.target()`,
/// `.recurse()`, `.limit()`, ...).
#[derive(Debug, Clone)]
pub struct WalkConfig {
    pub target: SearchTarget,
    pub recurse: bool,
    pub default_encoding: &'static Encoding,
    /// Skip entries that fail with a recoverable error instead of yielding them.
    pub ignore_inaccessible: bool,
    /// Descend into directories that were themselves matched.
    pub can_recurse_match: bool,
    pub limit: Option<usize>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            target: SearchTarget::Files,
            recurse: true,
            default_encoding: encoding_rs::UTF_8,
            ignore_inaccessible: false,
            can_recurse_match: true,
            limit: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SearchWalker
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct DirectoryNode {
    path: PathBuf,
    depth: usize,
    status: MatchStatus,
}

/// Where the walker is inside the directory it is currently processing.
#[derive(Debug)]
enum Phase {
    /// Enumerating: files are matched on the spot, subdirectories are set aside.
    Files {
        entries: fs::ReadDir,
        subdirectories: Vec<PathBuf>,
    },
    /// Enumeration finished and its handle closed; matching subdirectories.
    Subdirectories { pending: std::vec::IntoIter<PathBuf> },
}

#[derive(Debug)]
struct ActiveDirectory {
    node: DirectoryNode,
    phase: Phase,
}

enum Step {
    Yield(Result<EntryMatch>),
    Continue,
    Done,
}

/// Lazy breadth-first search over a directory tree.
///
/// Created by [`SearchBuilder::build`](crate::SearchBuilder::build). Each
/// call to `next()` does just enough I/O to produce the next match:
///
/// - within a directory, files are matched before subdirectories;
/// - directories one level down are only opened after the whole current
///   level is done;
/// - each directory's include/exclude verdict is computed at most once and
///   cached on its queue node;
/// - the open directory handle lives only while its directory is being
///   enumerated, so dropping the walker early leaks nothing.
///
/// The walker is single-pass and cannot be restarted. Cancellation is checked
/// before every enumerated entry; a cancelled walker simply stops yielding and
/// reports [`TerminationReason::Canceled`].
#[derive(Debug)]
pub struct SearchWalker {
    root: PathBuf,
    config: WalkConfig,
    files: Option<EntryMatcher>,
    directories: Option<EntryMatcher>,
    predicate: Option<DirectoryPredicate>,
    current: VecDeque<DirectoryNode>,
    next_level: VecDeque<DirectoryNode>,
    active: Option<ActiveDirectory>,
    /// Last yielded directory match, queued on the next pull unless pruned.
    pending_descent: Option<DirectoryNode>,
    cancel: CancellationToken,
    telemetry: SearchTelemetry,
    started: Instant,
    termination: Option<TerminationReason>,
}

impl SearchWalker {
    pub(crate) fn new(
        root: PathBuf,
        config: WalkConfig,
        files: Option<EntryMatcher>,
        directories: Option<EntryMatcher>,
        predicate: Option<DirectoryPredicate>,
        cancel: CancellationToken,
    ) -> Self {
        debug!(?root, target = ?config.target, recurse = config.recurse, "starting search");

        let mut current = VecDeque::new();
        current.push_back(DirectoryNode {
            path: root.clone(),
            depth: 0,
            status: MatchStatus::Success,
        });

        Self {
            root,
            config,
            files,
            directories,
            predicate,
            current,
            next_level: VecDeque::new(),
            active: None,
            pending_descent: None,
            cancel,
            telemetry: SearchTelemetry::default(),
            started: Instant::now(),
            termination: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot of the counters so far.
    pub fn telemetry(&self) -> SearchTelemetry {
        let mut telemetry = self.telemetry;
        if self.termination.is_none() {
            telemetry.elapsed = self.started.elapsed();
        }
        telemetry
    }

    /// Why the walker stopped; `None` while it can still yield.
    pub fn termination(&self) -> Option<TerminationReason> {
        self.termination
    }

    /// Do not descend into the directory yielded by the last `next()`.
    ///
    /// Used when a consumer removed or replaced that directory. Returns
    /// `false` if there was nothing to prune (last item was a file, an error,
    /// or a directory that was not going to be descended anyway).
    pub fn prune_last(&mut self) -> bool {
        self.pending_descent.take().is_some()
    }

    fn finish(&mut self, reason: TerminationReason) {
        self.active = None;
        self.current.clear();
        self.next_level.clear();
        self.pending_descent = None;
        self.telemetry.elapsed = self.started.elapsed();
        self.termination = Some(reason);
        debug!(root = ?self.root, ?reason, matches = self.telemetry.matches, "search finished");
    }

    /// Take the next directory off the queues and open it.
    ///
    /// `None` when both levels are exhausted.
    fn open_next(&mut self) -> Option<Result<()>> {
        if self.current.is_empty() {
            mem::swap(&mut self.current, &mut self.next_level);
        }
        let mut node = self.current.pop_front()?;

        if node.status == MatchStatus::Unknown && self.config.target.includes_files() {
            node.status = self
                .predicate
                .as_ref()
                .map_or(MatchStatus::Success, |p| p.evaluate(&node.path));
            debug!(path = ?node.path, status = ?node.status, "resolved directory status");
        }

        let entries = match fs::read_dir(&node.path) {
            Ok(entries) => entries,
            Err(e) => return Some(Err(TrawlError::io(&node.path, e))),
        };
        self.telemetry.searched_directories += 1;
        debug!(path = ?node.path, depth = node.depth, "entering directory");

        self.active = Some(ActiveDirectory {
            node,
            phase: Phase::Files {
                entries,
                subdirectories: Vec::new(),
            },
        });
        Some(Ok(()))
    }

    fn step(&mut self, active: &mut ActiveDirectory) -> Step {
        match &mut active.phase {
            Phase::Files {
                entries,
                subdirectories,
            } => match entries.next() {
                Some(Ok(entry)) => {
                    let path = entry.path();
                    let file_type = match entry.file_type() {
                        Ok(file_type) => file_type,
                        Err(e) => return Step::Yield(Err(TrawlError::io(&path, e))),
                    };
                    if file_type.is_dir() {
                        subdirectories.push(path);
                        Step::Continue
                    } else {
                        self.visit_file(&active.node, path)
                    }
                }
                Some(Err(e)) => Step::Yield(Err(TrawlError::io(&active.node.path, e))),
                None => {
                    let pending = mem::take(subdirectories).into_iter();
                    active.phase = Phase::Subdirectories { pending };
                    Step::Continue
                }
            },
            Phase::Subdirectories { pending } => match pending.next() {
                Some(path) => self.visit_directory(&active.node, path),
                None => Step::Done,
            },
        }
    }

    fn visit_file(&mut self, parent: &DirectoryNode, path: PathBuf) -> Step {
        self.telemetry.files += 1;
        trace!(?path, "file");

        if parent.status.matches_files() != Some(true) {
            return Step::Continue;
        }
        let Some(matcher) = self.files.as_ref() else {
            return Step::Continue;
        };

        match matcher.match_at(&path, parent.depth + 1) {
            Ok(Some(mut found)) => {
                self.telemetry.matching_files += 1;
                if let Some(metadata) = found.metadata_state().get() {
                    self.telemetry.total_size += metadata.len();
                }
                Step::Yield(Ok(found))
            }
            Ok(None) => Step::Continue,
            Err(e) => Step::Yield(Err(e)),
        }
    }

    fn visit_directory(&mut self, parent: &DirectoryNode, path: PathBuf) -> Step {
        self.telemetry.directories += 1;
        trace!(?path, "directory");

        // The root is searched unconditionally; its verdict says nothing about children.
        let inherited = if parent.depth == 0 {
            MatchStatus::Unknown
        } else {
            parent.status
        };
        let status = self
            .predicate
            .as_ref()
            .map_or(MatchStatus::Success, |p| p.discover(&path, inherited));
        if status.descends() == Some(false) {
            debug!(?path, "directory excluded");
            return Step::Continue;
        }

        let depth = parent.depth + 1;
        let outcome = match self.directories.as_ref() {
            Some(matcher) => matcher.match_at(&path, depth),
            None => Ok(None),
        };

        let node = self.config.recurse.then(|| DirectoryNode {
            path,
            depth,
            status,
        });

        match outcome {
            Ok(Some(found)) => {
                self.telemetry.matching_directories += 1;
                if self.config.can_recurse_match {
                    self.pending_descent = node;
                }
                Step::Yield(Ok(found))
            }
            other => {
                self.next_level.extend(node);
                match other {
                    Err(e) => Step::Yield(Err(e)),
                    _ => Step::Continue,
                }
            }
        }
    }
}

impl Iterator for SearchWalker {
    type Item = Result<EntryMatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.termination.is_some() {
            return None;
        }
        if let Some(node) = self.pending_descent.take() {
            self.next_level.push_back(node);
        }

        loop {
            if self.cancel.is_cancelled() {
                self.finish(TerminationReason::Canceled);
                return None;
            }

            let Some(mut active) = self.active.take() else {
                match self.open_next() {
                    Some(Ok(())) => continue,
                    Some(Err(e)) if self.config.ignore_inaccessible && e.is_recoverable() => {
                        debug!(error = %e, path = ?e.path(), "skipping inaccessible directory");
                        continue;
                    }
                    Some(Err(e)) => return Some(Err(e)),
                    None => {
                        self.finish(TerminationReason::Completed);
                        return None;
                    }
                }
            };

            match self.step(&mut active) {
                Step::Continue => self.active = Some(active),
                // Dropping `active` closes the directory.
                Step::Done => {}
                Step::Yield(Err(e)) if self.config.ignore_inaccessible && e.is_recoverable() => {
                    debug!(error = %e, path = ?e.path(), "skipping inaccessible entry");
                    self.active = Some(active);
                }
                Step::Yield(item) => {
                    self.active = Some(active);
                    if item.is_ok() {
                        self.telemetry.matches += 1;
                        if self.config.limit.is_some_and(|limit| self.telemetry.matches >= limit) {
                            self.finish(TerminationReason::MaxReached);
                        }
                    }
                    return Some(item);
                }
            }
        }
    }
}

impl FusedIterator for SearchWalker {}
