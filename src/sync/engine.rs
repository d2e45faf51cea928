use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::builder::SearchBuilder;
use crate::entry::EntryMatch;
use crate::error::{Result, TrawlError};
use crate::filter::Attributes;
use crate::fsops;
use crate::progress::{OperationKind, Reporter};
use crate::results::{Outcome, SearchTelemetry, TerminationReason};
use crate::sync::compare::{compare_files, CompareProperties, Comparison, SyncConflictResolution};
use crate::sync::snapshot::DirectorySnapshot;
use crate::traits::{Conflict, DecisionProvider, DialogResult, Presence};

/// Settings for a sync run. See the setters on
/// [`SyncBuilder`](crate::sync::SyncBuilder).
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub compare: CompareProperties,
    /// Modified times closer than this count as equal.
    pub allowed_time_diff: Duration,
    pub conflict_resolution: SyncConflictResolution,
    /// Turn an add/delete pair into a single rename. Needs `CONTENT` in `compare`.
    pub detect_rename: bool,
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            compare: CompareProperties::default(),
            allowed_time_diff: Duration::ZERO,
            conflict_resolution: SyncConflictResolution::Ask,
            detect_rename: false,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    FirstToSecond,
    SecondToFirst,
}

/// Which side of the current pass wins a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Source,
    Target,
}

/// The cross-pass set of second-directory paths already handled.
enum Seen<'s> {
    Record(&'s mut HashSet<PathBuf>),
    Skip(&'s HashSet<PathBuf>),
}

/// Two-pass reconciliation of two directory trees.
///
/// Pass 1 walks the first directory and settles every entry against its
/// counterpart in the second, recording each counterpart path. Pass 2 walks
/// the second directory and only handles what pass 1 never saw. "First" and
/// "second" always mean the two roots as given, in both passes.
///
/// Build one with [`trawl::sync()`](crate::sync()).
pub struct SyncEngine<'a> {
    first: PathBuf,
    second: PathBuf,
    search: SearchBuilder,
    options: SyncOptions,
    /// Starts as `options.conflict_resolution`; `YesToAll`/`NoToAll` upgrade it.
    policy: SyncConflictResolution,
    decisions: Option<Box<dyn DecisionProvider + 'a>>,
    reporter: Reporter<'a>,
    snapshot: DirectorySnapshot,
    canceled: bool,
}

impl<'a> SyncEngine<'a> {
    pub(crate) fn new(
        first: PathBuf,
        second: PathBuf,
        search: SearchBuilder,
        options: SyncOptions,
        decisions: Option<Box<dyn DecisionProvider + 'a>>,
        reporter: Reporter<'a>,
    ) -> Self {
        Self {
            first,
            second,
            search,
            policy: options.conflict_resolution,
            options,
            decisions,
            reporter,
            snapshot: DirectorySnapshot::default(),
            canceled: false,
        }
    }

    /// Run both passes.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned. Per-entry failures become progress
    /// events and bump `errors`.
    pub fn run(mut self) -> Result<Outcome> {
        let started = Instant::now();
        info!(first = ?self.first, second = ?self.second, dry_run = self.reporter.is_dry_run(), "sync started");

        let mut seen = HashSet::new();
        self.first_pass(&mut seen)?;
        if !self.canceled {
            self.second_pass(&seen)?;
        }

        let termination = if self.canceled {
            TerminationReason::Canceled
        } else {
            TerminationReason::Completed
        };
        let telemetry = SearchTelemetry {
            elapsed: started.elapsed(),
            ..self.reporter.telemetry
        };
        info!(
            ?termination,
            added = telemetry.added,
            updated = telemetry.updated,
            renamed = telemetry.renamed,
            deleted = telemetry.deleted,
            errors = telemetry.errors,
            "sync finished"
        );
        Ok(Outcome {
            telemetry,
            termination,
        })
    }

    /// Walk the first directory, recording every second-directory path it
    /// settles in `seen`.
    pub fn first_pass(&mut self, seen: &mut HashSet<PathBuf>) -> Result<()> {
        self.pass(Direction::FirstToSecond, Seen::Record(seen))
    }

    /// Walk the second directory, skipping everything in `seen`.
    pub fn second_pass(&mut self, seen: &HashSet<PathBuf>) -> Result<()> {
        self.pass(Direction::SecondToFirst, Seen::Skip(seen))
    }

    pub fn telemetry(&self) -> SearchTelemetry {
        self.reporter.telemetry
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    fn pass(&mut self, direction: Direction, mut seen: Seen<'_>) -> Result<()> {
        let (source_root, target_root) = match direction {
            Direction::FirstToSecond => (self.first.clone(), self.second.clone()),
            Direction::SecondToFirst => (self.second.clone(), self.first.clone()),
        };
        info!(source = ?source_root, target = ?target_root, ?direction, "sync pass started");

        let mut walker = self.search.clone().with_root(&source_root).build()?;

        while let Some(item) = walker.next() {
            let mut entry = match item {
                Ok(entry) => entry,
                Err(e) if e.is_recoverable() => {
                    self.reporter.fail(&source_root, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Ok(relative) = entry.path().strip_prefix(&source_root) else {
                continue;
            };
            let target = target_root.join(relative);

            match &mut seen {
                Seen::Record(set) => {
                    set.insert(target.clone());
                }
                Seen::Skip(set) => {
                    if set.contains(entry.path()) {
                        trace!(path = ?entry.path(), "already handled");
                        continue;
                    }
                }
            }

            match self.process(&mut entry, &target, direction, &mut seen) {
                Ok(true) => {
                    walker.prune_last();
                }
                Ok(false) => {}
                Err(e) if e.is_recoverable() => self.reporter.fail(entry.path(), e),
                Err(e) => return Err(e),
            }
            if self.canceled {
                break;
            }
        }

        if walker.termination() == Some(TerminationReason::Canceled) {
            self.canceled = true;
        }
        self.reporter.telemetry.absorb_search(&walker.telemetry());
        info!(?direction, canceled = self.canceled, "sync pass finished");
        Ok(())
    }

    /// Settle one entry. Returns `true` when the walker must not descend
    /// into it because the source directory was removed or replaced.
    fn process(
        &mut self,
        entry: &mut EntryMatch,
        target: &Path,
        direction: Direction,
        seen: &mut Seen<'_>,
    ) -> Result<bool> {
        let source_presence = if entry.is_directory() {
            self.reporter.telemetry.processed_directories += 1;
            Presence::Directory
        } else {
            self.reporter.telemetry.processed_files += 1;
            Presence::File
        };
        let source_meta = entry.metadata()?.clone();
        let source = entry.path();
        let target_presence = fsops::presence(target)?;

        match (source_presence, target_presence) {
            (_, Presence::Missing) => {
                self.only_in_source(source, &source_meta, source_presence, target, direction, seen)
            }
            (Presence::File, Presence::File) => self.both_files(source, &source_meta, target, direction),
            (Presence::Directory, Presence::Directory) => {
                self.both_directories(source, &source_meta, target, direction)
            }
            _ => {
                let Some(winner) = self.resolve(source, source_presence, target, target_presence, direction)? else {
                    return Ok(false);
                };
                Ok(self.overwrite(winner, source, source_presence, target, target_presence))
            }
        }
    }

    fn only_in_source(
        &mut self,
        source: &Path,
        source_meta: &Metadata,
        presence: Presence,
        target: &Path,
        direction: Direction,
        seen: &mut Seen<'_>,
    ) -> Result<bool> {
        let Some(winner) = self.resolve(source, presence, target, Presence::Missing, direction)? else {
            return Ok(false);
        };

        match winner {
            Side::Source => {
                if let Some(from) = self.rename_candidate(source, source_meta, presence, target, direction)? {
                    if let Seen::Record(set) = seen {
                        set.insert(from.clone());
                    }
                    self.reporter
                        .apply(OperationKind::Rename, &from, Some(target), || fsops::rename(&from, target));
                    return Ok(false);
                }
                self.reporter.apply(OperationKind::Add, target, None, || {
                    fsops::mirror(source, presence, target, Presence::Missing)
                });
                Ok(false)
            }
            Side::Target => {
                self.reporter
                    .apply(OperationKind::Delete, source, None, || fsops::remove(source));
                Ok(presence == Presence::Directory)
            }
        }
    }

    fn both_files(
        &mut self,
        source: &Path,
        source_meta: &Metadata,
        target: &Path,
        direction: Direction,
    ) -> Result<bool> {
        let target_meta = fs::symlink_metadata(target).map_err(|e| TrawlError::io(target, e))?;
        let comparison = compare_files(
            source,
            source_meta,
            target,
            &target_meta,
            self.options.compare,
            self.options.allowed_time_diff,
        )?;
        debug!(?source, ?target, ?comparison, "compared");

        let winner = match comparison {
            Comparison::Equal => {
                self.reporter.apply(OperationKind::None, source, None, || Ok(()));
                return Ok(false);
            }
            Comparison::SourceNewer => Side::Source,
            Comparison::DestNewer => Side::Target,
            Comparison::Different => {
                match self.resolve(source, Presence::File, target, Presence::File, direction)? {
                    Some(winner) => winner,
                    None => return Ok(false),
                }
            }
        };
        Ok(self.overwrite(winner, source, Presence::File, target, Presence::File))
    }

    /// Directories never replace each other; at most their permissions are synced.
    fn both_directories(
        &mut self,
        source: &Path,
        source_meta: &Metadata,
        target: &Path,
        direction: Direction,
    ) -> Result<bool> {
        let differ = self.options.compare.contains(CompareProperties::ATTRIBUTES) && {
            let target_meta = fs::symlink_metadata(target).map_err(|e| TrawlError::io(target, e))?;
            Attributes::of(source, source_meta) != Attributes::of(target, &target_meta)
        };
        if !differ {
            self.reporter.apply(OperationKind::None, source, None, || Ok(()));
            return Ok(false);
        }

        let Some(winner) = self.resolve(source, Presence::Directory, target, Presence::Directory, direction)?
        else {
            return Ok(false);
        };
        let (from, to) = match winner {
            Side::Source => (source, target),
            Side::Target => (target, source),
        };
        self.reporter
            .apply(OperationKind::Update, to, None, || fsops::copy_attributes(from, to));
        Ok(false)
    }

    /// Overwrite the loser with the winner. Returns `true` when the source
    /// directory was replaced by a file.
    fn overwrite(
        &mut self,
        winner: Side,
        source: &Path,
        source_presence: Presence,
        target: &Path,
        target_presence: Presence,
    ) -> bool {
        let (from, from_presence, to, to_presence) = match winner {
            Side::Source => (source, source_presence, target, target_presence),
            Side::Target => (target, target_presence, source, source_presence),
        };
        self.reporter.apply(OperationKind::Update, to, None, || {
            fsops::mirror(from, from_presence, to, to_presence)
        });
        winner == Side::Target && source_presence == Presence::Directory && target_presence != Presence::Directory
    }

    fn rename_candidate(
        &mut self,
        source: &Path,
        source_meta: &Metadata,
        presence: Presence,
        target: &Path,
        direction: Direction,
    ) -> Result<Option<PathBuf>> {
        let enabled = direction == Direction::FirstToSecond
            && self.options.detect_rename
            && self.options.compare.contains(CompareProperties::CONTENT)
            && presence == Presence::File;
        if !enabled {
            return Ok(None);
        }
        let (Some(source_dir), Some(target_dir)) = (source.parent(), target.parent()) else {
            return Ok(None);
        };
        self.snapshot.refresh(target_dir)?;
        self.snapshot.find_rename_source(source, source_meta, source_dir)
    }

    /// Pick the winning side of a conflict. `None` means the run was cancelled.
    fn resolve(
        &mut self,
        source: &Path,
        source_presence: Presence,
        target: &Path,
        target_presence: Presence,
        direction: Direction,
    ) -> Result<Option<Side>> {
        let first_wins = match self.policy {
            SyncConflictResolution::FirstWins => true,
            SyncConflictResolution::SecondWins => false,
            SyncConflictResolution::Ask => {
                let conflict = match direction {
                    Direction::FirstToSecond => Conflict {
                        first: source,
                        first_presence: source_presence,
                        second: target,
                        second_presence: target_presence,
                    },
                    Direction::SecondToFirst => Conflict {
                        first: target,
                        first_presence: target_presence,
                        second: source,
                        second_presence: source_presence,
                    },
                };
                let Some(provider) = self.decisions.as_mut() else {
                    return Err(TrawlError::InvalidConfig(
                        "conflict resolution Ask needs a decision provider".into(),
                    ));
                };
                let answer = provider.decide(&conflict);
                debug!(
                    first = ?conflict.first,
                    second = ?conflict.second,
                    ?answer,
                    "conflict decided"
                );
                match answer {
                    DialogResult::Yes => true,
                    DialogResult::No => false,
                    DialogResult::YesToAll => {
                        self.policy = SyncConflictResolution::FirstWins;
                        true
                    }
                    DialogResult::NoToAll => {
                        self.policy = SyncConflictResolution::SecondWins;
                        false
                    }
                    DialogResult::Cancel => {
                        self.canceled = true;
                        return Ok(None);
                    }
                }
            }
        };

        let forward = direction == Direction::FirstToSecond;
        Ok(Some(if first_wins == forward { Side::Source } else { Side::Target }))
    }
}
