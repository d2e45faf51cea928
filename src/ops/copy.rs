use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::builder::SearchBuilder;
use crate::entry::EntryMatch;
use crate::error::{Result, TrawlError};
use crate::fsops;
use crate::progress::{OperationKind, Reporter};
use crate::results::Outcome;
use crate::span::{PathPart, PathSpan};
use crate::traits::{Conflict, DecisionProvider, DialogResult, Presence, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyMode {
    #[default]
    Copy,
    Move,
}

/// What to do when the destination of a match already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictResolution {
    /// Consult the [`DecisionProvider`]: yes overwrites, no skips.
    #[default]
    Ask,
    Overwrite,
    Skip,
    /// Pick the first free `name (n).ext` next to the existing entry.
    Suffix,
}

/// Copy or move every match below a target directory, keeping its path
/// relative to the search root.
///
/// Copied files keep their modification time. Matched directories are
/// created (copy) or moved whole and not descended into (move); a directory
/// that already exists at the destination is merged into instead.
pub struct CopyOperation<'a> {
    target: PathBuf,
    mode: CopyMode,
    resolution: ConflictResolution,
    dry_run: bool,
    decisions: Option<Box<dyn DecisionProvider + 'a>>,
    progress: Option<Box<dyn ProgressSink + 'a>>,
}

/// A conflict settled for one match.
enum Placement {
    Fresh(PathBuf),
    Replace(PathBuf, Presence),
    Skip,
    Cancel,
}

impl<'a> CopyOperation<'a> {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            mode: CopyMode::Copy,
            resolution: ConflictResolution::Ask,
            dry_run: false,
            decisions: None,
            progress: None,
        }
    }

    pub fn mode(mut self, mode: CopyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn conflict_resolution(mut self, resolution: ConflictResolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn dry_run(mut self, yes: bool) -> Self {
        self.dry_run = yes;
        self
    }

    /// Required when the resolution is [`ConflictResolution::Ask`].
    pub fn decisions(mut self, provider: impl DecisionProvider + 'a) -> Self {
        self.decisions = Some(Box::new(provider));
        self
    }

    pub fn progress(mut self, sink: impl ProgressSink + 'a) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    pub fn run(mut self, search: SearchBuilder) -> Result<Outcome> {
        let root = fs::canonicalize(search.root())
            .map_err(|_| TrawlError::InvalidSource(search.root().to_path_buf()))?;
        if absolute(&self.target).starts_with(&root) {
            return Err(TrawlError::InvalidConfig(
                "target directory must be outside the search root".into(),
            ));
        }
        if self.resolution == ConflictResolution::Ask && self.decisions.is_none() {
            return Err(TrawlError::InvalidConfig(
                "conflict resolution Ask needs a decision provider".into(),
            ));
        }

        let started = Instant::now();
        let mut reporter = Reporter::new(self.progress.take(), self.dry_run);
        let mut walker = search.build()?;
        info!(root = ?walker.root(), target = ?self.target, mode = ?self.mode, "copy started");

        // Source directory -> where it actually landed, when that differs.
        let mut redirects: HashMap<PathBuf, PathBuf> = HashMap::new();
        let mut canceled = false;
        while let Some(entry) = super::next_match(&mut walker, &mut reporter)? {
            let redirected = entry
                .path()
                .parent()
                .and_then(|parent| redirects.get(parent))
                .zip(entry.path().file_name())
                .map(|(parent, name)| parent.join(name));
            let destination = match redirected {
                Some(destination) => destination,
                None => match entry.path().strip_prefix(walker.root()) {
                    Ok(relative) => self.target.join(relative),
                    Err(_) => continue,
                },
            };

            match self.place(&entry, &destination, &mut reporter, &mut redirects) {
                Ok(true) => {
                    walker.prune_last();
                }
                Ok(false) => {}
                Err(Cancelled) => {
                    canceled = true;
                    break;
                }
            }
        }

        Ok(super::finish(&walker, reporter, started, canceled))
    }

    /// Copy or move one match. `Ok(true)` means the walker must not descend
    /// into it.
    fn place(
        &mut self,
        entry: &EntryMatch,
        destination: &Path,
        reporter: &mut Reporter<'_>,
        redirects: &mut HashMap<PathBuf, PathBuf>,
    ) -> std::result::Result<bool, Cancelled> {
        let source = entry.path();
        let kind = if entry.is_directory() {
            Presence::Directory
        } else {
            Presence::File
        };

        let existing = match fsops::presence(destination) {
            Ok(presence) => presence,
            Err(e) => {
                reporter.fail(source, e);
                return Ok(false);
            }
        };

        // Directories merge into existing directories.
        if kind == Presence::Directory && existing == Presence::Directory {
            debug!(?source, ?destination, "merging into existing directory");
            reporter.apply(OperationKind::None, destination, None, || Ok(()));
            return Ok(false);
        }

        let placement = match existing {
            Presence::Missing => Placement::Fresh(destination.to_path_buf()),
            _ => self.resolve(source, kind, destination, existing, reporter),
        };

        match (placement, self.mode) {
            (Placement::Cancel, _) => Err(Cancelled),
            (Placement::Skip, _) => {
                reporter.apply(OperationKind::None, source, None, || Ok(()));
                Ok(false)
            }
            (Placement::Fresh(to), CopyMode::Copy) => {
                reporter.apply(OperationKind::Add, &to, None, || {
                    fsops::ensure_parent(&to)?;
                    fsops::mirror(source, kind, &to, Presence::Missing)
                });
                if kind == Presence::Directory && to != destination {
                    redirects.insert(source.to_path_buf(), to);
                }
                Ok(false)
            }
            (Placement::Replace(to, existing), CopyMode::Copy) => {
                reporter.apply(OperationKind::Update, &to, None, || {
                    fsops::mirror(source, kind, &to, existing)
                });
                Ok(false)
            }
            (Placement::Fresh(to), CopyMode::Move) => {
                reporter.apply(OperationKind::Rename, source, Some(&to), || {
                    fsops::ensure_parent(&to)?;
                    fsops::move_entry(source, &to)
                });
                Ok(kind == Presence::Directory)
            }
            (Placement::Replace(to, _), CopyMode::Move) => {
                reporter.apply(OperationKind::Rename, source, Some(&to), || {
                    fsops::remove(&to)?;
                    fsops::move_entry(source, &to)
                });
                Ok(kind == Presence::Directory)
            }
        }
    }

    fn resolve(
        &mut self,
        source: &Path,
        kind: Presence,
        destination: &Path,
        existing: Presence,
        reporter: &mut Reporter<'_>,
    ) -> Placement {
        let resolution = match (self.resolution, self.decisions.as_mut()) {
            (ConflictResolution::Ask, Some(provider)) => {
                let answer = provider.decide(&Conflict {
                    first: source,
                    first_presence: kind,
                    second: destination,
                    second_presence: existing,
                });
                debug!(?source, ?destination, ?answer, "conflict decided");
                match answer {
                    DialogResult::Yes => ConflictResolution::Overwrite,
                    DialogResult::No => ConflictResolution::Skip,
                    DialogResult::YesToAll => {
                        self.resolution = ConflictResolution::Overwrite;
                        ConflictResolution::Overwrite
                    }
                    DialogResult::NoToAll => {
                        self.resolution = ConflictResolution::Skip;
                        ConflictResolution::Skip
                    }
                    DialogResult::Cancel => return Placement::Cancel,
                }
            }
            (resolution, _) => resolution,
        };

        match resolution {
            ConflictResolution::Overwrite => Placement::Replace(destination.to_path_buf(), existing),
            ConflictResolution::Suffix => match free_name(destination, kind) {
                Some(path) => Placement::Fresh(path),
                None => {
                    reporter.fail(source, TrawlError::NonUtf8Path(destination.to_path_buf()));
                    Placement::Skip
                }
            },
            ConflictResolution::Skip | ConflictResolution::Ask => Placement::Skip,
        }
    }
}

/// A decision provider answered `Cancel`.
struct Cancelled;

/// The first `name (n).ext` next to `path` that does not exist yet.
fn free_name(path: &Path, kind: Presence) -> Option<PathBuf> {
    let text = path.to_str()?;
    let span = match kind {
        Presence::Directory => PathSpan::from_directory(text, PathPart::NameWithoutExtension),
        _ => PathSpan::from_file(text, PathPart::NameWithoutExtension),
    };
    (1..)
        .map(|n| PathBuf::from(span.replace(&format!("{} ({n})", span.as_str()))))
        .find(|candidate| fs::symlink_metadata(candidate).is_err())
}

/// `path` made absolute with symlinks resolved as far as it exists.
fn absolute(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_owned());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_name_counts_up_before_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("a (1).txt"), "").unwrap();

        let next = free_name(&dir.path().join("a.txt"), Presence::File);
        assert_eq!(next, Some(dir.path().join("a (2).txt")));
    }

    #[test]
    fn free_name_for_directories_keeps_dots() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("v1.2")).unwrap();

        let next = free_name(&dir.path().join("v1.2"), Presence::Directory);
        assert_eq!(next, Some(dir.path().join("v1.2 (1)")));
    }

    #[test]
    fn absolute_resolves_missing_tails() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        assert_eq!(absolute(&dir.path().join("x/y")), root.join("x").join("y"));
    }
}
