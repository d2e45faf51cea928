use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::error::{Result, TrawlError};
use crate::fsops;
use crate::sync::compare::modified;

#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    modified: SystemTime,
    len: u64,
}

/// Files of one destination directory, kept while the walker stays in the
/// matching source directory. Rename detection looks candidates up here.
#[derive(Debug, Default)]
pub(crate) struct DirectorySnapshot {
    directory: Option<PathBuf>,
    files: Vec<Candidate>,
}

impl DirectorySnapshot {
    /// Point the snapshot at `dir`, re-reading it only when it changed.
    ///
    /// A missing directory gives an empty snapshot.
    pub(crate) fn refresh(&mut self, dir: &Path) -> Result<()> {
        if self.directory.as_deref() == Some(dir) {
            return Ok(());
        }
        self.files.clear();
        self.directory = Some(dir.to_path_buf());

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(TrawlError::io(dir, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| TrawlError::io(dir, e))?;
            let path = entry.path();
            let metadata = entry.metadata().map_err(|e| TrawlError::io(&path, e))?;
            if metadata.is_file() {
                self.files.push(Candidate {
                    modified: modified(&path, &metadata)?,
                    len: metadata.len(),
                    path,
                });
            }
        }
        Ok(())
    }

    /// The single destination file `source` was most likely renamed from.
    ///
    /// A candidate has the same modified time, length and bytes as `source`,
    /// and its name has no counterpart in `source_dir`. No candidate or more
    /// than one gives `None`. A returned candidate is removed from the
    /// snapshot so it cannot be claimed twice.
    pub(crate) fn find_rename_source(
        &mut self,
        source: &Path,
        metadata: &Metadata,
        source_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        let wanted = modified(source, metadata)?;
        let mut found = None;

        for (index, candidate) in self.files.iter().enumerate() {
            if candidate.modified != wanted || candidate.len != metadata.len() {
                continue;
            }
            let Some(name) = candidate.path.file_name() else {
                continue;
            };
            if fs::symlink_metadata(source_dir.join(name)).is_ok() {
                continue;
            }
            if !fsops::same_content(source, &candidate.path)? {
                continue;
            }
            if found.is_some() {
                debug!(?source, "ambiguous rename candidates, treating as new file");
                return Ok(None);
            }
            found = Some(index);
        }

        Ok(found.map(|index| {
            let candidate = self.files.swap_remove(index);
            debug!(?source, from = ?candidate.path, "rename candidate");
            candidate.path
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;

    fn write(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
        filetime::set_file_mtime(path, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    }

    #[test]
    fn unique_candidate_is_claimed_once() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write(&a.path().join("new.txt"), "payload");
        write(&b.path().join("old.txt"), "payload");
        write(&b.path().join("other.txt"), "different");

        let source = a.path().join("new.txt");
        let metadata = fs::metadata(&source).unwrap();
        let mut snapshot = DirectorySnapshot::default();
        snapshot.refresh(b.path()).unwrap();

        let found = snapshot.find_rename_source(&source, &metadata, a.path()).unwrap();
        assert_eq!(found, Some(b.path().join("old.txt")));
        let again = snapshot.find_rename_source(&source, &metadata, a.path()).unwrap();
        assert_eq!(again, None);
    }

    #[test]
    fn candidate_with_a_source_counterpart_is_ignored() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write(&a.path().join("new.txt"), "payload");
        write(&a.path().join("old.txt"), "payload");
        write(&b.path().join("old.txt"), "payload");

        let source = a.path().join("new.txt");
        let metadata = fs::metadata(&source).unwrap();
        let mut snapshot = DirectorySnapshot::default();
        snapshot.refresh(b.path()).unwrap();
        assert_eq!(snapshot.find_rename_source(&source, &metadata, a.path()).unwrap(), None);
    }

    #[test]
    fn missing_directory_is_an_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshot = DirectorySnapshot::default();
        snapshot.refresh(&dir.path().join("absent")).unwrap();
        assert!(snapshot.files.is_empty());
    }
}
