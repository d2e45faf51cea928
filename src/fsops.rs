//! Filesystem mutations shared by the sync engine and the entry operations.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use filetime::FileTime;
use tracing::debug;

use crate::error::{Result, TrawlError};
use crate::traits::Presence;

const CHUNK: usize = 64 * 1024;

/// Copy `source` over `target`, keeping the source's modification time.
///
/// Sync relies on equal mtimes to recognise files it has already copied.
pub(crate) fn copy_file(source: &Path, target: &Path) -> Result<()> {
    let metadata = fs::metadata(source).map_err(|e| TrawlError::io(source, e))?;
    fs::copy(source, target).map_err(|e| TrawlError::io(target, e))?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_mtime(target, mtime).map_err(|e| TrawlError::io(target, e))
}

pub(crate) fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir(path).map_err(|e| TrawlError::io(path, e))
}

pub(crate) fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| TrawlError::io(path, e))
}

/// Create the directories leading up to `path`.
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Give `target` the permissions of `source`.
pub(crate) fn copy_attributes(source: &Path, target: &Path) -> Result<()> {
    let permissions = fs::metadata(source)
        .map_err(|e| TrawlError::io(source, e))?
        .permissions();
    fs::set_permissions(target, permissions).map_err(|e| TrawlError::io(target, e))
}

/// Make `to` look like `from`: a copy of the file, or a directory with the
/// same permissions. Whatever sits at `to` with a different kind is removed
/// first; an existing directory is kept and only gets new permissions.
/// Missing parents of `to` are created, since a filtered walk may never
/// yield them.
pub(crate) fn mirror(from: &Path, from_presence: Presence, to: &Path, to_presence: Presence) -> Result<()> {
    match to_presence {
        Presence::Missing => ensure_parent(to)?,
        _ if to_presence != from_presence => remove(to)?,
        _ => {}
    }
    match from_presence {
        Presence::File => copy_file(from, to),
        Presence::Directory => {
            if to_presence != Presence::Directory {
                create_dir(to)?;
            }
            copy_attributes(from, to)
        }
        Presence::Missing => Ok(()),
    }
}

/// Remove a file, symlink or whole directory tree.
pub(crate) fn remove(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path).map_err(|e| TrawlError::io(path, e))?;
    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| TrawlError::io(path, e))
}

/// Remove everything inside `dir`, keeping `dir` itself.
pub(crate) fn remove_contents(dir: &Path) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| TrawlError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| TrawlError::io(dir, e))?;
        remove(&entry.path())?;
    }
    Ok(())
}

pub(crate) fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| TrawlError::io(from, e))
}

/// Rename `from` to `to`, falling back to copy and remove for files when the
/// rename fails (different filesystems).
pub(crate) fn move_entry(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if from.is_file() => {
            debug!(?from, ?to, error = %e, "rename failed, copying instead");
            copy_file(from, to)?;
            remove(from)
        }
        Err(e) => Err(TrawlError::io(from, e)),
    }
}

/// Byte-for-byte comparison of two files.
pub(crate) fn same_content(a: &Path, b: &Path) -> Result<bool> {
    let mut left = File::open(a).map_err(|e| TrawlError::io(a, e))?;
    let mut right = File::open(b).map_err(|e| TrawlError::io(b, e))?;
    let mut lbuf = vec![0u8; CHUNK];
    let mut rbuf = vec![0u8; CHUNK];

    loop {
        let n = fill(&mut left, &mut lbuf).map_err(|e| TrawlError::io(a, e))?;
        let m = fill(&mut right, &mut rbuf).map_err(|e| TrawlError::io(b, e))?;
        if n != m || lbuf[..n] != rbuf[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Read until `buf` is full or the reader is exhausted.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// What sits at `path`, without following symlinks.
///
/// A path below a file is missing too: a dry run leaves files in place where
/// a real run would already have created directories.
pub(crate) fn presence(path: &Path) -> Result<Presence> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(Presence::Directory),
        Ok(_) => Ok(Presence::File),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            Ok(Presence::Missing)
        }
        Err(e) => Err(TrawlError::io(path, e)),
    }
}
