use std::fs;
use std::path::{Path, PathBuf};

use crate::encoding::DecodedText;
use crate::error::{Result, TrawlError};
use crate::filter::Capture;
use crate::span::{PathPart, PathSpan};

/// The kind of a matched entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A regular file, or a symbolic link (links are never descended).
    File,

    /// A directory.
    Directory,
}

/// OS metadata of an entry, fetched at most once.
///
/// Matchers fetch it when an attribute, size or time filter needs it and hand
/// the fetched value over to the [`EntryMatch`], so consumers asking again do
/// not pay for a second `stat()`.
#[derive(Debug, Default)]
pub enum MetadataState {
    #[default]
    Pending,
    Fetched(fs::Metadata),
}

impl MetadataState {
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }

    /// The metadata, if it has been fetched.
    pub fn get(&self) -> Option<&fs::Metadata> {
        match self {
            Self::Fetched(metadata) => Some(metadata),
            Self::Pending => None,
        }
    }

    /// Fetch the metadata of `path` unless already fetched. Links are not followed.
    pub(crate) fn fetch(&mut self, path: &Path) -> Result<&fs::Metadata> {
        if let Self::Pending = self {
            let metadata = fs::symlink_metadata(path).map_err(|e| TrawlError::io(path, e))?;
            *self = Self::Fetched(metadata);
        }
        match self {
            Self::Fetched(metadata) => Ok(metadata),
            Self::Pending => unreachable!("metadata was fetched above"),
        }
    }
}

/// A filesystem entry that passed every active filter.
#[derive(Debug)]
pub struct EntryMatch {
    pub(crate) path: PathBuf,
    pub(crate) kind: EntryKind,
    pub(crate) part: PathPart,
    pub(crate) depth: usize,
    pub(crate) name: Option<Capture>,
    pub(crate) content: Option<Capture>,
    pub(crate) text: Option<DecodedText>,
    pub(crate) metadata: MetadataState,
}

impl EntryMatch {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Depth below the search root. Entries directly inside the root are at depth 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The span the name filter was matched against.
    ///
    /// `None` when the path is not valid UTF-8.
    pub fn span(&self) -> Option<PathSpan<'_>> {
        let path = self.path.to_str()?;
        Some(match self.kind {
            EntryKind::File => PathSpan::from_file(path, self.part),
            EntryKind::Directory => PathSpan::from_directory(path, self.part),
        })
    }

    /// The name-pattern match, with offsets relative to [`span`](Self::span).
    pub fn name_capture(&self) -> Option<&Capture> {
        self.name.as_ref()
    }

    /// The content-pattern match, with offsets into [`text`](Self::text).
    pub fn content_capture(&self) -> Option<&Capture> {
        self.content.as_ref()
    }

    /// The decoded content, present when a content filter was evaluated.
    pub fn text(&self) -> Option<&DecodedText> {
        self.text.as_ref()
    }

    /// The entry's metadata, fetched now if no filter needed it before.
    pub fn metadata(&mut self) -> Result<&fs::Metadata> {
        self.metadata.fetch(&self.path)
    }

    pub fn metadata_state(&self) -> &MetadataState {
        &self.metadata
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_is_fetched_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "abc").unwrap();

        let mut state = MetadataState::default();
        assert!(!state.is_fetched());
        assert_eq!(state.fetch(&file).unwrap().len(), 3);
        assert!(state.is_fetched());

        // Once fetched, the file can disappear without affecting the cached value.
        fs::remove_file(&file).unwrap();
        assert_eq!(state.fetch(&file).unwrap().len(), 3);
        assert_eq!(state.get().map(|m| m.len()), Some(3));
    }

    #[test]
    fn missing_entry_reports_not_found() {
        let mut state = MetadataState::default();
        let err = state.fetch(Path::new("/definitely/missing/entry")).unwrap_err();
        assert!(matches!(err, TrawlError::NotFound(_)));
        assert!(!state.is_fetched());
    }
}
