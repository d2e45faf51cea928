use std::fs;
use std::io::Read;
use std::path::Path;

use encoding_rs::Encoding;

use crate::encoding;
use crate::entry::{EntryKind, EntryMatch, MetadataState};
use crate::error::{Result, TrawlError};
use crate::filter::{Attributes, EmptyOption, MatcherOptions, Verdict};
use crate::span::{PathPart, PathSpan};

/// Evaluates [`MatcherOptions`] against one file or directory.
///
/// Checks run cheapest first and stop at the first failure:
///
/// 1. extension (string comparison, files only)
/// 2. name pattern (regex on the path span)
/// 3. attributes (one `stat()`, cached)
/// 4. size and time (same metadata)
/// 5. emptiness (length, at most four bytes read for a BOM)
/// 6. content (reads and decodes the whole file, files only)
///
/// A failing check means no match and no further I/O. I/O failures are
/// returned as `Err` values for the caller to report.
#[derive(Debug, Clone)]
pub struct EntryMatcher {
    kind: EntryKind,
    options: MatcherOptions,
    default_encoding: &'static Encoding,
}

impl EntryMatcher {
    pub fn files(options: MatcherOptions) -> Self {
        Self::new(EntryKind::File, options)
    }

    pub fn directories(options: MatcherOptions) -> Self {
        Self::new(EntryKind::Directory, options)
    }

    fn new(kind: EntryKind, options: MatcherOptions) -> Self {
        Self {
            kind,
            options,
            default_encoding: encoding_rs::UTF_8,
        }
    }

    /// Encoding used for content without a byte-order-mark. UTF-8 by default.
    pub fn with_default_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.default_encoding = encoding;
        self
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn options(&self) -> &MatcherOptions {
        &self.options
    }

    /// Match the entry at `path`, which must be of this matcher's kind.
    pub fn is_match(&self, path: &Path) -> Result<Option<EntryMatch>> {
        self.match_at(path, 0)
    }

    pub(crate) fn match_at(&self, path: &Path, depth: usize) -> Result<Option<EntryMatch>> {
        let options = &self.options;
        let text = path.to_string_lossy();
        let is_file = self.kind == EntryKind::File;

        if is_file {
            if let Some(extension) = &options.extension {
                let span = PathSpan::from_file(&text, PathPart::Extension);
                if !extension.is_match(span.as_str()) {
                    return Ok(None);
                }
            }
        }

        let name = match &options.name {
            Some(filter) => {
                let span = match self.kind {
                    EntryKind::File => PathSpan::from_file(&text, options.part),
                    EntryKind::Directory => PathSpan::from_directory(&text, options.part),
                };
                match filter.verdict(span.as_str()) {
                    Verdict::Rejected => return Ok(None),
                    Verdict::Passed => None,
                    Verdict::Captured(capture) => Some(capture),
                }
            }
            None => None,
        };

        let mut metadata = MetadataState::Pending;
        if options.needs_metadata() && !self.metadata_matches(path, metadata.fetch(path)?)? {
            return Ok(None);
        }

        if options.empty != EmptyOption::Any {
            let empty = self.is_empty(path, &mut metadata)?;
            if empty != (options.empty == EmptyOption::Empty) {
                return Ok(None);
            }
        }

        let (content, decoded) = match (&options.content, is_file) {
            (Some(filter), true) => {
                let bytes = fs::read(path).map_err(|e| TrawlError::io(path, e))?;
                let decoded = encoding::decode(&bytes, self.default_encoding);
                match filter.verdict(&decoded.text) {
                    Verdict::Rejected => return Ok(None),
                    Verdict::Passed => (None, Some(decoded)),
                    Verdict::Captured(capture) => (Some(capture), Some(decoded)),
                }
            }
            _ => (None, None),
        };

        Ok(Some(EntryMatch {
            path: path.to_path_buf(),
            kind: self.kind,
            part: options.part,
            depth,
            name,
            content,
            text: decoded,
            metadata,
        }))
    }

    fn metadata_matches(&self, path: &Path, metadata: &fs::Metadata) -> Result<bool> {
        let options = &self.options;

        if !options.attributes.is_empty() || !options.attributes_to_skip.is_empty() {
            let attrs = Attributes::of(path, metadata);
            if !attrs.contains(options.attributes) || attrs.intersects(options.attributes_to_skip) {
                return Ok(false);
            }
        }

        if let Some(size) = &options.size {
            if self.kind == EntryKind::File && !size.test(&metadata.len()) {
                return Ok(false);
            }
        }

        if let Some(created) = &options.created {
            let time = metadata.created().map_err(|e| TrawlError::io(path, e))?;
            if !created.test(&time) {
                return Ok(false);
            }
        }

        if let Some(modified) = &options.modified {
            let time = metadata.modified().map_err(|e| TrawlError::io(path, e))?;
            if !modified.test(&time) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Zero bytes is empty and more than four never is; in between the file
    /// is empty only if it holds nothing but a byte-order-mark.
    fn is_empty(&self, path: &Path, metadata: &mut MetadataState) -> Result<bool> {
        if self.kind == EntryKind::Directory {
            let mut entries = fs::read_dir(path).map_err(|e| TrawlError::io(path, e))?;
            return Ok(entries.next().is_none());
        }

        match metadata.fetch(path)?.len() {
            0 => Ok(true),
            1..=4 => {
                let mut head = Vec::with_capacity(4);
                fs::File::open(path)
                    .and_then(|f| f.take(4).read_to_end(&mut head))
                    .map_err(|e| TrawlError::io(path, e))?;
                Ok(encoding::is_bom_only(&head))
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ExtensionFilter, Filter, SizeFilter};

    #[test]
    fn failed_name_filter_skips_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.md");
        fs::write(&file, "secret").unwrap();

        let matcher = EntryMatcher::files(MatcherOptions {
            name: Some(Filter::new("invoice").unwrap()),
            content: Some(
                Filter::new(".*")
                    .unwrap()
                    .predicate(|_| panic!("content predicate must not run")),
            ),
            ..MatcherOptions::default()
        });

        assert!(matcher.is_match(&file).unwrap().is_none());
    }

    #[test]
    fn extension_failure_needs_no_io() {
        let matcher = EntryMatcher::files(MatcherOptions {
            extension: Some(ExtensionFilter::new(["rs"])),
            size: Some(SizeFilter::AtLeast(1)),
            ..MatcherOptions::default()
        });
        // The path does not exist: any stat would surface as an error.
        let outcome = matcher.is_match(Path::new("/definitely/missing/file.txt")).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn size_filter_reuses_fetched_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        fs::write(&file, [1u8; 16]).unwrap();

        let matcher = EntryMatcher::files(MatcherOptions {
            size: Some(SizeFilter::GreaterThan(8)),
            ..MatcherOptions::default()
        });
        let found = matcher.is_match(&file).unwrap().expect("match");
        assert!(found.metadata_state().is_fetched());
    }

    #[test]
    fn emptiness_heuristic() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.txt");
        let bom = dir.path().join("bom.txt");
        let short = dir.path().join("short.txt");
        let long = dir.path().join("long.txt");
        fs::write(&empty, b"").unwrap();
        fs::write(&bom, [0xEF, 0xBB, 0xBF]).unwrap();
        fs::write(&short, b"ab").unwrap();
        fs::write(&long, b"abcdef").unwrap();

        let matcher = EntryMatcher::files(MatcherOptions {
            empty: EmptyOption::Empty,
            ..MatcherOptions::default()
        });
        assert!(matcher.is_match(&empty).unwrap().is_some());
        assert!(matcher.is_match(&bom).unwrap().is_some());
        assert!(matcher.is_match(&short).unwrap().is_none());
        assert!(matcher.is_match(&long).unwrap().is_none());

        let dirs = EntryMatcher::directories(MatcherOptions {
            empty: EmptyOption::NonEmpty,
            ..MatcherOptions::default()
        });
        assert!(dirs.is_match(dir.path()).unwrap().is_some());
    }

    #[test]
    fn content_match_decodes_and_captures() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("utf16.txt");
        let bytes: Vec<u8> = [0xFF, 0xFE]
            .into_iter()
            .chain("total: 42".encode_utf16().flat_map(|u| u.to_le_bytes()))
            .collect();
        fs::write(&file, bytes).unwrap();

        let matcher = EntryMatcher::files(MatcherOptions {
            content: Some(Filter::new(r"\d+").unwrap()),
            ..MatcherOptions::default()
        });
        let found = matcher.is_match(&file).unwrap().expect("match");
        let capture = found.content_capture().unwrap();
        assert_eq!(capture.value, "42");
        assert_eq!(capture.start, 7);
        assert!(found.text().unwrap().has_bom);
    }

    #[test]
    fn unreadable_content_is_an_error_value() {
        let matcher = EntryMatcher::files(MatcherOptions {
            content: Some(Filter::new("x").unwrap()),
            ..MatcherOptions::default()
        });
        let err = matcher.is_match(Path::new("/definitely/missing/file.txt")).unwrap_err();
        assert!(err.is_recoverable());
    }
}
