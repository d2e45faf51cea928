use std::fmt;

/// Which part of a path a [`PathSpan`] covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PathPart {
    /// The last path component (`report.txt`).
    #[default]
    Name,

    /// The whole path as given.
    FullName,

    /// The last component without its extension (`report`).
    NameWithoutExtension,

    /// The extension without the leading dot (`txt`).
    Extension,
}

/// A zero-copy view of one part of a path string.
///
/// The span borrows the path and only stores offsets, so matching a name or
/// extension never allocates. The same offsets are used to splice a
/// replacement back into the full path ([`PathSpan::replace_range`]), which
/// keeps every byte outside the span untouched.
///
/// Invariant: `start + len <= path.len()`, and both ends fall on a char
/// boundary (they always sit next to an ASCII separator or dot).
///
/// ```
/// use trawl::{PathPart, PathSpan};
///
/// let span = PathSpan::from_file("/data/report.txt", PathPart::NameWithoutExtension);
/// assert_eq!(span.as_str(), "report");
/// assert_eq!(span.replace("summary"), "/data/summary.txt");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSpan<'a> {
    path: &'a str,
    start: usize,
    len: usize,
    part: PathPart,
}

impl<'a> PathSpan<'a> {
    /// Span over `part` of a file path.
    ///
    /// A file without extension yields an empty `Extension` span at the end
    /// of the string.
    pub fn from_file(path: &'a str, part: PathPart) -> Self {
        let end = path.len();
        let name = name_start(path, end);
        match part {
            PathPart::FullName => Self::new(path, 0, end, part),
            PathPart::Name => Self::new(path, name, end - name, part),
            PathPart::NameWithoutExtension => {
                let stop = extension_dot(path, name, end).unwrap_or(end);
                Self::new(path, name, stop - name, part)
            }
            PathPart::Extension => match extension_dot(path, name, end) {
                Some(dot) => Self::new(path, dot + 1, end - dot - 1, part),
                None => Self::new(path, end, 0, part),
            },
        }
    }

    /// Span over `part` of a directory path.
    ///
    /// Trailing separators are ignored. Directories have no extension: the
    /// `Extension` span is empty and `NameWithoutExtension` covers the name.
    pub fn from_directory(path: &'a str, part: PathPart) -> Self {
        let root = root_len(path);
        let bytes = path.as_bytes();
        let mut end = path.len();
        while end > root && is_separator(bytes[end - 1]) {
            end -= 1;
        }

        match part {
            PathPart::FullName => Self::new(path, 0, end, part),
            PathPart::Name | PathPart::NameWithoutExtension => {
                let name = name_start(path, end);
                Self::new(path, name, end - name, part)
            }
            PathPart::Extension => Self::new(path, end, 0, part),
        }
    }

    fn new(path: &'a str, start: usize, len: usize, part: PathPart) -> Self {
        debug_assert!(start + len <= path.len());
        Self {
            path,
            start,
            len,
            part,
        }
    }

    /// The text covered by the span.
    pub fn as_str(&self) -> &'a str {
        &self.path[self.start..self.end()]
    }

    /// The full path the span points into.
    pub fn path(&self) -> &'a str {
        self.path
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn part(&self) -> PathPart {
        self.part
    }

    /// Replace `start..end` (relative to the span) with `replacement` and
    /// return the resulting full path.
    ///
    /// Offsets are clamped to the span. They must lie on char boundaries of
    /// the span text, which holds for offsets taken from a regex match on
    /// [`as_str`](Self::as_str).
    pub fn replace_range(&self, start: usize, end: usize, replacement: &str) -> String {
        let end = end.min(self.len);
        let start = start.min(end);
        let from = self.start + start;
        let to = self.start + end;

        let mut out = String::with_capacity(self.path.len() - (to - from) + replacement.len());
        out.push_str(&self.path[..from]);
        out.push_str(replacement);
        out.push_str(&self.path[to..]);
        out
    }

    /// Replace the whole span with `replacement` and return the full path.
    pub fn replace(&self, replacement: &str) -> String {
        self.replace_range(0, self.len, replacement)
    }
}

impl fmt::Display for PathSpan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_separator(b: u8) -> bool {
    b == b'/' || (cfg!(windows) && b == b'\\')
}

/// Length of the root prefix (`/`, `C:`, `C:\`) that a name never extends into.
fn root_len(path: &str) -> usize {
    let bytes = path.as_bytes();
    if cfg!(windows) && bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return if bytes.len() >= 3 && is_separator(bytes[2]) { 3 } else { 2 };
    }
    match bytes.first() {
        Some(&b) if is_separator(b) => 1,
        _ => 0,
    }
}

/// Scan back from `end` to the last separator, but never below the root.
fn name_start(path: &str, end: usize) -> usize {
    let root = root_len(path).min(end);
    path.as_bytes()[root..end]
        .iter()
        .rposition(|&b| is_separator(b))
        .map_or(root, |i| root + i + 1)
}

/// Position of the dot that starts the extension, if the name has one.
/// A leading dot (`.bashrc`) does not start an extension.
fn extension_dot(path: &str, name: usize, end: usize) -> Option<usize> {
    match path.as_bytes()[name..end].iter().rposition(|&b| b == b'.') {
        Some(0) | None => None,
        Some(i) => Some(name + i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATHS: &[&str] = &[
        "/a/b/report.txt",
        "/a/b/archive.tar.gz",
        "/a/b/README",
        "/a/b.d/noext",
        "relative/name.rs",
        "plain",
        "/",
        "",
        "/a/.bashrc",
        "/a/trailing.",
        "/ünï/cödé.rs",
    ];

    #[test]
    fn name_span_always_ends_at_path_end() {
        for p in PATHS {
            let span = PathSpan::from_file(p, PathPart::Name);
            assert_eq!(span.start() + span.len(), p.len(), "{p}");
        }
    }

    #[test]
    fn missing_extension_is_empty_at_end() {
        for p in ["/a/b/README", "/a/b.d/noext", "plain", "/", "", "/a/.bashrc"] {
            let span = PathSpan::from_file(p, PathPart::Extension);
            assert_eq!(span.len(), 0, "{p}");
            assert_eq!(span.start(), p.len(), "{p}");
        }
    }

    #[test]
    fn parts_of_a_file() {
        let p = "/a/b/archive.tar.gz";
        assert_eq!(PathSpan::from_file(p, PathPart::FullName).as_str(), p);
        assert_eq!(PathSpan::from_file(p, PathPart::Name).as_str(), "archive.tar.gz");
        assert_eq!(
            PathSpan::from_file(p, PathPart::NameWithoutExtension).as_str(),
            "archive.tar"
        );
        assert_eq!(PathSpan::from_file(p, PathPart::Extension).as_str(), "gz");
        assert_eq!(PathSpan::from_file("/ünï/cödé.rs", PathPart::Name).as_str(), "cödé.rs");
    }

    #[test]
    fn name_stops_at_root() {
        assert_eq!(PathSpan::from_file("/x", PathPart::Name).start(), 1);
        assert_eq!(PathSpan::from_file("x", PathPart::Name).start(), 0);
        assert!(PathSpan::from_file("/", PathPart::Name).is_empty());
    }

    #[test]
    fn directory_ignores_trailing_separator() {
        let span = PathSpan::from_directory("/a/src/", PathPart::Name);
        assert_eq!(span.as_str(), "src");
        assert_eq!(PathSpan::from_directory("/a/src.d", PathPart::Extension).len(), 0);
        assert_eq!(
            PathSpan::from_directory("/a/src.d", PathPart::NameWithoutExtension).as_str(),
            "src.d"
        );
        assert_eq!(PathSpan::from_directory("/", PathPart::Name).as_str(), "");
    }

    #[test]
    fn replacement_preserves_surroundings() {
        let span = PathSpan::from_file("/data/invoice_jan.txt", PathPart::Name);
        assert_eq!(span.replace_range(8, 11, "feb"), "/data/invoice_feb.txt");
        assert_eq!(span.replace("x"), "/data/x");

        let ext = PathSpan::from_file("/data/noext", PathPart::Extension);
        assert_eq!(ext.replace("md"), "/data/noextmd");
    }

    #[test]
    fn display_materializes_span() {
        let span = PathSpan::from_file("/tmp/a.rs", PathPart::Extension);
        assert_eq!(span.to_string(), "rs");
        assert_eq!(span.part(), PathPart::Extension);
    }
}
