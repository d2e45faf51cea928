use std::fmt;
use std::fs;
use std::ops::{BitOr, BitOrAssign};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use regex::Regex;

use crate::error::{Result, TrawlError};
use crate::span::PathPart;

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A regular-expression filter over some text (a path span or file content).
///
/// A positive filter passes when the pattern matches; the first qualifying
/// match is captured. A negative filter passes when the pattern does not
/// match and captures nothing.
///
/// Building the regex (flags, escaping, option syntax) is the caller's job;
/// the filter only evaluates it.
#[derive(Clone)]
pub struct Filter {
    regex: Regex,
    negative: bool,
    group: Option<usize>,
    predicate: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
}

/// A captured match: byte offset into the searched text plus the matched value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub start: usize,
    pub value: String,
}

impl Capture {
    pub fn end(&self) -> usize {
        self.start + self.value.len()
    }
}

/// Outcome of running a [`Filter`].
#[derive(Debug)]
pub(crate) enum Verdict {
    Captured(Capture),
    Passed,
    Rejected,
}

impl Filter {
    /// Compile `pattern` into a positive filter.
    pub fn new(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::from_regex)
            .map_err(|e| TrawlError::InvalidPattern(e.to_string()))
    }

    pub fn from_regex(regex: Regex) -> Self {
        Self {
            regex,
            negative: false,
            group: None,
            predicate: None,
        }
    }

    /// Invert the filter: it passes when the pattern does not match.
    pub fn negate(mut self) -> Self {
        self.negative = true;
        self
    }

    /// Capture group `index` instead of the whole match.
    pub fn group(mut self, index: usize) -> Self {
        self.group = Some(index);
        self
    }

    /// Only accept matches whose captured value satisfies `predicate`.
    pub fn predicate(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Whether the filter passes for `input`.
    pub fn is_match(&self, input: &str) -> bool {
        !matches!(self.verdict(input), Verdict::Rejected)
    }

    pub(crate) fn verdict(&self, input: &str) -> Verdict {
        match (self.first_hit(input), self.negative) {
            (Some(capture), false) => Verdict::Captured(capture),
            (None, true) => Verdict::Passed,
            _ => Verdict::Rejected,
        }
    }

    fn first_hit(&self, input: &str) -> Option<Capture> {
        for caps in self.regex.captures_iter(input) {
            let Some(m) = caps.get(self.group.unwrap_or(0)) else {
                continue;
            };
            if self.predicate.as_ref().map_or(true, |p| p(m.as_str())) {
                return Some(Capture {
                    start: m.start(),
                    value: m.as_str().to_owned(),
                });
            }
        }
        None
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("regex", &self.regex.as_str())
            .field("negative", &self.negative)
            .field("group", &self.group)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ExtensionFilter
// ---------------------------------------------------------------------------

/// Plain string comparison against a file's extension span. No regex, no I/O.
#[derive(Debug, Clone, Default)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
    negative: bool,
    case_sensitive: bool,
}

impl ExtensionFilter {
    /// Accept any of `extensions` (a leading dot is optional).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| {
                    let e: String = e.into();
                    e.strip_prefix('.').map(str::to_owned).unwrap_or(e)
                })
                .collect(),
            negative: false,
            case_sensitive: false,
        }
    }

    /// Reject the listed extensions instead of accepting them.
    pub fn negate(mut self) -> Self {
        self.negative = true;
        self
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    pub fn is_match(&self, extension: &str) -> bool {
        let listed = self.extensions.iter().any(|e| {
            if self.case_sensitive {
                e == extension
            } else {
                e.eq_ignore_ascii_case(extension)
            }
        });
        listed != self.negative
    }
}

// ---------------------------------------------------------------------------
// ValueFilter
// ---------------------------------------------------------------------------

/// A comparison against an ordered value such as a size or a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFilter<T> {
    LessThan(T),
    AtMost(T),
    Equal(T),
    AtLeast(T),
    GreaterThan(T),
    /// Inclusive on both ends.
    Between(T, T),
}

pub type SizeFilter = ValueFilter<u64>;
pub type TimeFilter = ValueFilter<SystemTime>;

impl<T: PartialOrd> ValueFilter<T> {
    pub fn test(&self, value: &T) -> bool {
        match self {
            Self::LessThan(x) => value < x,
            Self::AtMost(x) => value <= x,
            Self::Equal(x) => value == x,
            Self::AtLeast(x) => value >= x,
            Self::GreaterThan(x) => value > x,
            Self::Between(lo, hi) => lo <= value && value <= hi,
        }
    }

    /// `false` for an empty `Between` range.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Between(lo, hi) => lo <= hi,
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// A small set of portable entry attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Attributes(u8);

impl Attributes {
    pub const NONE: Self = Self(0);
    pub const READ_ONLY: Self = Self(1);
    /// Dot-prefixed name, or the hidden attribute on Windows.
    pub const HIDDEN: Self = Self(1 << 1);
    pub const SYMLINK: Self = Self(1 << 2);
    /// Any execute bit on Unix. Never set on other platforms.
    pub const EXECUTABLE: Self = Self(1 << 3);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Attributes of the entry at `path`, read from its (non-followed) metadata.
    pub fn of(path: &Path, metadata: &fs::Metadata) -> Self {
        let mut attrs = Self::NONE;
        if metadata.permissions().readonly() {
            attrs |= Self::READ_ONLY;
        }
        if metadata.file_type().is_symlink() {
            attrs |= Self::SYMLINK;
        }
        if is_hidden(path, metadata) {
            attrs |= Self::HIDDEN;
        }
        if is_executable(metadata) {
            attrs |= Self::EXECUTABLE;
        }
        attrs
    }
}

impl BitOr for Attributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Attributes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(windows)]
fn is_hidden(_path: &Path, metadata: &fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
fn is_hidden(path: &Path, _metadata: &fs::Metadata) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.is_file() && metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

// ---------------------------------------------------------------------------
// MatcherOptions
// ---------------------------------------------------------------------------

/// Emptiness requirement for a matched entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyOption {
    #[default]
    Any,
    Empty,
    NonEmpty,
}

/// Filters for one [`EntryMatcher`](crate::EntryMatcher). Everything is optional;
/// the default matches every entry.
///
/// `extension`, `size` and `content` only apply to files.
#[derive(Debug, Clone, Default)]
pub struct MatcherOptions {
    pub name: Option<Filter>,
    /// Which part of the path `name` is matched against.
    pub part: PathPart,
    pub extension: Option<ExtensionFilter>,
    /// Attributes the entry must have.
    pub attributes: Attributes,
    /// Attributes the entry must not have.
    pub attributes_to_skip: Attributes,
    pub size: Option<SizeFilter>,
    pub created: Option<TimeFilter>,
    pub modified: Option<TimeFilter>,
    pub empty: EmptyOption,
    pub content: Option<Filter>,
}

impl MatcherOptions {
    /// Options with only a name filter.
    pub fn named(filter: Filter) -> Self {
        Self {
            name: Some(filter),
            ..Self::default()
        }
    }

    pub(crate) fn needs_metadata(&self) -> bool {
        !self.attributes.is_empty()
            || !self.attributes_to_skip.is_empty()
            || self.size.is_some()
            || self.created.is_some()
            || self.modified.is_some()
    }

    pub(crate) fn validate(&self, directories: bool) -> Result<()> {
        if directories && (self.extension.is_some() || self.size.is_some() || self.content.is_some()) {
            return Err(TrawlError::InvalidConfig(
                "extension, size and content filters apply to files only".into(),
            ));
        }
        if self.attributes.intersects(self.attributes_to_skip) {
            return Err(TrawlError::InvalidConfig(
                "an attribute cannot be both required and skipped".into(),
            ));
        }
        let ranges_ok = self.size.map_or(true, |f| f.is_valid())
            && self.created.map_or(true, |f| f.is_valid())
            && self.modified.map_or(true, |f| f.is_valid());
        if !ranges_ok {
            return Err(TrawlError::InvalidConfig("empty range in a size or time filter".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_filter_captures_first_match() {
        let filter = Filter::new(r"\d+").unwrap();
        match filter.verdict("a12b345") {
            Verdict::Captured(c) => {
                assert_eq!(c.start, 1);
                assert_eq!(c.value, "12");
                assert_eq!(c.end(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!filter.is_match("abc"));
    }

    #[test]
    fn negative_filter_passes_without_capture() {
        let filter = Filter::new("tmp").unwrap().negate();
        assert!(matches!(filter.verdict("src"), Verdict::Passed));
        assert!(matches!(filter.verdict("tmp"), Verdict::Rejected));
    }

    #[test]
    fn group_and_predicate_select_the_capture() {
        let filter = Filter::new(r"v(\d+)").unwrap().group(1).predicate(|v| v.len() > 1);
        match filter.verdict("v1 v22") {
            Verdict::Captured(c) => assert_eq!((c.start, c.value.as_str()), (4, "22")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(matches!(Filter::new("("), Err(TrawlError::InvalidPattern(_))));
    }

    #[test]
    fn extension_filter_compares_strings() {
        let filter = ExtensionFilter::new([".RS", "toml"]);
        assert!(filter.is_match("rs"));
        assert!(filter.is_match("toml"));
        assert!(!filter.is_match("txt"));
        assert!(!filter.clone().case_sensitive(true).is_match("rs"));
        assert!(filter.negate().is_match("txt"));
    }

    #[test]
    fn value_filter_bounds() {
        assert!(SizeFilter::LessThan(10).test(&9));
        assert!(!SizeFilter::LessThan(10).test(&10));
        assert!(SizeFilter::AtMost(10).test(&10));
        assert!(SizeFilter::Between(1, 3).test(&3));
        assert!(!SizeFilter::Between(1, 3).test(&4));
        assert!(!SizeFilter::Between(3, 1).is_valid());
        assert!(SizeFilter::GreaterThan(0).test(&1));
    }

    #[test]
    fn attribute_sets() {
        let set = Attributes::READ_ONLY | Attributes::HIDDEN;
        assert!(set.contains(Attributes::READ_ONLY));
        assert!(!set.contains(Attributes::READ_ONLY | Attributes::SYMLINK));
        assert!(set.intersects(Attributes::HIDDEN | Attributes::SYMLINK));
        assert!(Attributes::NONE.is_empty());
    }

    #[test]
    fn directory_options_reject_file_only_filters() {
        let options = MatcherOptions {
            size: Some(SizeFilter::AtLeast(1)),
            ..MatcherOptions::default()
        };
        assert!(options.validate(false).is_ok());
        assert!(options.validate(true).is_err());

        let clash = MatcherOptions {
            attributes: Attributes::HIDDEN,
            attributes_to_skip: Attributes::HIDDEN,
            ..MatcherOptions::default()
        };
        assert!(clash.validate(false).is_err());
    }
}
