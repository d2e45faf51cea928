use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::Result;
use crate::filter::Filter;
use crate::span::{PathPart, PathSpan};

/// Cached verdict of the directory predicate for one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStatus {
    /// Not evaluated yet.
    #[default]
    Unknown,
    Success,
    /// A positive filter did not match. Descendants may still match.
    FailFromPositiveFilter,
    /// A negative filter vetoed the directory and everything below it.
    FailFromNegativeFilter,
}

impl MatchStatus {
    /// Whether files directly inside the directory are matched. `None` until resolved.
    pub fn matches_files(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Success => Some(true),
            Self::FailFromPositiveFilter | Self::FailFromNegativeFilter => Some(false),
        }
    }

    /// Whether the walker descends into the directory. `None` until resolved.
    pub fn descends(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Success | Self::FailFromPositiveFilter => Some(true),
            Self::FailFromNegativeFilter => Some(false),
        }
    }
}

/// Include/exclude rule the walker consults for each directory.
///
/// Built either from a name filter over a directory path span or from a
/// gitignore file. A positive filter limits which directories have their files
/// matched but never stops descent; a negative filter (or an ignore rule)
/// prunes whole subtrees.
#[derive(Debug, Clone)]
pub struct DirectoryPredicate {
    rule: Rule,
}

#[derive(Debug, Clone)]
enum Rule {
    Name { filter: Filter, part: PathPart },
    Gitignore(Gitignore),
}

impl DirectoryPredicate {
    /// Predicate over the directory name.
    pub fn new(filter: Filter) -> Self {
        Self::with_part(filter, PathPart::Name)
    }

    /// Predicate over `part` of the directory path.
    pub fn with_part(filter: Filter, part: PathPart) -> Self {
        Self {
            rule: Rule::Name { filter, part },
        }
    }

    /// Exclude the directories ignored by the gitignore-style `file`, whose
    /// patterns are relative to `root`.
    pub fn from_gitignore(root: impl AsRef<Path>, file: impl AsRef<Path>) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(file) {
            return Err(err.into());
        }
        Ok(Self {
            rule: Rule::Gitignore(builder.build()?),
        })
    }

    /// Whether the predicate can veto descent. Such predicates are evaluated
    /// as soon as a directory is discovered.
    pub fn is_exclusive(&self) -> bool {
        match &self.rule {
            Rule::Name { filter, .. } => filter.is_negative(),
            Rule::Gitignore(_) => true,
        }
    }

    pub fn evaluate(&self, path: &Path) -> MatchStatus {
        match &self.rule {
            Rule::Name { filter, part } => {
                let text = path.to_string_lossy();
                let span = PathSpan::from_directory(&text, *part);
                if filter.is_match(span.as_str()) {
                    MatchStatus::Success
                } else if filter.is_negative() {
                    MatchStatus::FailFromNegativeFilter
                } else {
                    MatchStatus::FailFromPositiveFilter
                }
            }
            Rule::Gitignore(gitignore) => {
                if gitignore.matched(path, true).is_ignore() {
                    MatchStatus::FailFromNegativeFilter
                } else {
                    MatchStatus::Success
                }
            }
        }
    }

    /// Status a newly discovered child starts with, given its parent's status.
    ///
    /// Exclusive predicates are evaluated right away since descent depends on
    /// them. Below a directory that passed a positive filter, children pass
    /// too; anything else stays `Unknown` until the walker needs it.
    pub(crate) fn discover(&self, path: &Path, parent: MatchStatus) -> MatchStatus {
        if self.is_exclusive() {
            self.evaluate(path)
        } else if parent == MatchStatus::Success {
            MatchStatus::Success
        } else {
            MatchStatus::Unknown
        }
    }
}
