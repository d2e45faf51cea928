use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::builder::SearchBuilder;
use crate::entry::{EntryKind, EntryMatch};
use crate::error::{Result, TrawlError};
use crate::filter::Filter;
use crate::fsops;
use crate::progress::{OperationKind, Reporter};
use crate::results::Outcome;
use crate::traits::ProgressSink;

/// How the new name is produced from the matched name.
#[derive(Clone)]
pub enum Replacement {
    /// Regex replacement over the span; `$1`, `${name}` and `$$` expand as
    /// in [`regex::Regex::replace_all`].
    Template(String),
    /// Called with the captured text; its result replaces the capture.
    Evaluator(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl Replacement {
    pub fn template(template: impl Into<String>) -> Self {
        Self::Template(template.into())
    }

    pub fn evaluator(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::Evaluator(Arc::new(f))
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(template) => f.debug_tuple("Template").field(template).finish(),
            Self::Evaluator(_) => f.write_str("Evaluator(..)"),
        }
    }
}

/// Rename every match by rewriting the part of its name the name filter
/// matched.
///
/// The search needs a name filter for each entry kind it yields. Names that
/// come out empty or unchanged are left alone; a name that already exists is
/// reported as an error and skipped.
pub struct RenameOperation<'a> {
    replacement: Replacement,
    dry_run: bool,
    progress: Option<Box<dyn ProgressSink + 'a>>,
}

impl<'a> RenameOperation<'a> {
    pub fn new(replacement: Replacement) -> Self {
        Self {
            replacement,
            dry_run: false,
            progress: None,
        }
    }

    pub fn dry_run(mut self, yes: bool) -> Self {
        self.dry_run = yes;
        self
    }

    pub fn progress(mut self, sink: impl ProgressSink + 'a) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    pub fn run(self, search: SearchBuilder) -> Result<Outcome> {
        let file_filter = search.name_filter(EntryKind::File).cloned();
        let dir_filter = search.name_filter(EntryKind::Directory).cloned();
        if file_filter.is_none() && dir_filter.is_none() {
            return Err(TrawlError::InvalidConfig("rename needs a name filter".into()));
        }

        let started = Instant::now();
        let mut reporter = Reporter::new(self.progress, self.dry_run);
        let mut walker = search.can_recurse_match(false).build()?;
        info!(root = ?walker.root(), replacement = ?self.replacement, "rename started");

        while let Some(entry) = super::next_match(&mut walker, &mut reporter)? {
            let filter = match entry.kind() {
                EntryKind::File => file_filter.as_ref(),
                EntryKind::Directory => dir_filter.as_ref(),
            };
            let Some(filter) = filter else {
                // No name filter for this kind: nothing to rewrite.
                reporter.apply(OperationKind::None, entry.path(), None, || Ok(()));
                continue;
            };

            let Some(new_path) = renamed_path(&entry, filter, &self.replacement) else {
                match entry.span() {
                    Some(_) => {
                        debug!(path = ?entry.path(), "name unchanged or empty");
                        reporter.apply(OperationKind::None, entry.path(), None, || Ok(()));
                    }
                    None => reporter.fail(entry.path(), TrawlError::NonUtf8Path(entry.path().to_path_buf())),
                }
                continue;
            };

            if fs::symlink_metadata(&new_path).is_ok() {
                reporter.fail(entry.path(), TrawlError::AlreadyExists(new_path));
                continue;
            }

            let path = entry.path();
            reporter.apply(OperationKind::Rename, path, Some(&new_path), || {
                fsops::rename(path, &new_path)
            });
        }

        Ok(super::finish(&walker, reporter, started, false))
    }
}

/// The renamed path, or `None` when the name would be empty, unchanged or
/// would leave its directory.
fn renamed_path(entry: &EntryMatch, filter: &Filter, replacement: &Replacement) -> Option<PathBuf> {
    let span = entry.span()?;

    let (renamed, span_len) = match replacement {
        Replacement::Template(template) => {
            let text = filter.regex().replace_all(span.as_str(), template.as_str());
            (span.replace(&text), text.len())
        }
        Replacement::Evaluator(evaluate) => {
            let capture = entry.name_capture()?;
            let value = evaluate(&capture.value);
            let len = span.len() - capture.value.len() + value.len();
            (span.replace_range(capture.start, capture.end(), &value), len)
        }
    };

    let renamed = PathBuf::from(renamed);
    let unchanged = renamed.as_path() == entry.path();
    let moved = renamed.parent() != entry.path().parent() || renamed.file_name().is_none();
    if span_len == 0 || unchanged || moved {
        return None;
    }
    Some(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::MatcherOptions;
    use crate::matcher::EntryMatcher;
    use crate::span::PathPart;

    fn matched(path: &std::path::Path, filter: &Filter, part: PathPart) -> EntryMatch {
        let options = MatcherOptions {
            name: Some(filter.clone()),
            part,
            ..MatcherOptions::default()
        };
        EntryMatcher::files(options).is_match(path).unwrap().unwrap()
    }

    #[test]
    fn template_expands_groups_inside_the_span() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("img_001.jpg");
        fs::write(&file, "").unwrap();

        let filter = Filter::new(r"img_(\d+)").unwrap();
        let entry = matched(&file, &filter, PathPart::NameWithoutExtension);
        let renamed = renamed_path(&entry, &filter, &Replacement::template("photo-$1"));
        assert_eq!(renamed, Some(dir.path().join("photo-001.jpg")));
    }

    #[test]
    fn evaluator_replaces_only_the_capture() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("draft.TXT");
        fs::write(&file, "").unwrap();

        let filter = Filter::new("TXT").unwrap();
        let entry = matched(&file, &filter, PathPart::Extension);
        let lower = Replacement::evaluator(|s| s.to_lowercase());
        assert_eq!(renamed_path(&entry, &filter, &lower), Some(dir.path().join("draft.txt")));
    }

    #[test]
    fn empty_or_unchanged_names_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("keep.txt");
        fs::write(&file, "").unwrap();

        let filter = Filter::new("keep").unwrap();
        let entry = matched(&file, &filter, PathPart::NameWithoutExtension);
        assert_eq!(renamed_path(&entry, &filter, &Replacement::template("keep")), None);

        let entry = matched(&file, &filter, PathPart::Name);
        let everything = Filter::new(".+").unwrap();
        assert_eq!(renamed_path(&entry, &everything, &Replacement::template("")), None);
    }
}
