use std::time::Instant;

use tracing::info;

use crate::builder::SearchBuilder;
use crate::error::Result;
use crate::fsops;
use crate::progress::{OperationKind, Reporter};
use crate::results::Outcome;
use crate::traits::ProgressSink;

/// Delete every match of a search.
///
/// ```rust,no_run
/// use trawl::ops::DeleteOperation;
/// use trawl::{Filter, MatcherOptions};
///
/// let search = trawl::search("/tmp/build")
///     .files(MatcherOptions::named(Filter::new(r"\.o$")?));
/// let outcome = DeleteOperation::new().dry_run(true).run(search)?;
/// println!("{} files would go", outcome.telemetry.deleted);
/// # Ok::<(), trawl::TrawlError>(())
/// ```
#[derive(Default)]
pub struct DeleteOperation<'a> {
    content_only: bool,
    dry_run: bool,
    progress: Option<Box<dyn ProgressSink + 'a>>,
}

impl<'a> DeleteOperation<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty matched directories instead of removing them.
    pub fn content_only(mut self, yes: bool) -> Self {
        self.content_only = yes;
        self
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
        let started = Instant::now();
        let mut reporter = Reporter::new(self.progress, self.dry_run);
        let mut walker = search.can_recurse_match(false).build()?;
        info!(root = ?walker.root(), content_only = self.content_only, "delete started");

        while let Some(entry) = super::next_match(&mut walker, &mut reporter)? {
            let path = entry.path();
            let content_only = self.content_only && entry.is_directory();
            reporter.apply(OperationKind::Delete, path, None, || {
                if content_only {
                    fsops::remove_contents(path)
                } else {
                    fsops::remove(path)
                }
            });
        }

        Ok(super::finish(&walker, reporter, started, false))
    }
}
