use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Result, TrawlError};
use crate::results::SearchTelemetry;
use crate::traits::ProgressSink;

/// The single operation a resolved entry turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Nothing to do: the entry is already in the desired state.
    None,
    Add,
    Update,
    Rename,
    Delete,
}

/// One progress event per processed entry.
///
/// `path` is the entry that was created (`Add`), overwritten (`Update`),
/// removed (`Delete`) or left alone (`None`); for `Rename` it is the old path
/// and `new_path` the new one. A failed mutation carries its `error`. Events
/// carry no formatting decisions.
#[derive(Debug)]
pub struct ProgressEvent {
    pub path: PathBuf,
    pub new_path: Option<PathBuf>,
    pub kind: OperationKind,
    /// The mutation was only planned, not applied.
    pub dry_run: bool,
    pub error: Option<TrawlError>,
}

impl ProgressEvent {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Applies mutations on behalf of an engine: honours dry-run, bumps the
/// telemetry and reports every outcome to the sink.
pub(crate) struct Reporter<'a> {
    sink: Option<Box<dyn ProgressSink + 'a>>,
    dry_run: bool,
    pub(crate) telemetry: SearchTelemetry,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(sink: Option<Box<dyn ProgressSink + 'a>>, dry_run: bool) -> Self {
        Self {
            sink,
            dry_run,
            telemetry: SearchTelemetry::default(),
        }
    }

    pub(crate) fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run `action` (skipped in dry-run mode) and report it as `kind`.
    ///
    /// Returns `false` when the action failed; the failure is reported and
    /// counted, never propagated.
    pub(crate) fn apply(
        &mut self,
        kind: OperationKind,
        path: &Path,
        new_path: Option<&Path>,
        action: impl FnOnce() -> Result<()>,
    ) -> bool {
        if !self.dry_run {
            if let Err(error) = action() {
                warn!(?path, ?kind, %error, "operation failed");
                self.telemetry.errors += 1;
                self.emit(ProgressEvent {
                    path: path.to_path_buf(),
                    new_path: new_path.map(Path::to_path_buf),
                    kind,
                    dry_run: false,
                    error: Some(error),
                });
                return false;
            }
        }

        if kind != OperationKind::None {
            if self.dry_run {
                info!(?path, ?new_path, ?kind, "[dry-run] would apply");
            } else {
                info!(?path, ?new_path, ?kind, "applied");
            }
        }
        self.telemetry.record(kind);
        self.emit(ProgressEvent {
            path: path.to_path_buf(),
            new_path: new_path.map(Path::to_path_buf),
            kind,
            dry_run: self.dry_run,
            error: None,
        });
        true
    }

    /// Report an error that happened outside a mutation (walker, metadata).
    pub(crate) fn fail(&mut self, path: &Path, error: TrawlError) {
        warn!(?path, %error, "entry skipped");
        self.telemetry.errors += 1;
        self.emit(ProgressEvent {
            path: error.path().unwrap_or(path).to_path_buf(),
            new_path: None,
            kind: OperationKind::None,
            dry_run: self.dry_run,
            error: Some(error),
        });
    }

    fn emit(&mut self, event: ProgressEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink.report(event);
        }
    }
}
