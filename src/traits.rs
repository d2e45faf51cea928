use std::fmt;
use std::path::Path;

use crate::progress::ProgressEvent;

/// Receives one [`ProgressEvent`] per processed entry.
///
/// This is the only channel from the engines up to logging and printing.
/// Any `FnMut(ProgressEvent)` closure is a sink:
///
/// ```rust
/// use trawl::{ProgressEvent, ProgressSink};
///
/// let mut events = Vec::new();
/// let mut sink = |event: ProgressEvent| events.push(event);
/// # fn takes(_: &mut impl ProgressSink) {}
/// # takes(&mut sink);
/// ```
pub trait ProgressSink {
    fn report(&mut self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressEvent),
{
    fn report(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Whether an entry exists on one side of a conflict, and as what.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Directory,
    File,
    Missing,
}

impl fmt::Display for Presence {
    /// The three-letter tag shown next to each path in a prompt.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Directory => "DIR",
            Self::File => "FIL",
            Self::Missing => "---",
        })
    }
}

/// Two entries that disagree and need a decision.
///
/// For sync, `first` is always the entry under the first directory and
/// `second` the one under the second, whichever pass is running. For copy and
/// move, `first` is the source and `second` the existing destination.
#[derive(Debug, Clone, Copy)]
pub struct Conflict<'a> {
    pub first: &'a Path,
    pub first_presence: Presence,
    pub second: &'a Path,
    pub second_presence: Presence,
}

/// Answer to a [`Conflict`].
///
/// `Yes` lets `first` win once and `No` lets `second` win once. The `ToAll`
/// answers make the same choice for the rest of the run without asking
/// again. `Cancel` stops the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogResult {
    Yes,
    YesToAll,
    No,
    NoToAll,
    Cancel,
}

/// Decides conflicts when the resolution policy is `Ask`.
///
/// Called synchronously, once per conflict. Any
/// `FnMut(&Conflict<'_>) -> DialogResult` closure is a provider.
pub trait DecisionProvider {
    fn decide(&mut self, conflict: &Conflict<'_>) -> DialogResult;
}

impl<F> DecisionProvider for F
where
    F: FnMut(&Conflict<'_>) -> DialogResult,
{
    fn decide(&mut self, conflict: &Conflict<'_>) -> DialogResult {
        self(conflict)
    }
}
