//! Two-way synchronization of two directory trees on top of the walker.

mod builder;
mod compare;
mod engine;
mod snapshot;

pub use builder::SyncBuilder;
pub use compare::{CompareProperties, SyncConflictResolution};
pub use engine::{SyncEngine, SyncOptions};
