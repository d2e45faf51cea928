use std::fs::Metadata;
use std::ops::BitOr;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::error::{Result, TrawlError};
use crate::filter::Attributes;
use crate::fsops;

/// Which properties two files must share to count as equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompareProperties(u8);

impl CompareProperties {
    pub const NONE: Self = Self(0);
    pub const SIZE: Self = Self(1);
    pub const MODIFIED_TIME: Self = Self(1 << 1);
    pub const ATTRIBUTES: Self = Self(1 << 2);
    /// Byte-for-byte comparison. Also enables rename detection.
    pub const CONTENT: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for CompareProperties {
    fn default() -> Self {
        Self::SIZE | Self::MODIFIED_TIME
    }
}

impl BitOr for CompareProperties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Which side wins when the two directories disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncConflictResolution {
    /// Consult the [`DecisionProvider`](crate::DecisionProvider).
    #[default]
    Ask,
    FirstWins,
    SecondWins,
}

/// Outcome of comparing a source file with its counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Comparison {
    Equal,
    /// The source is newer beyond the tolerance.
    SourceNewer,
    /// The destination is newer beyond the tolerance.
    DestNewer,
    /// Some other selected property differs.
    Different,
}

/// Compare two files on the selected properties.
///
/// Modified time is checked first: a side newer by more than `tolerance`
/// decides the comparison on its own. Content is only read when the lengths
/// agree.
pub(crate) fn compare_files(
    source: &Path,
    source_meta: &Metadata,
    dest: &Path,
    dest_meta: &Metadata,
    properties: CompareProperties,
    tolerance: Duration,
) -> Result<Comparison> {
    if properties.contains(CompareProperties::MODIFIED_TIME) {
        let ours = modified(source, source_meta)?;
        let theirs = modified(dest, dest_meta)?;
        match ours.duration_since(theirs) {
            Ok(ahead) if ahead > tolerance => return Ok(Comparison::SourceNewer),
            Ok(_) => {}
            Err(behind) if behind.duration() > tolerance => return Ok(Comparison::DestNewer),
            Err(_) => {}
        }
    }

    let same_len = source_meta.len() == dest_meta.len();
    if properties.contains(CompareProperties::SIZE) && !same_len {
        return Ok(Comparison::Different);
    }
    if properties.contains(CompareProperties::ATTRIBUTES)
        && Attributes::of(source, source_meta) != Attributes::of(dest, dest_meta)
    {
        return Ok(Comparison::Different);
    }
    if properties.contains(CompareProperties::CONTENT)
        && (!same_len || !fsops::same_content(source, dest)?)
    {
        return Ok(Comparison::Different);
    }
    Ok(Comparison::Equal)
}

pub(crate) fn modified(path: &Path, metadata: &Metadata) -> Result<SystemTime> {
    metadata.modified().map_err(|e| TrawlError::io(path, e))
}
