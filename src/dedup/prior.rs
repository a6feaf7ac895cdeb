//! Sources of identifiers captured by a previous run

use crate::listing::ListingId;
use crate::storage::StorageError;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to load prior identifiers
#[derive(Debug, Error)]
pub enum PriorError {
    #[error("sentinel file {path}: {source}")]
    Sentinel { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Supplies the identifiers a previous run captured
///
/// `Ok(None)` means there is nothing to deduplicate against (no previous run, or the previous
/// state is considered stale). Errors are soft: the deduplication filter logs them and starts
/// empty.
pub trait PriorIdentifierSource {
    fn load_prior_ids(&self) -> Result<Option<HashSet<ListingId>>, PriorError>;
}

impl<T: PriorIdentifierSource + ?Sized> PriorIdentifierSource for &T {
    fn load_prior_ids(&self) -> Result<Option<HashSet<ListingId>>, PriorError> {
        (**self).load_prior_ids()
    }
}

/// Counts the lines of a file
pub fn count_lines(path: &Path) -> io::Result<usize> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

/// Guards another source with a pair of sentinel files
///
/// Prior identifiers are only loaded when the backup sentinel has fewer lines than the
/// primary one; otherwise the previous run's output is treated as stale.
#[derive(Debug, Clone)]
pub struct SentinelGuard<S> {
    primary: PathBuf,
    backup: PathBuf,
    inner: S,
}

impl<S> SentinelGuard<S> {
    pub fn new(primary: impl Into<PathBuf>, backup: impl Into<PathBuf>, inner: S) -> Self {
        Self {
            primary: primary.into(),
            backup: backup.into(),
            inner,
        }
    }

    fn lines(path: &Path) -> Result<usize, PriorError> {
        count_lines(path).map_err(|source| PriorError::Sentinel {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl<S: PriorIdentifierSource> PriorIdentifierSource for SentinelGuard<S> {
    fn load_prior_ids(&self) -> Result<Option<HashSet<ListingId>>, PriorError> {
        let primary = Self::lines(&self.primary)?;
        let backup = Self::lines(&self.backup)?;

        if backup < primary {
            self.inner.load_prior_ids()
        } else {
            tracing::info!(
                "Sentinel {} has {} lines, {} has {}: previous output is stale",
                self.backup.display(),
                backup,
                self.primary.display(),
                primary
            );
            Ok(None)
        }
    }
}
