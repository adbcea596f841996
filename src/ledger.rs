//! Release ledger
//!
//! Filesystem-backed record of which release tags have been fully processed
//! for a repository. The record is a zero-byte marker file at
//! `{release_dir}/{tag}.release`; its mere existence means "this tag has been
//! fully processed, including all tasks". Markers are created with
//! exclusive-create semantics so two racing recorders cannot both believe
//! they wrote first, and are never updated or deleted by this system.

use std::path::{Path, PathBuf};

/// Marker file suffix appended to the release tag
const MARKER_SUFFIX: &str = ".release";

/// Durable record of fully-processed release tags for one repository
#[derive(Clone, Debug)]
pub struct ReleaseLedger {
    release_dir: PathBuf,
}

impl ReleaseLedger {
    /// Create a ledger rooted at the repository's storage directory
    pub fn new(release_dir: impl Into<PathBuf>) -> Self {
        Self {
            release_dir: release_dir.into(),
        }
    }

    /// Path of the marker file for `tag`
    pub fn marker_path(&self, tag: &str) -> PathBuf {
        self.release_dir.join(format!("{}{}", tag, MARKER_SUFFIX))
    }

    /// Whether `tag` has already been fully processed
    ///
    /// An unreadable marker path (permission error, missing directory) is
    /// treated as not recorded; the release will simply be reprocessed.
    pub async fn is_recorded(&self, tag: &str) -> bool {
        tokio::fs::try_exists(self.marker_path(tag))
            .await
            .unwrap_or(false)
    }

    /// Record `tag` as fully processed
    ///
    /// Uses exclusive creation so overlapping cycles that both reach the
    /// recording step degrade to one real write; losing that race is treated
    /// as success since the marker exists either way.
    ///
    /// # Errors
    /// Returns the underlying I/O error if the marker cannot be created for
    /// any reason other than already existing. Callers log this and move on:
    /// a missing marker only makes the release eligible for reprocessing.
    pub async fn record(&self, tag: &str) -> std::io::Result<()> {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.marker_path(tag))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// The storage directory this ledger records into
    pub fn release_dir(&self) -> &Path {
        &self.release_dir
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn marker_path_appends_release_suffix_to_tag() {
        let ledger = ReleaseLedger::new("/releases/acme/tool");
        assert_eq!(
            ledger.marker_path("v1.0.0"),
            PathBuf::from("/releases/acme/tool/v1.0.0.release")
        );
    }

    #[tokio::test]
    async fn unrecorded_tag_is_not_recorded() {
        let temp = TempDir::new().unwrap();
        let ledger = ReleaseLedger::new(temp.path());
        assert!(!ledger.is_recorded("v1.0.0").await);
    }

    #[tokio::test]
    async fn record_creates_zero_byte_marker() {
        let temp = TempDir::new().unwrap();
        let ledger = ReleaseLedger::new(temp.path());

        ledger.record("v1.0.0").await.unwrap();

        let marker = ledger.marker_path("v1.0.0");
        assert!(marker.is_file());
        assert_eq!(std::fs::metadata(&marker).unwrap().len(), 0);
        assert!(ledger.is_recorded("v1.0.0").await);
    }

    #[tokio::test]
    async fn recording_twice_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let ledger = ReleaseLedger::new(temp.path());

        ledger.record("v1.0.0").await.unwrap();
        ledger.record("v1.0.0").await.unwrap();

        assert!(ledger.is_recorded("v1.0.0").await);
    }

    #[tokio::test]
    async fn record_into_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let ledger = ReleaseLedger::new(temp.path().join("not-created"));

        assert!(ledger.record("v1.0.0").await.is_err());
        assert!(!ledger.is_recorded("v1.0.0").await);
    }

    #[tokio::test]
    async fn tags_are_recorded_independently() {
        let temp = TempDir::new().unwrap();
        let ledger = ReleaseLedger::new(temp.path());

        ledger.record("v1.0.0").await.unwrap();

        assert!(ledger.is_recorded("v1.0.0").await);
        assert!(!ledger.is_recorded("v1.1.0").await);
    }
}
