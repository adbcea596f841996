//! Error types for release-dl
//!
//! This module provides error handling for the crate:
//! - Fatal configuration errors (reject the document at startup)
//! - Transient remote errors (abort the current release-cycle only)
//! - Per-asset fetch errors carrying repository and asset identity

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for release-dl
///
/// Each variant includes the context needed to diagnose the failure from the
/// log stream alone, since the log stream is the only user-visible failure
/// surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "repos.name")
        key: Option<String>,
    },

    /// Configuration document failed to parse
    #[error("configuration error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Remote API error while querying a repository's releases
    #[error("{repo}: API error: {message}")]
    Api {
        /// Full `owner/name` of the repository being queried
        repo: String,
        /// What the remote side reported
        message: String,
    },

    /// Asset download failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl Error {
    /// Construct a configuration error with an optional offending key
    pub fn config(message: impl Into<String>, key: Option<&str>) -> Self {
        Error::Config {
            message: message.into(),
            key: key.map(str::to_string),
        }
    }
}

/// Errors from downloading a single release asset
///
/// Every variant carries the repository's full name and the asset name so a
/// failure is attributable from the log line alone. Partial destination files
/// are left in place on failure; the next attempt truncates them.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The download request could not be sent or the response never arrived
    #[error("{repo}: asset {asset}: request failed: {source}")]
    Request {
        /// Full `owner/name` of the repository
        repo: String,
        /// Name of the asset being fetched
        asset: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The remote side answered with a non-success status
    #[error("{repo}: asset {asset}: server returned HTTP {status}")]
    Status {
        /// Full `owner/name` of the repository
        repo: String,
        /// Name of the asset being fetched
        asset: String,
        /// HTTP status code from the response
        status: u16,
    },

    /// The destination file could not be created
    #[error("{repo}: asset {asset}: cannot create {path}: {source}")]
    Create {
        /// Full `owner/name` of the repository
        repo: String,
        /// Name of the asset being fetched
        asset: String,
        /// Destination path that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The byte stream broke mid-transfer
    #[error("{repo}: asset {asset}: download interrupted: {source}")]
    Stream {
        /// Full `owner/name` of the repository
        repo: String,
        /// Name of the asset being fetched
        asset: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// Writing downloaded bytes to the destination failed
    #[error("{repo}: asset {asset}: write failed: {source}")]
    Write {
        /// Full `owner/name` of the repository
        repo: String,
        /// Name of the asset being fetched
        asset: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
