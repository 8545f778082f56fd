#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Remote-sensing feature extraction.
//!
//! Resolves per-family [`DateRangeSelector`] windows, describes every point
//! as one batch, evaluates it on a [`ComputeBackend`] (a remote HTTP
//! service or an in-process image [`Catalog`]), and converts the raw
//! reductions into remote-only feature vectors with explicit fallback
//! provenance.

pub mod backend;
pub mod catalog;
pub mod extract;
pub mod http;
pub mod reducer;
pub mod retry;
pub mod session;
pub mod windows;

pub use backend::{BackendConfig, ComputeBackend, HttpBackendConfig, LocalBackend, connect};
pub use catalog::Catalog;
pub use extract::{RemoteConfig, build_batch, extract_features, interpret, resolve_point};
pub use session::SessionError;
pub use windows::{DateRangeSelector, ResolvedWindows, WindowPolicy};

/// Errors that can occur while extracting remote features.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (catalog file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend session could not be initialized.
    #[error("Backend session error: {0}")]
    Session(#[from] SessionError),

    /// Backend answered with a non-retryable or exhausted error status.
    #[error("Backend returned HTTP {status}: {message}")]
    Status {
        status: u16,
        /// Response body preview or retry summary.
        message: String,
    },

    /// The backend response lacks a requested point.
    #[error("Backend response has no entry for point '{name}'")]
    MissingPoint { name: String },

    /// The image catalog is malformed.
    #[error("Invalid image catalog: {message}")]
    Catalog { message: String },
}
