//! Compute backends that evaluate a [`BatchRequest`].

use std::path::PathBuf;

use async_trait::async_trait;
use geoalert_remote_models::{BatchRequest, BatchResponse, PointReduction};
use serde::{Deserialize, Serialize};

use crate::RemoteError;
use crate::catalog::Catalog;
use crate::http::HttpBackend;
use crate::reducer;

/// Evaluates every point and derivation of a batch in one call.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    /// Short identifier used in logs (e.g., `"http"`).
    fn id(&self) -> &str;

    /// Evaluates `request`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the batch cannot be evaluated. This is
    /// fatal for the run.
    async fn evaluate(&self, request: &BatchRequest) -> Result<BatchResponse, RemoteError>;
}

/// Remote compute service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub project: String,
    /// File holding the access token, used when the environment has none.
    pub credentials_path: Option<PathBuf>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787".to_string(),
            project: "geoalert".to_string(),
            credentials_path: None,
            timeout_secs: 300,
            max_retries: 3,
            retry_base_delay_ms: 2000,
        }
    }
}

/// Which backend evaluates the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Remote compute service over HTTP.
    Http(HttpBackendConfig),
    /// Offline evaluation against an image catalog file.
    Local { catalog_path: PathBuf },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Http(HttpBackendConfig::default())
    }
}

/// Initializes the configured backend.
///
/// For HTTP this resolves credentials and verifies the session; for a
/// local backend it loads the catalog.
///
/// # Errors
///
/// Returns [`RemoteError`] if initialization fails.
pub async fn connect(config: &BackendConfig) -> Result<Box<dyn ComputeBackend>, RemoteError> {
    match config {
        BackendConfig::Http(http) => Ok(Box::new(HttpBackend::connect(http).await?)),
        BackendConfig::Local { catalog_path } => {
            Ok(Box::new(LocalBackend::new(Catalog::load(catalog_path)?)))
        }
    }
}

/// Evaluates batches in-process against a [`Catalog`].
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    catalog: Catalog,
}

impl LocalBackend {
    #[must_use]
    pub const fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Synchronous evaluation shared by the trait impl.
    #[must_use]
    pub fn evaluate_now(&self, request: &BatchRequest) -> BatchResponse {
        let plan = &request.plan;
        let points = request
            .points
            .iter()
            .map(|point| PointReduction {
                name: point.name.clone(),
                reflectance: reducer::reduce_pair(&self.catalog, &plan.reflectance, point),
                temperature: reducer::reduce(&self.catalog, &plan.temperature, point),
                precipitation: reducer::reduce(&self.catalog, &plan.precipitation, point),
            })
            .collect();

        BatchResponse { points }
    }
}

#[async_trait]
impl ComputeBackend for LocalBackend {
    fn id(&self) -> &str {
        "local"
    }

    async fn evaluate(&self, request: &BatchRequest) -> Result<BatchResponse, RemoteError> {
        log::debug!("Evaluating {} points locally", request.points.len());
        Ok(self.evaluate_now(request))
    }
}
