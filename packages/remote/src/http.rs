//! Remote compute service client.

use std::time::Duration;

use async_trait::async_trait;
use geoalert_remote_models::{BatchRequest, BatchResponse};

use crate::RemoteError;
use crate::backend::{ComputeBackend, HttpBackendConfig};
use crate::retry::{self, RetryPolicy};
use crate::session::Session;

/// Sends batches to `POST {base_url}/v1/projects/{project}/batch:evaluate`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    session: Session,
    retry: RetryPolicy,
}

impl HttpBackend {
    /// Establishes a verified session.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Session`] if credentials cannot be resolved
    /// or are rejected.
    pub async fn connect(config: &HttpBackendConfig) -> Result<Self, RemoteError> {
        let session = Session::establish(config).await?;
        Ok(Self::with_session(session, config))
    }

    #[must_use]
    pub fn with_session(session: Session, config: &HttpBackendConfig) -> Self {
        Self {
            session,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
            },
        }
    }

    #[must_use]
    pub fn evaluate_url(&self) -> String {
        format!("{}/batch:evaluate", self.session.project_url())
    }
}

#[async_trait]
impl ComputeBackend for HttpBackend {
    fn id(&self) -> &str {
        "http"
    }

    async fn evaluate(&self, request: &BatchRequest) -> Result<BatchResponse, RemoteError> {
        let url = self.evaluate_url();
        log::info!("Submitting batch of {} points to {url}", request.points.len());

        let response: BatchResponse = retry::send_json(&self.retry, || {
            self.session
                .authorize(self.session.client.post(&url))
                .json(request)
        })
        .await?;

        log::info!("Backend returned {} point reductions", response.points.len());
        Ok(response)
    }
}
