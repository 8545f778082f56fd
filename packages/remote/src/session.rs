//! One-time backend session initialization.
//!
//! Credentials are resolved in order from the [`TOKEN_ENV`] environment
//! variable, the configured credentials file, and finally an interactive
//! password prompt when a terminal is attached. The resolved token is then
//! verified against the project endpoint before any batch is sent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dialoguer::Password;

use crate::backend::HttpBackendConfig;

/// Environment variable holding the backend access token.
pub const TOKEN_ENV: &str = "GEOALERT_BACKEND_TOKEN";

/// Errors that make session initialization fail.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No token from the environment, the file, or a prompt.
    #[error(
        "No backend credentials: set GEOALERT_BACKEND_TOKEN, configure backend.credentials_path, or run interactively"
    )]
    NoCredentials,

    /// The credentials file exists but could not be read.
    #[error("Failed to read credentials file {path}: {source}")]
    CredentialsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The interactive prompt failed.
    #[error("Credential prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    /// The backend answered the verification request with an error.
    #[error("Backend rejected session for project '{project}': HTTP {status}")]
    Rejected { project: String, status: u16 },

    /// The verification request could not be sent.
    #[error("Session verification failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Where a token came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    File(PathBuf),
    Prompt,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Environment => write!(f, "${TOKEN_ENV}"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Prompt => f.write_str("interactive prompt"),
        }
    }
}

/// A resolved access token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
    pub source: CredentialSource,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

impl Credentials {
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

fn non_empty(token: &str) -> Option<String> {
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Resolves credentials from the environment, `credentials_path`, or a
/// prompt.
///
/// # Errors
///
/// Returns [`SessionError`] if the file cannot be read, the prompt fails,
/// or no source yields a token.
pub fn resolve_credentials(credentials_path: Option<&Path>) -> Result<Credentials, SessionError> {
    resolve_from(
        std::env::var(TOKEN_ENV).ok(),
        credentials_path,
        console::user_attended(),
    )
}

fn resolve_from(
    env_token: Option<String>,
    credentials_path: Option<&Path>,
    interactive: bool,
) -> Result<Credentials, SessionError> {
    if let Some(token) = env_token.as_deref().and_then(non_empty) {
        return Ok(Credentials {
            token,
            source: CredentialSource::Environment,
        });
    }

    if let Some(path) = credentials_path.filter(|p| p.exists()) {
        let contents =
            std::fs::read_to_string(path).map_err(|source| SessionError::CredentialsFile {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(token) = non_empty(&contents) {
            return Ok(Credentials {
                token,
                source: CredentialSource::File(path.to_path_buf()),
            });
        }
        log::warn!("Credentials file {} is empty", path.display());
    }

    if !interactive {
        return Err(SessionError::NoCredentials);
    }

    let token = Password::new()
        .with_prompt("Backend access token")
        .interact()?;

    non_empty(&token)
        .map(|token| Credentials {
            token,
            source: CredentialSource::Prompt,
        })
        .ok_or(SessionError::NoCredentials)
}

/// An authenticated connection to one backend project.
#[derive(Debug, Clone)]
pub struct Session {
    pub client: reqwest::Client,
    pub base_url: String,
    pub project: String,
    credentials: Credentials,
}

impl Session {
    /// Resolves credentials and verifies them against the project.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if no credentials are available or the
    /// backend does not accept them.
    pub async fn establish(config: &HttpBackendConfig) -> Result<Self, SessionError> {
        let credentials = resolve_credentials(config.credentials_path.as_deref())?;
        log::info!("Using backend credentials from {}", credentials.source);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let session = Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project: config.project.clone(),
            credentials,
        };
        session.verify().await?;

        log::info!(
            "Backend session ready (project '{}' at {})",
            session.project,
            session.base_url
        );
        Ok(session)
    }

    #[must_use]
    pub fn project_url(&self) -> String {
        format!("{}/v1/projects/{}", self.base_url, self.project)
    }

    /// Adds the bearer token to `request`.
    #[must_use]
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(self.credentials.token())
    }

    async fn verify(&self) -> Result<(), SessionError> {
        let url = self.project_url();
        log::debug!("Verifying session: GET {url}");

        let response = self.authorize(self.client.get(&url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Rejected {
                project: self.project.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
