use std::{fmt, sync::Arc};

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::netatmo::NetatmoClient;

pub const DEFAULT_SCOPE: &str = "read_station";

/// Bearer token shared read-only by every fetch of a run.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(Arc<str>);

impl AccessToken {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// Resource-owner password credentials for the token endpoint.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,

    pub client_secret: String,

    pub username: String,

    pub password: String,

    pub scope: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unable to retrieve access token: {error}: {description}")]
    Rejected { error: String, description: String },

    #[error("unable to retrieve access token: status code {status}")]
    Status { status: u16 },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,

    #[serde(default)]
    error_description: Option<String>,
}

impl NetatmoClient {
    /// Exchanges the credentials for a bearer token at `/oauth2/token`.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AccessToken, AuthError> {
        debug!(client_id = %credentials.client_id, "requesting access token");

        let params = [
            ("grant_type", "password"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("scope", credentials.scope.as_str()),
        ];

        let response = self
            .http()
            .post(self.endpoint("/oauth2/token"))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            let token: TokenResponse = response.json().await?;
            return Ok(AccessToken::new(token.access_token));
        }

        match response.json::<TokenErrorResponse>().await {
            Ok(rejected) => Err(AuthError::Rejected {
                error: rejected.error,
                description: rejected.error_description.unwrap_or_default(),
            }),
            Err(_) => Err(AuthError::Status {
                status: status.as_u16(),
            }),
        }
    }
}
