//! Remote save store over the game's HTTP API.
//!
//! `GET {base}/saves/latest?userId=..` returns the raw snapshot (404 when the
//! user has never saved); `POST {base}/saves?userId=..` upserts the full
//! snapshot and answers `{ "success": true, "timestamp": <ms> }`.

use async_trait::async_trait;
use cultivation_game::{GameState, RemoteStore, SaveReceipt, StoreError};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const LOG_TARGET: &str = "cultivation::http";

#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    user_id: String,
    token: Option<String>,
}

impl HttpStore {
    /// # Errors
    ///
    /// Returns [`StoreError::Transient`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        user_id: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Transient(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.into(),
            token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.query(&[("userId", self.user_id.as_str())]);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Map a non-success status to the store taxonomy.
fn status_error(status: StatusCode, body: &str) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized,
        StatusCode::BAD_REQUEST => StoreError::Rejected(server_message(body)),
        other => StoreError::Transient(format!("HTTP {}: {}", other.as_u16(), server_message(body))),
    }
}

fn server_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

async fn checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn transport_error(err: &reqwest::Error) -> StoreError {
    StoreError::Transient(err.to_string())
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn fetch_latest(&self) -> Result<Option<String>, StoreError> {
        let request = self.authorize(self.client.get(self.endpoint("saves/latest")));
        let response = request.send().await.map_err(|err| transport_error(&err))?;
        if response.status() == StatusCode::NOT_FOUND {
            log::debug!(target: LOG_TARGET, "no remote save for user {}", self.user_id);
            return Ok(None);
        }
        let response = checked(response).await?;
        let body = response
            .text()
            .await
            .map_err(|err| StoreError::Malformed(err.to_string()))?;
        Ok(Some(body))
    }

    async fn push(&self, state: &GameState) -> Result<SaveReceipt, StoreError> {
        let request = self.authorize(self.client.post(self.endpoint("saves")).json(state));
        let response = request.send().await.map_err(|err| transport_error(&err))?;
        let response = checked(response).await?;
        let receipt: SaveReceipt = response
            .json()
            .await
            .map_err(|err| StoreError::Malformed(err.to_string()))?;
        if !receipt.success {
            return Err(StoreError::Rejected("server reported success=false".into()));
        }
        log::debug!(target: LOG_TARGET, "save accepted at {}", receipt.timestamp);
        Ok(receipt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("login request failed: {0}")]
    Transport(String),
    #[error("login response could not be decoded: {0}")]
    Malformed(String),
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct Account {
    id: u64,
}

/// Exchange credentials for the numeric user id used by the save routes.
///
/// # Errors
///
/// Returns [`LoginError`] on rejected credentials, transport failure or an
/// unreadable response.
pub async fn login(
    base_url: &str,
    username: &str,
    password: &str,
    timeout: Duration,
) -> Result<String, LoginError> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| LoginError::Transport(err.to_string()))?;
    let url = format!("{}/users/login", base_url.trim_end_matches('/'));
    let response = client
        .post(url)
        .json(&Credentials { username, password })
        .send()
        .await
        .map_err(|err| LoginError::Transport(err.to_string()))?;
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(LoginError::InvalidCredentials),
        status if status.is_success() => {
            let account: Account = response
                .json()
                .await
                .map_err(|err| LoginError::Malformed(err.to_string()))?;
            Ok(account.id.to_string())
        }
        status => Err(LoginError::Transport(format!("HTTP {}", status.as_u16()))),
    }
}
