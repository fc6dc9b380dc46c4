//! REST client for the quiz attempt endpoints.
//!
//! - `GET  {base}/attempts/{id}`        -> [`AttemptDetails`]
//! - `POST {base}/attempts/{id}/submit` <- [`SubmitPayload`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use url::Url;

use super::{AttemptDetails, AttemptService, SubmitPayload};
use crate::error::AttemptServiceError;
use crate::storage::ApiConfig;

const USER_AGENT: &str = "quiztimer";

pub struct HttpAttemptService {
    base_url: String,
    token: Option<String>,
    http_client: Client,
}

impl HttpAttemptService {
    /// Build a client for `config.base_url`.
    ///
    /// # Errors
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ApiConfig, token: Option<String>) -> Result<Self, AttemptServiceError> {
        Url::parse(&config.base_url)?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            http_client,
        })
    }

    fn attempt_url(&self, attempt_id: &str, suffix: &str) -> Result<Url, AttemptServiceError> {
        let url = format!(
            "{}/attempts/{}{}",
            self.base_url,
            urlencoding::encode(attempt_id),
            suffix
        );
        Ok(Url::parse(&url)?)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn ensure_success(resp: Response) -> Result<Response, AttemptServiceError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AttemptServiceError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AttemptService for HttpAttemptService {
    async fn get_attempt(&self, attempt_id: &str) -> Result<AttemptDetails, AttemptServiceError> {
        let url = self.attempt_url(attempt_id, "")?;
        let resp = self.authorize(self.http_client.get(url)).send().await?;
        let resp = Self::ensure_success(resp).await?;
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| AttemptServiceError::Decode(e.to_string()))
    }

    async fn submit_attempt(
        &self,
        attempt_id: &str,
        payload: &SubmitPayload,
    ) -> Result<(), AttemptServiceError> {
        let url = self.attempt_url(attempt_id, "/submit")?;
        let resp = self
            .authorize(self.http_client.post(url))
            .json(payload)
            .send()
            .await?;
        Self::ensure_success(resp).await?;
        Ok(())
    }
}
