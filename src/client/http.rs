//! reqwest-backed implementation of [`DocumentApi`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::types::{FileResponse, ImagesResponse, NodesResponse};
use super::{ApiError, DocumentApi, ImageFormat};
use crate::config::TokenProvider;
use crate::models::Node;

/// Retry behavior for transient transport and server failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for the given zero-based attempt.
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt)
    }
}

/// HTTP client for the design-document API.
#[derive(Clone)]
pub struct DesignApiClient {
    client: Client,
    base_url: Url,
    tokens: TokenProvider,
    retry: RetryPolicy,
}

impl DesignApiClient {
    pub fn new(base_url: &str, tokens: TokenProvider) -> Result<Self, ApiError> {
        Self::with_retry_policy(base_url, tokens, RetryPolicy::default())
    }

    pub fn with_retry_policy(
        base_url: &str,
        tokens: TokenProvider,
        retry: RetryPolicy,
    ) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(ApiError::Unreachable)?;

        Ok(Self {
            client,
            base_url,
            tokens,
            retry,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// Issue a GET with auth, retrying transient failures with backoff.
    async fn get_with_retry(&self, url: Url) -> Result<Response, ApiError> {
        let token = self.tokens.get().ok_or(ApiError::AuthMissing)?;
        self.retry_request(&url, || {
            self.client.get(url.clone()).bearer_auth(&token).send()
        })
        .await
    }

    /// Drive a request closure through the retry policy.
    ///
    /// Timeouts, connection errors, and 5xx responses are retried up to
    /// the policy's attempt cap; everything else surfaces immediately.
    /// 401/403 also drops the cached token.
    async fn retry_request<F, Fut>(&self, url: &Url, mut send: F) -> Result<Response, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut attempt = 0;
        loop {
            match send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        // Stale tokens are re-sourced on the next run.
                        self.tokens.invalidate();
                        return Err(ApiError::AuthDenied {
                            status: status.as_u16(),
                        });
                    }
                    if status == StatusCode::PAYLOAD_TOO_LARGE {
                        return Err(ApiError::TooLarge);
                    }
                    if status.is_server_error() && attempt + 1 < self.retry.max_attempts {
                        let backoff = self.retry.backoff(attempt);
                        warn!(%url, %status, ?backoff, "server error, retrying");
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(ApiError::Http {
                        status: status.as_u16(),
                    });
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt + 1 < self.retry.max_attempts => {
                    let backoff = self.retry.backoff(attempt);
                    warn!(%url, error = %e, ?backoff, "transport error, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(ApiError::Unreachable(e)),
            }
        }
    }
}

#[async_trait]
impl DocumentApi for DesignApiClient {
    async fn get_file(&self, document_id: &str) -> Result<Node, ApiError> {
        let url = self.endpoint(&format!("files/{}", document_id))?;
        debug!(document_id, "fetching full document tree");

        let response = match self.get_with_retry(url).await {
            // The API answers an oversized full-document request with a
            // plain 400 as often as a 413.
            Err(ApiError::Http { status: 400 }) => return Err(ApiError::TooLarge),
            other => other?,
        };

        let parsed: FileResponse = response.json().await.map_err(ApiError::Decode)?;
        Ok(parsed.document)
    }

    async fn get_nodes(&self, document_id: &str, ids: &[String]) -> Result<Vec<Node>, ApiError> {
        let mut url = self.endpoint(&format!("files/{}/nodes", document_id))?;
        url.query_pairs_mut().append_pair("ids", &ids.join(","));
        debug!(document_id, count = ids.len(), "fetching selected nodes");

        let response = self.get_with_retry(url).await?;
        let mut parsed: NodesResponse = response.json().await.map_err(ApiError::Decode)?;

        // Preserve the caller's id order; unknown ids are just absent.
        Ok(ids
            .iter()
            .filter_map(|id| parsed.nodes.remove(id))
            .map(|entry| entry.document)
            .collect())
    }

    async fn get_images(
        &self,
        document_id: &str,
        ids: &[String],
        format: ImageFormat,
        scale: f64,
    ) -> Result<HashMap<String, Option<String>>, ApiError> {
        let mut url = self.endpoint(&format!("images/{}", document_id))?;
        url.query_pairs_mut()
            .append_pair("ids", &ids.join(","))
            .append_pair("format", format.as_str())
            .append_pair("scale", &scale.to_string());
        debug!(document_id, count = ids.len(), scale, "requesting export");

        let response = self.get_with_retry(url).await?;
        let parsed: ImagesResponse = response.json().await.map_err(ApiError::Decode)?;

        if let Some(err) = parsed.err {
            return Err(ApiError::Export(err));
        }

        // Requested ids missing from the response could not be rendered.
        let mut images = parsed.images;
        Ok(ids
            .iter()
            .map(|id| (id.clone(), images.remove(id).flatten()))
            .collect())
    }
}
