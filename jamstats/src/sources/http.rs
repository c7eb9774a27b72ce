use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::{retry_delay, SourceApiConfig};
use crate::error::{JamError, Result};
use crate::models::SourceId;

/// GET-with-retry shared by the source clients. Retries connect errors,
/// timeouts, 5xx and 429 up to `max_retries` times. Each attempt gets its own
/// timeout so that a slow first attempt can still be retried within the
/// aggregator's per-call budget.
#[derive(Clone)]
pub(super) struct SourceHttp {
    client: Client,
    source: SourceId,
    base_url: String,
    max_retries: u32,
}

impl SourceHttp {
    pub fn new(source: SourceId, config: &SourceApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.attempt_timeout())
            .user_agent(concat!("jamstats/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| JamError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            source,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    fn error(&self, message: impl Into<String>) -> JamError {
        JamError::Source {
            source_id: self.source,
            message: message.into(),
        }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::debug!(source = %self.source, %url, attempt, "Retrying source request");
                tokio::time::sleep(retry_delay(attempt)).await;
            }

            let response = self.client.get(&url).query(query).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        return resp.json::<T>().await.map_err(|e| {
                            self.error(format!("Failed to parse response from {path}: {e}"))
                        });
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse().ok());
                        last_error = Some(JamError::SourceRateLimit {
                            source_id: self.source,
                            retry_after,
                        });
                        continue;
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Err(JamError::NotFound(format!("{} {path}", self.source)));
                    }

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(JamError::ApiAuth(format!("{}: {body}", self.source)));
                    }

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_error = Some(self.error(format!("Server error {status}: {body}")));
                        continue;
                    }

                    let body = resp.text().await.unwrap_or_default();
                    return Err(self.error(format!("API error {status}: {body}")));
                }
                Err(e) => {
                    let message = if e.is_timeout() {
                        format!("Request timed out: {e}")
                    } else {
                        format!("Request failed: {e}")
                    };
                    last_error = Some(self.error(message));
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| self.error("Unknown error")))
    }
}
