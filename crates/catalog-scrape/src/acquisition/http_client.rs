//! Async HTTP client wrapping reqwest.
//!
//! Plain requests only, no rendering. Applies per-call timeouts and, when
//! configured, retries transient failures (5xx, 429, transport errors) with
//! backoff.

use crate::error::{FetchError, FetchResult};
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Fail with `FetchError::Status` unless the status is 200.
    pub fn require_ok(self) -> FetchResult<Self> {
        if self.status == 200 {
            Ok(self)
        } else {
            Err(FetchError::Status {
                status: self.status,
                url: self.final_url,
            })
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client shared by every acquisition step.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpClient {
    /// Create a client with a desktop Chrome user-agent.
    pub fn new(max_retries: u32) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            max_retries,
        }
    }

    /// GET `url` with query parameters. Any status is returned as-is.
    pub async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout_ms: u64,
    ) -> FetchResult<HttpResponse> {
        let mut retries = 0u32;

        loop {
            let resp = self
                .client
                .get(url)
                .query(query)
                .timeout(Duration::from_millis(timeout_ms))
                .send()
                .await;

            match resp {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if status >= 500 && retries < self.max_retries {
                        retries += 1;
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }

                    if status == 429 && retries < self.max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    let final_url = r.url().to_string();
                    let body = r.bytes().await?.to_vec();

                    return Ok(HttpResponse {
                        final_url,
                        status,
                        body,
                    });
                }
                Err(e) => {
                    if retries < self.max_retries {
                        retries += 1;
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }
                    if e.is_timeout() {
                        return Err(FetchError::Timeout(timeout_ms));
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// GET and parse a JSON body. Non-200 statuses are errors.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout_ms: u64,
    ) -> FetchResult<Value> {
        let resp = self.get(url, query, timeout_ms).await?.require_ok()?;
        serde_json::from_slice(&resp.body).map_err(|source| FetchError::Json {
            url: resp.final_url,
            source,
        })
    }

    /// GET a text body. Non-200 statuses are errors.
    pub async fn get_text(&self, url: &str, timeout_ms: u64) -> FetchResult<String> {
        let resp = self.get(url, &[], timeout_ms).await?.require_ok()?;
        Ok(resp.text())
    }

    /// GET a binary body. Non-200 statuses are errors.
    pub async fn get_bytes(&self, url: &str, timeout_ms: u64) -> FetchResult<Vec<u8>> {
        let resp = self.get(url, &[], timeout_ms).await?.require_ok()?;
        Ok(resp.body)
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.saturating_sub(1)))
}
