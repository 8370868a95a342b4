//! HTTP client wrapper with JSON helpers and retry logic.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::CloudAuth;
use crate::error::{CloudError, Result};

/// HTTP client for the compute service's JSON API.
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    request_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(request_timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CloudError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries,
            request_timeout,
        })
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<R: DeserializeOwned>(&self, url: &str, auth: &dyn CloudAuth) -> Result<R> {
        let req = self.signed(Method::GET, url, auth)?;
        let resp = self.execute_with_retry(req).await?;
        decode(url, resp).await
    }

    /// POST `body` as JSON to `url` and decode the JSON response.
    pub async fn post_json<B, R>(&self, url: &str, body: &B, auth: &dyn CloudAuth) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let req = self.signed(Method::POST, url, auth)?.json(body);
        let resp = self.execute_with_retry(req).await?;
        decode(url, resp).await
    }

    fn signed(&self, method: Method, url: &str, auth: &dyn CloudAuth) -> Result<RequestBuilder> {
        let auth_headers = auth.headers(method.as_str(), url)?;
        let mut req = self.client.request(method, url);
        for (key, value) in &auth_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        Ok(req)
    }

    /// Execute a request with exponential backoff retry.
    ///
    /// Connection failures, timeouts and 5xx/429 responses are retried; other
    /// statuses are returned to the caller as-is.
    async fn execute_with_retry(&self, request: RequestBuilder) -> Result<Response> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tracing::debug!(attempt, ?backoff, "retrying request");
                tokio::time::sleep(backoff).await;
            }

            let Some(cloned) = request.try_clone() else {
                return Ok(request.send().await?);
            };
            match cloned.send().await {
                Ok(resp) if is_transient(resp.status()) => {
                    last_err = Some(status_error(resp).await);
                }
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_err = Some(CloudError::Http(e));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err.unwrap_or_else(|| CloudError::Network("request failed".into())))
    }

    /// Getter for the timeout duration.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

async fn status_error(resp: Response) -> CloudError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    CloudError::Status {
        status: status.as_u16(),
        message: body.chars().take(500).collect(),
    }
}

async fn decode<R: DeserializeOwned>(url: &str, resp: Response) -> Result<R> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(CloudError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(status_error(resp).await);
    }
    let body = resp
        .text()
        .await
        .map_err(|e| CloudError::Network(format!("reading response body: {e}")))?;
    serde_json::from_str(&body)
        .map_err(|e| CloudError::InvalidResponse(format!("parsing response from {url}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient(StatusCode::BAD_GATEWAY));
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient(StatusCode::BAD_REQUEST));
        assert!(!is_transient(StatusCode::OK));
    }

    #[test]
    fn test_client_keeps_timeout() {
        let client = HttpClient::new(Duration::from_secs(7), 2).unwrap();
        assert_eq!(client.request_timeout(), Duration::from_secs(7));
    }
}
