//! Outbound HTTP with bounded timeouts and exponential-backoff retries.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{error, warn};

use gateway_types::ProviderError;

use crate::config::HttpSettings;

/// Thin wrapper over `reqwest::Client` that turns every outcome into either a
/// parsed JSON body or a [`ProviderError`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    provider: &'static str,
    settings: HttpSettings,
}

impl ApiClient {
    pub fn new(provider: &'static str, settings: HttpSettings) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Configuration(format!("{}: {}", provider, e)))?;
        Ok(Self {
            client,
            provider,
            settings,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.settings.backoff_base_ms.saturating_mul(2_u64.pow(attempt)))
    }

    /// Sends the request, retrying on 429, 5xx, and network errors.
    ///
    /// A 2xx response must carry a JSON body. Any other 4xx is an explicit
    /// rejection; exhausted retries leave the outcome unknown.
    pub async fn send(&self, request: RequestBuilder) -> Result<serde_json::Value, ProviderError> {
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            let Some(req) = request.try_clone() else {
                return Err(ProviderError::Configuration(format!(
                    "{}: request body cannot be retried",
                    self.provider
                )));
            };

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.map_err(|e| classify(self.provider, e))?;

                    if status.is_success() {
                        return serde_json::from_str(&text).map_err(|e| {
                            error!(provider = self.provider, "Unparseable response: {}", e);
                            ProviderError::MalformedResponse(format!("{}: {}", self.provider, e))
                        });
                    }

                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if retryable && attempt < self.settings.max_retries {
                        let backoff = self.backoff(attempt);
                        warn!(
                            provider = self.provider,
                            %status,
                            "Retrying after {:?} (attempt {})",
                            backoff,
                            attempt + 1
                        );
                        tokio::time::sleep(backoff).await;
                        last_error = Some(ProviderError::Transport(format!(
                            "{}: HTTP {}",
                            self.provider, status
                        )));
                        continue;
                    }

                    let message = error_message(&text);
                    if retryable {
                        return Err(ProviderError::Transport(format!(
                            "{}: HTTP {} after {} retries: {}",
                            self.provider, status, self.settings.max_retries, message
                        )));
                    }
                    error!(provider = self.provider, %status, "Provider rejected request: {}", message);
                    return Err(ProviderError::Rejected(format!(
                        "{}: HTTP {}: {}",
                        self.provider, status, message
                    )));
                }
                Err(e) => {
                    let err = classify(self.provider, e);
                    if attempt < self.settings.max_retries {
                        let backoff = self.backoff(attempt);
                        warn!(
                            provider = self.provider,
                            "Request error, retrying after {:?} (attempt {}): {}",
                            backoff,
                            attempt + 1,
                            err
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::Transport(format!("{}: request failed", self.provider))
        }))
    }
}

fn classify(provider: &str, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(format!("{}: {}", provider, e))
    } else if e.is_decode() {
        ProviderError::MalformedResponse(format!("{}: {}", provider, e))
    } else {
        ProviderError::Transport(format!("{}: {}", provider, e))
    }
}

/// Best-effort human message from an error body.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.get("message")
            .or_else(|| v.pointer("/error/message"))
            .or_else(|| v.get("errorMessage"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });
    from_json.unwrap_or_else(|| body.chars().take(200).collect())
}

/// Required string field of a provider payload.
pub fn str_field<'a>(value: &'a serde_json::Value, pointer: &str) -> Result<&'a str, ProviderError> {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderError::MalformedResponse(format!("missing field {}", pointer)))
}

/// Required field that providers send as either a string or a number.
pub fn id_field(value: &serde_json::Value, pointer: &str) -> Result<String, ProviderError> {
    match value.pointer(pointer) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ProviderError::MalformedResponse(format!(
            "missing field {}",
            pointer
        ))),
    }
}
