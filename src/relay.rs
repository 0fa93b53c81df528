//! Inference relay: forward a prompt to the text-generation endpoint.
//!
//! The request is the Ollama `/api/generate` shape with streaming off:
//!
//! ```json
//! {"model": "mario", "prompt": "...", "stream": false}
//! ```
//!
//! The endpoint's JSON answer is handed back as a [`serde_json::Value`]
//! without inspection, so the HTTP layer can return it to the caller as-is.
//! Fields such as `response`, `done` or `eval_count` are whatever the
//! endpoint chose to send.
//!
//! ## Retry Strategy
//!
//! A local model server answers 5xx (or refuses connections) while a model
//! is still loading. With `inference_max_retries > 0` those transient
//! failures are retried after `retry_backoff_ms * 2^(attempt-1)`; with the
//! 500 ms default and 2 retries the waits are 500 ms then 1 s. A single wait
//! never exceeds [`MAX_RETRY_BACKOFF_MS`]. Non-5xx statuses and malformed
//! bodies are never retried.

use crate::config::{ServiceConfig, MAX_INFERENCE_RETRIES, MAX_RETRY_BACKOFF_MS};
use crate::error::{PdfQaError, RelayError};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Longest slice of an error body kept in [`RelayError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Client for the generate endpoint.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    client: reqwest::Client,
    generate_url: String,
    model: String,
    timeout_secs: u64,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl InferenceClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, PdfQaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.inference_timeout_secs))
            .build()
            .map_err(|e| PdfQaError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            generate_url: config.generate_url.clone(),
            model: config.model.clone(),
            timeout_secs: config.inference_timeout_secs,
            max_retries: config.inference_max_retries.min(MAX_INFERENCE_RETRIES),
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generate_url(&self) -> &str {
        &self.generate_url
    }

    /// Send `prompt` and return the endpoint's JSON body unmodified.
    pub async fn generate(&self, prompt: &str) -> Result<serde_json::Value, RelayError> {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            if attempt > 0 {
                let backoff = backoff_delay_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Inference retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.send_once(prompt).await {
                Ok(body) => {
                    debug!(
                        "Inference answered in {:?} ({} prompt chars, {} retries)",
                        started.elapsed(),
                        prompt.chars().count(),
                        attempt
                    );
                    return Ok(body);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!("Inference attempt {} failed: {}", attempt + 1, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, prompt: &str) -> Result<serde_json::Value, RelayError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&self.generate_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (snippet, _) = crate::prompts::truncate_chars(text.trim(), MAX_ERROR_BODY_CHARS);
            return Err(RelayError::Status {
                status: status.as_u16(),
                body: snippet.to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| RelayError::InvalidBody(e.to_string()))
    }

    fn transport_error(&self, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            RelayError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            RelayError::Transport(e.to_string())
        }
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped.
fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    base_ms.saturating_mul(factor).min(MAX_RETRY_BACKOFF_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, retries: u32) -> InferenceClient {
        let config = ServiceConfig::builder()
            .generate_url(format!("{}/api/generate", server.uri()))
            .inference_timeout_secs(5)
            .inference_max_retries(retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap();
        InferenceClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn relays_body_verbatim() {
        let server = MockServer::start().await;
        let answer = json!({
            "model": "mario",
            "created_at": "2024-05-01T10:00:00Z",
            "response": "Suman worked at Acme Corp.",
            "done": true,
            "eval_count": 12
        });
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_json(json!({
                "model": "mario",
                "prompt": "Where did Suman work?",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let body = client_for(&server, 0)
            .generate("Where did Suman work?")
            .await
            .unwrap();
        assert_eq!(body, answer);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, 0).generate("hi").await.unwrap_err();
        match err {
            RelayError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "model not loaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let body = client_for(&server, 2).generate("hi").await.unwrap();
        assert_eq!(body["response"], "ok");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, 3).generate("hi").await.unwrap_err();
        assert!(matches!(err, RelayError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn non_json_body_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server, 0).generate("hi").await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidBody(_)));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": "late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = ServiceConfig::builder()
            .generate_url(format!("{}/api/generate", server.uri()))
            .inference_timeout_secs(1)
            .build()
            .unwrap();
        let err = InferenceClient::new(&config)
            .unwrap()
            .generate("hi")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout { secs: 1 }), "got: {err:?}");
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_delay_ms(500, 1), 500);
        assert_eq!(backoff_delay_ms(500, 2), 1000);
        assert_eq!(backoff_delay_ms(500, 3), 2000);
        assert_eq!(backoff_delay_ms(0, 70), 0);
        assert_eq!(backoff_delay_ms(1, 65), MAX_RETRY_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(u64::MAX, u32::MAX), MAX_RETRY_BACKOFF_MS);
    }

    #[tokio::test]
    async fn many_retries_against_closed_port_end_in_transport_error() {
        // Fields set directly, bypassing the builder's clamps.
        let config = ServiceConfig {
            generate_url: format!("http://127.0.0.1:{}/api/generate", closed_port()),
            inference_timeout_secs: 5,
            inference_max_retries: 70,
            retry_backoff_ms: 0,
            ..ServiceConfig::default()
        };
        let err = InferenceClient::new(&config)
            .unwrap()
            .generate("hi")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Transport(_)), "got: {err:?}");
    }

    /// Bind then drop a listener so the port is (almost certainly) closed.
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let config = ServiceConfig::builder()
            .generate_url(format!("http://127.0.0.1:{}/api/generate", closed_port()))
            .inference_timeout_secs(5)
            .build()
            .unwrap();
        let err = InferenceClient::new(&config)
            .unwrap()
            .generate("hi")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Transport(_)), "got: {err:?}");
        assert!(err.is_transient());
    }
}
