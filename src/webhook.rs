use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

/// A single form parameter as sent in a webhook POST (spec §4.2).
pub type Form = Vec<(String, String)>;

#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error, Clone)]
pub enum WebhookError {
    #[error("network error calling {url}: {message}")]
    Network { url: String, message: String },
    #[error("{url} returned non-2xx status {status}")]
    NonSuccess { url: String, status: u16 },
    #[error("{url} returned an unparseable response body")]
    UnparseableBody { url: String },
    #[error("no response recorded for {url} in mock transport")]
    NoMockResponse { url: String },
}

impl WebhookError {
    pub fn url(&self) -> &str {
        match self {
            WebhookError::Network { url, .. } => url,
            WebhookError::NonSuccess { url, .. } => url,
            WebhookError::UnparseableBody { url } => url,
            WebhookError::NoMockResponse { url } => url,
        }
    }
}

/// Pluggable webhook transport (spec §4.2). The engine only depends on this
/// trait — an `HttpWebhookTransport` backs production/local-dev use, while
/// tests inject a `MockWebhookTransport` for deterministic, networkless
/// scenarios.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, url: &str, form: &Form) -> Result<WebhookResponse, WebhookError>;
}

/// Default transport: a real HTTP POST via `reqwest`, form-encoded unless
/// `method` is GET in which case the form is appended as a query string
/// (spec §6 "Webhook wire format").
pub struct HttpWebhookTransport {
    client: reqwest::Client,
    timeout: Duration,
    user_agent: String,
}

impl HttpWebhookTransport {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            user_agent: user_agent.into(),
        }
    }
}

impl Default for HttpWebhookTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), "twimulator/0.1")
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn post(&self, url: &str, form: &Form) -> Result<WebhookResponse, WebhookError> {
        let resp = self
            .client
            .post(url)
            .header("User-Agent", &self.user_agent)
            .timeout(self.timeout)
            .form(form)
            .send()
            .await
            .map_err(|e| WebhookError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp.text().await.map_err(|_| WebhookError::UnparseableBody {
            url: url.to_string(),
        })?;

        if !(200..300).contains(&status) {
            return Err(WebhookError::NonSuccess {
                url: url.to_string(),
                status,
            });
        }

        Ok(WebhookResponse { status, body, headers })
    }
}

/// A dispatched call as observed by `MockWebhookTransport`, for test
/// assertions (spec §6 "Test-facing surface").
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub url: String,
    pub form: Form,
}

/// Deterministic, networkless transport for tests. Programmed responses are
/// queued per URL; `post` pops the front of the queue for that URL, or
/// returns a default 200 empty `<Response/>` if none was queued, so tests
/// that don't care about the webhook body don't have to program one.
#[derive(Default)]
pub struct MockWebhookTransport {
    calls: Mutex<Vec<RecordedCall>>,
    queued: Mutex<HashMap<String, std::collections::VecDeque<MockOutcome>>>,
}

#[derive(Debug, Clone)]
enum MockOutcome {
    Response(WebhookResponse),
    Error(WebhookError),
}

impl MockWebhookTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response for the next `post` to `url`.
    pub fn queue_response(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
        self.queued
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .push_back(MockOutcome::Response(WebhookResponse {
                status,
                body: body.into(),
                headers: HashMap::new(),
            }));
    }

    /// Queues a transport-level failure for the next `post` to `url`.
    pub fn queue_error(&self, url: impl Into<String>, error: WebhookError) {
        self.queued
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .push_back(MockOutcome::Error(error));
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url == url)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WebhookTransport for MockWebhookTransport {
    async fn post(&self, url: &str, form: &Form) -> Result<WebhookResponse, WebhookError> {
        self.calls.lock().unwrap().push(RecordedCall {
            at: Instant::now(),
            url: url.to_string(),
            form: form.clone(),
        });

        let outcome = self
            .queued
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|q| q.pop_front());

        match outcome {
            Some(MockOutcome::Response(r)) => Ok(r),
            Some(MockOutcome::Error(e)) => Err(e),
            None => Ok(WebhookResponse {
                status: 200,
                body: "<Response/>".to_string(),
                headers: HashMap::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_transport_records_every_call() {
        let mock = MockWebhookTransport::new();
        mock.post("http://app/voice", &vec![("CallSid".to_string(), "CA1".to_string())])
            .await
            .unwrap();
        let calls = mock.calls_to("http://app/voice");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].form[0], ("CallSid".to_string(), "CA1".to_string()));
    }

    #[tokio::test]
    async fn queued_response_is_returned_once() {
        let mock = MockWebhookTransport::new();
        mock.queue_response("http://app/voice", 200, "<Response><Hangup/></Response>");
        let first = mock.post("http://app/voice", &vec![]).await.unwrap();
        assert_eq!(first.body, "<Response><Hangup/></Response>");
        let second = mock.post("http://app/voice", &vec![]).await.unwrap();
        assert_eq!(second.body, "<Response/>");
    }

    #[tokio::test]
    async fn queued_error_is_returned() {
        let mock = MockWebhookTransport::new();
        mock.queue_error(
            "http://app/voice",
            WebhookError::NonSuccess {
                url: "http://app/voice".to_string(),
                status: 500,
            },
        );
        let err = mock.post("http://app/voice", &vec![]).await.unwrap_err();
        assert!(matches!(err, WebhookError::NonSuccess { status: 500, .. }));
    }
}
