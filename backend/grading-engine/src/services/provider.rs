use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ProviderSettings;
use crate::metrics::{PROVIDER_REQUESTS_TOTAL, PROVIDER_REQUEST_DURATION_SECONDS};
use crate::utils::retry::{retry_async_when, RetryConfig};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("text-generation provider is not configured")]
    NotConfigured,
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error("provider response too short ({0} chars)")]
    TooShort(usize),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured => "not_configured",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Http(_) => "http_error",
            ProviderError::Status { .. } => "bad_status",
            ProviderError::EmptyResponse => "empty",
            ProviderError::TooShort(_) => "too_short",
            ProviderError::Malformed(_) => "malformed",
        }
    }

    /// Transport failures and server-side statuses are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http(e) => e.is_connect() || e.is_timeout(),
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// External text generation: `(system_prompt, user_prompt, max_tokens) -> text`.
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ProviderError>;
}

/// Runs one provider call under `timeout` and rejects missing, empty or too-short
/// text. This is the only place the engine waits on the network.
pub async fn call_provider(
    provider: Option<&dyn TextProvider>,
    system_prompt: &str,
    user_prompt: &str,
    max_tokens: u32,
    timeout: Duration,
    min_chars: usize,
) -> Result<String, ProviderError> {
    let provider = provider.ok_or(ProviderError::NotConfigured)?;

    let start = Instant::now();
    let outcome = match tokio::time::timeout(
        timeout,
        provider.generate(system_prompt, user_prompt, max_tokens),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout)),
    };
    PROVIDER_REQUEST_DURATION_SECONDS
        .with_label_values(&[provider.name()])
        .observe(start.elapsed().as_secs_f64());

    let outcome = outcome.and_then(|text| {
        let text = text.trim().to_string();
        let chars = text.chars().count();
        if chars == 0 {
            Err(ProviderError::EmptyResponse)
        } else if chars < min_chars {
            Err(ProviderError::TooShort(chars))
        } else {
            Ok(text)
        }
    });

    let status = match &outcome {
        Ok(_) => "success",
        Err(e) => e.label(),
    };
    PROVIDER_REQUESTS_TOTAL
        .with_label_values(&[provider.name(), status])
        .inc();

    outcome
}

/// YandexGPT foundation-model completion client.
pub struct YandexGptProvider {
    client: Client,
    settings: ProviderSettings,
}

impl YandexGptProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        if !settings.is_usable() {
            return Err(ProviderError::NotConfigured);
        }
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self { client, settings })
    }

    fn model_uri(&self) -> String {
        format!("gpt://{}/{}/latest", self.settings.folder_id, self.settings.model)
    }

    pub(crate) fn request_body(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Value {
        json!({
            "modelUri": self.model_uri(),
            "completionOptions": {
                "stream": false,
                "temperature": self.settings.temperature,
                "maxTokens": max_tokens.min(self.settings.max_tokens).to_string(),
            },
            "messages": [
                { "role": "system", "text": system_prompt },
                { "role": "user", "text": user_prompt },
            ],
        })
    }

    async fn send_once(&self, body: &Value) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .header("Authorization", format!("Api-Key {}", self.settings.api_key))
            .header("x-folder-id", &self.settings.folder_id)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        extract_completion_text(&payload)
    }
}

/// Pulls the first alternative's text out of a completion response.
pub(crate) fn extract_completion_text(payload: &Value) -> Result<String, ProviderError> {
    payload
        .get("result")
        .and_then(|r| r.get("alternatives"))
        .and_then(|a| a.get(0))
        .and_then(|alt| alt.get("message"))
        .and_then(|m| m.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Malformed("missing result.alternatives[0].message.text".into()))
}

#[async_trait]
impl TextProvider for YandexGptProvider {
    fn name(&self) -> &str {
        "yandexgpt"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let body = self.request_body(system_prompt, user_prompt, max_tokens);
        let retry_cfg = RetryConfig::for_provider(self.settings.retry_attempts);

        retry_async_when(retry_cfg, ProviderError::is_transient, || async {
            self.send_once(&body).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        reply: Option<&'static str>,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _: &str, _: &str, _: u32) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply
                .map(str::to_string)
                .ok_or(ProviderError::EmptyResponse)
        }
    }

    fn scripted(reply: Option<&'static str>, delay_ms: u64) -> Scripted {
        Scripted {
            reply,
            delay: Duration::from_millis(delay_ms),
            calls: AtomicUsize::new(0),
        }
    }

    fn settings() -> ProviderSettings {
        ProviderSettings {
            enabled: true,
            api_key: "key".into(),
            folder_id: "b1gfolder".into(),
            ..ProviderSettings::default()
        }
    }

    #[tokio::test]
    async fn missing_provider_is_not_configured() {
        let err = call_provider(None, "s", "u", 100, Duration::from_secs(1), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider = scripted(Some("a long enough answer"), 200);
        let err = call_provider(Some(&provider), "s", "u", 100, Duration::from_millis(10), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn short_and_empty_text_are_rejected() {
        let short = scripted(Some(" ok "), 0);
        let err = call_provider(Some(&short), "s", "u", 100, Duration::from_secs(1), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::TooShort(2)));

        let blank = scripted(Some("   "), 0);
        let err = call_provider(Some(&blank), "s", "u", 100, Duration::from_secs(1), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[tokio::test]
    async fn valid_text_is_trimmed() {
        let provider = scripted(Some("  잘 했어요! 다음 문제도 화이팅  "), 0);
        let text = call_provider(Some(&provider), "s", "u", 100, Duration::from_secs(1), 10)
            .await
            .unwrap();
        assert_eq!(text, "잘 했어요! 다음 문제도 화이팅");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unusable_settings_do_not_build_a_client() {
        assert!(matches!(
            YandexGptProvider::new(ProviderSettings::default()),
            Err(ProviderError::NotConfigured)
        ));
    }

    #[test]
    fn request_body_caps_tokens_and_sets_model_uri() {
        let provider = YandexGptProvider::new(settings()).unwrap();
        let body = provider.request_body("system", "user", 10_000);
        assert_eq!(body["modelUri"], "gpt://b1gfolder/yandexgpt/latest");
        assert_eq!(body["completionOptions"]["maxTokens"], "500");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["text"], "user");
    }

    #[test]
    fn extracts_first_alternative() {
        let payload = json!({
            "result": {
                "alternatives": [
                    { "message": { "role": "assistant", "text": "피드백" }, "status": "ALTERNATIVE_STATUS_FINAL" }
                ]
            }
        });
        assert_eq!(extract_completion_text(&payload).unwrap(), "피드백");
        assert!(matches!(
            extract_completion_text(&json!({ "result": {} })),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn transient_errors_are_server_side() {
        let server = ProviderError::Status {
            status: 503,
            body: String::new(),
        };
        let client = ProviderError::Status {
            status: 400,
            body: String::new(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!ProviderError::EmptyResponse.is_transient());
    }
}
