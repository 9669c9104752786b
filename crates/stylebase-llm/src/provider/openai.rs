use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode, Url,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::errors::LlmError;
use crate::model::{DecodeOptions, ImageSource};
use crate::prompt::DECODE_INSTRUCTIONS;
use crate::provider::{bounded, DecodeProvider};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
const CHAT_COMPLETIONS_PATH: &str = "chat/completions";
const MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: Url,
    pub max_concurrent_requests: usize,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|err| LlmError::unknown(&format!("openai base url parse failed: {err}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url,
            max_concurrent_requests: 8,
        })
    }

    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Result<Self, LlmError> {
        self.base_url = Url::parse(base_url.as_ref())
            .map_err(|err| LlmError::unknown(&format!("openai base url parse failed: {err}")))?;
        if !self.base_url.path().ends_with('/') {
            self.base_url
                .set_path(&format!("{}/", self.base_url.path().trim_end_matches('/')));
        }
        Ok(self)
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }
}

pub struct OpenAiProvider {
    client: Client,
    chat_url: Url,
    limiter: Arc<Semaphore>,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = format!("Bearer {}", config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|err| LlmError::unknown(&format!("invalid openai api key: {err}")))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| LlmError::unknown(&format!("openai client build failed: {err}")))?;

        let chat_url = config
            .base_url
            .join(CHAT_COMPLETIONS_PATH)
            .map_err(|err| LlmError::unknown(&format!("openai chat url join failed: {err}")))?;

        Ok(Self {
            client,
            chat_url,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_requests)),
        })
    }

    async fn execute(&self, payload: DecodeBody<'_>) -> Result<String, LlmError> {
        let _permit = self
            .limiter
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| LlmError::unknown(&format!("openai limiter closed: {err}")))?;

        let response = self
            .client
            .post(self.chat_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                LlmError::provider_unavailable(&format!("openai request error: {err}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".into());
            return Err(map_http_error(status, &body));
        }

        let payload = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|err| {
                LlmError::provider_unavailable(&format!("openai response decode: {err}"))
            })?;

        extract_text(payload)
    }
}

#[async_trait]
impl DecodeProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn decode(
        &self,
        model: &str,
        image: &ImageSource,
        opts: &DecodeOptions,
    ) -> Result<String, LlmError> {
        let body = build_body(model, image);
        bounded(self.execute(body), opts.timeout, opts, "openai decode").await
    }
}

#[derive(Serialize)]
struct DecodeBody<'a> {
    model: &'a str,
    messages: Vec<OutboundMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

fn build_body<'a>(model: &'a str, image: &ImageSource) -> DecodeBody<'a> {
    DecodeBody {
        model,
        messages: vec![OutboundMessage {
            role: "user",
            content: vec![
                ContentPart::Text {
                    text: DECODE_INSTRUCTIONS,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_url(),
                    },
                },
            ],
        }],
        max_tokens: MAX_OUTPUT_TOKENS,
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: InboundMessage,
}

#[derive(Deserialize)]
struct InboundMessage {
    #[serde(default)]
    content: Option<InboundContent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InboundContent {
    Text(String),
    Parts(Vec<InboundContentPart>),
}

#[derive(Deserialize)]
struct InboundContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn extract_text(response: ChatCompletionResponse) -> Result<String, LlmError> {
    let mut choices = response.choices;
    if choices.is_empty() {
        return Err(LlmError::empty_response("openai returned no choices"));
    }
    let choice = choices.remove(0);

    let text = match choice.message.content {
        Some(InboundContent::Text(text)) => text,
        Some(InboundContent::Parts(parts)) => parts
            .into_iter()
            .filter(|part| part.kind == "text")
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join(""),
        None => String::new(),
    };

    if text.trim().is_empty() {
        return Err(LlmError::empty_response("openai choice had no text content"));
    }
    Ok(text)
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    if status.is_client_error() {
        return LlmError::rejected(&format!("openai returned {}: {body}", status.as_u16()));
    }
    LlmError::provider_unavailable(&format!("openai returned {}: {body}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_image() -> ImageSource {
        ImageSource::Inline {
            base64: "aGVsbG8=".into(),
            mime: "image/png".into(),
        }
    }

    async fn provider_for(server: &MockServer) -> OpenAiProvider {
        let cfg = OpenAiConfig::new("test-key")
            .unwrap()
            .with_base_url(server.uri())
            .unwrap();
        OpenAiProvider::new(cfg).unwrap()
    }

    #[tokio::test]
    async fn decode_happy_path() {
        let server = MockServer::start().await;
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "{\"styleCodes\":[\"--sref 1\"]}"
                }
            }]
        });
        Mock::given(method("POST"))
            .and(path(format!("/{CHAT_COMPLETIONS_PATH}")))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let raw = provider
            .decode("gpt-4o-mini", &sample_image(), &DecodeOptions::default())
            .await
            .unwrap();
        assert!(raw.contains("--sref 1"));
    }

    #[tokio::test]
    async fn decode_times_out_against_slow_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/{CHAT_COMPLETIONS_PATH}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let opts = DecodeOptions {
            timeout: Duration::from_millis(100),
            ..DecodeOptions::default()
        };
        let err = provider
            .decode("gpt-4o-mini", &sample_image(), &opts)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PROVIDER.TIMEOUT");
    }

    #[tokio::test]
    async fn decode_aborts_on_cancel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/{CHAT_COMPLETIONS_PATH}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let (handle, token) = cancel_pair();
        let opts = DecodeOptions {
            timeout: Duration::from_secs(30),
            cancel: token,
        };

        let image = sample_image();
        let decode = provider.decode("gpt-4o-mini", &image, &opts);
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
            std::future::pending::<()>().await
        };

        let err = tokio::select! {
            result = decode => result.unwrap_err(),
            _ = cancel => unreachable!(),
        };
        assert_eq!(err.code(), "PROVIDER.TIMEOUT");
        assert!(err.obj().message_dev.as_deref().unwrap().contains("canceled"));
    }

    #[tokio::test]
    async fn upstream_4xx_maps_to_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/{CHAT_COMPLETIONS_PATH}")))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "bad image"})),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider
            .decode("gpt-4o-mini", &sample_image(), &DecodeOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PROVIDER.REJECTED");
    }

    #[tokio::test]
    async fn empty_choices_map_to_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/{CHAT_COMPLETIONS_PATH}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider
            .decode("gpt-4o-mini", &sample_image(), &DecodeOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PROVIDER.EMPTY");
    }
}
