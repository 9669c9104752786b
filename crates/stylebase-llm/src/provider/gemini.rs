use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client, StatusCode, Url,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::errors::LlmError;
use crate::model::{DecodeOptions, ImageSource};
use crate::prompt::DECODE_INSTRUCTIONS;
use crate::provider::{bounded, DecodeProvider};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
const DEFAULT_VERSION: &str = "v1beta";

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: Url,
    pub api_version: String,
    pub max_concurrent_requests: usize,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|err| LlmError::unknown(&format!("gemini base url parse failed: {err}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url,
            api_version: DEFAULT_VERSION.to_string(),
            max_concurrent_requests: 8,
        })
    }

    pub fn with_base_url(mut self, base: impl AsRef<str>) -> Result<Self, LlmError> {
        self.base_url = Url::parse(base.as_ref())
            .map_err(|err| LlmError::unknown(&format!("gemini base url parse failed: {err}")))?;
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

pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
    limiter: Arc<Semaphore>,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| LlmError::unknown(&format!("gemini client build failed: {err}")))?;

        let max_concurrency = config.max_concurrent_requests;
        Ok(Self {
            client,
            config,
            limiter: Arc::new(Semaphore::new(max_concurrency)),
        })
    }

    fn endpoint(&self, model: &str) -> Result<Url, LlmError> {
        let version = self.config.api_version.trim_end_matches('/');
        let joined = format!("{version}/models/{model}:generateContent");
        let mut url = self
            .config
            .base_url
            .join(&joined)
            .map_err(|err| LlmError::unknown(&format!("gemini endpoint build failed: {err}")))?;
        url.query_pairs_mut()
            .append_pair("key", &self.config.api_key);
        Ok(url)
    }

    async fn execute(&self, url: Url, body: GenerateContentRequest) -> Result<String, LlmError> {
        let _permit = self
            .limiter
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| LlmError::unknown(&format!("gemini limiter closed: {err}")))?;

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                LlmError::provider_unavailable(&format!("gemini request error: {err}"))
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
            .json::<GenerateContentResponse>()
            .await
            .map_err(|err| {
                LlmError::provider_unavailable(&format!("gemini response decode: {err}"))
            })?;

        extract_text(payload)
    }
}

#[async_trait]
impl DecodeProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn decode(
        &self,
        model: &str,
        image: &ImageSource,
        opts: &DecodeOptions,
    ) -> Result<String, LlmError> {
        let url = self.endpoint(model)?;
        let body = build_body(image);
        bounded(self.execute(url, body), opts.timeout, opts, "gemini decode").await
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<GenerateContent>,
}

#[derive(Serialize)]
struct GenerateContent {
    role: &'static str,
    parts: Vec<ContentPart>,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct ContentPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    file_uri: String,
}

fn build_body(image: &ImageSource) -> GenerateContentRequest {
    let image_part = match image {
        ImageSource::Inline { base64, mime } => ContentPart {
            inline_data: Some(InlineData {
                mime_type: mime.clone(),
                data: base64.clone(),
            }),
            ..ContentPart::default()
        },
        ImageSource::Url { url } => ContentPart {
            file_data: Some(FileData {
                file_uri: url.clone(),
            }),
            ..ContentPart::default()
        },
    };

    GenerateContentRequest {
        contents: vec![GenerateContent {
            role: "user",
            parts: vec![
                ContentPart {
                    text: Some(DECODE_INSTRUCTIONS.to_string()),
                    ..ContentPart::default()
                },
                image_part,
            ],
        }],
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GenerateCandidate>,
}

#[derive(Deserialize)]
struct GenerateCandidate {
    content: Option<GenerateContentBlock>,
}

#[derive(Deserialize)]
struct GenerateContentBlock {
    #[serde(default)]
    parts: Vec<GeneratePart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GeneratePart {
    text: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    let mut candidates = response.candidates;
    let candidate = candidates
        .pop()
        .ok_or_else(|| LlmError::empty_response("gemini returned no candidates"))?;

    let content = candidate
        .content
        .ok_or_else(|| LlmError::empty_response("gemini candidate missing content"))?;

    let text: String = content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        return Err(LlmError::empty_response("gemini candidate had no text parts"));
    }
    Ok(text)
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    if status.is_client_error() {
        return LlmError::rejected(&format!("gemini returned {}: {body}", status.as_u16()));
    }
    LlmError::provider_unavailable(&format!("gemini returned {}: {body}", status.as_u16()))
}
