use std::time::Duration;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::cancel::CancelToken;
use crate::errors::LlmError;

pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(60);

/// Supported decode models, resolved once at the API boundary. Internal
/// dispatch matches on the variant, so adding a provider is a compile
/// error everywhere it matters rather than a missed string prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelId {
    OpenAi(String),
    Gemini(String),
}

impl ModelId {
    pub fn parse(raw: &str) -> Result<Self, LlmError> {
        let trimmed = raw.trim();
        if let Some((provider, model)) = trimmed.split_once(':') {
            if model.is_empty() {
                return Err(LlmError::schema(&format!("model name missing in '{raw}'")));
            }
            return match provider {
                "openai" => Ok(ModelId::OpenAi(model.to_string())),
                "gemini" => Ok(ModelId::Gemini(model.to_string())),
                other => Err(LlmError::schema(&format!("unknown provider '{other}'"))),
            };
        }
        // Bare well-known model names from older clients.
        if trimmed.starts_with("gpt-") {
            return Ok(ModelId::OpenAi(trimmed.to_string()));
        }
        if trimmed.starts_with("gemini-") {
            return Ok(ModelId::Gemini(trimmed.to_string()));
        }
        Err(LlmError::schema(&format!("unsupported model '{raw}'")))
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            ModelId::OpenAi(_) => "openai",
            ModelId::Gemini(_) => "gemini",
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            ModelId::OpenAi(name) | ModelId::Gemini(name) => name,
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider_name(), self.model_name())
    }
}

impl Serialize for ModelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ModelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ModelId::parse(&raw).map_err(|err| de::Error::custom(err.into_inner()))
    }
}

/// The image being decoded, either carried inline or referenced by URL.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageSource {
    Inline { base64: String, mime: String },
    Url { url: String },
}

impl ImageSource {
    pub fn data_url(&self) -> String {
        match self {
            ImageSource::Inline { base64, mime } => format!("data:{mime};base64,{base64}"),
            ImageSource::Url { url } => url.clone(),
        }
    }
}

/// Per-call bounds handed to a provider: a hard deadline and a
/// cooperative cancel signal. Providers must abort the outbound call on
/// either, not merely ignore its result.
#[derive(Clone, Debug)]
pub struct DecodeOptions {
    pub timeout: Duration,
    pub cancel: CancelToken,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DECODE_TIMEOUT,
            cancel: CancelToken::never(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_and_bare_model_names() {
        assert_eq!(
            ModelId::parse("openai:gpt-4o").unwrap(),
            ModelId::OpenAi("gpt-4o".into())
        );
        assert_eq!(
            ModelId::parse("gemini:gemini-1.5-flash").unwrap(),
            ModelId::Gemini("gemini-1.5-flash".into())
        );
        assert_eq!(
            ModelId::parse("gpt-4o-mini").unwrap(),
            ModelId::OpenAi("gpt-4o-mini".into())
        );
        assert_eq!(
            ModelId::parse("gemini-2.0-flash").unwrap(),
            ModelId::Gemini("gemini-2.0-flash".into())
        );
    }

    #[test]
    fn rejects_unknown_providers() {
        assert!(ModelId::parse("claude:opus").is_err());
        assert!(ModelId::parse("openai:").is_err());
        assert!(ModelId::parse("mystery-model").is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let model = ModelId::Gemini("gemini-1.5-pro".into());
        assert_eq!(ModelId::parse(&model.to_string()).unwrap(), model);
    }

    #[test]
    fn inline_image_renders_data_url() {
        let image = ImageSource::Inline {
            base64: "aGVsbG8=".into(),
            mime: "image/png".into(),
        };
        assert_eq!(image.data_url(), "data:image/png;base64,aGVsbG8=");
    }
}
