pub mod gemini;
pub mod openai;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::LlmError;
use crate::model::{DecodeOptions, ImageSource, ModelId};

/// One vision-capable provider. `decode` sends a single multimodal
/// request (instruction prompt + image) and returns the raw textual
/// output; validation happens downstream.
#[async_trait]
pub trait DecodeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn decode(
        &self,
        model: &str,
        image: &ImageSource,
        opts: &DecodeOptions,
    ) -> Result<String, LlmError>;
}

/// Installed providers, dispatched by `ModelId` variant. The match is
/// exhaustive; an uninstalled provider for a parsed model is a distinct
/// unavailability error, not a silent fallthrough.
#[derive(Clone, Default)]
pub struct Registry {
    openai: Option<Arc<dyn DecodeProvider>>,
    gemini: Option<Arc<dyn DecodeProvider>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install_openai(&mut self, provider: Arc<dyn DecodeProvider>) {
        self.openai = Some(provider);
    }

    pub fn install_gemini(&mut self, provider: Arc<dyn DecodeProvider>) {
        self.gemini = Some(provider);
    }

    pub fn provider(&self, model: &ModelId) -> Result<Arc<dyn DecodeProvider>, LlmError> {
        let slot = match model {
            ModelId::OpenAi(_) => &self.openai,
            ModelId::Gemini(_) => &self.gemini,
        };
        slot.clone().ok_or_else(|| {
            LlmError::provider_unavailable(&format!(
                "provider {} not installed",
                model.provider_name()
            ))
        })
    }

    pub async fn decode(
        &self,
        model: &ModelId,
        image: &ImageSource,
        opts: &DecodeOptions,
    ) -> Result<String, LlmError> {
        let provider = self.provider(model)?;
        provider.decode(model.model_name(), image, opts).await
    }
}

/// Races the provider future against the deadline and the cancel signal.
/// Losing the race drops the future, which aborts the in-flight reqwest
/// call rather than letting it run to completion unobserved.
pub(crate) async fn bounded<T, F>(
    fut: F,
    timeout: Duration,
    opts: &DecodeOptions,
    what: &str,
) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    tokio::select! {
        result = fut => result,
        _ = tokio::time::sleep(timeout) => {
            Err(LlmError::timeout(&format!("{what} exceeded {}ms", timeout.as_millis())))
        }
        _ = opts.cancel.cancelled() => {
            Err(LlmError::timeout(&format!("{what} canceled by caller")))
        }
    }
}
