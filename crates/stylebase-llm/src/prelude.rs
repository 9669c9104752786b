pub use crate::cancel::{cancel_pair, CancelHandle, CancelToken};
pub use crate::errors::LlmError;
pub use crate::model::{DecodeOptions, ImageSource, ModelId, DEFAULT_DECODE_TIMEOUT};
pub use crate::prompt::DECODE_INSTRUCTIONS;
pub use crate::provider::gemini::{GeminiConfig, GeminiProvider};
pub use crate::provider::openai::{OpenAiConfig, OpenAiProvider};
pub use crate::provider::{DecodeProvider, Registry};
