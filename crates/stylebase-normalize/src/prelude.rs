pub use crate::errors::NormalizeError;
pub use crate::extract::extract_json;
pub use crate::schema::{coerce, DecodeResult, PromptBundle};
pub use crate::{Normalizer, EMPTY_RESULTS_TOTAL};
