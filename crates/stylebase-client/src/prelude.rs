pub use crate::api::{
    ApiClient, ApiConfig, BalanceView, JobView, TokenSource, DEFAULT_MAX_POLL_ATTEMPTS,
    DEFAULT_POLL_INTERVAL,
};
pub use crate::backoff::RetryPolicy;
pub use crate::errors::ClientError;
pub use crate::ready::{ready_pair, ReadyGate, ReadySignal};
pub use crate::upload::{DecodeUpload, ALLOWED_CONTENT_TYPES, MAX_UPLOAD_BYTES};
