pub use crate::codes::{self, ErrorCode};
pub use crate::model::{ErrorBuilder, ErrorObj, PublicErrorView, RetryClass};
