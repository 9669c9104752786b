use serde::{Deserialize, Serialize};

use crate::codes::ErrorCode;

/// Whether a failed operation is worth repeating as-is. Attached to
/// every error code so retry decisions live in one place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryClass {
    None,
    Transient,
    Permanent,
}

/// The shared error payload every crate-level error newtype wraps.
/// `message_user` is safe to show to an end user; `message_dev` carries
/// diagnostics and never crosses the HTTP boundary.
#[derive(Clone, Debug)]
pub struct ErrorObj {
    pub code: &'static str,
    pub http_status: u16,
    pub retry: RetryClass,
    pub message_user: String,
    pub message_dev: Option<String>,
}

impl ErrorObj {
    pub fn to_public(&self) -> PublicErrorView {
        PublicErrorView {
            code: self.code,
            message: self.message_user.clone(),
        }
    }
}

impl std::fmt::Display for ErrorObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message_user)?;
        if let Some(dev) = &self.message_dev {
            write!(f, " ({dev})")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicErrorView {
    pub code: &'static str,
    pub message: String,
}

pub struct ErrorBuilder {
    code: ErrorCode,
    message_user: Option<String>,
    message_dev: Option<String>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message_user: None,
            message_dev: None,
        }
    }

    pub fn user_msg(mut self, msg: impl Into<String>) -> Self {
        self.message_user = Some(msg.into());
        self
    }

    pub fn dev_msg(mut self, msg: impl Into<String>) -> Self {
        self.message_dev = Some(msg.into());
        self
    }

    pub fn build(self) -> ErrorObj {
        ErrorObj {
            code: self.code.code,
            http_status: self.code.http_status,
            retry: self.code.retry,
            message_user: self
                .message_user
                .unwrap_or_else(|| "Request failed.".to_string()),
            message_dev: self.message_dev,
        }
    }
}
