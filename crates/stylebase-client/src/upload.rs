use base64::Engine;
use serde_json::{json, Value};

use crate::errors::ClientError;

pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

pub struct DecodeUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl DecodeUpload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// Client-side gate applied before any network call.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.bytes.is_empty() {
            return Err(ClientError::schema("upload is empty"));
        }
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ClientError::schema(&format!(
                "upload is {} bytes, limit is {MAX_UPLOAD_BYTES}",
                self.bytes.len()
            )));
        }
        if !ALLOWED_CONTENT_TYPES.contains(&self.content_type.as_str()) {
            return Err(ClientError::schema(&format!(
                "content type {} not allowed",
                self.content_type
            )));
        }
        Ok(())
    }

    pub fn to_image_payload(&self) -> Value {
        json!({
            "base64": base64::engine::general_purpose::STANDARD.encode(&self.bytes),
            "mime": self.content_type,
        })
    }
}
