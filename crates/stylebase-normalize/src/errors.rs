use stylebase_errors::prelude::*;
use thiserror::Error;

const PREVIEW_CHARS: usize = 160;

/// Bounded excerpt of an offending payload for diagnostics. Never the
/// full text: provider output can be arbitrarily large.
pub fn preview(raw: &str) -> String {
    let mut out: String = raw.chars().take(PREVIEW_CHARS).collect();
    if raw.chars().count() > PREVIEW_CHARS {
        out.push('…');
    }
    out
}

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct NormalizeError(pub Box<ErrorObj>);

impl NormalizeError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn obj(&self) -> &ErrorObj {
        &self.0
    }

    pub fn unparsable(raw: &str) -> Self {
        NormalizeError(Box::new(
            ErrorBuilder::new(codes::NORMALIZE_UNPARSABLE)
                .user_msg("The decode result could not be read. Please try again.")
                .dev_msg(format!("no JSON object extractable; preview: {}", preview(raw)))
                .build(),
        ))
    }
}
