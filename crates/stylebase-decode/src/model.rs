use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stylebase_llm::prelude::ModelId;
use stylebase_normalize::prelude::DecodeResult;
use stylebase_types::prelude::{Id, PrincipalId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Normalizing,
    Saving,
    Completed,
    Failed,
    Canceled,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Normalizing => "normalizing",
            JobStatus::Saving => "saving",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled)
    }
}

/// One decode request tracked through its state machine. Terminal jobs
/// are immutable and retained as history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecodeJob {
    pub id: Id,
    pub principal_id: PrincipalId,
    pub model: ModelId,
    pub status: JobStatus,
    pub attempt: u32,
    pub idem_key: String,
    pub result: Option<DecodeResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DecodeJob {
    pub fn new(principal_id: PrincipalId, model: ModelId, idem_key: String) -> Self {
        let now = Utc::now();
        Self {
            id: Id::with_prefix("job"),
            principal_id,
            model,
            status: JobStatus::Queued,
            attempt: 0,
            idem_key,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
