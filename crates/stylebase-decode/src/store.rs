use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use stylebase_normalize::prelude::DecodeResult;
use stylebase_types::prelude::{Id, PrincipalId};

use crate::errors::DecodeError;
use crate::model::{DecodeJob, JobStatus};

/// Persistence for decode jobs. Transitions are compare-and-set on the
/// current status so two writers racing for the same edge (the run task
/// starting versus a cancel landing) resolve to exactly one winner.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: DecodeJob) -> Result<(), DecodeError>;

    async fn get(&self, id: &Id) -> Result<Option<DecodeJob>, DecodeError>;

    async fn find_by_idem_key(
        &self,
        principal: &PrincipalId,
        idem_key: &str,
    ) -> Result<Option<DecodeJob>, DecodeError>;

    /// Applies `from -> to` only when the job is currently in `from`;
    /// returns whether the edge was taken. Terminal states never move.
    async fn transition(
        &self,
        id: &Id,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<bool, DecodeError>;

    /// `Saving -> Completed` with the result attached.
    async fn complete(&self, id: &Id, result: DecodeResult) -> Result<(), DecodeError>;

    /// Any non-terminal state `-> Failed` with the error recorded.
    async fn fail(&self, id: &Id, error: String) -> Result<(), DecodeError>;
}

#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<RwLock<HashMap<Id, DecodeJob>>>,
    idem_index: Arc<RwLock<HashMap<(PrincipalId, String), Id>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: DecodeJob) -> Result<(), DecodeError> {
        self.idem_index.write().insert(
            (job.principal_id.clone(), job.idem_key.clone()),
            job.id.clone(),
        );
        self.jobs.write().insert(job.id.clone(), job);
        Ok(())
    }

    async fn get(&self, id: &Id) -> Result<Option<DecodeJob>, DecodeError> {
        Ok(self.jobs.read().get(id).cloned())
    }

    async fn find_by_idem_key(
        &self,
        principal: &PrincipalId,
        idem_key: &str,
    ) -> Result<Option<DecodeJob>, DecodeError> {
        let id = self
            .idem_index
            .read()
            .get(&(principal.clone(), idem_key.to_string()))
            .cloned();
        match id {
            Some(id) => self.get(&id).await,
            None => Ok(None),
        }
    }

    async fn transition(
        &self,
        id: &Id,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<bool, DecodeError> {
        let mut guard = self.jobs.write();
        let job = guard
            .get_mut(id)
            .ok_or_else(|| DecodeError::not_found(&id.0))?;
        if job.status != from || job.status.is_terminal() {
            return Ok(false);
        }
        job.status = to;
        job.updated_at = Utc::now();
        if to == JobStatus::Running {
            job.attempt += 1;
        }
        Ok(true)
    }

    async fn complete(&self, id: &Id, result: DecodeResult) -> Result<(), DecodeError> {
        let mut guard = self.jobs.write();
        let job = guard
            .get_mut(id)
            .ok_or_else(|| DecodeError::not_found(&id.0))?;
        if job.status != JobStatus::Saving {
            return Err(DecodeError::internal(&format!(
                "complete from {} is not a legal edge",
                job.status.as_str()
            )));
        }
        job.status = JobStatus::Completed;
        job.result = Some(result);
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn fail(&self, id: &Id, error: String) -> Result<(), DecodeError> {
        let mut guard = self.jobs.write();
        let job = guard
            .get_mut(id)
            .ok_or_else(|| DecodeError::not_found(&id.0))?;
        if job.status.is_terminal() {
            return Ok(());
        }
        job.status = JobStatus::Failed;
        job.error = Some(error);
        job.updated_at = Utc::now();
        Ok(())
    }
}
