use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use stylebase_ledger::prelude::Ledger;
use stylebase_llm::prelude::{
    cancel_pair, CancelHandle, CancelToken, DecodeOptions, ImageSource, ModelId, Registry,
    DEFAULT_DECODE_TIMEOUT,
};
use stylebase_normalize::prelude::Normalizer;
use stylebase_types::prelude::{Id, PrincipalId};
use tracing::{info, warn};

use crate::errors::DecodeError;
use crate::model::{DecodeJob, JobStatus};
use crate::store::JobStore;

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub cost_per_decode: i64,
    pub provider_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cost_per_decode: 1,
            provider_timeout: DEFAULT_DECODE_TIMEOUT,
        }
    }
}

/// Drives a decode job through its state machine: spend a token, call
/// the provider (bounded, cancelable), normalize, persist exactly once.
/// Refunds are issued for every path that consumed a token without
/// producing a completed result.
#[derive(Clone)]
pub struct Coordinator {
    ledger: Arc<dyn Ledger>,
    registry: Arc<Registry>,
    normalizer: Normalizer,
    jobs: Arc<dyn JobStore>,
    cancels: Arc<Mutex<HashMap<Id, CancelHandle>>>,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        registry: Arc<Registry>,
        normalizer: Normalizer,
        jobs: Arc<dyn JobStore>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            ledger,
            registry,
            normalizer,
            jobs,
            cancels: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn jobs(&self) -> Arc<dyn JobStore> {
        self.jobs.clone()
    }

    /// Spends one token and enqueues the job, returning it immediately;
    /// processing continues on a spawned task. A duplicate submission
    /// (same principal + idempotency key) converges on the original job
    /// without a second spend. Insufficient balance rejects before any
    /// job exists.
    pub async fn submit(
        &self,
        principal: &PrincipalId,
        image: ImageSource,
        model: ModelId,
        idem_key: &str,
    ) -> Result<DecodeJob, DecodeError> {
        if idem_key.trim().is_empty() {
            return Err(DecodeError::schema("idempotency key must not be empty"));
        }

        let receipt = self
            .ledger
            .spend(principal, self.config.cost_per_decode, idem_key)
            .await?;

        if receipt.replayed {
            if let Some(existing) = self.jobs.find_by_idem_key(principal, idem_key).await? {
                info!(job = %existing.id, "duplicate decode submission replayed");
                return Ok(existing);
            }
            // The spend exists but its job does not: a prior submission
            // died between the two writes. Recreate the job without
            // spending again.
            warn!(idem_key, "spend present without job, recreating");
        }

        let job = DecodeJob::new(principal.clone(), model, idem_key.to_string());
        self.jobs.insert(job.clone()).await?;

        let (handle, token) = cancel_pair();
        self.cancels.lock().insert(job.id.clone(), handle);

        let coordinator = self.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            coordinator.run(job_id, image, token).await;
        });

        Ok(job)
    }

    /// Ownership-checked job snapshot; optionally requests cancellation
    /// first. Cancel on a queued job refunds immediately; cancel on a
    /// running job aborts the provider call and the run task refunds once
    /// the abort is observed. Terminal jobs ignore cancel requests.
    pub async fn status(
        &self,
        principal: &PrincipalId,
        job_id: &Id,
        cancel: bool,
    ) -> Result<DecodeJob, DecodeError> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .filter(|job| &job.principal_id == principal)
            .ok_or_else(|| DecodeError::not_found(&job_id.0))?;

        if cancel && !job.status.is_terminal() {
            self.cancel(&job).await?;
            return self
                .jobs
                .get(job_id)
                .await?
                .ok_or_else(|| DecodeError::not_found(&job_id.0));
        }

        Ok(job)
    }

    async fn cancel(&self, job: &DecodeJob) -> Result<(), DecodeError> {
        // Race the run task for the queued edge; exactly one writer wins.
        if self
            .jobs
            .transition(&job.id, JobStatus::Queued, JobStatus::Canceled)
            .await?
        {
            self.refund(job, "canceled before start").await;
            self.cancels.lock().remove(&job.id);
            info!(job = %job.id, "decode canceled while queued");
            return Ok(());
        }

        // Already running: fire the cancel signal; the run task observes
        // the abort and settles the job.
        if let Some(handle) = self.cancels.lock().get(&job.id) {
            handle.cancel();
            info!(job = %job.id, "cancel requested for running decode");
        }
        Ok(())
    }

    async fn run(&self, job_id: Id, image: ImageSource, token: CancelToken) {
        let Ok(Some(job)) = self.jobs.get(&job_id).await else {
            return;
        };

        let started = match self
            .jobs
            .transition(&job_id, JobStatus::Queued, JobStatus::Running)
            .await
        {
            Ok(started) => started,
            Err(err) => {
                warn!(job = %job_id, error = %err, "job start transition failed");
                return;
            }
        };
        if !started {
            // Lost the edge to a queued cancel; the canceler refunded.
            return;
        }

        let opts = DecodeOptions {
            timeout: self.config.provider_timeout,
            cancel: token,
        };

        let raw = match self.registry.decode(&job.model, &image, &opts).await {
            Ok(raw) => raw,
            Err(err) => {
                let obj = err.into_inner();
                warn!(
                    job = %job_id,
                    code = obj.code,
                    detail = obj.message_dev.as_deref().unwrap_or("n/a"),
                    "provider call failed"
                );
                self.settle_failure(&job, obj.message_user).await;
                return;
            }
        };

        if !self
            .advance(&job_id, JobStatus::Running, JobStatus::Normalizing)
            .await
        {
            return;
        }

        let result = match self.normalizer.parse(&raw) {
            Ok(result) => result,
            Err(err) => {
                let obj = err.into_inner();
                warn!(
                    job = %job_id,
                    detail = obj.message_dev.as_deref().unwrap_or("n/a"),
                    "decode response did not normalize"
                );
                self.settle_failure(&job, obj.message_user).await;
                return;
            }
        };

        if !self
            .advance(&job_id, JobStatus::Normalizing, JobStatus::Saving)
            .await
        {
            return;
        }

        match self.jobs.complete(&job_id, result).await {
            Ok(()) => {
                self.cancels.lock().remove(&job_id);
                info!(job = %job_id, model = %job.model, "decode completed");
            }
            Err(err) => {
                warn!(job = %job_id, error = %err, "persisting decode result failed");
                self.settle_failure(&job, "Decode failed.".to_string()).await;
            }
        }
    }

    async fn advance(&self, job_id: &Id, from: JobStatus, to: JobStatus) -> bool {
        match self.jobs.transition(job_id, from, to).await {
            Ok(true) => true,
            Ok(false) => false,
            Err(err) => {
                warn!(job = %job_id, error = %err, "job transition failed");
                false
            }
        }
    }

    async fn settle_failure(&self, job: &DecodeJob, user_message: String) {
        if let Err(err) = self.jobs.fail(&job.id, user_message).await {
            warn!(job = %job.id, error = %err, "marking job failed errored");
        }
        self.refund(job, "decode failed").await;
        self.cancels.lock().remove(&job.id);
    }

    async fn refund(&self, job: &DecodeJob, reason: &str) {
        match self
            .ledger
            .refund(&job.principal_id, self.config.cost_per_decode, &job.idem_key)
            .await
        {
            Ok(balance) => {
                info!(job = %job.id, balance, reason, "token refunded");
            }
            Err(err) => {
                warn!(job = %job.id, error = %err, "refund failed");
            }
        }
    }
}
