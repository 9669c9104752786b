pub use crate::coordinator::{Coordinator, CoordinatorConfig};
pub use crate::errors::DecodeError;
pub use crate::model::{DecodeJob, JobStatus};
pub use crate::store::{JobStore, MemoryJobStore};
