pub use crate::metrics::{CounterHandle, Meter, MeterRegistry, NoopMeter};
pub use crate::model::{MetricKind, MetricSpec};
