use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::MetricSpec;

pub trait Meter: Send + Sync {
    fn counter(&self, spec: &'static MetricSpec) -> CounterHandle;
}

#[derive(Clone, Default)]
pub struct MeterRegistry {
    inner: Arc<Mutex<HashMap<&'static str, Arc<AtomicU64>>>>,
}

impl MeterRegistry {
    fn entry(&self, spec: &'static MetricSpec) -> Arc<AtomicU64> {
        let mut guard = self.inner.lock();
        guard
            .entry(spec.name)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }

    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        let guard = self.inner.lock();
        let mut out: Vec<_> = guard
            .iter()
            .map(|(name, value)| (*name, value.load(Ordering::Relaxed)))
            .collect();
        out.sort_by_key(|(name, _)| *name);
        out
    }
}

impl Meter for MeterRegistry {
    fn counter(&self, spec: &'static MetricSpec) -> CounterHandle {
        CounterHandle::new(self.entry(spec))
    }
}

#[derive(Clone)]
pub struct CounterHandle {
    storage: Arc<AtomicU64>,
}

impl CounterHandle {
    pub fn new(storage: Arc<AtomicU64>) -> Self {
        Self { storage }
    }

    pub fn inc(&self, value: u64) {
        self.storage.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.storage.load(Ordering::Relaxed)
    }
}

impl Default for CounterHandle {
    fn default() -> Self {
        Self::new(Arc::new(AtomicU64::new(0)))
    }
}

#[derive(Default)]
pub struct NoopMeter;

impl Meter for NoopMeter {
    fn counter(&self, _spec: &'static MetricSpec) -> CounterHandle {
        CounterHandle::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricKind;

    const TEST_COUNTER: MetricSpec = MetricSpec {
        name: "stylebase_test_events_total",
        kind: MetricKind::Counter,
        help: "Events observed by the test",
    };

    #[test]
    fn counters_accumulate_and_snapshot() {
        let meter = MeterRegistry::default();
        meter.counter(&TEST_COUNTER).inc(2);
        meter.counter(&TEST_COUNTER).inc(3);

        let snapshot = meter.snapshot();
        assert_eq!(snapshot, vec![("stylebase_test_events_total", 5)]);
    }

    #[test]
    fn noop_meter_swallows_increments() {
        let meter = NoopMeter;
        let handle = meter.counter(&TEST_COUNTER);
        handle.inc(10);
        assert_eq!(handle.get(), 10);

        // a second handle from the noop meter shares nothing
        assert_eq!(meter.counter(&TEST_COUNTER).get(), 0);
    }
}
