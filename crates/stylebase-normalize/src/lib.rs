pub mod errors;
pub mod extract;
pub mod schema;
pub mod prelude;

use stylebase_observe::prelude::{CounterHandle, Meter, MetricKind, MetricSpec};
use tracing::warn;

use crate::errors::NormalizeError;
use crate::schema::DecodeResult;

pub const EMPTY_RESULTS_TOTAL: MetricSpec = MetricSpec {
    name: "stylebase_normalize_empty_results_total",
    kind: MetricKind::Counter,
    help: "Decode responses that parsed but yielded no usable fields",
};

/// Turns a provider's free-text output into a canonical `DecodeResult`.
/// An all-empty result is accepted but counted and logged: it usually
/// means the provider answered outside the expected schema.
#[derive(Clone)]
pub struct Normalizer {
    empty_results: CounterHandle,
}

impl Normalizer {
    pub fn new(meter: &dyn Meter) -> Self {
        Self {
            empty_results: meter.counter(&EMPTY_RESULTS_TOTAL),
        }
    }

    pub fn parse(&self, raw: &str) -> Result<DecodeResult, NormalizeError> {
        let value = extract::extract_json(raw)?;
        let result = schema::coerce(value);
        if result.is_empty() {
            self.empty_results.inc(1);
            warn!(preview = %errors::preview(raw), "normalized decode result is empty");
        }
        Ok(result)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            empty_results: CounterHandle::default(),
        }
    }
}
