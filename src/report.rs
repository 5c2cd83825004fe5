pub mod terminal;

use crate::cycle::{CycleOutcome, CycleParams};

/// Sink for cycle results when no interactive screen is attached.
pub trait Reporter: Send + Sync {
    fn report(&self, params: &CycleParams, outcome: &CycleOutcome);

    fn countdown(&self, remaining: u64);
}
