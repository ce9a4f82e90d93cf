//! Engine configuration options.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Log every event at debug instead of trace.
    pub verbose: bool,
    /// Largest tolerated gap between the balancing drag and the drag summed
    /// from daily price moves.
    pub waterfall_epsilon: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            verbose: false,
            waterfall_epsilon: dec!(0.000001),
        }
    }
}
