// 8.0: simulation engine. a deterministic fold over the ordered days of one series:
// accrue, check liquidation at the day's extremes, rebalance if nothing fired, record.
// no external I/O; every input is validated before the first day runs.

mod config;
mod core;
mod daily;
mod liquidations;
mod rebalancing;
mod results;

pub use config::EngineConfig;
pub use core::{run_simulation, Simulation, SimulationStatus};
pub use results::{ActivityCounts, DaySnapshot, RunResult, SimulationError};
