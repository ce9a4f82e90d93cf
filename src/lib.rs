// basis-core: delta-neutral basis position simulator.
// a levered long lent on a money market against an equal short perp, rebalanced by moving
// capital between legs and rebuilt from scratch only when a leg is liquidated.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Leg, Price, Quote, Leverage, Bps
//   2.x  market.rs: daily OHLC + rates series, per-venue funding, csv ingest
//   4.x  position.rs: both legs' primitives, derived equity/leverage, accrual, transfer
//   5.x  funding.rs: daily rate conversion, mark-to-market funding, carry apy
//   6.x  rebalance.rs: trigger evaluation and transfer sizing
//   6.5  liquidation.rs: breach at intraday extremes, penalty formulas, rotation fees
//   7.x  config.rs: venue presets, long-leg fees, run knobs
//   8.x  engine/: daily fold: accrue, liquidate + reopen, rebalance, trace
//   9.x  pnl.rs: waterfall attribution, annualized return, drawdown
//   10.x sweep.rs: parameter grid, parallel fan-out, best trigger per leverage/venue
//   11.x events.rs: state transition events for audit
//   12.x breakeven.rs: breakeven funding, fee drag, max price move before liquidation

// simulation core
pub mod engine;
pub mod events;
pub mod funding;
pub mod liquidation;
pub mod market;
pub mod position;
pub mod rebalance;
pub mod types;

// configuration and orchestration
pub mod breakeven;
pub mod config;
pub mod pnl;
pub mod sweep;

// re exports for convenience
pub use breakeven::*;
pub use config::*;
pub use engine::*;
pub use events::*;
pub use funding::*;
pub use liquidation::*;
pub use market::*;
pub use pnl::*;
pub use position::*;
pub use rebalance::{RebalanceAction, RebalanceDecision, RebalanceError};
pub use sweep::*;
pub use types::*;
