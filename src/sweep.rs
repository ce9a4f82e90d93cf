//! Parameter sweep and trigger optimizer.
//!
//! Every grid cell is an independent run: its own [`Simulation`], reading the
//! shared series and venue definitions. Cells fan out over rayon and fan back in
//! keyed by [`GridCoord`], so completion order never shows up in the output. A
//! cell that fails to validate or run is reported as its typed error and the
//! rest of the grid carries on. Only a grid that cannot be keyed at all, two
//! venues sharing a name, is rejected up front.
//!
//! [`Simulation`]: crate::engine::Simulation

use crate::config::{LongLegParams, RunParams, VenueConfig, TRIGGER_NEVER};
use crate::engine::{run_simulation, EngineConfig, SimulationError};
use crate::market::MarketSeries;
use crate::pnl::{summarize, RunSummary};
use crate::types::Quote;
use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepError {
    // cells are keyed by venue name, so a repeat would overwrite another venue's results
    #[error("venue {0} appears more than once in the sweep grid")]
    DuplicateVenue(String),
}

/// The values to sweep over. Every combination becomes one cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepGrid {
    pub leverages: Vec<Decimal>,
    pub capitals: Vec<Quote>,
    pub trigger_multiples: Vec<Decimal>,
    pub venues: Vec<VenueConfig>,
    pub long_params: LongLegParams,
    pub min_transfer: Quote,
}

impl SweepGrid {
    /// Leverage 1.5x to 5x, $10k, triggers from tight to never, on the given venues.
    pub fn standard(venues: Vec<VenueConfig>) -> Self {
        Self {
            leverages: vec![dec!(1.5), dec!(2), dec!(2.5), dec!(3), dec!(4), dec!(5)],
            capitals: vec![Quote::new(dec!(10_000))],
            trigger_multiples: vec![
                dec!(1.1),
                dec!(1.25),
                dec!(1.5),
                dec!(2),
                dec!(2.5),
                dec!(3),
                TRIGGER_NEVER,
            ],
            venues,
            long_params: LongLegParams::default(),
            min_transfer: Quote::new(dec!(5)),
        }
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        let mut seen = BTreeSet::new();
        for venue in &self.venues {
            if !seen.insert(venue.name.as_str()) {
                return Err(SweepError::DuplicateVenue(venue.name.clone()));
            }
        }
        Ok(())
    }

    /// Returns the total number of cells in this grid.
    pub fn size(&self) -> usize {
        self.leverages.len() * self.capitals.len() * self.trigger_multiples.len() * self.venues.len()
    }

    /// Every cell with the venue it runs against.
    pub fn cells(&self) -> Vec<(GridCoord, &VenueConfig, RunParams)> {
        let mut cells = Vec::with_capacity(self.size());

        for &leverage in &self.leverages {
            for &capital in &self.capitals {
                for &trigger in &self.trigger_multiples {
                    for venue in &self.venues {
                        let params = RunParams {
                            target_leverage: leverage,
                            initial_capital: capital,
                            trigger_multiple: trigger,
                            min_transfer: self.min_transfer,
                        };
                        let coord = GridCoord {
                            leverage,
                            capital,
                            trigger_multiple: trigger,
                            venue: venue.name.clone(),
                        };
                        cells.push((coord, venue, params));
                    }
                }
            }
        }

        cells
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub leverage: Decimal,
    pub capital: Quote,
    pub trigger_multiple: Decimal,
    pub venue: String,
}

pub type CellOutcome = Result<RunSummary, SimulationError>;

/// Best cell for one (leverage, venue) pair.
#[derive(Debug, Clone)]
pub struct BestCell<'r> {
    pub coord: &'r GridCoord,
    pub summary: &'r RunSummary,
}

#[derive(Debug)]
pub struct SweepReport {
    pub cells: BTreeMap<GridCoord, CellOutcome>,
}

impl SweepReport {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, coord: &GridCoord) -> Option<&CellOutcome> {
        self.cells.get(coord)
    }

    pub fn successes(&self) -> impl Iterator<Item = (&GridCoord, &RunSummary)> {
        self.cells
            .iter()
            .filter_map(|(coord, outcome)| outcome.as_ref().ok().map(|s| (coord, s)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&GridCoord, &SimulationError)> {
        self.cells
            .iter()
            .filter_map(|(coord, outcome)| outcome.as_ref().err().map(|e| (coord, e)))
    }

    /// Highest annualized return per (leverage, venue), across capitals and triggers.
    /// Ties keep the first cell in grid order.
    pub fn best_by_leverage_and_venue(&self) -> BTreeMap<(Decimal, String), BestCell<'_>> {
        let mut best: BTreeMap<(Decimal, String), BestCell<'_>> = BTreeMap::new();

        for (coord, summary) in self.successes() {
            let key = (coord.leverage, coord.venue.clone());
            let replace = best
                .get(&key)
                .map_or(true, |b| summary.annualized_return() > b.summary.annualized_return());
            if replace {
                best.insert(key, BestCell { coord, summary });
            }
        }

        best
    }
}

/// Parameter sweep executor.
#[derive(Debug, Clone, Default)]
pub struct ParameterSweep {
    engine_config: EngineConfig,
    sequential: bool,
}

impl ParameterSweep {
    pub fn new(engine_config: EngineConfig) -> Self {
        Self {
            engine_config,
            sequential: false,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.sequential = !parallel;
        self
    }

    pub fn run(&self, series: &MarketSeries, grid: &SweepGrid) -> Result<SweepReport, SweepError> {
        grid.validate()?;
        let cells = grid.cells();

        let outcomes: Vec<(GridCoord, CellOutcome)> = if self.sequential {
            cells
                .into_iter()
                .map(|(coord, venue, params)| {
                    let outcome = self.run_cell(series, venue, &grid.long_params, params);
                    (coord, outcome)
                })
                .collect()
        } else {
            cells
                .into_par_iter()
                .map(|(coord, venue, params)| {
                    let outcome = self.run_cell(series, venue, &grid.long_params, params);
                    (coord, outcome)
                })
                .collect()
        };

        let report = SweepReport {
            cells: outcomes.into_iter().collect(),
        };

        let failed = report.failures().count();
        if failed > 0 {
            warn!(failed, total = report.len(), "sweep cells failed");
        }
        info!(cells = report.len(), parallel = !self.sequential, "sweep complete");

        Ok(report)
    }

    fn run_cell(
        &self,
        series: &MarketSeries,
        venue: &VenueConfig,
        long_params: &LongLegParams,
        params: RunParams,
    ) -> CellOutcome {
        let result = run_simulation(series, venue, long_params.clone(), params, self.engine_config.clone())?;
        summarize(&result, self.engine_config.waterfall_epsilon)
    }
}

/// One row of the trigger sensitivity table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRow {
    pub trigger_multiple: Decimal,
    pub liquidations: usize,
    pub rebalances: usize,
    pub annualized_return: Decimal,
}

/// Liquidations, rebalances and return as the trigger moves from tight to never,
/// for one venue. Leverage, capital and min transfer come from `params`; its own
/// trigger is replaced by each of `triggers`. Failed runs are skipped.
pub fn trigger_sensitivity(
    series: &MarketSeries,
    venue: &VenueConfig,
    long_params: &LongLegParams,
    params: &RunParams,
    triggers: &[Decimal],
    engine_config: &EngineConfig,
) -> Result<Vec<SensitivityRow>, SweepError> {
    let grid = SweepGrid {
        leverages: vec![params.target_leverage],
        capitals: vec![params.initial_capital],
        trigger_multiples: triggers.to_vec(),
        venues: vec![venue.clone()],
        long_params: long_params.clone(),
        min_transfer: params.min_transfer,
    };

    let rows = ParameterSweep::new(engine_config.clone())
        .run(series, &grid)?
        .successes()
        .map(|(coord, summary)| SensitivityRow {
            trigger_multiple: coord.trigger_multiple,
            liquidations: summary.liquidations,
            rebalances: summary.rebalances,
            annualized_return: summary.annualized_return(),
        })
        .collect();

    Ok(rows)
}
