//! Solver traits and types
//!
//! - `Integrator`: generic per-cell update used for channels in
//!   `IntegrationMode::Generic`
//! - `Solver`: runs a whole `Scenario` and returns a `SimulationResult`
//! - `SolverConfiguration`: time-evolution parameters
//! - `SimulationResult`: recorded traces plus metadata

use crate::error::{ChannelError, ChannelResult};
use crate::physics::StateCell;
use crate::solver::Scenario;
use nalgebra::DVector;
use std::collections::HashMap;

// =================================================================================================
// Integrator
// =================================================================================================

/// Generic integrator contract
///
/// Given one cell whose derivative slot was filled by the channel, write its
/// value after `dt`. Implementations must not read other cells.
pub trait Integrator: Send + Sync {
    fn advance(&self, cell: &mut StateCell, dt: f64) -> ChannelResult<()>;

    fn name(&self) -> &str;
}

// =================================================================================================
// Solver configuration
// =================================================================================================

/// Time-evolution parameters for a clamp run
///
/// # Example
///
/// ```rust
/// use markov_rs::solver::SolverConfiguration;
///
/// let config = SolverConfiguration::time_evolution(10.0, 1000).with_record_every(10);
/// assert!(config.validate().is_ok());
/// assert!((config.dt() - 0.01).abs() < 1e-15);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfiguration {
    /// Total simulated time (ms)
    pub total_time: f64,

    /// Number of steps, `dt = total_time / time_steps`
    pub time_steps: usize,

    /// Record one point every `record_every` steps (the last step is always
    /// recorded)
    pub record_every: usize,
}

impl SolverConfiguration {
    /// Create a time evolution configuration recording every step
    pub fn time_evolution(total_time: f64, time_steps: usize) -> Self {
        Self {
            total_time,
            time_steps,
            record_every: 1,
        }
    }

    pub fn with_record_every(mut self, record_every: usize) -> Self {
        self.record_every = record_every;
        self
    }

    /// Step size in ms
    pub fn dt(&self) -> f64 {
        self.total_time / self.time_steps as f64
    }

    /// Validate configuration
    pub fn validate(&self) -> ChannelResult<()> {
        if !(self.total_time.is_finite() && self.total_time > 0.0) {
            return Err(ChannelError::config("total time must be positive"));
        }
        if self.time_steps == 0 {
            return Err(ChannelError::config("time steps must be greater than 0"));
        }
        if self.record_every == 0 {
            return Err(ChannelError::config("record interval must be at least 1"));
        }
        Ok(())
    }

    /// True when `step` (1-based) should be stored
    pub fn records(&self, step: usize) -> bool {
        step % self.record_every == 0 || step == self.time_steps
    }
}

// =================================================================================================
// Solver
// =================================================================================================

/// A method that runs a full scenario
pub trait Solver {
    fn solve(
        &self,
        scenario: &mut Scenario,
        config: &SolverConfiguration,
    ) -> ChannelResult<SimulationResult>;

    fn name(&self) -> &str;
}

// =================================================================================================
// Simulation result
// =================================================================================================

/// Recorded output of a clamp run
///
/// Currents are kept for every compartment. Occupancies are recorded for the
/// first compartment only; the final occupancies of all compartments are
/// kept in `final_occupancy`.
#[derive(Clone, Debug, Default)]
pub struct SimulationResult {
    /// Recorded times (ms), starting at 0
    pub time_points: Vec<f64>,

    /// Command voltage of the first compartment at each recorded time (mV)
    pub voltage: Vec<f64>,

    /// Total current per compartment at each recorded time
    pub current: Vec<DVector<f64>>,

    /// Names of the recorded cells, in storage order
    pub state_names: Vec<String>,

    /// Cell values of the first compartment at each recorded time
    pub occupancy: Vec<Vec<f64>>,

    /// Cell values of every compartment after the last step
    pub final_occupancy: Vec<DVector<f64>>,

    pub metadata: HashMap<String, String>,
}

impl SimulationResult {
    pub fn new(state_names: Vec<String>) -> Self {
        Self {
            state_names,
            ..Default::default()
        }
    }

    /// Store one recorded point
    pub fn record(
        &mut self,
        time: f64,
        voltage: f64,
        current: DVector<f64>,
        occupancy: Vec<f64>,
    ) {
        self.time_points.push(time);
        self.voltage.push(voltage);
        self.current.push(current);
        self.occupancy.push(occupancy);
    }

    /// Number of recorded points
    pub fn len(&self) -> usize {
        self.time_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_points.is_empty()
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    /// Current trace of one compartment
    pub fn current_trace(&self, compartment: usize) -> Option<Vec<f64>> {
        self.current
            .iter()
            .map(|i| i.get(compartment).copied())
            .collect()
    }

    /// Occupancy trace of one named cell (first compartment)
    pub fn occupancy_of(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.state_names.iter().position(|s| s == name)?;
        self.occupancy.iter().map(|row| row.get(index).copied()).collect()
    }

    pub fn final_time(&self) -> Option<f64> {
        self.time_points.last().copied()
    }
}

// =================================================================================================
// Tests
// =================================================================================================
