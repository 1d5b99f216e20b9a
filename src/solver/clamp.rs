//! Voltage-clamp run loop
//!
//! [`ClampSolver`] drives every channel of a [`Scenario`] through its
//! lifecycle for `time_steps` steps of `dt = total_time / time_steps`:
//!
//! 1. initialize channels that are still uninitialized, then reset them at
//!    the holding potential
//! 2. for each step, evaluate the protocol at the end of the interval
//!    (`t_{n+1}`), step every channel and sum the currents
//! 3. check every cell for NaN/Inf and record the point when due
//!
//! # Example
//!
//! ```rust
//! use markov_rs::models::{FixedIon, SodiumP3q, P3qParams};
//! use markov_rs::solver::{
//!     ChannelLifecycle, ClampSolver, Scenario, Solver, SolverConfiguration, VoltageProtocol,
//! };
//!
//! # fn main() -> Result<(), markov_rs::error::ChannelError> {
//! let hh = SodiumP3q::new(P3qParams::hh1952())?;
//! let sodium = FixedIon::sodium().with_channel(ChannelLifecycle::new(Box::new(hh)));
//! let mut scenario = Scenario::new(sodium, VoltageProtocol::steps(-80.0, vec![(0.5, 0.0)])?);
//!
//! let config = SolverConfiguration::time_evolution(2.0, 200).with_record_every(10);
//! let result = ClampSolver::new().solve(&mut scenario, &config)?;
//! assert_eq!(result.len(), 21);
//! # Ok(())
//! # }
//! ```

use crate::error::ChannelResult;
use crate::solver::traits::{SimulationResult, Solver, SolverConfiguration};
use crate::solver::{Scenario, validate_cells};
use log::debug;

/// Runs a [`Scenario`] under a time-evolution configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct ClampSolver;

impl ClampSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for ClampSolver {
    fn solve(
        &self,
        scenario: &mut Scenario,
        config: &SolverConfiguration,
    ) -> ChannelResult<SimulationResult> {
        // ====== Step 1: Validation ======
        config.validate()?;
        scenario.validate()?;

        let dt = config.dt();
        let batch = scenario.batch;
        let n = batch.len();

        // ====== Step 2: Setup ======
        let v0 = scenario.protocol.voltage(0.0, n)?;
        scenario.ion.init_state(&v0, batch)?;
        scenario.ion.reset_state(&v0)?;

        let mut result = SimulationResult::new(scenario.ion.cell_names());
        let recorded = 1 + config.time_steps / config.record_every + 1;
        result.time_points.reserve(recorded);

        let i0 = scenario.ion.current(&v0)?;
        result.record(0.0, v0[0], i0, scenario.ion.first_compartment());

        debug!(
            "clamp run: {} channel(s), {}, {} steps of {} ms",
            scenario.ion.channels().len(),
            batch,
            config.time_steps,
            dt
        );

        // ====== Step 3: Time Integration ======
        for step in 0..config.time_steps {
            // time computed from the index to avoid accumulated rounding
            let t = (step as f64 + 1.0) * dt;
            let v = scenario.protocol.voltage(t, n)?;

            let current = scenario.ion.step(&v, dt)?;
            validate_cells(&scenario.ion.cells(), step + 1)?;

            if config.records(step + 1) {
                result.record(t, v[0], current, scenario.ion.first_compartment());
            }
        }

        // ====== Step 4: Build Result ======
        result.final_occupancy = scenario
            .ion
            .cells()
            .iter()
            .map(|c| c.value().clone())
            .collect();

        result.add_metadata("solver", self.name());
        result.add_metadata("ion", scenario.ion.name());
        result.add_metadata("channels", &scenario.ion.channel_names().join(";"));
        result.add_metadata("compartments", &n.to_string());
        result.add_metadata("time steps", &config.time_steps.to_string());
        result.add_metadata("dt", &dt.to_string());
        result.add_metadata("total time", &config.total_time.to_string());

        Ok(result)
    }

    fn name(&self) -> &str {
        "Voltage Clamp"
    }
}

// =================================================================================================
// Tests
// =================================================================================================
