//! Generic Markov channel
//!
//! [`MarkovChannel`] turns any [`MarkovScheme`] into a [`Channel`]: one
//! [`StateCell`] per tracked state, normalization before every step, and
//! an ohmic current through the open state(s):
//!
//! ```text
//! I = g_max · Σ_open S · (E − V)
//! ```
//!
//! # Integration
//!
//! By default the cells are advanced by the
//! [`ImplicitStepSolver`] (`IntegrationMode::Implicit`). Switching to
//! `IntegrationMode::Generic` hands them to the lifecycle's integrator
//! instead, which is only sensible for non-stiff schemes.
//!
//! # Reset
//!
//! `reset_state` seeds the cells from, in order of precedence:
//! 1. the steady state at the reset voltage, when enabled
//! 2. the configured initial occupancy
//! 3. all population in the first tracked state
//!
//! then normalizes.
//!
//! # Example
//!
//! ```rust
//! use markov_rs::kinetics::{MarkovScheme, RateTable};
//! use markov_rs::models::MarkovChannel;
//! use markov_rs::physics::{BatchShape, Channel, IonInfo};
//! use nalgebra::DVector;
//!
//! # fn main() -> Result<(), markov_rs::error::ChannelError> {
//! let rates = RateTable::new().with("a", |_| 2.0)?.with("b", |_| 1.0)?;
//! let scheme = MarkovScheme::builder()
//!     .states(&["open", "closed"])
//!     .reversible("closed", "open", "a", "b")
//!     .build(rates)?;
//!
//! let mut channel = MarkovChannel::new("two-state", scheme, &["open"], 1.0)?
//!     .with_initial_occupancy(vec![0.0, 1.0])?;
//!
//! let v = DVector::from_element(1, 0.0);
//! let ion = IonInfo::uniform(BatchShape::Unbatched, 50.0, 10.0);
//! channel.init_state(&v, &ion, BatchShape::Unbatched)?;
//! channel.reset_state(&v, &ion)?;
//! assert_eq!(channel.current(&v, &ion)?[0], 0.0);
//! # Ok(())
//! # }
//! ```

use crate::error::{ChannelError, ChannelResult};
use crate::kinetics::{MarkovScheme, Normalizer, stack_cells, unstack_into};
use crate::physics::{BatchShape, Channel, IntegrationMode, IonInfo, StateCell};
use crate::solver::ImplicitStepSolver;
use nalgebra::{DMatrix, DVector};

/// Channel driven by a linear kinetic scheme
#[derive(Debug, Clone)]
pub struct MarkovChannel {
    name: String,
    scheme: MarkovScheme,
    /// Indices of the conducting states
    open: Vec<usize>,
    /// Maximal conductance (mS/cm²)
    g_max: f64,
    mode: IntegrationMode,
    initial: Option<Vec<f64>>,
    steady_state_reset: bool,
    normalizer: Normalizer,
    solver: ImplicitStepSolver,
    cells: Vec<StateCell>,
}

impl MarkovChannel {
    /// Create a channel conducting through the named `open` states
    pub fn new(
        name: impl Into<String>,
        scheme: MarkovScheme,
        open: &[&str],
        g_max: f64,
    ) -> ChannelResult<Self> {
        if !(g_max.is_finite() && g_max >= 0.0) {
            return Err(ChannelError::config(format!(
                "maximal conductance must be finite and non-negative, got {}",
                g_max
            )));
        }
        if open.is_empty() {
            return Err(ChannelError::config("channel needs at least one open state"));
        }
        let open = open
            .iter()
            .map(|name| {
                scheme.index_of(name).ok_or_else(|| {
                    ChannelError::config(format!("open state '{}' is not a tracked state", name))
                })
            })
            .collect::<ChannelResult<Vec<_>>>()?;

        Ok(Self {
            name: name.into(),
            scheme,
            open,
            g_max,
            mode: IntegrationMode::Implicit,
            initial: None,
            steady_state_reset: false,
            normalizer: Normalizer::new(),
            solver: ImplicitStepSolver::new(),
            cells: Vec::new(),
        })
    }

    pub fn with_mode(mut self, mode: IntegrationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Occupancy of every tracked state used by `reset_state`
    pub fn with_initial_occupancy(mut self, initial: Vec<f64>) -> ChannelResult<Self> {
        if initial.len() != self.scheme.n_states() {
            return Err(ChannelError::shape(
                "initial occupancy",
                self.scheme.n_states(),
                initial.len(),
            ));
        }
        if initial.iter().any(|x| !x.is_finite()) {
            return Err(ChannelError::config("initial occupancy must be finite"));
        }
        self.initial = Some(initial);
        Ok(self)
    }

    /// Seed `reset_state` from the steady state at the reset voltage
    pub fn with_steady_state_reset(mut self, enabled: bool) -> Self {
        self.steady_state_reset = enabled;
        self
    }

    pub fn scheme(&self) -> &MarkovScheme {
        &self.scheme
    }

    pub fn steady_state_reset(&self) -> bool {
        self.steady_state_reset
    }

    pub fn g_max(&self) -> f64 {
        self.g_max
    }

    /// Values of the named tracked state
    pub fn occupancy(&self, state: &str) -> Option<&DVector<f64>> {
        let index = self.scheme.index_of(state)?;
        self.cells.get(index).map(|c| c.value())
    }

    /// Derived remainder per compartment, `None` without remainder state
    pub fn remainder(&self) -> ChannelResult<Option<DVector<f64>>> {
        Ok(self.scheme.remainder(&self.stacked()?))
    }

    /// Total open probability per compartment
    pub fn open_probability(&self) -> ChannelResult<DVector<f64>> {
        let m = self.compartments()?;
        Ok(self
            .open
            .iter()
            .fold(DVector::zeros(m), |acc, &i| acc + self.cells[i].value()))
    }

    fn compartments(&self) -> ChannelResult<usize> {
        self.cells.first().map(|c| c.len()).ok_or(ChannelError::Lifecycle {
            operation: "read state",
            phase: "uninitialized".to_string(),
        })
    }

    fn stacked(&self) -> ChannelResult<DMatrix<f64>> {
        let cells: Vec<&StateCell> = self.cells.iter().collect();
        stack_cells(&cells)
    }

    fn write_back(&mut self, states: &DMatrix<f64>) -> ChannelResult<()> {
        let mut cells: Vec<&mut StateCell> = self.cells.iter_mut().collect();
        unstack_into(states, &mut cells)
    }

    fn normalize(&mut self) -> ChannelResult<()> {
        let has_remainder = self.scheme.has_remainder();
        let mut cells: Vec<&mut StateCell> = self.cells.iter_mut().collect();
        self.normalizer.normalize(&mut cells, has_remainder)
    }

    fn check_voltage(&self, v: &DVector<f64>) -> ChannelResult<()> {
        let m = self.compartments()?;
        if v.len() != m {
            return Err(ChannelError::shape("voltage", m, v.len()));
        }
        Ok(())
    }
}

impl Channel for MarkovChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn init_state(
        &mut self,
        v: &DVector<f64>,
        _ion: &IonInfo,
        batch: BatchShape,
    ) -> ChannelResult<()> {
        batch.check("voltage", v.len())?;
        self.cells = self
            .scheme
            .state_names()
            .iter()
            .map(|name| StateCell::zeros(name.clone(), batch))
            .collect();
        Ok(())
    }

    fn reset_state(&mut self, v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
        self.check_voltage(v)?;

        if self.steady_state_reset {
            let states = self.solver.steady_state(&self.scheme, v)?;
            self.write_back(&states)?;
        } else {
            let initial = match &self.initial {
                Some(initial) => initial.clone(),
                None => {
                    let mut first = vec![0.0; self.scheme.n_states()];
                    first[0] = 1.0;
                    first
                }
            };
            for (cell, x) in self.cells.iter_mut().zip(initial) {
                cell.value_mut().fill(x);
            }
        }
        self.normalize()
    }

    fn pre_integral(&mut self, v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
        self.check_voltage(v)?;
        self.normalize()
    }

    fn compute_derivative(&mut self, v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
        self.check_voltage(v)?;
        let d = self.scheme.rhs(&self.stacked()?, v)?;
        for (i, cell) in self.cells.iter_mut().enumerate() {
            cell.set_derivative(d.row(i).transpose())?;
        }
        Ok(())
    }

    fn update_state(&mut self, v: &DVector<f64>, _ion: &IonInfo, dt: f64) -> ChannelResult<()> {
        self.check_voltage(v)?;
        let next = self.solver.step(&self.scheme, &self.stacked()?, v, dt)?;
        self.write_back(&next)
    }

    fn current(&self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<DVector<f64>> {
        self.check_voltage(v)?;
        if ion.len() != v.len() {
            return Err(ChannelError::shape("ion reversal potential", v.len(), ion.len()));
        }
        let open = self.open_probability()?;
        Ok((&ion.e - v).component_mul(&open) * self.g_max)
    }

    fn integration_mode(&self) -> IntegrationMode {
        self.mode
    }

    fn cells(&self) -> Vec<&StateCell> {
        self.cells.iter().collect()
    }

    fn cells_mut(&mut self) -> Vec<&mut StateCell> {
        self.cells.iter_mut().collect()
    }

    fn description(&self) -> Option<&str> {
        Some("Markov kinetic scheme integrated by linearized backward Euler")
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinetics::RateTable;
    use approx::assert_relative_eq;

    fn two_state_scheme(a: f64, b: f64) -> MarkovScheme {
        let rates = RateTable::new()
            .with("a", move |_| a)
            .unwrap()
            .with("b", move |_| b)
            .unwrap();
        MarkovScheme::builder()
            .states(&["open", "closed"])
            .reversible("closed", "open", "a", "b")
            .build(rates)
            .unwrap()
    }

    fn ready(channel: &mut MarkovChannel, n: usize) -> (DVector<f64>, IonInfo) {
        let batch = BatchShape::from_len(n).unwrap();
        let v = DVector::from_element(n, 0.0);
        let ion = IonInfo::uniform(batch, 50.0, 10.0);
        channel.init_state(&v, &ion, batch).unwrap();
        channel.reset_state(&v, &ion).unwrap();
        (v, ion)
    }

    #[test]
    fn test_construction_errors() {
        let scheme = two_state_scheme(2.0, 1.0);
        assert!(MarkovChannel::new("x", scheme.clone(), &["missing"], 1.0).is_err());
        assert!(MarkovChannel::new("x", scheme.clone(), &[], 1.0).is_err());
        assert!(MarkovChannel::new("x", scheme.clone(), &["open"], -1.0).is_err());
        let channel = MarkovChannel::new("x", scheme, &["open"], 1.0).unwrap();
        assert!(channel.with_initial_occupancy(vec![1.0]).is_err());
    }

    #[test]
    fn test_default_reset_fills_first_state() {
        let mut channel =
            MarkovChannel::new("x", two_state_scheme(2.0, 1.0), &["open"], 1.0).unwrap();
        ready(&mut channel, 3);
        assert!(channel.occupancy("open").unwrap().iter().all(|&x| (x - 1.0).abs() < 1e-9));
        assert!(channel.occupancy("closed").unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_steady_state_reset() {
        let mut channel = MarkovChannel::new("x", two_state_scheme(2.0, 1.0), &["open"], 1.0)
            .unwrap()
            .with_steady_state_reset(true);
        ready(&mut channel, 2);
        assert_relative_eq!(channel.occupancy("open").unwrap()[1], 2.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_current_uses_open_states() {
        let mut channel = MarkovChannel::new("x", two_state_scheme(2.0, 1.0), &["open"], 2.0)
            .unwrap()
            .with_initial_occupancy(vec![0.25, 0.75])
            .unwrap();
        let (v, ion) = ready(&mut channel, 1);
        let i = channel.current(&v, &ion).unwrap();
        assert_relative_eq!(i[0], 2.0 * 0.25 * 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_derivative_and_update() {
        let mut channel = MarkovChannel::new("x", two_state_scheme(2.0, 1.0), &["open"], 1.0)
            .unwrap()
            .with_initial_occupancy(vec![0.0, 1.0])
            .unwrap();
        let (v, ion) = ready(&mut channel, 1);

        channel.compute_derivative(&v, &ion).unwrap();
        assert_relative_eq!(channel.cells()[0].derivative()[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(channel.cells()[1].derivative()[0], -2.0, epsilon = 1e-9);

        channel.update_state(&v, &ion, 0.5).unwrap();
        assert_relative_eq!(channel.occupancy("open").unwrap()[0], 1.0 / 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_remainder_accessor() {
        let rates = RateTable::new()
            .with("k", |_| 1.0)
            .unwrap()
            .with("r", |_| 1.0)
            .unwrap();
        let scheme = MarkovScheme::builder()
            .state("O")
            .remainder("C")
            .reversible("C", "O", "k", "r")
            .build(rates)
            .unwrap();
        let mut channel = MarkovChannel::new("x", scheme, &["O"], 1.0)
            .unwrap()
            .with_initial_occupancy(vec![0.3])
            .unwrap();
        ready(&mut channel, 1);
        assert_relative_eq!(channel.remainder().unwrap().unwrap()[0], 0.7, epsilon = 1e-9);
    }

    #[test]
    fn test_uninitialized_access() {
        let channel = MarkovChannel::new("x", two_state_scheme(2.0, 1.0), &["open"], 1.0).unwrap();
        let v = DVector::from_element(1, 0.0);
        let ion = IonInfo::uniform(BatchShape::Unbatched, 50.0, 10.0);
        assert!(channel.current(&v, &ion).is_err());
        assert!(channel.open_probability().is_err());
    }
}
