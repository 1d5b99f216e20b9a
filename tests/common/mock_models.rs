//! Mock channels and small schemes for testing
//!
//! These have closed-form solutions, which makes them suited to checking
//! the accuracy of the integrators.

use markov_rs::error::ChannelResult;
use markov_rs::kinetics::{MarkovScheme, RateTable};
use markov_rs::physics::{BatchShape, Channel, IntegrationMode, IonInfo, StateCell};
use nalgebra::DVector;

// =================================================================================================
// Schemes
// =================================================================================================

/// `C ⇌ O` with constant rates, both states tracked
///
/// `a` opens (C → O), `b` closes (O → C). The open occupancy relaxes to
/// `a / (a + b)` with time constant `1 / (a + b)`.
pub fn two_state_scheme(a: f64, b: f64) -> MarkovScheme {
    let rates = RateTable::new()
        .with("a", move |_| a)
        .and_then(|t| t.with("b", move |_| b))
        .unwrap();
    MarkovScheme::builder()
        .states(&["C", "O"])
        .reversible("C", "O", "a", "b")
        .build(rates)
        .unwrap()
}

/// `C ⇌ O ⇌ I` with voltage-dependent opening and a derived `I` remainder
pub fn three_state_scheme() -> MarkovScheme {
    let rates = RateTable::new()
        .with("open", |v| 0.5 * (v / 20.0).exp())
        .and_then(|t| t.with("close", |v| 0.3 * (-v / 25.0).exp()))
        .and_then(|t| t.with("inact", |_| 0.2))
        .and_then(|t| t.with("recover", |v| 0.01 * (-v / 15.0).exp()))
        .unwrap();
    MarkovScheme::builder()
        .states(&["C", "O"])
        .remainder("I")
        .reversible("C", "O", "open", "close")
        .reversible("O", "I", "inact", "recover")
        .build(rates)
        .unwrap()
}

// =================================================================================================
// Relaxing gate: dx/dt = k (1 - x)
// =================================================================================================

/// Single gate relaxing to 1, integrated through the generic path
///
/// Analytical solution: `x(t) = 1 - (1 - x0) exp(-k t)`
pub struct RelaxingGate {
    pub rate: f64,
    pub x0: f64,
    cell: StateCell,
}

impl RelaxingGate {
    pub fn new(rate: f64, x0: f64) -> Self {
        Self {
            rate,
            x0,
            cell: StateCell::zeros("x", BatchShape::Unbatched),
        }
    }

    pub fn analytical_solution(&self, t: f64) -> f64 {
        1.0 - (1.0 - self.x0) * (-self.rate * t).exp()
    }
}

impl Channel for RelaxingGate {
    fn name(&self) -> &str {
        "Relaxing Gate"
    }

    fn init_state(
        &mut self,
        _v: &DVector<f64>,
        _ion: &IonInfo,
        batch: BatchShape,
    ) -> ChannelResult<()> {
        self.cell = StateCell::zeros("x", batch);
        Ok(())
    }

    fn reset_state(&mut self, _v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
        let x0 = self.x0;
        self.cell.apply(|_| x0);
        Ok(())
    }

    fn compute_derivative(&mut self, _v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
        let k = self.rate;
        let d = self.cell.value().map(|x| k * (1.0 - x));
        self.cell.set_derivative(d)
    }

    fn current(&self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<DVector<f64>> {
        Ok(self.cell.value().component_mul(&(&ion.e - v)))
    }

    fn integration_mode(&self) -> IntegrationMode {
        IntegrationMode::Generic
    }

    fn cells(&self) -> Vec<&StateCell> {
        vec![&self.cell]
    }

    fn cells_mut(&mut self) -> Vec<&mut StateCell> {
        vec![&mut self.cell]
    }
}
