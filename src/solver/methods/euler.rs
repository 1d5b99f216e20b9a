//! Forward Euler integrator
//!
//! # Mathematical Background
//!
//! The Forward Euler method is the simplest explicit time-stepping scheme
//! for `dy/dt = f(y)`:
//!
//! ```text
//! y_{n+1} = y_n + dt * f(y_n)
//! ```
//!
//! # Characteristics
//!
//! - **Order**: First-order accurate (error ~ O(dt))
//! - **Stability**: Conditionally stable, `|1 + λ dt| ≤ 1`
//! - **Complexity**: 1 derivative evaluation per step
//!
//! # When NOT to Use
//!
//! Markov schemes with fast transitions are stiff: their fastest eigenvalue
//! can exceed 1000 /ms, which bounds `dt` well below 2 µs. Those channels
//! declare [`IntegrationMode::Implicit`](crate::physics::IntegrationMode)
//! and bypass this integrator.
//!
//! # Example
//!
//! ```rust
//! use markov_rs::physics::{BatchShape, StateCell};
//! use markov_rs::solver::{ForwardEuler, Integrator};
//! use nalgebra::DVector;
//!
//! let mut cell = StateCell::filled("p", BatchShape::Unbatched, 0.5);
//! cell.set_derivative(DVector::from_element(1, 2.0)).unwrap();
//!
//! ForwardEuler::new().advance(&mut cell, 0.1).unwrap();
//! assert!((cell.value()[0] - 0.7).abs() < 1e-12);
//! ```

use crate::error::ChannelResult;
use crate::physics::StateCell;
use crate::solver::traits::Integrator;

// =================================================================================================
// Forward Euler
// =================================================================================================

/// Explicit first-order integrator for cells in generic integration mode
///
/// Consumes the derivative filled by
/// [`Channel::compute_derivative`](crate::physics::Channel::compute_derivative)
/// and writes `value + dt * derivative`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardEuler;

impl ForwardEuler {
    pub fn new() -> Self {
        Self
    }
}

impl Integrator for ForwardEuler {
    fn advance(&self, cell: &mut StateCell, dt: f64) -> ChannelResult<()> {
        let next = cell.value() + cell.derivative() * dt;
        cell.set_value(next)
    }

    fn name(&self) -> &str {
        "Forward Euler"
    }
}

// =================================================================================================
// Tests
// =================================================================================================
