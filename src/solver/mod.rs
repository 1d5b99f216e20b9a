//! Numerical solvers
//!
//! This module provides everything that advances channel state in time.
//!
//! # Core Concepts
//!
//! ## The Architecture (WHAT vs HOW)
//!
//! 1. **Channel** (`physics::Channel`) - WHAT evolves
//!    - State cells and their derivatives
//!    - Current as a function of state
//!
//! 2. **Lifecycle** (`ChannelLifecycle`) - WHEN hooks run
//!    - Phase tracking (Uninitialized, Ready, Stepping, Disposed)
//!    - Strict per-step order: pre-integration, derivative, update,
//!      post-integration
//!
//! 3. **Methods** (`methods`) - HOW cells advance
//!    - `ForwardEuler`: generic explicit integrator
//!    - `ImplicitStepSolver`: Jacobian-linearized backward Euler for
//!      linear kinetic schemes
//!
//! 4. **Clamp runs** (`Scenario`, `ClampSolver`) - a full voltage-clamp
//!    simulation returning a `SimulationResult`
//!
//! # Module Organization
//!
//! - **`traits`**: `Solver` trait, `SolverConfiguration`, `SimulationResult`
//! - **`lifecycle`**: `ChannelLifecycle` and `LifecyclePhase`
//! - **`protocol`**: `VoltageProtocol` (holding and step commands)
//! - **`scenario`**: `Scenario` = ion with its channels + protocol + batch
//! - **`clamp`**: `ClampSolver`
//! - **`methods`**: numerical methods
//!
//! # Quick Start Example
//!
//! ```rust
//! use markov_rs::models::{FixedIon, ResurgentSodium};
//! use markov_rs::solver::{
//!     ChannelLifecycle, ClampSolver, Scenario, Solver, SolverConfiguration, VoltageProtocol,
//! };
//!
//! # fn main() -> Result<(), markov_rs::error::ChannelError> {
//! let channel = ResurgentSodium::new(Default::default())?;
//! let sodium = FixedIon::sodium().with_channel(ChannelLifecycle::new(Box::new(channel)));
//! let protocol = VoltageProtocol::steps(-80.0, vec![(1.0, -10.0)])?;
//!
//! let mut scenario = Scenario::new(sodium, protocol);
//! let config = SolverConfiguration::time_evolution(5.0, 500);
//!
//! let result = ClampSolver::new().solve(&mut scenario, &config)?;
//! assert_eq!(result.len(), 501);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Every entry point returns [`ChannelResult`](crate::error::ChannelResult).
//! Common errors:
//! - invalid configuration (non-positive time, zero steps)
//! - lifecycle calls in the wrong phase
//! - numerical instability (singular system, NaN or Inf values)

// =================================================================================================
// Module Declarations
// =================================================================================================
pub mod clamp;
pub mod lifecycle;
pub mod methods;
pub mod protocol;
pub mod scenario;
pub mod traits;

// =================================================================================================
// Parallel Execution Threshold
// =================================================================================================
//
// Deciding when to hand work off to Rayon is a numerical-execution concern,
// so it lives here rather than in physics/data.rs. The value is read on every
// batched operation; relaxed ordering is enough for a performance hint.
// =================================================================================================

use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of compartments above which batched work goes parallel
///
/// Each compartment of the implicit step costs one small LU factorization,
/// so the crossover is lower than for plain elementwise work.
const DEFAULT_PARALLEL_THRESHOLD: usize = 255;

static PARALLEL_THRESHOLD: AtomicUsize = AtomicUsize::new(DEFAULT_PARALLEL_THRESHOLD);

/// Return the current parallel-execution threshold.
///
/// Batched operations run sequentially when they span fewer compartments
/// than this value and switch to Rayon above it, but only when the crate is
/// compiled with the `parallel` feature.
///
/// # Example
///
/// ```rust
/// use markov_rs::solver::parallel_threshold;
///
/// assert!(parallel_threshold() > 0);
/// ```
pub fn parallel_threshold() -> usize {
    PARALLEL_THRESHOLD.load(Ordering::Relaxed)
}

/// Set the parallel-execution threshold to a new value.
///
/// # Panics
///
/// Panics when `threshold == 0`.
///
/// # Example
///
/// ```rust
/// use markov_rs::solver::{parallel_threshold, set_parallel_threshold};
///
/// let previous = parallel_threshold();
/// set_parallel_threshold(2048);
/// assert_eq!(parallel_threshold(), 2048);
///
/// set_parallel_threshold(previous);
/// ```
pub fn set_parallel_threshold(threshold: usize) {
    assert!(threshold > 0, "parallel threshold must be at least 1");
    PARALLEL_THRESHOLD.store(threshold, Ordering::Relaxed);
}

/// RAII guard that saves the current threshold on construction and restores
/// it on drop.
///
/// Guards are serialized through a global lock, so tests changing the
/// threshold never observe each other's values. Only compiled in test builds.
///
/// ```rust,ignore
/// let _guard = crate::solver::ThresholdGuard::save(50);
/// // threshold is now 50 and is restored when _guard is dropped
/// ```
#[cfg(test)]
pub(crate) struct ThresholdGuard {
    previous: usize,
    _lock: std::sync::MutexGuard<'static, ()>,
}

#[cfg(test)]
static THRESHOLD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
impl ThresholdGuard {
    pub(crate) fn save(new_value: usize) -> Self {
        // a test that panicked while holding the lock already restored the value
        let lock = THRESHOLD_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = parallel_threshold();
        set_parallel_threshold(new_value);
        Self {
            previous,
            _lock: lock,
        }
    }
}

#[cfg(test)]
impl Drop for ThresholdGuard {
    fn drop(&mut self) {
        PARALLEL_THRESHOLD.store(self.previous, Ordering::Relaxed);
    }
}

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use clamp::ClampSolver;
pub use lifecycle::{ChannelLifecycle, LifecyclePhase};
pub use methods::{ForwardEuler, ImplicitStepSolver, Integrator, Linearization};
pub use protocol::VoltageProtocol;
pub use scenario::Scenario;
pub use traits::{SimulationResult, Solver, SolverConfiguration};

// =================================================================================================
// Helper Functions
// =================================================================================================

use crate::error::{ChannelError, ChannelResult};
use crate::physics::StateCell;

/// Check every cell for NaN or Inf values
///
/// `step` is only used in the error message.
pub(crate) fn validate_cells(cells: &[&StateCell], step: usize) -> ChannelResult<()> {
    for cell in cells {
        if let Some(k) = cell.value().iter().position(|x| !x.is_finite()) {
            return Err(ChannelError::instability(
                k,
                format!(
                    "non-finite value in '{}' at step {}; try a smaller time step",
                    cell.name(),
                    step
                ),
            ));
        }
    }
    Ok(())
}

// =================================================================================================
// Tests
// =================================================================================================
