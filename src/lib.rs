//! markov-rs: stiff kinetic ion-channel integration
//!
//! Channel gating is modelled as a linear Markov scheme over conformational
//! states with voltage-dependent rates. Schemes with large rate constants are
//! stiff, so the crate advances them with a Jacobian-linearized backward
//! Euler step, keeps total occupancy at one, and drives every channel through
//! a strict lifecycle.
//!
//! # Architecture
//!
//! 1. **Separation of kinetics and numerics**
//!    - Channels and kinetic schemes define the equations (what to solve)
//!    - Solvers provide methods (how to solve)
//!
//! 2. **Batched compartments**
//!    - Every state cell carries one value per compartment
//!    - Compartments are independent and may be solved in parallel
//!      (feature `parallel`)
//!
//! # Quick Start
//!
//! ```rust
//! use markov_rs::prelude::*;
//!
//! # fn main() -> Result<(), ChannelError> {
//! // 1. Channel on its ion species
//! let rsg = ResurgentSodium::new(RsgParams::default())?;
//! let sodium = FixedIon::sodium().with_channel(ChannelLifecycle::new(Box::new(rsg)));
//!
//! // 2. Hold at -90 mV, step to -10 mV after 1 ms
//! let protocol = VoltageProtocol::steps(-90.0, vec![(1.0, -10.0)])?;
//! let mut scenario = Scenario::new(sodium, protocol);
//!
//! // 3. Run 10 ms with dt = 0.025 ms
//! let config = SolverConfiguration::time_evolution(10.0, 400);
//! let result = ClampSolver::new().solve(&mut scenario, &config)?;
//!
//! // 4. Access results
//! let open = result.occupancy_of("O").unwrap_or_default();
//! assert_eq!(open.len(), result.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`physics`]: state cells and the channel contract
//! - [`kinetics`]: rate tables, kinetic schemes, normalization
//! - [`models`]: concrete channels and ion species
//! - [`solver`]: integrators, implicit step, lifecycle, clamp runs
//! - [`output`]: CSV export and plots (plots behind `visualization`)
//! - [`error`]: crate error type

// Core modules
pub mod error;
pub mod kinetics;
pub mod physics;

pub mod models;
pub mod solver;

pub mod output;

pub mod prelude {
    //! Convenient imports for common usage
    //!
    //! ```rust
    //! use markov_rs::prelude::*;
    //! ```
    pub use crate::error::{ChannelError, ChannelResult};
    pub use crate::kinetics::{MarkovScheme, Normalizer, RateTable};
    pub use crate::models::{
        FixedIon, MarkovChannel, P3qParams, P3qRateLaw, ResurgentSodium, RsgParams, SodiumP3q,
    };
    pub use crate::physics::{BatchShape, Channel, IntegrationMode, IonInfo, StateCell};
    pub use crate::solver::{
        ChannelLifecycle, ClampSolver, ForwardEuler, ImplicitStepSolver, Integrator,
        LifecyclePhase, Scenario, SimulationResult, Solver, SolverConfiguration, VoltageProtocol,
    };
}
