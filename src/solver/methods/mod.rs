//! Numerical methods that advance state cells
//!
//! # Available Methods
//!
//! - **[`ForwardEuler`]**: explicit first-order integrator, implements
//!   [`Integrator`] and serves every channel in
//!   [`IntegrationMode::Generic`](crate::physics::IntegrationMode)
//!   - Cost: 1 derivative evaluation per step
//!   - Conditionally stable
//!
//! - **[`ImplicitStepSolver`]**: Jacobian-linearized backward Euler for
//!   [`MarkovScheme`](crate::kinetics::MarkovScheme)s, used by channels in
//!   `IntegrationMode::Implicit`
//!   - Cost: N dual-number passes plus one N × N LU solve per compartment
//!   - Unconditionally stable for linear kinetics
//!
//! Both are stateless and can be shared between channels.

pub mod euler;
pub mod implicit;

pub use crate::solver::traits::Integrator;
pub use euler::ForwardEuler;
pub use implicit::{ImplicitStepSolver, Linearization};
