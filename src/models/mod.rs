//! Concrete channel models and ion species
//!
//! All channels implement the [`Channel`](crate::physics::Channel) trait.
//! The lifecycle calls the hooks at each time step: channels are
//! responsible for the kinetics (rates, derivatives, current), the solver
//! for the time integration.
//!
//! # Available Models
//!
//! ## [`MarkovChannel`]: any linear kinetic scheme
//!
//! Wraps a [`MarkovScheme`](crate::kinetics::MarkovScheme) with open
//! state(s) and a maximal conductance. Integrated implicitly by default.
//!
//! ## [`ResurgentSodium`]: 13-state resurgent sodium
//!
//! Closed, inactivated, open and blocked states with a derived `I6`
//! remainder. Stiff at physiological step sizes.
//!
//! ## [`SodiumP3q`]: Hodgkin-Huxley style sodium
//!
//! Two gates with three published rate laws ([`P3qRateLaw`]). Advanced by
//! the generic integrator.
//!
//! # Ions
//!
//! [`FixedIon`] owns the channel lifecycles carrying one ion species and
//! supplies them with a constant reversal potential and concentration.

// =================================================================================================
// Module Declarations
// =================================================================================================

pub mod ion;
pub mod markov;
pub mod rsg;
pub mod sodium;

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use ion::FixedIon;
pub use markov::MarkovChannel;
pub use rsg::{RSG_REMAINDER, RSG_STATES, ResurgentSodium, RsgParams};
pub use sodium::{P3qParams, P3qRateLaw, SodiumP3q};
