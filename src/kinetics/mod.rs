//! Markov kinetics
//!
//! Building blocks for kinetic channel models:
//!
//! - **`rates`**: transition-name → rate law registry (`RateTable`) and
//!   helpers for singular rate formulas
//! - **`scheme`**: linear kinetic scheme `dS/dt = F(S, V)` over named states
//!   with an optional derived remainder (`MarkovScheme`)
//! - **`normalize`**: clamp-and-rescale projection keeping occupancies on
//!   the probability simplex (`Normalizer`)
//!
//! The implicit step that advances a scheme lives in
//! [`solver::methods::implicit`](crate::solver::methods::implicit).

pub mod normalize;
pub mod rates;
pub mod scheme;

pub use normalize::{NORMALIZATION_EPSILON, Normalizer};
pub use rates::{RateFn, RateTable, exprel, q10_factor};
pub use scheme::{
    MarkovScheme, Node, Occupancy, SchemeBuilder, Transition, stack_cells, unstack_into,
};
