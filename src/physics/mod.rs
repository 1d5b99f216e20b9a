//! Channel contract and state containers
//!
//! This module provides the traits and data types every channel model is
//! built from.
//!
//! # Core Concepts
//!
//! - **State Cell**: one differential variable (value + derivative) per
//!   conformational state, batched over compartments
//! - **Channel**: the base kinetics contract (lifecycle hooks, derivative,
//!   current)
//! - **Ion Info**: reversal potential and concentration supplied by the
//!   owning ion species
//!
//! # Architecture
//!
//! Channel models are **separate from numerical solvers**:
//! - The channel provides the **equations** (derivatives, current)
//! - The solver provides the **method** to advance them (explicit Euler,
//!   Jacobian-linearized backward Euler)
//!
//! # Unit convention
//!
//! Plain magnitudes only: mV, ms, 1/ms, mS/cm², µA/cm². Unit checking is the
//! caller's job.
//!
//! # Example
//!
//! ```rust
//! use markov_rs::physics::{BatchShape, Channel, IonInfo};
//! use markov_rs::models::ResurgentSodium;
//! use nalgebra::DVector;
//!
//! # fn main() -> Result<(), markov_rs::error::ChannelError> {
//! let mut channel = ResurgentSodium::new(Default::default())?;
//! let v = DVector::from_element(2, -65.0);
//! let ion = IonInfo::uniform(BatchShape::Batched(2), 50.0, 10.0);
//!
//! channel.init_state(&v, &ion, BatchShape::Batched(2))?;
//! channel.reset_state(&v, &ion)?;
//! let current = channel.current(&v, &ion)?;
//! assert_eq!(current.len(), 2);
//! # Ok(())
//! # }
//! ```

// module declaration
pub mod data;
pub mod traits;

// re-export commonly used types for convenience
pub use data::{BatchShape, StateCell};
pub use traits::{Channel, IntegrationMode, IonInfo};
