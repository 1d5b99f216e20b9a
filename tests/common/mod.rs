//! Common utilities for integration tests

pub mod mock_models;
pub mod test_helpers;

// Re-export commonly used items
pub use mock_models::{RelaxingGate, three_state_scheme, two_state_scheme};
pub use test_helpers::{
    adversarial_states, assert_column_sums, clamp_scenario, relative_error,
};
