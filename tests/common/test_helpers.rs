//! Helper functions for integration tests

use markov_rs::models::FixedIon;
use markov_rs::physics::Channel;
use markov_rs::solver::{ChannelLifecycle, Scenario, VoltageProtocol};
use nalgebra::DMatrix;

/// Assert that every column of `states` sums to `expected` within `tolerance`
pub fn assert_column_sums(states: &DMatrix<f64>, expected: f64, tolerance: f64, message: &str) {
    for (k, column) in states.column_iter().enumerate() {
        let sum: f64 = column.iter().sum();
        assert!(
            (sum - expected).abs() < tolerance,
            "{}: compartment {} sums to {} (expected {}, tolerance {})",
            message,
            k,
            sum,
            expected,
            tolerance
        );
    }
}

/// Relative error, falling back to the absolute error near zero
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    if expected.abs() < 1e-15 {
        (actual - expected).abs()
    } else {
        ((actual - expected) / expected).abs()
    }
}

/// Deterministic `n × m` matrix of poorly conditioned occupancies
///
/// Mixes negative entries, tiny values and columns whose sums are far from
/// one. `seed` selects the pattern.
pub fn adversarial_states(n: usize, m: usize, seed: u64) -> DMatrix<f64> {
    let mut x = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    DMatrix::from_fn(n, m, |_, _| {
        x = x
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let u = (x >> 11) as f64 / (1u64 << 53) as f64;
        match x % 5 {
            0 => -0.3 * u,
            1 => 1e-14 * u,
            2 => 3.0 * u,
            _ => u,
        }
    })
}

/// Scenario with one channel on a sodium ion
pub fn clamp_scenario(channel: Box<dyn Channel>, protocol: VoltageProtocol) -> Scenario {
    let ion = FixedIon::sodium().with_channel(ChannelLifecycle::new(channel));
    Scenario::new(ion, protocol)
}
