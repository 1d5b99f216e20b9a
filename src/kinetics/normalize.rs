//! Conservation normalizer
//!
//! Numerical drift pushes occupancies slightly negative or off the unit
//! simplex. The normalizer projects them back:
//!
//! ```text
//! r     = 1 − Σ tracked            (only when the scheme has a remainder)
//! x_i   = max(x_i, 0),  r = max(r, 0)
//! total = Σ x_i + r
//! x_i  /= total + ε                (ε = 1e-12)
//! ```
//!
//! After the call, every tracked value is ≥ 0 and `Σ tracked + remainder`
//! equals 1 up to ε. When every value was clamped to zero and there is no
//! remainder, the values stay zero (nothing to renormalize).

use crate::error::{ChannelError, ChannelResult};
use crate::physics::StateCell;
use log::warn;
use nalgebra::DMatrix;

/// Guard added to the total before dividing
pub const NORMALIZATION_EPSILON: f64 = 1e-12;

/// Clamp-and-rescale projection onto the probability simplex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    epsilon: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            epsilon: NORMALIZATION_EPSILON,
        }
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Normalize the tracked cells of one channel in place
    ///
    /// `has_remainder` tells whether a derived remainder state closes the
    /// population. All cells must share one batch length.
    pub fn normalize(
        &self,
        cells: &mut [&mut StateCell],
        has_remainder: bool,
    ) -> ChannelResult<()> {
        let Some(first) = cells.first() else {
            return Ok(());
        };
        let m = first.len();
        if let Some(bad) = cells.iter().find(|c| c.len() != m) {
            return Err(ChannelError::shape(
                format!("normalizing '{}'", bad.name()),
                m,
                bad.len(),
            ));
        }

        for k in 0..m {
            let tracked: f64 = cells.iter().map(|c| c.value()[k]).sum();
            let total =
                self.clamped_total(tracked, cells.iter().map(|c| c.value()[k]), has_remainder);
            self.report_degenerate(total, k, has_remainder);
            for cell in cells.iter_mut() {
                let x = cell.value()[k].max(0.0);
                cell.value_mut()[k] = x / (total + self.epsilon);
            }
        }
        Ok(())
    }

    /// Normalize a stacked `N × M` matrix (one column per compartment)
    pub fn normalize_matrix(&self, states: &mut DMatrix<f64>, has_remainder: bool) {
        for (k, mut column) in states.column_iter_mut().enumerate() {
            let tracked = column.sum();
            let total = self.clamped_total(tracked, column.iter().copied(), has_remainder);
            self.report_degenerate(total, k, has_remainder);
            column
                .iter_mut()
                .for_each(|x| *x = (*x).max(0.0) / (total + self.epsilon));
        }
    }

    /// `Σ max(x, 0) + max(r, 0)` for one compartment
    fn clamped_total(
        &self,
        tracked_sum: f64,
        values: impl Iterator<Item = f64>,
        has_remainder: bool,
    ) -> f64 {
        let remainder = if has_remainder {
            (1.0 - tracked_sum).max(0.0)
        } else {
            0.0
        };
        values.map(|x| x.max(0.0)).sum::<f64>() + remainder
    }

    fn report_degenerate(&self, total: f64, compartment: usize, has_remainder: bool) {
        if total <= self.epsilon && !has_remainder {
            warn!(
                "Normalizer: all occupancies clamped to zero in compartment {}",
                compartment
            );
        }
    }
}
