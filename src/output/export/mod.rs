//! Export module for simulation results.
//!
//! # Architecture
//!
//! This module defines the [`Exporter`] trait that abstracts the export format.
//! Each format is an independent implementation in its own sub-module.
//!
//! # Available formats
//!
//! | Format  | Module          |
//! |---------|-----------------|
//! | CSV     | [`csv`]         |
//!
//! # Usage example
//!
//! ```rust,no_run
//! use markov_rs::models::{FixedIon, ResurgentSodium};
//! use markov_rs::output::export::{CsvExporter, Exporter};
//! use markov_rs::solver::{
//!     ChannelLifecycle, ClampSolver, Scenario, Solver, SolverConfiguration, VoltageProtocol,
//! };
//!
//! # fn main() -> Result<(), markov_rs::error::ChannelError> {
//! let rsg = ResurgentSodium::new(Default::default())?;
//! let sodium = FixedIon::sodium().with_channel(ChannelLifecycle::new(Box::new(rsg)));
//! let mut scenario = Scenario::new(sodium, VoltageProtocol::steps(-90.0, vec![(1.0, -10.0)])?);
//! let config = SolverConfiguration::time_evolution(10.0, 400);
//! let result = ClampSolver::new().solve(&mut scenario, &config)?;
//!
//! let exporter = CsvExporter::default();
//!
//! // Full export (all recorded points)
//! exporter.export(&result, None, "rsg.csv")?;
//!
//! // Downsampled export to 100 points
//! exporter.export(&result, Some(100), "rsg_light.csv")?;
//! # Ok(())
//! # }
//! ```

pub mod csv;

pub use csv::{CsvConfig, CsvExporter};

use crate::error::{ChannelError, ChannelResult};
use crate::solver::SimulationResult;

/// Abstraction trait for all export formats.
///
/// # Parameter `n_points`
///
/// - `None`: exports every recorded point
/// - `Some(n)`: uniformly downsamples to `n` points, always keeping the
///   **first and last** points
pub trait Exporter {
    /// Error type specific to this export format.
    type Error: std::error::Error;

    /// Writes `result` to `path`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the path is invalid or the directory does not exist
    /// - `result` contains no data
    /// - `n_points` is below 2
    fn export(
        &self,
        result: &SimulationResult,
        n_points: Option<usize>,
        path: &str,
    ) -> Result<(), Self::Error>;
}

/// Indices of the rows kept when downsampling `len` rows to `n_points`
///
/// The first and last rows are always present; indices are strictly
/// increasing.
pub fn downsample_indices(len: usize, n_points: Option<usize>) -> ChannelResult<Vec<usize>> {
    let n = match n_points {
        None => return Ok((0..len).collect()),
        Some(n) if n < 2 => {
            return Err(ChannelError::Export(format!(
                "cannot downsample to {} point(s), at least 2 are needed",
                n
            )));
        }
        Some(n) if n >= len => return Ok((0..len).collect()),
        Some(n) => n,
    };

    let last = len - 1;
    let mut indices: Vec<usize> = (0..n)
        .map(|i| ((i as f64) * (last as f64) / ((n - 1) as f64)).round() as usize)
        .collect();
    indices.dedup();
    Ok(indices)
}
