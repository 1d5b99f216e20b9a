//! CSV export of voltage-clamp results
//!
//! One row per recorded time point:
//!
//! ```csv
//! # Markov Channel Simulation Data
//! # Generated: 2026-02-11T15:30:00+00:00
//! # channels: INa_Rsg
//! # solver: Voltage Clamp
//! #
//! Time (ms),Voltage (mV),Current,C1,C2,...,B
//! 0.000000,-65.000000,-0.001234,0.412000,...
//! ```
//!
//! Batched runs get one current column per compartment (`Current[k]`).
//! Occupancies are those of compartment 0, as recorded by the solver.

use crate::error::{ChannelError, ChannelResult};
use crate::output::export::{Exporter, downsample_indices};
use crate::solver::SimulationResult;
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for CSV export
///
/// # Example
///
/// ```rust
/// use markov_rs::output::export::CsvConfig;
///
/// let config = CsvConfig {
///     delimiter: ';',
///     precision: 10,
///     ..Default::default()
/// };
/// assert!(config.include_metadata);
/// ```
#[derive(Debug, Clone)]
pub struct CsvConfig {
    /// Column delimiter (default: ',')
    pub delimiter: char,

    /// Decimal separator (default: '.')
    pub decimal_separator: char,

    /// Number of decimal places (default: 6)
    pub precision: usize,

    /// Write `#` header comments with the result metadata (default: true)
    pub include_metadata: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            decimal_separator: '.',
            precision: 6,
            include_metadata: true,
        }
    }
}

impl CsvConfig {
    /// Semicolon delimiter, comma decimal separator
    pub fn european() -> Self {
        Self {
            delimiter: ';',
            decimal_separator: ',',
            ..Default::default()
        }
    }

    pub fn high_precision() -> Self {
        Self {
            precision: 12,
            ..Default::default()
        }
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn without_metadata(mut self) -> Self {
        self.include_metadata = false;
        self
    }

    fn format(&self, value: f64) -> String {
        let formatted = format!("{:.prec$}", value, prec = self.precision);
        if self.decimal_separator != '.' {
            formatted.replace('.', &self.decimal_separator.to_string())
        } else {
            formatted
        }
    }
}

// =============================================================================
// Exporter
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct CsvExporter {
    pub config: CsvConfig,
}

impl CsvExporter {
    pub fn new(config: CsvConfig) -> Self {
        Self { config }
    }

    /// Column headers for `result`
    pub fn headers(&self, result: &SimulationResult) -> Vec<String> {
        let compartments = result.current.first().map_or(1, |c| c.len());

        let mut headers = vec!["Time (ms)".to_string(), "Voltage (mV)".to_string()];
        if compartments == 1 {
            headers.push("Current".to_string());
        } else {
            headers.extend((0..compartments).map(|k| format!("Current[{}]", k)));
        }
        headers.extend(result.state_names.iter().cloned());
        headers
    }

    fn validate(&self, result: &SimulationResult) -> ChannelResult<()> {
        if result.is_empty() {
            return Err(ChannelError::Export("result contains no data".to_string()));
        }
        let n = result.len();
        if result.voltage.len() != n || result.current.len() != n || result.occupancy.len() != n {
            return Err(ChannelError::Export(format!(
                "inconsistent result: {} time points, {} voltages, {} currents, {} occupancy rows",
                n,
                result.voltage.len(),
                result.current.len(),
                result.occupancy.len()
            )));
        }
        Ok(())
    }

    fn write_metadata<W: Write>(
        &self,
        out: &mut W,
        result: &SimulationResult,
    ) -> ChannelResult<()> {
        writeln!(out, "# Markov Channel Simulation Data")?;
        writeln!(out, "# Generated: {}", chrono::Utc::now().to_rfc3339())?;

        let mut keys: Vec<&String> = result.metadata.keys().collect();
        keys.sort();
        for key in keys {
            writeln!(out, "# {}: {}", key, result.metadata[key])?;
        }
        writeln!(out, "#")?;
        Ok(())
    }

    /// Write `result` to any writer
    pub fn write<W: Write>(
        &self,
        out: &mut W,
        result: &SimulationResult,
        n_points: Option<usize>,
    ) -> ChannelResult<()> {
        self.validate(result)?;
        let rows = downsample_indices(result.len(), n_points)?;
        let sep = self.config.delimiter.to_string();

        if self.config.include_metadata {
            self.write_metadata(out, result)?;
        }
        writeln!(out, "{}", self.headers(result).join(&sep))?;

        for i in rows {
            let mut fields = vec![
                self.config.format(result.time_points[i]),
                self.config.format(result.voltage[i]),
            ];
            fields.extend(result.current[i].iter().map(|&x| self.config.format(x)));
            fields.extend(result.occupancy[i].iter().map(|&x| self.config.format(x)));
            writeln!(out, "{}", fields.join(&sep))?;
        }
        Ok(())
    }
}

impl Exporter for CsvExporter {
    type Error = ChannelError;

    fn export(
        &self,
        result: &SimulationResult,
        n_points: Option<usize>,
        path: &str,
    ) -> Result<(), Self::Error> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write(&mut out, result, n_points)?;
        out.flush()?;
        debug!("exported {} point(s) to {}", result.len(), path);
        Ok(())
    }
}

// =================================================================================================
// Tests
// =================================================================================================
