//! Output module for simulation results
//!
//! - **Export**: CSV data export for external analysis
//! - **Visualization**: PNG/SVG plots using plotters (feature `visualization`)
//!
//! ```text
//! output/
//! ├── mod.rs
//! ├── export/             ← Data export
//! │   ├── mod.rs          (Exporter trait, downsampling)
//! │   └── csv.rs
//! └── visualization/      ← Plots
//!     ├── mod.rs
//!     ├── config.rs
//!     └── traces.rs
//! ```

pub mod export;

#[cfg(feature = "visualization")]
pub mod visualization;

pub use export::{CsvConfig, CsvExporter, Exporter};

#[cfg(feature = "visualization")]
pub use visualization::{PlotConfig, plot_current, plot_occupancy};
