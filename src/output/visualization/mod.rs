//! Visualization of clamp results using the `plotters` library
//!
//! - **config**: shared plot configuration (`PlotConfig`)
//! - **traces**: occupancy and current over time
//!
//! | Use Case | Function |
//! |----------|----------|
//! | State occupancies vs time | `plot_occupancy` |
//! | Current of one compartment vs time | `plot_current` |

pub mod config;
pub mod traces;

pub use config::{NO_TITLE, PlotConfig};
pub use traces::{plot_current, plot_occupancy};
