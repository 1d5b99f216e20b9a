//! Time-trace plots of clamp results
//!
//! Both functions pick the backend from the file extension: `.svg` uses
//! the SVG backend, anything else a PNG bitmap.

use crate::error::{ChannelError, ChannelResult};
use crate::output::visualization::config::{NO_TITLE, PlotConfig};
use crate::solver::SimulationResult;
use log::debug;
use plotters::prelude::*;
use std::path::Path;

/// Plot the occupancy of every recorded state (compartment 0)
///
/// `states` restricts the plot to the named states; `None` draws all.
///
/// # Example
///
/// ```rust,ignore
/// use markov_rs::output::visualization::plot_occupancy;
///
/// let result = ClampSolver::new().solve(&mut scenario, &config)?;
/// plot_occupancy(&result, Some(&["O", "B", "I6"]), "rsg.png", None)?;
/// ```
pub fn plot_occupancy(
    result: &SimulationResult,
    states: Option<&[&str]>,
    output_path: &str,
    config: Option<&PlotConfig>,
) -> ChannelResult<()> {
    let names: Vec<&str> = match states {
        Some(selected) => selected.to_vec(),
        None => result.state_names.iter().map(String::as_str).collect(),
    };

    let mut traces = Vec::with_capacity(names.len());
    for name in &names {
        let trace = result
            .occupancy_of(name)
            .ok_or_else(|| ChannelError::Export(format!("no recorded state named '{}'", name)))?;
        traces.push(trace);
    }

    let default_config = PlotConfig::occupancy(NO_TITLE);
    let config = config.unwrap_or(&default_config);
    draw(result, &traces, &names, output_path, config, (0.0, 1.0))
}

/// Plot the current trace of one compartment
pub fn plot_current(
    result: &SimulationResult,
    compartment: usize,
    output_path: &str,
    config: Option<&PlotConfig>,
) -> ChannelResult<()> {
    let trace = result.current_trace(compartment).ok_or_else(|| {
        ChannelError::Export(format!("no current recorded for compartment {}", compartment))
    })?;

    let (lo, hi) = trace
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
    let pad = ((hi - lo) * 0.05).max(1e-10);

    let default_config = PlotConfig::current(NO_TITLE);
    let config = config.unwrap_or(&default_config);
    draw(result, &[trace], &["I"], output_path, config, (lo - pad, hi + pad))
}

fn draw(
    result: &SimulationResult,
    traces: &[Vec<f64>],
    labels: &[&str],
    output_path: &str,
    config: &PlotConfig,
    y_range: (f64, f64),
) -> ChannelResult<()> {
    if result.is_empty() || traces.is_empty() {
        return Err(ChannelError::Export("nothing to plot".to_string()));
    }

    let ext = Path::new(output_path)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("png");

    let outcome = match ext {
        "svg" => {
            let backend = SVGBackend::new(output_path, (config.width, config.height));
            draw_impl(backend, &result.time_points, traces, labels, config, y_range)
        }
        _ => {
            let backend = BitMapBackend::new(output_path, (config.width, config.height));
            draw_impl(backend, &result.time_points, traces, labels, config, y_range)
        }
    };

    outcome.map_err(|e| ChannelError::Export(e.to_string()))?;
    debug!("plotted {} trace(s) to {}", traces.len(), output_path);
    Ok(())
}

fn draw_impl<DB: DrawingBackend>(
    backend: DB,
    time_points: &[f64],
    traces: &[Vec<f64>],
    labels: &[&str],
    config: &PlotConfig,
    (y_min, y_max): (f64, f64),
) -> Result<(), Box<dyn std::error::Error>>
where
    DB::ErrorType: 'static,
{
    let t_max = time_points.last().copied().unwrap_or(1.0).max(1e-10);

    let root = backend.into_drawing_area();
    root.fill(&config.background)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&config.title, ("sans-serif", 40).into_font())
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..t_max, y_min..y_max)?;

    if config.show_grid {
        chart
            .configure_mesh()
            .x_desc(&config.xlabel)
            .y_desc(&config.ylabel)
            .y_label_formatter(&|y| format!("{:.3}", y))
            .draw()?;
    }

    for (k, trace) in traces.iter().enumerate() {
        let color = if traces.len() == 1 {
            config.line_color
        } else {
            config.series_color(k)
        };
        let label = labels.get(k).copied().unwrap_or("?");

        chart
            .draw_series(LineSeries::new(
                time_points.iter().zip(trace.iter()).map(|(t, x)| (*t, *x)),
                ShapeStyle::from(&color).stroke_width(config.line_width),
            ))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;
    use tempfile::TempDir;

    fn sample() -> SimulationResult {
        let mut result = SimulationResult::new(vec!["O".to_string(), "C".to_string()]);
        for i in 0..50 {
            let o = 1.0 - (-(i as f64) * 0.1).exp();
            result.record(i as f64 * 0.1, -20.0, DVector::from_element(1, -o), vec![o, 1.0 - o]);
        }
        result
    }

    #[test]
    fn test_unknown_state_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("occ.svg");
        let outcome = plot_occupancy(&sample(), Some(&["X"]), path.to_str().unwrap(), None);
        assert!(matches!(outcome, Err(ChannelError::Export(_))));
    }

    #[test]
    fn test_plot_svg_files() {
        let dir = TempDir::new().unwrap();
        let occ = dir.path().join("occ.svg");
        let cur = dir.path().join("cur.svg");

        plot_occupancy(&sample(), None, occ.to_str().unwrap(), None).unwrap();
        plot_current(&sample(), 0, cur.to_str().unwrap(), None).unwrap();
        assert!(occ.exists());
        assert!(cur.exists());
    }

    #[test]
    fn test_missing_compartment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cur.svg");
        assert!(plot_current(&sample(), 3, path.to_str().unwrap(), None).is_err());
    }
}
