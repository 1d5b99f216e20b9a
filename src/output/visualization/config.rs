//! Plot configuration shared across visualization functions

use plotters::prelude::*;

/// Configuration for customizing plots
///
/// # Example
///
/// ```rust
/// use markov_rs::output::visualization::PlotConfig;
/// use plotters::prelude::*;
///
/// let mut config = PlotConfig::occupancy("Rsg at -10 mV");
/// config.series_colors = Some(vec![RED, BLUE, GREEN]);
/// config.width = 1920;
/// assert_eq!(config.ylabel, "Occupancy");
/// ```
#[derive(Clone)]
pub struct PlotConfig {
    /// Image width in pixels (default: 1024)
    pub width: u32,

    /// Image height in pixels (default: 768)
    pub height: u32,

    pub title: String,

    pub xlabel: String,

    pub ylabel: String,

    /// Line color for single-trace plots (default: RED)
    pub line_color: RGBColor,

    /// Colors for multi-trace plots; falls back to a built-in palette
    pub series_colors: Option<Vec<RGBColor>>,

    pub background: RGBColor,

    /// Line width in pixels (default: 2)
    pub line_width: u32,

    pub show_grid: bool,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            title: "Plot".to_string(),
            xlabel: "Time (ms)".to_string(),
            ylabel: String::new(),
            line_color: RED,
            series_colors: None,
            background: WHITE,
            line_width: 2,
            show_grid: true,
        }
    }
}

/// Accepts both titles and `None` where a title is optional
pub trait IntoOptionalTitle {
    fn into_optional_title(self) -> Option<String>;
}

impl IntoOptionalTitle for &str {
    fn into_optional_title(self) -> Option<String> {
        Some(self.to_string())
    }
}

impl IntoOptionalTitle for String {
    fn into_optional_title(self) -> Option<String> {
        Some(self)
    }
}

impl<T: IntoOptionalTitle> IntoOptionalTitle for Option<T> {
    fn into_optional_title(self) -> Option<String> {
        self.and_then(|t| t.into_optional_title())
    }
}

/// Use the default title
pub const NO_TITLE: Option<&str> = None;

impl PlotConfig {
    /// State occupancies over time
    pub fn occupancy(title: impl IntoOptionalTitle) -> Self {
        Self {
            ylabel: "Occupancy".to_string(),
            title: title
                .into_optional_title()
                .unwrap_or_else(|| "State Occupancy".to_string()),
            ..Self::default()
        }
    }

    /// Membrane current over time
    pub fn current(title: impl IntoOptionalTitle) -> Self {
        Self {
            ylabel: "Current".to_string(),
            title: title
                .into_optional_title()
                .unwrap_or_else(|| "Channel Current".to_string()),
            ..Self::default()
        }
    }

    /// Color of the `index`-th trace
    pub(crate) fn series_color(&self, index: usize) -> RGBColor {
        if let Some(colors) = &self.series_colors {
            if index < colors.len() {
                return colors[index];
            }
        }

        const PALETTE: [RGBColor; 12] = [
            RED,
            BLUE,
            GREEN,
            MAGENTA,
            CYAN,
            BLACK,
            RGBColor(255, 165, 0),
            RGBColor(128, 0, 128),
            RGBColor(255, 192, 203),
            RGBColor(165, 42, 42),
            RGBColor(0, 128, 128),
            RGBColor(128, 128, 0),
        ];
        PALETTE[index % PALETTE.len()]
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_config_default() {
        let config = PlotConfig::default();
        assert_eq!(config.width, 1024);
        assert_eq!(config.height, 768);
        assert_eq!(config.xlabel, "Time (ms)");
        assert!(config.show_grid);
    }

    #[test]
    fn test_occupancy_config() {
        let config = PlotConfig::occupancy(NO_TITLE);
        assert_eq!(config.title, "State Occupancy");
        assert_eq!(config.ylabel, "Occupancy");

        let config = PlotConfig::occupancy(format!("V = {} mV", -10));
        assert_eq!(config.title, "V = -10 mV");
    }

    #[test]
    fn test_current_config() {
        let config = PlotConfig::current("INa");
        assert_eq!(config.title, "INa");
        assert_eq!(config.ylabel, "Current");
    }

    #[test]
    fn test_palette_wraps_and_custom_colors() {
        let config = PlotConfig::default();
        assert_eq!(config.series_color(0), RED);
        assert_eq!(config.series_color(12), RED);

        let config = PlotConfig {
            series_colors: Some(vec![GREEN]),
            ..PlotConfig::default()
        };
        assert_eq!(config.series_color(0), GREEN);
        assert_eq!(config.series_color(1), BLUE);
    }
}
