//! SVG line charts of training histories
//!
//! Renders per-epoch metric series from a [`TrainingHistory`] into a
//! standalone SVG file that opens in any browser.

use std::fs;
use std::path::Path;

use crate::persistence::TrainingHistory;
use crate::utils::error::{FlowerError, Result};

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 500.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 160.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 80.0;
const GRID_LINES: usize = 5;

const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// Series colors, cycled when more metrics are plotted
const PALETTE: [&str; 6] = ["#3498db", "#2ecc71", "#e74c3c", "#9b59b6", "#f39c12", "#1abc9c"];

/// One named series of per-epoch values
#[derive(Debug, Clone)]
pub struct DataSeries {
    pub name: String,
    pub values: Vec<f64>,
    pub color: String,
}

/// Write the chosen metrics of `history` as an SVG line chart
///
/// An empty `metrics` slice plots every recorded metric.
pub fn write_history_chart(
    history: &TrainingHistory,
    metrics: &[&str],
    title: &str,
    output_path: &Path,
) -> Result<()> {
    let names: Vec<&str> = if metrics.is_empty() {
        history.metric_names()
    } else {
        metrics.to_vec()
    };

    let mut series = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let values = history.get(name).ok_or_else(|| {
            FlowerError::NotFound(format!("Metric '{}' is not in the history", name))
        })?;
        series.push(DataSeries {
            name: name.to_string(),
            values: values.to_vec(),
            color: PALETTE[i % PALETTE.len()].to_string(),
        });
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, render_line_chart(title, "Epoch", "Value", &series))?;
    Ok(())
}

/// Render series as an SVG document, epochs numbered from 1
pub fn render_line_chart(title: &str, x_label: &str, y_label: &str, series: &[DataSeries]) -> String {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let epochs = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
    let (y_min, y_max) = value_range(series);
    let x_span = (epochs.max(2) - 1) as f64;

    let to_x = |epoch: usize| MARGIN_LEFT + (epoch as f64 / x_span) * plot_width;
    let to_y = |v: f64| MARGIN_TOP + plot_height - ((v - y_min) / (y_max - y_min)) * plot_height;

    let mut svg = String::new();

    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str(&format!(
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        COLOR_TEXT,
        escape_xml(title)
    ));

    for i in 0..=GRID_LINES {
        let fraction = i as f64 / GRID_LINES as f64;
        let y = MARGIN_TOP + plot_height - fraction * plot_height;
        let value = y_min + fraction * (y_max - y_min);

        svg.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            MARGIN_LEFT,
            y,
            MARGIN_LEFT + plot_width,
            y,
            COLOR_GRID
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{:.3}</text>"#,
            MARGIN_LEFT - 10.0,
            y + 4.0,
            COLOR_TEXT,
            value
        ));
    }

    // Axes
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    ));
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 20.0,
        COLOR_TEXT,
        escape_xml(x_label)
    ));
    svg.push_str(&format!(
        r#"<text x="20" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {})">{}</text>"#,
        CHART_HEIGHT / 2.0,
        COLOR_TEXT,
        CHART_HEIGHT / 2.0,
        escape_xml(y_label)
    ));

    for epoch in 0..epochs {
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="11" fill="{}">{}</text>"#,
            to_x(epoch),
            MARGIN_TOP + plot_height + 20.0,
            COLOR_TEXT,
            epoch + 1
        ));
    }

    for data in series.iter().filter(|s| !s.values.is_empty()) {
        let path: Vec<String> = data
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let cmd = if i == 0 { "M" } else { "L" };
                format!("{} {:.2} {:.2}", cmd, to_x(i), to_y(v))
            })
            .collect();

        svg.push_str(&format!(
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="3"/>"#,
            path.join(" "),
            data.color
        ));
        for (i, &v) in data.values.iter().enumerate() {
            svg.push_str(&format!(
                r#"<circle cx="{:.2}" cy="{:.2}" r="4" fill="{}" stroke="white" stroke-width="2"/>"#,
                to_x(i),
                to_y(v),
                data.color
            ));
        }
    }

    // Legend
    let mut legend_y = MARGIN_TOP + 10.0;
    for data in series {
        svg.push_str(&format!(
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}"/>"#,
            CHART_WIDTH - MARGIN_RIGHT + 20.0,
            legend_y,
            data.color
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            CHART_WIDTH - MARGIN_RIGHT + 40.0,
            legend_y + 12.0,
            COLOR_TEXT,
            escape_xml(&data.name)
        ));
        legend_y += 25.0;
    }

    svg.push_str("</svg>");
    svg
}

/// Min and max over all finite values, widened when flat
fn value_range(series: &[DataSeries]) -> (f64, f64) {
    let (min, max) = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !min.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 0.5, max + 0.5);
    }
    (min, max)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn history() -> TrainingHistory {
        let mut history = TrainingHistory::new();
        for (loss, acc) in [(1.0, 0.4), (0.7, 0.6), (0.4, 0.8)] {
            history.record("loss", loss);
            history.record("accuracy", acc);
        }
        history
    }

    #[test]
    fn test_write_history_chart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("charts").join("history.svg");

        write_history_chart(&history(), &[], "Run <1>", &path).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Run &lt;1&gt;"));
        assert!(svg.contains(">accuracy<"));
        assert!(svg.contains(">loss<"));
        assert_eq!(svg.matches("<path").count(), 2);
    }

    #[test]
    fn test_selected_metric_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loss.svg");

        write_history_chart(&history(), &["loss"], "Loss", &path).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert_eq!(svg.matches("<path").count(), 1);
        assert!(!svg.contains(">accuracy<"));
    }

    #[test]
    fn test_unknown_metric() {
        let dir = TempDir::new().unwrap();
        let result = write_history_chart(&history(), &["f1"], "F1", &dir.path().join("f1.svg"));
        assert!(matches!(result, Err(FlowerError::NotFound(_))));
    }

    #[test]
    fn test_value_range_flat_series() {
        let series = [DataSeries {
            name: "flat".to_string(),
            values: vec![2.0, 2.0],
            color: PALETTE[0].to_string(),
        }];
        assert_eq!(value_range(&series), (1.5, 2.5));
        assert_eq!(value_range(&[]), (0.0, 1.0));
    }
}
