//! SVG chart generation for training reports.
//!
//! Renders the four per-epoch metric series as a single line chart, written
//! next to the model artifacts. The output is plain SVG usable directly in
//! reports.

use std::fs;
use std::path::Path;

use crate::training::TrainingHistory;

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 500.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 80.0;

const COLOR_TRAIN_LOSS: &str = "#3498db";
const COLOR_VAL_LOSS: &str = "#e74c3c";
const COLOR_TRAIN_ACC: &str = "#2ecc71";
const COLOR_VAL_ACC: &str = "#9b59b6";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// A named data series for the chart
struct DataSeries {
    name: &'static str,
    values: Vec<f64>,
    color: &'static str,
}

/// Write a training-curves SVG for `history` to `output_path`.
///
/// Accuracy series are plotted as fractions so they share an axis with the
/// loss series.
pub fn write_training_curves(history: &TrainingHistory, output_path: &Path) -> std::io::Result<()> {
    let as_fraction = |values: &[f64]| values.iter().map(|v| v / 100.0).collect::<Vec<_>>();

    let series = [
        DataSeries {
            name: "train_loss",
            values: history.train_loss.clone(),
            color: COLOR_TRAIN_LOSS,
        },
        DataSeries {
            name: "val_loss",
            values: history.val_loss.clone(),
            color: COLOR_VAL_LOSS,
        },
        DataSeries {
            name: "train_acc",
            values: as_fraction(&history.train_accuracy),
            color: COLOR_TRAIN_ACC,
        },
        DataSeries {
            name: "val_acc",
            values: as_fraction(&history.val_accuracy),
            color: COLOR_VAL_ACC,
        },
    ];

    let epochs = history.epochs();
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let y_max = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .fold(1.0f64, f64::max);
    let x_max = (epochs.saturating_sub(1)).max(1) as f64;

    let mut svg = String::new();

    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {CHART_WIDTH} {CHART_HEIGHT}" width="{CHART_WIDTH}" height="{CHART_HEIGHT}">"#
    ));
    svg.push_str(&format!(
        r#"<rect width="{CHART_WIDTH}" height="{CHART_HEIGHT}" fill="white"/>"#
    ));

    // Title
    svg.push_str(&format!(
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{COLOR_TEXT}">Training Loss and Accuracy</text>"#,
        CHART_WIDTH / 2.0
    ));

    // Grid lines and y-axis labels
    for i in 0..=5 {
        let y = MARGIN_TOP + plot_height - (i as f64 / 5.0) * plot_height;
        let value = (i as f64 / 5.0) * y_max;

        svg.push_str(&format!(
            r#"<line x1="{}" y1="{y}" x2="{}" y2="{y}" stroke="{COLOR_GRID}" stroke-width="1"/>"#,
            MARGIN_LEFT,
            MARGIN_LEFT + plot_width
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{COLOR_TEXT}">{value:.2}</text>"#,
            MARGIN_LEFT - 10.0,
            y + 4.0
        ));
    }

    // Axes
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{COLOR_AXIS}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + plot_height
    ));
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{COLOR_AXIS}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height
    ));

    // Axis labels
    svg.push_str(&format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{COLOR_TEXT}">Epoch #</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 20.0
    ));
    svg.push_str(&format!(
        r#"<text x="20" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{COLOR_TEXT}" transform="rotate(-90 20 {})">Loss/Accuracy</text>"#,
        CHART_HEIGHT / 2.0,
        CHART_HEIGHT / 2.0
    ));

    // X-axis ticks (up to 6, evenly spaced over the epoch range)
    let tick_count = epochs.clamp(2, 6);
    for i in 0..tick_count {
        let epoch = (i as f64 / (tick_count - 1) as f64) * x_max;
        let x = MARGIN_LEFT + (epoch / x_max) * plot_width;
        svg.push_str(&format!(
            r#"<text x="{x}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="11" fill="{COLOR_TEXT}">{epoch:.0}</text>"#,
            MARGIN_TOP + plot_height + 20.0
        ));
    }

    // Series polylines
    for series_data in &series {
        if series_data.values.is_empty() {
            continue;
        }

        let mut path = String::new();
        for (i, value) in series_data.values.iter().enumerate() {
            let x = MARGIN_LEFT + (i as f64 / x_max) * plot_width;
            let y = MARGIN_TOP + plot_height - (value / y_max) * plot_height;
            if i == 0 {
                path.push_str(&format!("M {x} {y}"));
            } else {
                path.push_str(&format!(" L {x} {y}"));
            }
        }

        svg.push_str(&format!(
            r#"<path d="{path}" fill="none" stroke="{}" stroke-width="3"/>"#,
            series_data.color
        ));
    }

    // Legend
    let mut legend_y = MARGIN_TOP + 10.0;
    for series_data in &series {
        svg.push_str(&format!(
            r#"<rect x="{}" y="{legend_y}" width="15" height="15" fill="{}"/>"#,
            CHART_WIDTH - MARGIN_RIGHT - 110.0,
            series_data.color
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{COLOR_TEXT}">{}</text>"#,
            CHART_WIDTH - MARGIN_RIGHT - 90.0,
            legend_y + 12.0,
            series_data.name
        ));
        legend_y += 25.0;
    }

    svg.push_str("</svg>");

    fs::write(output_path, svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_svg_with_all_series() {
        let mut history = TrainingHistory::default();
        history.record_epoch(1.5, 30.0, 1.6, 25.0);
        history.record_epoch(0.9, 55.0, 1.1, 50.0);
        history.record_epoch(0.5, 80.0, 0.8, 70.0);

        let path = std::env::temp_dir()
            .join(format!("lenet-classify-chart-{}.svg", std::process::id()));
        write_training_curves(&history, &path).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("train_loss"));
        assert!(svg.contains("val_acc"));
        assert!(svg.ends_with("</svg>"));

        let _ = std::fs::remove_file(&path);
    }
}
