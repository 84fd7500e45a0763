//! Reporting and visualization
//!
//! Consumes the engine's per-sample classification: a textual summary for the
//! CLI and a standalone SVG scatter of two feature dimensions, color-coded by
//! label. The SVG is written directly; nothing here feeds back into detection.

use crate::anomaly::Label;
use crate::error::{LoginsightError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

const NORMAL_COLOR: &str = "#4682b4";
const ANOMALY_COLOR: &str = "#dc143c";

/// Counts and rate derived from a classification pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub n_samples: usize,
    pub n_anomalies: usize,
    pub anomaly_rate: f64,
    pub threshold: f64,
}

impl DetectionSummary {
    pub fn from_labels(labels: &[Label], threshold: f64) -> Self {
        let n_samples = labels.len();
        let n_anomalies = labels.iter().filter(|l| l.is_anomaly()).count();
        let anomaly_rate = if n_samples == 0 {
            0.0
        } else {
            n_anomalies as f64 / n_samples as f64
        };
        Self {
            n_samples,
            n_anomalies,
            anomaly_rate,
            threshold,
        }
    }
}

/// Render a 2D scatter of features `fx` vs `fy` as a standalone SVG file.
///
/// Normal points are steel blue, anomalies crimson.
pub fn render_scatter(
    path: &Path,
    x: &Array2<f64>,
    labels: &[Label],
    fx: usize,
    fy: usize,
    x_label: &str,
    y_label: &str,
) -> Result<()> {
    if labels.len() != x.nrows() {
        return Err(LoginsightError::DataError(format!(
            "label count {} does not match row count {}",
            labels.len(),
            x.nrows()
        )));
    }
    if fx >= x.ncols() || fy >= x.ncols() {
        return Err(LoginsightError::InvalidParameter {
            name: "feature index".to_string(),
            value: format!("({fx}, {fy})"),
            reason: format!("matrix has {} features", x.ncols()),
        });
    }
    if x.nrows() == 0 {
        return Err(LoginsightError::DataError(
            "nothing to plot: feature matrix is empty".to_string(),
        ));
    }

    const WIDTH: f64 = 800.0;
    const HEIGHT: f64 = 600.0;
    const MARGIN: f64 = 60.0;

    let (x_min, x_max) = padded_range(x.column(fx).iter().copied());
    let (y_min, y_max) = padded_range(x.column(fy).iter().copied());

    let to_px = |v: f64| MARGIN + (v - x_min) / (x_max - x_min) * (WIDTH - 2.0 * MARGIN);
    let to_py = |v: f64| HEIGHT - MARGIN - (v - y_min) / (y_max - y_min) * (HEIGHT - 2.0 * MARGIN);

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);

    // Axes
    let _ = writeln!(
        svg,
        r#"<line x1="{m}" y1="{b}" x2="{r}" y2="{b}" stroke="black"/>"#,
        m = MARGIN,
        b = HEIGHT - MARGIN,
        r = WIDTH - MARGIN
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{m}" y1="{t}" x2="{m}" y2="{b}" stroke="black"/>"#,
        m = MARGIN,
        t = MARGIN,
        b = HEIGHT - MARGIN
    );

    for i in 0..x.nrows() {
        let color = if labels[i].is_anomaly() {
            ANOMALY_COLOR
        } else {
            NORMAL_COLOR
        };
        let _ = writeln!(
            svg,
            r#"<circle cx="{:.2}" cy="{:.2}" r="3" fill="{color}" fill-opacity="0.6"/>"#,
            to_px(x[[i, fx]]),
            to_py(x[[i, fy]])
        );
    }

    let _ = writeln!(
        svg,
        r#"<text x="{cx}" y="{y}" text-anchor="middle" font-family="sans-serif" font-size="14">{x_label}</text>"#,
        cx = WIDTH / 2.0,
        y = HEIGHT - MARGIN / 3.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="{x}" y="{cy}" text-anchor="middle" font-family="sans-serif" font-size="14" transform="rotate(-90 {x} {cy})">{y_label}</text>"#,
        x = MARGIN / 3.0,
        cy = HEIGHT / 2.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="{cx}" y="{y}" text-anchor="middle" font-family="sans-serif" font-size="16">Anomaly Detection in User Behavior</text>"#,
        cx = WIDTH / 2.0,
        y = MARGIN / 2.0
    );
    svg.push_str("</svg>\n");

    std::fs::write(path, svg)?;
    tracing::debug!(path = %path.display(), "scatter plot written");
    Ok(())
}

fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if min == max {
        // Degenerate axis: widen so points stay visible
        min -= 1.0;
        max += 1.0;
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}
