//! loginsight CLI
//!
//! Command-line interface for detecting anomalous user sessions and for
//! generating synthetic test data.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::anomaly::{AnomalyDetector, IsolationForest};
use crate::error::Result;
use crate::features::{build_feature_matrix, REQUIRED_COLUMNS};
use crate::report::{render_scatter, DetectionSummary};
use crate::synthetic::UserBehaviorGenerator;
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}

fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn warn(s: &str) -> ColoredString {
    s.truecolor(230, 140, 80)
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {} {}", dim(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "loginsight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "User-session anomaly detection with Isolation Forest")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect anomalous sessions in a CSV file
    Detect {
        /// Input CSV with login_frequency, session_duration, login_hour columns
        #[arg(short, long)]
        data: PathBuf,

        /// Expected proportion of outliers, in (0, 1)
        #[arg(short, long, default_value_t = 0.05)]
        contamination: f64,

        /// Number of trees in the forest
        #[arg(short, long, default_value_t = 100)]
        trees: usize,

        /// Sub-sample size per tree (default: min(256, rows))
        #[arg(long)]
        sample_size: Option<usize>,

        /// Random seed for reproducible results
        #[arg(short, long)]
        seed: Option<u64>,

        /// Write the input table plus an `anomaly` column (-1/1) here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write an SVG scatter plot here
        #[arg(short, long)]
        plot: Option<PathBuf>,
    },

    /// Generate a synthetic user-behavior CSV
    Generate {
        /// Number of normal rows
        #[arg(long, default_value_t = 9500)]
        normal: usize,

        /// Number of anomalous rows
        #[arg(long, default_value_t = 500)]
        anomalies: usize,

        /// Random seed for reproducible output
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show basic information about a CSV file
    Info {
        /// Input CSV path
        #[arg(short, long)]
        data: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_detect(
    data: &PathBuf,
    contamination: f64,
    trees: usize,
    sample_size: Option<usize>,
    seed: Option<u64>,
    output: Option<&PathBuf>,
    plot: Option<&PathBuf>,
) -> Result<()> {
    let start = Instant::now();

    let df = DataLoader::new().load_csv(data)?;
    step_ok(&format!(
        "loaded {} ({} rows)",
        data.display(),
        df.height()
    ));

    let x = build_feature_matrix(&df, &REQUIRED_COLUMNS)?;

    let mut forest = IsolationForest::new()
        .with_n_estimators(trees)
        .with_contamination(contamination);
    if let Some(s) = sample_size {
        forest = forest.with_max_samples(s);
    }
    if let Some(s) = seed {
        forest = forest.with_seed(s);
    }

    forest.fit(&x)?;
    let result = forest.detect(&x)?;
    step_ok(&format!(
        "scored {} samples with {} trees in {:.2?}",
        x.nrows(),
        trees,
        start.elapsed()
    ));

    let summary = DetectionSummary::from_labels(&result.labels, result.threshold);

    section("Detection summary");
    kv("samples:  ", &summary.n_samples.to_string());
    kv(
        "anomalies:",
        &format!(
            "{} ({:.1}%)",
            summary.n_anomalies,
            summary.anomaly_rate * 100.0
        ),
    );
    kv("threshold:", &format!("{:.4}", summary.threshold));

    if summary.n_anomalies > 0 {
        section("Sample anomalies");
        println!(
            "  {}",
            dim("row    login_freq   duration   hour      score")
        );
        let mut shown = 0;
        for (i, label) in result.labels.iter().enumerate() {
            if !label.is_anomaly() {
                continue;
            }
            println!(
                "  {:<6} {:>10.2} {:>10.2} {:>6.1} {:>10.4}",
                i,
                x[[i, 0]],
                x[[i, 1]],
                x[[i, 2]],
                result.scores[i]
            );
            shown += 1;
            if shown == 5 {
                break;
            }
        }
        if summary.n_anomalies > 5 {
            println!("  {}", dim(&format!("... and {} more", summary.n_anomalies - 5)));
        }
    } else {
        println!("  {}", warn("no anomalies detected"));
    }

    if let Some(out) = output {
        let anomaly_col: Vec<i32> = result.labels.iter().map(|l| l.as_i32()).collect();
        let mut labeled = df.clone();
        labeled.with_column(Column::new("anomaly".into(), anomaly_col))?;
        DataSaver::save_csv(&mut labeled, out)?;
        step_ok(&format!("labeled table written to {}", out.display()));
    }

    if let Some(plot_path) = plot {
        render_scatter(
            plot_path,
            &x,
            &result.labels,
            0,
            1,
            "Login Frequency (per day)",
            "Session Duration (minutes)",
        )?;
        step_ok(&format!("scatter plot written to {}", plot_path.display()));
    }

    Ok(())
}

pub fn cmd_generate(
    normal: usize,
    anomalies: usize,
    seed: Option<u64>,
    output: &PathBuf,
) -> Result<()> {
    let mut gen = UserBehaviorGenerator::new()
        .with_n_normal(normal)
        .with_n_anomalies(anomalies);
    if let Some(s) = seed {
        gen = gen.with_seed(s);
    }

    let mut df = gen.generate()?;
    DataSaver::save_csv(&mut df, output)?;

    step_ok(&format!(
        "generated {} ({} rows, {} anomalies, {:.1}% contamination)",
        output.display(),
        df.height(),
        anomalies,
        gen.anomaly_fraction() * 100.0
    ));
    Ok(())
}

pub fn cmd_info(data: &PathBuf) -> Result<()> {
    let info = DataLoader::new().file_info(data)?;

    section("File info");
    kv("path:   ", &info.path);
    kv("size:   ", &format!("{} bytes", info.file_size));
    kv("rows:   ", &info.n_rows.to_string());
    kv("columns:", &info.columns.join(", "));

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !info.columns.iter().any(|have| have == *c))
        .copied()
        .collect();
    if missing.is_empty() {
        step_ok("all required columns present");
    } else {
        println!(
            "  {} missing required columns: {}",
            warn("!"),
            missing.join(", ")
        );
    }

    Ok(())
}
