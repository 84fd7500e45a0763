//! Anomaly detection module
//!
//! Unsupervised outlier detection over dense feature matrices. The only
//! detector shipped today is the Isolation Forest; the [`AnomalyDetector`]
//! trait is the seam for adding others.

mod isolation_forest;

pub use isolation_forest::{IsolationForest, IsolationTree};

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Per-sample classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    /// Sample lies in a sparse region of feature space
    Anomaly,
    /// Sample belongs to the bulk of the data
    Normal,
}

impl Label {
    pub fn is_anomaly(self) -> bool {
        matches!(self, Label::Anomaly)
    }

    /// Integer form used at CSV boundaries: -1 = anomaly, 1 = normal.
    pub fn as_i32(self) -> i32 {
        match self {
            Label::Anomaly => -1,
            Label::Normal => 1,
        }
    }
}

/// Anomaly detection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// Anomaly scores (higher = more anomalous)
    pub scores: Array1<f64>,
    /// Per-sample labels, order matching the input rows
    pub labels: Vec<Label>,
    /// Threshold used for classification
    pub threshold: f64,
    /// Number of anomalies detected
    pub n_anomalies: usize,
}

/// Trait for anomaly detectors
pub trait AnomalyDetector: Send + Sync {
    /// Fit the detector on training data
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Compute anomaly scores for new data
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Predict labels for new data
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<Label>>;

    /// Fit and predict in one step
    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Vec<Label>> {
        self.fit(x)?;
        self.predict(x)
    }

    /// Get detection results with scores and labels
    fn detect(&self, x: &Array2<f64>) -> Result<AnomalyResult> {
        let scores = self.score_samples(x)?;
        let labels = self.predict(x)?;
        let threshold = self.threshold();
        let n_anomalies = labels.iter().filter(|l| l.is_anomaly()).count();

        Ok(AnomalyResult {
            scores,
            labels,
            threshold,
            n_anomalies,
        })
    }

    /// Get the decision threshold (0.5 before fitting)
    fn threshold(&self) -> f64;
}
