//! loginsight - user-session anomaly detection
//!
//! Detects statistically unusual user sessions (login frequency, session
//! duration, login hour) in tabular data using an Isolation Forest, and can
//! synthesize labeled test datasets in the same format.
//!
//! # Modules
//!
//! - [`anomaly`] - Isolation Forest engine and the [`anomaly::AnomalyDetector`] trait
//! - [`features`] - feature matrix extraction and validation
//! - [`synthetic`] - synthetic user-behavior data generation
//! - [`report`] - detection summaries and SVG scatter plots
//! - [`utils`] - CSV loading and saving
//! - [`cli`] - command-line interface

// Core error handling
pub mod error;

// Core detection
pub mod anomaly;
pub mod features;

// Collaborators
pub mod report;
pub mod synthetic;
pub mod utils;

// Services
pub mod cli;

pub use error::{LoginsightError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::anomaly::{AnomalyDetector, AnomalyResult, IsolationForest, Label};
    pub use crate::error::{LoginsightError, Result};
    pub use crate::features::{build_feature_matrix, validate_matrix, REQUIRED_COLUMNS};
    pub use crate::report::{render_scatter, DetectionSummary};
    pub use crate::synthetic::UserBehaviorGenerator;
    pub use crate::utils::{DataLoader, DataSaver};
}
