//! Synthetic user-behavior data generation
//!
//! Produces labeled test datasets for the anomaly engine: a bulk of
//! correlated "normal" sessions followed by a block of uniformly scattered
//! anomalous ones, in the same three-column layout the detector consumes.

use crate::error::{LoginsightError, Result};
use crate::features::REQUIRED_COLUMNS;
use polars::prelude::*;
use rand::prelude::*;
use rand_distr::StandardNormal;

/// Mean of the normal-behavior distribution: logins/day, minutes, hour.
const NORMAL_MEAN: [f64; 3] = [5.0, 30.0, 14.0];

/// Covariance of the normal-behavior distribution.
const NORMAL_COV: [[f64; 3]; 3] = [
    [2.25, 0.5, 0.2],
    [0.5, 25.0, 0.1],
    [0.2, 0.1, 4.0],
];

/// Uniform ranges for anomalous rows: (low, high) per feature.
const ANOMALY_RANGES: [(f64, f64); 3] = [(0.0, 20.0), (5.0, 120.0), (0.0, 23.0)];

/// Generator for synthetic user-session tables.
///
/// Emits `n_normal` rows drawn from a multivariate normal centered on typical
/// behavior, followed by `n_anomalies` rows drawn uniformly over wide ranges.
/// Output is reproducible for a fixed seed.
#[derive(Debug, Clone)]
pub struct UserBehaviorGenerator {
    n_normal: usize,
    n_anomalies: usize,
    seed: Option<u64>,
}

impl UserBehaviorGenerator {
    /// Create a generator with the default 9500 normal / 500 anomalous rows.
    pub fn new() -> Self {
        Self {
            n_normal: 9500,
            n_anomalies: 500,
            seed: None,
        }
    }

    /// Set the number of normal rows
    pub fn with_n_normal(mut self, n: usize) -> Self {
        self.n_normal = n;
        self
    }

    /// Set the number of anomalous rows
    pub fn with_n_anomalies(mut self, n: usize) -> Self {
        self.n_anomalies = n;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Generate the table: normal block first, anomaly block second.
    pub fn generate(&self) -> Result<DataFrame> {
        if self.n_normal + self.n_anomalies == 0 {
            return Err(LoginsightError::InvalidParameter {
                name: "n_normal + n_anomalies".to_string(),
                value: "0".to_string(),
                reason: "must generate at least one row".to_string(),
            });
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let total = self.n_normal + self.n_anomalies;
        let mut columns: [Vec<f64>; 3] = [
            Vec::with_capacity(total),
            Vec::with_capacity(total),
            Vec::with_capacity(total),
        ];

        let chol = cholesky3(&NORMAL_COV);
        for _ in 0..self.n_normal {
            let z: [f64; 3] = [
                rng.sample(StandardNormal),
                rng.sample(StandardNormal),
                rng.sample(StandardNormal),
            ];
            for (j, col) in columns.iter_mut().enumerate() {
                let mut v = NORMAL_MEAN[j];
                for (k, &zk) in z.iter().enumerate().take(j + 1) {
                    v += chol[j][k] * zk;
                }
                col.push(v);
            }
        }

        for _ in 0..self.n_anomalies {
            for (j, col) in columns.iter_mut().enumerate() {
                let (low, high) = ANOMALY_RANGES[j];
                col.push(rng.gen_range(low..high));
            }
        }

        let [freq, duration, hour] = columns;
        let df = df!(
            REQUIRED_COLUMNS[0] => freq,
            REQUIRED_COLUMNS[1] => duration,
            REQUIRED_COLUMNS[2] => hour
        )?;

        tracing::debug!(
            n_normal = self.n_normal,
            n_anomalies = self.n_anomalies,
            "generated synthetic user-behavior table"
        );

        Ok(df)
    }

    /// Fraction of rows that are anomalous by construction.
    pub fn anomaly_fraction(&self) -> f64 {
        self.n_anomalies as f64 / (self.n_normal + self.n_anomalies) as f64
    }
}

impl Default for UserBehaviorGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower-triangular Cholesky factor of a symmetric positive-definite 3x3.
fn cholesky3(a: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut l = [[0.0; 3]; 3];
    l[0][0] = a[0][0].sqrt();
    l[1][0] = a[1][0] / l[0][0];
    l[2][0] = a[2][0] / l[0][0];
    l[1][1] = (a[1][1] - l[1][0] * l[1][0]).sqrt();
    l[2][1] = (a[2][1] - l[2][0] * l[1][0]) / l[1][1];
    l[2][2] = (a[2][2] - l[2][0] * l[2][0] - l[2][1] * l[2][1]).sqrt();
    l
}
