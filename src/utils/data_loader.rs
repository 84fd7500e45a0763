//! CSV loading and saving
//!
//! Thin wrapper over polars that translates file and parse failures into
//! [`crate::error::LoginsightError::DataError`] before any data reaches the
//! engine.

use crate::error::{LoginsightError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// CSV reader for user-behavior tables.
#[derive(Debug, Default)]
pub struct DataLoader;

impl DataLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a CSV file with a header row.
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            LoginsightError::DataError(format!("cannot open {}: {e}", path.display()))
        })?;

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(file);

        let df = reader
            .finish()
            .map_err(|e| LoginsightError::DataError(format!("{}: {e}", path.display())))?;

        tracing::debug!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            "CSV loaded"
        );
        Ok(df)
    }

    /// Header and row count without loading the full table.
    pub fn file_info(&self, path: &Path) -> Result<FileInfo> {
        let file_size = std::fs::metadata(path)
            .map_err(|e| {
                LoginsightError::DataError(format!("cannot stat {}: {e}", path.display()))
            })?
            .len();

        let file = File::open(path).map_err(|e| {
            LoginsightError::DataError(format!("cannot open {}: {e}", path.display()))
        })?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header = lines
            .next()
            .transpose()
            .map_err(LoginsightError::IoError)?
            .unwrap_or_default();
        let columns: Vec<String> = header.split(',').map(|s| s.trim().to_string()).collect();
        let n_rows = lines.count();

        Ok(FileInfo {
            path: path.display().to_string(),
            file_size,
            n_rows,
            columns,
        })
    }
}

/// File information
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: String,
    pub file_size: u64,
    pub n_rows: usize,
    pub columns: Vec<String>,
}

/// CSV writer
pub struct DataSaver;

impl DataSaver {
    /// Save a DataFrame to CSV with a header row.
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        let mut file = File::create(path).map_err(|e| {
            LoginsightError::DataError(format!("cannot create {}: {e}", path.display()))
        })?;

        CsvWriter::new(&mut file)
            .finish(df)
            .map_err(|e| LoginsightError::DataError(format!("{}: {e}", path.display())))?;

        tracing::debug!(path = %path.display(), rows = df.height(), "CSV written");
        Ok(())
    }
}
