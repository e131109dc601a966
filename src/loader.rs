use std::io::Cursor;
use std::path::{Path, PathBuf};

use log::{debug, info};
use polars::prelude::*;

use crate::error::CpueError;
use crate::protocol::InputFiles;
use crate::schema::{catch, drift, species, trip};

/// The four source tables of a survey export, every column as String.
#[derive(Debug, Clone)]
pub struct SurveyTables {
    pub trips: DataFrame,
    pub drifts: DataFrame,
    pub catches: DataFrame,
    pub species: DataFrame,
}

impl SurveyTables {
    /// Load all four tables from `base_path`.
    ///
    /// Fails on the first missing file or missing required column, before
    /// any transformation runs.
    pub fn load(base_path: &Path, files: &InputFiles) -> Result<Self, CpueError> {
        let tables = Self::from_frames(
            read_csv_as_strings(&base_path.join(&files.trips))?,
            read_csv_as_strings(&base_path.join(&files.drifts))?,
            read_csv_as_strings(&base_path.join(&files.catches))?,
            read_csv_as_strings(&base_path.join(&files.species))?,
        )?;
        info!(
            "loaded {} trips, {} drifts, {} catch records, {} species codes from {}",
            tables.trips.height(),
            tables.drifts.height(),
            tables.catches.height(),
            tables.species.height(),
            base_path.display()
        );
        Ok(tables)
    }

    /// Check required columns and fill in the optional exclusion comment.
    pub fn from_frames(
        trips: DataFrame,
        drifts: DataFrame,
        catches: DataFrame,
        species: DataFrame,
    ) -> Result<Self, CpueError> {
        require_columns(&trips, &trip::REQUIRED)?;
        require_columns(&drifts, &drift::REQUIRED)?;
        require_columns(&catches, &catch::REQUIRED)?;
        require_columns(&species, &species::REQUIRED)?;

        let drifts = if drifts.column(drift::EXCLUDED_COMMENT).is_err() {
            debug!("drift table has no exclusion comment column, treating all as blank");
            drifts
                .lazy()
                .with_column(
                    lit(NULL)
                        .cast(DataType::String)
                        .alias(drift::EXCLUDED_COMMENT),
                )
                .collect()?
        } else {
            drifts
        };

        Ok(Self {
            trips,
            drifts,
            catches,
            species,
        })
    }
}

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace from column names.
pub fn read_csv_as_strings(path: &Path) -> Result<DataFrame, CpueError> {
    if !path.is_file() {
        return Err(CpueError::NotLoaded(format!("{} not found", path.display())));
    }
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()?;
    trim_column_names(df)
}

/// Same as [`read_csv_as_strings`] for CSV text already in memory.
pub fn read_csv_bytes(bytes: impl Into<Vec<u8>>) -> Result<DataFrame, CpueError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes.into()))
        .finish()?;
    trim_column_names(df)
}

fn trim_column_names(mut df: DataFrame) -> Result<DataFrame, CpueError> {
    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed)?;
    Ok(df)
}

pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), CpueError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(CpueError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

// ── Parse helpers ───────────────────────────────────────────────────────────

/// Trimmed string column, blank values become null.
pub fn parse_str(column: &str) -> Expr {
    let trimmed = col(column).str().strip_chars(lit(" \t\r\n"));
    when(trimmed.clone().eq(lit("")))
        .then(lit(NULL).cast(DataType::String))
        .otherwise(trimmed)
}

/// String column to Float64. Unparseable values become null.
pub fn parse_float(column: &str) -> Expr {
    col(column)
        .str()
        .strip_chars(lit(" \t\r\n"))
        .cast(DataType::Float64)
}

/// String column to Int64, accepting integral values written as floats ("6.0").
pub fn parse_int(column: &str) -> Expr {
    parse_float(column).cast(DataType::Int64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_trimmed_and_values_stay_strings() {
        let df = read_csv_bytes(" Species Code ,Common Name\nKLPB, Kelp Bass\n").unwrap();
        assert!(df.column("Species Code").is_ok());
        assert_eq!(df.column("Common Name").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn missing_required_column_is_reported() {
        let df = read_csv_bytes("Species Code\nKLPB\n").unwrap();
        let err = require_columns(&df, &species::REQUIRED).unwrap_err();
        assert!(matches!(err, CpueError::MissingColumn(c) if c == "Common Name"));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = read_csv_as_strings(Path::new("/nonexistent/trips.csv")).unwrap_err();
        assert!(matches!(err, CpueError::NotLoaded(_)));
    }

    #[test]
    fn numeric_parsing_tolerates_padding_and_float_integers() {
        let df = read_csv_bytes("a,b\n 0.5 ,6.0\nx,3\n")
            .unwrap()
            .lazy()
            .select([parse_float("a"), parse_int("b")])
            .collect()
            .unwrap();
        let a = df.column("a").unwrap().f64().unwrap();
        let b = df.column("b").unwrap().i64().unwrap();
        assert_eq!(a.get(0), Some(0.5));
        assert_eq!(a.get(1), None);
        assert_eq!(b.get(0), Some(6));
        assert_eq!(b.get(1), Some(3));
    }
}
