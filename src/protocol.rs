//! Sampling-protocol constants: the area whitelist, the excluded cell set,
//! the minimum drift length and how zero-effort drifts are treated.
//!
//! `ProtocolConfig::default()` carries the published area table and minimum
//! drift length. The built-in excluded cell list is a placeholder in the
//! program's cell-per-trip id format, not the protocol's list; running with it
//! logs a warning. A TOML file may override any value; a table given in the
//! file replaces the built-in one wholesale.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use polars::prelude::*;
use serde::Deserialize;

use crate::error::CpueError;
use crate::schema::clean;

// ── Built-in constants ──────────────────────────────────────────────────────

/// Area code → canonical area name for every monitored area.
pub const AREAS: [(&str, &str); 16] = [
    ("TD", "Trinidad"),
    ("CM", "Cape Mendocino"),
    ("TM", "Ten Mile"),
    ("SP", "Stewarts Point"),
    ("BH", "Bodega Head"),
    ("FN", "Farallon Islands"),
    ("AN", "Ano Nuevo"),
    ("PL", "Point Lobos"),
    ("PB", "Piedras Blancas"),
    ("BL", "Point Buchon"),
    ("AI", "Anacapa Island"),
    ("CP", "Carrington Point"),
    ("LB", "Laguna Beach"),
    ("SW", "Swamis"),
    ("LJ", "South La Jolla"),
    ("CI", "Catalina Island"),
];

/// Stand-in for the 33 cell-trip combinations the protocol flags as invalid.
/// These ids are placeholders; supply the real list through
/// `excluded_cells` in the config file.
pub const PLACEHOLDER_EXCLUDED_CELLS: [&str; 33] = [
    "ANM0107201701",
    "ANM0208201702",
    "ANR0314201701",
    "BHM0204201801",
    "BHR0311201801",
    "BLM0505201701",
    "BLM0612201702",
    "BLR0716201701",
    "CMM0101201901",
    "CMR0204201901",
    "CPM0318201801",
    "CPR0425201801",
    "FNM0209201902",
    "FNR0316201901",
    "LBM0707202001",
    "LBR0814202001",
    "LJM0221202002",
    "LJR0328202001",
    "PBM0611201701",
    "PBR0718201701",
    "PLM0109201801",
    "PLM0216201802",
    "PLR0323201801",
    "SPM0501201901",
    "SPR0608201901",
    "SWM0112202001",
    "SWR0219202001",
    "TDM0703201901",
    "TDR0810201901",
    "TMM0417201901",
    "TMR0524201901",
    "AIM0906202001",
    "AIR0913202001",
];

/// Drifts at or below this length never count toward effort or catch.
pub const MIN_DRIFT_MINUTES: f64 = 2.0;

// ── Config types ────────────────────────────────────────────────────────────

/// What to do with a retained drift whose summed angler-hours are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroEffortPolicy {
    /// Remove the drift before normalizing and count it in the audit.
    #[default]
    Drop,
    /// Keep the drift with every CPUE value set to NaN.
    #[serde(rename = "nan")]
    NotANumber,
}

/// Input file names, relative to the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputFiles {
    pub trips: String,
    pub drifts: String,
    pub catches: String,
    pub species: String,
}

impl Default for InputFiles {
    fn default() -> Self {
        Self {
            trips: "trips.csv".to_string(),
            drifts: "drifts.csv".to_string(),
            catches: "catches.csv".to_string(),
            species: "species.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    /// Strict lower bound on drift length, in minutes.
    pub min_drift_minutes: f64,
    /// Optional strict lower bound on summed angler-hours per drift.
    pub min_angler_hours: Option<f64>,
    pub zero_effort: ZeroEffortPolicy,
    /// Matched against both the grid cell id and the cell-per-trip id.
    pub excluded_cells: BTreeSet<String>,
    /// Area code → area name. Codes not listed here are dropped.
    pub areas: BTreeMap<String, String>,
    pub files: InputFiles,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            min_drift_minutes: MIN_DRIFT_MINUTES,
            min_angler_hours: None,
            zero_effort: ZeroEffortPolicy::default(),
            excluded_cells: PLACEHOLDER_EXCLUDED_CELLS.iter().map(|c| c.to_string()).collect(),
            areas: AREAS
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string()))
                .collect(),
            files: InputFiles::default(),
        }
    }
}

impl ProtocolConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, CpueError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CpueError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), CpueError> {
        if !self.min_drift_minutes.is_finite() || self.min_drift_minutes < 0.0 {
            return Err(CpueError::Config(format!(
                "min_drift_minutes must be a non-negative number, got {}",
                self.min_drift_minutes
            )));
        }
        if let Some(hours) = self.min_angler_hours {
            if !hours.is_finite() || hours < 0.0 {
                return Err(CpueError::Config(format!(
                    "min_angler_hours must be a non-negative number, got {hours}"
                )));
            }
        }
        if self.areas.is_empty() {
            return Err(CpueError::Config("areas table is empty".to_string()));
        }
        Ok(())
    }

    /// Minimum drift length in hours, the unit drift times are recorded in.
    pub fn min_drift_hours(&self) -> f64 {
        self.min_drift_minutes / 60.0
    }

    pub fn area_names(&self) -> BTreeSet<&str> {
        self.areas.values().map(|s| s.as_str()).collect()
    }

    /// Two-column lookup frame (area code, area name) for joining trips.
    pub fn area_lookup(&self) -> Result<DataFrame, CpueError> {
        let codes: Vec<&str> = self.areas.keys().map(|s| s.as_str()).collect();
        let names: Vec<&str> = self.areas.values().map(|s| s.as_str()).collect();
        let df = DataFrame::new(vec![
            Series::new(clean::AREA_CODE.into(), codes).into(),
            Series::new(clean::AREA.into(), names).into(),
        ])?;
        Ok(df)
    }

    /// True while `excluded_cells` is still the built-in placeholder list.
    pub fn uses_placeholder_cells(&self) -> bool {
        self.excluded_cells.len() == PLACEHOLDER_EXCLUDED_CELLS.len()
            && PLACEHOLDER_EXCLUDED_CELLS
                .iter()
                .all(|c| self.excluded_cells.contains(*c))
    }

    /// Excluded cells as a one-row list series, the form `is_in` expects.
    pub fn excluded_cells_list(&self) -> Result<Series, CpueError> {
        let cells: Vec<&str> = self.excluded_cells.iter().map(|s| s.as_str()).collect();
        let list = Series::new("excluded_cells".into(), cells).implode()?;
        Ok(list.into_series())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_protocol_constants() {
        let config = ProtocolConfig::default();
        assert_eq!(config.areas.len(), 16);
        assert_eq!(config.excluded_cells.len(), 33);
        assert_eq!(config.zero_effort, ZeroEffortPolicy::Drop);
        assert!((config.min_drift_hours() - 2.0 / 60.0).abs() < 1e-15);
        assert!(config.validate().is_ok());
        assert!(config.uses_placeholder_cells());
    }

    #[test]
    fn configured_cells_replace_the_placeholder_list() {
        let config =
            ProtocolConfig::from_toml_str(r#"excluded_cells = ["BLM0505201701"]"#).unwrap();
        assert!(!config.uses_placeholder_cells());

        let mut grown = ProtocolConfig::default();
        grown.excluded_cells.insert("PLRXX".to_string());
        assert!(!grown.uses_placeholder_cells());
    }

    #[test]
    fn excluded_cells_list_is_a_single_list_row() {
        let list = ProtocolConfig::default().excluded_cells_list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.list().unwrap().get_as_series(0).unwrap().len(), 33);
    }

    #[test]
    fn toml_overrides_replace_tables() {
        let config = ProtocolConfig::from_toml_str(
            r#"
            min_drift_minutes = 5.0
            zero_effort = "nan"
            excluded_cells = ["XX01"]

            [areas]
            BL = "Point Buchon"

            [files]
            catches = "fish.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.min_drift_minutes, 5.0);
        assert_eq!(config.zero_effort, ZeroEffortPolicy::NotANumber);
        assert_eq!(config.excluded_cells.len(), 1);
        assert_eq!(config.areas.len(), 1);
        assert_eq!(config.files.catches, "fish.csv");
        assert_eq!(config.files.trips, "trips.csv");
        assert_eq!(config.min_angler_hours, None);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ProtocolConfig::from_toml_str("min_drift_minutes = -1.0").is_err());
        assert!(ProtocolConfig::from_toml_str("[areas]").is_err());
        assert!(ProtocolConfig::from_toml_str("unknown_key = 1").is_err());
        assert!(ProtocolConfig::from_toml_str("zero_effort = \"skip\"").is_err());
    }

    #[test]
    fn area_lookup_has_one_row_per_code() {
        let df = ProtocolConfig::default().area_lookup().unwrap();
        assert_eq!(df.height(), 16);
        assert_eq!(df.width(), 2);
    }
}
