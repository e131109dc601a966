use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use polars::prelude::*;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::error::CpueError;
use crate::loader::{read_csv_as_strings, require_columns, SurveyTables};
use crate::pipeline::CpuePipeline;
use crate::protocol::ProtocolConfig;
use crate::schema::{catch, cpue, drift, report, species, trip};

#[pyclass]
pub struct CpueModel {
    base_path: PathBuf,
    pipeline: CpuePipeline,
    trips: Option<DataFrame>,
    drifts: Option<DataFrame>,
    catches: Option<DataFrame>,
    species: Option<DataFrame>,
}

#[pymethods]
impl CpueModel {
    #[new]
    #[pyo3(signature = (base_path, config_path=None))]
    fn new(base_path: String, config_path: Option<String>) -> PyResult<Self> {
        let protocol = match config_path {
            Some(path) => ProtocolConfig::load(&PathBuf::from(path))?,
            None => ProtocolConfig::default(),
        };
        Ok(Self {
            base_path: PathBuf::from(base_path),
            pipeline: CpuePipeline::new(protocol)?,
            trips: None,
            drifts: None,
            catches: None,
            species: None,
        })
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load the trip table. Required columns: Trip ID, Area, Month, Day,
    /// Year Automatic. All columns are loaded as strings.
    #[pyo3(signature = (filename=None))]
    fn load_trips(&mut self, filename: Option<&str>) -> PyResult<PyDataFrame> {
        let fname = filename.unwrap_or(&self.pipeline.protocol().files.trips).to_string();
        let df = self.read_table(&fname, &trip::REQUIRED)?;
        self.trips = Some(df.clone());
        Ok(PyDataFrame(df))
    }

    /// Load the drift table. The exclusion comment column is optional.
    #[pyo3(signature = (filename=None))]
    fn load_drifts(&mut self, filename: Option<&str>) -> PyResult<PyDataFrame> {
        let fname = filename.unwrap_or(&self.pipeline.protocol().files.drifts).to_string();
        let df = self.read_table(&fname, &drift::REQUIRED)?;
        self.drifts = Some(df.clone());
        Ok(PyDataFrame(df))
    }

    /// Load the catch table (one row per fish).
    #[pyo3(signature = (filename=None))]
    fn load_catches(&mut self, filename: Option<&str>) -> PyResult<PyDataFrame> {
        let fname = filename.unwrap_or(&self.pipeline.protocol().files.catches).to_string();
        let df = self.read_table(&fname, &catch::REQUIRED)?;
        self.catches = Some(df.clone());
        Ok(PyDataFrame(df))
    }

    /// Load the species code → common name lookup.
    #[pyo3(signature = (filename=None))]
    fn load_species(&mut self, filename: Option<&str>) -> PyResult<PyDataFrame> {
        let fname = filename.unwrap_or(&self.pipeline.protocol().files.species).to_string();
        let df = self.read_table(&fname, &species::REQUIRED)?;
        self.species = Some(df.clone());
        Ok(PyDataFrame(df))
    }

    // ── Pipeline ────────────────────────────────────────────────────────────

    /// Run the pipeline over the loaded tables.
    ///
    /// Returns a dict with keys:
    ///     cpue: one row per drift, one CPUE column per species, plus Total
    ///     long: long-form Total CPUE rows (for angler-count plots)
    ///     summary: Total CPUE summarized per (area, site, anglers)
    ///     all_catch: every catch record with a known drift and species
    fn run(&self) -> PyResult<HashMap<String, PyDataFrame>> {
        let tables = SurveyTables::from_frames(
            Self::loaded(&self.trips, "trips")?,
            Self::loaded(&self.drifts, "drifts")?,
            Self::loaded(&self.catches, "catches")?,
            Self::loaded(&self.species, "species")?,
        )?;
        let output = self.pipeline.run(&tables)?;

        let mut result = HashMap::new();
        result.insert("cpue".to_string(), PyDataFrame(output.cpue_frame()?));
        result.insert("long".to_string(), PyDataFrame(output.total_long()?));
        result.insert("summary".to_string(), PyDataFrame(output.angler_summary()?));
        result.insert("all_catch".to_string(), PyDataFrame(output.all_catch));
        Ok(result)
    }

    // ── Properties ──────────────────────────────────────────────────────────

    #[getter]
    fn areas(&self) -> BTreeMap<String, String> {
        self.pipeline.protocol().areas.clone()
    }

    #[getter]
    fn excluded_cells(&self) -> Vec<String> {
        self.pipeline.protocol().excluded_cells.iter().cloned().collect()
    }

    #[getter]
    fn min_drift_minutes(&self) -> f64 {
        self.pipeline.protocol().min_drift_minutes
    }
}

// ── Private helpers ─────────────────────────────────────────────────────────

impl CpueModel {
    fn read_table(&self, filename: &str, required: &[&str]) -> Result<DataFrame, CpueError> {
        let df = read_csv_as_strings(&self.base_path.join(filename))?;
        require_columns(&df, required)?;
        Ok(df)
    }

    fn loaded(df: &Option<DataFrame>, name: &str) -> Result<DataFrame, CpueError> {
        df.clone().ok_or_else(|| CpueError::NotLoaded(name.to_string()))
    }
}

/// Export output column names as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let columns = PyModule::new(m.py(), "cpue")?;
    columns.add("AREA", cpue::AREA)?;
    columns.add("SITE", cpue::SITE)?;
    columns.add("YEAR", cpue::YEAR)?;
    columns.add("DRIFT_ID", cpue::DRIFT_ID)?;
    columns.add("TOTAL_ANGLERS", cpue::TOTAL_ANGLERS)?;
    columns.add("TOTAL_FISHES_CAUGHT", cpue::TOTAL_FISHES_CAUGHT)?;
    columns.add("TOTAL_ANGLER_HOURS", cpue::TOTAL_ANGLER_HOURS)?;
    columns.add("GRID_CELL_ID", cpue::GRID_CELL_ID)?;
    columns.add("TOTAL", cpue::TOTAL)?;
    m.add_submodule(&columns)?;

    let long = PyModule::new(m.py(), "report")?;
    long.add("SPECIES", report::SPECIES)?;
    long.add("CPUE", report::CPUE)?;
    long.add("DRIFTS", report::DRIFTS)?;
    long.add("MEAN_TOTAL_CPUE", report::MEAN_TOTAL_CPUE)?;
    long.add("SD_TOTAL_CPUE", report::SD_TOTAL_CPUE)?;
    long.add("MEAN_FISHES_CAUGHT", report::MEAN_FISHES_CAUGHT)?;
    m.add_submodule(&long)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<CpueModel>()?;
    add_schema_exports(m)?;
    Ok(())
}
