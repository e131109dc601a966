use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use log::{info, warn};
use polars::prelude::*;

use crate::cpue::{compute_cpue, CatchPivot, CpueTable};
use crate::effort::{aggregate_effort, apply_min_angler_hours, effort_records};
use crate::error::CpueError;
use crate::filters::{
    all_catch, drift_exclusion_counts, filter_cpue_catch, filter_drifts, filter_trips,
};
use crate::loader::SurveyTables;
use crate::protocol::ProtocolConfig;
use crate::report;

/// Rows dropped at each stage of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineAudit {
    pub trips_loaded: usize,
    pub trips_unknown_area: usize,
    pub drift_rows_loaded: usize,
    /// Drift rows removed, keyed by exclusion reason (plus "unknown trip").
    pub drift_rows_excluded: BTreeMap<String, usize>,
    pub drift_rows_retained: usize,
    pub effort_records: usize,
    pub below_min_angler_hours: usize,
    pub zero_effort_drifts: Vec<String>,
    pub catch_loaded: usize,
    pub catch_without_drift: usize,
    pub catch_unknown_species: usize,
    pub catch_retained_for_cpue: usize,
}

impl PipelineAudit {
    fn log(&self) {
        info!(
            "trips: {} loaded, {} kept",
            self.trips_loaded,
            self.trips_loaded - self.trips_unknown_area
        );
        if self.trips_unknown_area > 0 {
            warn!("{} trip(s) dropped for an unknown area code", self.trips_unknown_area);
        }
        info!(
            "drift rows: {} loaded, {} retained",
            self.drift_rows_loaded, self.drift_rows_retained
        );
        for (reason, n) in self.drift_rows_excluded.iter().filter(|(_, n)| **n > 0) {
            info!("  {n} drift row(s) excluded: {reason}");
        }
        info!("effort: {} drift record(s)", self.effort_records);
        if self.below_min_angler_hours > 0 {
            info!(
                "{} drift(s) at or below the minimum angler-hours",
                self.below_min_angler_hours
            );
        }
        info!(
            "catch: {} loaded, {} retained for CPUE",
            self.catch_loaded, self.catch_retained_for_cpue
        );
        if self.catch_without_drift > 0 {
            warn!("{} catch record(s) reference no known drift", self.catch_without_drift);
        }
        if self.catch_unknown_species > 0 {
            warn!(
                "{} catch record(s) have an unknown species code",
                self.catch_unknown_species
            );
        }
    }
}

/// Everything a run produces. Frames are kept so callers can write or
/// inspect any intermediate table.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub clean_trips: DataFrame,
    pub clean_drifts: DataFrame,
    /// Angler-hours per drift, before the optional angler-hours bound.
    pub effort: DataFrame,
    pub all_catch: DataFrame,
    pub cpue_catch: DataFrame,
    pub cpue: CpueTable,
    pub audit: PipelineAudit,
}

impl PipelineOutput {
    /// Wide CPUE summary table, the canonical output.
    pub fn cpue_frame(&self) -> Result<DataFrame, CpueError> {
        self.cpue.to_frame()
    }

    /// Long-form CPUE restricted to the Total rows.
    pub fn total_long(&self) -> Result<DataFrame, CpueError> {
        report::total_only(&report::to_long(&self.cpue)?)
    }

    pub fn angler_summary(&self) -> Result<DataFrame, CpueError> {
        report::summarize_by_anglers(&self.total_long()?)
    }
}

pub struct CpuePipeline {
    protocol: ProtocolConfig,
}

impl CpuePipeline {
    pub fn new(protocol: ProtocolConfig) -> Result<Self, CpueError> {
        protocol.validate()?;
        if protocol.uses_placeholder_cells() {
            warn!(
                "excluded_cells is the built-in placeholder list; set the protocol's \
                 cell ids in the config file"
            );
        }
        Ok(Self { protocol })
    }

    pub fn protocol(&self) -> &ProtocolConfig {
        &self.protocol
    }

    /// Load the tables named by the protocol's `files` from `base_path`.
    pub fn load(&self, base_path: &Path) -> Result<SurveyTables, CpueError> {
        SurveyTables::load(base_path, &self.protocol.files)
    }

    pub fn run(&self, tables: &SurveyTables) -> Result<PipelineOutput, CpueError> {
        let protocol = &self.protocol;
        let mut audit = PipelineAudit {
            trips_loaded: tables.trips.height(),
            drift_rows_loaded: tables.drifts.height(),
            catch_loaded: tables.catches.height(),
            ..Default::default()
        };

        let clean_trips = filter_trips(&tables.trips, protocol)?;
        audit.trips_unknown_area = audit.trips_loaded.saturating_sub(clean_trips.height());

        let clean_drifts = filter_drifts(&tables.drifts, &clean_trips, protocol)?;
        audit.drift_rows_excluded = drift_exclusion_counts(&tables.drifts, &clean_trips, protocol)?;
        audit.drift_rows_retained = clean_drifts.height();

        let effort = aggregate_effort(&clean_drifts)?;
        let (records, below_min) =
            apply_min_angler_hours(effort_records(&effort)?, protocol.min_angler_hours);
        audit.below_min_angler_hours = below_min;
        audit.effort_records = records.len();

        let catch = all_catch(&tables.catches, &tables.drifts, &tables.species)?;
        audit.catch_without_drift = catch.without_drift;
        audit.catch_unknown_species = catch.unknown_species;

        let cpue_catch = filter_cpue_catch(&catch.records, &clean_drifts)?;
        audit.catch_retained_for_cpue = cpue_catch.height();

        let pivot = CatchPivot::from_catch(&cpue_catch)?;
        let (cpue, zero_effort) = compute_cpue(&records, &pivot, protocol.zero_effort);
        audit.zero_effort_drifts = zero_effort;

        audit.log();
        info!(
            "CPUE: {} drift(s) × {} species",
            cpue.rows.len(),
            cpue.species.len()
        );

        Ok(PipelineOutput {
            clean_trips,
            clean_drifts,
            effort,
            all_catch: catch.records,
            cpue_catch,
            cpue,
            audit,
        })
    }
}

/// Write a frame as CSV, or as Parquet when the path ends in `.parquet`.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<(), CpueError> {
    let mut file = File::create(path)?;
    let is_parquet = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        ParquetWriter::new(&mut file).finish(df)?;
    } else {
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
    }
    info!("wrote {} rows to {}", df.height(), path.display());
    Ok(())
}
