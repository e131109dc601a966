//! Catch-per-unit-effort engine.
//!
//! Catch records are pivoted into a sparse drift → species → count map in
//! which an absent pair reads as zero. Every effort record then yields one
//! row: the count for every species observed anywhere in the CPUE catch
//! data, a Total of the raw counts, and both divided by the drift's summed
//! angler-hours.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::warn;
use polars::prelude::*;

use crate::effort::EffortRecord;
use crate::error::CpueError;
use crate::protocol::ZeroEffortPolicy;
use crate::schema::{clean, cpue};

// ── Pivot ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatchPivot {
    species: BTreeSet<String>,
    counts: HashMap<String, BTreeMap<String, u32>>,
}

impl CatchPivot {
    /// Count CPUE-variant catch records per (drift, species common name).
    pub fn from_catch(cpue_catch: &DataFrame) -> Result<Self, CpueError> {
        let grouped = cpue_catch
            .clone()
            .lazy()
            .group_by_stable([col(clean::DRIFT_ID), col(clean::COMMON_NAME)])
            .agg([col(clean::SPECIES_CODE)
                .count()
                .cast(DataType::Int64)
                .alias(clean::CATCH_COUNT)])
            .collect()?;

        let drift_ids = grouped.column(clean::DRIFT_ID)?.str()?;
        let names = grouped.column(clean::COMMON_NAME)?.str()?;
        let counts = grouped.column(clean::CATCH_COUNT)?.i64()?;

        let mut pivot = Self::default();
        for i in 0..grouped.height() {
            if let (Some(drift_id), Some(name), Some(n)) =
                (drift_ids.get(i), names.get(i), counts.get(i))
            {
                check_species_name(name)?;
                pivot.record(drift_id, name, u32::try_from(n).unwrap_or(u32::MAX));
            }
        }
        Ok(pivot)
    }

    /// Add `n` catches of `species` to `drift_id`.
    pub fn record(&mut self, drift_id: &str, species: &str, n: u32) {
        if !self.species.contains(species) {
            self.species.insert(species.to_string());
        }
        *self
            .counts
            .entry(drift_id.to_string())
            .or_default()
            .entry(species.to_string())
            .or_insert(0) += n;
    }

    /// Catch count for a (drift, species) pair; zero when never recorded.
    pub fn count(&self, drift_id: &str, species: &str) -> u32 {
        self.counts
            .get(drift_id)
            .and_then(|by_species| by_species.get(species))
            .copied()
            .unwrap_or(0)
    }

    /// Every species observed, sorted by name.
    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.species.iter().map(|s| s.as_str())
    }

    pub fn drift_ids(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(|s| s.as_str())
    }
}

/// Species become column names in the wide table, so a common name may not
/// repeat a key column or `Total`.
fn check_species_name(name: &str) -> Result<(), CpueError> {
    if name == cpue::TOTAL || cpue::KEYS.contains(&name) {
        return Err(CpueError::InvalidData(format!(
            "species common name '{name}' collides with the output column of the same name"
        )));
    }
    Ok(())
}

// ── CPUE table ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CpueRow {
    pub effort: EffortRecord,
    /// Raw counts, aligned with [`CpueTable::species`].
    pub counts: Vec<u32>,
    /// Catch per angler-hour, aligned with [`CpueTable::species`].
    pub cpue: Vec<f64>,
    pub total_count: u64,
    pub total_cpue: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpueTable {
    pub species: Vec<String>,
    pub rows: Vec<CpueRow>,
}

impl CpueTable {
    pub fn row(&self, drift_id: &str) -> Option<&CpueRow> {
        self.rows.iter().find(|r| r.effort.drift_id == drift_id)
    }

    /// CPUE of one species (or `"Total"`) for a drift.
    pub fn value(&self, drift_id: &str, species: &str) -> Option<f64> {
        let row = self.row(drift_id)?;
        if species == cpue::TOTAL {
            return Some(row.total_cpue);
        }
        let idx = self.species.iter().position(|s| s == species)?;
        Some(row.cpue[idx])
    }

    /// Wide output frame: key columns, one column per species, then Total.
    pub fn to_frame(&self) -> Result<DataFrame, CpueError> {
        for name in &self.species {
            check_species_name(name)?;
        }
        let mut columns = key_columns(self.rows.iter().map(|r| &r.effort));
        for (idx, name) in self.species.iter().enumerate() {
            let values: Vec<f64> = self.rows.iter().map(|r| r.cpue[idx]).collect();
            columns.push(Series::new(name.as_str().into(), values).into());
        }
        let totals: Vec<f64> = self.rows.iter().map(|r| r.total_cpue).collect();
        columns.push(Series::new(cpue::TOTAL.into(), totals).into());
        Ok(DataFrame::new(columns)?)
    }
}

/// The eight key columns of [`cpue::KEYS`] for a sequence of effort records.
pub(crate) fn key_columns<'a>(records: impl Iterator<Item = &'a EffortRecord> + Clone) -> Vec<Column> {
    let area: Vec<&str> = records.clone().map(|r| r.area.as_str()).collect();
    let site: Vec<Option<&str>> = records.clone().map(|r| r.site.as_deref()).collect();
    let year: Vec<Option<i64>> = records.clone().map(|r| r.year).collect();
    let drift_id: Vec<&str> = records.clone().map(|r| r.drift_id.as_str()).collect();
    let anglers: Vec<Option<i64>> = records.clone().map(|r| r.anglers).collect();
    let fishes: Vec<Option<i64>> = records.clone().map(|r| r.fishes_caught).collect();
    let hours: Vec<f64> = records.clone().map(|r| r.angler_hours).collect();
    let grid_cell: Vec<Option<&str>> = records.map(|r| r.grid_cell_id.as_deref()).collect();

    vec![
        Series::new(cpue::AREA.into(), area).into(),
        Series::new(cpue::SITE.into(), site).into(),
        Series::new(cpue::YEAR.into(), year).into(),
        Series::new(cpue::DRIFT_ID.into(), drift_id).into(),
        Series::new(cpue::TOTAL_ANGLERS.into(), anglers).into(),
        Series::new(cpue::TOTAL_FISHES_CAUGHT.into(), fishes).into(),
        Series::new(cpue::TOTAL_ANGLER_HOURS.into(), hours).into(),
        Series::new(cpue::GRID_CELL_ID.into(), grid_cell).into(),
    ]
}

/// Merge effort with the catch pivot and normalize by angler-hours.
///
/// Every effort record produces a row, including drifts that caught nothing.
/// Drifts with zero angler-hours follow `policy`; the ids of drifts removed
/// under [`ZeroEffortPolicy::Drop`] are returned alongside the table.
pub fn compute_cpue(
    effort: &[EffortRecord],
    pivot: &CatchPivot,
    policy: ZeroEffortPolicy,
) -> (CpueTable, Vec<String>) {
    let species: Vec<String> = pivot.species().map(str::to_string).collect();
    let mut rows = Vec::with_capacity(effort.len());
    let mut dropped = Vec::new();

    for record in effort {
        let counts: Vec<u32> = species
            .iter()
            .map(|s| pivot.count(&record.drift_id, s))
            .collect();
        let total_count: u64 = counts.iter().map(|&c| u64::from(c)).sum();

        let hours = record.angler_hours;
        let (cpue, total_cpue) = if hours > 0.0 {
            (
                counts.iter().map(|&c| f64::from(c) / hours).collect(),
                total_count as f64 / hours,
            )
        } else {
            match policy {
                ZeroEffortPolicy::Drop => {
                    dropped.push(record.drift_id.clone());
                    continue;
                }
                ZeroEffortPolicy::NotANumber => (vec![f64::NAN; species.len()], f64::NAN),
            }
        };

        rows.push(CpueRow {
            effort: record.clone(),
            counts,
            cpue,
            total_count,
            total_cpue,
        });
    }

    if !dropped.is_empty() {
        warn!(
            "{} drift(s) with zero angler-hours removed before normalizing: {}",
            dropped.len(),
            dropped.join(", ")
        );
    }

    (CpueTable { species, rows }, dropped)
}
