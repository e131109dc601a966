use std::cmp::Ordering;

use polars::prelude::*;

use crate::error::CpueError;
use crate::schema::clean;

/// Summed angler-hours for one drift.
#[derive(Debug, Clone, PartialEq)]
pub struct EffortRecord {
    pub area: String,
    pub site: Option<String>,
    pub year: Option<i64>,
    pub drift_id: String,
    pub anglers: Option<i64>,
    pub fishes_caught: Option<i64>,
    pub grid_cell_id: Option<String>,
    pub angler_hours: f64,
}

impl EffortRecord {
    /// Output order: area, site, year, drift id.
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        (&self.area, &self.site, self.year, &self.drift_id, self.anglers, self.fishes_caught)
            .cmp(&(
                &other.area,
                &other.site,
                other.year,
                &other.drift_id,
                other.anglers,
                other.fishes_caught,
            ))
    }
}

const GROUP_KEYS: [&str; 7] = [
    clean::AREA,
    clean::SITE,
    clean::YEAR,
    clean::DRIFT_ID,
    clean::TOTAL_ANGLERS,
    clean::TOTAL_FISHES_CAUGHT,
    clean::GRID_CELL_ID,
];

/// Sum angler-hours per drift over the clean drift table.
///
/// Repeated rows of one drift (sub-drift entries) collapse into one record.
/// The grid cell id rides along as a key; it never splits a drift.
pub fn aggregate_effort(clean_drifts: &DataFrame) -> Result<DataFrame, CpueError> {
    let df = clean_drifts
        .clone()
        .lazy()
        .group_by_stable(GROUP_KEYS.iter().map(|c| col(*c)).collect::<Vec<_>>())
        .agg([col(clean::TOTAL_ANGLER_HOURS).sum()])
        .collect()?;
    Ok(df)
}

/// Typed effort records, sorted by area, site, year and drift id.
pub fn effort_records(effort: &DataFrame) -> Result<Vec<EffortRecord>, CpueError> {
    let area = effort.column(clean::AREA)?.str()?;
    let site = effort.column(clean::SITE)?.str()?;
    let year = effort.column(clean::YEAR)?.i64()?;
    let drift_id = effort.column(clean::DRIFT_ID)?.str()?;
    let anglers = effort.column(clean::TOTAL_ANGLERS)?.i64()?;
    let fishes = effort.column(clean::TOTAL_FISHES_CAUGHT)?.i64()?;
    let grid_cell = effort.column(clean::GRID_CELL_ID)?.str()?;
    let hours = effort.column(clean::TOTAL_ANGLER_HOURS)?.f64()?;

    let mut records = Vec::with_capacity(effort.height());
    for i in 0..effort.height() {
        let area = area
            .get(i)
            .ok_or_else(|| CpueError::InvalidData(format!("Null area in effort row {i}")))?;
        let drift_id = drift_id
            .get(i)
            .ok_or_else(|| CpueError::InvalidData(format!("Null drift id in effort row {i}")))?;
        records.push(EffortRecord {
            area: area.to_string(),
            site: site.get(i).map(str::to_string),
            year: year.get(i),
            drift_id: drift_id.to_string(),
            anglers: anglers.get(i),
            fishes_caught: fishes.get(i),
            grid_cell_id: grid_cell.get(i).map(str::to_string),
            angler_hours: hours.get(i).unwrap_or(0.0),
        });
    }
    records.sort_by(|a, b| a.cmp_key(b));
    Ok(records)
}

/// Drop records at or below `min_hours` summed angler-hours.
/// Returns the kept records and the number dropped.
pub fn apply_min_angler_hours(
    records: Vec<EffortRecord>,
    min_hours: Option<f64>,
) -> (Vec<EffortRecord>, usize) {
    match min_hours {
        None => (records, 0),
        Some(min) => {
            let before = records.len();
            let kept: Vec<EffortRecord> = records
                .into_iter()
                .filter(|r| r.angler_hours > min)
                .collect();
            let dropped = before - kept.len();
            (kept, dropped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_drifts() -> DataFrame {
        df!(
            clean::AREA => ["Point Buchon", "Point Buchon", "Point Buchon", "Anacapa Island"],
            clean::SITE => ["MPA", "MPA", "REF", "MPA"],
            clean::YEAR => [2019i64, 2019, 2019, 2020],
            clean::DRIFT_ID => ["D1", "D1", "D2", "D3"],
            clean::TOTAL_ANGLERS => [6i64, 6, 5, 4],
            clean::TOTAL_FISHES_CAUGHT => [2i64, 2, 0, 1],
            clean::GRID_CELL_ID => ["BLM01", "BLM01", "BLR01", "AIM01"],
            clean::TOTAL_ANGLER_HOURS => [1.5f64, 2.5, 0.75, 2.0],
        )
        .unwrap()
    }

    #[test]
    fn sub_drift_rows_sum_into_one_record() {
        let effort = aggregate_effort(&clean_drifts()).unwrap();
        assert_eq!(effort.height(), 3);

        let records = effort_records(&effort).unwrap();
        let d1 = records.iter().find(|r| r.drift_id == "D1").unwrap();
        assert_eq!(d1.angler_hours, 4.0);
        assert_eq!(d1.grid_cell_id.as_deref(), Some("BLM01"));

        let zero_catch = records.iter().find(|r| r.drift_id == "D2").unwrap();
        assert_eq!(zero_catch.fishes_caught, Some(0));
    }

    #[test]
    fn records_are_sorted_by_area_first() {
        let records = effort_records(&aggregate_effort(&clean_drifts()).unwrap()).unwrap();
        let order: Vec<&str> = records.iter().map(|r| r.drift_id.as_str()).collect();
        assert_eq!(order, vec!["D3", "D1", "D2"]);
    }

    #[test]
    fn min_angler_hours_is_a_strict_bound() {
        let records = effort_records(&aggregate_effort(&clean_drifts()).unwrap()).unwrap();
        let (kept, dropped) = apply_min_angler_hours(records.clone(), Some(2.0));
        assert_eq!(dropped, 2);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].drift_id, "D1");

        let (kept, dropped) = apply_min_angler_hours(records, None);
        assert_eq!((kept.len(), dropped), (3, 0));
    }
}
