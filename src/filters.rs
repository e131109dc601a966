//! Trip, drift and catch filters.
//!
//! Drift validity is decided by a single expression, [`drift_exclusion_reason`],
//! applied through [`retain_valid_drifts`]. The CPUE catch filter does not
//! re-evaluate it; it keeps catch whose drift id is in the clean drift table,
//! so catch numerators and effort denominators cover the same drifts.

use std::collections::BTreeMap;

use log::debug;
use polars::prelude::*;

use crate::error::CpueError;
use crate::loader::{parse_float, parse_int, parse_str};
use crate::protocol::ProtocolConfig;
use crate::schema::{catch, clean, drift, reason, species, trip};

// ── Trips ───────────────────────────────────────────────────────────────────

/// Project trips and relabel area codes to area names.
///
/// Trips whose area code is not in the protocol's area table are dropped
/// without error.
pub fn filter_trips(raw: &DataFrame, protocol: &ProtocolConfig) -> Result<DataFrame, CpueError> {
    let df = raw
        .clone()
        .lazy()
        .select([
            parse_str(trip::TRIP_ID).alias(clean::TRIP_ID),
            parse_str(trip::AREA).alias(clean::AREA_CODE),
            parse_int(trip::MONTH).alias(clean::MONTH),
            parse_int(trip::DAY).alias(clean::DAY),
            parse_int(trip::YEAR).alias(clean::YEAR),
        ])
        .join(
            protocol.area_lookup()?.lazy(),
            [col(clean::AREA_CODE)],
            [col(clean::AREA_CODE)],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?;
    Ok(df)
}

// ── Drifts ──────────────────────────────────────────────────────────────────

/// Project the raw drift table to typed, canonically named columns.
pub fn project_drifts(raw: &DataFrame) -> LazyFrame {
    raw.clone()
        .lazy()
        .select([
            parse_str(drift::DRIFT_ID).alias(clean::DRIFT_ID),
            parse_str(drift::TRIP_ID).alias(clean::TRIP_ID),
            parse_str(drift::CELL_TRIP_ID).alias(clean::CELL_TRIP_ID),
            parse_str(drift::GRID_CELL_ID).alias(clean::GRID_CELL_ID),
            parse_str(drift::SITE).alias(clean::SITE),
            parse_float(drift::DRIFT_TIME_HRS).alias(clean::DRIFT_TIME_HRS),
            parse_int(drift::TOTAL_FISHES_CAUGHT).alias(clean::TOTAL_FISHES_CAUGHT),
            parse_float(drift::TOTAL_ANGLER_HRS).alias(clean::TOTAL_ANGLER_HOURS),
            parse_int(drift::TOTAL_ANGLERS).alias(clean::TOTAL_ANGLERS),
            parse_str(drift::EXCLUDED_COMMENT).alias(clean::EXCLUDED_COMMENT),
        ])
        .filter(col(clean::DRIFT_ID).is_not_null())
}

/// Why a drift is excluded, or null when it is retained.
///
/// Evaluated over canonical drift columns. Rules are checked in order:
/// non-blank exclusion comment, grid cell or cell-per-trip id in the
/// excluded set, then duration at or below the minimum (a missing duration
/// counts as too short).
pub fn drift_exclusion_reason(protocol: &ProtocolConfig) -> Result<Expr, CpueError> {
    let has_comment = col(clean::EXCLUDED_COMMENT)
        .str()
        .strip_chars(lit(" \t\r\n"))
        .neq(lit(""))
        .fill_null(lit(false));

    let cells = protocol.excluded_cells_list()?;
    let excluded_cell = col(clean::GRID_CELL_ID)
        .is_in(lit(cells.clone()), false)
        .fill_null(lit(false))
        .or(col(clean::CELL_TRIP_ID)
            .is_in(lit(cells), false)
            .fill_null(lit(false)));

    let too_short = col(clean::DRIFT_TIME_HRS)
        .is_null()
        .or(col(clean::DRIFT_TIME_HRS).lt_eq(lit(protocol.min_drift_hours())));

    Ok(when(has_comment)
        .then(lit(reason::COMMENT))
        .when(excluded_cell)
        .then(lit(reason::EXCLUDED_CELL))
        .when(too_short)
        .then(lit(reason::SHORT_DRIFT))
        .otherwise(lit(NULL).cast(DataType::String)))
}

/// Inner-join drift-level rows to clean trips, adding area and year.
fn join_clean_trips(lf: LazyFrame, trips: &DataFrame) -> LazyFrame {
    lf.join(
        trips
            .clone()
            .lazy()
            .select([col(clean::TRIP_ID), col(clean::AREA), col(clean::YEAR)]),
        [col(clean::TRIP_ID)],
        [col(clean::TRIP_ID)],
        JoinArgs::new(JoinType::Inner),
    )
}

/// Keep rows whose drift belongs to a clean trip and passes every exclusion
/// rule. Works on any frame carrying the canonical drift columns.
pub fn retain_valid_drifts(
    lf: LazyFrame,
    trips: &DataFrame,
    protocol: &ProtocolConfig,
) -> Result<LazyFrame, CpueError> {
    Ok(join_clean_trips(lf, trips).filter(drift_exclusion_reason(protocol)?.is_null()))
}

/// Clean drift table: drifts of clean trips that pass every exclusion rule,
/// including drifts that caught nothing.
pub fn filter_drifts(
    raw: &DataFrame,
    trips: &DataFrame,
    protocol: &ProtocolConfig,
) -> Result<DataFrame, CpueError> {
    let df = retain_valid_drifts(project_drifts(raw), trips, protocol)?.collect()?;
    debug!("{} of {} drift rows retained", df.height(), raw.height());
    Ok(df)
}

/// Drift rows removed by the filter, per reason. Rows whose trip was dropped
/// are counted under `"unknown trip"`.
pub fn drift_exclusion_counts(
    raw: &DataFrame,
    trips: &DataFrame,
    protocol: &ProtocolConfig,
) -> Result<BTreeMap<String, usize>, CpueError> {
    let projected = project_drifts(raw).collect()?;
    let labelled = join_clean_trips(projected.clone().lazy(), trips)
        .select([drift_exclusion_reason(protocol)?.alias(clean::EXCLUSION_REASON)])
        .collect()?;

    let mut counts: BTreeMap<String, usize> = reason::ALL
        .iter()
        .map(|r| (r.to_string(), 0))
        .collect();
    counts.insert(
        "unknown trip".to_string(),
        projected.height().saturating_sub(labelled.height()),
    );
    for r in labelled.column(clean::EXCLUSION_REASON)?.str()?.into_iter().flatten() {
        *counts.entry(r.to_string()).or_insert(0) += 1;
    }
    Ok(counts)
}

// ── Catch ───────────────────────────────────────────────────────────────────

/// Catch records joined to their drift and species name.
#[derive(Debug, Clone)]
pub struct CatchJoin {
    pub records: DataFrame,
    /// Catch records whose drift id matched no drift.
    pub without_drift: usize,
    /// Catch records (with a drift) whose species code has no lookup entry.
    pub unknown_species: usize,
}

/// All-catch variant: every catch record with a known drift and a known
/// species, before any exclusion rule. Used for comparisons outside CPUE.
pub fn all_catch(
    catches: &DataFrame,
    drifts: &DataFrame,
    species_lookup: &DataFrame,
) -> Result<CatchJoin, CpueError> {
    let records = catches.clone().lazy().select([
        parse_str(catch::SPECIES_CODE).alias(clean::SPECIES_CODE),
        parse_str(catch::DRIFT_ID).alias(clean::DRIFT_ID),
        parse_str(catch::STATION).alias(clean::STATION),
        parse_float(catch::LENGTH_CM).alias(clean::LENGTH_CM),
    ]);

    // Sub-drift entries repeat a drift id; one row per drift keeps catch
    // records from being duplicated by the join.
    let one_per_drift = project_drifts(drifts)
        .group_by_stable([col(clean::DRIFT_ID)])
        .agg([
            col(clean::TRIP_ID).first(),
            col(clean::CELL_TRIP_ID).first(),
            col(clean::GRID_CELL_ID).first(),
            col(clean::SITE).first(),
            col(clean::DRIFT_TIME_HRS).first(),
            col(clean::TOTAL_FISHES_CAUGHT).first(),
            col(clean::TOTAL_ANGLER_HOURS).first(),
            col(clean::TOTAL_ANGLERS).first(),
            col(clean::EXCLUDED_COMMENT).first(),
        ]);

    let names = species_lookup
        .clone()
        .lazy()
        .select([
            parse_str(species::SPECIES_CODE).alias(clean::SPECIES_CODE),
            parse_str(species::COMMON_NAME).alias(clean::COMMON_NAME),
        ])
        .filter(col(clean::COMMON_NAME).is_not_null())
        .group_by_stable([col(clean::SPECIES_CODE)])
        .agg([col(clean::COMMON_NAME).first()]);

    let with_drift = records
        .join(
            one_per_drift,
            [col(clean::DRIFT_ID)],
            [col(clean::DRIFT_ID)],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?;

    let with_species = with_drift
        .clone()
        .lazy()
        .join(
            names,
            [col(clean::SPECIES_CODE)],
            [col(clean::SPECIES_CODE)],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?;

    Ok(CatchJoin {
        without_drift: catches.height().saturating_sub(with_drift.height()),
        unknown_species: with_drift.height().saturating_sub(with_species.height()),
        records: with_species,
    })
}

/// CPUE variant: all-catch records whose drift id survived the drift filter.
///
/// Validity is taken from `clean_drifts` once per drift id, so a drift whose
/// sub-drift rows are partly excluded keeps its catch whenever any of its
/// rows counts as effort. Area and year come from the clean drift.
pub fn filter_cpue_catch(
    all_catch: &DataFrame,
    clean_drifts: &DataFrame,
) -> Result<DataFrame, CpueError> {
    let valid = clean_drifts
        .clone()
        .lazy()
        .group_by_stable([col(clean::DRIFT_ID)])
        .agg([col(clean::AREA).first(), col(clean::YEAR).first()]);

    let df = all_catch
        .clone()
        .lazy()
        .join(
            valid,
            [col(clean::DRIFT_ID)],
            [col(clean::DRIFT_ID)],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?;
    debug!("{} of {} catch records retained for CPUE", df.height(), all_catch.height());
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::read_csv_bytes;
    use std::collections::BTreeSet;

    const DRIFT_HEADER: &str = "Drift ID,Trip ID,ID Cell per Trip,Grid Cell ID,Site (MPA/REF),\
Drift Time (hrs),Total Fishes Caught,Total Angler Hrs,Total # Anglers Fishing,Excluded Drift Comment\n";

    fn trips() -> DataFrame {
        read_csv_bytes(
            "Trip ID,Area,Month,Day,Year Automatic\n\
             T1,BL,7,1,2019\n\
             T2,ZZ,7,2,2019\n\
             T3, PL ,8,3,2020\n",
        )
        .unwrap()
    }

    fn drifts(rows: &str) -> DataFrame {
        read_csv_bytes(format!("{DRIFT_HEADER}{rows}")).unwrap()
    }

    fn ids(df: &DataFrame) -> BTreeSet<String> {
        df.column(clean::DRIFT_ID)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .map(|s| s.to_string())
            .collect()
    }

    fn protocol() -> ProtocolConfig {
        let mut protocol = ProtocolConfig::default();
        protocol.excluded_cells = ["BLM01-X".to_string()].into_iter().collect();
        protocol
    }

    #[test]
    fn unknown_areas_are_dropped_and_codes_relabelled() {
        let clean = filter_trips(&trips(), &ProtocolConfig::default()).unwrap();
        assert_eq!(clean.height(), 2);
        let areas: Vec<&str> = clean
            .column(clean::AREA)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert!(areas.contains(&"Point Buchon"));
        assert!(areas.contains(&"Point Lobos"));
    }

    #[test]
    fn each_exclusion_rule_removes_its_drift() {
        let protocol = protocol();
        let clean_trips = filter_trips(&trips(), &protocol).unwrap();
        let raw = drifts(
            "D1,T1,BLM0101,BLM01,MPA,0.25,3,1.5,6,\n\
             D2,T1,BLM0102,BLM01,MPA,0.25,3,1.5,6,drifted out of cell\n\
             D3,T1,BLM0103,BLM01-X,MPA,0.25,3,1.5,6,\n\
             D4,T1,BLM0104,BLM01,MPA,0.01,0,0.06,6,\n\
             D5,T2,ZZM0101,ZZM01,REF,0.25,1,1.5,6,\n\
             D6,T3,PLR0101,PLR01,REF,0.25,0,1.5,6,  \n\
             D7,T3,PLR0102,PLR01,REF,,0,1.5,6,\n",
        );

        let clean = filter_drifts(&raw, &clean_trips, &protocol).unwrap();
        assert_eq!(ids(&clean), ["D1", "D6"].iter().map(|s| s.to_string()).collect());

        let counts = drift_exclusion_counts(&raw, &clean_trips, &protocol).unwrap();
        assert_eq!(counts[reason::COMMENT], 1);
        assert_eq!(counts[reason::EXCLUDED_CELL], 1);
        assert_eq!(counts[reason::SHORT_DRIFT], 2);
        assert_eq!(counts["unknown trip"], 1);
    }

    #[test]
    fn two_minute_threshold_is_strict() {
        let protocol = protocol();
        let clean_trips = filter_trips(&trips(), &protocol).unwrap();
        let exactly_two = 2.0 / 60.0;
        let just_over = 2.01 / 60.0;
        let raw = drifts(&format!(
            "D1,T1,BLM0101,BLM01,MPA,{exactly_two},0,0.5,6,\n\
             D2,T1,BLM0102,BLM01,MPA,{just_over},0,0.5,6,\n"
        ));

        let clean = filter_drifts(&raw, &clean_trips, &protocol).unwrap();
        assert_eq!(ids(&clean), ["D2"].iter().map(|s| s.to_string()).collect());
    }

    #[test]
    fn cell_per_trip_ids_are_excluded_too() {
        let mut protocol = protocol();
        protocol.excluded_cells = ["BLM0102".to_string()].into_iter().collect();
        let clean_trips = filter_trips(&trips(), &protocol).unwrap();
        let raw = drifts(
            "D1,T1,BLM0101,BLM01,MPA,0.25,0,1.5,6,\n\
             D2,T1,BLM0102,BLM01,MPA,0.25,0,1.5,6,\n",
        );
        let clean = filter_drifts(&raw, &clean_trips, &protocol).unwrap();
        assert_eq!(ids(&clean), ["D1"].iter().map(|s| s.to_string()).collect());
    }

    #[test]
    fn catch_variants_share_the_drift_rule() {
        let protocol = protocol();
        let clean_trips = filter_trips(&trips(), &protocol).unwrap();
        let raw = drifts(
            "D1,T1,BLM0101,BLM01,MPA,0.25,2,1.5,6,\n\
             D1,T1,BLM0101,BLM01,MPA,0.25,2,1.5,6,\n\
             D2,T1,BLM0102,BLM01,MPA,0.25,1,1.5,6,bad drift\n",
        );
        let catches = read_csv_bytes(
            "Species Code,Drift ID,Station,Length (cm)\n\
             KLPB,D1,1,30\n\
             KLPB,D1,2,28\n\
             KLPB,D2,3,31\n\
             XXXX,D1,4,20\n\
             KLPB,D9,5,25\n",
        )
        .unwrap();
        let lookup = read_csv_bytes("Species Code,Common Name\nKLPB,Kelp Bass\n").unwrap();

        let joined = all_catch(&catches, &raw, &lookup).unwrap();
        assert_eq!(joined.records.height(), 3);
        assert_eq!(joined.without_drift, 1);
        assert_eq!(joined.unknown_species, 1);

        let clean = filter_drifts(&raw, &clean_trips, &protocol).unwrap();
        let cpue_catch = filter_cpue_catch(&joined.records, &clean).unwrap();
        assert_eq!(cpue_catch.height(), 2);
        assert!(ids(&cpue_catch).is_subset(&ids(&clean)));
    }

    #[test]
    fn drift_with_a_short_first_row_keeps_its_catch() {
        let protocol = protocol();
        let clean_trips = filter_trips(&trips(), &protocol).unwrap();
        let raw = drifts(
            "D1,T1,BLM0101,BLM01,MPA,0.01,2,0.06,6,\n\
             D1,T1,BLM0101,BLM01,MPA,0.25,2,1.5,6,\n\
             D2,T1,BLM0102,BLM01,MPA,0.25,1,1.5,6,\n\
             D2,T1,BLM0102,BLM01,MPA,0.01,1,0.06,6,\n",
        );
        let catches = read_csv_bytes(
            "Species Code,Drift ID,Station,Length (cm)\n\
             KLPB,D1,1,30\n\
             KLPB,D1,2,28\n\
             KLPB,D2,3,31\n",
        )
        .unwrap();
        let lookup = read_csv_bytes("Species Code,Common Name\nKLPB,Kelp Bass\n").unwrap();

        let clean = filter_drifts(&raw, &clean_trips, &protocol).unwrap();
        assert_eq!(clean.height(), 2);

        let joined = all_catch(&catches, &raw, &lookup).unwrap();
        let cpue_catch = filter_cpue_catch(&joined.records, &clean).unwrap();
        assert_eq!(cpue_catch.height(), 3);
        assert_eq!(ids(&cpue_catch), ids(&clean));
        assert!(cpue_catch.column(clean::AREA).is_ok());
    }
}
