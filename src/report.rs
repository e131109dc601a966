//! Long-form reshape of the CPUE table and the angler-count summary that
//! the comparison plots are drawn from.

use polars::prelude::*;

use crate::cpue::{key_columns, CpueTable};
use crate::error::CpueError;
use crate::schema::{cpue, report};

/// One row per drift × (species | Total), key columns kept as identifiers.
pub fn to_long(table: &CpueTable) -> Result<DataFrame, CpueError> {
    let width = table.species.len() + 1;
    let repeated = table
        .rows
        .iter()
        .flat_map(|r| std::iter::repeat(&r.effort).take(width));

    let mut species: Vec<&str> = Vec::with_capacity(table.rows.len() * width);
    let mut values: Vec<f64> = Vec::with_capacity(table.rows.len() * width);
    for row in &table.rows {
        for (name, value) in table.species.iter().zip(&row.cpue) {
            species.push(name);
            values.push(*value);
        }
        species.push(cpue::TOTAL);
        values.push(row.total_cpue);
    }

    let mut columns = key_columns(repeated);
    columns.push(Series::new(report::SPECIES.into(), species).into());
    columns.push(Series::new(report::CPUE.into(), values).into());
    Ok(DataFrame::new(columns)?)
}

/// Keep the Total rows of a long-form table.
pub fn total_only(long: &DataFrame) -> Result<DataFrame, CpueError> {
    let df = long
        .clone()
        .lazy()
        .filter(col(report::SPECIES).eq(lit(cpue::TOTAL)))
        .collect()?;
    Ok(df)
}

/// Drift count, mean and standard deviation of Total CPUE, and mean fish
/// caught, per (area, site, anglers fishing). Expects [`total_only`] rows.
pub fn summarize_by_anglers(totals: &DataFrame) -> Result<DataFrame, CpueError> {
    let df = totals
        .clone()
        .lazy()
        .group_by([col(cpue::AREA), col(cpue::SITE), col(cpue::TOTAL_ANGLERS)])
        .agg([
            col(report::CPUE)
                .count()
                .cast(DataType::Int64)
                .alias(report::DRIFTS),
            col(report::CPUE).mean().alias(report::MEAN_TOTAL_CPUE),
            col(report::CPUE).std(1).alias(report::SD_TOTAL_CPUE),
            col(cpue::TOTAL_FISHES_CAUGHT)
                .cast(DataType::Float64)
                .mean()
                .alias(report::MEAN_FISHES_CAUGHT),
        ])
        .sort_by_exprs(
            [col(cpue::AREA), col(cpue::SITE), col(cpue::TOTAL_ANGLERS)],
            SortMultipleOptions::default(),
        )
        .collect()?;
    Ok(df)
}
