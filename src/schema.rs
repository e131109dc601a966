//! Column-name constants for the CPUE pipeline.
//! Single source of truth - the raw headers are the wire format of the
//! survey database exports and must match verbatim.

// ── Raw trip table ──────────────────────────────────────────────────────────
pub mod trip {
    pub const TRIP_ID: &str = "Trip ID";
    pub const AREA: &str = "Area";
    pub const MONTH: &str = "Month";
    pub const DAY: &str = "Day";
    pub const YEAR: &str = "Year Automatic";

    pub const REQUIRED: [&str; 5] = [TRIP_ID, AREA, MONTH, DAY, YEAR];
}

// ── Raw drift table ─────────────────────────────────────────────────────────
pub mod drift {
    pub const DRIFT_ID: &str = "Drift ID";
    pub const TRIP_ID: &str = "Trip ID";
    pub const CELL_TRIP_ID: &str = "ID Cell per Trip";
    pub const GRID_CELL_ID: &str = "Grid Cell ID";
    pub const SITE: &str = "Site (MPA/REF)";
    pub const DRIFT_TIME_HRS: &str = "Drift Time (hrs)";
    pub const TOTAL_FISHES_CAUGHT: &str = "Total Fishes Caught";
    pub const TOTAL_ANGLER_HRS: &str = "Total Angler Hrs";
    pub const TOTAL_ANGLERS: &str = "Total # Anglers Fishing";
    pub const EXCLUDED_COMMENT: &str = "Excluded Drift Comment";

    /// The exclusion comment is optional; every other column must be present.
    pub const REQUIRED: [&str; 9] = [
        DRIFT_ID,
        TRIP_ID,
        CELL_TRIP_ID,
        GRID_CELL_ID,
        SITE,
        DRIFT_TIME_HRS,
        TOTAL_FISHES_CAUGHT,
        TOTAL_ANGLER_HRS,
        TOTAL_ANGLERS,
    ];
}

// ── Raw catch table ─────────────────────────────────────────────────────────
pub mod catch {
    pub const SPECIES_CODE: &str = "Species Code";
    pub const DRIFT_ID: &str = "Drift ID";
    pub const STATION: &str = "Station";
    pub const LENGTH_CM: &str = "Length (cm)";

    pub const REQUIRED: [&str; 4] = [SPECIES_CODE, DRIFT_ID, STATION, LENGTH_CM];
}

// ── Species lookup table ────────────────────────────────────────────────────
pub mod species {
    pub const SPECIES_CODE: &str = "Species Code";
    pub const COMMON_NAME: &str = "Common Name";

    pub const REQUIRED: [&str; 2] = [SPECIES_CODE, COMMON_NAME];
}

// ── Canonical columns used between stages ───────────────────────────────────
pub mod clean {
    pub const TRIP_ID: &str = "Trip ID";
    pub const AREA_CODE: &str = "Area Code";
    pub const AREA: &str = "Area";
    pub const MONTH: &str = "Month";
    pub const DAY: &str = "Day";
    pub const YEAR: &str = "Year";

    pub const DRIFT_ID: &str = "Drift ID";
    pub const CELL_TRIP_ID: &str = "ID Cell per Trip";
    pub const GRID_CELL_ID: &str = "Grid Cell ID";
    pub const SITE: &str = "Site";
    pub const DRIFT_TIME_HRS: &str = "Drift Time Hrs";
    pub const TOTAL_FISHES_CAUGHT: &str = "Total Fishes Caught";
    pub const TOTAL_ANGLER_HOURS: &str = "Total Angler Hours";
    pub const TOTAL_ANGLERS: &str = "Total Anglers";
    pub const EXCLUDED_COMMENT: &str = "Excluded Drift Comment";
    pub const EXCLUSION_REASON: &str = "Exclusion Reason";

    pub const SPECIES_CODE: &str = "Species Code";
    pub const COMMON_NAME: &str = "Common Name";
    pub const STATION: &str = "Station";
    pub const LENGTH_CM: &str = "Length cm";
    pub const CATCH_COUNT: &str = "Catch Count";
}

// ── CPUE output table ───────────────────────────────────────────────────────
pub mod cpue {
    pub use super::clean::{
        AREA, DRIFT_ID, GRID_CELL_ID, SITE, TOTAL_ANGLERS, TOTAL_ANGLER_HOURS,
        TOTAL_FISHES_CAUGHT, YEAR,
    };

    pub const TOTAL: &str = "Total";

    /// Key prefix of every CPUE row, in output order.
    pub const KEYS: [&str; 8] = [
        AREA,
        SITE,
        YEAR,
        DRIFT_ID,
        TOTAL_ANGLERS,
        TOTAL_FISHES_CAUGHT,
        TOTAL_ANGLER_HOURS,
        GRID_CELL_ID,
    ];
}

// ── Long-form and summary tables ────────────────────────────────────────────
pub mod report {
    pub const SPECIES: &str = "Species";
    pub const CPUE: &str = "CPUE";

    pub const DRIFTS: &str = "Drifts";
    pub const MEAN_TOTAL_CPUE: &str = "Mean Total CPUE";
    pub const SD_TOTAL_CPUE: &str = "SD Total CPUE";
    pub const MEAN_FISHES_CAUGHT: &str = "Mean Fishes Caught";
}

// ── Exclusion reasons ───────────────────────────────────────────────────────
pub mod reason {
    pub const COMMENT: &str = "exclusion comment";
    pub const EXCLUDED_CELL: &str = "excluded cell";
    pub const SHORT_DRIFT: &str = "short drift";

    pub const ALL: [&str; 3] = [COMMENT, EXCLUDED_CELL, SHORT_DRIFT];
}
