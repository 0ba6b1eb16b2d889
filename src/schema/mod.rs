//! Individuals table schema
//!
//! The individuals table is wide: one record per person with an `ID` column and,
//! for every activity category, a venue list, a flow list and a duration scalar
//! named after the category (`Retail_Venues`, `Retail_Flows`, `Retail_Duration`).
//! Any other column (age, area, ...) is carried by the loader but ignored here.

mod individuals;

pub use individuals::*;

/// Person id column
pub const ID_COLUMN: &str = "ID";

// ── Per-category column suffixes ────────────────────────────────────────────
pub const VENUES_SUFFIX: &str = "_Venues";
pub const FLOWS_SUFFIX: &str = "_Flows";
pub const DURATION_SUFFIX: &str = "_Duration";

/// Venue-list column name for a category
pub fn venues_column(category: &str) -> String {
    format!("{category}{VENUES_SUFFIX}")
}

/// Flow-list column name for a category
pub fn flows_column(category: &str) -> String {
    format!("{category}{FLOWS_SUFFIX}")
}

/// Duration column name for a category
pub fn duration_column(category: &str) -> String {
    format!("{category}{DURATION_SUFFIX}")
}
