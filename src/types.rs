//! Core types for the snapshot pipeline
//!
//! This module defines the data structures that flow from the individuals table
//! into the flattener: per-person activity visits and the slot ordering mode.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Globally unique place identifier spanning every activity category
pub type GlobalPlaceId = u32;

/// Visits of one individual within one activity category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityVisits {
    /// Category-local venue ids, in the order the individual lists them
    pub venues: Vec<i64>,
    /// Share of the category's time spent at each venue (parallel to `venues`)
    pub flows: Vec<f64>,
    /// Share of the individual's total time spent in this category
    pub duration: f64,
}

impl ActivityVisits {
    pub fn new(venues: Vec<i64>, flows: Vec<f64>, duration: f64) -> Self {
        Self {
            venues,
            flows,
            duration,
        }
    }

    /// Number of venues visited in this category
    pub fn len(&self) -> usize {
        self.venues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }
}

/// A person together with the categories they participate in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Unique person id
    pub id: u64,
    /// Visits keyed by category name
    pub activities: BTreeMap<String, ActivityVisits>,
}

impl Individual {
    /// Create an individual that participates in no category yet
    pub fn new(id: u64) -> Self {
        Self {
            id,
            activities: BTreeMap::new(),
        }
    }

    /// Add (or replace) the visits for one category
    pub fn with_activity(mut self, category: impl Into<String>, visits: ActivityVisits) -> Self {
        self.activities.insert(category.into(), visits);
        self
    }

    /// Visits for a category, if the individual participates in it
    pub fn visits(&self, category: &str) -> Option<&ActivityVisits> {
        self.activities.get(category)
    }

    /// Venue count in a category (0 when not participating)
    pub fn venue_count(&self, category: &str) -> usize {
        self.visits(category).map_or(0, ActivityVisits::len)
    }
}

/// Ordering of the real (non-padding) slots inside a snapshot row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotOrder {
    /// Category blocks in category order, venues in their listed order
    #[default]
    CategoryOrder,
    /// Real slots stably sorted by combined weight, heaviest first;
    /// padding stays at the end of the row
    WeightDescending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_count_for_missing_category() {
        let person = Individual::new(7).with_activity(
            "Home",
            ActivityVisits::new(vec![2], vec![1.0], 0.6),
        );

        assert_eq!(person.venue_count("Home"), 1);
        assert_eq!(person.venue_count("Retail"), 0);
        assert!(person.visits("Retail").is_none());
    }

    #[test]
    fn test_slot_order_serialization() {
        let json = serde_json::to_string(&SlotOrder::WeightDescending).unwrap();
        assert_eq!(json, "\"weight_descending\"");
        assert_eq!(SlotOrder::default(), SlotOrder::CategoryOrder);
    }
}
