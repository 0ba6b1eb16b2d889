//! Activity category registry
//!
//! An activity category owns a table of locations whose row order defines the
//! category-local ids `0..count`. Only the row count matters for global id
//! assignment, so the indexer consumes anything implementing [`LocationTable`].

use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};

/// Trait for anything that can act as a category's location table
pub trait LocationTable {
    /// Category name (registry key)
    fn name(&self) -> &str;

    /// Number of locations, i.e. the size of the local id range
    fn location_count(&self) -> usize;

    /// Check that the table can be indexed by row position
    fn validate(&self) -> Result<(), SnapshotError> {
        Ok(())
    }
}

/// A single location record
///
/// `id` is the category-local id and must equal the record's row position;
/// [`LocationTable::validate`] rejects tables where it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: usize,
}

/// Category with an explicit location table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCategory {
    pub name: String,
    pub locations: Vec<Location>,
}

impl ActivityCategory {
    /// Build a category with `count` locations numbered `0..count`
    pub fn with_locations(name: impl Into<String>, count: usize) -> Self {
        Self {
            name: name.into(),
            locations: (0..count).map(|id| Location { id }).collect(),
        }
    }
}

impl LocationTable for ActivityCategory {
    fn name(&self) -> &str {
        &self.name
    }

    fn location_count(&self) -> usize {
        self.locations.len()
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        match self
            .locations
            .iter()
            .enumerate()
            .find(|(row, location)| location.id != *row)
        {
            Some((row, location)) => Err(SnapshotError::NonContiguousLocations {
                category: self.name.clone(),
                row,
                id: location.id,
            }),
            None => Ok(()),
        }
    }
}

/// Category reduced to what the indexer needs: a name and a location count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDescriptor {
    pub name: String,
    pub location_count: usize,
}

impl CategoryDescriptor {
    pub fn new(name: impl Into<String>, location_count: usize) -> Self {
        Self {
            name: name.into(),
            location_count,
        }
    }

    /// Describe any location table
    pub fn from_table<T: LocationTable + ?Sized>(table: &T) -> Self {
        Self::new(table.name(), table.location_count())
    }
}

impl LocationTable for CategoryDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn location_count(&self) -> usize {
        self.location_count
    }
}
