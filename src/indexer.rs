//! Global place-id indexing
//!
//! Every activity category numbers its locations locally from zero. The indexer
//! lays the categories out back to back in a fixed order so that category `i`'s
//! local id `j` becomes `offset(i) + j`, where `offset(i)` is the sum of the
//! location counts of all earlier categories.

use crate::error::SnapshotError;
use crate::registry::{CategoryDescriptor, LocationTable};
use crate::types::GlobalPlaceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Contiguous block of global ids owned by one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpan {
    pub name: String,
    /// First global id of the category
    pub offset: GlobalPlaceId,
    /// Number of locations (width of the span)
    pub count: usize,
}

impl CategorySpan {
    /// Global id one past the end of the span
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.count as u64
    }

    fn contains(&self, global_id: GlobalPlaceId) -> bool {
        (global_id as u64) >= self.offset as u64 && (global_id as u64) < self.end()
    }
}

/// Immutable (category, local id) → global id lookup table
#[derive(Debug, Clone)]
pub struct GlobalIdIndexer {
    spans: Vec<CategorySpan>,
    by_name: HashMap<String, usize>,
}

impl GlobalIdIndexer {
    /// Build the offset table from categories in processing order.
    ///
    /// The order is taken as given; it decides every offset and must stay the
    /// same for as long as any produced global id is kept around.
    pub fn new(categories: &[CategoryDescriptor]) -> Result<Self, SnapshotError> {
        Self::from_tables(categories)
    }

    /// Build the offset table from any ordered slice of location tables
    pub fn from_tables<T: LocationTable>(tables: &[T]) -> Result<Self, SnapshotError> {
        let mut spans = Vec::with_capacity(tables.len());
        let mut by_name = HashMap::with_capacity(tables.len());
        let mut next_offset: u64 = 0;

        for table in tables {
            let name = table.name();
            if by_name.contains_key(name) {
                return Err(SnapshotError::DuplicateCategory(name.to_string()));
            }
            table.validate()?;

            let count = table.location_count();
            let end = next_offset + count as u64;
            // Ids are u32 and the last id of the span must fit
            if end > GlobalPlaceId::MAX as u64 + 1 {
                return Err(SnapshotError::IdSpaceExhausted(end));
            }

            // A span may end exactly at u32::MAX + 1, but no span can start there
            let offset = GlobalPlaceId::try_from(next_offset)
                .map_err(|_| SnapshotError::IdSpaceExhausted(end))?;

            by_name.insert(name.to_string(), spans.len());
            spans.push(CategorySpan {
                name: name.to_string(),
                offset,
                count,
            });
            next_offset = end;
        }

        debug!(
            categories = spans.len(),
            total_places = next_offset,
            "built global place-id offsets"
        );

        Ok(Self { spans, by_name })
    }

    /// Map a category-local id to its global id
    pub fn get_global_id(
        &self,
        category: &str,
        local_id: i64,
    ) -> Result<GlobalPlaceId, SnapshotError> {
        let span = self.span(category)?;
        if local_id < 0 || local_id as u64 >= span.count as u64 {
            return Err(SnapshotError::OutOfRange {
                category: category.to_string(),
                local_id,
                count: span.count,
            });
        }
        Ok(span.offset + local_id as GlobalPlaceId)
    }

    /// Inverse lookup: the category and local id a global id belongs to.
    ///
    /// Returns `None` for ids past the last category.
    pub fn locate(&self, global_id: GlobalPlaceId) -> Option<(&str, i64)> {
        // Offsets are non-decreasing; an empty category shares its offset with
        // the next span, so the last span starting at or before the id is the
        // only candidate.
        let idx = self
            .spans
            .partition_point(|span| span.offset <= global_id)
            .checked_sub(1)?;

        let span = &self.spans[idx];
        span.contains(global_id)
            .then(|| (span.name.as_str(), (global_id - span.offset) as i64))
    }

    /// Span of a named category
    pub fn span(&self, category: &str) -> Result<&CategorySpan, SnapshotError> {
        self.by_name
            .get(category)
            .map(|&idx| &self.spans[idx])
            .ok_or_else(|| SnapshotError::UnknownCategory(category.to_string()))
    }

    /// All spans, in processing order
    pub fn spans(&self) -> &[CategorySpan] {
        &self.spans
    }

    /// Category names, in processing order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().map(|span| span.name.as_str())
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.by_name.contains_key(category)
    }

    /// Total number of places across all categories
    pub fn total_places(&self) -> u64 {
        self.spans.last().map_or(0, CategorySpan::end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ActivityCategory;
    use pretty_assertions::assert_eq;

    fn home_retail() -> GlobalIdIndexer {
        GlobalIdIndexer::new(&[
            CategoryDescriptor::new("Home", 3),
            CategoryDescriptor::new("Retail", 5),
        ])
        .unwrap()
    }

    #[test]
    fn test_first_category_starts_at_zero() {
        let indexer = home_retail();
        assert_eq!(indexer.get_global_id("Home", 0).unwrap(), 0);
        assert_eq!(indexer.get_global_id("Home", 2).unwrap(), 2);
    }

    #[test]
    fn test_second_category_starts_after_first() {
        let indexer = home_retail();
        assert_eq!(indexer.get_global_id("Retail", 0).unwrap(), 3);
        assert_eq!(indexer.get_global_id("Retail", 4).unwrap(), 7);
        assert_eq!(indexer.total_places(), 8);
    }

    #[test]
    fn test_global_ids_unique_across_categories() {
        let indexer = GlobalIdIndexer::new(&[
            CategoryDescriptor::new("Home", 3),
            CategoryDescriptor::new("Retail", 5),
            CategoryDescriptor::new("PrimarySchool", 2),
            CategoryDescriptor::new("Work", 4),
        ])
        .unwrap();

        let mut seen = std::collections::HashSet::new();
        for span in indexer.spans() {
            for local in 0..span.count as i64 {
                let id = indexer.get_global_id(&span.name, local).unwrap();
                assert!(seen.insert(id), "duplicate global id {id}");
            }
        }
        // No gaps either
        assert_eq!(seen.len() as u64, indexer.total_places());
        assert_eq!(seen.iter().max().copied(), Some(13));
    }

    #[test]
    fn test_order_is_not_resorted() {
        let indexer = GlobalIdIndexer::new(&[
            CategoryDescriptor::new("Retail", 5),
            CategoryDescriptor::new("Home", 3),
        ])
        .unwrap();
        assert_eq!(indexer.get_global_id("Retail", 0).unwrap(), 0);
        assert_eq!(indexer.get_global_id("Home", 0).unwrap(), 5);
        assert_eq!(indexer.categories().collect::<Vec<_>>(), vec!["Retail", "Home"]);
    }

    #[test]
    fn test_out_of_range() {
        let indexer = home_retail();

        let err = indexer.get_global_id("Home", 3).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::OutOfRange { ref category, local_id: 3, count: 3 } if category == "Home"
        ));

        let err = indexer.get_global_id("Retail", -1).unwrap_err();
        assert!(matches!(err, SnapshotError::OutOfRange { local_id: -1, .. }));
    }

    #[test]
    fn test_unknown_category() {
        let indexer = home_retail();
        let err = indexer.get_global_id("Hospital", 0).unwrap_err();
        assert!(matches!(err, SnapshotError::UnknownCategory(ref name) if name == "Hospital"));
    }

    #[test]
    fn test_duplicate_category_rejected() {
        let result = GlobalIdIndexer::new(&[
            CategoryDescriptor::new("Home", 3),
            CategoryDescriptor::new("Home", 2),
        ]);
        assert!(matches!(result, Err(SnapshotError::DuplicateCategory(_))));
    }

    #[test]
    fn test_id_space_exhausted() {
        let result = GlobalIdIndexer::new(&[
            CategoryDescriptor::new("Home", u32::MAX as usize),
            CategoryDescriptor::new("Retail", 2),
        ]);
        assert!(matches!(result, Err(SnapshotError::IdSpaceExhausted(_))));
    }

    #[test]
    fn test_no_span_starts_past_id_space() {
        let full = u32::MAX as usize + 1;

        let indexer =
            GlobalIdIndexer::new(&[CategoryDescriptor::new("Home", full)]).unwrap();
        assert_eq!(indexer.get_global_id("Home", u32::MAX as i64).unwrap(), u32::MAX);
        assert_eq!(indexer.total_places(), full as u64);

        let result = GlobalIdIndexer::new(&[
            CategoryDescriptor::new("Home", full),
            CategoryDescriptor::new("Hospital", 0),
        ]);
        assert!(matches!(
            result,
            Err(SnapshotError::IdSpaceExhausted(n)) if n == full as u64
        ));
    }

    #[test]
    fn test_location_table_validated() {
        let mut retail = ActivityCategory::with_locations("Retail", 3);
        retail.locations.swap(0, 2);
        let result = GlobalIdIndexer::from_tables(&[
            ActivityCategory::with_locations("Home", 2),
            retail,
        ]);
        assert!(matches!(
            result,
            Err(SnapshotError::NonContiguousLocations { ref category, row: 0, id: 2 })
                if category == "Retail"
        ));
    }

    #[test]
    fn test_locate_round_trip() {
        let indexer = home_retail();
        for span in indexer.spans().to_vec() {
            for local in 0..span.count as i64 {
                let global = indexer.get_global_id(&span.name, local).unwrap();
                assert_eq!(indexer.locate(global), Some((span.name.as_str(), local)));
            }
        }
        assert_eq!(indexer.locate(8), None);
    }

    #[test]
    fn test_locate_skips_empty_categories() {
        let indexer = GlobalIdIndexer::new(&[
            CategoryDescriptor::new("Home", 2),
            CategoryDescriptor::new("Hospital", 0),
            CategoryDescriptor::new("Retail", 2),
        ])
        .unwrap();

        assert_eq!(indexer.span("Hospital").unwrap().offset, 2);
        assert_eq!(indexer.locate(1), Some(("Home", 1)));
        assert_eq!(indexer.locate(2), Some(("Retail", 0)));
        assert!(matches!(
            indexer.get_global_id("Hospital", 0),
            Err(SnapshotError::OutOfRange { count: 0, .. })
        ));
    }

    #[test]
    fn test_from_location_tables() {
        let categories = vec![
            ActivityCategory::with_locations("Home", 3),
            ActivityCategory::with_locations("Retail", 5),
        ];
        let indexer = GlobalIdIndexer::from_tables(&categories).unwrap();
        assert_eq!(indexer.get_global_id("Retail", 2).unwrap(), 5);
    }

    #[test]
    fn test_empty_registry() {
        let indexer = GlobalIdIndexer::new(&[]).unwrap();
        assert_eq!(indexer.total_places(), 0);
        assert_eq!(indexer.locate(0), None);
    }
}
