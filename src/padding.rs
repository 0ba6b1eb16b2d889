//! Fixed-width slot layout
//!
//! Each category gets a block of `width` slots in every snapshot row. Blocks are
//! placed back to back in the indexer's category order.

use crate::error::SnapshotError;
use crate::indexer::GlobalIdIndexer;
use crate::types::Individual;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Slots reserved for one category inside a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotBlock {
    pub category: String,
    /// Index of the first slot of the block
    pub start: usize,
    /// Padding width (maximum venues per individual)
    pub width: usize,
}

impl SlotBlock {
    pub fn end(&self) -> usize {
        self.start + self.width
    }
}

/// Row layout: one block per category, in category order
///
/// Blocks are contiguous from slot 0 and `width` is the sum of their widths;
/// deserialization rejects any other arrangement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSlotLayout")]
pub struct SlotLayout {
    blocks: Vec<SlotBlock>,
    width: usize,
}

/// Unchecked wire form of [`SlotLayout`]
#[derive(Deserialize)]
struct RawSlotLayout {
    blocks: Vec<SlotBlock>,
    width: usize,
}

impl TryFrom<RawSlotLayout> for SlotLayout {
    type Error = SnapshotError;

    fn try_from(raw: RawSlotLayout) -> Result<Self, Self::Error> {
        let layout = Self {
            blocks: raw.blocks,
            width: raw.width,
        };
        if !layout.is_contiguous() {
            return Err(SnapshotError::InvalidConfig(
                "slot layout blocks must be contiguous from slot 0 and sum to the row width"
                    .to_string(),
            ));
        }
        Ok(layout)
    }
}

impl SlotLayout {
    /// Layout from explicit per-category widths.
    ///
    /// Every indexed category needs a width, and every width must name an
    /// indexed category.
    pub fn from_widths(
        indexer: &GlobalIdIndexer,
        widths: &HashMap<String, usize>,
    ) -> Result<Self, SnapshotError> {
        if let Some(unknown) = widths.keys().find(|name| !indexer.contains_category(name)) {
            return Err(SnapshotError::UnknownCategory(unknown.clone()));
        }

        let mut resolved = Vec::with_capacity(indexer.spans().len());
        for category in indexer.categories() {
            let width = widths.get(category).copied().ok_or_else(|| {
                SnapshotError::InvalidConfig(format!("no padding width for category {category}"))
            })?;
            resolved.push((category.to_string(), width));
        }
        Ok(Self::from_ordered(resolved))
    }

    /// Layout sized to the largest venue count observed per category
    pub fn observed(indexer: &GlobalIdIndexer, individuals: &[Individual]) -> Self {
        Self::with_overrides(indexer, individuals, &HashMap::new())
    }

    /// Observed widths, except for categories with a configured width
    pub fn with_overrides(
        indexer: &GlobalIdIndexer,
        individuals: &[Individual],
        overrides: &HashMap<String, usize>,
    ) -> Self {
        let resolved = indexer
            .categories()
            .map(|category| {
                let width = overrides.get(category).copied().unwrap_or_else(|| {
                    max_venue_count(individuals, category)
                });
                (category.to_string(), width)
            })
            .collect();
        Self::from_ordered(resolved)
    }

    fn from_ordered(widths: Vec<(String, usize)>) -> Self {
        let mut blocks = Vec::with_capacity(widths.len());
        let mut start = 0;
        for (category, width) in widths {
            blocks.push(SlotBlock {
                category,
                start,
                width,
            });
            start += width;
        }
        Self {
            blocks,
            width: start,
        }
    }

    /// Total row width (sum of all padding widths)
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn blocks(&self) -> &[SlotBlock] {
        &self.blocks
    }

    pub fn block(&self, category: &str) -> Option<&SlotBlock> {
        self.blocks.iter().find(|block| block.category == category)
    }

    /// True when blocks are laid back to back from slot 0 and fill the row
    pub fn is_contiguous(&self) -> bool {
        let mut next = 0usize;
        for block in &self.blocks {
            if block.start != next {
                return false;
            }
            next = match next.checked_add(block.width) {
                Some(end) => end,
                None => return false,
            };
        }
        next == self.width
    }

    /// True when blocks follow the indexer's categories one to one and are
    /// contiguous
    pub fn matches(&self, indexer: &GlobalIdIndexer) -> bool {
        self.is_contiguous()
            && self.blocks.len() == indexer.spans().len()
            && self
                .blocks
                .iter()
                .zip(indexer.categories())
                .all(|(block, name)| block.category == name)
    }
}

/// Largest number of venues any individual visits in a category
pub fn max_venue_count(individuals: &[Individual], category: &str) -> usize {
    individuals
        .iter()
        .map(|person| person.venue_count(category))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CategoryDescriptor;
    use crate::types::ActivityVisits;
    use pretty_assertions::assert_eq;

    fn indexer() -> GlobalIdIndexer {
        GlobalIdIndexer::new(&[
            CategoryDescriptor::new("Home", 3),
            CategoryDescriptor::new("Retail", 5),
        ])
        .unwrap()
    }

    fn people() -> Vec<Individual> {
        vec![
            Individual::new(0)
                .with_activity("Home", ActivityVisits::new(vec![0], vec![1.0], 0.8))
                .with_activity(
                    "Retail",
                    ActivityVisits::new(vec![0, 2], vec![0.5, 0.5], 0.2),
                ),
            Individual::new(1)
                .with_activity("Home", ActivityVisits::new(vec![1], vec![1.0], 0.7))
                .with_activity(
                    "Retail",
                    ActivityVisits::new(vec![1, 2, 3], vec![0.1, 0.6, 0.3], 0.3),
                ),
        ]
    }

    #[test]
    fn test_observed_layout() {
        let layout = SlotLayout::observed(&indexer(), &people());
        assert_eq!(layout.width(), 4);
        assert_eq!(
            layout.blocks(),
            &[
                SlotBlock { category: "Home".into(), start: 0, width: 1 },
                SlotBlock { category: "Retail".into(), start: 1, width: 3 },
            ]
        );
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = HashMap::from([("Retail".to_string(), 9)]);
        let layout = SlotLayout::with_overrides(&indexer(), &people(), &overrides);
        assert_eq!(layout.block("Home").unwrap().width, 1);
        assert_eq!(layout.block("Retail").unwrap().start, 1);
        assert_eq!(layout.width(), 10);
    }

    #[test]
    fn test_explicit_widths_require_every_category() {
        let widths = HashMap::from([("Home".to_string(), 1)]);
        let result = SlotLayout::from_widths(&indexer(), &widths);
        assert!(matches!(result, Err(SnapshotError::InvalidConfig(_))));
    }

    #[test]
    fn test_explicit_widths_reject_unknown_category() {
        let widths = HashMap::from([
            ("Home".to_string(), 1),
            ("Retail".to_string(), 3),
            ("Work".to_string(), 2),
        ]);
        let result = SlotLayout::from_widths(&indexer(), &widths);
        assert!(matches!(result, Err(SnapshotError::UnknownCategory(ref n)) if n == "Work"));
    }

    #[test]
    fn test_deserialize_rejects_detached_blocks() {
        let json = r#"{"blocks":[{"category":"Home","start":5,"width":1}],"width":1}"#;
        assert!(serde_json::from_str::<SlotLayout>(json).is_err());

        let json = r#"{"blocks":[
            {"category":"Home","start":0,"width":1},
            {"category":"Retail","start":1,"width":3}
        ],"width":2}"#;
        assert!(serde_json::from_str::<SlotLayout>(json).is_err());
    }

    #[test]
    fn test_serialized_layout_round_trip() {
        let layout = SlotLayout::observed(&indexer(), &people());
        let json = serde_json::to_string(&layout).unwrap();
        let loaded: SlotLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, layout);
        assert!(loaded.matches(&indexer()));
    }

    #[test]
    fn test_detached_layout_does_not_match() {
        let layout = SlotLayout {
            blocks: vec![
                SlotBlock { category: "Home".into(), start: 5, width: 1 },
                SlotBlock { category: "Retail".into(), start: 6, width: 3 },
            ],
            width: 4,
        };
        assert!(!layout.is_contiguous());
        assert!(!layout.matches(&indexer()));
    }

    #[test]
    fn test_empty_population_has_zero_width() {
        let layout = SlotLayout::observed(&indexer(), &[]);
        assert_eq!(layout.width(), 0);
        assert!(layout.matches(&indexer()));
    }
}
