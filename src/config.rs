//! Snapshot configuration
//!
//! Names the activity categories in processing order, their location counts and
//! how padding widths are chosen. Serialized as JSON.

use crate::error::SnapshotError;
use crate::indexer::GlobalIdIndexer;
use crate::padding::SlotLayout;
use crate::registry::{CategoryDescriptor, LocationTable};
use crate::types::{Individual, SlotOrder};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// One configured activity category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub location_count: usize,
    /// Fixed padding width; only used with [`PaddingPolicy::Fixed`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_width: Option<usize>,
}

impl LocationTable for CategoryConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn location_count(&self) -> usize {
        self.location_count
    }
}

/// How per-category padding widths are chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingPolicy {
    /// Largest venue count any individual has in the category
    #[default]
    Observed,
    /// Configured `padding_width`, falling back to the observed maximum
    Fixed,
}

/// Full snapshot configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Categories in processing order
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub padding: PaddingPolicy,
    #[serde(default)]
    pub slot_order: SlotOrder,
}

impl SnapshotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a category with an observed padding width
    pub fn with_category(mut self, name: impl Into<String>, location_count: usize) -> Self {
        self.categories.push(CategoryConfig {
            name: name.into(),
            location_count,
            padding_width: None,
        });
        self
    }

    /// Append a category with a fixed padding width and switch to fixed padding
    pub fn with_fixed_category(
        mut self,
        name: impl Into<String>,
        location_count: usize,
        padding_width: usize,
    ) -> Self {
        self.categories.push(CategoryConfig {
            name: name.into(),
            location_count,
            padding_width: Some(padding_width),
        });
        self.padding = PaddingPolicy::Fixed;
        self
    }

    pub fn with_slot_order(mut self, slot_order: SlotOrder) -> Self {
        self.slot_order = slot_order;
        self
    }

    /// Load configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(SnapshotError::InvalidConfig(
                    "category name must not be empty".to_string(),
                ));
            }
            if !seen.insert(category.name.as_str()) {
                return Err(SnapshotError::DuplicateCategory(category.name.clone()));
            }
        }
        Ok(())
    }

    /// Category names in processing order
    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn descriptors(&self) -> Vec<CategoryDescriptor> {
        self.categories
            .iter()
            .map(CategoryDescriptor::from_table)
            .collect()
    }

    pub fn build_indexer(&self) -> Result<GlobalIdIndexer, SnapshotError> {
        self.validate()?;
        GlobalIdIndexer::from_tables(&self.categories)
    }

    /// Resolve the row layout for a population
    pub fn build_layout(&self, indexer: &GlobalIdIndexer, individuals: &[Individual]) -> SlotLayout {
        let fixed: HashMap<String, usize> = self
            .categories
            .iter()
            .filter_map(|c| c.padding_width.map(|width| (c.name.clone(), width)))
            .collect();

        match self.padding {
            PaddingPolicy::Observed => {
                if !fixed.is_empty() {
                    warn!("padding widths are configured but padding policy is observed; ignoring them");
                }
                SlotLayout::observed(indexer, individuals)
            }
            PaddingPolicy::Fixed => SlotLayout::with_overrides(indexer, individuals, &fixed),
        }
    }
}
