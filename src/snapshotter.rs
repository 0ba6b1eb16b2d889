//! Snapshot orchestration
//!
//! This module provides the public entry point: build the global place index
//! once from the category registry, then flatten the individuals against it.

use crate::config::SnapshotConfig;
use crate::error::SnapshotError;
use crate::flattener::{PersonFlowFlattener, SnapshotTables};
use crate::indexer::GlobalIdIndexer;
use crate::padding::SlotLayout;
use crate::registry::LocationTable;
use crate::types::{GlobalPlaceId, Individual, SlotOrder};
use tracing::info;

/// Owns the population and the read-only place index built from the registry.
pub struct Snapshotter {
    individuals: Vec<Individual>,
    indexer: GlobalIdIndexer,
    layout: SlotLayout,
    slot_order: SlotOrder,
}

impl Snapshotter {
    /// Create a snapshotter with observed padding widths.
    ///
    /// `categories` is the registry in processing order.
    pub fn new<T: LocationTable>(
        individuals: Vec<Individual>,
        categories: &[T],
    ) -> Result<Self, SnapshotError> {
        let indexer = GlobalIdIndexer::from_tables(categories)?;
        let layout = SlotLayout::observed(&indexer, &individuals);
        Ok(Self::assemble(individuals, indexer, layout, SlotOrder::default()))
    }

    /// Create a snapshotter from a configuration
    pub fn from_config(
        config: &SnapshotConfig,
        individuals: Vec<Individual>,
    ) -> Result<Self, SnapshotError> {
        let indexer = config.build_indexer()?;
        let layout = config.build_layout(&indexer, &individuals);
        Ok(Self::assemble(individuals, indexer, layout, config.slot_order))
    }

    fn assemble(
        individuals: Vec<Individual>,
        indexer: GlobalIdIndexer,
        layout: SlotLayout,
        slot_order: SlotOrder,
    ) -> Self {
        info!(
            individuals = individuals.len(),
            categories = indexer.spans().len(),
            places = indexer.total_places(),
            row_width = layout.width(),
            "snapshotter ready"
        );
        Self {
            individuals,
            indexer,
            layout,
            slot_order,
        }
    }

    /// Replace the layout with explicit padding widths
    pub fn with_layout(mut self, layout: SlotLayout) -> Result<Self, SnapshotError> {
        if !layout.matches(&self.indexer) {
            return Err(SnapshotError::InvalidConfig(
                "slot layout categories do not follow the registry order".to_string(),
            ));
        }
        self.layout = layout;
        Ok(self)
    }

    pub fn with_slot_order(mut self, slot_order: SlotOrder) -> Self {
        self.slot_order = slot_order;
        self
    }

    /// Global id of a category-local location
    pub fn get_global_place_id(
        &self,
        category: &str,
        local_id: i64,
    ) -> Result<GlobalPlaceId, SnapshotError> {
        self.indexer.get_global_id(category, local_id)
    }

    /// Flatten every individual into the place-id and weight tables
    pub fn get_people_place_data(&self) -> Result<SnapshotTables, SnapshotError> {
        PersonFlowFlattener::new(&self.indexer, self.layout.clone())?
            .with_slot_order(self.slot_order)
            .flatten(&self.individuals)
    }

    pub fn indexer(&self) -> &GlobalIdIndexer {
        &self.indexer
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn slot_order(&self) -> SlotOrder {
        self.slot_order
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }
}
