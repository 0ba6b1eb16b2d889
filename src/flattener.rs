//! Per-individual flow flattening
//!
//! Turns each individual's per-category venue lists into one fixed-width row of
//! (global place id, combined weight) slots. The combined weight of a venue is
//! `duration(category) × flow[k]`. Rows of all individuals share one pre-allocated
//! buffer per table.

use crate::error::SnapshotError;
use crate::indexer::GlobalIdIndexer;
use crate::padding::{SlotBlock, SlotLayout};
use crate::types::{GlobalPlaceId, Individual, SlotOrder};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Dense row-major id and weight tables, one row per individual
///
/// Both tables hold exactly `rows × width` slots; deserialization rejects
/// anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshotTables")]
pub struct SnapshotTables {
    person_ids: Vec<u64>,
    place_ids: Vec<GlobalPlaceId>,
    weights: Vec<f64>,
    width: usize,
}

/// Unchecked wire form of [`SnapshotTables`]
#[derive(Deserialize)]
struct RawSnapshotTables {
    person_ids: Vec<u64>,
    place_ids: Vec<GlobalPlaceId>,
    weights: Vec<f64>,
    width: usize,
}

impl TryFrom<RawSnapshotTables> for SnapshotTables {
    type Error = SnapshotError;

    fn try_from(raw: RawSnapshotTables) -> Result<Self, Self::Error> {
        let slots = raw.person_ids.len().checked_mul(raw.width);
        if slots != Some(raw.place_ids.len()) || slots != Some(raw.weights.len()) {
            return Err(SnapshotError::InvalidConfig(format!(
                "snapshot tables of {} rows × {} slots hold {} place ids and {} weights",
                raw.person_ids.len(),
                raw.width,
                raw.place_ids.len(),
                raw.weights.len()
            )));
        }
        Ok(Self {
            person_ids: raw.person_ids,
            place_ids: raw.place_ids,
            weights: raw.weights,
            width: raw.width,
        })
    }
}

/// Borrowed view of one row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotRow<'a> {
    pub person_id: u64,
    pub place_ids: &'a [GlobalPlaceId],
    pub weights: &'a [f64],
}

impl<'a> SnapshotRow<'a> {
    /// Slots carrying a non-zero weight; zero-weight slots are absences
    pub fn visits(&self) -> impl Iterator<Item = (GlobalPlaceId, f64)> + 'a {
        let place_ids: &'a [GlobalPlaceId] = self.place_ids;
        let weights: &'a [f64] = self.weights;
        place_ids
            .iter()
            .copied()
            .zip(weights.iter().copied())
            .filter(|&(_, weight)| weight != 0.0)
    }
}

impl SnapshotTables {
    /// Number of rows (individuals)
    pub fn rows(&self) -> usize {
        self.person_ids.len()
    }

    /// Number of slots per row
    pub fn width(&self) -> usize {
        self.width
    }

    /// `(rows, width)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.width)
    }

    /// Person ids in row order
    pub fn person_ids(&self) -> &[u64] {
        &self.person_ids
    }

    /// Flat row-major place-id table
    pub fn place_ids(&self) -> &[GlobalPlaceId] {
        &self.place_ids
    }

    /// Flat row-major weight table
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn row(&self, index: usize) -> Option<SnapshotRow<'_>> {
        let person_id = *self.person_ids.get(index)?;
        let range = index * self.width..(index + 1) * self.width;
        Some(SnapshotRow {
            person_id,
            place_ids: self.place_ids.get(range.clone())?,
            weights: self.weights.get(range)?,
        })
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = SnapshotRow<'_>> {
        (0..self.rows()).filter_map(move |index| self.row(index))
    }

    /// Tables as nested rows (ids, weights)
    pub fn to_nested(&self) -> (Vec<Vec<GlobalPlaceId>>, Vec<Vec<f64>>) {
        self.iter_rows()
            .map(|row| (row.place_ids.to_vec(), row.weights.to_vec()))
            .unzip()
    }
}

/// Flattens individuals into snapshot tables for a fixed layout
pub struct PersonFlowFlattener<'a> {
    indexer: &'a GlobalIdIndexer,
    layout: SlotLayout,
    slot_order: SlotOrder,
}

impl<'a> PersonFlowFlattener<'a> {
    /// Create a flattener; the layout must have been built for this indexer
    pub fn new(indexer: &'a GlobalIdIndexer, layout: SlotLayout) -> Result<Self, SnapshotError> {
        if !layout.matches(indexer) {
            return Err(SnapshotError::InvalidConfig(
                "slot layout categories do not follow the indexer's category order".to_string(),
            ));
        }
        Ok(Self {
            indexer,
            layout,
            slot_order: SlotOrder::default(),
        })
    }

    pub fn with_slot_order(mut self, slot_order: SlotOrder) -> Self {
        self.slot_order = slot_order;
        self
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// Flatten every individual, preserving input order.
    ///
    /// Fails on the first offending individual (then category) without
    /// returning any rows.
    pub fn flatten(&self, individuals: &[Individual]) -> Result<SnapshotTables, SnapshotError> {
        let width = self.layout.width();
        let mut place_ids: Vec<GlobalPlaceId> = vec![0; individuals.len() * width];
        let mut weights = vec![0.0; individuals.len() * width];

        self.fill_rows(individuals, &mut place_ids, &mut weights)?;

        debug!(
            rows = individuals.len(),
            width,
            "flattened individuals into snapshot tables"
        );

        Ok(SnapshotTables {
            person_ids: individuals.iter().map(|person| person.id).collect(),
            place_ids,
            weights,
            width,
        })
    }

    #[cfg(not(feature = "parallel"))]
    fn fill_rows(
        &self,
        individuals: &[Individual],
        place_ids: &mut [GlobalPlaceId],
        weights: &mut [f64],
    ) -> Result<(), SnapshotError> {
        let width = self.layout.width();
        for (index, person) in individuals.iter().enumerate() {
            let range = index * width..(index + 1) * width;
            self.fill_row(person, &mut place_ids[range.clone()], &mut weights[range])?;
        }
        Ok(())
    }

    #[cfg(feature = "parallel")]
    fn fill_rows(
        &self,
        individuals: &[Individual],
        place_ids: &mut [GlobalPlaceId],
        weights: &mut [f64],
    ) -> Result<(), SnapshotError> {
        let width = self.layout.width();
        if width == 0 {
            // chunks of width zero are not allowed; rows are empty anyway
            for person in individuals {
                self.fill_row(person, &mut [], &mut [])?;
            }
            return Ok(());
        }

        // Collect every row's outcome so the reported error is the first one in
        // row order, whatever the scheduling.
        let outcomes: Vec<Result<(), SnapshotError>> = place_ids
            .par_chunks_mut(width)
            .zip(weights.par_chunks_mut(width))
            .zip(individuals.par_iter())
            .map(|((id_row, weight_row), person)| self.fill_row(person, id_row, weight_row))
            .collect();

        outcomes.into_iter().collect()
    }

    /// Fill one zero-initialised row
    fn fill_row(
        &self,
        person: &Individual,
        place_ids: &mut [GlobalPlaceId],
        weights: &mut [f64],
    ) -> Result<(), SnapshotError> {
        let mut used = Vec::new();

        for block in self.layout.blocks() {
            let filled = self.fill_block(person, block, place_ids, weights)?;
            if self.slot_order == SlotOrder::WeightDescending {
                used.extend(block.start..block.start + filled);
            }
        }

        if self.slot_order == SlotOrder::WeightDescending {
            sort_by_weight(&used, place_ids, weights);
        }
        Ok(())
    }

    /// Write one category block; returns the number of real slots written
    fn fill_block(
        &self,
        person: &Individual,
        block: &SlotBlock,
        place_ids: &mut [GlobalPlaceId],
        weights: &mut [f64],
    ) -> Result<usize, SnapshotError> {
        let Some(visits) = person.visits(&block.category) else {
            return Ok(0);
        };

        if visits.flows.len() != visits.venues.len() {
            return Err(SnapshotError::MalformedIndividual {
                person_id: person.id,
                category: block.category.clone(),
                reason: format!(
                    "{} venues but {} flows",
                    visits.venues.len(),
                    visits.flows.len()
                ),
            });
        }

        if visits.len() > block.width {
            return Err(SnapshotError::PaddingOverflow {
                person_id: person.id,
                category: block.category.clone(),
                venues: visits.len(),
                width: block.width,
            });
        }

        for (k, (&venue, &flow)) in visits.venues.iter().zip(&visits.flows).enumerate() {
            let slot = block.start + k;
            place_ids[slot] = self.indexer.get_global_id(&block.category, venue)?;
            weights[slot] = visits.duration * flow;
        }
        Ok(visits.len())
    }
}

/// Move the real slots to the front of the row, heaviest first.
///
/// The sort is stable so equal weights keep their category order.
fn sort_by_weight(used: &[usize], place_ids: &mut [GlobalPlaceId], weights: &mut [f64]) {
    let mut slots: Vec<(GlobalPlaceId, f64)> = used
        .iter()
        .map(|&slot| (place_ids[slot], weights[slot]))
        .collect();
    slots.sort_by(|a, b| b.1.total_cmp(&a.1));

    place_ids.fill(0);
    weights.fill(0.0);
    for (slot, (place_id, weight)) in slots.into_iter().enumerate() {
        place_ids[slot] = place_id;
        weights[slot] = weight;
    }
}
