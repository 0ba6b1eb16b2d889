//! Snapshot encoding
//!
//! This module wraps flattened tables into a self-describing payload for the
//! downstream simulation: producer metadata, the category spans and slot layout
//! the tables were built with, and the tables themselves.

use crate::error::SnapshotError;
use crate::flattener::SnapshotTables;
use crate::indexer::CategorySpan;
use crate::padding::SlotBlock;
use crate::snapshotter::Snapshotter;
use crate::types::SlotOrder;
use crate::{PRODUCER_NAME, SNAPSHOT_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Encoded snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub snapshot_version: String,
    pub producer: SnapshotProducer,
    pub computed_at_utc: String,
    /// Global id span of every category, in processing order
    pub spans: Vec<CategorySpan>,
    /// Slot block of every category, in processing order
    pub layout: Vec<SlotBlock>,
    pub slot_order: SlotOrder,
    pub tables: SnapshotTables,
}

impl SnapshotPayload {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Encoder for snapshot payloads
pub struct SnapshotEncoder {
    instance_id: String,
}

impl Default for SnapshotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Flatten the snapshotter's population and encode the result
    pub fn encode(&self, snapshotter: &Snapshotter) -> Result<SnapshotPayload, SnapshotError> {
        let tables = snapshotter.get_people_place_data()?;
        Ok(self.encode_tables(snapshotter, tables))
    }

    /// Encode tables that were already produced by `snapshotter`
    pub fn encode_tables(&self, snapshotter: &Snapshotter, tables: SnapshotTables) -> SnapshotPayload {
        SnapshotPayload {
            snapshot_version: SNAPSHOT_VERSION.to_string(),
            producer: SnapshotProducer {
                name: PRODUCER_NAME.to_string(),
                version: crate::CRATE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            spans: snapshotter.indexer().spans().to_vec(),
            layout: snapshotter.layout().blocks().to_vec(),
            slot_order: snapshotter.slot_order(),
            tables,
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, snapshotter: &Snapshotter) -> Result<String, SnapshotError> {
        let payload = self.encode(snapshotter)?;
        serde_json::to_string_pretty(&payload).map_err(SnapshotError::JsonError)
    }
}
