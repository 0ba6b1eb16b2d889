//! Microsim Snapshot - global place indexing and flow flattening
//!
//! Every activity category (Home, Retail, PrimarySchool, ...) numbers its
//! locations locally from zero. A downstream simulation needs one shared place
//! id space and, per individual, a fixed-width row of (place id, weight) slots.
//! The crate builds both in two stages: global id indexing → per-individual
//! flow flattening.
//!
//! ## Modules
//!
//! - **Indexer**: cumulative per-category offsets over one `u32` id space
//! - **Flattener**: fixed-width, zero-padded id and weight tables
//! - **Snapshotter**: registry + population orchestration and lookup accessor

pub mod config;
pub mod encoder;
pub mod error;
pub mod flattener;
pub mod indexer;
pub mod padding;
pub mod registry;
pub mod schema;
pub mod snapshotter;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{PaddingPolicy, SnapshotConfig};
pub use error::SnapshotError;
pub use flattener::{PersonFlowFlattener, SnapshotRow, SnapshotTables};
pub use indexer::{CategorySpan, GlobalIdIndexer};
pub use padding::SlotLayout;
pub use registry::{ActivityCategory, CategoryDescriptor, LocationTable};
pub use snapshotter::Snapshotter;
pub use types::{ActivityVisits, GlobalPlaceId, Individual, SlotOrder};

/// Crate version embedded in every snapshot payload
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for snapshot payloads
pub const PRODUCER_NAME: &str = "microsim-snapshot";

/// Snapshot payload schema version
pub const SNAPSHOT_VERSION: &str = "microsim.snapshot.v1";
