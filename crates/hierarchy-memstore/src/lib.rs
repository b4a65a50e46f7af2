//! # hierarchy-memstore
//!
//! In-memory reference store for hierarchy queries.
//!
//! [`MemoryStore`] holds typed nodes with identifiers, factor values and
//! parent links, validated against a [`Schema`](hierarchy_schema::Schema).
//! It implements [`ExecutionSubstrate`](hierarchy_query::ExecutionSubstrate)
//! by interpreting compiled statements directly, which makes it the store
//! used by the end-to-end tests and a model for real drivers.
//!
//! ## Quick Start
//!
//! ```
//! use hierarchy_memstore::MemoryStore;
//! use hierarchy_query::Handler;
//! use hierarchy_schema::{HierarchyType, Schema, Value};
//!
//! let schema = Schema::builder()
//!     .hierarchy(HierarchyType::builder("OB").idname("obid"))
//!     .hierarchy(
//!         HierarchyType::builder("Run")
//!             .idname("runid")
//!             .factor("camera")
//!             .parent("OB"),
//!     )
//!     .build()
//!     .unwrap();
//! let handler = Handler::new(schema);
//!
//! let mut store = MemoryStore::new(handler.schema().clone());
//! let ob = store.insert_node("OB", 1).unwrap();
//! for (runid, camera) in [(10, "red"), (11, "blue")] {
//!     let run = store.insert("Run", runid, [("camera", camera)]).unwrap();
//!     store.link(run, ob).unwrap();
//! }
//!
//! let cameras = handler.query("ob[1].cameras").unwrap().execute(&store).unwrap();
//! println!("{:?}", cameras);
//! ```
//!
//! ## Indexes
//!
//! Every node gets a compact `u32` index from a [`NodeRegistry`]. Per-type
//! instance sets and parent/child adjacency are roaring bitmaps, so a
//! traversal hop is a union of bitmaps and results come back in insertion
//! order.
//!
//! ## Features
//!
//! - `parallel` - evaluates `WHERE` filters with rayon

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod interpreter;
mod registry;
mod stats;
mod store;

// Public re-exports
pub use error::{MemStoreError, MemStoreResult};
pub use registry::NodeRegistry;
pub use stats::StoreStats;
pub use store::{MemoryStore, NodeId};
