//! # hierarchy-query
//!
//! Lazy, plurality-checked query composition over hierarchy schemas.
//!
//! Every attribute or index access on a query value returns a new immutable
//! value. Before anything reaches a store, each hop across the schema is
//! proven singular or plural, and any access that would silently collapse
//! many instances into one fails with a [`QueryBuildError`]. Only the
//! terminal `execute` call runs a compiled [`Statement`] through an
//! [`ExecutionSubstrate`].
//!
//! ## Key Features
//!
//! - **Fail-fast plurality** - `ob.exposure` is rejected when an OB has many
//!   exposures; `ob.exposures` is always legal
//! - **Explicit narrowing** - `[id]` pins one instance, `[[ids]]` keeps
//!   plurality while restricting membership, in caller order
//! - **Structural sharing** - sibling queries share their common branch
//!   prefix and may be executed concurrently
//! - **Precise absence errors** - missing identifiers are reported together,
//!   keyed by identifier attribute
//!
//! ## Quick Start
//!
//! ```ignore
//! use hierarchy_query::Handler;
//! use hierarchy_memstore::MemoryStore;
//!
//! let handler = Handler::new(schema);
//! let mut store = MemoryStore::new(handler.schema().clone());
//! // ... insert instances ...
//!
//! let runs = handler.query("runs[[1, 2, 2, 99]]")?;
//! match runs.execute(&store) {
//!     Ok(output) => println!("{:?}", output.identifiers()),
//!     Err(QueryExecutionError::MissingIdentifiers { missing, partial }) => {
//!         println!("missing {missing}, found {:?}", partial.identifiers());
//!     }
//!     Err(e) => return Err(e.into()),
//! }
//! ```
//!
//! ## With Configuration
//!
//! ```rust
//! use hierarchy_query::{CacheConfig, Handler, IdentifierPolicy, QueryConfig};
//! use hierarchy_schema::{HierarchyType, Schema};
//!
//! let schema = Schema::builder()
//!     .hierarchy(HierarchyType::builder("Run").idname("runid"))
//!     .build()
//!     .unwrap();
//! let config = QueryConfig::builder()
//!     .with_path_cache(CacheConfig { max_entries: 256 })
//!     .with_max_results(100_000)
//!     .with_identifier_policy(IdentifierPolicy::Preserve)
//!     .build();
//! let handler = Handler::with_config(schema, config);
//! assert!(handler.query("runs[[1, 2]]").is_ok());
//! ```
//!
//! ## Access Rules
//!
//! | Query kind | `.singular` (singular hop) | `.singular` (plural hop) | `.plural` | `[id]` | `[[ids]]` |
//! |------------|----------------------------|--------------------------|-----------|--------|-----------|
//! | Heterogeneous | ambiguous | ambiguous | Homogeneous / column | no type context | no type context |
//! | Single | Single / scalar | ambiguous | Homogeneous / list | already single | already single |
//! | Homogeneous | Homogeneous / column | ambiguous | Homogeneous / column | use `[[id]]` | Identified |
//! | Identified | Homogeneous / column | ambiguous | Homogeneous / column | already identified | already identified |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      hierarchy-query                         │
//! │                                                              │
//! │  Handler (schema + proof cache)                              │
//! │  ├── parse access path (hierarchy-schema)                    │
//! │  ├── HierarchyQuery: Heterogeneous | Single |                │
//! │  │                   Homogeneous | Identified                │
//! │  ├── Branch: persistent step list → Statement                │
//! │  └── execute via ExecutionSubstrate → Output                 │
//! │                                                              │
//! │  Dependencies:                                               │
//! │  └── hierarchy-schema - types, plurality proofs, parser      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod branch;
mod cache;
mod config;
mod error;
mod handler;
mod planner;
mod query;
mod result;
mod traits;

// Public re-exports
pub use branch::{Branch, Expression, Predicate, Statement, Step, Var};
pub use cache::{CacheStats, PathCache};
pub use config::{CacheConfig, IdentifierPolicy, QueryConfig, QueryConfigBuilder};
pub use error::{
    BuildResult, ExecResult, IdentifierReport, QueryBuildError, QueryExecutionError,
    SubstrateError,
};
pub use handler::Handler;
pub use planner::{PlanStep, QueryPlan};
pub use query::{
    Accessed, FactorColumn, FactorQuery, FactorShape, Heterogeneous, HierarchyQuery, Homogeneous,
    Identified, Index, Lineage, Single,
};
pub use result::{FactorOutput, HierarchyObject, Output, Table, TableRow};
pub use traits::{Cell, Cursor, ExecutionSubstrate, NodeRecord, Row};
