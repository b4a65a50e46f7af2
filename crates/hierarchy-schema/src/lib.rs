//! # hierarchy-schema
//!
//! Static schema metadata for graphs of hierarchically related entity types,
//! and the textual access-path language used to navigate them.
//!
//! This crate provides:
//! - **Schema model**: hierarchy types, their identifier attribute, their
//!   factors (scalar attributes) and their declared parents
//! - **Plurality proofs**: for any two types, whether the hop between them can
//!   yield more than one instance, together with the traversal path
//! - **Access-path parser**: parse `runs[[1, 2]].exposure.mjd` style paths
//!
//! ## Schema Usage
//!
//! ```rust
//! use hierarchy_schema::{HierarchyType, Schema};
//!
//! let schema = Schema::builder()
//!     .hierarchy(HierarchyType::builder("OB").idname("obid"))
//!     .hierarchy(
//!         HierarchyType::builder("Exposure")
//!             .idname("expid")
//!             .factor("mjd")
//!             .parent("OB"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! // Every exposure has one OB, but an OB has many exposures.
//! assert!(!schema.node_implies_plurality_of("Exposure", "OB").unwrap().plural);
//! assert!(schema.node_implies_plurality_of("OB", "Exposure").unwrap().plural);
//! ```
//!
//! ## Access-Path Usage
//!
//! ```rust
//! use hierarchy_schema::{parse, AccessStep};
//!
//! let path = parse("obs[[1, 2]].exposures['mjd']").unwrap();
//! assert_eq!(path.steps.len(), 4);
//! assert!(matches!(path.steps[1], AccessStep::Identifiers(_)));
//! ```
//!
//! ## Naming Quick Reference
//!
//! | Declared | Singular access | Plural access |
//! |----------|-----------------|---------------|
//! | type `Exposure` | `exposure` | `exposures` |
//! | type `OBSpec` | `obspec` | `obspecs` |
//! | factor `mjd` | `mjd` | `mjds` |
//! | factor `camera` | `camera` | `cameras` |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod access;
#[cfg(feature = "serde")]
mod definition;
mod error;
pub mod naming;
mod parser;
mod path;
mod schema;
mod value;

pub use access::{AccessPath, AccessStep};
#[cfg(feature = "serde")]
pub use definition::{HierarchyDefinition, ParentDefinition, SchemaDefinition};
pub use error::{ParseError, ParseResult, SchemaError, SchemaResult};
pub use parser::parse;
pub use path::{Direction, Hop, PluralityProof, TraversalPath};
pub use schema::{
    FactorLocation, HierarchyType, HierarchyTypeBuilder, Multiplicity, Relation, Resolution,
    Schema, SchemaBuilder,
};
pub use value::{Identifier, Value};
