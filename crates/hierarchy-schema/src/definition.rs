//! Serializable schema documents (feature `serde`).
//!
//! ```rust
//! use hierarchy_schema::Schema;
//!
//! let schema = Schema::from_json(r#"{
//!     "hierarchies": [
//!         {"name": "Survey", "idname": "surveyname"},
//!         {"name": "OB", "idname": "obid", "factors": ["mjd"],
//!          "parents": [{"hierarchy": "Survey", "multiplicity": "multiple"}]},
//!         {"name": "Exposure", "idname": "expid", "parents": ["OB"]}
//!     ]
//! }"#).unwrap();
//!
//! assert!(schema.node_implies_plurality_of("OB", "Survey").unwrap().plural);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::schema::{HierarchyType, Multiplicity, Schema};

/// A whole schema document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Hierarchy type declarations, in order.
    pub hierarchies: Vec<HierarchyDefinition>,
    /// Plural spelling overrides for factors.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub plural_factors: BTreeMap<String, String>,
}

/// One hierarchy type declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyDefinition {
    /// Type name.
    pub name: String,
    /// Identifier attribute.
    pub idname: String,
    /// Factors besides the identifier.
    #[serde(default)]
    pub factors: Vec<String>,
    /// Parent declarations.
    #[serde(default)]
    pub parents: Vec<ParentDefinition>,
    /// Plural access name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
}

/// A parent declaration: a bare type name means exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParentDefinition {
    /// `"OB"`
    Name(String),
    /// `{"hierarchy": "Survey", "multiplicity": "multiple"}`
    Full {
        /// Parent type name.
        hierarchy: String,
        /// Declared multiplicity.
        multiplicity: Multiplicity,
    },
}

impl TryFrom<SchemaDefinition> for Schema {
    type Error = SchemaError;

    fn try_from(definition: SchemaDefinition) -> SchemaResult<Self> {
        let mut builder = Schema::builder();
        for declared in definition.hierarchies {
            let mut hierarchy = HierarchyType::builder(declared.name)
                .idname(declared.idname)
                .factors(declared.factors);
            for parent in declared.parents {
                hierarchy = match parent {
                    ParentDefinition::Name(name) => hierarchy.parent(name),
                    ParentDefinition::Full {
                        hierarchy: name,
                        multiplicity: Multiplicity::One,
                    } => hierarchy.parent(name),
                    ParentDefinition::Full {
                        hierarchy: name,
                        multiplicity: Multiplicity::Multiple,
                    } => hierarchy.multiple_parent(name),
                };
            }
            if let Some(plural) = declared.plural {
                hierarchy = hierarchy.plural(plural);
            }
            builder = builder.hierarchy(hierarchy);
        }
        for (factor, plural) in definition.plural_factors {
            builder = builder.plural_factor(factor, plural);
        }
        builder.build()
    }
}

impl Schema {
    /// Builds a schema from a JSON [`SchemaDefinition`] document.
    pub fn from_json(text: &str) -> SchemaResult<Self> {
        let definition: SchemaDefinition =
            serde_json::from_str(text).map_err(|e| SchemaError::Document(e.to_string()))?;
        Schema::try_from(definition)
    }
}
