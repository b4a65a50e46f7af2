//! Hierarchy types and the immutable schema built from them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{SchemaError, SchemaResult};
use crate::naming::{access_name, pluralize};
use crate::path::{PluralityProof, RelationGraph};

/// How many instances of a parent each child instance has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Multiplicity {
    /// Exactly one parent instance.
    One,
    /// Any number of parent instances.
    Multiple,
}

/// A declared parent relation of a hierarchy type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Name of the parent hierarchy type.
    pub hierarchy: String,
    /// Declared multiplicity.
    pub multiplicity: Multiplicity,
}

/// A schema-declared entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyType {
    name: String,
    idname: String,
    factors: Vec<String>,
    parents: Vec<Relation>,
    singular_name: String,
    plural_name: String,
}

impl HierarchyType {
    /// Starts declaring a hierarchy type.
    pub fn builder(name: impl Into<String>) -> HierarchyTypeBuilder {
        HierarchyTypeBuilder::new(name)
    }

    /// Type name, e.g. `Exposure`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the identifier attribute, e.g. `expid`.
    pub fn idname(&self) -> &str {
        &self.idname
    }

    /// Declared factors; always includes the identifier attribute.
    pub fn factors(&self) -> &[String] {
        &self.factors
    }

    /// Declared parent relations.
    pub fn parents(&self) -> &[Relation] {
        &self.parents
    }

    /// Singular access name, e.g. `exposure`.
    pub fn singular_name(&self) -> &str {
        &self.singular_name
    }

    /// Plural access name, e.g. `exposures`.
    pub fn plural_name(&self) -> &str {
        &self.plural_name
    }

    /// Returns true if the type declares the factor.
    pub fn has_factor(&self, factor: &str) -> bool {
        self.factors.iter().any(|f| f == factor)
    }
}

/// Builder for [`HierarchyType`].
#[derive(Debug, Clone)]
pub struct HierarchyTypeBuilder {
    name: String,
    idname: Option<String>,
    factors: Vec<String>,
    parents: Vec<Relation>,
    plural_name: Option<String>,
}

impl HierarchyTypeBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            idname: None,
            factors: Vec::new(),
            parents: Vec::new(),
            plural_name: None,
        }
    }

    /// Sets the identifier attribute.
    pub fn idname(mut self, idname: impl Into<String>) -> Self {
        self.idname = Some(idname.into());
        self
    }

    /// Adds a factor.
    pub fn factor(mut self, factor: impl Into<String>) -> Self {
        self.factors.push(factor.into());
        self
    }

    /// Adds several factors.
    pub fn factors<I, S>(mut self, factors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.factors.extend(factors.into_iter().map(Into::into));
        self
    }

    /// Declares a parent of which each instance has exactly one.
    pub fn parent(mut self, hierarchy: impl Into<String>) -> Self {
        self.parents.push(Relation {
            hierarchy: hierarchy.into(),
            multiplicity: Multiplicity::One,
        });
        self
    }

    /// Declares a parent of which each instance may have many.
    pub fn multiple_parent(mut self, hierarchy: impl Into<String>) -> Self {
        self.parents.push(Relation {
            hierarchy: hierarchy.into(),
            multiplicity: Multiplicity::Multiple,
        });
        self
    }

    /// Overrides the plural access name.
    pub fn plural(mut self, plural_name: impl Into<String>) -> Self {
        self.plural_name = Some(plural_name.into());
        self
    }

    fn build(self) -> SchemaResult<HierarchyType> {
        let idname = self
            .idname
            .ok_or_else(|| SchemaError::MissingIdname(self.name.clone()))?;
        let mut factors = Vec::with_capacity(self.factors.len() + 1);
        factors.push(idname.clone());
        for factor in self.factors {
            if !factors.contains(&factor) {
                factors.push(factor);
            }
        }
        let singular_name = access_name(&self.name);
        let plural_name = self
            .plural_name
            .unwrap_or_else(|| pluralize(&singular_name));
        Ok(HierarchyType {
            name: self.name,
            idname,
            factors,
            parents: self.parents,
            singular_name,
            plural_name,
        })
    }
}

/// Where a factor lives, as resolved by [`Schema::hierarchy_of_factor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorLocation {
    /// Owning hierarchy type.
    pub hierarchy: String,
    /// Declared (singular) factor name.
    pub factor: String,
    /// Whether the caller spelled the factor in plural form.
    pub plural_requested: bool,
}

/// What an access name refers to.
///
/// Variants are listed in resolution priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Plural spelling of a factor, e.g. `mjds`.
    PluralFactor {
        /// Declared factor name.
        factor: String,
        /// Types declaring the factor.
        owners: Vec<String>,
    },
    /// Declared spelling of a factor, e.g. `mjd`.
    SingularFactor {
        /// Declared factor name.
        factor: String,
        /// Types declaring the factor.
        owners: Vec<String>,
    },
    /// Singular access name of a type, e.g. `exposure`.
    SingularType(Arc<HierarchyType>),
    /// Plural access name of a type, e.g. `exposures`.
    PluralType(Arc<HierarchyType>),
    /// Not known to the schema.
    Unknown,
}

/// Builder for [`Schema`].
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    hierarchies: Vec<HierarchyTypeBuilder>,
    factor_plurals: Vec<(String, String)>,
}

impl SchemaBuilder {
    /// Adds a hierarchy type declaration.
    pub fn hierarchy(mut self, hierarchy: HierarchyTypeBuilder) -> Self {
        self.hierarchies.push(hierarchy);
        self
    }

    /// Overrides the plural spelling of a factor.
    pub fn plural_factor(mut self, factor: impl Into<String>, plural: impl Into<String>) -> Self {
        self.factor_plurals.push((factor.into(), plural.into()));
        self
    }

    /// Validates the declarations and builds the schema.
    pub fn build(self) -> SchemaResult<Schema> {
        let mut schema = Schema::default();

        for builder in self.hierarchies {
            let hierarchy = Arc::new(builder.build()?);
            if schema.by_name.contains_key(hierarchy.name()) {
                return Err(SchemaError::DuplicateHierarchy(hierarchy.name().to_string()));
            }
            for access in [hierarchy.singular_name(), hierarchy.plural_name()] {
                let existing = schema
                    .singular_hierarchies
                    .get(access)
                    .or_else(|| schema.plural_hierarchies.get(access));
                if let Some(existing) = existing {
                    return Err(SchemaError::NameCollision {
                        name: access.to_string(),
                        first: existing.name().to_string(),
                        second: hierarchy.name().to_string(),
                    });
                }
            }
            schema
                .singular_hierarchies
                .insert(hierarchy.singular_name().to_string(), hierarchy.clone());
            schema
                .plural_hierarchies
                .insert(hierarchy.plural_name().to_string(), hierarchy.clone());
            schema
                .by_name
                .insert(hierarchy.name().to_string(), hierarchy.clone());
            schema.order.push(hierarchy);
        }

        for hierarchy in &schema.order {
            for relation in hierarchy.parents() {
                if !schema.by_name.contains_key(&relation.hierarchy) {
                    return Err(SchemaError::UnknownParent {
                        hierarchy: hierarchy.name().to_string(),
                        parent: relation.hierarchy.clone(),
                    });
                }
                schema.graph.add_parent(
                    hierarchy.name(),
                    &relation.hierarchy,
                    relation.multiplicity == Multiplicity::Multiple,
                );
            }
            for factor in hierarchy.factors() {
                schema
                    .singular_factors
                    .entry(factor.clone())
                    .or_default()
                    .push(hierarchy.name().to_string());
            }
        }

        let overrides: HashMap<String, String> = self.factor_plurals.into_iter().collect();
        for hierarchy in &schema.order {
            for factor in hierarchy.factors() {
                if schema.factor_plurals.contains_key(factor) {
                    continue;
                }
                let plural = overrides
                    .get(factor)
                    .cloned()
                    .unwrap_or_else(|| pluralize(factor));
                let declared = format!("{}.{}", hierarchy.name(), factor);

                // Factor spellings must not shadow type access names.
                for spelling in [factor, &plural] {
                    let taken = schema
                        .singular_hierarchies
                        .get(spelling)
                        .or_else(|| schema.plural_hierarchies.get(spelling));
                    if let Some(taken) = taken {
                        return Err(SchemaError::NameCollision {
                            name: spelling.clone(),
                            first: taken.name().to_string(),
                            second: declared,
                        });
                    }
                }

                if &plural != factor {
                    if let Some(owners) = schema.singular_factors.get(&plural) {
                        let owner = owners.first().map(String::as_str).unwrap_or_default();
                        return Err(SchemaError::NameCollision {
                            first: format!("{owner}.{plural}"),
                            name: plural,
                            second: declared,
                        });
                    }
                }
                if let Some(other) = schema.plural_factors.get(&plural) {
                    let owner = schema
                        .singular_factors
                        .get(other)
                        .and_then(|owners| owners.first())
                        .map(String::as_str)
                        .unwrap_or_default();
                    return Err(SchemaError::NameCollision {
                        first: format!("{owner}.{other}"),
                        name: plural,
                        second: declared,
                    });
                }

                schema.plural_factors.insert(plural.clone(), factor.clone());
                schema.factor_plurals.insert(factor.clone(), plural);
            }
        }

        Ok(schema)
    }
}

/// Immutable schema: hierarchy types, access-name maps and the relation graph.
///
/// Built once and shared read-only (typically behind an `Arc`) by every
/// query value.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    order: Vec<Arc<HierarchyType>>,
    by_name: HashMap<String, Arc<HierarchyType>>,
    singular_hierarchies: HashMap<String, Arc<HierarchyType>>,
    plural_hierarchies: HashMap<String, Arc<HierarchyType>>,
    /// factor name -> declaring type names
    singular_factors: HashMap<String, Vec<String>>,
    /// plural spelling -> factor name
    plural_factors: HashMap<String, String>,
    /// factor name -> plural spelling
    factor_plurals: HashMap<String, String>,
    graph: RelationGraph,
}

impl Schema {
    /// Creates a new schema builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Looks up a hierarchy type by type name.
    pub fn hierarchy(&self, name: &str) -> SchemaResult<&Arc<HierarchyType>> {
        self.by_name
            .get(name)
            .ok_or_else(|| SchemaError::UnknownHierarchy(name.to_string()))
    }

    /// Hierarchy types in declaration order.
    pub fn hierarchies(&self) -> impl Iterator<Item = &Arc<HierarchyType>> {
        self.order.iter()
    }

    /// Singular access name -> type.
    pub fn singular_hierarchies(&self) -> &HashMap<String, Arc<HierarchyType>> {
        &self.singular_hierarchies
    }

    /// Plural access name -> type.
    pub fn plural_hierarchies(&self) -> &HashMap<String, Arc<HierarchyType>> {
        &self.plural_hierarchies
    }

    /// Factor name -> declaring type names.
    pub fn singular_factors(&self) -> &HashMap<String, Vec<String>> {
        &self.singular_factors
    }

    /// Plural factor spelling -> factor name.
    pub fn plural_factors(&self) -> &HashMap<String, String> {
        &self.plural_factors
    }

    /// Returns true if `name` is a singular type or factor spelling.
    pub fn is_singular_name(&self, name: &str) -> bool {
        self.singular_hierarchies.contains_key(name) || self.singular_factors.contains_key(name)
    }

    /// Returns true if `name` is a plural type or factor spelling.
    pub fn is_plural_name(&self, name: &str) -> bool {
        self.plural_hierarchies.contains_key(name) || self.plural_factors.contains_key(name)
    }

    /// Singular spelling of a known name (identity for singular names).
    pub fn singular_name(&self, name: &str) -> Option<String> {
        if let Some(hierarchy) = self.plural_hierarchies.get(name) {
            return Some(hierarchy.singular_name().to_string());
        }
        if let Some(factor) = self.plural_factors.get(name) {
            return Some(factor.clone());
        }
        self.is_singular_name(name).then(|| name.to_string())
    }

    /// Plural spelling of a known name (identity for plural names).
    pub fn plural_name(&self, name: &str) -> Option<String> {
        if let Some(hierarchy) = self.singular_hierarchies.get(name) {
            return Some(hierarchy.plural_name().to_string());
        }
        if let Some(plural) = self.factor_plurals.get(name) {
            return Some(plural.clone());
        }
        self.is_plural_name(name).then(|| name.to_string())
    }

    /// Classifies an access name.
    pub fn resolve(&self, name: &str) -> Resolution {
        if let Some(factor) = self.plural_factors.get(name) {
            return Resolution::PluralFactor {
                factor: factor.clone(),
                owners: self.owners_of(factor),
            };
        }
        if self.singular_factors.contains_key(name) {
            return Resolution::SingularFactor {
                factor: name.to_string(),
                owners: self.owners_of(name),
            };
        }
        if let Some(hierarchy) = self.singular_hierarchies.get(name) {
            return Resolution::SingularType(hierarchy.clone());
        }
        if let Some(hierarchy) = self.plural_hierarchies.get(name) {
            return Resolution::PluralType(hierarchy.clone());
        }
        Resolution::Unknown
    }

    fn owners_of(&self, factor: &str) -> Vec<String> {
        self.singular_factors.get(factor).cloned().unwrap_or_default()
    }

    /// Finds the hierarchy type owning a factor, in either spelling.
    ///
    /// When several types declare the factor, the `hint` type wins if it is
    /// one of them; otherwise the owner reachable from `hint` by a singular
    /// route, then by the fewest hops, is chosen. Ties are ambiguous.
    pub fn hierarchy_of_factor(&self, name: &str, hint: Option<&str>) -> SchemaResult<FactorLocation> {
        let (factor, plural_requested) = match self.plural_factors.get(name) {
            Some(factor) => (factor.clone(), true),
            None if self.singular_factors.contains_key(name) => (name.to_string(), false),
            None => return Err(SchemaError::UnknownFactor(name.to_string())),
        };
        let owners = self.owners_of(&factor);

        let location = |hierarchy: &str| FactorLocation {
            hierarchy: hierarchy.to_string(),
            factor: factor.clone(),
            plural_requested,
        };

        if let Some(hint) = hint {
            if owners.iter().any(|o| o == hint) {
                return Ok(location(hint));
            }
        }
        if let [only] = owners.as_slice() {
            return Ok(location(only.as_str()));
        }
        let ambiguous = || SchemaError::AmbiguousFactor {
            factor: factor.clone(),
            owners: owners.clone(),
        };
        let Some(hint) = hint else {
            return Err(ambiguous());
        };

        let mut ranked: Vec<((bool, usize), &String)> = owners
            .iter()
            .filter_map(|owner| {
                self.graph
                    .prove(hint, owner)
                    .ok()
                    .map(|proof| ((proof.plural, proof.hop_count()), owner))
            })
            .collect();
        ranked.sort();
        match ranked.as_slice() {
            [(best, owner), rest @ ..] if rest.first().map_or(true, |(next, _)| next != best) => {
                Ok(location(owner.as_str()))
            }
            _ => Err(ambiguous()),
        }
    }

    /// Proves whether the hop from `start` to `end` (type names) is plural.
    pub fn node_implies_plurality_of(&self, start: &str, end: &str) -> SchemaResult<PluralityProof> {
        self.hierarchy(start)?;
        self.hierarchy(end)?;
        self.graph.prove(start, end)
    }
}
