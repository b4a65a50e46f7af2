//! The schema facade shared by every query value.

use std::sync::Arc;

use hierarchy_schema::{
    parse, AccessPath, AccessStep, FactorLocation, HierarchyType, Identifier, PluralityProof,
    Resolution, Schema,
};
use tracing::{debug, trace};

use crate::cache::{CacheStats, PathCache};
use crate::config::QueryConfig;
use crate::error::{BuildResult, QueryBuildError};
use crate::query::{Accessed, Heterogeneous, HierarchyQuery};

/// Read-only schema facade and session entry point.
///
/// A handler is created once per schema and shared behind an `Arc` by every
/// query value derived from it. Apart from the plurality-proof memo it holds
/// no state, so it is safe to share between threads.
///
/// # Example
///
/// ```rust
/// use hierarchy_query::Handler;
/// use hierarchy_schema::{HierarchyType, Schema};
///
/// let schema = Schema::builder()
///     .hierarchy(HierarchyType::builder("OB").idname("obid"))
///     .hierarchy(
///         HierarchyType::builder("Exposure")
///             .idname("expid")
///             .factor("mjd")
///             .parent("OB"),
///     )
///     .build()
///     .unwrap();
/// let handler = Handler::new(schema);
///
/// // Fails before touching any store: an OB has many exposures.
/// assert!(handler.query("ob[1].exposure").is_err());
/// assert!(handler.query("ob[1].exposures['mjd']").is_ok());
/// ```
#[derive(Debug)]
pub struct Handler {
    schema: Arc<Schema>,
    config: QueryConfig,
    cache: Option<PathCache>,
}

impl Handler {
    /// Creates a handler with the default configuration.
    pub fn new(schema: impl Into<Arc<Schema>>) -> Arc<Self> {
        Self::with_config(schema, QueryConfig::default())
    }

    /// Creates a handler with a custom configuration.
    pub fn with_config(schema: impl Into<Arc<Schema>>, config: QueryConfig) -> Arc<Self> {
        let cache = config.path_cache.as_ref().map(PathCache::new);
        Arc::new(Self {
            schema: schema.into(),
            config,
            cache,
        })
    }

    /// The schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The configuration.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Plurality-proof cache counters, if caching is enabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(PathCache::stats)
    }

    /// Starts a session at the heterogeneous root.
    pub fn begin_with_heterogeneous(self: &Arc<Self>) -> HierarchyQuery {
        HierarchyQuery::Heterogeneous(Heterogeneous::root(self.clone()))
    }

    /// Starts a session at every instance of a hierarchy type.
    pub fn begin(self: &Arc<Self>, hierarchy: &str) -> BuildResult<HierarchyQuery> {
        let hierarchy = self.lookup(hierarchy)?;
        let root = self.begin_with_heterogeneous();
        match &root {
            HierarchyQuery::Heterogeneous(h) => Ok(h.begin(&root, &hierarchy)),
            _ => Err(QueryBuildError::NoTypeContext {
                name: hierarchy.name().to_string(),
            }),
        }
    }

    /// Starts a session at the one instance of a type with the given identifier.
    pub fn identify(
        self: &Arc<Self>,
        hierarchy: &str,
        identifier: impl Into<Identifier>,
    ) -> BuildResult<HierarchyQuery> {
        match self.begin_with_heterogeneous() {
            HierarchyQuery::Heterogeneous(root) => root.identify(hierarchy, identifier),
            _ => Err(QueryBuildError::NoTypeContext {
                name: hierarchy.to_string(),
            }),
        }
    }

    /// Parses an access path and applies it from the heterogeneous root.
    pub fn query(self: &Arc<Self>, text: &str) -> BuildResult<Accessed> {
        let path = parse(text)?;
        self.apply(&path)
    }

    /// Applies a parsed access path from the heterogeneous root.
    ///
    /// A leading `type[id]` (singular type name followed by a bare
    /// identifier) pins a single instance.
    pub fn apply(self: &Arc<Self>, path: &AccessPath) -> BuildResult<Accessed> {
        let mut current = Accessed::Hierarchy(self.begin_with_heterogeneous());
        let mut rest = path.steps.as_slice();
        if let [AccessStep::Attribute(name), AccessStep::Identifier(id), tail @ ..] = rest {
            if let Resolution::SingularType(hierarchy) = self.resolve(name) {
                current = Accessed::Hierarchy(self.identify(hierarchy.name(), id.clone())?);
                rest = tail;
            }
        }
        for step in rest {
            current = current.apply(step)?;
        }
        Ok(current)
    }

    /// Classifies an access name.
    pub fn resolve(&self, name: &str) -> Resolution {
        self.schema.resolve(name)
    }

    /// Finds the type owning a factor, preferring `hint`.
    pub fn hierarchy_of_factor(&self, name: &str, hint: Option<&str>) -> BuildResult<FactorLocation> {
        Ok(self.schema.hierarchy_of_factor(name, hint)?)
    }

    /// Proves whether the hop from `start` to `end` is plural.
    pub fn node_implies_plurality_of(&self, start: &str, end: &str) -> BuildResult<PluralityProof> {
        if let Some(proof) = self.cache.as_ref().and_then(|c| c.get(start, end)) {
            trace!(start, end, "plurality proof cache hit");
            return Ok(proof);
        }
        let proof = self.schema.node_implies_plurality_of(start, end)?;
        debug!(
            start,
            end,
            plural = proof.plural,
            hops = proof.hop_count(),
            path = %proof.path,
            "proved hop plurality"
        );
        if let Some(cache) = &self.cache {
            cache.set(start, end, proof.clone());
        }
        Ok(proof)
    }

    /// Returns true if `name` is a singular type or factor spelling.
    pub fn is_singular_name(&self, name: &str) -> bool {
        self.schema.is_singular_name(name)
    }

    /// Returns true if `name` is a plural type or factor spelling.
    pub fn is_plural_name(&self, name: &str) -> bool {
        self.schema.is_plural_name(name)
    }

    /// Singular spelling of a known name.
    pub fn singular_name(&self, name: &str) -> Option<String> {
        self.schema.singular_name(name)
    }

    /// Plural spelling of a known name.
    pub fn plural_name(&self, name: &str) -> Option<String> {
        self.schema.plural_name(name)
    }

    /// Looks up a type by type name or singular access name.
    pub(crate) fn lookup(&self, name: &str) -> BuildResult<Arc<HierarchyType>> {
        match self.schema.hierarchy(name) {
            Ok(hierarchy) => Ok(hierarchy.clone()),
            Err(err) => self
                .schema
                .singular_hierarchies()
                .get(name)
                .cloned()
                .ok_or(QueryBuildError::Schema(err)),
        }
    }
}
