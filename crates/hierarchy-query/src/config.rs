//! Configuration types for the query handler.

/// What happens to repeated identifiers in an identifier-list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierPolicy {
    /// Keep the list verbatim: `[[1, 2, 2]]` yields three results.
    #[default]
    Preserve,
    /// Drop repeats, keeping first occurrences: `[[1, 2, 2]]` yields two.
    Deduplicate,
}

/// Configuration for the query handler.
///
/// # Example
///
/// ```rust
/// use hierarchy_query::{CacheConfig, IdentifierPolicy, QueryConfig};
///
/// let config = QueryConfig::builder()
///     .with_path_cache(CacheConfig::default())
///     .with_max_results(100_000)
///     .with_identifier_policy(IdentifierPolicy::Deduplicate)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryConfig {
    /// Plurality-proof cache configuration (None = caching disabled).
    pub path_cache: Option<CacheConfig>,
    /// Maximum number of rows accepted from a cursor (None = unlimited).
    pub max_results: Option<usize>,
    /// Treatment of repeated identifiers in `[[ids]]` filters.
    pub identifier_policy: IdentifierPolicy,
}

impl QueryConfig {
    /// Creates a new builder for QueryConfig.
    pub fn builder() -> QueryConfigBuilder {
        QueryConfigBuilder::default()
    }
}

/// Builder for QueryConfig.
#[derive(Debug, Clone, Default)]
pub struct QueryConfigBuilder {
    path_cache: Option<CacheConfig>,
    max_results: Option<usize>,
    identifier_policy: IdentifierPolicy,
}

impl QueryConfigBuilder {
    /// Enables plurality-proof caching with the given configuration.
    pub fn with_path_cache(mut self, cache: CacheConfig) -> Self {
        self.path_cache = Some(cache);
        self
    }

    /// Sets the maximum number of result rows.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Sets the identifier-list policy.
    pub fn with_identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }

    /// Builds the QueryConfig.
    pub fn build(self) -> QueryConfig {
        QueryConfig {
            path_cache: self.path_cache,
            max_results: self.max_results,
            identifier_policy: self.identifier_policy,
        }
    }
}

/// Configuration for the plurality-proof cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached (start, end) proofs.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 1_024 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_config_default() {
        let config = QueryConfig::default();
        assert!(config.path_cache.is_none());
        assert!(config.max_results.is_none());
        assert_eq!(config.identifier_policy, IdentifierPolicy::Preserve);
    }

    #[test]
    fn test_query_config_builder() {
        let config = QueryConfig::builder()
            .with_path_cache(CacheConfig { max_entries: 16 })
            .with_max_results(500)
            .with_identifier_policy(IdentifierPolicy::Deduplicate)
            .build();

        assert_eq!(config.path_cache.map(|c| c.max_entries), Some(16));
        assert_eq!(config.max_results, Some(500));
        assert_eq!(config.identifier_policy, IdentifierPolicy::Deduplicate);
    }

    #[test]
    fn test_cache_config_default() {
        assert_eq!(CacheConfig::default().max_entries, 1_024);
    }
}
