//! Store statistics.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of store contents and execution counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Total nodes.
    pub node_count: usize,
    /// Total child-to-parent links.
    pub link_count: usize,
    /// Nodes per hierarchy type (types with no nodes included).
    pub nodes_by_type: BTreeMap<String, u64>,
    /// Statements executed so far.
    pub statements_run: u64,
    /// Rows returned across all statements.
    pub rows_returned: u64,
}

impl StoreStats {
    /// Mean rows per executed statement.
    pub fn avg_rows_per_statement(&self) -> f64 {
        if self.statements_run == 0 {
            0.0
        } else {
            self.rows_returned as f64 / self.statements_run as f64
        }
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} nodes, {} links, {} statements ({:.1} rows avg)",
            self.node_count,
            self.link_count,
            self.statements_run,
            self.avg_rows_per_statement()
        )?;
        for (hierarchy, count) in &self.nodes_by_type {
            writeln!(f, "  {}: {}", hierarchy, count)?;
        }
        Ok(())
    }
}

/// Execution counters, updated from `&self` by concurrent runs.
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    statements: AtomicU64,
    rows: AtomicU64,
}

impl RunCounters {
    pub(crate) fn record(&self, rows: usize) {
        self.statements.fetch_add(1, Ordering::Relaxed);
        self.rows.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub(crate) fn statements(&self) -> u64 {
        self.statements.load(Ordering::Relaxed)
    }

    pub(crate) fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_rows() {
        let counters = RunCounters::default();
        counters.record(3);
        counters.record(1);
        let stats = StoreStats {
            statements_run: counters.statements(),
            rows_returned: counters.rows(),
            ..Default::default()
        };
        assert_eq!(stats.avg_rows_per_statement(), 2.0);
        assert_eq!(StoreStats::default().avg_rows_per_statement(), 0.0);
    }
}
