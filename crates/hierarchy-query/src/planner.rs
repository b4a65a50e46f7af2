//! Explain plans for query lineages.
//!
//! A plan lists every value from the root to the explained one with the
//! plurality decision made at each step. Building a plan never touches a
//! store.

use std::fmt;

use crate::branch::Statement;
use crate::query::{FactorQuery, HierarchyQuery};

/// The lineage of a query, root first.
///
/// # Example
///
/// ```ignore
/// let plan = handler.query("ob[1].exposures['mjd']")?.explain();
///
/// for step in &plan.steps {
///     println!("{} -> {}", step.access, step.kind);
/// }
/// println!("{}", plan);
/// ```
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Full access path of the explained value.
    pub path: String,
    /// One step per derived value.
    pub steps: Vec<PlanStep>,
    /// Compiled statement, when the value is executable.
    pub statement: Option<Statement>,
}

impl QueryPlan {
    pub(crate) fn from_lineage(query: &HierarchyQuery, statement: Option<Statement>) -> Self {
        let mut steps: Vec<PlanStep> = query.lineage().filter_map(PlanStep::of).collect();
        steps.reverse();
        Self {
            path: query.access_path().to_string(),
            steps,
            statement,
        }
    }

    pub(crate) fn for_factor(query: &FactorQuery, statement: Statement) -> Self {
        let mut plan = match query.parent() {
            Some(parent) => Self::from_lineage(parent, None),
            None => Self {
                path: String::new(),
                steps: Vec::new(),
                statement: None,
            },
        };
        let plural = query.columns().iter().any(|c| c.plural || c.collected);
        let access = query
            .access_path()
            .steps
            .last()
            .map(ToString::to_string)
            .unwrap_or_default();
        plan.steps.push(PlanStep {
            access,
            kind: format!("{:?}", query.shape()),
            hierarchy: Some(query.hierarchy().name().to_string()),
            plural,
            expected_count: if plural { None } else { Some(1) },
            route: None,
        });
        plan.path = query.access_path().to_string();
        plan.statement = Some(statement);
        plan
    }

    /// Returns true if any step can fan out to many instances.
    pub fn is_plural(&self) -> bool {
        self.steps.iter().any(|s| s.plural)
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Query Plan for: {}", self.path)?;
        writeln!(f)?;
        writeln!(f, "Steps:")?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, step)?;
        }
        if let Some(statement) = &self.statement {
            writeln!(f)?;
            writeln!(f, "Statement:")?;
            for line in statement.to_string().lines() {
                writeln!(f, "  {}", line)?;
            }
        }
        Ok(())
    }
}

/// One derived value of a lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Access that produced the value, e.g. `.exposures` or `[[1, 2]]`.
    pub access: String,
    /// Query kind or factor shape.
    pub kind: String,
    /// Hierarchy type, if typed.
    pub hierarchy: Option<String>,
    /// Whether the value can hold more than one instance.
    pub plural: bool,
    /// `Some(1)` for definite values.
    pub expected_count: Option<usize>,
    /// Schema route of the hop, if the step crossed one.
    pub route: Option<String>,
}

impl PlanStep {
    fn of(query: &HierarchyQuery) -> Option<Self> {
        let frozen = query.frozen();
        if frozen.steps.is_empty() {
            return None;
        }
        let access = frozen.steps.iter().map(ToString::to_string).collect();
        let plural = query.is_plural();
        Some(Self {
            access,
            kind: query.kind().to_string(),
            hierarchy: query.hierarchy().map(|h| h.name().to_string()),
            plural,
            expected_count: if plural { None } else { Some(1) },
            route: frozen
                .proof
                .as_ref()
                .filter(|p| !p.is_identity())
                .map(|p| p.path.to_string()),
        })
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.access, self.kind)?;
        if let Some(hierarchy) = &self.hierarchy {
            write!(f, " {}", hierarchy)?;
        }
        if let Some(route) = &self.route {
            write!(f, " via {}", route)?;
        }
        match self.expected_count {
            Some(count) => write!(f, " (expects {})", count),
            None => write!(f, " (plural)"),
        }
    }
}
