//! Plural queries: every instance of a type, optionally restricted to an
//! ordered identifier list.

use std::collections::{HashMap, HashSet};

use hierarchy_schema::{AccessStep, HierarchyType, Identifier, Value};
use tracing::warn;

use crate::branch::{Expression, Predicate};
use crate::config::IdentifierPolicy;
use crate::error::{BuildResult, ExecResult, IdentifierReport, QueryBuildError, QueryExecutionError};
use crate::result::Output;
use crate::traits::Row;

use super::definite::{node_at, Definite};
use super::factor::FactorQuery;
use super::{Accessed, Frozen, HierarchyQuery, Index};

/// Every instance of a type reachable from the parent value.
#[derive(Debug, Clone)]
pub struct Homogeneous {
    pub(crate) definite: Definite,
}

impl Homogeneous {
    pub(crate) fn new(definite: Definite) -> Self {
        Self { definite }
    }

    /// The hierarchy type.
    pub fn hierarchy(&self) -> &HierarchyType {
        &self.definite.hierarchy
    }

    pub(crate) fn index(&self, this: &HierarchyQuery, index: Index) -> BuildResult<Accessed> {
        match index {
            Index::Name(name) => self.definite.get(this, &name),
            Index::Names(names) => {
                FactorQuery::read(this, &self.definite, names, true).map(Accessed::Factor)
            }
            Index::Id(identifier) => Err(QueryBuildError::BareIdentifier {
                identifier,
                context: self.definite.frozen.context(),
            }),
            Index::Ids(identifiers) => Ok(Accessed::Hierarchy(HierarchyQuery::Identified(
                self.identified(this, identifiers),
            ))),
        }
    }

    fn identified(&self, this: &HierarchyQuery, requested: Vec<Identifier>) -> Identified {
        let definite = &self.definite;
        let identifiers = match definite.frozen.handler.config().identifier_policy {
            IdentifierPolicy::Preserve => requested.clone(),
            IdentifierPolicy::Deduplicate => {
                let mut seen = HashSet::new();
                requested
                    .iter()
                    .filter(|id| seen.insert(*id))
                    .cloned()
                    .collect()
            }
        };
        let list = Value::List(identifiers.iter().cloned().map(Value::from).collect());
        let (branch, data) = definite.frozen.branch.add_data(list);
        let branch = branch.filter(Predicate::In {
            item: Expression::property(definite.node, definite.hierarchy.idname()),
            list: Expression::Variable(data),
        });
        let frozen = Frozen::derive(this, branch, vec![AccessStep::Identifiers(requested)], None);
        Identified {
            definite: Definite::new(frozen, definite.hierarchy.clone(), definite.node),
            identifiers,
        }
    }
}

/// A homogeneous query restricted to caller-supplied identifiers.
///
/// Results follow the identifier list: order is kept and, under
/// [`IdentifierPolicy::Preserve`], a repeated identifier yields a repeated
/// result.
///
/// Missing identifiers are only reported when this query itself executes.
/// Queries derived from it (`runs[[1, 99]].exposure`) keep the identifier
/// filter but not the check, so an unmatched `99` simply contributes no
/// rows there. Execute the identified query first to validate the list.
#[derive(Debug, Clone)]
pub struct Identified {
    pub(crate) definite: Definite,
    pub(crate) identifiers: Vec<Identifier>,
}

impl Identified {
    /// The hierarchy type.
    pub fn hierarchy(&self) -> &HierarchyType {
        &self.definite.hierarchy
    }

    /// Identifiers after the identifier policy was applied.
    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    pub(crate) fn index(&self, this: &HierarchyQuery, index: Index) -> BuildResult<Accessed> {
        match index {
            Index::Name(name) => self.definite.get(this, &name),
            Index::Names(names) => {
                FactorQuery::read(this, &self.definite, names, true).map(Accessed::Factor)
            }
            Index::Id(_) | Index::Ids(_) => Err(QueryBuildError::AlreadyIdentified {
                context: self.definite.frozen.context(),
            }),
        }
    }

    /// Arranges rows in identifier order and reports unmatched identifiers.
    pub(crate) fn order_rows<'a>(
        &self,
        rows: &'a [Row],
        column: usize,
    ) -> ExecResult<(Vec<&'a Row>, IdentifierReport)> {
        order_by_identifiers(rows, column, &self.identifiers, self.definite.hierarchy.idname())
    }
}

pub(crate) fn order_by_identifiers<'a>(
    rows: &'a [Row],
    column: usize,
    identifiers: &[Identifier],
    idname: &str,
) -> ExecResult<(Vec<&'a Row>, IdentifierReport)> {
    let mut by_identifier: HashMap<&Identifier, Vec<&Row>> = HashMap::new();
    for row in rows {
        let node = node_at(row, column)?;
        by_identifier.entry(&node.identifier).or_default().push(row);
    }

    let mut ordered = Vec::with_capacity(identifiers.len());
    let mut missing = IdentifierReport::new();
    for identifier in identifiers {
        match by_identifier.get(identifier) {
            Some(matched) => ordered.extend(matched.iter().copied()),
            None => missing.push(idname, identifier.clone()),
        }
    }
    Ok((ordered, missing))
}

/// Returns `output`, or the combined absence error if anything is missing.
pub(crate) fn finish(
    query: &HierarchyQuery,
    output: Output,
    missing: IdentifierReport,
) -> ExecResult<Output> {
    if missing.is_empty() {
        return Ok(output);
    }
    warn!(path = %query.access_path(), %missing, "identifiers not found");
    Err(QueryExecutionError::MissingIdentifiers {
        missing,
        partial: Box::new(output),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use hierarchy_schema::Schema;

    use super::*;
    use crate::config::QueryConfig;
    use crate::handler::Handler;
    use crate::traits::{Cell, NodeRecord};

    fn schema() -> Schema {
        Schema::builder()
            .hierarchy(HierarchyType::builder("OB").idname("obid"))
            .hierarchy(
                HierarchyType::builder("Run")
                    .idname("runid")
                    .factor("camera")
                    .parent("OB"),
            )
            .build()
            .unwrap()
    }

    fn row(id: i64) -> Row {
        Row::new(vec![Cell::Node(NodeRecord {
            hierarchy: "Run".to_string(),
            identifier: Identifier::Int(id),
            properties: BTreeMap::new(),
        })])
    }

    #[test]
    fn test_bare_identifier_rejected() {
        let runs = Handler::new(schema()).begin("Run").unwrap();
        let err = runs.index(Index::Id(Identifier::Int(1))).unwrap_err();
        assert!(matches!(err, QueryBuildError::BareIdentifier { .. }));
        assert!(err.to_string().contains("[[1]]"));
    }

    #[test]
    fn test_identifier_list_yields_identified() {
        let runs = Handler::new(schema()).begin("Run").unwrap();
        let identified = runs.index(Index::ids([1])).unwrap().into_hierarchy().unwrap();
        match &identified {
            HierarchyQuery::Identified(q) => assert_eq!(q.identifiers(), &[Identifier::Int(1)]),
            other => panic!("expected identified, got {}", other.kind()),
        }
        assert_eq!(identified.access_path().to_string(), "runs[[1]]");
    }

    #[test]
    fn test_identified_rejects_further_identifiers() {
        let runs = Handler::new(schema()).begin("Run").unwrap();
        let identified = runs.index(Index::ids([1, 2])).unwrap();
        assert!(matches!(
            identified.index(Index::ids([3])),
            Err(QueryBuildError::AlreadyIdentified { .. })
        ));
        assert!(matches!(
            identified.index(Index::Id(Identifier::Int(3))),
            Err(QueryBuildError::AlreadyIdentified { .. })
        ));
    }

    #[test]
    fn test_deduplicate_policy() {
        let config = QueryConfig::builder()
            .with_identifier_policy(IdentifierPolicy::Deduplicate)
            .build();
        let runs = Handler::with_config(schema(), config).begin("Run").unwrap();
        let identified = runs.index(Index::ids([2, 1, 2])).unwrap().into_hierarchy().unwrap();
        match identified {
            HierarchyQuery::Identified(q) => assert_eq!(
                q.identifiers(),
                &[Identifier::Int(2), Identifier::Int(1)]
            ),
            other => panic!("expected identified, got {}", other.kind()),
        }
    }

    #[test]
    fn test_order_preserves_duplicates_and_reports_missing() {
        let rows = vec![row(2), row(1)];
        let ids: Vec<Identifier> = [1, 2, 2, 99].into_iter().map(Identifier::from).collect();
        let (ordered, missing) = order_by_identifiers(&rows, 0, &ids, "runid").unwrap();

        let order: Vec<_> = ordered
            .iter()
            .map(|r| node_at(r, 0).unwrap().identifier.clone())
            .collect();
        assert_eq!(
            order,
            vec![Identifier::Int(1), Identifier::Int(2), Identifier::Int(2)]
        );
        assert_eq!(missing.to_string(), "{runid: [99]}");
    }

    #[test]
    fn test_identified_plural_hop_compounds() {
        let handler: Arc<Handler> = Handler::new(schema());
        let obs = handler.begin("OB").unwrap();
        let identified = obs.index(Index::ids([1])).unwrap();
        assert!(identified.get("runs").is_ok());
        assert!(matches!(
            identified.get("run"),
            Err(QueryBuildError::Ambiguous { .. })
        ));
    }
}
