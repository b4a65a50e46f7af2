//! Persistent execution branches.
//!
//! A [`Branch`] is an immutable, structurally shared list of steps. Every
//! operation returns a new branch that points at its predecessor, so sibling
//! queries derived from one parent share the common prefix and never observe
//! each other's extensions.
//!
//! Compiling a branch yields a [`Statement`], the unit handed to an
//! [`ExecutionSubstrate`](crate::ExecutionSubstrate).

use std::fmt;
use std::sync::Arc;

use hierarchy_schema::{TraversalPath, Value};

/// A branch variable: a column of the eventual result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(u32);

impl Var {
    /// Numeric index of the variable within its branch.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A value-producing expression over bound variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// The value bound to a variable.
    Variable(Var),
    /// A property of the node bound to a variable.
    Property {
        /// Node variable.
        node: Var,
        /// Property (factor) name.
        name: String,
    },
    /// A literal.
    Literal(Value),
}

impl Expression {
    /// Shorthand for [`Expression::Property`].
    pub fn property(node: Var, name: impl Into<String>) -> Self {
        Expression::Property {
            node,
            name: name.into(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Variable(var) => write!(f, "{}", var),
            Expression::Property { node, name } => write!(f, "{}.{}", node, name),
            Expression::Literal(value) => write!(f, "{}", value),
        }
    }
}

/// A row filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Both sides evaluate to equal values.
    Equals(Expression, Expression),
    /// `item` is one of the values of the list `list` evaluates to.
    In {
        /// Tested expression.
        item: Expression,
        /// List-valued expression.
        list: Expression,
    },
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equals(left, right) => write!(f, "{} = {}", left, right),
            Predicate::In { item, list } => write!(f, "{} IN {}", item, list),
        }
    }
}

/// One step of a branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Bind `var` to every instance of a hierarchy type (row fan-out).
    Match {
        /// Bound variable.
        var: Var,
        /// Hierarchy type name.
        hierarchy: String,
    },
    /// Bind `to` to every instance reachable from `from` along `path`.
    ///
    /// An optional traversal keeps rows with no match, binding `to` to null.
    Traverse {
        /// Start node variable.
        from: Var,
        /// Bound variable.
        to: Var,
        /// Schema-level route.
        path: TraversalPath,
        /// Keep unmatched rows.
        optional: bool,
    },
    /// Bind a caller-supplied literal.
    Data {
        /// Bound variable.
        var: Var,
        /// Literal value.
        value: Value,
    },
    /// Keep only rows satisfying a predicate.
    Filter(Predicate),
    /// Bind the value of an expression.
    Operate {
        /// Bound variable.
        var: Var,
        /// Evaluated expression.
        expression: Expression,
    },
    /// Group rows by `group` and aggregate each expression into a list.
    ///
    /// Only the group variables and the collected variables survive.
    Collect {
        /// Grouping variables, in key order.
        group: Vec<Var>,
        /// (bound variable, aggregated expression) pairs.
        collected: Vec<(Var, Expression)>,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Match { var, hierarchy } => write!(f, "MATCH ({}:{})", var, hierarchy),
            Step::Traverse {
                from,
                to,
                path,
                optional,
            } => {
                if *optional {
                    write!(f, "OPTIONAL ")?;
                }
                write!(f, "TRAVERSE {} {} AS {}", from, path, to)
            }
            Step::Data { var, value } => write!(f, "WITH {} AS {}", value, var),
            Step::Filter(predicate) => write!(f, "WHERE {}", predicate),
            Step::Operate { var, expression } => write!(f, "WITH {} AS {}", expression, var),
            Step::Collect { group, collected } => {
                write!(f, "WITH ")?;
                for var in group {
                    write!(f, "{}, ", var)?;
                }
                for (i, (var, expression)) in collected.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "collect({}) AS {}", expression, var)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
struct BranchNode {
    step: Step,
    previous: Option<Arc<BranchNode>>,
}

/// An immutable, structurally shared execution branch.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    head: Option<Arc<BranchNode>>,
    len: usize,
    next_var: u32,
}

impl Branch {
    /// Creates an empty branch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the branch has no steps.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn fresh(&self) -> (Branch, Var) {
        let var = Var(self.next_var);
        let branch = Branch {
            head: self.head.clone(),
            len: self.len,
            next_var: self.next_var + 1,
        };
        (branch, var)
    }

    fn push(self, step: Step) -> Branch {
        tracing::trace!(step = %step, "branch step");
        Branch {
            head: Some(Arc::new(BranchNode {
                step,
                previous: self.head,
            })),
            len: self.len + 1,
            next_var: self.next_var,
        }
    }

    /// Binds every instance of a hierarchy type.
    pub fn begin(&self, hierarchy: &str) -> (Branch, Var) {
        let (branch, var) = self.fresh();
        let step = Step::Match {
            var,
            hierarchy: hierarchy.to_string(),
        };
        (branch.push(step), var)
    }

    /// Follows a schema route from a node variable.
    pub fn traverse(&self, from: Var, path: TraversalPath) -> (Branch, Var) {
        self.traverse_with(from, path, false)
    }

    /// Follows a schema route, keeping rows that reach nothing.
    pub fn traverse_optional(&self, from: Var, path: TraversalPath) -> (Branch, Var) {
        self.traverse_with(from, path, true)
    }

    fn traverse_with(&self, from: Var, path: TraversalPath, optional: bool) -> (Branch, Var) {
        let (branch, to) = self.fresh();
        let step = Step::Traverse {
            from,
            to,
            path,
            optional,
        };
        (branch.push(step), to)
    }

    /// Keeps rows satisfying a predicate.
    pub fn filter(&self, predicate: Predicate) -> Branch {
        self.clone().push(Step::Filter(predicate))
    }

    /// Binds the value of an expression.
    pub fn operate(&self, expression: Expression) -> (Branch, Var) {
        let (branch, var) = self.fresh();
        (branch.push(Step::Operate { var, expression }), var)
    }

    /// Re-aggregates rows by `group`, collecting each expression into a list.
    pub fn collect(&self, group: &[Var], expressions: Vec<Expression>) -> (Branch, Vec<Var>) {
        let mut branch = self.clone();
        let mut collected = Vec::with_capacity(expressions.len());
        for expression in expressions {
            let (next, var) = branch.fresh();
            branch = next;
            collected.push((var, expression));
        }
        let vars = collected.iter().map(|(var, _)| *var).collect();
        let step = Step::Collect {
            group: group.to_vec(),
            collected,
        };
        (branch.push(step), vars)
    }

    /// [`collect`](Self::collect) for a single expression.
    pub fn collect_one(&self, group: &[Var], expression: Expression) -> (Branch, Var) {
        let (branch, var) = self.fresh();
        let step = Step::Collect {
            group: group.to_vec(),
            collected: vec![(var, expression)],
        };
        (branch.push(step), var)
    }

    /// Binds a caller-supplied literal or list.
    pub fn add_data(&self, value: Value) -> (Branch, Var) {
        let (branch, var) = self.fresh();
        (branch.push(Step::Data { var, value }), var)
    }

    /// Steps in execution order.
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = Vec::with_capacity(self.len);
        let mut cursor = self.head.as_deref();
        while let Some(node) = cursor {
            steps.push(node.step.clone());
            cursor = node.previous.as_deref();
        }
        steps.reverse();
        steps
    }

    /// Variables bound to hierarchy nodes, with their type names, in order.
    pub fn find_hierarchies(&self) -> Vec<(Var, String)> {
        self.steps()
            .into_iter()
            .filter_map(|step| match step {
                Step::Match { var, hierarchy } => Some((var, hierarchy)),
                Step::Traverse { to, path, .. } => Some((to, path.end)),
                _ => None,
            })
            .collect()
    }

    /// Compiles the branch into a statement returning `returns`.
    pub fn compile(&self, returns: Vec<Var>) -> Statement {
        Statement {
            hierarchies: self.find_hierarchies(),
            steps: self.steps(),
            returns,
        }
    }
}

/// A compiled branch, ready for an execution substrate.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Steps in execution order.
    pub steps: Vec<Step>,
    /// Returned variables, one result column each.
    pub returns: Vec<Var>,
    /// Hierarchy-bound variables and their types.
    pub hierarchies: Vec<(Var, String)>,
}

impl Statement {
    /// Hierarchy type bound to a variable, if it is a node variable.
    pub fn hierarchy_of(&self, var: Var) -> Option<&str> {
        self.hierarchies
            .iter()
            .find(|(v, _)| *v == var)
            .map(|(_, h)| h.as_str())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{}", step)?;
        }
        write!(f, "RETURN ")?;
        for (i, var) in self.returns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", var)?;
        }
        Ok(())
    }
}
