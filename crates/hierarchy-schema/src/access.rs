//! Abstract syntax for access paths.

use std::fmt;

use crate::value::Identifier;

/// One access applied to a query value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessStep {
    /// Attribute access: `.exposures`, or the leading name of a path.
    Attribute(String),
    /// Bare identifier index: `[1002]`.
    Identifier(Identifier),
    /// Identifier-list index: `[[1002, 1003]]`.
    Identifiers(Vec<Identifier>),
    /// Table index: `['mjd', 'expid']`.
    Columns(Vec<String>),
}

/// A parsed access path, applied left to right from the heterogeneous root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessPath {
    /// Ordered steps.
    pub steps: Vec<AccessStep>,
}

impl AccessPath {
    /// Creates a path from steps.
    pub fn new(steps: Vec<AccessStep>) -> Self {
        Self { steps }
    }

    /// Appends a step, returning the extended path.
    pub fn with(mut self, step: AccessStep) -> Self {
        self.steps.push(step);
        self
    }
}

fn write_list<T, F>(f: &mut fmt::Formatter<'_>, items: &[T], mut item: F) -> fmt::Result
where
    F: FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
{
    for (i, value) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        item(f, value)?;
    }
    Ok(())
}

impl fmt::Display for AccessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessStep::Attribute(name) => write!(f, ".{}", name),
            AccessStep::Identifier(id) => write!(f, "[{}]", id),
            AccessStep::Identifiers(ids) => {
                write!(f, "[[")?;
                write_list(f, ids, |f, id| write!(f, "{}", id))?;
                write!(f, "]]")
            }
            AccessStep::Columns(names) => {
                write!(f, "[")?;
                write_list(f, names, |f, name| write!(f, "'{}'", name))?;
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                AccessStep::Attribute(name) if i == 0 => write!(f, "{}", name)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_full_path() {
        let path = AccessPath::default()
            .with(AccessStep::Attribute("runs".to_string()))
            .with(AccessStep::Identifiers(vec![1.into(), "a".into()]))
            .with(AccessStep::Attribute("exposure".to_string()))
            .with(AccessStep::Columns(vec!["mjd".to_string(), "expid".to_string()]));
        assert_eq!(path.to_string(), "runs[[1, \"a\"]].exposure['mjd', 'expid']");
    }

    #[test]
    fn test_display_single_identifier() {
        let path = AccessPath::new(vec![
            AccessStep::Attribute("run".to_string()),
            AccessStep::Identifier(1002.into()),
        ]);
        assert_eq!(path.to_string(), "run[1002]");
    }
}
