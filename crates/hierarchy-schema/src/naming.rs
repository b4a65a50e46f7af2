//! Access-name conventions.
//!
//! Hierarchy types are reached through lowercase access names (`Exposure` is
//! `exposure` / `exposures`). Factors keep their declared name for the
//! singular spelling. Plural spellings follow English suffix rules unless the
//! schema declares an override.

/// Returns the singular access name for a hierarchy type name.
pub fn access_name(type_name: &str) -> String {
    type_name.to_lowercase()
}

/// Returns the default plural spelling of a singular access name.
///
/// ```rust
/// use hierarchy_schema::naming::pluralize;
///
/// assert_eq!(pluralize("exposure"), "exposures");
/// assert_eq!(pluralize("survey"), "surveys");
/// assert_eq!(pluralize("class"), "classes");
/// assert_eq!(pluralize("category"), "categories");
/// ```
pub fn pluralize(word: &str) -> String {
    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{}es", word);
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) && !stem.is_empty() {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_name_lowercases() {
        assert_eq!(access_name("OBSpec"), "obspec");
        assert_eq!(access_name("Run"), "run");
    }

    #[test]
    fn test_pluralize_suffixes() {
        assert_eq!(pluralize("run"), "runs");
        assert_eq!(pluralize("mjd"), "mjds");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("batch"), "batches");
        assert_eq!(pluralize("key"), "keys");
        assert_eq!(pluralize("y"), "ys");
    }
}
