//! In-memory definition repository.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::QueryDefinitionRepository;
use crate::definition::QueryDefinition;
use crate::error::{QueryError, Result};

/// Definitions loaded up front and checked as a whole.
///
/// Loading rejects duplicate names, fetches referencing unknown
/// definitions and fetch graphs that loop back on themselves.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDefinitions {
    definitions: HashMap<String, Arc<QueryDefinition>>,
}

impl InMemoryDefinitions {
    /// Builds a repository from `definitions`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidDefinition`] for the first definition
    /// that fails validation.
    pub fn new(definitions: impl IntoIterator<Item = QueryDefinition>) -> Result<Self> {
        let mut map = HashMap::new();
        for definition in definitions {
            definition.validate()?;
            let name = definition.name.clone();
            if map.insert(name.clone(), Arc::new(definition)).is_some() {
                return Err(QueryError::InvalidDefinition {
                    query: name,
                    reason: "defined more than once".into(),
                });
            }
        }
        let repository = Self { definitions: map };
        repository.check_references()?;
        repository.check_cycles()?;
        debug!(count = repository.len(), "Loaded query definitions");
        Ok(repository)
    }

    /// Parses a JSON array of definitions.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::DefinitionFormat`] for malformed JSON and
    /// [`QueryError::InvalidDefinition`] for rejected definitions.
    pub fn from_json(json: &str) -> Result<Self> {
        let definitions: Vec<QueryDefinition> = serde_json::from_str(json)?;
        Self::new(definitions)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the definition names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn check_references(&self) -> Result<()> {
        for definition in self.definitions.values() {
            for fetch in &definition.fetch_queries {
                if !self.definitions.contains_key(&fetch.reference_query) {
                    return Err(QueryError::InvalidDefinition {
                        query: definition.name.clone(),
                        reason: format!(
                            "fetch '{}' references unknown query '{}'",
                            fetch.name, fetch.reference_query
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            repository: &'a InMemoryDefinitions,
            name: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            path: &mut Vec<&'a str>,
        ) -> Result<()> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    path.push(name);
                    let start = path.iter().position(|n| *n == name).unwrap_or(0);
                    return Err(QueryError::InvalidDefinition {
                        query: name.to_string(),
                        reason: format!("fetch cycle {}", path[start..].join(" -> ")),
                    });
                }
                None => {}
            }
            marks.insert(name, Mark::Visiting);
            path.push(name);
            if let Some(definition) = repository.definitions.get(name) {
                for fetch in &definition.fetch_queries {
                    visit(repository, &fetch.reference_query, marks, path)?;
                }
            }
            path.pop();
            marks.insert(name, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        for name in self.names() {
            visit(self, name, &mut marks, &mut Vec::new())?;
        }
        Ok(())
    }
}

impl QueryDefinitionRepository for InMemoryDefinitions {
    fn definition(&self, name: &str) -> Option<Arc<QueryDefinition>> {
        self.definitions.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{FetchQueryDefinition, Injection};

    fn fetch(name: &str, target: &str) -> FetchQueryDefinition {
        FetchQueryDefinition::new(
            name,
            target,
            Injection::ReplaceField {
                field: name.to_string(),
            },
        )
    }

    #[test]
    fn test_loads_fetch_graph() {
        let repository = InMemoryDefinitions::new([
            QueryDefinition::new("orders", "SELECT * FROM orders").with_fetch(fetch("user", "users")),
            QueryDefinition::new("users", "SELECT * FROM users"),
        ])
        .unwrap();
        assert_eq!(repository.names(), ["orders", "users"]);
        assert!(repository.definition("orders").is_some());
        assert!(repository.definition("items").is_none());
    }

    #[test]
    fn test_rejects_dangling_reference() {
        let err = InMemoryDefinitions::new([
            QueryDefinition::new("orders", "SELECT * FROM orders").with_fetch(fetch("user", "users")),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("unknown query 'users'"));
    }

    #[test]
    fn test_rejects_cycles() {
        let err = InMemoryDefinitions::new([
            QueryDefinition::new("a", "SELECT 1").with_fetch(fetch("b", "b")),
            QueryDefinition::new("b", "SELECT 1").with_fetch(fetch("c", "c")),
            QueryDefinition::new("c", "SELECT 1").with_fetch(fetch("a", "a")),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("fetch cycle a -> b -> c -> a"), "{err}");
    }

    #[test]
    fn test_rejects_self_reference() {
        assert!(InMemoryDefinitions::new([
            QueryDefinition::new("tree", "SELECT 1").with_fetch(fetch("children", "tree"))
        ])
        .is_err());
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = InMemoryDefinitions::new([
            QueryDefinition::new("a", "SELECT 1"),
            QueryDefinition::new("a", "SELECT 2"),
        ])
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidDefinition { query, .. } if query == "a"));
    }

    #[test]
    fn test_from_json() {
        let repository = InMemoryDefinitions::from_json(
            r#"[{"name": "orders", "script": "SELECT * FROM orders"}]"#,
        )
        .unwrap();
        assert_eq!(repository.len(), 1);
        assert!(matches!(
            InMemoryDefinitions::from_json("{"),
            Err(QueryError::DefinitionFormat(_))
        ));
    }
}
