//! Query definitions.
//!
//! A definition names a statement template, the properties handed to the
//! backend, the hints applied to its results and the fetch queries that
//! load related data into every result record. Definitions are loaded once
//! and shared as `Arc<QueryDefinition>`.

use std::collections::HashMap;
use std::time::Duration;

use oxide_dialect::DialectHints;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, Result};

/// Property capping the rows of a `select`.
pub const PROPERTY_MAX_SELECT_SIZE: &str = "max-select-size";
/// Property truncating oversized selects instead of failing.
pub const PROPERTY_TOLERATE_OVERFLOW: &str = "tolerate-overflow";
/// Property setting the statement deadline in milliseconds.
pub const PROPERTY_TIMEOUT_MS: &str = "timeout-ms";
/// Property declaring the rendered text independent of the parameter.
pub const PROPERTY_CACHEABLE: &str = "cacheable";

/// A named, immutable query description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueryDefinition {
    pub name: String,
    /// Statement template rendered by the [`crate::collab::QueryTemplate`].
    pub script: String,
    /// Name of the type records are converted into, for diagnostics.
    #[serde(default)]
    pub result_type: Option<String>,
    #[serde(default)]
    pub fetch_queries: Vec<FetchQueryDefinition>,
    #[serde(default)]
    pub hints: Vec<QueryHint>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub dialect_hints: DialectHints,
}

impl QueryDefinition {
    /// Creates a definition with no fetches, hints or properties.
    #[must_use]
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_fetch(mut self, fetch: FetchQueryDefinition) -> Self {
        self.fetch_queries.push(fetch);
        self
    }

    #[must_use]
    pub fn with_hint(mut self, hint: QueryHint) -> Self {
        self.hints.push(hint);
        self
    }

    #[must_use]
    pub fn with_dialect_hint(mut self, key: &str, value: impl Into<String>) -> Self {
        self.dialect_hints.insert(key.to_string(), value.into());
        self
    }

    /// Returns the `max-select-size` property.
    #[must_use]
    pub fn max_select_size(&self) -> Option<usize> {
        self.properties
            .get(PROPERTY_MAX_SELECT_SIZE)
            .and_then(|v| v.trim().parse().ok())
    }

    /// Returns the `tolerate-overflow` property.
    #[must_use]
    pub fn tolerate_overflow(&self) -> Option<bool> {
        self.properties
            .get(PROPERTY_TOLERATE_OVERFLOW)
            .and_then(|v| parse_flag(v))
    }

    /// Returns the `timeout-ms` property.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.properties
            .get(PROPERTY_TIMEOUT_MS)
            .and_then(|v| v.trim().parse().ok())
            .map(Duration::from_millis)
    }

    /// Returns whether the rendered text may be cached by definition name.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.properties
            .get(PROPERTY_CACHEABLE)
            .and_then(|v| parse_flag(v))
            .unwrap_or(false)
    }

    /// Returns the fetch query with the given name.
    #[must_use]
    pub fn fetch_query(&self, name: &str) -> Option<&FetchQueryDefinition> {
        self.fetch_queries.iter().find(|f| f.name == name)
    }

    /// Checks properties and fetch declarations that do not depend on other
    /// definitions.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidDefinition`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| QueryError::InvalidDefinition {
            query: self.name.clone(),
            reason,
        };
        if self.name.trim().is_empty() {
            return Err(invalid("definition has no name".into()));
        }
        if self.script.trim().is_empty() {
            return Err(invalid("definition has an empty script".into()));
        }
        for (key, parse) in [
            (PROPERTY_MAX_SELECT_SIZE, is_count as fn(&str) -> bool),
            (PROPERTY_TIMEOUT_MS, is_count),
            (PROPERTY_TOLERATE_OVERFLOW, is_flag),
            (PROPERTY_CACHEABLE, is_flag),
        ] {
            if let Some(value) = self.properties.get(key) {
                if !parse(value) {
                    return Err(invalid(format!("property {key} has invalid value '{value}'")));
                }
            }
        }

        let mut names = std::collections::HashSet::new();
        for fetch in &self.fetch_queries {
            if !names.insert(fetch.name.as_str()) {
                return Err(invalid(format!("duplicate fetch query '{}'", fetch.name)));
            }
            if fetch.injection.field().is_empty() {
                return Err(invalid(format!(
                    "fetch query '{}' injects into an empty field",
                    fetch.name
                )));
            }
            if fetch.max_fetch_size == Some(0) {
                return Err(invalid(format!(
                    "fetch query '{}' has a zero max fetch size",
                    fetch.name
                )));
            }
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn is_flag(value: &str) -> bool {
    parse_flag(value).is_some()
}

fn is_count(value: &str) -> bool {
    value.trim().parse::<u64>().is_ok()
}

/// A post-processing hint applied to the records of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHint {
    pub name: String,
    #[serde(default)]
    pub args: HashMap<String, String>,
}

impl QueryHint {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_arg(mut self, key: &str, value: impl Into<String>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }
}

/// A subordinate query whose rows are merged into every parent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchQueryDefinition {
    pub name: String,
    /// Name of the definition executed for every parent record.
    pub reference_query: String,
    pub injection: Injection,
    /// Inject the whole list rather than the first row.
    #[serde(default = "default_multi_records")]
    pub multi_records: bool,
    /// Row cap of the fetch, independent of the parent's.
    #[serde(default)]
    pub max_fetch_size: Option<usize>,
    /// Script deciding per parent record whether to fetch at all.
    #[serde(default)]
    pub predicate_script: Option<String>,
    #[serde(default)]
    pub parameters: Vec<FetchParameter>,
}

const fn default_multi_records() -> bool {
    true
}

impl FetchQueryDefinition {
    /// Creates a fetch loading every row of `reference_query`.
    #[must_use]
    pub fn new(name: impl Into<String>, reference_query: impl Into<String>, injection: Injection) -> Self {
        Self {
            name: name.into(),
            reference_query: reference_query.into(),
            injection,
            multi_records: true,
            max_fetch_size: None,
            predicate_script: None,
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub const fn single_record(mut self) -> Self {
        self.multi_records = false;
        self
    }

    #[must_use]
    pub const fn with_max_fetch_size(mut self, max: usize) -> Self {
        self.max_fetch_size = Some(max);
        self
    }

    #[must_use]
    pub fn with_predicate(mut self, script: impl Into<String>) -> Self {
        self.predicate_script = Some(script.into());
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, from: ParameterSource) -> Self {
        self.parameters.push(FetchParameter {
            name: name.into(),
            from,
        });
        self
    }
}

/// Where fetched rows are placed in a parent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum Injection {
    /// Overwrites `field` with the fetched rows.
    ReplaceField { field: String },
    /// Appends the fetched rows to the array in `field`.
    AppendToCollection { field: String },
    /// Stores the fetched rows in the object `field`, keyed by their `key`
    /// column.
    IndexByKey { field: String, key: String },
}

impl Injection {
    /// Returns the target field.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::ReplaceField { field }
            | Self::AppendToCollection { field }
            | Self::IndexByKey { field, .. } => field,
        }
    }
}

/// A named criteria entry of a fetch query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchParameter {
    pub name: String,
    pub from: ParameterSource,
}

/// Source of a fetch parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterSource {
    /// A literal value.
    Constant(Value),
    /// A dotted path into the parent's criteria.
    Criteria(String),
    /// A dotted path into the parent record.
    Result(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_definition() {
        let json = r#"{
            "name": "orders",
            "script": "SELECT * FROM orders WHERE user_id = :user_id ORDER BY id",
            "properties": {"max-select-size": "50", "tolerate-overflow": "yes"},
            "fetch-queries": [{
                "name": "items",
                "reference-query": "order_items",
                "injection": {"strategy": "replace-field", "field": "items"},
                "max-fetch-size": 20,
                "parameters": [
                    {"name": "order_id", "from": {"result": "id"}},
                    {"name": "kind", "from": {"constant": "line"}}
                ]
            }]
        }"#;
        let definition: QueryDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.max_select_size(), Some(50));
        assert_eq!(definition.tolerate_overflow(), Some(true));
        assert!(!definition.is_cacheable());
        let fetch = definition.fetch_query("items").unwrap();
        assert!(fetch.multi_records);
        assert_eq!(fetch.injection.field(), "items");
        assert_eq!(
            fetch.parameters[0].from,
            ParameterSource::Result("id".into())
        );
        definition.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_properties() {
        let definition =
            QueryDefinition::new("q", "SELECT 1").with_property(PROPERTY_MAX_SELECT_SIZE, "many");
        assert!(matches!(
            definition.validate(),
            Err(QueryError::InvalidDefinition { query, .. }) if query == "q"
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_fetches() {
        let fetch = FetchQueryDefinition::new(
            "items",
            "order_items",
            Injection::ReplaceField {
                field: "items".into(),
            },
        );
        let definition = QueryDefinition::new("orders", "SELECT * FROM orders")
            .with_fetch(fetch.clone())
            .with_fetch(fetch);
        assert!(definition.validate().is_err());
    }
}
