//! Path predicate engine.

use serde_json::Value;

use super::ScriptEngine;
use crate::error::Result;
use crate::parameter::QueryParameter;
use crate::value::{Record, record_value_at, value_at};

/// Evaluates a predicate script naming a single value.
///
/// `total` reads the parent record, `criteria.user.id` reads the parent
/// criteria and `context.flag` the context; a leading `!` negates the
/// result. A value is true unless it is missing, `null`, `false`, `0`, an
/// empty string or an empty collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathPredicateEngine;

impl PathPredicateEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ScriptEngine for PathPredicateEngine {
    fn predicate(&self, script: &str, parent: &Record, parameter: &QueryParameter) -> Result<bool> {
        let script = script.trim();
        let (negate, path) = script
            .strip_prefix('!')
            .map_or((false, script), |rest| (true, rest.trim()));

        let value = if let Some(rest) = path.strip_prefix("criteria.") {
            value_at(&parameter.criteria, rest)
        } else if let Some(rest) = path.strip_prefix("context.") {
            let (key, rest) = rest.split_once('.').unwrap_or((rest, ""));
            parameter.context.get(key).and_then(|v| value_at(v, rest))
        } else {
            record_value_at(parent, path)
        };
        Ok(truthy(value) != negate)
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_predicate_sources() {
        let Value::Object(parent) = json!({"total": 0, "user_id": 7}) else {
            unreachable!()
        };
        let parameter = QueryParameter::new(json!({"expand": true}))
            .with_context("tenant", json!({"id": "acme"}));
        let engine = PathPredicateEngine::new();

        assert!(engine.predicate("user_id", &parent, &parameter).unwrap());
        assert!(!engine.predicate("total", &parent, &parameter).unwrap());
        assert!(engine.predicate("!total", &parent, &parameter).unwrap());
        assert!(engine.predicate("criteria.expand", &parent, &parameter).unwrap());
        assert!(engine.predicate("context.tenant.id", &parent, &parameter).unwrap());
        assert!(!engine.predicate("missing", &parent, &parameter).unwrap());
    }
}
