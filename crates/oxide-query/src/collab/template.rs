//! Named-placeholder template.

use oxide_dialect::{Lexer, TokenKind};
use serde_json::Value;

use super::{QueryTemplate, RenderedQuery};
use crate::definition::QueryDefinition;
use crate::error::{QueryError, Result};
use crate::parameter::QueryParameter;
use crate::value::{SqlValue, value_at};

/// Resolves `:name` and `#{name}` placeholders against the criteria.
///
/// Each placeholder becomes a positional `?` with the value found at the
/// dotted path `name` inside the criteria object. Array values expand to
/// one placeholder per element, so `id IN (:ids)` works with a list; an
/// empty array expands to `NULL`. Placeholders inside string literals and
/// comments are left alone, and other placeholder styles pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedParameterTemplate {
    missing_as_null: bool,
}

impl NamedParameterTemplate {
    /// Creates a template that rejects placeholders missing from the
    /// criteria.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            missing_as_null: false,
        }
    }

    /// Binds placeholders missing from the criteria as `NULL`.
    #[must_use]
    pub const fn missing_as_null(mut self) -> Self {
        self.missing_as_null = true;
        self
    }
}

impl QueryTemplate for NamedParameterTemplate {
    fn render(
        &self,
        definition: &QueryDefinition,
        parameter: &QueryParameter,
    ) -> Result<RenderedQuery> {
        let script = definition.script.as_str();
        let mut text = String::with_capacity(script.len());
        let mut params = Vec::new();
        let mut copied = 0;

        for token in Lexer::new(script).tokenize() {
            let TokenKind::Placeholder(placeholder) = &token.kind else {
                continue;
            };
            let Some(path) = named_path(placeholder) else {
                continue;
            };
            let value = match value_at(&parameter.criteria, path) {
                Some(value) => value,
                None if self.missing_as_null => &Value::Null,
                None => {
                    return Err(QueryError::Template {
                        query: definition.name.clone(),
                        reason: format!("no criteria value for placeholder {placeholder}"),
                    });
                }
            };

            text.push_str(&script[copied..token.span.start]);
            copied = token.span.end;
            match value {
                Value::Array(items) if items.is_empty() => text.push_str("NULL"),
                Value::Array(items) => {
                    let marks = vec!["?"; items.len()];
                    text.push_str(&marks.join(", "));
                    params.extend(items.iter().map(SqlValue::from_json));
                }
                other => {
                    text.push('?');
                    params.push(SqlValue::from_json(other));
                }
            }
        }
        text.push_str(&script[copied..]);

        Ok(RenderedQuery { text, params })
    }
}

fn named_path(placeholder: &str) -> Option<&str> {
    if let Some(name) = placeholder.strip_prefix(':') {
        return (!name.is_empty()).then_some(name);
    }
    placeholder
        .strip_prefix("#{")
        .and_then(|rest| rest.strip_suffix('}'))
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn render(script: &str, criteria: Value) -> Result<RenderedQuery> {
        NamedParameterTemplate::new().render(
            &QueryDefinition::new("q", script),
            &QueryParameter::new(criteria),
        )
    }

    #[test]
    fn test_named_placeholders_become_positional() {
        let rendered = render(
            "SELECT * FROM orders WHERE user_id = :user.id AND status = #{status}",
            json!({"user": {"id": 4}, "status": "open"}),
        )
        .unwrap();
        assert_eq!(
            rendered.text,
            "SELECT * FROM orders WHERE user_id = ? AND status = ?"
        );
        assert_eq!(
            rendered.params,
            vec![SqlValue::Int(4), SqlValue::Text("open".into())]
        );
    }

    #[test]
    fn test_arrays_expand() {
        let rendered = render("SELECT * FROM t WHERE id IN (:ids)", json!({"ids": [1, 2, 3]})).unwrap();
        assert_eq!(rendered.text, "SELECT * FROM t WHERE id IN (?, ?, ?)");
        assert_eq!(rendered.params.len(), 3);

        let rendered = render("SELECT * FROM t WHERE id IN (:ids)", json!({"ids": []})).unwrap();
        assert_eq!(rendered.text, "SELECT * FROM t WHERE id IN (NULL)");
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn test_literals_and_casts_are_untouched() {
        let rendered = render(
            "SELECT ':not_me', a::text FROM t WHERE b = :b -- :nor_me",
            json!({"b": true}),
        )
        .unwrap();
        assert_eq!(
            rendered.text,
            "SELECT ':not_me', a::text FROM t WHERE b = ? -- :nor_me"
        );
        assert_eq!(rendered.params, vec![SqlValue::Bool(true)]);
    }

    #[test]
    fn test_missing_value() {
        assert!(matches!(
            render("SELECT * FROM t WHERE a = :a", json!({})),
            Err(QueryError::Template { .. })
        ));
        let rendered = NamedParameterTemplate::new()
            .missing_as_null()
            .render(
                &QueryDefinition::new("q", "SELECT * FROM t WHERE a = :a"),
                &QueryParameter::default(),
            )
            .unwrap();
        assert_eq!(rendered.params, vec![SqlValue::Null]);
    }
}
