//! Collaborators the service delegates to.
//!
//! The service owns none of these concerns: definitions come from a
//! repository, statement text from a template, rows from an executor, and
//! predicates and result hints from pluggable handlers. Bundled
//! implementations cover the JSON and SQLite setups used by the CLI.

mod repository;
mod script;
mod template;

use std::sync::Arc;

pub use repository::InMemoryDefinitions;
pub use script::PathPredicateEngine;
pub use template::NamedParameterTemplate;

use crate::definition::{QueryDefinition, QueryHint};
use crate::error::Result;
use crate::parameter::QueryParameter;
use crate::value::{Record, SqlValue};

/// Looks up query definitions by name.
pub trait QueryDefinitionRepository: Send + Sync {
    fn definition(&self, name: &str) -> Option<Arc<QueryDefinition>>;
}

/// Adjusts a parameter before the statement is rendered.
pub trait ParameterReviser: Send + Sync {
    /// # Errors
    ///
    /// Returns an error to abort the invocation.
    fn revise(&self, definition: &QueryDefinition, parameter: &mut QueryParameter) -> Result<()>;
}

impl<F> ParameterReviser for F
where
    F: Fn(&QueryDefinition, &mut QueryParameter) -> Result<()> + Send + Sync,
{
    fn revise(&self, definition: &QueryDefinition, parameter: &mut QueryParameter) -> Result<()> {
        self(definition, parameter)
    }
}

/// Backend text plus its positional bind values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedQuery {
    pub text: String,
    pub params: Vec<SqlValue>,
}

/// Renders a definition's script into backend text.
pub trait QueryTemplate: Send + Sync {
    /// # Errors
    ///
    /// Returns [`crate::QueryError::Template`] when the script cannot be
    /// rendered for the parameter.
    fn render(&self, definition: &QueryDefinition, parameter: &QueryParameter)
    -> Result<RenderedQuery>;
}

/// Post-processes records according to a definition's hints.
pub trait ResultHintHandler: Send + Sync {
    /// # Errors
    ///
    /// Returns an error to fail the invocation.
    fn apply(
        &self,
        hint: &QueryHint,
        definition: &QueryDefinition,
        records: &mut Vec<Record>,
    ) -> Result<()>;
}

/// Evaluates fetch predicates.
pub trait ScriptEngine: Send + Sync {
    /// Returns whether the fetch applies to `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QueryError::Script`] when the script cannot be
    /// evaluated.
    fn predicate(&self, script: &str, parent: &Record, parameter: &QueryParameter) -> Result<bool>;
}
