//! Fetch orchestration.
//!
//! Fetch queries load related rows for every parent record and merge them
//! into a field of that record. For each fetch query, in declaration order:
//! the parents it applies to are chosen (context exclusion, predicate
//! script), their target fields are checked, one child select runs per
//! parent, and only once every child select succeeded are the rows
//! injected. A failure therefore never leaves some parents merged and
//! others not.
//!
//! Injected rows are moved into the parent, not copied. `ReplaceField` and
//! `IndexByKey` can be re-run over the same parents with the same outcome;
//! `AppendToCollection` appends again on every run.

use futures::future::try_join_all;
use serde_json::{Map, Value};
use tracing::debug;

use crate::definition::{FetchQueryDefinition, Injection, ParameterSource, QueryDefinition};
use crate::error::{QueryError, Result};
use crate::parameter::QueryParameter;
use crate::service::QueryService;
use crate::value::{Record, record_value_at, value_at};

/// Runs every applicable fetch query of `definition` over `records`.
pub(crate) async fn run(
    service: &QueryService,
    definition: &QueryDefinition,
    parameter: &QueryParameter,
    records: &mut [Record],
    depth: usize,
) -> Result<()> {
    if records.is_empty() || definition.fetch_queries.is_empty() {
        return Ok(());
    }
    let max = service.config().max_fetch_depth;
    if depth >= max {
        return Err(QueryError::FetchDepthExceeded {
            query: definition.name.clone(),
            max,
        });
    }
    for fetch in &definition.fetch_queries {
        if parameter.excludes_fetch(&fetch.name) {
            debug!(query = %definition.name, fetch = %fetch.name, "Fetch query excluded by context");
            continue;
        }
        run_one(service, definition, fetch, parameter, records, depth).await?;
    }
    Ok(())
}

async fn run_one(
    service: &QueryService,
    definition: &QueryDefinition,
    fetch: &FetchQueryDefinition,
    parameter: &QueryParameter,
    records: &mut [Record],
    depth: usize,
) -> Result<()> {
    let query = definition.name.as_str();

    let mut targets = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if applies(service, query, fetch, record, parameter)? {
            check_target(query, fetch, record)?;
            targets.push(index);
        }
    }
    if targets.is_empty() {
        debug!(query, fetch = %fetch.name, "No parent record needs the fetch");
        return Ok(());
    }

    let parallel = parameter.parallel_fetch();
    debug!(query, fetch = %fetch.name, parents = targets.len(), parallel, "Running fetch query");
    let load = |child: QueryParameter| async move {
        service
            .select_records(&fetch.reference_query, child, fetch.max_fetch_size, depth + 1)
            .await
            .map_err(|source| QueryError::Fetch {
                query: query.to_string(),
                fetch: fetch.name.clone(),
                source: Box::new(source),
            })
    };
    let children = targets
        .iter()
        .map(|&index| derive_parameter(fetch, &records[index], parameter));

    let fetched = if parallel {
        try_join_all(children.map(load)).await?
    } else {
        let mut fetched = Vec::with_capacity(targets.len());
        for child in children {
            fetched.push(load(child).await?);
        }
        fetched
    };

    for rows in &fetched {
        check_rows(query, fetch, rows)?;
    }
    for (index, rows) in targets.into_iter().zip(fetched) {
        inject(&fetch.injection, fetch.multi_records, &mut records[index], rows);
    }
    Ok(())
}

fn applies(
    service: &QueryService,
    query: &str,
    fetch: &FetchQueryDefinition,
    parent: &Record,
    parameter: &QueryParameter,
) -> Result<bool> {
    let Some(script) = &fetch.predicate_script else {
        return Ok(true);
    };
    let engine = service
        .script_engine()
        .ok_or_else(|| QueryError::InvalidDefinition {
            query: query.to_string(),
            reason: format!(
                "fetch '{}' has a predicate but no script engine is configured",
                fetch.name
            ),
        })?;
    engine.predicate(script, parent, parameter)
}

/// Builds the child parameter: one criteria entry per fetch parameter, the
/// parent's context copied as is, and no window.
pub(crate) fn derive_parameter(
    fetch: &FetchQueryDefinition,
    parent: &Record,
    parameter: &QueryParameter,
) -> QueryParameter {
    let criteria: Map<String, Value> = fetch
        .parameters
        .iter()
        .map(|p| {
            let value = match &p.from {
                ParameterSource::Constant(value) => Some(value),
                ParameterSource::Criteria(path) => value_at(&parameter.criteria, path),
                ParameterSource::Result(path) => record_value_at(parent, path),
            };
            (p.name.clone(), value.cloned().unwrap_or(Value::Null))
        })
        .collect();
    QueryParameter {
        criteria: Value::Object(criteria),
        offset: 0,
        limit: None,
        context: parameter.context.clone(),
    }
}

fn check_target(query: &str, fetch: &FetchQueryDefinition, parent: &Record) -> Result<()> {
    let field = fetch.injection.field();
    let compatible = match (&fetch.injection, parent.get(field)) {
        (Injection::ReplaceField { .. }, _)
        | (_, None | Some(Value::Null))
        | (Injection::AppendToCollection { .. }, Some(Value::Array(_)))
        | (Injection::IndexByKey { .. }, Some(Value::Object(_))) => true,
        _ => false,
    };
    if compatible {
        Ok(())
    } else {
        Err(injection_error(
            query,
            fetch,
            format!("field '{field}' does not hold a compatible collection"),
        ))
    }
}

fn check_rows(query: &str, fetch: &FetchQueryDefinition, rows: &[Record]) -> Result<()> {
    let Injection::IndexByKey { key, .. } = &fetch.injection else {
        return Ok(());
    };
    match rows.iter().find(|row| index_key(row.get(key)).is_none()) {
        Some(_) => Err(injection_error(
            query,
            fetch,
            format!("fetched row has no scalar value in key column '{key}'"),
        )),
        None => Ok(()),
    }
}

fn injection_error(query: &str, fetch: &FetchQueryDefinition, reason: String) -> QueryError {
    QueryError::Injection {
        query: query.to_string(),
        fetch: fetch.name.clone(),
        reason,
    }
}

fn index_key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Merges `rows` into `parent`. Targets must have passed [`check_target`]
/// and rows [`check_rows`].
pub(crate) fn inject(injection: &Injection, multi_records: bool, parent: &mut Record, rows: Vec<Record>) {
    match injection {
        Injection::ReplaceField { field } => {
            let value = if multi_records {
                Value::Array(rows.into_iter().map(Value::Object).collect())
            } else {
                rows.into_iter().next().map_or(Value::Null, Value::Object)
            };
            parent.insert(field.clone(), value);
        }
        Injection::AppendToCollection { field } => {
            let take = if multi_records { rows.len() } else { 1 };
            let slot = parent.entry(field.clone()).or_insert(Value::Null);
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                items.extend(rows.into_iter().take(take).map(Value::Object));
            }
        }
        Injection::IndexByKey { field, key } => {
            let mut index = Map::new();
            for row in rows {
                let Some(k) = index_key(row.get(key)) else {
                    continue;
                };
                if multi_records {
                    if let Value::Array(group) =
                        index.entry(k).or_insert_with(|| Value::Array(Vec::new()))
                    {
                        group.push(Value::Object(row));
                    }
                } else {
                    index.entry(k).or_insert(Value::Object(row));
                }
            }
            let slot = parent.entry(field.clone()).or_insert(Value::Null);
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                map.extend(index);
            }
        }
    }
}
