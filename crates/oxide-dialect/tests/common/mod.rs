#![allow(dead_code)]

use oxide_dialect::{Dialect, DialectHints, DialectKind, DialectRegistry};

pub fn dialect(kind: DialectKind) -> std::sync::Arc<dyn Dialect> {
    DialectRegistry::new()
        .get(kind)
        .unwrap_or_else(|| panic!("No dialect for {kind}"))
}

pub fn limit(kind: DialectKind, sql: &str, offset: usize, limit: usize) -> String {
    dialect(kind)
        .limit_text(sql, offset, limit, &DialectHints::new())
        .unwrap_or_else(|e| panic!("Failed to limit for {kind}: {sql}\nError: {e:?}"))
}

pub fn count(kind: DialectKind, sql: &str) -> String {
    dialect(kind).count_text(sql, &DialectHints::new())
}

pub fn hints(pairs: &[(&str, &str)]) -> DialectHints {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
