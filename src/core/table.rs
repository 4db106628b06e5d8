// which collection does a validated query read from
// single-table approximation: first `from <word>` wins, joins and subqueries are ignored

use regex::Regex;
use std::sync::LazyLock;

/// Collection used when a query has no `FROM <identifier>`.
pub const DEFAULT_TABLE: &str = "clientes";

static FROM_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfrom\s+([A-Za-z0-9_]+)").expect("Invalid regex"));

pub fn resolve_table(query: &str) -> String {
    resolve_table_or(query, DEFAULT_TABLE)
}

/// Same as [`resolve_table`] with a caller-chosen fallback.
pub fn resolve_table_or(query: &str, fallback: &str) -> String {
    let query = query.trim().to_lowercase();

    FROM_TABLE
        .captures(&query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| fallback.to_string())
}
