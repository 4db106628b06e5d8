// pulls the sql out of whatever the model said
// never validates - that's Safety's job

use regex::Regex;
use std::sync::LazyLock;

const MARKER: &str = "SQL:";

// SELECT .. FROM <table> plus whatever follows it (aliases, joins, clauses).
// the tail stops at a terminator, a code fence or a blank line
static LOOSE_SELECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)SELECT\s+.+?\s+FROM\s+[A-Za-z0-9_]+(?:[^;`\n]|\n[^;`\n])*")
        .expect("Invalid regex")
});

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("Invalid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Extracts a query from a model reply. An empty string means no query was found.
pub fn extract_query(reply: &str) -> String {
    let reply = reply.trim();

    // "SQL: ..." at the start or anywhere - the first marker wins
    let raw = match reply.find(MARKER) {
        Some(idx) => &reply[idx + MARKER.len()..],
        None => match LOOSE_SELECT.find(reply) {
            Some(m) => m.as_str(),
            None => return String::new(),
        },
    };

    clean(raw)
}

fn clean(raw: &str) -> String {
    let sql = CODE_FENCE.replace_all(raw, "");
    let sql = sql.trim();
    let sql = sql.strip_suffix(';').unwrap_or(sql);

    WHITESPACE.replace_all(sql, " ").trim().to_string()
}
