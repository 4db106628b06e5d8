// read-only sql gate
// an allow-list of shapes plus a deny-list of keywords, not a parser.
// it rejects some legitimate reads (UNION, a name containing "drop") on purpose

use regex::Regex;
use std::sync::LazyLock;

static SELECT_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SELECT\s+.+\s+FROM\s+[A-Za-z0-9_]+").expect("Invalid regex"));

// matched anywhere in the uppercased text, not on word boundaries
const FORBIDDEN: [(&str, &str); 12] = [
    ("INSERT", "INSERT writes data"),
    ("UPDATE", "UPDATE modifies data"),
    ("DELETE", "DELETE removes data"),
    ("DROP", "DROP can permanently delete tables"),
    ("ALTER", "ALTER modifies table structure"),
    ("CREATE", "CREATE modifies the schema"),
    ("TRUNCATE", "TRUNCATE deletes all data"),
    ("EXEC", "EXEC runs stored procedures"),
    ("EXECUTE", "EXECUTE runs stored procedures"),
    ("UNION", "UNION can read tables outside the request"),
    ("--", "sql comment, possible injection"),
    ("/*", "sql comment, possible injection"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Safety {
    pub is_safe: bool,
    pub reason: String,
}

impl Safety {
    pub fn check(sql: &str) -> Self {
        let upper = sql.trim().to_uppercase();

        if upper.is_empty() {
            return Self::reject("query is empty");
        }

        if !upper.starts_with("SELECT") {
            return Self::reject("only SELECT statements are allowed");
        }

        if !upper.contains("FROM") {
            return Self::reject("query has no FROM clause");
        }

        for (token, reason) in FORBIDDEN {
            if upper.contains(token) {
                return Self::reject(reason);
            }
        }

        if !SELECT_SHAPE.is_match(&upper) {
            return Self::reject("query does not look like SELECT <columns> FROM <table>");
        }

        Self {
            is_safe: true,
            reason: String::new(),
        }
    }

    fn reject(reason: &str) -> Self {
        Self {
            is_safe: false,
            reason: reason.to_string(),
        }
    }
}

/// True when `candidate` is a single read-only `SELECT ... FROM <table>` query.
pub fn is_safe_read_query(candidate: &str) -> bool {
    Safety::check(candidate).is_safe
}
