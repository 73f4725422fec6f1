//! Cheap SQL summaries used for the optional `sql.operation` and `sql.table` tags.
//!
//! This is not a parser in any real sense: it looks at the leading keyword and
//! pulls the first table name that follows a table-introducing keyword.

use once_cell::sync::Lazy;
use regex::Regex;

/// Kind of statement, derived from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Truncate,
    Begin,
    Commit,
    Rollback,
    Set,
    Other,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Create => "CREATE",
            StatementKind::Drop => "DROP",
            StatementKind::Alter => "ALTER",
            StatementKind::Truncate => "TRUNCATE",
            StatementKind::Begin => "BEGIN",
            StatementKind::Commit => "COMMIT",
            StatementKind::Rollback => "ROLLBACK",
            StatementKind::Set => "SET",
            StatementKind::Other => "QUERY",
        }
    }

    fn from_keyword(keyword: &str) -> Self {
        match keyword.to_ascii_uppercase().as_str() {
            "SELECT" | "WITH" | "VALUES" => StatementKind::Select,
            "INSERT" | "REPLACE" | "UPSERT" => StatementKind::Insert,
            "UPDATE" => StatementKind::Update,
            "DELETE" => StatementKind::Delete,
            "CREATE" => StatementKind::Create,
            "DROP" => StatementKind::Drop,
            "ALTER" => StatementKind::Alter,
            "TRUNCATE" => StatementKind::Truncate,
            "BEGIN" | "START" => StatementKind::Begin,
            "COMMIT" | "END" => StatementKind::Commit,
            "ROLLBACK" => StatementKind::Rollback,
            "SET" => StatementKind::Set,
            _ => StatementKind::Other,
        }
    }

    /// Whether statements of this kind name a table.
    fn targets_table(&self) -> bool {
        !matches!(
            self,
            StatementKind::Begin
                | StatementKind::Commit
                | StatementKind::Rollback
                | StatementKind::Set
                | StatementKind::Other
        )
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static TABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:FROM|INTO|UPDATE|TRUNCATE(?:\s+TABLE)?|TABLE(?:\s+IF(?:\s+NOT)?\s+EXISTS)?)\s+[`"\[]?([\w.]+)[`"\]]?"#,
    )
    .expect("table pattern is valid")
});

/// The first keyword of `sql`, skipping whitespace, comments and opening parentheses.
pub fn leading_keyword(sql: &str) -> Option<&str> {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            break;
        }
    }

    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

/// Statement kind and primary table of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySummary {
    pub kind: StatementKind,
    pub table: Option<String>,
}

impl QuerySummary {
    pub fn of(sql: &str) -> Self {
        let kind = leading_keyword(sql)
            .map(StatementKind::from_keyword)
            .unwrap_or(StatementKind::Other);

        let table = kind
            .targets_table()
            .then(|| TABLE_REGEX.captures(sql))
            .flatten()
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase());

        Self { kind, table }
    }
}
