//! Tracing spans for session operations.
//!
//! Span and attribute names follow the database semantic conventions used by
//! OpenTelemetry, so a `tracing-opentelemetry` layer can export them as-is:
//!
//! - `db.system`: "mssql"
//! - `db.statement`: SQL statement (sanitized if configured)
//! - `db.operation`: statement keyword (SELECT, INSERT, etc.)
//! - `db.connection_id`: pool-assigned session id

use tracing::Span;

/// Database system identifier.
pub const DB_SYSTEM: &str = "mssql";

/// Configuration for SQL statement sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationConfig {
    /// Whether to replace literals with the placeholder.
    pub enabled: bool,
    /// Maximum length of statement to record.
    pub max_length: usize,
    /// Placeholder to use for sanitized values.
    pub placeholder: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: 2048,
            placeholder: "?".to_string(),
        }
    }
}

impl SanitizationConfig {
    /// Record statements verbatim.
    #[must_use]
    pub fn no_sanitization() -> Self {
        Self {
            enabled: false,
            max_length: usize::MAX,
            placeholder: String::new(),
        }
    }

    /// Sanitize a SQL statement according to the configuration.
    #[must_use]
    pub fn sanitize(&self, sql: &str) -> String {
        if !self.enabled {
            return truncate_string(sql, self.max_length);
        }

        let sanitized = sanitize_sql(sql, &self.placeholder);
        truncate_string(&sanitized, self.max_length)
    }
}

/// Replace string and numeric literals with a placeholder.
fn sanitize_sql(sql: &str, placeholder: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                // doubled quote is an escape
                if chars.peek() == Some(&q) {
                    chars.next();
                    continue;
                }
                quote = None;
                result.push_str(placeholder);
            }
            continue;
        }

        if c == '\'' || c == '"' {
            quote = Some(c);
            continue;
        }

        if c.is_ascii_digit()
            && !result.ends_with(|ch: char| ch.is_alphanumeric() || ch == '_' || ch == '@')
        {
            while chars
                .peek()
                .is_some_and(|ch| ch.is_ascii_digit() || *ch == '.')
            {
                chars.next();
            }
            result.push_str(placeholder);
            continue;
        }

        result.push(c);
    }

    if quote.is_some() {
        result.push_str(placeholder);
    }

    result
}

/// Truncate on a character boundary, marking the cut with `...` when there
/// is room for it. The result never exceeds `max_len` bytes.
fn truncate_string(s: &str, max_len: usize) -> String {
    const ELLIPSIS: &str = "...";

    if s.len() <= max_len {
        return s.to_string();
    }
    let (budget, marker) = if max_len < ELLIPSIS.len() {
        (max_len, "")
    } else {
        (max_len - ELLIPSIS.len(), ELLIPSIS)
    };
    let mut end = budget;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{marker}", &s[..end])
}

/// Extract the operation type from a SQL statement.
#[must_use]
pub fn extract_operation(sql: &str) -> &'static str {
    let sql_upper = sql.trim_start().to_uppercase();

    const KEYWORDS: &[(&str, &str)] = &[
        ("SELECT", "SELECT"),
        ("INSERT", "INSERT"),
        ("UPDATE", "UPDATE"),
        ("DELETE", "DELETE"),
        ("MERGE", "MERGE"),
        ("EXEC", "EXECUTE"),
        ("BEGIN TRAN", "BEGIN"),
        ("COMMIT", "COMMIT"),
        ("ROLLBACK", "ROLLBACK"),
        ("CREATE", "CREATE"),
        ("ALTER", "ALTER"),
        ("DROP", "DROP"),
    ];

    KEYWORDS
        .iter()
        .find(|(prefix, _)| sql_upper.starts_with(prefix))
        .map_or("OTHER", |(_, op)| *op)
}

/// Open the span a request runs in.
///
/// `db.rows_affected` is declared empty and recorded once the result is
/// adapted.
pub fn request_span(session_id: u64, sql: &str, sanitization: &SanitizationConfig) -> Span {
    tracing::debug_span!(
        "tedium.request",
        db.system = DB_SYSTEM,
        db.connection_id = session_id,
        db.operation = extract_operation(sql),
        db.statement = %sanitization.sanitize(sql),
        db.rows_affected = tracing::field::Empty,
    )
}

/// Open the span a transaction boundary runs in.
pub fn transaction_span(session_id: u64, operation: &'static str) -> Span {
    match operation {
        "BEGIN" => tracing::debug_span!(
            "tedium.begin_transaction",
            db.system = DB_SYSTEM,
            db.connection_id = session_id
        ),
        "COMMIT" => tracing::debug_span!(
            "tedium.commit",
            db.system = DB_SYSTEM,
            db.connection_id = session_id
        ),
        _ => tracing::debug_span!(
            "tedium.rollback",
            db.system = DB_SYSTEM,
            db.connection_id = session_id
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_operation() {
        assert_eq!(extract_operation("SELECT * FROM users"), "SELECT");
        assert_eq!(extract_operation("  select id from users"), "SELECT");
        assert_eq!(extract_operation("MERGE INTO [t] AS target"), "MERGE");
        assert_eq!(extract_operation("EXECUTE sp_help"), "EXECUTE");
        assert_eq!(extract_operation("BEGIN TRANSACTION"), "BEGIN");
        assert_eq!(extract_operation("unknown stuff"), "OTHER");
    }

    #[test]
    fn test_sanitize_sql() {
        assert_eq!(
            sanitize_sql("SELECT * FROM users WHERE name = 'O''Brien'", "?"),
            "SELECT * FROM users WHERE name = ?"
        );
        assert_eq!(
            sanitize_sql("SELECT * WHERE id = 42 AND name = 'test'", "?"),
            "SELECT * WHERE id = ? AND name = ?"
        );
        // parameter names and identifiers keep their digits
        assert_eq!(
            sanitize_sql("SELECT col1 FROM t2 WHERE id = @p1", "?"),
            "SELECT col1 FROM t2 WHERE id = @p1"
        );
    }

    #[test]
    fn test_truncate_string_respects_char_boundaries() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("ééééé", 6), "é...");
    }

    #[test]
    fn test_truncate_string_below_ellipsis_width() {
        assert_eq!(truncate_string("SELECT 1", 0), "");
        assert_eq!(truncate_string("SELECT 1", 1), "S");
        assert_eq!(truncate_string("SELECT 1", 2), "SE");
        assert_eq!(truncate_string("SELECT 1", 3), "...");
        // never splits a multi-byte character
        assert_eq!(truncate_string("éé", 1), "");
        for max_len in 0..12 {
            assert!(truncate_string("SELECT * FROM t", max_len).len() <= max_len);
        }
    }

    #[test]
    fn test_no_sanitization_keeps_statement() {
        let config = SanitizationConfig::no_sanitization();
        let sql = "SELECT * FROM users WHERE name = 'Alice'";
        assert_eq!(config.sanitize(sql), sql);
    }
}
