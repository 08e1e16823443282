//! Request description handed to the session client.

use tedium_types::{SqlValue, TypedValue};

/// How the session client should submit a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestKind {
    /// Parameterized execution (`sp_executesql`).
    #[default]
    Sql,
    /// Raw batch execution without parameters.
    Batch,
}

/// A named, typed request parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name without the leading `@`.
    pub name: String,
    /// Value and declared type.
    pub value: TypedValue,
}

impl Parameter {
    /// Create a parameter. A leading `@` in `name` is stripped.
    pub fn new(name: impl Into<String>, value: TypedValue) -> Self {
        let name = name.into();
        let name = match name.strip_prefix('@') {
            Some(stripped) => stripped.to_string(),
            None => name,
        };
        Self { name, value }
    }
}

/// Per-request switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestOptions {
    /// Submit as a raw batch instead of a parameterized statement.
    pub batch: bool,
    /// Return every result set instead of only the first.
    pub multiple: bool,
}

impl RequestOptions {
    /// Options for a raw batch.
    #[must_use]
    pub fn batch() -> Self {
        Self {
            batch: true,
            ..Self::default()
        }
    }

    /// Options returning every result set.
    #[must_use]
    pub fn multiple() -> Self {
        Self {
            multiple: true,
            ..Self::default()
        }
    }

    /// The submission kind these options select.
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        if self.batch {
            RequestKind::Batch
        } else {
            RequestKind::Sql
        }
    }
}

/// A statement with its parameters, as submitted to the session client.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// SQL text.
    pub sql: String,
    /// Bound parameters, in declaration order.
    pub params: Vec<Parameter>,
    /// Submission kind.
    pub kind: RequestKind,
}

impl Request {
    /// A parameterized statement.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            kind: RequestKind::Sql,
        }
    }

    /// A raw batch.
    pub fn batch(sql: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Batch,
            ..Self::new(sql)
        }
    }

    /// Bind a parameter.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: TypedValue) -> Self {
        self.params.push(Parameter::new(name, value));
        self
    }

    /// Look up a bound parameter's value by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&SqlValue> {
        let name = name.strip_prefix('@').unwrap_or(name);
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value.value)
    }
}
