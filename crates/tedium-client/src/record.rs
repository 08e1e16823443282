//! Named-field records produced by the result adapter.

use std::sync::Arc;

use tedium_types::{FromSql, SqlValue, TypeError};

/// One row of a result set.
///
/// Column names are shared by every record of the same result set. Lookup
/// by name is exact; when a result set carries duplicate column names the
/// last one wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Record {
    /// Create a record. Values beyond the column list are dropped; missing
    /// trailing values read as NULL.
    pub fn new(columns: Arc<[String]>, mut values: Vec<SqlValue>) -> Self {
        values.resize(columns.len(), SqlValue::Null);
        Self { columns, values }
    }

    /// Build a standalone record from name/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        let (columns, values): (Vec<String>, Vec<SqlValue>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().rposition(|c| c == name)
    }

    /// Get a value by column index.
    pub fn get<T: FromSql>(&self, index: usize) -> Result<T, TypeError> {
        self.values
            .get(index)
            .ok_or_else(|| TypeError::TypeMismatch {
                expected: "valid column index",
                actual: format!("index {index} out of bounds"),
            })
            .and_then(T::from_sql)
    }

    /// Get a value by column name.
    pub fn get_by_name<T: FromSql>(&self, name: &str) -> Result<T, TypeError> {
        let index = self
            .position(name)
            .ok_or_else(|| TypeError::TypeMismatch {
                expected: "valid column name",
                actual: format!("column '{name}' not found"),
            })?;

        self.get(index)
    }

    /// Try to get a value by column name, returning None if NULL, missing
    /// or not convertible.
    pub fn try_get_by_name<T: FromSql>(&self, name: &str) -> Option<T> {
        self.value(name)
            .and_then(|v| T::from_sql_nullable(v).ok().flatten())
    }

    /// Get the raw value by column name.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&SqlValue> {
        self.position(name).and_then(|i| self.values.get(i))
    }

    /// Get the raw value by index.
    #[must_use]
    pub fn value_at(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names, in result order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Iterate over (column, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl IntoIterator for Record {
    type Item = SqlValue;
    type IntoIter = std::vec::IntoIter<SqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_index() {
        let record = Record::from_pairs([("id", SqlValue::Int(1)), ("name", "alpha".into())]);

        assert_eq!(record.get_by_name::<i32>("id").unwrap(), 1);
        assert_eq!(record.get::<String>(1).unwrap(), "alpha");
        assert!(record.get_by_name::<i32>("ID").is_err());
        assert!(record.get::<i32>(5).is_err());
    }

    #[test]
    fn test_duplicate_column_last_wins() {
        let columns: Arc<[String]> = vec!["x".to_string(), "x".to_string()].into();
        let record = Record::new(columns, vec![SqlValue::Int(1), SqlValue::Int(2)]);

        assert_eq!(record.get_by_name::<i32>("x").unwrap(), 2);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_short_row_reads_null() {
        let columns: Arc<[String]> = vec!["a".to_string(), "b".to_string()].into();
        let record = Record::new(columns, vec![SqlValue::Int(1)]);

        assert_eq!(record.value("b"), Some(&SqlValue::Null));
        assert_eq!(record.try_get_by_name::<i32>("b"), None);
    }
}
