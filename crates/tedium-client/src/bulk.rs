//! Bulk load staging.
//!
//! A [`BulkLoad`] collects column definitions and rows in memory and hands
//! them to the session client's bulk copy in one go. [`BulkLoad::merge_sql`]
//! renders a `MERGE` that upserts the loaded (staging) table into a target.
//!
//! ```rust,ignore
//! let mut load = session.bulk_load("#staging");
//! load.add_column("id", DataType::Int, false, None);
//! load.add_column("name", DataType::NVarChar { length: 100 }, true, None);
//! load.add_row(vec![SqlValue::Int(1), "alpha".into()]);
//!
//! let merge = load.merge_sql("dbo.items", &["id"], MergeOptions::default())?;
//! load.execute(BulkLoadOptions { create_table: true }).await?;
//! session.request(merge, vec![], RequestOptions::batch()).await?;
//! ```

use tedium_types::{DataType, SqlValue};
use tracing::Instrument;

use crate::client::BulkColumnOptions;
use crate::error::{Error, Result};
use crate::query::RequestOptions;
use crate::record::Record;
use crate::session::Session;

/// A destination column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkColumn {
    /// Column name in the destination table.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Field to read from named rows, when it differs from `name`.
    pub object_name: Option<String>,
}

impl BulkColumn {
    fn options(&self) -> BulkColumnOptions {
        BulkColumnOptions {
            object_name: self.object_name.clone(),
            ..BulkColumnOptions::for_type(&self.data_type, self.nullable)
        }
    }

    fn field_name(&self) -> &str {
        self.object_name.as_deref().unwrap_or(&self.name)
    }
}

/// One staged row.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkRow {
    /// Values in column order.
    Positional(Vec<SqlValue>),
    /// Values looked up by field name; missing fields load as NULL.
    Named(Record),
}

impl From<Vec<SqlValue>> for BulkRow {
    fn from(values: Vec<SqlValue>) -> Self {
        Self::Positional(values)
    }
}

impl From<Record> for BulkRow {
    fn from(record: Record) -> Self {
        Self::Named(record)
    }
}

/// Options for [`BulkLoad::execute`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkLoadOptions {
    /// Create the destination table from the column definitions first.
    /// Creation is not transactional with the load.
    pub create_table: bool,
}

/// Options for [`BulkLoad::merge_sql`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Emit `WHEN NOT MATCHED BY TARGET THEN INSERT`.
    pub insert: bool,
    /// Emit `WHEN MATCHED THEN UPDATE`.
    pub update: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            insert: true,
            update: true,
        }
    }
}

/// Rows staged for a bulk copy into one table.
#[derive(Debug)]
pub struct BulkLoad {
    session: Session,
    table: String,
    columns: Vec<BulkColumn>,
    rows: Vec<BulkRow>,
}

impl BulkLoad {
    /// Stage a bulk load into `table` over `session`.
    pub fn new(session: Session, table: impl Into<String>) -> Self {
        Self {
            session,
            table: table.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Destination table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Declared columns.
    #[must_use]
    pub fn columns(&self) -> &[BulkColumn] {
        &self.columns
    }

    /// Number of staged rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Declare a destination column. `object_name` names the field read from
    /// named rows when it differs from the column name.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
        nullable: bool,
        object_name: Option<&str>,
    ) -> &mut Self {
        self.columns.push(BulkColumn {
            name: name.into(),
            data_type,
            nullable,
            object_name: object_name.map(str::to_owned),
        });
        self
    }

    /// Stage one row. Rows are not validated until execution.
    pub fn add_row(&mut self, row: impl Into<BulkRow>) -> &mut Self {
        self.rows.push(row.into());
        self
    }

    /// Stage several rows in order.
    pub fn add_rows<I>(&mut self, rows: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<BulkRow>,
    {
        self.rows.extend(rows.into_iter().map(Into::into));
        self
    }

    fn resolve_row(columns: &[BulkColumn], row: BulkRow) -> Vec<SqlValue> {
        match row {
            BulkRow::Positional(values) => values,
            BulkRow::Named(record) => columns
                .iter()
                .map(|c| record.value(c.field_name()).cloned().unwrap_or(SqlValue::Null))
                .collect(),
        }
    }

    /// Run the bulk copy, returning the number of rows loaded.
    pub async fn execute(self, options: BulkLoadOptions) -> Result<u64> {
        let Self {
            session,
            table,
            columns,
            rows,
        } = self;

        let span = tracing::debug_span!(
            "tedium.bulk_load",
            db.connection_id = session.id(),
            table = %table,
            rows = rows.len(),
        );

        async {
            let (mut handle, creation_sql) = {
                let mut client = session.lock_client().await?;
                let mut handle = client.new_bulk_load(&table)?;
                for column in &columns {
                    handle.add_column(&column.name, column.data_type, column.options())?;
                }
                let creation_sql = options.create_table.then(|| handle.table_creation_sql());
                (handle, creation_sql)
            };

            for row in rows {
                handle.add_row(Self::resolve_row(&columns, row))?;
            }

            if let Some(sql) = creation_sql {
                tracing::debug!(table = %table, "creating bulk load table");
                session.request(sql, Vec::new(), RequestOptions::batch()).await?;
            }

            let loaded = {
                let mut client = session.lock_client().await?;
                client.exec_bulk_load(handle).await?
            };
            tracing::debug!(table = %table, rows = loaded, "bulk load complete");
            Ok::<_, Error>(loaded)
        }
        .instrument(span)
        .await
    }

    /// Render a `MERGE` of this staging table into `target_table`.
    ///
    /// Rows are matched on `match_columns`; matched rows update every other
    /// declared column, unmatched rows are inserted. Pure and deterministic.
    pub fn merge_sql(
        &self,
        target_table: &str,
        match_columns: &[&str],
        options: MergeOptions,
    ) -> Result<String> {
        build_merge_sql(&self.table, &self.columns, target_table, match_columns, options)
    }
}

/// Bracket-quote a possibly multi-part identifier.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("[{}]", part.replace(']', "]]")))
        .collect::<Vec<_>>()
        .join(".")
}

fn build_merge_sql(
    source_table: &str,
    columns: &[BulkColumn],
    target_table: &str,
    match_columns: &[&str],
    options: MergeOptions,
) -> Result<String> {
    if match_columns.is_empty() {
        return Err(Error::InvalidIdentifier(
            "merge requires at least one match column".into(),
        ));
    }
    if let Some(missing) = match_columns
        .iter()
        .find(|m| !columns.iter().any(|c| c.name == **m))
    {
        return Err(Error::InvalidIdentifier(format!(
            "match column '{missing}' is not a declared column"
        )));
    }

    let on = match_columns
        .iter()
        .map(|m| {
            let q = quote_identifier(m);
            format!("target.{q} = source.{q}")
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    let mut sql = format!(
        "MERGE INTO {} AS target\nUSING {} AS source\nON {on}",
        quote_identifier(target_table),
        quote_identifier(source_table),
    );

    let updates = columns
        .iter()
        .filter(|c| !match_columns.contains(&c.name.as_str()))
        .map(|c| {
            let q = quote_identifier(&c.name);
            format!("target.{q} = source.{q}")
        })
        .collect::<Vec<_>>();
    let emit_update = options.update && !updates.is_empty();

    if !emit_update && !options.insert {
        return Err(Error::BulkLoad(
            "merge statement would have no actions".into(),
        ));
    }

    if emit_update {
        sql.push_str("\nWHEN MATCHED THEN UPDATE SET ");
        sql.push_str(&updates.join(", "));
    }

    if options.insert {
        let names = columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>();
        let values = names
            .iter()
            .map(|q| format!("source.{q}"))
            .collect::<Vec<_>>();
        sql.push_str(&format!(
            "\nWHEN NOT MATCHED BY TARGET THEN INSERT ({}) VALUES ({})",
            names.join(", "),
            values.join(", ")
        ));
    }

    sql.push(';');
    Ok(sql)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn column(name: &str) -> BulkColumn {
        BulkColumn {
            name: name.to_string(),
            data_type: DataType::Int,
            nullable: true,
            object_name: None,
        }
    }

    #[test]
    fn test_merge_sql_shape() {
        let columns = vec![column("id"), column("name"), column("qty")];
        let sql = build_merge_sql(
            "#staging",
            &columns,
            "dbo.items",
            &["id"],
            MergeOptions::default(),
        )
        .unwrap();

        assert_eq!(
            sql,
            "MERGE INTO [dbo].[items] AS target\n\
             USING [#staging] AS source\n\
             ON target.[id] = source.[id]\n\
             WHEN MATCHED THEN UPDATE SET target.[name] = source.[name], target.[qty] = source.[qty]\n\
             WHEN NOT MATCHED BY TARGET THEN INSERT ([id], [name], [qty]) VALUES (source.[id], source.[name], source.[qty]);"
        );
    }

    #[test]
    fn test_merge_sql_update_omitted_when_only_match_columns() {
        let columns = vec![column("a"), column("b")];
        let sql =
            build_merge_sql("s", &columns, "t", &["a", "b"], MergeOptions::default()).unwrap();

        assert!(sql.contains("ON target.[a] = source.[a] AND target.[b] = source.[b]"));
        assert!(!sql.contains("WHEN MATCHED"));
        assert!(sql.contains("WHEN NOT MATCHED BY TARGET"));
    }

    #[test]
    fn test_merge_sql_insert_disabled() {
        let columns = vec![column("id"), column("v")];
        let options = MergeOptions {
            insert: false,
            update: true,
        };
        let sql = build_merge_sql("s", &columns, "t", &["id"], options).unwrap();
        assert!(sql.contains("WHEN MATCHED THEN UPDATE SET target.[v] = source.[v]"));
        assert!(!sql.contains("INSERT"));

        let none = MergeOptions {
            insert: false,
            update: false,
        };
        assert!(build_merge_sql("s", &columns, "t", &["id"], none).is_err());
    }

    #[test]
    fn test_merge_sql_rejects_bad_match_columns() {
        let columns = vec![column("id")];
        let err = build_merge_sql("s", &columns, "t", &[], MergeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));

        let err =
            build_merge_sql("s", &columns, "t", &["nope"], MergeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(ref msg) if msg.contains("nope")));
    }

    #[test]
    fn test_quote_identifier_escapes_brackets() {
        assert_eq!(quote_identifier("odd]name"), "[odd]]name]");
        assert_eq!(quote_identifier("db.dbo.t"), "[db].[dbo].[t]");
    }

    #[test]
    fn test_named_rows_resolve_by_field_name() {
        let mut columns = vec![column("id"), column("display_name")];
        columns[1].object_name = Some("name".to_string());

        let record = Record::from_pairs([("name", SqlValue::from("x")), ("id", SqlValue::Int(3))]);
        let values = BulkLoad::resolve_row(&columns, BulkRow::Named(record));
        assert_eq!(values, vec![SqlValue::Int(3), SqlValue::from("x")]);

        let sparse = Record::from_pairs([("id", SqlValue::Int(4))]);
        let values = BulkLoad::resolve_row(&columns, BulkRow::Named(sparse));
        assert_eq!(values, vec![SqlValue::Int(4), SqlValue::Null]);
    }

    proptest! {
        #[test]
        fn merge_sql_is_deterministic_and_excludes_match_columns(
            names in prop::collection::btree_set("[a-z]{1,8}", 1..6),
            split in 1usize..6,
            insert in any::<bool>(),
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let split = split.min(names.len());
            let columns: Vec<BulkColumn> = names.iter().map(|n| column(n)).collect();
            let match_columns: Vec<&str> = names[..split].iter().map(String::as_str).collect();
            let options = MergeOptions { insert, update: true };

            let first = build_merge_sql("s", &columns, "t", &match_columns, options);
            let second = build_merge_sql("s", &columns, "t", &match_columns, options);
            prop_assert_eq!(&first.as_ref().ok(), &second.as_ref().ok());

            if let Ok(sql) = first {
                if let Some(set_clause) = sql
                    .split("WHEN MATCHED THEN UPDATE SET ")
                    .nth(1)
                    .and_then(|rest| rest.split('\n').next())
                {
                    for m in &match_columns {
                        let assignment = format!("target.[{m}] =");
                        prop_assert!(!set_clause.contains(&assignment));
                    }
                }
            }
        }
    }
}
