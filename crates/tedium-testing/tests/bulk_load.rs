//! Bulk load tests against the scripted server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use tedium_client::{
    BulkLoadOptions, DataType, Error, MergeOptions, Record, RequestKind, SqlValue,
};
use tedium_testing::{MockServer, connect_session};

#[tokio::test]
async fn test_positional_rows_load() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    let mut load = session.bulk_load("dbo.items");
    load.add_column("id", DataType::Int, false, None)
        .add_column("name", DataType::NVarChar { length: 100 }, true, None)
        .add_row(vec![SqlValue::Int(1), SqlValue::String("alpha".into())])
        .add_row(vec![SqlValue::Int(2), SqlValue::Null]);
    assert_eq!(load.row_count(), 2);

    let loaded = load.execute(BulkLoadOptions::default()).await.unwrap();
    assert_eq!(loaded, 2);

    let loads = server.bulk_loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].table, "dbo.items");
    assert_eq!(loads[0].columns.len(), 2);
    assert!(!loads[0].columns[0].options.nullable);
    assert_eq!(loads[0].columns[1].options.length, Some(100));
    assert_eq!(loads[0].rows[1], vec![SqlValue::Int(2), SqlValue::Null]);
    // no table creation requested
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_named_rows_resolve_by_object_name() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    let mut load = session.bulk_load("#staging");
    load.add_column("id", DataType::Int, false, None)
        .add_column("display_name", DataType::NVarChar { length: 50 }, true, Some("name"))
        .add_column("note", DataType::NVarChar { length: 50 }, true, None)
        .add_row(Record::from_pairs([
            ("name", SqlValue::String("beta".into())),
            ("id", SqlValue::Int(7)),
        ]));

    load.execute(BulkLoadOptions::default()).await.unwrap();

    let loads = server.bulk_loads();
    assert_eq!(
        loads[0].rows[0],
        vec![
            SqlValue::Int(7),
            SqlValue::String("beta".into()),
            SqlValue::Null
        ]
    );
    assert_eq!(loads[0].columns[1].options.object_name.as_deref(), Some("name"));
}

#[tokio::test]
async fn test_create_table_runs_batch_first() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    let mut load = session.bulk_load("#staging");
    load.add_column("id", DataType::Int, false, None)
        .add_row(vec![SqlValue::Int(1)]);

    load.execute(BulkLoadOptions { create_table: true })
        .await
        .unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].request.kind, RequestKind::Batch);
    assert_eq!(
        requests[0].request.sql,
        "CREATE TABLE [#staging](\n[id] INT NOT NULL\n)"
    );
    assert_eq!(server.bulk_loads().len(), 1);
}

#[tokio::test]
async fn test_created_table_survives_failed_load() {
    let server = MockServer::new();
    server.fail_next_bulk_load(Error::BulkLoad("column mismatch".into()));
    let session = connect_session(&server, 1).await.unwrap();

    let mut load = session.bulk_load("#staging");
    load.add_column("id", DataType::Int, false, None)
        .add_row(vec![SqlValue::Int(1)]);

    let err = load
        .execute(BulkLoadOptions { create_table: true })
        .await
        .unwrap_err();
    assert!(matches!(&err, Error::BulkLoad(msg) if msg.contains("column mismatch")));

    // table creation is its own batch and is not undone
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].request.kind, RequestKind::Batch);
    assert_eq!(
        requests[0].request.sql,
        "CREATE TABLE [#staging](\n[id] INT NOT NULL\n)"
    );
    assert!(server.bulk_loads().is_empty());
}

#[tokio::test]
async fn test_row_shape_mismatch_fails_before_load() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    let mut load = session.bulk_load("t");
    load.add_column("a", DataType::Int, false, None)
        .add_column("b", DataType::Int, false, None)
        .add_row(vec![SqlValue::Int(1)]);

    let err = load.execute(BulkLoadOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::BulkLoad(_)));
    assert!(server.bulk_loads().is_empty());
}

#[tokio::test]
async fn test_client_bulk_failure_propagates() {
    let server = MockServer::new();
    server.fail_next_bulk_load(Error::BulkLoad("column mismatch".into()));
    let session = connect_session(&server, 1).await.unwrap();

    let mut load = session.bulk_load("t");
    load.add_column("a", DataType::Int, false, None)
        .add_row(vec![SqlValue::Int(1)]);

    let err = load.execute(BulkLoadOptions::default()).await.unwrap_err();
    assert!(err.to_string().contains("column mismatch"));
}

#[tokio::test]
async fn test_merge_sql_from_staging() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    let mut load = session.bulk_load("#staging");
    load.add_column("id", DataType::Int, false, None)
        .add_column("qty", DataType::Int, true, None);

    let sql = load
        .merge_sql("dbo.stock", &["id"], MergeOptions::default())
        .unwrap();
    assert!(sql.starts_with("MERGE INTO [dbo].[stock] AS target\nUSING [#staging] AS source\n"));
    assert!(sql.contains("ON target.[id] = source.[id]"));
    assert!(sql.contains("UPDATE SET target.[qty] = source.[qty]"));
    assert!(sql.ends_with(';'));

    assert!(matches!(
        load.merge_sql("dbo.stock", &["missing"], MergeOptions::default()),
        Err(Error::InvalidIdentifier(_))
    ));
}

#[tokio::test]
async fn test_bulk_load_on_closed_session() {
    let server = MockServer::new();
    let session = connect_session(&server, 4).await.unwrap();
    session.close();

    let mut load = session.bulk_load("t");
    load.add_column("a", DataType::Int, false, None);

    let err = load.execute(BulkLoadOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::SessionClosed(4)));
}
