//! Session request tests against the scripted server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use tedium_client::{
    ColumnMetadata, Done, Error, Event, Parameter, RequestKind, RequestOptions, Rows, SqlValue,
    TypedValue,
};
use tedium_testing::{MockResponse, MockServer, connect_session, init_tracing};
use tokio::sync::Notify;

#[tokio::test]
async fn test_request_returns_records() {
    init_tracing();
    let server = MockServer::new();
    server.push_response(MockResponse::rows(
        &["id", "name"],
        vec![
            vec![SqlValue::Int(1), SqlValue::String("a".into())],
            vec![SqlValue::Int(2), SqlValue::String("b".into())],
        ],
    ));
    let session = connect_session(&server, 1).await.unwrap();

    let result = session
        .request("SELECT id, name FROM t", vec![], RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(result.row_count, Some(2));
    let records = result.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get_by_name::<i32>("id").unwrap(), 1);
    assert_eq!(records[1].get_by_name::<String>("name").unwrap(), "b");
}

#[tokio::test]
async fn test_request_passes_parameters_and_kind() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    session
        .request(
            "SELECT * FROM t WHERE id = @id",
            vec![Parameter::new("@id", TypedValue::int(7))],
            RequestOptions::default(),
        )
        .await
        .unwrap();
    session
        .request("CREATE TABLE x (a INT)", vec![], RequestOptions::batch())
        .await
        .unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].request.kind, RequestKind::Sql);
    assert_eq!(requests[0].request.params[0].name, "id");
    assert_eq!(requests[1].request.kind, RequestKind::Batch);
    assert!(requests[1].request.params.is_empty());
}

#[tokio::test]
async fn test_bare_row_count() {
    let server = MockServer::new();
    server.push_response(MockResponse::row_count(3));
    let session = connect_session(&server, 1).await.unwrap();

    let result = session
        .request("UPDATE t SET x = 1", vec![], RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(result.row_count, Some(3));
    assert!(result.rows.is_none());
}

#[tokio::test]
async fn test_zero_count_yields_empty_result_set() {
    let server = MockServer::new();
    server.push_response(MockResponse::row_count(0));
    server.push_response(MockResponse::row_count(0));
    let session = connect_session(&server, 1).await.unwrap();

    let single = session
        .request("DELETE FROM t WHERE 1 = 0", vec![], RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(single.row_count, Some(0));
    assert_eq!(single.rows, Some(Rows::Single(vec![])));

    let multiple = session
        .request("DELETE FROM t WHERE 1 = 0", vec![], RequestOptions::multiple())
        .await
        .unwrap();
    assert_eq!(multiple.rows, Some(Rows::Multiple(vec![vec![]])));
}

#[tokio::test]
async fn test_multiple_result_sets() {
    let server = MockServer::new();
    server.push_response(MockResponse::Events(vec![
        Event::ColumnMetadata(vec![ColumnMetadata::named("a")]),
        Event::Row(vec![SqlValue::Int(1)]),
        Event::DoneInProc(Done::more(Some(1))),
        Event::ColumnMetadata(vec![ColumnMetadata::named("b")]),
        Event::Row(vec![SqlValue::Int(2)]),
        Event::Row(vec![SqlValue::Int(3)]),
        Event::DoneInProc(Done::more(Some(2))),
        Event::Done(Done::final_count(2)),
    ]));
    let session = connect_session(&server, 1).await.unwrap();

    let result = session
        .request("EXEC two_sets", vec![], RequestOptions::multiple())
        .await
        .unwrap();

    assert_eq!(result.row_count, Some(2));
    let sets = result.into_result_sets();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].len(), 1);
    assert_eq!(sets[1][1].get::<i32>(0).unwrap(), 3);
}

#[tokio::test]
async fn test_request_error_propagates() {
    let server = MockServer::new();
    server.push_response(MockResponse::error("Invalid object name 'nope'"));
    let session = connect_session(&server, 1).await.unwrap();

    let err = session
        .request("SELECT * FROM nope", vec![], RequestOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_request_error());
    assert!(err.to_string().contains("nope"));
    // the session stays usable
    assert!(
        session
            .request("SELECT 1", vec![], RequestOptions::default())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_request_touches_session() {
    tokio::time::pause();
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();
    let before = session.last_activity();

    tokio::time::advance(Duration::from_secs(5)).await;
    session
        .request("SELECT 1", vec![], RequestOptions::default())
        .await
        .unwrap();

    assert!(session.last_activity() >= before + Duration::from_secs(5));
}

#[tokio::test]
async fn test_requests_on_one_session_are_serialized() {
    let server = MockServer::new();
    let gate = Arc::new(Notify::new());
    server.push_response(MockResponse::Gated {
        gate: Arc::clone(&gate),
        events: vec![Event::Done(Done::final_count(1))],
    });
    server.push_response(MockResponse::row_count(2));
    let session = connect_session(&server, 1).await.unwrap();

    let first = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .request("UPDATE a SET x = 1", vec![], RequestOptions::default())
                .await
        }
    });
    tokio::task::yield_now().await;

    let second = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .request("UPDATE b SET x = 1", vec![], RequestOptions::default())
                .await
        }
    });
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    // the second request has not reached the client yet
    assert_eq!(server.sql_log(), vec!["UPDATE a SET x = 1"]);

    gate.notify_one();
    assert_eq!(first.await.unwrap().unwrap().row_count, Some(1));
    assert_eq!(second.await.unwrap().unwrap().row_count, Some(2));
    assert_eq!(server.sql_log().len(), 2);
}

#[tokio::test]
async fn test_closed_session_rejects_requests() {
    let server = MockServer::new();
    let session = connect_session(&server, 9).await.unwrap();

    session.close();
    session.close();

    assert!(session.is_closed());
    assert_eq!(server.closed_clients(), vec![1]);
    let err = session
        .request("SELECT 1", vec![], RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionClosed(9)));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_release_without_owner_is_noop() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    assert!(!session.has_owner());
    session.release();
    assert!(!session.is_closed());
}

#[tokio::test]
async fn test_dropping_last_handle_closes_client() {
    let server = MockServer::new();
    let session = connect_session(&server, 3).await.unwrap();
    let other = session.clone();

    drop(session);
    assert!(server.closed_clients().is_empty());

    drop(other);
    assert_eq!(server.closed_clients(), vec![1]);
}

#[tokio::test]
async fn test_close_during_request_closes_client_once_released() {
    let server = MockServer::new();
    let gate = Arc::new(Notify::new());
    server.push_response(MockResponse::Gated {
        gate: Arc::clone(&gate),
        events: vec![Event::Done(Done::final_count(1))],
    });
    let session = connect_session(&server, 1).await.unwrap();

    let running = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .request("UPDATE a SET x = 1", vec![], RequestOptions::default())
                .await
        }
    });
    tokio::task::yield_now().await;

    session.close();
    // the request still holds the client
    assert!(server.closed_clients().is_empty());

    gate.notify_one();
    assert_eq!(running.await.unwrap().unwrap().row_count, Some(1));
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    assert_eq!(server.closed_clients(), vec![1]);
    let err = session
        .request("SELECT 1", vec![], RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionClosed(1)));
}
