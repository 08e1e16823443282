//! Transaction lifecycle tests against the scripted server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::fmt;

use tedium_client::{
    Error, IsolationLevel, RequestOptions, SessionOptions, TransactionOptions, TransactionState,
};
use tedium_testing::{
    MockResponse, MockServer, TransactionCall, connect_session, connect_session_with,
};

#[derive(Debug)]
struct Validation(&'static str);

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for Validation {}

fn aborting() -> SessionOptions {
    SessionOptions {
        abort_transaction_on_error: true,
        ..SessionOptions::default()
    }
}

#[tokio::test]
async fn test_begin_commit() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    let tx = session
        .begin_transaction(
            TransactionOptions::default()
                .name("nightly")
                .isolation_level(IsolationLevel::Serializable),
        )
        .await
        .unwrap();
    assert_eq!(tx.state(), TransactionState::Open);
    assert_eq!(tx.name(), Some("nightly"));

    tx.commit().await.unwrap();
    assert_eq!(tx.state(), TransactionState::Committed);

    assert_eq!(
        server.transactions(),
        vec![
            TransactionCall::Begin {
                client: 1,
                name: Some("nightly".into()),
                isolation_level: Some(IsolationLevel::Serializable),
            },
            TransactionCall::Commit { client: 1 },
        ]
    );
}

#[tokio::test]
async fn test_invalid_name_never_reaches_client() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    let err = session
        .begin_transaction(TransactionOptions::default().name("x; DROP TABLE t--"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidIdentifier(_)));
    assert!(server.transactions().is_empty());
}

#[tokio::test]
async fn test_begin_failure_propagates() {
    let server = MockServer::new();
    server.fail_next_begin(Error::Connection("reset".into()));
    let session = connect_session(&server, 1).await.unwrap();

    let err = session
        .begin_transaction(TransactionOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_connection_error());
}

#[tokio::test]
async fn test_commit_twice_is_invalid_state() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();
    let tx = session
        .begin_transaction(TransactionOptions::default())
        .await
        .unwrap();

    tx.commit().await.unwrap();
    let err = tx.commit().await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            operation: "commit",
            state: TransactionState::Committed
        }
    ));

    let err = tx.rollback().await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { operation: "rollback", .. }));
    // only one commit went out
    assert_eq!(server.transactions().len(), 2);
}

#[tokio::test]
async fn test_failed_commit_allows_rollback() {
    let server = MockServer::new();
    server.fail_next_commit(Error::request("commit refused"));
    let session = connect_session(&server, 1).await.unwrap();
    let tx = session
        .begin_transaction(TransactionOptions::default())
        .await
        .unwrap();

    assert!(tx.commit().await.is_err());
    assert_eq!(tx.state(), TransactionState::Committing);
    assert!(tx.error().is_some());

    tx.rollback().await.unwrap();
    assert_eq!(tx.state(), TransactionState::RolledBack);
}

#[tokio::test]
async fn test_failed_rollback_stays_rolling_back() {
    let server = MockServer::new();
    server.fail_next_rollback(Error::Connection("gone".into()));
    let session = connect_session(&server, 1).await.unwrap();
    let tx = session
        .begin_transaction(TransactionOptions::default())
        .await
        .unwrap();

    assert!(tx.rollback().await.is_err());
    assert_eq!(tx.state(), TransactionState::RollingBack);
    assert!(tx.error().unwrap().is_connection_error());
    assert!(tx.commit().await.is_err());
}

#[tokio::test]
async fn test_using_transaction_success_commits_inside_scope() {
    let server = MockServer::new();
    server.push_response(MockResponse::row_count(1));
    let session = connect_session(&server, 1).await.unwrap();

    let count = session
        .using_transaction(TransactionOptions::default(), |tx| async move {
            let result = tx
                .request("UPDATE t SET x = 1 WHERE id = 1", vec![], RequestOptions::default())
                .await?;
            tx.commit().await?;
            Ok(result.row_count)
        })
        .await
        .unwrap();

    assert_eq!(count, Some(1));
    assert_eq!(
        server.transactions().last(),
        Some(&TransactionCall::Commit { client: 1 })
    );
}

#[tokio::test]
async fn test_using_transaction_never_auto_commits() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    let tx_state = session
        .using_transaction(TransactionOptions::default(), |tx| async move {
            Ok(tx.clone())
        })
        .await
        .unwrap();

    assert_eq!(tx_state.state(), TransactionState::Open);
    assert_eq!(server.transactions().len(), 1);
}

#[tokio::test]
async fn test_application_error_rolls_back() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    let err = session
        .using_transaction(TransactionOptions::default(), |_tx| async move {
            Err::<(), _>(Error::application(Validation("quantity must be positive")))
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("quantity must be positive"));
    assert_eq!(
        server.transactions().last(),
        Some(&TransactionCall::Rollback { client: 1 })
    );
}

#[tokio::test]
async fn test_request_error_skips_rollback_without_abort() {
    let server = MockServer::new();
    server.push_response(MockResponse::error("constraint violation"));
    let session = connect_session(&server, 1).await.unwrap();

    let err = session
        .using_transaction(TransactionOptions::default(), |tx| async move {
            tx.request("INSERT INTO t VALUES (1)", vec![], RequestOptions::default())
                .await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(err.is_request_error());
    assert!(
        !server
            .transactions()
            .iter()
            .any(|c| matches!(c, TransactionCall::Rollback { .. }))
    );
}

#[tokio::test]
async fn test_request_error_rolls_back_with_abort() {
    let server = MockServer::new();
    server.push_response(MockResponse::error("constraint violation"));
    let session = connect_session_with(&server, 1, aborting()).await.unwrap();

    let err = session
        .using_transaction(TransactionOptions::default(), |tx| async move {
            tx.request("INSERT INTO t VALUES (1)", vec![], RequestOptions::default())
                .await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(err.is_request_error());
    assert_eq!(
        server.transactions().last(),
        Some(&TransactionCall::Rollback { client: 1 })
    );
}

#[tokio::test]
async fn test_rollback_failure_keeps_scope_error() {
    let server = MockServer::new();
    server.fail_next_rollback(Error::Connection("gone".into()));
    let session = connect_session(&server, 1).await.unwrap();

    let err = session
        .using_transaction(TransactionOptions::default(), |_tx| async move {
            Err::<(), _>(Error::application(Validation("bad input")))
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("bad input"));
    assert!(!err.is_connection_error());
}

#[tokio::test]
async fn test_scope_rolling_back_itself_is_not_rolled_back_twice() {
    let server = MockServer::new();
    let session = connect_session(&server, 1).await.unwrap();

    let _ = session
        .using_transaction(TransactionOptions::default(), |tx| async move {
            tx.rollback().await?;
            Err::<(), _>(Error::application(Validation("abandoned")))
        })
        .await;

    let rollbacks = server
        .transactions()
        .iter()
        .filter(|c| matches!(c, TransactionCall::Rollback { .. }))
        .count();
    assert_eq!(rollbacks, 1);
}
