#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Row-level filtering through guarded queries against in-memory `SQLite`.

mod common;

use common::document::GuardedFields as _;
use common::{alice, bob, document, folder};
use rowguard_db::secure::{AuthError, AuthSession, DeniedAction, Principal, QueryLike, QueryOp};
use sea_orm::DbBackend;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;

fn denied_op(err: &AuthError) -> Option<QueryOp> {
    match err.as_access_denied()?.action() {
        DeniedAction::Query(op) => Some(*op),
        DeniedAction::Read(_) | DeniedAction::Write(_) => None,
    }
}

#[tokio::test]
async fn allow_sees_every_row_without_consulting_filters() {
    common::reset_counters();
    let session = common::session("rf_allow", Principal::Allow).await;

    let docs = session.query::<document::Entity>().all(&session).await.unwrap();

    assert_eq!(docs.len(), 4);
    assert_eq!(common::document_filter_calls(), 0);
    assert!(docs.iter().all(|d| d.principal().is_allow()));
}

#[tokio::test]
async fn identity_sees_only_its_rows() {
    common::reset_counters();
    let session = common::session("rf_identity", alice()).await;

    let docs = session
        .query::<document::Entity>()
        .order_by_asc(document::Column::Id)
        .all(&session)
        .await
        .unwrap();

    let ids: Vec<i32> = docs.iter().map(|d| d.id().unwrap()).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(common::document_filter_calls(), 1);

    let count = session.query::<document::Entity>().count(&session).await.unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn caller_filters_combine_with_row_filters() {
    let session = common::session("rf_combine", bob()).await;

    let docs = session
        .query::<document::Entity>()
        .filter(document::Column::FolderId.eq(1))
        .all(&session)
        .await
        .unwrap();

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id().unwrap(), 4);
}

#[tokio::test]
async fn deny_fails_every_operation_before_the_engine() {
    common::reset_counters();
    // No tables: any statement reaching the engine would fail with a Db error.
    let session = AuthSession::new(common::empty_db("rf_deny").await, Principal::<String>::Deny);

    let err = session.query::<document::Entity>().all(&session).await.unwrap_err();
    assert_eq!(denied_op(&err), Some(QueryOp::Select));

    let err = session.query::<document::Entity>().one(&session).await.unwrap_err();
    assert_eq!(denied_op(&err), Some(QueryOp::Select));

    let err = session.query::<document::Entity>().count(&session).await.unwrap_err();
    assert_eq!(denied_op(&err), Some(QueryOp::Count));

    let err = session
        .update_many::<document::Entity>()
        .col_expr(document::Column::Title, Expr::value("x"))
        .exec(&session)
        .await
        .unwrap_err();
    assert_eq!(denied_op(&err), Some(QueryOp::Update));

    let err = session
        .delete_many::<document::Entity>()
        .exec(&session)
        .await
        .unwrap_err();
    assert_eq!(denied_op(&err), Some(QueryOp::Delete));

    let err = session
        .query::<document::Entity>()
        .build(DbBackend::Sqlite)
        .unwrap_err();
    assert_eq!(denied_op(&err), Some(QueryOp::Build));

    assert_eq!(common::document_filter_calls(), 0);
}

#[tokio::test]
async fn engine_failures_are_not_reported_as_denied() {
    let session = AuthSession::new(common::empty_db("rf_engine_err").await, alice());

    let err = session.query::<document::Entity>().all(&session).await.unwrap_err();
    assert!(matches!(err, AuthError::Db(_)));
    assert!(!err.is_access_denied());
}

#[tokio::test]
async fn join_applies_each_entity_once() {
    common::reset_counters();
    let session = common::session("rf_join", bob()).await;

    let query = session
        .query::<document::Entity>()
        .find_also_related(folder::Entity);
    assert_eq!(query.participants(), vec!["documents", "folders"]);

    let sql = query.build(DbBackend::Sqlite).unwrap();
    assert_eq!(sql.matches(r#""documents"."owner" = 'bob'"#).count(), 1);
    assert_eq!(sql.matches(r#""folders"."owner" = 'bob'"#).count(), 1);

    common::reset_counters();
    let rows = query.all(&session).await.unwrap();
    assert_eq!(common::document_filter_calls(), 1);
    assert_eq!(common::folder_filter_calls(), 1);

    // Document 4 is bob's but lives in alice's folder.
    assert_eq!(rows.len(), 1);
    let (doc, folder) = &rows[0];
    assert_eq!(doc.id().unwrap(), 3);
    let folder = folder.as_ref().expect("folder joined");
    assert_eq!(folder.principal(), &bob());
}

#[tokio::test]
async fn join_policy_hook_is_idempotent() {
    common::reset_counters();
    let session = common::session("rf_self_join", alice()).await;

    let query = session
        .query::<document::Entity>()
        .find_also_related(folder::Entity)
        .apply_row_policy(QueryOp::Select)
        .unwrap()
        .apply_row_policy(QueryOp::Select)
        .unwrap();

    assert_eq!(common::document_filter_calls(), 1);
    assert_eq!(common::folder_filter_calls(), 1);

    let sql = query.build(DbBackend::Sqlite).unwrap();
    assert_eq!(sql.matches(r#""documents"."owner" = 'alice'"#).count(), 1);
    assert_eq!(common::document_filter_calls(), 1);
}

#[tokio::test]
async fn find_with_related_filters_both_sides() {
    let session = common::session("rf_with_related", alice()).await;

    let rows = session
        .query::<folder::Entity>()
        .find_with_related(document::Entity)
        .all(&session)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    let (folder, docs) = &rows[0];
    assert_eq!(folder.read::<i32>(folder::Column::Id).unwrap(), 1);
    let mut ids: Vec<i32> = docs.iter().map(|d| d.id().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn projections_are_filtered_and_unstamped() {
    let session = common::session("rf_projection", alice()).await;

    let titles: Vec<(i32, String)> = session
        .query::<document::Entity>()
        .select_only()
        .column(document::Column::Id)
        .column(document::Column::Title)
        .order_by_asc(document::Column::Id)
        .into_tuple()
        .all(&session)
        .await
        .unwrap();

    assert_eq!(
        titles,
        vec![
            (1, "alice-doc-1".to_owned()),
            (2, "alice-doc-2".to_owned())
        ]
    );
}

#[tokio::test]
async fn aggregate_projection_sees_only_visible_rows() {
    let session = common::session("rf_aggregate", bob()).await;

    let per_folder: Vec<(i32, i64)> = session
        .query::<document::Entity>()
        .select_only()
        .column(document::Column::FolderId)
        .column_as(Expr::col(document::Column::Id).count(), "n")
        .group_by(document::Column::FolderId)
        .order_by_asc(document::Column::FolderId)
        .into_tuple()
        .all(&session)
        .await
        .unwrap();

    assert_eq!(per_folder, vec![(1, 1), (2, 1)]);
}

#[tokio::test]
async fn find_by_id_stays_within_row_filters() {
    let session = common::session("rf_find_by_id", alice()).await;

    let own = session
        .find_by_id::<document::Entity>(1)
        .unwrap()
        .one(&session)
        .await
        .unwrap();
    assert!(own.is_some());

    let foreign = session
        .find_by_id::<document::Entity>(3)
        .unwrap()
        .one(&session)
        .await
        .unwrap();
    assert!(foreign.is_none());
}

#[tokio::test]
async fn per_call_principal_overrides_session_default() {
    let session = common::session("rf_override", alice()).await;

    let as_bob = session
        .query_as::<document::Entity>(bob())
        .order_by(document::Column::Id, sea_orm::Order::Asc)
        .all(&session)
        .await
        .unwrap();
    let ids: Vec<i32> = as_bob.iter().map(|d| d.id().unwrap()).collect();
    assert_eq!(ids, vec![3, 4]);
    assert!(as_bob.iter().all(|d| d.principal() == &bob()));

    // The session default is untouched.
    let as_alice = session.query::<document::Entity>().count(&session).await.unwrap();
    assert_eq!(as_alice, 2);

    let everything = session
        .query_as::<document::Entity>(Principal::Allow)
        .limit(10)
        .offset(1)
        .all(&session)
        .await
        .unwrap();
    assert_eq!(everything.len(), 3);
}

#[tokio::test]
async fn one_respects_ordering() {
    let session = common::session("rf_order", Principal::Allow).await;

    let last = session
        .query::<document::Entity>()
        .order_by_desc(document::Column::Id)
        .one(&session)
        .await
        .unwrap()
        .expect("row");
    assert_eq!(last.id().unwrap(), 4);
}
