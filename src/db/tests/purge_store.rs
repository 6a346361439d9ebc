//! Shared tests for PurgeStoreRepo implementations
//!
//! SQLite test pools hold a single connection, so row counts are only taken
//! once a transaction has been committed or rolled back.

use chrono::{Duration, Utc};

use super::fixtures::{Arg, LINE_ITEMS_PER_CART, TestDb, attach_order, seed_customer};
use crate::{
    db::{DbError, OwnedRecordSet, RecordKeys},
    models::CustomerType,
    purge::LineItemArena,
};

async fn test_candidates_match_eligibility(db: &TestDb) {
    let now = Utc::now();
    let expired = now - Duration::days(90);
    let fresh = now - Duration::days(1);

    let first = seed_customer(db, CustomerType::SingleSession, expired, false).await;
    seed_customer(db, CustomerType::SingleSession, fresh, false).await;
    seed_customer(db, CustomerType::SingleSession, expired, true).await;
    seed_customer(db, CustomerType::Registered, expired, false).await;
    let second = seed_customer(db, CustomerType::SingleSession, expired, false).await;

    let store = db.db_pool().purge_store();
    let candidates = store
        .find_purge_candidates(now - Duration::days(61))
        .await
        .expect("Failed to scan");

    assert_eq!(candidates, vec![first.candidate(), second.candidate()]);
}

async fn test_candidates_empty_store(db: &TestDb) {
    let store = db.db_pool().purge_store();
    let candidates = store.find_purge_candidates(Utc::now()).await.unwrap();
    assert!(candidates.is_empty());
}

async fn test_cutoff_is_exclusive(db: &TestDb) {
    let cutoff = Utc::now() - Duration::days(61);
    seed_customer(db, CustomerType::SingleSession, cutoff, false).await;
    let older = seed_customer(
        db,
        CustomerType::SingleSession,
        cutoff - Duration::seconds(1),
        false,
    )
    .await;

    let store = db.db_pool().purge_store();
    let candidates = store.find_purge_candidates(cutoff).await.unwrap();
    assert_eq!(candidates, vec![older.candidate()]);
}

async fn test_resolves_dependents(db: &TestDb) {
    let expired = Utc::now() - Duration::days(90);
    let customer = seed_customer(db, CustomerType::SingleSession, expired, false).await;
    let other = seed_customer(db, CustomerType::SingleSession, expired, false).await;

    let store = db.db_pool().purge_store();
    let mut tx = store.begin().await.unwrap();

    let shoppers = tx.shopper_ids(&[customer.guid]).await.unwrap();
    assert_eq!(shoppers, vec![customer.shopper_id]);

    let carts = tx.shopping_carts(&shoppers).await.unwrap();
    assert_eq!(carts, vec![customer.cart]);

    let wishlists = tx.wishlist_ids(&shoppers).await.unwrap();
    assert_eq!(wishlists.len(), 1);

    let items = tx.cart_line_items(&[customer.cart.id]).await.unwrap();
    assert_eq!(items.len() as i64, LINE_ITEMS_PER_CART);
    let other_items = tx.cart_line_items(&[other.cart.id]).await.unwrap();
    assert!(
        items.iter().all(|i| !other_items.contains(i)),
        "line items must not leak across carts"
    );

    tx.rollback().await.unwrap();
}

async fn test_line_items_include_nested_constituents(db: &TestDb) {
    let expired = Utc::now() - Duration::days(90);
    let customer = seed_customer(db, CustomerType::SingleSession, expired, false).await;

    let store = db.db_pool().purge_store();
    let mut tx = store.begin().await.unwrap();
    let items = tx.cart_line_items(&[customer.cart.id]).await.unwrap();
    tx.rollback().await.unwrap();

    let constituent = items
        .iter()
        .find(|i| i.parent_item_id == Some(customer.bundle_item_id))
        .expect("bundle constituent resolved");
    let nested = items
        .iter()
        .find(|i| i.parent_item_id == Some(constituent.id))
        .expect("nested constituent resolved");

    let passes = LineItemArena::new(items.iter().copied()).deletion_passes();
    assert_eq!(passes.len(), 3);
    assert_eq!(passes[0], vec![nested.id]);
    assert_eq!(passes[1], vec![constituent.id]);
    assert!(passes[2].contains(&customer.bundle_item_id));
}

async fn test_no_shoppers_for_unknown_customer(db: &TestDb) {
    let store = db.db_pool().purge_store();
    let mut tx = store.begin().await.unwrap();
    let shoppers = tx.shopper_ids(&[uuid::Uuid::new_v4()]).await.unwrap();
    assert!(shoppers.is_empty());
    tx.rollback().await.unwrap();
}

async fn test_delete_rows_rolls_back(db: &TestDb) {
    let expired = Utc::now() - Duration::days(90);
    let customer = seed_customer(db, CustomerType::SingleSession, expired, false).await;

    let store = db.db_pool().purge_store();
    let mut tx = store.begin().await.unwrap();
    let deleted = tx
        .delete_rows(OwnedRecordSet::ProfileValues, RecordKeys::Ids(&[customer.id]))
        .await
        .unwrap();
    assert_eq!(deleted, 5);
    tx.rollback().await.unwrap();

    assert_eq!(
        db.count("customer_profile_values", "customer_id = $1", Arg::Int(customer.id))
            .await,
        5
    );
}

async fn test_delete_rows_by_guid(db: &TestDb) {
    let expired = Utc::now() - Duration::days(90);
    let customer = seed_customer(db, CustomerType::SingleSession, expired, false).await;
    let other = seed_customer(db, CustomerType::SingleSession, expired, false).await;

    let store = db.db_pool().purge_store();
    let mut tx = store.begin().await.unwrap();
    let deleted = tx
        .delete_rows(OwnedRecordSet::AccessTokens, RecordKeys::Guids(&[customer.guid]))
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    tx.commit().await.unwrap();

    assert_eq!(
        db.count("oauth_access_tokens", "customer_guid = $1", Arg::Guid(customer.guid))
            .await,
        0
    );
    assert_eq!(
        db.count("oauth_access_tokens", "customer_guid = $1", Arg::Guid(other.guid))
            .await,
        1
    );
}

async fn test_delete_rows_spans_bind_chunks(db: &TestDb) {
    let expired = Utc::now() - Duration::days(90);
    let customer = seed_customer(db, CustomerType::SingleSession, expired, false).await;

    // Far more keys than one statement may bind.
    let mut ids: Vec<i64> = (1_000_000..1_001_200).collect();
    ids.push(customer.id);

    let store = db.db_pool().purge_store();
    let mut tx = store.begin().await.unwrap();
    let deleted = tx
        .delete_rows(OwnedRecordSet::ProfileValues, RecordKeys::Ids(&ids))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(deleted, 5);
}

async fn test_delete_rows_rejects_wrong_key_kind(db: &TestDb) {
    let store = db.db_pool().purge_store();
    let mut tx = store.begin().await.unwrap();
    let err = tx
        .delete_rows(OwnedRecordSet::Customers, RecordKeys::Guids(&[uuid::Uuid::new_v4()]))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Internal(_)), "{err:?}");
    tx.rollback().await.unwrap();
}

async fn test_commit_fails_when_order_references_customer(db: &TestDb) {
    let id = db
        .scalar(
            "INSERT INTO customers (guid, customer_type, store_code, last_modified_at) \
             VALUES ($1, 'single_session', 'MOBEE', $2) RETURNING id",
            &[
                Arg::Guid(uuid::Uuid::new_v4()),
                Arg::Time(Utc::now() - Duration::days(90)),
            ],
        )
        .await;
    attach_order(db, id).await;

    let store = db.db_pool().purge_store();
    let mut tx = store.begin().await.unwrap();
    // The orders foreign key is deferred, so the delete itself succeeds.
    let deleted = tx
        .delete_rows(OwnedRecordSet::Customers, RecordKeys::Ids(&[id]))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let err = tx.commit().await.unwrap_err();
    assert!(err.is_constraint_violation(), "{err:?}");

    assert_eq!(db.count("customers", "id = $1", Arg::Int(id)).await, 1);
}

#[cfg(feature = "database-sqlite")]
mod sqlite_tests {
    use super::*;

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let db = TestDb::sqlite().await;
                super::$name(&db).await;
            }
        };
    }

    sqlite_test!(test_candidates_match_eligibility);
    sqlite_test!(test_candidates_empty_store);
    sqlite_test!(test_cutoff_is_exclusive);
    sqlite_test!(test_resolves_dependents);
    sqlite_test!(test_line_items_include_nested_constituents);
    sqlite_test!(test_no_shoppers_for_unknown_customer);
    sqlite_test!(test_delete_rows_rolls_back);
    sqlite_test!(test_delete_rows_by_guid);
    sqlite_test!(test_delete_rows_spans_bind_chunks);
    sqlite_test!(test_delete_rows_rejects_wrong_key_kind);
    sqlite_test!(test_commit_fails_when_order_references_customer);
}

#[cfg(feature = "database-postgres")]
mod postgres_tests {
    use super::*;

    macro_rules! postgres_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let db = TestDb::postgres().await;
                super::$name(&db).await;
            }
        };
    }

    postgres_test!(test_candidates_match_eligibility);
    postgres_test!(test_candidates_empty_store);
    postgres_test!(test_cutoff_is_exclusive);
    postgres_test!(test_resolves_dependents);
    postgres_test!(test_line_items_include_nested_constituents);
    postgres_test!(test_no_shoppers_for_unknown_customer);
    postgres_test!(test_delete_rows_rolls_back);
    postgres_test!(test_delete_rows_by_guid);
    postgres_test!(test_delete_rows_spans_bind_chunks);
    postgres_test!(test_delete_rows_rejects_wrong_key_kind);
    postgres_test!(test_commit_fails_when_order_references_customer);
}
