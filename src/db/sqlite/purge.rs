use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::common::{MAX_BIND_PARAMS, parse_uuid, placeholders};
use crate::{
    db::{
        error::DbResult,
        repos::{OwnedRecordSet, PurgeStoreRepo, PurgeTransaction, RecordKeys},
    },
    models::{CandidateId, CartRef, CustomerType, LineItem},
};

pub struct SqlitePurgeStoreRepo {
    pool: SqlitePool,
}

impl SqlitePurgeStoreRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurgeStoreRepo for SqlitePurgeStoreRepo {
    async fn find_purge_candidates(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<CandidateId>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.guid
            FROM customers c
            WHERE c.customer_type = ?
              AND c.last_modified_at < ?
              AND NOT EXISTS (SELECT 1 FROM orders o WHERE o.customer_id = c.id)
            ORDER BY c.id
            "#,
        )
        .bind(CustomerType::SingleSession.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CandidateId {
                    uid: row.get("id"),
                    guid: parse_uuid(&row.get::<String, _>("guid"))?,
                })
            })
            .collect()
    }

    async fn begin(&self) -> DbResult<Box<dyn PurgeTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqlitePurgeTransaction { tx }))
    }
}

pub struct SqlitePurgeTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl SqlitePurgeTransaction {
    /// Run `SELECT id FROM {table} WHERE {column} IN (...)` over id keys in
    /// chunks that respect the bind limit.
    async fn select_ids_by_ids(&mut self, table: &str, column: &str, keys: &[i64]) -> DbResult<Vec<i64>> {
        let mut ids = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(MAX_BIND_PARAMS) {
            let query = format!(
                "SELECT id FROM {} WHERE {} IN ({}) ORDER BY id",
                table,
                column,
                placeholders(chunk.len())
            );
            let mut query_builder = sqlx::query_scalar::<_, i64>(&query);
            for key in chunk {
                query_builder = query_builder.bind(*key);
            }
            ids.extend(query_builder.fetch_all(&mut *self.tx).await?);
        }
        Ok(ids)
    }
}

#[async_trait]
impl PurgeTransaction for SqlitePurgeTransaction {
    async fn shopper_ids(&mut self, customer_guids: &[Uuid]) -> DbResult<Vec<i64>> {
        let mut ids = Vec::with_capacity(customer_guids.len());
        for chunk in customer_guids.chunks(MAX_BIND_PARAMS) {
            let query = format!(
                "SELECT id FROM shoppers WHERE customer_guid IN ({}) ORDER BY id",
                placeholders(chunk.len())
            );
            let mut query_builder = sqlx::query_scalar::<_, i64>(&query);
            for guid in chunk {
                query_builder = query_builder.bind(guid.to_string());
            }
            ids.extend(query_builder.fetch_all(&mut *self.tx).await?);
        }
        Ok(ids)
    }

    async fn shopping_carts(&mut self, shopper_ids: &[i64]) -> DbResult<Vec<CartRef>> {
        let mut carts = Vec::with_capacity(shopper_ids.len());
        for chunk in shopper_ids.chunks(MAX_BIND_PARAMS) {
            let query = format!(
                "SELECT id, guid FROM shopping_carts WHERE shopper_id IN ({}) ORDER BY id",
                placeholders(chunk.len())
            );
            let mut query_builder = sqlx::query(&query);
            for id in chunk {
                query_builder = query_builder.bind(*id);
            }
            for row in query_builder.fetch_all(&mut *self.tx).await? {
                carts.push(CartRef {
                    id: row.get("id"),
                    guid: parse_uuid(&row.get::<String, _>("guid"))?,
                });
            }
        }
        Ok(carts)
    }

    async fn wishlist_ids(&mut self, shopper_ids: &[i64]) -> DbResult<Vec<i64>> {
        self.select_ids_by_ids("wishlists", "shopper_id", shopper_ids)
            .await
    }

    async fn cart_line_items(&mut self, cart_ids: &[i64]) -> DbResult<Vec<LineItem>> {
        let mut items = Vec::new();
        // Each cart id is bound twice, once per seed column.
        for chunk in cart_ids.chunks(MAX_BIND_PARAMS / 2) {
            let list = placeholders(chunk.len());
            let query = format!(
                r#"
                WITH RECURSIVE owned(id, parent_item_id) AS (
                    SELECT id, parent_item_id FROM cart_items
                    WHERE shopping_cart_id IN ({list}) OR child_item_cart_id IN ({list})
                    UNION
                    SELECT ci.id, ci.parent_item_id
                    FROM cart_items ci
                    JOIN owned ON ci.parent_item_id = owned.id
                )
                SELECT id, parent_item_id FROM owned ORDER BY id
                "#
            );
            let mut query_builder = sqlx::query(&query);
            for id in chunk.iter().chain(chunk.iter()) {
                query_builder = query_builder.bind(*id);
            }
            for row in query_builder.fetch_all(&mut *self.tx).await? {
                items.push(LineItem {
                    id: row.get("id"),
                    parent_item_id: row.get("parent_item_id"),
                });
            }
        }
        Ok(items)
    }

    async fn delete_rows(&mut self, set: OwnedRecordSet, keys: RecordKeys<'_>) -> DbResult<u64> {
        set.check_keys(&keys)?;
        let mut deleted = 0;
        match keys {
            RecordKeys::Ids(ids) => {
                for chunk in ids.chunks(MAX_BIND_PARAMS) {
                    let query = delete_statement(set, chunk.len());
                    let mut query_builder = sqlx::query(&query);
                    for id in chunk {
                        query_builder = query_builder.bind(*id);
                    }
                    deleted += query_builder.execute(&mut *self.tx).await?.rows_affected();
                }
            }
            RecordKeys::Guids(guids) => {
                for chunk in guids.chunks(MAX_BIND_PARAMS) {
                    let query = delete_statement(set, chunk.len());
                    let mut query_builder = sqlx::query(&query);
                    for guid in chunk {
                        query_builder = query_builder.bind(guid.to_string());
                    }
                    deleted += query_builder.execute(&mut *self.tx).await?.rows_affected();
                }
            }
        }
        Ok(deleted)
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn delete_statement(set: OwnedRecordSet, n: usize) -> String {
    format!(
        "DELETE FROM {} WHERE {} IN ({})",
        set.table(),
        set.key_column(),
        placeholders(n)
    )
}
