use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    db::{
        error::DbResult,
        repos::{OwnedRecordSet, PurgeStoreRepo, PurgeTransaction, RecordKeys},
    },
    models::{CandidateId, CartRef, CustomerType, LineItem},
};

pub struct PostgresPurgeStoreRepo {
    write_pool: PgPool,
}

impl PostgresPurgeStoreRepo {
    /// The read replica is ignored: candidates must reflect committed orders
    /// on the primary.
    pub fn new(write_pool: PgPool, _read_pool: Option<PgPool>) -> Self {
        Self { write_pool }
    }
}

#[async_trait]
impl PurgeStoreRepo for PostgresPurgeStoreRepo {
    async fn find_purge_candidates(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<CandidateId>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.guid
            FROM customers c
            WHERE c.customer_type = $1
              AND c.last_modified_at < $2
              AND NOT EXISTS (SELECT 1 FROM orders o WHERE o.customer_id = c.id)
            ORDER BY c.id
            "#,
        )
        .bind(CustomerType::SingleSession.as_str())
        .bind(cutoff)
        .fetch_all(&self.write_pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CandidateId {
                uid: row.get("id"),
                guid: row.get("guid"),
            })
            .collect())
    }

    async fn begin(&self) -> DbResult<Box<dyn PurgeTransaction>> {
        let tx = self.write_pool.begin().await?;
        Ok(Box::new(PostgresPurgeTransaction { tx }))
    }
}

pub struct PostgresPurgeTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PurgeTransaction for PostgresPurgeTransaction {
    async fn shopper_ids(&mut self, customer_guids: &[Uuid]) -> DbResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM shoppers WHERE customer_guid = ANY($1) ORDER BY id",
        )
        .bind(customer_guids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }

    async fn shopping_carts(&mut self, shopper_ids: &[i64]) -> DbResult<Vec<CartRef>> {
        let rows = sqlx::query(
            "SELECT id, guid FROM shopping_carts WHERE shopper_id = ANY($1) ORDER BY id",
        )
        .bind(shopper_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CartRef {
                id: row.get("id"),
                guid: row.get("guid"),
            })
            .collect())
    }

    async fn wishlist_ids(&mut self, shopper_ids: &[i64]) -> DbResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM wishlists WHERE shopper_id = ANY($1) ORDER BY id",
        )
        .bind(shopper_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }

    async fn cart_line_items(&mut self, cart_ids: &[i64]) -> DbResult<Vec<LineItem>> {
        let rows = sqlx::query(
            r#"
            WITH RECURSIVE owned(id, parent_item_id) AS (
                SELECT id, parent_item_id FROM cart_items
                WHERE shopping_cart_id = ANY($1) OR child_item_cart_id = ANY($1)
                UNION
                SELECT ci.id, ci.parent_item_id
                FROM cart_items ci
                JOIN owned ON ci.parent_item_id = owned.id
            )
            SELECT id, parent_item_id FROM owned ORDER BY id
            "#,
        )
        .bind(cart_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LineItem {
                id: row.get("id"),
                parent_item_id: row.get("parent_item_id"),
            })
            .collect())
    }

    async fn delete_rows(&mut self, set: OwnedRecordSet, keys: RecordKeys<'_>) -> DbResult<u64> {
        set.check_keys(&keys)?;
        let query = format!(
            "DELETE FROM {} WHERE {} = ANY($1)",
            set.table(),
            set.key_column()
        );
        let result = match keys {
            RecordKeys::Ids(ids) => sqlx::query(&query).bind(ids).execute(&mut *self.tx).await?,
            RecordKeys::Guids(guids) => {
                sqlx::query(&query)
                    .bind(guids)
                    .execute(&mut *self.tx)
                    .await?
            }
        };
        Ok(result.rows_affected())
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
