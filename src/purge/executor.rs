use std::sync::Arc;

use uuid::Uuid;

use super::{Batch, BatchError, BatchOutcome, DeletedRows, LineItemArena};
use crate::db::{DbResult, OwnedRecordSet, PurgeStoreRepo, PurgeTransaction, RecordKeys};

/// Deletes one batch of customer aggregates inside a single transaction.
pub struct CascadeDeleteExecutor {
    store: Arc<dyn PurgeStoreRepo>,
}

impl CascadeDeleteExecutor {
    pub fn new(store: Arc<dyn PurgeStoreRepo>) -> Self {
        Self { store }
    }

    /// Remove every aggregate in `batch`, or none of them.
    ///
    /// Errors never escape: they are folded into [`BatchOutcome::Failed`]
    /// after the transaction has been rolled back.
    #[tracing::instrument(
        name = "purge.batch",
        skip_all,
        fields(batch_index = batch.index(), batch_size = batch.len())
    )]
    pub async fn delete_batch(&self, batch: &Batch<'_>) -> BatchOutcome {
        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                return BatchOutcome::Failed {
                    error: BatchError::Processing(e),
                };
            }
        };

        let deleted = match delete_aggregates(tx.as_mut(), batch).await {
            Ok(deleted) => deleted,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    // Dropping the connection still discards the transaction.
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                }
                return BatchOutcome::Failed {
                    error: BatchError::Processing(e),
                };
            }
        };

        if let Err(e) = tx.commit().await {
            return BatchOutcome::Failed {
                error: BatchError::Commit(e),
            };
        }

        BatchOutcome::Succeeded {
            count: deleted.customers(),
            rows_deleted: deleted.total(),
        }
    }
}

/// Resolve and delete every row owned by the batch, leaves first.
async fn delete_aggregates(
    tx: &mut dyn PurgeTransaction,
    batch: &Batch<'_>,
) -> DbResult<DeletedRows> {
    let customer_ids = batch.uids();
    let customer_guids = batch.guids();

    let shopper_ids = tx.shopper_ids(&customer_guids).await?;
    let (carts, wishlist_ids) = if shopper_ids.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        (
            tx.shopping_carts(&shopper_ids).await?,
            tx.wishlist_ids(&shopper_ids).await?,
        )
    };
    let cart_ids: Vec<i64> = carts.iter().map(|c| c.id).collect();
    let cart_guids: Vec<Uuid> = carts.iter().map(|c| c.guid).collect();

    let line_items = if cart_ids.is_empty() {
        LineItemArena::default()
    } else {
        LineItemArena::new(tx.cart_line_items(&cart_ids).await?)
    };

    tracing::debug!(
        shoppers = shopper_ids.len(),
        carts = cart_ids.len(),
        wishlists = wishlist_ids.len(),
        line_items = line_items.len(),
        "Resolved dependents"
    );

    let mut deleted = DeletedRows::default();

    for pass in line_items.deletion_passes() {
        delete(tx, OwnedRecordSet::CartItems, RecordKeys::Ids(&pass), &mut deleted).await?;
    }

    let shopper_owned = [
        (OwnedRecordSet::CartOrders, RecordKeys::Guids(&cart_guids)),
        (OwnedRecordSet::ShoppingCarts, RecordKeys::Ids(&cart_ids)),
        (OwnedRecordSet::Wishlists, RecordKeys::Ids(&wishlist_ids)),
        (OwnedRecordSet::CustomerSessions, RecordKeys::Ids(&shopper_ids)),
        (OwnedRecordSet::Shoppers, RecordKeys::Ids(&shopper_ids)),
    ];
    for (set, keys) in shopper_owned {
        delete(tx, set, keys, &mut deleted).await?;
    }

    // Independent of each other; all reference the customer row.
    let customer_owned = [
        (OwnedRecordSet::ProfileValues, RecordKeys::Ids(&customer_ids)),
        (OwnedRecordSet::Addresses, RecordKeys::Ids(&customer_ids)),
        (OwnedRecordSet::GiftCertificates, RecordKeys::Ids(&customer_ids)),
        (OwnedRecordSet::GroupMemberships, RecordKeys::Ids(&customer_ids)),
        (OwnedRecordSet::AccessTokens, RecordKeys::Guids(&customer_guids)),
        (OwnedRecordSet::Consents, RecordKeys::Guids(&customer_guids)),
        (OwnedRecordSet::ConsentHistory, RecordKeys::Guids(&customer_guids)),
    ];
    for (set, keys) in customer_owned {
        delete(tx, set, keys, &mut deleted).await?;
    }

    delete(
        tx,
        OwnedRecordSet::Customers,
        RecordKeys::Ids(&customer_ids),
        &mut deleted,
    )
    .await?;

    Ok(deleted)
}

async fn delete(
    tx: &mut dyn PurgeTransaction,
    set: OwnedRecordSet,
    keys: RecordKeys<'_>,
    deleted: &mut DeletedRows,
) -> DbResult<()> {
    if keys.is_empty() {
        return Ok(());
    }
    let count = tx.delete_rows(set, keys).await?;
    tracing::trace!(record_set = %set, keys = keys.len(), deleted = count, "Deleted rows");
    deleted.add(set, count);
    Ok(())
}
