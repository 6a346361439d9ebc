use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::error::{DbError, DbResult},
    models::{CandidateId, CartRef, LineItem},
};

/// A record set owned by a customer aggregate.
///
/// Each variant maps to one table and the column used to select the rows
/// belonging to a batch. The mapping is fixed; the purge deletes exactly these
/// sets plus the root `customers` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OwnedRecordSet {
    CartItems,
    CartOrders,
    ShoppingCarts,
    Wishlists,
    CustomerSessions,
    Shoppers,
    ProfileValues,
    Addresses,
    GiftCertificates,
    GroupMemberships,
    AccessTokens,
    Consents,
    ConsentHistory,
    Customers,
}

/// How rows of a record set are keyed for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Id,
    Guid,
}

impl OwnedRecordSet {
    pub fn table(&self) -> &'static str {
        match self {
            OwnedRecordSet::CartItems => "cart_items",
            OwnedRecordSet::CartOrders => "cart_orders",
            OwnedRecordSet::ShoppingCarts => "shopping_carts",
            OwnedRecordSet::Wishlists => "wishlists",
            OwnedRecordSet::CustomerSessions => "customer_sessions",
            OwnedRecordSet::Shoppers => "shoppers",
            OwnedRecordSet::ProfileValues => "customer_profile_values",
            OwnedRecordSet::Addresses => "addresses",
            OwnedRecordSet::GiftCertificates => "gift_certificates",
            OwnedRecordSet::GroupMemberships => "customer_group_memberships",
            OwnedRecordSet::AccessTokens => "oauth_access_tokens",
            OwnedRecordSet::Consents => "customer_consents",
            OwnedRecordSet::ConsentHistory => "customer_consent_history",
            OwnedRecordSet::Customers => "customers",
        }
    }

    /// Column matched against the keys passed to [`PurgeTransaction::delete_rows`].
    pub fn key_column(&self) -> &'static str {
        match self {
            OwnedRecordSet::CartItems
            | OwnedRecordSet::ShoppingCarts
            | OwnedRecordSet::Wishlists
            | OwnedRecordSet::Shoppers
            | OwnedRecordSet::Customers => "id",
            OwnedRecordSet::CartOrders => "shopping_cart_guid",
            OwnedRecordSet::CustomerSessions => "shopper_id",
            OwnedRecordSet::ProfileValues
            | OwnedRecordSet::Addresses
            | OwnedRecordSet::GiftCertificates
            | OwnedRecordSet::GroupMemberships => "customer_id",
            OwnedRecordSet::AccessTokens
            | OwnedRecordSet::Consents
            | OwnedRecordSet::ConsentHistory => "customer_guid",
        }
    }

    pub fn key_kind(&self) -> KeyKind {
        match self {
            OwnedRecordSet::CartOrders
            | OwnedRecordSet::AccessTokens
            | OwnedRecordSet::Consents
            | OwnedRecordSet::ConsentHistory => KeyKind::Guid,
            _ => KeyKind::Id,
        }
    }

    /// Reject keys of the wrong kind for this record set.
    pub fn check_keys(&self, keys: &RecordKeys<'_>) -> DbResult<()> {
        if self.key_kind() == keys.kind() {
            Ok(())
        } else {
            Err(DbError::Internal(format!(
                "{} is keyed by {:?}, got {:?} keys",
                self.table(),
                self.key_kind(),
                keys.kind()
            )))
        }
    }
}

impl std::fmt::Display for OwnedRecordSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Keys selecting the rows of one record set.
#[derive(Debug, Clone, Copy)]
pub enum RecordKeys<'a> {
    Ids(&'a [i64]),
    Guids(&'a [Uuid]),
}

impl RecordKeys<'_> {
    pub fn len(&self) -> usize {
        match self {
            RecordKeys::Ids(ids) => ids.len(),
            RecordKeys::Guids(guids) => guids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            RecordKeys::Ids(_) => KeyKind::Id,
            RecordKeys::Guids(_) => KeyKind::Guid,
        }
    }
}

/// Store access for the purge engine.
///
/// Reads happen outside any transaction; every deletion goes through a
/// [`PurgeTransaction`] obtained from [`PurgeStoreRepo::begin`].
#[async_trait]
pub trait PurgeStoreRepo: Send + Sync {
    /// Find anonymous customers last modified before `cutoff` that have no
    /// orders, ordered by uid.
    async fn find_purge_candidates(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<CandidateId>>;

    /// Open a transaction for deleting one batch.
    async fn begin(&self) -> DbResult<Box<dyn PurgeTransaction>>;
}

/// One open transaction. Dropping it without calling [`commit`] rolls back.
///
/// [`commit`]: PurgeTransaction::commit
#[async_trait]
pub trait PurgeTransaction: Send {
    /// Shopper ids owned by the given customers.
    async fn shopper_ids(&mut self, customer_guids: &[Uuid]) -> DbResult<Vec<i64>>;

    /// Shopping carts owned by the given shoppers.
    async fn shopping_carts(&mut self, shopper_ids: &[i64]) -> DbResult<Vec<CartRef>>;

    /// Wishlist ids owned by the given shoppers.
    async fn wishlist_ids(&mut self, shopper_ids: &[i64]) -> DbResult<Vec<i64>>;

    /// Every line item in the given carts, including bundle constituents at
    /// any depth, with their parent links.
    async fn cart_line_items(&mut self, cart_ids: &[i64]) -> DbResult<Vec<LineItem>>;

    /// Delete the rows of `set` whose key column matches `keys`.
    /// Returns the number of rows removed.
    async fn delete_rows(&mut self, set: OwnedRecordSet, keys: RecordKeys<'_>) -> DbResult<u64>;

    async fn commit(self: Box<Self>) -> DbResult<()>;

    async fn rollback(self: Box<Self>) -> DbResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_keyed_sets_use_guid_columns() {
        for set in [
            OwnedRecordSet::CartOrders,
            OwnedRecordSet::AccessTokens,
            OwnedRecordSet::Consents,
            OwnedRecordSet::ConsentHistory,
        ] {
            assert_eq!(set.key_kind(), KeyKind::Guid);
            assert!(set.key_column().ends_with("guid"), "{set}");
        }
        assert_eq!(OwnedRecordSet::Customers.key_kind(), KeyKind::Id);
    }

    #[test]
    fn test_check_keys_rejects_mismatched_kind() {
        let guids = [Uuid::new_v4()];
        assert!(
            OwnedRecordSet::Customers
                .check_keys(&RecordKeys::Guids(&guids))
                .is_err()
        );
        assert!(
            OwnedRecordSet::Consents
                .check_keys(&RecordKeys::Guids(&guids))
                .is_ok()
        );
    }
}
