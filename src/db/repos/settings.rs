use async_trait::async_trait;

use crate::db::error::DbResult;

/// Key/value runtime settings.
#[async_trait]
pub trait SettingsRepo: Send + Sync {
    /// Get a setting's raw value, or `None` if it has never been set.
    async fn get(&self, key: &str) -> DbResult<Option<String>>;

    /// Create or replace a setting.
    async fn set(&self, key: &str, value: &str) -> DbResult<()>;

    /// Get a setting as an integer.
    ///
    /// A stored value that does not parse is a validation error, not `None`.
    async fn get_int(&self, key: &str) -> DbResult<Option<i64>> {
        match self.get(key).await? {
            Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|e| {
                crate::db::error::DbError::Validation(format!(
                    "Setting {} is not an integer ({:?}): {}",
                    key, raw, e
                ))
            }),
            None => Ok(None),
        }
    }
}
