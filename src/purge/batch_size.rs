use std::sync::Arc;

use async_trait::async_trait;

use super::PurgeError;
use crate::db::SettingsRepo;

/// Supplies the batch size for a run. Read once per run, at partitioning.
#[async_trait]
pub trait BatchSizeProvider: Send + Sync {
    async fn current_batch_size(&self) -> Result<i64, PurgeError>;
}

/// Batch size stored in the settings table, with a configured fallback.
pub struct SettingsBatchSize {
    settings: Arc<dyn SettingsRepo>,
    key: String,
    default: i64,
}

impl SettingsBatchSize {
    pub fn new(settings: Arc<dyn SettingsRepo>, key: impl Into<String>, default: i64) -> Self {
        Self {
            settings,
            key: key.into(),
            default,
        }
    }
}

#[async_trait]
impl BatchSizeProvider for SettingsBatchSize {
    async fn current_batch_size(&self) -> Result<i64, PurgeError> {
        match self.settings.get_int(&self.key).await {
            Ok(Some(size)) => Ok(size),
            Ok(None) => {
                tracing::debug!(key = %self.key, default = self.default, "Batch size not set, using default");
                Ok(self.default)
            }
            Err(e) => Err(PurgeError::Configuration(format!(
                "Failed to read setting {}: {}",
                self.key, e
            ))),
        }
    }
}

/// A constant batch size, e.g. from `--batch-size`.
#[derive(Debug, Clone, Copy)]
pub struct FixedBatchSize(pub i64);

#[async_trait]
impl BatchSizeProvider for FixedBatchSize {
    async fn current_batch_size(&self) -> Result<i64, PurgeError> {
        Ok(self.0)
    }
}
