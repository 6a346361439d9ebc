mod common;
mod purge;
mod settings;

pub use purge::{SqlitePurgeStoreRepo, SqlitePurgeTransaction};
pub use settings::SqliteSettingsRepo;
