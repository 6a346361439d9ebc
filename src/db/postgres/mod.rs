mod purge;
mod settings;

pub use purge::{PostgresPurgeStoreRepo, PostgresPurgeTransaction};
pub use settings::PostgresSettingsRepo;
