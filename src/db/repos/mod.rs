mod purge;
mod settings;

pub use purge::*;
pub use settings::*;
