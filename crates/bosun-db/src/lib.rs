pub mod analysis_repo;
pub mod event_repo;
pub mod knowledge_repo;
pub mod schema;
pub mod store;
pub mod telemetry_repo;
pub mod util;

pub use crate::store::{DbStore, SqliteProvider};
