pub mod analyses;
pub mod analyzer;
pub mod config;
pub mod embed;
pub mod error;
pub mod events;
pub mod ingest;
pub mod knowledge;
pub mod locks;
pub mod model;
pub mod parse;
pub mod prompt;
pub mod retriever;
pub mod store;
pub mod telemetry;
pub mod tools;
pub mod validation;

pub mod types;

pub use crate::analyzer::{Analyzer, AnalyzerSettings};
pub use crate::config::BosunConfig;
pub use crate::error::BosunError;
pub use crate::store::{Store, StoreProvider};
