pub mod catalog;
pub mod data;
pub mod protocol;
pub mod remote;
pub mod stdio;

use bosun_core::config::ToolsConfig;
use bosun_core::error::BosunError;
use bosun_core::store::StoreProvider;
use bosun_core::tools::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use crate::data::DataTools;
pub use crate::remote::HttpTools;

/// Remote tools when an endpoint is configured, otherwise in-process ones.
pub fn build_registry<P: StoreProvider>(
    config: &ToolsConfig,
    provider: P,
    store_timeout: Duration,
) -> Result<Arc<dyn ToolRegistry>, BosunError> {
    match config.endpoint.as_deref() {
        Some(endpoint) => {
            info!(endpoint, "using remote tool service");
            Ok(Arc::new(HttpTools::new(endpoint, config.call_timeout())?))
        }
        None => Ok(Arc::new(DataTools::new(provider, store_timeout))),
    }
}
