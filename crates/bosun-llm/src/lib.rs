//! Model and embedding clients for a local Ollama server, plus the canned
//! stub driver used when no model is available.

pub mod embed;
pub mod http;
pub mod ollama;
pub mod stub;

use bosun_core::config::BosunConfig;
use bosun_core::embed::Embedder;
use bosun_core::error::BosunError;
use bosun_core::model::ModelDriver;
use bosun_core::types::ModelProvider;
use std::sync::Arc;
use tracing::info;

pub use crate::embed::OllamaEmbedder;
pub use crate::ollama::OllamaDriver;
pub use crate::stub::StubDriver;

/// Picks the model driver once, at startup.
pub fn build_driver(config: &BosunConfig) -> Result<Arc<dyn ModelDriver>, BosunError> {
    let driver: Arc<dyn ModelDriver> = match config.model.provider {
        ModelProvider::Stub => Arc::new(StubDriver),
        ModelProvider::Ollama => Arc::new(OllamaDriver::new(&config.model)?),
    };
    info!(model = %driver.model_used(), "model driver ready");
    Ok(driver)
}

pub fn build_embedder(config: &BosunConfig) -> Result<Arc<dyn Embedder>, BosunError> {
    Ok(Arc::new(OllamaEmbedder::new(
        config.embedding.base_url(&config.model),
        &config.embedding.model,
        config.embedding.timeout(),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_provider_builds_stub_driver() {
        let mut config = BosunConfig::default();
        config.model.provider = ModelProvider::Stub;
        let driver = build_driver(&config).unwrap();
        assert_eq!(driver.model_used(), "stub");
    }

    #[test]
    fn ollama_driver_records_model_name() {
        let mut config = BosunConfig::default();
        config.model.name = "llama3.1:8b".to_string();
        let driver = build_driver(&config).unwrap();
        assert_eq!(driver.model_used(), "ollama/llama3.1:8b");
    }

    #[test]
    fn embedder_uses_configured_model() {
        let config = BosunConfig::default();
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.model(), "nomic-embed-text");
    }
}
