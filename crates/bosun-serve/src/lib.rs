pub mod middleware;
pub mod openapi;
pub mod routes;

use axum::Router;
use bosun_core::embed::Embedder;
use bosun_core::model::ModelDriver;
use bosun_core::store::with_store;
use bosun_core::{Analyzer, BosunConfig, BosunError};
use bosun_db::{DbStore, SqliteProvider};
use bosun_mcp::{DataTools, build_registry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BosunConfig>,
    pub provider: SqliteProvider,
    pub analyzer: Analyzer<SqliteProvider>,
    pub data_tools: DataTools<SqliteProvider>,
}

impl AppState {
    pub fn new(
        config: BosunConfig,
        provider: SqliteProvider,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ModelDriver>,
    ) -> Result<Self, BosunError> {
        let store_timeout = config.analysis.store_timeout();
        let tools = build_registry(&config.tools, provider.clone(), store_timeout)?;
        let analyzer = Analyzer::new(provider.clone(), embedder, tools, model, &config);
        let data_tools = DataTools::new(provider.clone(), store_timeout);
        Ok(Self {
            config: Arc::new(config),
            provider,
            analyzer,
            data_tools,
        })
    }

    /// Runs `f` against a fresh store connection off the async runtime.
    pub async fn store<F, T>(&self, f: F) -> Result<T, BosunError>
    where
        F: FnOnce(&DbStore) -> Result<T, BosunError> + Send + 'static,
        T: Send + 'static,
    {
        with_store(&self.provider, self.config.analysis.store_timeout(), f).await
    }
}

pub fn app(state: AppState) -> Router {
    routes::router(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "bosun api listening");
    axum::serve(listener, app(state)).await
}
