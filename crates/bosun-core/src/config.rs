use crate::analyzer::FINISH_ATTEMPTS;
use crate::error::ConfigError;
use crate::types::ModelProvider;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "BOSUN_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "bosun.toml";

/// Runtime configuration. Built from defaults, then `bosun.toml` (or the file
/// named by `BOSUN_CONFIG`), then environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BosunConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub tools: ToolsConfig,
    pub analysis: AnalysisConfig,
    pub knowledge: KnowledgeConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding events, telemetry, analyses and knowledge chunks.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".bosun/bosun.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// `ollama` talks to a model server, `stub` returns a canned answer.
    pub provider: ModelProvider,
    pub base_url: String,
    /// Model identifier sent to the server and recorded as `model_used`.
    pub name: String,
    /// Upper bound for one model exchange.
    pub timeout_secs: u64,
    /// Extra attempts for rate-limited or 5xx model responses.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub retry_backoff_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            name: "llama3.2".to_string(),
            timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Identifier stored on each analysis row.
    pub fn model_used(&self) -> String {
        match self.provider {
            ModelProvider::Stub => "stub".to_string(),
            provider => format!("{}/{}", provider.as_str(), self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Falls back to `model.base_url` when unset.
    pub base_url: Option<String>,
    /// Must match the model the knowledge store was ingested with.
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "nomic-embed-text".to_string(),
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn base_url<'a>(&'a self, model: &'a ModelConfig) -> &'a str {
        self.base_url.as_deref().unwrap_or(&model.base_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum documents handed to the model.
    pub top_k: usize,
    /// Cosine similarity floor; weaker matches are dropped.
    pub min_similarity: f32,
    /// Bound for the embed plus search step together.
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_similarity: 0.7,
            timeout_secs: 10,
        }
    }
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Remote tool service base URL. Unset runs the tools in-process.
    pub endpoint: Option<String>,
    /// Bound for one tool call.
    pub call_timeout_secs: u64,
    /// Tool rounds allowed before a final answer is forced.
    pub max_rounds: u32,
    /// Tool errors tolerated before a final answer is forced.
    pub max_failures: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            call_timeout_secs: 5,
            max_rounds: 5,
            max_failures: 3,
        }
    }
}

impl ToolsConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Bound for each Result Store operation.
    pub store_timeout_secs: u64,
    /// Pending rows older than this are treated as abandoned. Must exceed the
    /// longest an attempt can run, see [`BosunConfig::attempt_budget`].
    pub pending_stale_after_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            store_timeout_secs: 10,
            pending_stale_after_secs: 3600,
        }
    }
}

impl AnalysisConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn pending_stale_after(&self) -> Duration {
        Duration::from_secs(self.pending_stale_after_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub dir: PathBuf,
    pub chunk_words: usize,
    pub overlap_words: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("docs/knowledge"),
            chunk_words: 280,
            overlap_words: 40,
        }
    }
}

impl BosunConfig {
    /// Defaults, then the config file, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse {
            message: err.to_string(),
        })
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("BOSUN_DB_PATH") {
            self.database.path = path;
        }
        if let Some(host) = lookup("BOSUN_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("BOSUN_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Invalid {
                field: "server.port",
                message: format!("not a port number: {port}"),
            })?;
        }
        if lookup("STUB_MODE").is_some_and(|value| is_truthy(&value)) {
            self.model.provider = ModelProvider::Stub;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.model.base_url = url;
        }
        if let Some(name) = lookup("OLLAMA_MODEL") {
            self.model.name = name;
        }
        if let Some(name) = lookup("OLLAMA_EMBED_MODEL") {
            self.embedding.model = name;
        }
        if let Some(url) = lookup("MCP_URL") {
            self.tools.endpoint = Some(url).filter(|value| !value.trim().is_empty());
        }
        if let Some(dir) = lookup("KNOWLEDGE_DIR") {
            self.knowledge.dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.top_k == 0 {
            return Err(invalid("retrieval.top_k", "must be at least 1"));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(invalid("retrieval.min_similarity", "must be within [-1, 1]"));
        }
        if self.tools.max_rounds == 0 {
            return Err(invalid("tools.max_rounds", "must be at least 1"));
        }
        let timeouts = [
            ("model.timeout_secs", self.model.timeout_secs),
            ("embedding.timeout_secs", self.embedding.timeout_secs),
            ("retrieval.timeout_secs", self.retrieval.timeout_secs),
            ("tools.call_timeout_secs", self.tools.call_timeout_secs),
            ("analysis.store_timeout_secs", self.analysis.store_timeout_secs),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        let budget = self.attempt_budget();
        if self.analysis.pending_stale_after() <= budget {
            return Err(ConfigError::Invalid {
                field: "analysis.pending_stale_after_secs",
                message: format!(
                    "must exceed the longest possible attempt ({}s)",
                    budget.as_secs()
                ),
            });
        }
        if self.knowledge.chunk_words == 0 {
            return Err(invalid("knowledge.chunk_words", "must be at least 1"));
        }
        if self.knowledge.overlap_words >= self.knowledge.chunk_words {
            return Err(invalid(
                "knowledge.overlap_words",
                "must be smaller than knowledge.chunk_words",
            ));
        }
        Ok(())
    }

    /// Worst case wall time between claiming a pending row and finishing it:
    /// every model turn timing out after all retries, every tool round timing
    /// out, retrieval, and every store write retried.
    pub fn attempt_budget(&self) -> Duration {
        let model = &self.model;
        let per_turn = model
            .timeout()
            .saturating_mul(model.max_retries.saturating_add(1))
            .saturating_add(doubling_delays(model.retry_backoff(), model.max_retries));
        let turns = self.tools.max_rounds.saturating_add(1);
        let tool_rounds = self
            .tools
            .call_timeout()
            .saturating_mul(self.tools.max_rounds.saturating_add(1));
        let store = self
            .analysis
            .store_timeout()
            .saturating_mul(FINISH_ATTEMPTS + 1)
            .saturating_add(doubling_delays(model.retry_backoff(), FINISH_ATTEMPTS - 1));

        per_turn
            .saturating_mul(turns)
            .saturating_add(tool_rounds)
            .saturating_add(self.retrieval.timeout())
            .saturating_add(store)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.to_string(),
    }
}

/// Total sleep of `retries` delays starting at `base` and doubling.
fn doubling_delays(base: Duration, retries: u32) -> Duration {
    let factor = 1u32.checked_shl(retries.min(31)).unwrap_or(u32::MAX);
    base.saturating_mul(factor.saturating_sub(1))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
