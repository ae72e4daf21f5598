use crate::catalog::{
    AnalysisOutput, EVENTS_LIMIT, EventsOutput, GetAnalysisArgs, GetEventsArgs, GetTelemetryArgs,
    ToolName, spec_for, tool_specs,
};
use async_trait::async_trait;
use bosun_core::analyses::AnalysisRepository;
use bosun_core::error::{BosunError, ToolError};
use bosun_core::events::EventRepository;
use bosun_core::store::{Store, StoreProvider, with_store};
use bosun_core::telemetry::TelemetryRepository;
use bosun_core::tools::ToolRegistry;
use bosun_core::types::{EventFilter, TelemetryWindow, ToolCall, ToolResult, ToolSpec};
use bosun_core::validation::{normalize_arguments, validate_arguments};
use chrono::{TimeDelta, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Executes the declared tools directly against the store.
#[derive(Clone)]
pub struct DataTools<P: StoreProvider> {
    provider: P,
    store_timeout: Duration,
}

impl<P: StoreProvider> DataTools<P> {
    pub fn new(provider: P, store_timeout: Duration) -> Self {
        Self {
            provider,
            store_timeout,
        }
    }

    /// Validates `arguments` against the tool's schema and runs it.
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let Some(tool) = ToolName::parse(name) else {
            return Err(ToolError::UnknownTool {
                name: name.to_string(),
            });
        };
        let invalid = |message: String| ToolError::InvalidArguments {
            name: name.to_string(),
            message,
        };
        let arguments = normalize_arguments(arguments).map_err(invalid)?;
        if let Some(spec) = spec_for(tool) {
            validate_arguments(&spec.input_schema, &arguments).map_err(invalid)?;
        }
        debug!(tool = name, "executing data tool");

        match tool {
            ToolName::GetTelemetry => {
                let args: GetTelemetryArgs = parse_args(name, arguments)?;
                self.run(tool, move |store| {
                    let since = Utc::now() - TimeDelta::minutes(i64::from(args.minutes_back));
                    let readings =
                        store
                            .telemetry()
                            .window(&args.vessel_id, &args.sensor_name, since)?;
                    Ok(TelemetryWindow {
                        vessel_id: args.vessel_id,
                        sensor_name: args.sensor_name,
                        minutes_back: args.minutes_back,
                        readings,
                    })
                })
                .await
            }
            ToolName::GetEvents => {
                let args: GetEventsArgs = parse_args(name, arguments)?;
                self.run(tool, move |store| {
                    let events = store.events().list(&EventFilter {
                        vessel_id: args.vessel_id,
                        acknowledged: args.acknowledged,
                        limit: EVENTS_LIMIT,
                    })?;
                    Ok(EventsOutput { events })
                })
                .await
            }
            ToolName::GetAnalysis => {
                let args: GetAnalysisArgs = parse_args(name, arguments)?;
                self.run(tool, move |store| {
                    let analysis = store.analyses().latest_for_event(args.event_id)?;
                    Ok(AnalysisOutput {
                        event_id: args.event_id,
                        analysis,
                    })
                })
                .await
            }
        }
    }

    async fn run<F, T>(&self, tool: ToolName, f: F) -> Result<Value, ToolError>
    where
        F: FnOnce(&P::Store) -> Result<T, BosunError> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let execution = |message: String| ToolError::Execution {
            name: tool.as_str().to_string(),
            message,
        };
        let output = with_store(&self.provider, self.store_timeout, f)
            .await
            .map_err(|err| execution(err.to_string()))?;
        serde_json::to_value(output).map_err(|err| execution(err.to_string()))
    }
}

fn parse_args<T: DeserializeOwned>(name: &str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|err| ToolError::InvalidArguments {
        name: name.to_string(),
        message: err.to_string(),
    })
}

#[async_trait]
impl<P: StoreProvider> ToolRegistry for DataTools<P> {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        Ok(tool_specs())
    }

    async fn call(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.execute(&call.tool_name, call.arguments.clone()).await;
        ToolResult {
            tool_name: call.tool_name.clone(),
            outcome,
        }
    }
}
