//! The declared read-only data tools and their argument types.

use bosun_core::types::{Analysis, Event, EventId, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const GET_TELEMETRY: &str = "get_telemetry";
pub const GET_EVENTS: &str = "get_events";
pub const GET_ANALYSIS: &str = "get_analysis";

pub const DEFAULT_MINUTES_BACK: u32 = 60;
pub const MAX_MINUTES_BACK: u32 = 1440;
pub const EVENTS_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    GetTelemetry,
    GetEvents,
    GetAnalysis,
}

impl ToolName {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            GET_TELEMETRY => Some(Self::GetTelemetry),
            GET_EVENTS => Some(Self::GetEvents),
            GET_ANALYSIS => Some(Self::GetAnalysis),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetTelemetry => GET_TELEMETRY,
            Self::GetEvents => GET_EVENTS,
            Self::GetAnalysis => GET_ANALYSIS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GetTelemetryArgs {
    pub vessel_id: String,
    pub sensor_name: String,
    #[serde(default = "default_minutes_back")]
    pub minutes_back: u32,
}

fn default_minutes_back() -> u32 {
    DEFAULT_MINUTES_BACK
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GetEventsArgs {
    #[serde(default)]
    pub vessel_id: Option<String>,
    #[serde(default)]
    pub acknowledged: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GetAnalysisArgs {
    pub event_id: EventId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventsOutput {
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutput {
    pub event_id: EventId,
    pub analysis: Option<Analysis>,
}

pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: GET_TELEMETRY.to_string(),
            description: "Fetch recent telemetry readings for a vessel sensor.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "vessel_id": {
                        "type": "string",
                        "description": "Vessel identifier, e.g. vessel_001"
                    },
                    "sensor_name": {
                        "type": "string",
                        "description": "Telemetry sensor name, e.g. engine_temp"
                    },
                    "minutes_back": {
                        "type": "integer",
                        "description": "How many minutes to look back",
                        "default": DEFAULT_MINUTES_BACK,
                        "minimum": 1,
                        "maximum": MAX_MINUTES_BACK
                    }
                },
                "required": ["vessel_id", "sensor_name"]
            }),
        },
        ToolSpec {
            name: GET_EVENTS.to_string(),
            description: "Fetch recent anomaly events, newest first.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "vessel_id": {
                        "type": ["string", "null"],
                        "description": "Optional vessel filter"
                    },
                    "acknowledged": {
                        "type": ["boolean", "null"],
                        "description": "Optional acknowledgement filter"
                    }
                }
            }),
        },
        ToolSpec {
            name: GET_ANALYSIS.to_string(),
            description: "Fetch the latest AI analysis for an event.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "event_id": {
                        "type": "integer",
                        "description": "Event id",
                        "minimum": 1
                    }
                },
                "required": ["event_id"]
            }),
        },
    ]
}

pub fn spec_for(name: ToolName) -> Option<ToolSpec> {
    tool_specs()
        .into_iter()
        .find(|spec| spec.name == name.as_str())
}
