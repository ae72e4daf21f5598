//! Checks tool arguments against the JSON schema subset the tools declare:
//! `type` (single or union, including `null`), `properties`, `required`,
//! `minimum`, `maximum` and `additionalProperties: false`.

use serde_json::{Map, Value};

pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), String> {
    validate_value(schema, arguments, "arguments")
}

/// Tool arguments sometimes arrive as a JSON-encoded string.
pub fn normalize_arguments(arguments: Value) -> Result<Value, String> {
    match arguments {
        Value::String(raw) if raw.trim().is_empty() => Ok(Value::Object(Map::new())),
        Value::String(raw) => {
            serde_json::from_str(&raw).map_err(|err| format!("arguments are not valid JSON: {err}"))
        }
        Value::Null => Ok(Value::Object(Map::new())),
        other => Ok(other),
    }
}

fn validate_value(schema: &Value, value: &Value, path: &str) -> Result<(), String> {
    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(single) => vec![single.as_str()],
            Value::Array(many) => many.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|name| matches_type(name, value)) {
            return Err(format!(
                "{path} must be {}, got {}",
                allowed.join(" or "),
                type_name(value)
            ));
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if number < min {
                return Err(format!("{path} must be >= {min}"));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if number > max {
                return Err(format!("{path} must be <= {max}"));
            }
        }
    }

    if let Value::Object(object) = value {
        validate_object(schema, object, path)?;
    }
    Ok(())
}

fn validate_object(schema: &Value, object: &Map<String, Value>, path: &str) -> Result<(), String> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(name) {
                return Err(format!("{path}.{name} is required"));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));
    for (name, value) in object {
        match properties.and_then(|props| props.get(name)) {
            Some(property) => validate_value(property, value, &format!("{path}.{name}"))?,
            None if closed => return Err(format!("{path}.{name} is not allowed")),
            None => {}
        }
    }
    Ok(())
}

fn matches_type(name: &str, value: &Value) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn telemetry_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "vessel_id": {"type": "string"},
                "sensor_name": {"type": "string"},
                "minutes_back": {"type": "integer", "minimum": 1, "maximum": 1440}
            },
            "required": ["vessel_id", "sensor_name"]
        })
    }

    #[test]
    fn accepts_valid_arguments() {
        let args = json!({"vessel_id": "vessel_001", "sensor_name": "engine_temp", "minutes_back": 30});
        assert!(validate_arguments(&telemetry_schema(), &args).is_ok());
    }

    #[test]
    fn reports_missing_required_field() {
        let err = validate_arguments(&telemetry_schema(), &json!({"vessel_id": "v"})).unwrap_err();
        assert_eq!(err, "arguments.sensor_name is required");
    }

    #[test]
    fn enforces_type_and_bounds() {
        let schema = telemetry_schema();
        let wrong_type = json!({"vessel_id": 1, "sensor_name": "s"});
        assert!(validate_arguments(&schema, &wrong_type).is_err());
        let too_far = json!({"vessel_id": "v", "sensor_name": "s", "minutes_back": 5000});
        assert_eq!(
            validate_arguments(&schema, &too_far).unwrap_err(),
            "arguments.minutes_back must be <= 1440"
        );
        let fractional = json!({"vessel_id": "v", "sensor_name": "s", "minutes_back": 2.5});
        assert!(validate_arguments(&schema, &fractional).is_err());
    }

    #[test]
    fn union_types_allow_null() {
        let schema = json!({
            "type": "object",
            "properties": {"vessel_id": {"type": ["string", "null"]}}
        });
        assert!(validate_arguments(&schema, &json!({"vessel_id": null})).is_ok());
        assert!(validate_arguments(&schema, &json!({"vessel_id": true})).is_err());
    }

    #[test]
    fn normalizes_string_arguments() {
        assert_eq!(
            normalize_arguments(json!("{\"event_id\": 4}")).unwrap(),
            json!({"event_id": 4})
        );
        assert_eq!(normalize_arguments(Value::Null).unwrap(), json!({}));
        assert!(normalize_arguments(json!("{not json")).is_err());
    }
}
