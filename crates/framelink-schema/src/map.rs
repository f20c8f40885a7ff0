use std::collections::HashMap;
use std::fmt;

use jsonschema::Validator;
use serde_json::{Map, Value};

use crate::config::SchemaConfig;
use crate::error::{Result, SchemaError};
use crate::validator::validate_value;

/// Event-name-keyed registry of compiled JSON Schema validators.
///
/// One map declares what a side accepts (inbound), another what it may emit
/// (outbound). Lookup failures are errors here; the caller decides whether
/// that means "drop the message" or "refuse to send".
pub struct EventSchemas {
    validators: HashMap<String, Validator>,
    config: SchemaConfig,
}

impl EventSchemas {
    /// Create an empty map with default config.
    pub fn new() -> Self {
        Self::with_config(SchemaConfig::default())
    }

    /// Create an empty map with explicit config.
    pub fn with_config(config: SchemaConfig) -> Self {
        Self {
            validators: HashMap::new(),
            config,
        }
    }

    /// Register a schema for an event from a JSON string.
    pub fn register(&mut self, event: &str, schema_json: &str) -> Result<()> {
        let schema: Value =
            serde_json::from_str(schema_json).map_err(|err| SchemaError::CompileFailed {
                event: event.to_string(),
                message: err.to_string(),
            })?;
        self.register_value(event, &schema)
    }

    /// Register a schema for an event from a JSON value.
    pub fn register_value(&mut self, event: &str, schema: &Value) -> Result<()> {
        let mut schema_to_compile = schema.clone();
        if self.config.strict_mode {
            apply_strict_mode(&mut schema_to_compile);
        }

        let compiled = jsonschema::validator_for(&schema_to_compile).map_err(|err| {
            SchemaError::CompileFailed {
                event: event.to_string(),
                message: err.to_string(),
            }
        })?;

        self.validators.insert(event.to_string(), compiled);
        Ok(())
    }

    /// Build a map from `(event, schema_json)` pairs.
    pub fn from_entries(entries: &[(&str, &str)]) -> Result<Self> {
        let mut map = Self::new();
        for (event, schema) in entries {
            map.register(event, schema)?;
        }
        Ok(map)
    }

    /// Validate event data against its registered schema.
    pub fn validate(&self, event: &str, data: &Value) -> Result<()> {
        match self.validators.get(event) {
            Some(validator) => validate_value(event, data, validator),
            None => Err(SchemaError::UnknownEvent(event.to_string())),
        }
    }

    /// Check if an event has a registered schema.
    pub fn contains(&self, event: &str) -> bool {
        self.validators.contains_key(event)
    }

    /// Registered event names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.validators.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }
}

impl Default for EventSchemas {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventSchemas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSchemas")
            .field("events", &self.names())
            .field("config", &self.config)
            .finish()
    }
}

fn apply_strict_mode(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }

            for key in ["properties", "patternProperties", "$defs", "definitions"] {
                if let Some(Value::Object(children)) = map.get_mut(key) {
                    for child in children.values_mut() {
                        apply_strict_mode(child);
                    }
                }
            }
            for key in ["items", "not", "if", "then", "else", "additionalProperties"] {
                if let Some(child) = map.get_mut(key) {
                    apply_strict_mode(child);
                }
            }
            for key in ["prefixItems", "allOf", "anyOf", "oneOf"] {
                if let Some(Value::Array(children)) = map.get_mut(key) {
                    for child in children {
                        apply_strict_mode(child);
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                apply_strict_mode(item);
            }
        }
        _ => {}
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds
            .iter()
            .any(|kind| matches!(kind, Value::String(kind) if kind == "object")),
        _ => ["properties", "patternProperties", "required", "propertyNames"]
            .iter()
            .any(|keyword| map.contains_key(*keyword)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const QUESTION_SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "question": { "type": "string" }
        },
        "required": ["question"]
    }"#;

    #[test]
    fn register_and_validate() {
        let mut schemas = EventSchemas::new();
        schemas.register("askQuestion", QUESTION_SCHEMA).unwrap();

        assert!(schemas
            .validate("askQuestion", &json!({"question": "hi"}))
            .is_ok());
        assert!(matches!(
            schemas.validate("askQuestion", &json!({"question": 7})),
            Err(SchemaError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn unknown_event_is_an_error() {
        let schemas = EventSchemas::new();
        assert!(matches!(
            schemas.validate("missing", &json!({})),
            Err(SchemaError::UnknownEvent(name)) if name == "missing"
        ));
    }

    #[test]
    fn events_validate_independently() {
        let schemas = EventSchemas::from_entries(&[
            ("count", r#"{"type":"object","properties":{"n":{"type":"integer"}},"required":["n"]}"#),
            ("label", r#"{"type":"object","properties":{"s":{"type":"string"}},"required":["s"]}"#),
        ])
        .unwrap();

        assert!(schemas.validate("count", &json!({"n": 3})).is_ok());
        assert!(schemas.validate("label", &json!({"s": "ok"})).is_ok());
        assert!(schemas.validate("count", &json!({"s": "ok"})).is_err());
        assert!(schemas.validate("label", &json!({"n": 3})).is_err());
    }

    #[test]
    fn invalid_schema_fails_compile() {
        let mut schemas = EventSchemas::new();
        assert!(matches!(
            schemas.register("broken", r#"{"type":"definitely-not-a-type"}"#),
            Err(SchemaError::CompileFailed { .. })
        ));
        assert!(matches!(
            schemas.register("not-json", "{"),
            Err(SchemaError::CompileFailed { .. })
        ));
    }

    #[test]
    fn strict_mode_rejects_undeclared_properties() {
        let mut permissive = EventSchemas::new();
        permissive.register("ask", QUESTION_SCHEMA).unwrap();

        let mut strict = EventSchemas::with_config(SchemaConfig { strict_mode: true });
        strict.register("ask", QUESTION_SCHEMA).unwrap();

        let payload = json!({"question": "hi", "extra": true});
        assert!(permissive.validate("ask", &payload).is_ok());
        assert!(matches!(
            strict.validate("ask", &payload),
            Err(SchemaError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn strict_mode_applies_to_nested_objects() {
        let schema = r#"{
            "type": "object",
            "properties": {
                "nested": {
                    "type": "object",
                    "properties": { "v": { "type": "integer" } },
                    "required": ["v"]
                }
            },
            "required": ["nested"]
        }"#;

        let mut strict = EventSchemas::with_config(SchemaConfig { strict_mode: true });
        strict.register("deep", schema).unwrap();

        assert!(strict.validate("deep", &json!({"nested": {"v": 1}})).is_ok());
        assert!(strict
            .validate("deep", &json!({"nested": {"v": 1, "extra": true}}))
            .is_err());
    }

    #[test]
    fn validation_message_names_the_event() {
        let mut schemas = EventSchemas::new();
        schemas.register("ask", QUESTION_SCHEMA).unwrap();

        let err = schemas.validate("ask", &json!([])).unwrap_err();
        assert!(err.to_string().contains("\"ask\""));
    }

    #[test]
    fn names_are_sorted() {
        let schemas = EventSchemas::from_entries(&[
            ("zeta", r#"{"type":"object"}"#),
            ("alpha", r#"{"type":"object"}"#),
        ])
        .unwrap();
        assert_eq!(schemas.names(), vec!["alpha", "zeta"]);
        assert!(schemas.contains("alpha"));
        assert_eq!(schemas.len(), 2);
    }
}
