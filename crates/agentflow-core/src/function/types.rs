//! Function schema, call and result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::FunctionError;

// ============================================================================
// Argument values
// ============================================================================

/// A single argument value.
///
/// Arguments arrive as JSON from the model; they are converted once into this
/// closed set of shapes so validation and extension code never deal with an
/// open-ended `Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ArgValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<ArgValue>),
    Object(BTreeMap<String, ArgValue>),
}

impl ArgValue {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 => {
                Some(*v as i64)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert back to a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(v) => Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(ArgValue::to_json).collect()),
            Self::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(ArgValue::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Parsed arguments of a function call, keyed by parameter name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(BTreeMap<String, ArgValue>);

static EMPTY_ARGUMENTS: Arguments = Arguments(BTreeMap::new());

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a serialized argument payload.
    ///
    /// An empty payload is an empty argument set; anything else must be a
    /// JSON object.
    pub fn parse(function: &str, payload: &str) -> Result<Self, FunctionError> {
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let malformed = |reason: String| FunctionError::MalformedArguments {
            function: function.to_string(),
            reason,
        };

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => Ok(Self(
                map.into_iter().map(|(k, v)| (k, ArgValue::from(v))).collect(),
            )),
            Ok(other) => Err(malformed(format!(
                "expected a JSON object, got {}",
                ArgValue::from(other).type_name()
            ))),
            Err(e) => Err(malformed(e.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    /// A present, non-null value.
    pub fn has(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|v| !v.is_null())
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ArgValue::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ArgValue::as_f64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ArgValue::as_bool)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ArgValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

// ============================================================================
// Schema
// ============================================================================

/// Declared type of a function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether a supplied value fits this type. Integers are valid numbers.
    pub fn accepts(&self, value: &ArgValue) -> bool {
        match (self, value) {
            (_, ArgValue::Null) => true,
            (Self::String, ArgValue::String(_)) => true,
            (Self::Integer, v) => v.as_i64().is_some(),
            (Self::Number, ArgValue::Integer(_) | ArgValue::Float(_)) => true,
            (Self::Boolean, ArgValue::Bool(_)) => true,
            (Self::Array, ArgValue::Array(_)) => true,
            (Self::Object, ArgValue::Object(_)) => true,
            _ => false,
        }
    }
}

/// A named parameter in a function's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub param_type: ParameterType,
    #[serde(default)]
    pub required: bool,
    /// Allowed values; empty means unrestricted.
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ArgValue>,
}

impl ParameterDefinition {
    pub fn new(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            param_type,
            required: false,
            enum_values: Vec::new(),
            default_value: None,
        }
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<ArgValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// A callable function exposed by an extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
    /// Name of the owning extension. Filled in by the registry.
    #[serde(default)]
    pub extension: String,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            extension: String::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterDefinition) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.parameters.iter().filter(|p| p.required)
    }

    /// JSON-schema rendering used when handing functions to a model.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for param in &self.parameters {
            let mut prop = serde_json::Map::new();
            prop.insert("type".into(), Value::from(param.param_type.as_str()));
            if !param.description.is_empty() {
                prop.insert("description".into(), Value::from(param.description.clone()));
            }
            if !param.enum_values.is_empty() {
                prop.insert("enum".into(), Value::from(param.enum_values.clone()));
            }
            if let Some(default) = &param.default_value {
                prop.insert("default".into(), default.to_json());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }

        let required: Vec<Value> = self
            .required_parameters()
            .map(|p| Value::from(p.name.clone()))
            .collect();

        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}

// ============================================================================
// Calls and results
// ============================================================================

static CALL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifier of one dispatched call, unique for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Generate the next identifier: `call-<unix millis>-<counter>`.
    pub fn generate() -> Self {
        let seq = CALL_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!(
            "call-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            seq
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request to invoke a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Provider-assigned identifier, if the model supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Serialized argument payload as produced by the model.
    #[serde(default)]
    pub arguments: String,
    /// Populated by validation.
    #[serde(skip)]
    pub parsed: Option<Arguments>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments: arguments.into(),
            parsed: None,
        }
    }

    /// Build a call from a JSON argument value.
    pub fn from_json(name: impl Into<String>, arguments: &Value) -> Self {
        Self::new(name, arguments.to_string())
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Parsed arguments, or an empty set before validation.
    pub fn args(&self) -> &Arguments {
        self.parsed.as_ref().unwrap_or(&EMPTY_ARGUMENTS)
    }
}

/// Render a numeric function payload. Whole numbers print without a
/// fractional part, so `add(5, 3)` is `"8"`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Outcome of one function call. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
    pub function_name: String,
    pub extension_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FunctionError>,
    #[serde(default)]
    pub duration_ms: u64,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}

impl FunctionResult {
    pub fn success(
        function_name: impl Into<String>,
        extension_name: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            call_id: None,
            function_name: function_name.into(),
            extension_name: extension_name.into(),
            success: true,
            result: Some(payload.into()),
            error: None,
            duration_ms: 0,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn failure(
        function_name: impl Into<String>,
        extension_name: impl Into<String>,
        error: FunctionError,
    ) -> Self {
        Self {
            call_id: None,
            function_name: function_name.into(),
            extension_name: extension_name.into(),
            success: false,
            result: None,
            error: Some(error),
            duration_ms: 0,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_call_id(mut self, call_id: CallId) -> Self {
        self.call_id = Some(call_id);
        self
    }

    pub fn with_duration(mut self, duration: std::time::Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Text handed back to a model: the payload, or the error message.
    pub fn content(&self) -> String {
        match (&self.result, &self.error) {
            (Some(payload), _) => payload.clone(),
            (None, Some(err)) => format!("Error: {}", err),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let args = Arguments::parse("add", r#"{"a":5,"b":3.5,"op":"sum"}"#).unwrap();
        assert_eq!(args.get_i64("a"), Some(5));
        assert_eq!(args.get_f64("b"), Some(3.5));
        assert_eq!(args.get_str("op"), Some("sum"));
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_parse_empty_payload() {
        let args = Arguments::parse("now", "  ").unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = Arguments::parse("add", "[1,2]").unwrap_err();
        assert!(matches!(err, FunctionError::MalformedArguments { .. }));

        let err = Arguments::parse("add", "{\"a\":").unwrap_err();
        assert!(matches!(err, FunctionError::MalformedArguments { .. }));
    }

    #[test]
    fn test_parameter_type_accepts() {
        assert!(ParameterType::Number.accepts(&ArgValue::Integer(3)));
        assert!(ParameterType::Integer.accepts(&ArgValue::Float(4.0)));
        assert!(!ParameterType::Integer.accepts(&ArgValue::Float(4.5)));
        assert!(!ParameterType::String.accepts(&ArgValue::Bool(true)));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(8.0), "8");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }

    #[test]
    fn test_out_of_range_float_is_not_an_integer() {
        assert_eq!(ArgValue::Float(1e30).as_i64(), None);
        assert_eq!(ArgValue::Float(-1e30).as_i64(), None);
        assert_eq!(ArgValue::Float(i64::MAX as f64).as_i64(), None);
        assert!(!ParameterType::Integer.accepts(&ArgValue::Float(1e30)));
        assert!(ParameterType::Number.accepts(&ArgValue::Float(1e30)));
        assert_eq!(ArgValue::Float(-9007199254740992.0).as_i64(), Some(-9007199254740992));
    }

    #[test]
    fn test_json_schema() {
        let def = FunctionDefinition::new("get_weather", "Current weather")
            .with_parameter(
                ParameterDefinition::new("city", ParameterType::String, "City name").required(),
            )
            .with_parameter(
                ParameterDefinition::new("unit", ParameterType::String, "Unit")
                    .with_enum(["celsius", "fahrenheit"])
                    .with_default("celsius"),
            );

        let schema = def.to_json_schema();
        assert_eq!(schema["name"], "get_weather");
        assert_eq!(schema["parameters"]["required"][0], "city");
        assert_eq!(schema["parameters"]["properties"]["unit"]["enum"][1], "fahrenheit");
        assert_eq!(schema["parameters"]["properties"]["unit"]["default"], "celsius");
    }

    #[test]
    fn test_call_ids_are_unique() {
        let a = CallId::generate();
        let b = CallId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("call-"));
    }

    #[test]
    fn test_result_content() {
        let ok = FunctionResult::success("add", "calculator", "8");
        assert_eq!(ok.content(), "8");

        let failed = FunctionResult::failure(
            "ghost",
            "",
            FunctionError::NoExtensionForFunction {
                function: "ghost".to_string(),
            },
        );
        assert!(failed.content().starts_with("Error:"));
        assert!(!failed.success);
    }
}
