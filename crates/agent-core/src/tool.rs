//! Tool System
//!
//! Tool descriptors shared with the backend, the calls it sends back, and the
//! dispatcher that routes a call to its handler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Arguments of a tool call as the backend delivered them
///
/// OpenAI-style backends send a JSON-encoded string, Ollama sends an object.
/// Decoding is left to the agent loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    /// Already-structured mapping
    Structured(Map<String, Value>),

    /// Encoded text still to be parsed
    Raw(String),
}

impl ToolArguments {
    /// Classify an arbitrary JSON value from a backend response
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Structured(map),
            Value::String(raw) => Self::Raw(raw),
            Value::Null => Self::Structured(Map::new()),
            other => Self::Raw(other.to_string()),
        }
    }

    /// Decode into a JSON value
    ///
    /// # Errors
    ///
    /// Returns the parse error when raw text is not valid JSON.
    pub fn decode(&self) -> std::result::Result<Value, serde_json::Error> {
        match self {
            Self::Structured(map) => Ok(Value::Object(map.clone())),
            Self::Raw(raw) => serde_json::from_str(raw),
        }
    }

    /// Encoded text form, as OpenAI-style backends expect it
    pub fn to_encoded(&self) -> String {
        match self {
            Self::Structured(map) => Value::Object(map.clone()).to_string(),
            Self::Raw(raw) => raw.clone(),
        }
    }
}

impl Default for ToolArguments {
    fn default() -> Self {
        Self::Structured(Map::new())
    }
}

/// Tool call requested by the backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Backend-assigned identifier (absent for backends that correlate by name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Tool identifier
    pub name: String,

    /// Arguments as delivered
    #[serde(default)]
    pub arguments: ToolArguments,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Backend-agnostic outcome of one tool call
///
/// Translated into a backend's wire shape by `LlmProvider::format_tool_result`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Text returned by the handler
    pub result: String,

    /// Identifier of the originating call, if the backend assigned one
    pub tool_call_id: Option<String>,

    /// Name of the tool that produced the result
    pub tool_name: String,
}

impl ToolCallResult {
    pub fn new(
        result: impl Into<String>,
        tool_call_id: Option<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            result: result.into(),
            tool_call_id,
            tool_name: tool_name.into(),
        }
    }

    /// Result for the given call
    pub fn for_call(call: &ToolCall, result: impl Into<String>) -> Self {
        Self::new(result, call.id.clone(), call.name.clone())
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: "string".into(),
            description: description.into(),
            required: false,
            enum_values: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(|v| Value::String(v.into())).collect());
        self
    }

    /// Check a present, non-null value against the declared type and values
    ///
    /// String values are compared to the allowed set ignoring case and
    /// surrounding whitespace.
    ///
    /// # Errors
    ///
    /// `ToolValidation` naming the parameter.
    pub fn check(&self, value: &Value) -> Result<()> {
        let type_matches = match self.param_type.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        };
        if !type_matches {
            return Err(AgentError::ToolValidation(format!(
                "Parameter '{}' must be of type {}, got {value}",
                self.name, self.param_type
            )));
        }

        if let Some(allowed) = &self.enum_values {
            let permitted = allowed.iter().any(|candidate| match (candidate, value) {
                (Value::String(expected), Value::String(actual)) => {
                    actual.trim().eq_ignore_ascii_case(expected)
                }
                _ => candidate == value,
            });
            if !permitted {
                return Err(AgentError::ToolValidation(format!(
                    "Parameter '{}' must be one of {}, got {value}",
                    self.name,
                    Value::Array(allowed.clone())
                )));
            }
        }

        Ok(())
    }
}

/// Declarative tool description shared with the backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolDescriptor {
    /// JSON Schema object describing the parameters
    ///
    /// Every property is listed in `required`. Optional parameters accept
    /// `null` instead of being omitted, the form strict function calling
    /// expects.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let json_type = if param.required {
                json!(param.param_type)
            } else {
                json!([param.param_type, "null"])
            };
            let mut property = json!({
                "type": json_type,
                "description": param.description,
            });
            if let Some(values) = &param.enum_values {
                let mut values = values.clone();
                if !param.required {
                    values.push(Value::Null);
                }
                property["enum"] = Value::Array(values);
            }
            properties.insert(param.name.clone(), property);
        }

        let required: Vec<&str> = self.parameters.iter().map(|p| p.name.as_str()).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Check an argument value against the declared parameters
    ///
    /// # Errors
    ///
    /// Returns `ToolValidation` when the value is not an object, a required
    /// parameter is missing or null, or a present parameter has the wrong type
    /// or a value outside its allowed set.
    pub fn validate(&self, args: &Value) -> Result<()> {
        let Some(map) = args.as_object() else {
            return Err(AgentError::ToolValidation(format!(
                "arguments for '{}' must be a JSON object",
                self.name
            )));
        };

        for param in &self.parameters {
            match map.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) => param.check(value)?,
            }
        }

        Ok(())
    }
}

/// Tool handler
///
/// Handlers return text by contract. Failures inside the tool are reported
/// in that text; they are never raised to the dispatcher.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Descriptor advertised to the backend
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool with decoded arguments
    async fn call(&self, args: &Value) -> String;
}

/// Maps tool names to handlers
///
/// Built explicitly and handed to the agent, so independent agents can carry
/// different tool sets.
#[derive(Default, Clone)]
pub struct ToolDispatcher {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.descriptor().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replacing previously registered tool");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Look up a handler and validate arguments for it without running it
    ///
    /// # Errors
    ///
    /// `ToolNotFound` when no handler is registered under `name`;
    /// `ToolValidation` when the arguments do not match its descriptor.
    pub fn resolve(&self, name: &str, args: &Value) -> Result<Arc<dyn Tool>> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;

        tool.descriptor().validate(args)?;
        Ok(tool)
    }

    /// Look up and invoke a handler
    ///
    /// The handler's text is returned verbatim.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve`].
    pub async fn call(&self, name: &str, args: &Value) -> Result<String> {
        let tool = self.resolve(name, args)?;
        Ok(tool.call(args).await)
    }

    /// Descriptors of all registered tools, sorted by name
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<_> = self.tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("tools", &self.names())
            .finish()
    }
}
