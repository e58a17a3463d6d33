//! Shared JSON wire helpers
//!
//! Both adapters speak a variant of the OpenAI chat schema. They differ in how
//! tool-call arguments travel (encoded text vs. an object) and in which field
//! correlates a tool result; the latter is decided when the result is
//! formatted, so replay here just writes back whatever each entry carries.

use cloud_agent_core::{
    AgentError, Message, Result, Role, ToolArguments, ToolCall, ToolDescriptor,
};
use reqwest::RequestBuilder;
use serde_json::{Map, Value, json};

/// How tool-call arguments are written in outgoing requests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArgumentEncoding {
    /// JSON-encoded string (OpenAI, Groq)
    Text,
    /// Inline object (Ollama)
    Object,
}

/// Render descriptors as function tools
pub(crate) fn tools_to_wire(tools: &[ToolDescriptor]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema(),
                    "strict": true,
                }
            })
        })
        .collect()
}

/// Render the conversation log for a request
pub(crate) fn messages_to_wire(messages: &[Message], encoding: ArgumentEncoding) -> Vec<Value> {
    messages
        .iter()
        .map(|message| message_to_wire(message, encoding))
        .collect()
}

fn message_to_wire(message: &Message, encoding: ArgumentEncoding) -> Value {
    let mut converted = Map::new();
    converted.insert("role".into(), json!(message.role));

    let content = if message.content.is_empty()
        && message.has_tool_calls()
        && encoding == ArgumentEncoding::Text
    {
        Value::Null
    } else {
        json!(message.content)
    };
    converted.insert("content".into(), content);

    if message.has_tool_calls() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|call| tool_call_to_wire(call, encoding))
            .collect();
        converted.insert("tool_calls".into(), Value::Array(calls));
    }

    if message.role == Role::Tool {
        if let Some(id) = &message.tool_call_id {
            converted.insert("tool_call_id".into(), json!(id));
        }
        if let Some(name) = &message.tool_name {
            converted.insert("tool_name".into(), json!(name));
        }
    }

    Value::Object(converted)
}

fn tool_call_to_wire(call: &ToolCall, encoding: ArgumentEncoding) -> Value {
    let arguments = match encoding {
        ArgumentEncoding::Text => Value::String(call.arguments.to_encoded()),
        ArgumentEncoding::Object => call
            .arguments
            .decode()
            .unwrap_or_else(|_| Value::String(call.arguments.to_encoded())),
    };

    let mut rendered = json!({
        "type": "function",
        "function": {
            "name": call.name,
            "arguments": arguments,
        }
    });
    if let Some(id) = &call.id {
        rendered["id"] = json!(id);
    }
    rendered
}

/// Normalize a reply message object
///
/// # Errors
///
/// `Parse` when the value is not an object or a tool call has no name.
pub(crate) fn response_to_message(reply: &Value) -> Result<Message> {
    if !reply.is_object() {
        return Err(AgentError::Parse(format!("expected a message object, got {reply}")));
    }

    let content = reply
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let tool_calls = match reply.get("tool_calls").and_then(Value::as_array) {
        Some(calls) => calls.iter().map(parse_tool_call).collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(Message::assistant(content).with_tool_calls(tool_calls))
}

fn parse_tool_call(value: &Value) -> Result<ToolCall> {
    let function = &value["function"];
    let name = function["name"]
        .as_str()
        .ok_or_else(|| AgentError::Parse(format!("tool call without a function name: {value}")))?;

    let arguments = ToolArguments::from_value(function.get("arguments").cloned().unwrap_or_default());
    let call = ToolCall::new(name, arguments);

    Ok(match value.get("id").and_then(Value::as_str) {
        Some(id) => call.with_id(id),
        None => call,
    })
}

/// Send a request and decode a JSON body
///
/// # Errors
///
/// `ProviderUnavailable` for connection failures and timeouts, `Provider` for
/// non-2xx statuses (status and body included), `Parse` for undecodable bodies.
pub(crate) async fn send_json(request: RequestBuilder) -> Result<Value> {
    let response = request.send().await.map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AgentError::Provider(format!("{status}: {body}")));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| AgentError::Parse(format!("invalid response body: {e}")))
}

pub(crate) fn transport_error(err: reqwest::Error) -> AgentError {
    if err.is_connect() || err.is_timeout() {
        AgentError::ProviderUnavailable(err.to_string())
    } else {
        AgentError::Provider(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloud_agent_core::ParameterSchema;

    #[test]
    fn test_tools_to_wire() {
        let descriptor = ToolDescriptor {
            name: "run_python_code".into(),
            description: "Run code".into(),
            parameters: vec![ParameterSchema::string("command", "Code").required()],
        };

        let rendered = tools_to_wire(&[descriptor]);
        assert_eq!(rendered[0]["type"], "function");
        assert_eq!(rendered[0]["function"]["name"], "run_python_code");
        assert_eq!(rendered[0]["function"]["strict"], true);
        assert_eq!(rendered[0]["function"]["parameters"]["required"], json!(["command"]));
    }

    #[test]
    fn test_bundled_tool_is_strict_compatible() {
        use crate::python::RunPythonCode;
        use cloud_agent_core::Tool;

        let rendered = tools_to_wire(&[RunPythonCode::default().descriptor()]);
        let function = &rendered[0]["function"];
        assert_eq!(function["strict"], true);

        let parameters = &function["parameters"];
        assert_eq!(parameters["additionalProperties"], false);

        // strict mode needs every property listed as required
        let mut properties: Vec<&str> = parameters["properties"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        let mut required: Vec<&str> = parameters["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        properties.sort_unstable();
        required.sort_unstable();
        assert_eq!(properties, required);

        assert_eq!(
            parameters["properties"]["modified_resource_name"]["type"],
            json!(["string", "null"])
        );
    }

    #[test]
    fn test_messages_to_wire_by_encoding() {
        let call = ToolCall::new(
            "run_python_code",
            ToolArguments::Raw(r#"{"command":"print(1)"}"#.into()),
        )
        .with_id("call_1");
        let messages = vec![
            Message::system("sys"),
            Message::assistant("").with_tool_calls(vec![call]),
            Message::tool("1").with_tool_call_id(Some("call_1".into())),
            Message::tool("2").with_tool_name("run_python_code"),
        ];

        let text = messages_to_wire(&messages, ArgumentEncoding::Text);
        assert_eq!(text[1]["content"], Value::Null);
        assert_eq!(text[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            text[1]["tool_calls"][0]["function"]["arguments"],
            r#"{"command":"print(1)"}"#
        );
        assert_eq!(text[2]["tool_call_id"], "call_1");
        assert!(text[2].get("tool_name").is_none());
        // entries keep the correlation field they were written with
        assert_eq!(text[3]["tool_name"], "run_python_code");
        assert!(text[3].get("tool_call_id").is_none());

        let object = messages_to_wire(&messages, ArgumentEncoding::Object);
        assert_eq!(object[1]["content"], "");
        assert_eq!(
            object[1]["tool_calls"][0]["function"]["arguments"],
            json!({"command": "print(1)"})
        );
        assert!(object[0].get("tool_calls").is_none());
    }

    #[test]
    fn test_response_to_message() {
        let reply = json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {"id": "call_1", "type": "function",
                 "function": {"name": "run_python_code", "arguments": "{\"command\":\"x\"}"}},
                {"function": {"name": "run_python_code", "arguments": {"command": "y"}}}
            ]
        });

        let message = response_to_message(&reply).unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "");
        assert_eq!(message.tool_calls.len(), 2);
        assert_eq!(message.tool_calls[0].id.as_deref(), Some("call_1"));
        assert!(matches!(message.tool_calls[0].arguments, ToolArguments::Raw(_)));
        assert!(message.tool_calls[1].id.is_none());
        assert!(matches!(message.tool_calls[1].arguments, ToolArguments::Structured(_)));
    }

    #[test]
    fn test_response_without_function_name() {
        let reply = json!({"role": "assistant", "tool_calls": [{"function": {}}]});
        assert!(matches!(response_to_message(&reply), Err(AgentError::Parse(_))));
        assert!(matches!(response_to_message(&Value::Null), Err(AgentError::Parse(_))));
    }
}
