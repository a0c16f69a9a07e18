//! Canonical-request validation owned by the OpenAI-family adapters (spec
//! §4.2 "OpenAI-family"): tool-call message ordering, tool schema shape,
//! and `tool_choice` shape. Anthropic/Gemini/Bedrock/Vertex translate tool
//! calls themselves and don't go through this path.

use std::collections::HashSet;

use forge_protocol::openai::chat_completions::request::CreateChatCompletionRequestBody;
use forge_protocol::openai::chat_completions::types::{
    ChatCompletionRequestMessage, ChatCompletionToolChoiceOption, ChatCompletionToolDefinition,
};
use forge_provider_core::{ProviderError, ProviderResult};

/// Runs every check this module owns against one request body.
pub fn validate_chat_request(body: &CreateChatCompletionRequestBody) -> ProviderResult<()> {
    validate_tool_message_ordering(&body.messages)?;
    if let Some(tools) = &body.tools {
        validate_tool_definitions(tools)?;
    }
    if let Some(tool_choice) = &body.tool_choice {
        validate_tool_choice(tool_choice, body.tools.as_deref())?;
    }
    Ok(())
}

/// Every `tool` message must be preceded, after skipping non-assistant
/// messages, by an assistant message carrying `tool_calls` (spec §8: "tool
/// role with no preceding assistant.tool_calls -> invalid_request").
fn validate_tool_message_ordering(messages: &[ChatCompletionRequestMessage]) -> ProviderResult<()> {
    let mut last_assistant_had_tool_calls = false;
    for message in messages {
        match message {
            ChatCompletionRequestMessage::Assistant(assistant) => {
                last_assistant_had_tool_calls = assistant
                    .tool_calls
                    .as_ref()
                    .is_some_and(|calls| !calls.is_empty());
            }
            ChatCompletionRequestMessage::Tool(_) => {
                if !last_assistant_had_tool_calls {
                    return Err(ProviderError::InvalidRequest(
                        "tool message has no preceding assistant message with tool_calls"
                            .to_string(),
                    ));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_tool_definitions(tools: &[ChatCompletionToolDefinition]) -> ProviderResult<()> {
    for tool in tools {
        let ChatCompletionToolDefinition::Function { function } = tool else {
            continue;
        };
        if function.name.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "tool function.name must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// A named `tool_choice` must reference a tool that's actually declared in
/// `tools`.
fn validate_tool_choice(
    tool_choice: &ChatCompletionToolChoiceOption,
    tools: Option<&[ChatCompletionToolDefinition]>,
) -> ProviderResult<()> {
    let ChatCompletionToolChoiceOption::NamedTool(named) = tool_choice else {
        return Ok(());
    };
    let declared: HashSet<&str> = tools
        .unwrap_or_default()
        .iter()
        .filter_map(|tool| match tool {
            ChatCompletionToolDefinition::Function { function } => Some(function.name.as_str()),
            ChatCompletionToolDefinition::Custom { .. } => None,
        })
        .collect();
    if !declared.contains(named.function.name.as_str()) {
        return Err(ProviderError::InvalidRequest(format!(
            "tool_choice names function '{}' which is not declared in tools",
            named.function.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_protocol::openai::chat_completions::types::{
        ChatCompletionMessageToolCall, ChatCompletionNamedToolChoice,
        ChatCompletionNamedToolChoiceFunction, ChatCompletionNamedToolChoiceType,
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestToolMessage,
        ChatCompletionTextContent, FunctionObject,
    };

    fn tool_call(id: &str, name: &str) -> ChatCompletionMessageToolCall {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "type": "function",
            "function": { "name": name, "arguments": "{}" },
        }))
        .unwrap()
    }

    #[test]
    fn tool_message_without_preceding_assistant_tool_calls_is_invalid() {
        let messages = vec![ChatCompletionRequestMessage::Tool(
            ChatCompletionRequestToolMessage {
                content: ChatCompletionTextContent::Text("4".to_string()),
                tool_call_id: "call_1".to_string(),
            },
        )];
        let err = validate_tool_message_ordering(&messages).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[test]
    fn tool_message_after_assistant_tool_calls_is_valid() {
        let messages = vec![
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: None,
                refusal: None,
                name: None,
                audio: None,
                tool_calls: Some(vec![tool_call("call_1", "get_weather")]),
                function_call: None,
            }),
            ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                content: ChatCompletionTextContent::Text("72F".to_string()),
                tool_call_id: "call_1".to_string(),
            }),
        ];
        assert!(validate_tool_message_ordering(&messages).is_ok());
    }

    #[test]
    fn empty_tool_function_name_is_rejected() {
        let tools = vec![ChatCompletionToolDefinition::Function {
            function: FunctionObject {
                name: String::new(),
                description: None,
                parameters: None,
                strict: None,
            },
        }];
        assert!(validate_tool_definitions(&tools).is_err());
    }

    #[test]
    fn tool_choice_naming_an_undeclared_function_is_rejected() {
        let choice = ChatCompletionToolChoiceOption::NamedTool(ChatCompletionNamedToolChoice {
            r#type: ChatCompletionNamedToolChoiceType::Function,
            function: ChatCompletionNamedToolChoiceFunction {
                name: "get_weather".to_string(),
            },
        });
        let err = validate_tool_choice(&choice, None).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }
}
