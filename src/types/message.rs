//! Message types for chat conversations

use std::str::FromStr;

use super::tool::ToolCall;
use crate::MuninnError;
use serde::{Deserialize, Serialize};

/// Role of a message participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool { tool_call_id: String },
}

impl Role {
    pub fn is_system(&self) -> bool {
        matches!(self, Role::System)
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, Role::Tool { .. })
    }
}

/// Parses the role names callers and vendors commonly use.
///
/// Tool results parse with an empty `tool_call_id`; use
/// [`Message::from_raw`] to attach one.
impl FromStr for Role {
    type Err = MuninnError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" | "developer" | "instruction" | "instructions" => Ok(Role::System),
            "user" | "human" => Ok(Role::User),
            "assistant" | "ai" | "model" | "bot" => Ok(Role::Assistant),
            "tool" | "function" | "tool_result" | "tool-result" => Ok(Role::Tool {
                tool_call_id: String::new(),
            }),
            other => Err(MuninnError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

/// Message content (extensible for future multimodal)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// Get the text content, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_text().is_none_or(|s| s.trim().is_empty())
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create an assistant message with tool calls
    pub fn assistant_with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.map(MessageContent::Text).unwrap_or_default(),
            tool_calls: Some(tool_calls),
            name: None,
        }
    }

    /// Create a tool result message
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_role(
            Role::Tool {
                tool_call_id: tool_call_id.into(),
            },
            content,
        )
    }

    /// Build a message from a caller's native role name.
    ///
    /// `tool_call_id` is only used when the role resolves to a tool result.
    pub fn from_raw(
        role: &str,
        content: impl Into<String>,
        tool_call_id: Option<String>,
    ) -> crate::Result<Self> {
        let role = match role.parse::<Role>()? {
            Role::Tool { .. } => Role::Tool {
                tool_call_id: tool_call_id.unwrap_or_default(),
            },
            other => other,
        };
        Ok(Self::with_role(role, content))
    }

    /// Text content, or `""` for non-text content.
    pub fn text(&self) -> &str {
        self.content.as_text().unwrap_or("")
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }

    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
            tool_calls: None,
            name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vendor_role_aliases() {
        assert_eq!("human".parse::<Role>().unwrap(), Role::User);
        assert_eq!("AI".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!("model".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!("developer".parse::<Role>().unwrap(), Role::System);
        assert!("tool-result".parse::<Role>().unwrap().is_tool());
        assert!("narrator".parse::<Role>().is_err());
    }

    #[test]
    fn from_raw_attaches_tool_call_id() {
        let msg = Message::from_raw("function", "42 rows", Some("call_1".into())).unwrap();
        assert_eq!(
            msg.role,
            Role::Tool {
                tool_call_id: "call_1".into()
            }
        );
        assert_eq!(msg.text(), "42 rows");
    }

    #[test]
    fn empty_content_detection() {
        assert!(MessageContent::Text("  \n".into()).is_empty());
        assert!(!MessageContent::Text("x".into()).is_empty());
    }
}
