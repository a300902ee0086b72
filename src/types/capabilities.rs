//! Provider capability reporting

use serde::{Deserialize, Serialize};

/// What a completion backend supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Tool/function calling. Tools are only forwarded when set.
    pub supports_tools: bool,
    /// Streaming responses.
    pub supports_streaming: bool,
    /// Constrained JSON output.
    pub supports_json_mode: bool,
}

impl ProviderCapabilities {
    /// Plain text completion only.
    pub fn text_only() -> Self {
        Self::default()
    }

    /// Everything.
    pub fn full() -> Self {
        Self {
            supports_tools: true,
            supports_streaming: true,
            supports_json_mode: true,
        }
    }

    pub fn tools(mut self, enabled: bool) -> Self {
        self.supports_tools = enabled;
        self
    }

    pub fn streaming(mut self, enabled: bool) -> Self {
        self.supports_streaming = enabled;
        self
    }

    pub fn json_mode(mut self, enabled: bool) -> Self {
        self.supports_json_mode = enabled;
        self
    }
}
