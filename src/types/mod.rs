//! Public types for the Muninn API.

mod capabilities;
mod message;
mod response;
mod tool;

pub use capabilities::ProviderCapabilities;
pub use message::{Message, MessageContent, Role};
pub use response::{ChainResponse, Completion};
pub use tool::{ToolCall, ToolDefinition};
