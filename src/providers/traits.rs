//! The seam between the fallback chain and concrete model vendors.
//!
//! An adapter wraps one vendor SDK or HTTP API. It translates the neutral
//! [`Message`] list into the vendor's wire shape, makes one call, and maps
//! the outcome back. It does not retry, fall back, or time itself out; the
//! [`ProviderChain`](super::ProviderChain) owns all of that.
//!
//! # Example
//!
//! ```ignore
//! #[async_trait]
//! impl ProviderAdapter for MyVendor {
//!     fn name(&self) -> &str { "my-vendor" }
//!     fn capabilities(&self) -> ProviderCapabilities {
//!         ProviderCapabilities::text_only().tools(true)
//!     }
//!     async fn complete(
//!         &self,
//!         messages: &[Message],
//!         tools: Option<&[ToolDefinition]>,
//!     ) -> Result<Completion, ProviderError> {
//!         let reply = self.client.send(to_wire(messages, tools)).await
//!             .map_err(|e| ProviderError::new(e.to_string()))?;
//!         Ok(Completion::text(reply.text))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{Completion, Message, ProviderCapabilities, ToolDefinition};

/// One completion backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// What this backend supports. Tools are only passed when
    /// `supports_tools` is set.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Run a single completion.
    ///
    /// Errors should carry the vendor's own text; it is classified with
    /// [`classify_message`](super::classify::classify_message) unless the
    /// adapter sets a kind explicitly.
    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> std::result::Result<Completion, ProviderError>;
}
