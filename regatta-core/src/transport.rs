//! Chat transport seam.

use async_trait::async_trait;

use crate::error::RegattaResult;

/// Sends messages to participant chats. Delivery is best effort: firing
/// callbacks catch and log per-recipient failures instead of propagating
/// them.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> RegattaResult<()>;
}
