//! Shared "awaiting feedback" process state.
//!
//! The post-event feedback broadcast marks every recipient here; the chat
//! frontend treats the next free-text message from a marked chat as
//! feedback and calls [`FeedbackState::take`] to consume the mark.

use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct FeedbackState {
    chats: Mutex<HashSet<i64>>,
}

impl FeedbackState {
    pub fn new() -> Self {
        FeedbackState::default()
    }

    pub fn mark(&self, chat_id: i64) {
        self.chats.lock().unwrap_or_else(|e| e.into_inner()).insert(chat_id);
    }

    pub fn contains(&self, chat_id: i64) -> bool {
        self.chats.lock().unwrap_or_else(|e| e.into_inner()).contains(&chat_id)
    }

    /// Consume the mark for a chat. Returns whether it was set.
    pub fn take(&self, chat_id: i64) -> bool {
        self.chats.lock().unwrap_or_else(|e| e.into_inner()).remove(&chat_id)
    }

    pub fn len(&self) -> usize {
        self.chats.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
