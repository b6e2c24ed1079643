//! The local models for one chat conversation.
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// One turn as the UI sees it: created locally for user input, derived
/// from remote payloads for assistant replies. Immutable after creation.
#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub content: String,
}

impl ChatMessage {
    pub fn new(sender: Sender, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            content: content.to_string(),
        }
    }
}

#[derive(Default)]
pub struct Transcript(Vec<ChatMessage>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.0.clone()
    }

    pub fn push(&mut self, msg: ChatMessage) {
        self.0.push(msg)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.0.iter()
    }
}
