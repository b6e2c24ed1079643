pub mod core;
pub mod models;

pub use self::core::{ChainState, ChatSession, ChatSessionBuilder, NO_REPLY_FALLBACK, PollConfig};
pub use self::models::{ChatMessage, Sender, Transcript};
