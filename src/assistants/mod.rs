pub mod core;

pub use self::core::{
    ApiErrorBody, Assistant, Attachment, ContentItem, ErrorResponse, Message, MessageList,
    MessageText, Role, Run, RunStatus, Thread, Tool, create_message, create_run, create_thread,
    list_messages, retrieve_assistant, retrieve_run,
};
