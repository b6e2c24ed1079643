use std::time::Duration;

use tokio::time::sleep;

use super::models::{ChatMessage, Sender, Transcript};
use crate::assistants::{self, MessageList, Role, Run, RunStatus};
use crate::errors::ChatError;

/// Shown in place of a reply when the fetched message list contains no
/// assistant-role entry. Not an error: the turn completed, the service
/// just produced nothing to show.
pub const NO_REPLY_FALLBACK: &str = "No response from assistant.";

/// How far the current turn's call chain has progressed. Each step
/// requires the previous one; there is no branching except on failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    ThreadCreated,
    MessageSent,
    RunStarted,
    ResultsFetched,
}

/// Run-status polling knobs: the delay doubles after every check up to
/// `max_delay`, and the whole wait is bounded by `max_attempts`.
#[derive(Clone, Copy, Debug)]
pub struct PollConfig {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }
}

/// One conversation against the assistants service.
///
/// Owns the thread id, the chain state, and the local transcript for a
/// single logical conversation. `send_turn` runs the whole
/// message → run → fetch chain for one user turn; taking `&mut self`
/// means two chains can never race the same thread.
///
/// Use `ChatSession::builder()` to construct a session, or
/// `ChatSession::start()` to construct one and create its thread in one
/// step.
pub struct ChatSession {
    api_hostname: String,
    api_key: String,
    assistant_id: String,
    thread_id: Option<String>,
    state: ChainState,
    transcript: Transcript,
    poll: PollConfig,
}

impl ChatSession {
    pub fn builder(api_hostname: &str, api_key: &str, assistant_id: &str) -> ChatSessionBuilder {
        ChatSessionBuilder::new(api_hostname, api_key, assistant_id)
    }

    /// Builds a session and creates its conversation thread.
    pub async fn start(
        api_hostname: &str,
        api_key: &str,
        assistant_id: &str,
    ) -> Result<Self, ChatError> {
        let mut session = Self::builder(api_hostname, api_key, assistant_id).build();
        session.create_thread().await?;
        Ok(session)
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Creates the conversation thread with an empty settings object and
    /// stores its id. On failure the session stays Idle and is unusable
    /// until this succeeds.
    pub async fn create_thread(&mut self) -> Result<(), ChatError> {
        let thread = assistants::create_thread(&self.api_hostname, &self.api_key).await?;
        tracing::debug!("Created thread {}", thread.id);
        self.thread_id = Some(thread.id);
        self.state = ChainState::ThreadCreated;
        Ok(())
    }

    fn require_thread(&self) -> Result<&str, ChatError> {
        self.thread_id
            .as_deref()
            .ok_or(ChatError::Precondition("no conversation thread exists yet"))
    }

    /// Posts one user-role message with a single text content part. The
    /// echoed message body is decoded but not inspected further.
    pub async fn send_message(&mut self, text: &str) -> Result<(), ChatError> {
        let thread_id = self.require_thread()?;
        assistants::create_message(&self.api_hostname, &self.api_key, thread_id, text).await?;
        self.state = ChainState::MessageSent;
        Ok(())
    }

    /// Starts a non-streaming run of the configured assistant for the
    /// message sent this turn.
    pub async fn create_run(&mut self) -> Result<Run, ChatError> {
        let thread_id = self.require_thread()?;
        if self.state != ChainState::MessageSent {
            return Err(ChatError::Precondition(
                "no message has been sent for this turn",
            ));
        }
        if self.assistant_id.is_empty() {
            return Err(ChatError::Precondition("no assistant id is configured"));
        }
        let run = assistants::create_run(
            &self.api_hostname,
            &self.api_key,
            thread_id,
            &self.assistant_id,
        )
        .await?;
        tracing::debug!("Started run {} ({})", run.id, run.status.as_str());
        self.state = ChainState::RunStarted;
        Ok(run)
    }

    /// Waits for a run to reach a terminal status, re-fetching it at
    /// doubling intervals so a slow completion cannot race the fetch.
    pub async fn await_run(&self, run: Run) -> Result<Run, ChatError> {
        let mut run = run;
        let mut delay = self.poll.initial_delay;
        let mut attempts = 0;

        while !run.status.is_terminal() {
            if attempts >= self.poll.max_attempts {
                tracing::warn!(
                    "Run {} still {} after {} status checks",
                    run.id,
                    run.status.as_str(),
                    attempts
                );
                return Err(ChatError::RunTimedOut { attempts });
            }
            sleep(delay).await;
            delay = (delay * 2).min(self.poll.max_delay);
            attempts += 1;

            let thread_id = self.require_thread()?;
            run =
                assistants::retrieve_run(&self.api_hostname, &self.api_key, thread_id, &run.id)
                    .await?;
        }

        if run.status != RunStatus::Completed {
            return Err(ChatError::RunEnded {
                status: run.status.as_str().to_string(),
            });
        }
        Ok(run)
    }

    /// Fetches the first page of messages in ascending order and returns
    /// the newest assistant reply, its text parts joined with newlines.
    /// A list without an assistant entry yields the literal fallback
    /// text, never an error.
    pub async fn fetch_messages(&mut self) -> Result<String, ChatError> {
        let thread_id = self.require_thread()?;
        let list = assistants::list_messages(&self.api_hostname, &self.api_key, thread_id).await?;
        self.state = ChainState::ResultsFetched;
        Ok(latest_assistant_reply(&list).unwrap_or_else(|| NO_REPLY_FALLBACK.to_string()))
    }

    /// The whole chain for one user turn: post the message, start a run,
    /// wait for it to finish, then fetch the reply. A failed step aborts
    /// the rest of the chain for this turn; remote state already created
    /// (thread, message, run) is left in place and the next turn starts
    /// fresh from the same thread.
    pub async fn send_turn(&mut self, text: &str) -> Result<String, ChatError> {
        self.transcript.push(ChatMessage::new(Sender::User, text));

        self.send_message(text).await?;
        let run = self.create_run().await?;
        let run = self.await_run(run).await?;
        tracing::debug!("Run {} finished", run.id);
        let reply = self.fetch_messages().await?;

        self.transcript
            .push(ChatMessage::new(Sender::Assistant, &reply));
        Ok(reply)
    }
}

/// The content of the newest assistant message in an ascending-ordered
/// list: all of its text parts, in order, joined with newlines.
fn latest_assistant_reply(list: &MessageList) -> Option<String> {
    let message = list.data.iter().rev().find(|m| m.role == Role::Assistant)?;
    let parts: Vec<&str> = message
        .content
        .iter()
        .filter_map(|item| item.text.as_ref().map(|t| t.value.as_str()))
        .collect();
    Some(parts.join("\n"))
}

#[derive(Default)]
pub struct ChatSessionBuilder {
    api_hostname: String,
    api_key: String,
    assistant_id: String,
    poll: Option<PollConfig>,
}

impl ChatSessionBuilder {
    pub fn new(api_hostname: &str, api_key: &str, assistant_id: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            assistant_id: assistant_id.to_string(),
            poll: None,
        }
    }

    pub fn poll(mut self, poll: PollConfig) -> Self {
        self.poll = Some(poll);
        self
    }

    pub fn build(self) -> ChatSession {
        ChatSession {
            api_hostname: self.api_hostname,
            api_key: self.api_key,
            assistant_id: self.assistant_id,
            thread_id: None,
            state: ChainState::Idle,
            transcript: Transcript::new(),
            poll: self.poll.unwrap_or_default(),
        }
    }
}
