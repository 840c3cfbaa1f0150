use serde::{Deserialize, Serialize};

use crate::api::TeachingApi;
use crate::api::model::SourceRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
    /// Set on the inline turn that replaces a failed reply.
    #[serde(default)]
    pub is_error: bool,
}

impl ChatMessage {
    fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_owned(),
            sources: Vec::new(),
            is_error: false,
        }
    }
}

/// Ordered, append-only chat history.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant && !message.is_error)
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }
}

pub struct ChatSession<'a, A: ?Sized> {
    api: &'a A,
    transcript: Transcript,
}

impl<'a, A> ChatSession<'a, A>
where
    A: TeachingApi + ?Sized,
{
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            transcript: Transcript::default(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Sends one user turn and appends the reply (or an inline error turn).
    ///
    /// Only a blank message is refused; backend failures end up in the
    /// transcript rather than in the returned `Result`.
    pub async fn send(&mut self, message: &str) -> anyhow::Result<&ChatMessage> {
        let message = message.trim();
        if message.is_empty() {
            anyhow::bail!("message is empty");
        }

        self.transcript.push(ChatMessage::user(message));
        let reply = match self.api.chat(message).await {
            Ok(reply) => ChatMessage {
                role: Role::Assistant,
                content: reply.answer,
                sources: reply.sources,
                is_error: false,
            },
            Err(err) => {
                tracing::warn!(?err, "chat request failed");
                ChatMessage {
                    role: Role::Assistant,
                    content: format!("Sorry, I couldn't reach the tutor: {err:#}"),
                    sources: Vec::new(),
                    is_error: true,
                }
            }
        };
        self.transcript.push(reply);

        self.transcript
            .messages
            .last()
            .ok_or_else(|| anyhow::anyhow!("transcript is empty after send"))
    }
}
