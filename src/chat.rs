use serde::{Deserialize, Serialize};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::client::{AiCaller, HistoryStore};
use crate::prompt::{CHALLENGE_LABEL, CHALLENGE_PROMPT, CHALLENGE_SYSTEM_INSTRUCTION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

// Append-only; insertion order is display order
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut transcript = Self::default();
        transcript.push(Role::Ai, greeting);
        transcript
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) -> &ChatMessage {
        self.messages.push(ChatMessage {
            role,
            text: text.into(),
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Line-oriented chat loop. Blank lines are ignored, `/challenge` asks for an
/// interview question and `/quit` (or end of input) leaves.
pub async fn run<S, R, W>(
    caller: &AiCaller<S>,
    mut transcript: Transcript,
    input: R,
    out: &mut W,
) -> std::io::Result<Transcript>
where
    S: HistoryStore,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    for message in transcript.messages() {
        render(out, message)?;
    }

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        let answer = if line == "/challenge" {
            transcript.push(Role::User, CHALLENGE_LABEL);
            caller.ask(CHALLENGE_PROMPT, Some(CHALLENGE_SYSTEM_INSTRUCTION)).await
        } else {
            transcript.push(Role::User, line);
            caller.ask(line, None).await
        };

        let message = transcript.push(Role::Ai, answer);
        render(out, message)?;
    }

    Ok(transcript)
}

fn render<W: Write>(out: &mut W, message: &ChatMessage) -> std::io::Result<()> {
    let who = match message.role {
        Role::User => "you",
        Role::Ai => "ai",
    };
    writeln!(out, "{who}> {}", message.text)?;
    out.flush()
}
