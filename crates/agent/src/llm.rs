use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::actions::ActionSpec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    /// An executed action's confirmation, folded back as context.
    Action,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Action name when `role` is `Action`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into(), name: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into(), name: None }
    }

    pub fn action(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: ChatRole::Action, content: content.into(), name: Some(name.into()) }
    }
}

/// A single action the backend asked for, with raw JSON arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionRequest {
    pub name: String,
    pub arguments: Value,
}

/// One backend turn: free text plus at most one requested action.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatOutcome {
    pub content: Option<String>,
    pub action: Option<ActionRequest>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("backend client could not be constructed: {0}")]
    Build(#[source] reqwest::Error),
    #[error("backend rejected the credential")]
    Credential,
    #[error("backend rejected the request: {0}")]
    InvalidRequest(String),
    #[error("backend is unavailable: {0}")]
    Unavailable(String),
    #[error("backend request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("backend transport failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("backend response could not be parsed: {0}")]
    Parse(String),
}

/// Pluggable generation backend seam.
///
/// Implementations receive the full conversation context every call: the
/// composed system prompt, the replayed history, the latest user text, and
/// the callable-action schemas. They must surface at most one requested
/// action per turn.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_text: &str,
        actions: &[ActionSpec],
    ) -> Result<ChatOutcome, LlmError>;
}
