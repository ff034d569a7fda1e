//! OpenAI-compatible chat-completion client.
//!
//! One blocking-equivalent call per turn: the composed system prompt, the
//! replayed history, the latest user text, and the action schemas go out as a
//! `chat/completions` request with a `tools` array; free text and at most one
//! requested action come back. No retries, no backoff: a failed turn is the
//! session's problem to degrade.

use std::time::Duration;

use async_trait::async_trait;
use pharmline_core::config::LlmConfig;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::actions::ActionSpec;
use crate::llm::{ActionRequest, ChatMessage, ChatOutcome, ChatRole, LlmClient, LlmError};

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 500;

pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(LlmError::Build)?;

        let api_key = config
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().to_string())
            .unwrap_or_default();

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_text: &str,
        actions: &[ActionSpec],
    ) -> WireRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(WireMessage::system(system_prompt));
        messages.extend(history.iter().map(WireMessage::from_chat));
        messages.push(WireMessage::user(user_text));

        let tools = actions
            .iter()
            .map(|spec| WireTool {
                kind: "function".to_string(),
                function: WireFunctionSpec {
                    name: spec.name.to_string(),
                    description: spec.description.to_string(),
                    parameters: spec.parameters.clone(),
                },
            })
            .collect::<Vec<_>>();
        let tool_choice = (!tools.is_empty()).then(|| "auto".to_string());

        WireRequest {
            model: self.model.clone(),
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            tools,
            tool_choice,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_text: &str,
        actions: &[ActionSpec],
    ) -> Result<ChatOutcome, LlmError> {
        let request = self.build_request(system_prompt, history, user_text, actions);

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    LlmError::Timeout { timeout_secs: self.timeout_secs }
                } else {
                    LlmError::Transport(error)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), body));
        }

        let wire = response
            .json::<WireResponse>()
            .await
            .map_err(|error| LlmError::Parse(error.to_string()))?;

        outcome_from_response(wire)
    }
}

fn map_status(status: u16, body: String) -> LlmError {
    match status {
        401 => LlmError::Credential,
        400..=499 => LlmError::InvalidRequest(body),
        500..=599 => LlmError::Unavailable(format!("server error {status}: {body}")),
        other => LlmError::Unavailable(format!("unexpected status {other}: {body}")),
    }
}

/// Extracts free text and the first requested action; extra tool calls in the
/// same response are ignored.
fn outcome_from_response(response: WireResponse) -> Result<ChatOutcome, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Parse("no choices in response".to_string()))?;

    let mut tool_calls = choice.message.tool_calls.unwrap_or_default().into_iter();
    let action = tool_calls
        .next()
        .map(|call| {
            let arguments = serde_json::from_str::<Value>(&call.function.arguments)
                .map_err(|error| {
                    LlmError::Parse(format!(
                        "tool call `{}` carried undecodable arguments: {error}",
                        call.function.name
                    ))
                })?;
            Ok::<_, LlmError>(ActionRequest { name: call.function.name, arguments })
        })
        .transpose()?;

    let ignored = tool_calls.count();
    if ignored > 0 {
        debug!(
            event_name = "llm.tool_calls.ignored",
            ignored_count = ignored,
            "honoring only the first requested action"
        );
    }

    Ok(ChatOutcome { content: choice.message.content.filter(|text| !text.is_empty()), action })
}

// ----- wire types -----

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl WireMessage {
    fn system(content: &str) -> Self {
        Self { role: "system".to_string(), content: content.to_string(), name: None }
    }

    fn user(content: &str) -> Self {
        Self { role: "user".to_string(), content: content.to_string(), name: None }
    }

    fn from_chat(message: &ChatMessage) -> Self {
        let role = match message.role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Action => "function",
        };
        Self { role: role.to_string(), content: message.content.clone(), name: message.name.clone() }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionSpec,
}

#[derive(Debug, Serialize)]
struct WireFunctionSpec {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON object encoded as a string, per the chat-completions wire format.
    arguments: String,
}
