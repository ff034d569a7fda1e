//! Call Agent - LLM-backed orchestration for inbound pharmacy sales calls
//!
//! This crate provides the "brain" of the pharmline system - the per-call
//! session that:
//! - Selects a conversational stance from the directory lookup result
//! - Forwards each turn to a chat-completion backend with action schemas
//! - Executes at most one requested action per turn
//! - Produces a call summary on hangup and resets all per-call state
//!
//! # Architecture
//!
//! The session follows a constrained loop:
//! 1. **Stance Selection** (`session`) - directory hit/miss → stage brief
//! 2. **Generation** (`llm`, `openai`) - history + schemas → text + action
//! 3. **Action Execution** (`actions`) - append record, confirmation string
//! 4. **Fold-back** - confirmation joins the history for the next turn
//!
//! # Key Types
//!
//! - `CallSession` - Main orchestrator (see `session` module)
//! - `LlmClient` - Pluggable backend trait (OpenAI-compatible impl provided)
//! - `ActionExecutor` - Append-only in-memory action records
//!
//! # Safety Principle
//!
//! The LLM never executes anything itself. It can only *request* one of the
//! three registered actions; the executor validates arguments and performs
//! the (mock) side effect deterministically.

pub mod actions;
pub mod llm;
pub mod openai;
pub mod session;

pub use actions::{ActionExecutor, ActionSpec, ActionSummary};
pub use llm::{ActionRequest, ChatMessage, ChatOutcome, ChatRole, LlmClient, LlmError};
pub use openai::OpenAiClient;
pub use session::{CallSession, CallSummary};
