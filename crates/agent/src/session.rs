//! Per-call orchestration: one inbound call, one session.
//!
//! The session owns the entire per-call state (caller record, stage, turn
//! history, action log) and sequences directory lookup, backend turns, and
//! action execution. Every failure path degrades to a fixed user-facing line;
//! the call itself never aborts.

use pharmline_core::domain::call::CallStage;
use pharmline_core::prompts::{stage_prompt, system_prompt};
use pharmline_core::Pharmacy;
use pharmline_directory::DirectoryLookup;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::actions::{builtin_specs, ActionExecutor, ActionSpec, ActionSummary};
use crate::llm::{ChatMessage, LlmClient};

/// Fixed reply when the generation backend fails mid-call.
pub const APOLOGY_LINE: &str =
    "I apologize, but I'm experiencing technical difficulties. Please try again later.";

/// Fixed reply when the backend returns neither text nor an action.
pub const FALLBACK_LINE: &str =
    "I'm here to help with any questions about Pharmline's services.";

const RETURNING_OPENING: &str =
    "Thank you for calling Pharmline! I see you're calling from our records.";
const NEW_CALLER_OPENING: &str =
    "Thank you for calling Pharmline! I don't see your number in our system.";

/// End-of-call report.
#[derive(Clone, Debug, Serialize)]
pub struct CallSummary {
    pub caller_phone: Option<String>,
    pub pharmacy: Option<Pharmacy>,
    pub stage: CallStage,
    pub actions: ActionSummary,
}

pub struct CallSession {
    llm: Box<dyn LlmClient>,
    directory: Box<dyn DirectoryLookup>,
    executor: ActionExecutor,
    specs: Vec<ActionSpec>,
    call_id: Uuid,
    caller_phone: Option<String>,
    pharmacy: Option<Pharmacy>,
    stage: CallStage,
    history: Vec<ChatMessage>,
}

impl CallSession {
    pub fn new(llm: Box<dyn LlmClient>, directory: Box<dyn DirectoryLookup>) -> Self {
        Self {
            llm,
            directory,
            executor: ActionExecutor::new(),
            specs: builtin_specs(),
            call_id: Uuid::new_v4(),
            caller_phone: None,
            pharmacy: None,
            stage: CallStage::Uninitialized,
            history: Vec::new(),
        }
    }

    pub fn stage(&self) -> CallStage {
        self.stage
    }

    pub fn pharmacy(&self) -> Option<&Pharmacy> {
        self.pharmacy.as_ref()
    }

    /// Answers an inbound call: caller-id lookup, stance selection, and the
    /// opening backend turn. Lookup failures degrade to the new-caller path.
    pub async fn start_call(&mut self, caller_phone: &str) -> String {
        self.call_id = Uuid::new_v4();
        self.caller_phone = Some(caller_phone.to_string());

        info!(
            event_name = "call.started",
            call_id = %self.call_id,
            caller_phone = %caller_phone,
            "answering inbound call"
        );

        let record = match self.directory.find_by_phone(caller_phone).await {
            Ok(record) => record,
            Err(lookup_error) => {
                warn!(
                    event_name = "call.lookup_degraded",
                    call_id = %self.call_id,
                    error = %lookup_error,
                    "directory lookup failed; treating caller as new"
                );
                None
            }
        };

        let opening = if record.is_some() {
            self.stage = CallStage::ReturningCustomer;
            RETURNING_OPENING
        } else {
            self.stage = CallStage::NewCustomer;
            NEW_CALLER_OPENING
        };
        self.pharmacy = record;

        self.advance_turn(opening).await
    }

    /// Forwards one caller utterance and folds the result back into state.
    pub async fn continue_turn(&mut self, user_text: &str) -> String {
        self.advance_turn(user_text).await
    }

    async fn advance_turn(&mut self, user_text: &str) -> String {
        let context =
            format!("{}\n\n{}", system_prompt(), stage_prompt(self.stage, self.pharmacy.as_ref()));

        let outcome =
            match self.llm.complete(&context, &self.history, user_text, &self.specs).await {
                Ok(outcome) => outcome,
                Err(backend_error) => {
                    error!(
                        event_name = "call.turn_failed",
                        call_id = %self.call_id,
                        error = %backend_error,
                        "backend turn failed; degrading to apology"
                    );
                    return APOLOGY_LINE.to_string();
                }
            };

        self.history.push(ChatMessage::user(user_text));
        let response_text = outcome.content.filter(|text| !text.is_empty());
        if let Some(text) = &response_text {
            self.history.push(ChatMessage::assistant(text));
        }

        if let Some(request) = outcome.action {
            match self.executor.execute(&request) {
                Ok(action_outcome) => {
                    self.history
                        .push(ChatMessage::action(&request.name, &action_outcome.confirmation));

                    if let Some(collected) = action_outcome.collected {
                        info!(
                            event_name = "call.lead_adopted",
                            call_id = %self.call_id,
                            pharmacy_name = %collected.name,
                            "adopting collected lead as current caller record"
                        );
                        self.pharmacy = Some(collected);
                        self.stage = CallStage::LeadCollected;
                    }

                    return match response_text {
                        Some(text) => format!("{text}\n\n{}", action_outcome.confirmation),
                        None => action_outcome.confirmation,
                    };
                }
                Err(action_error) => {
                    warn!(
                        event_name = "call.action_rejected",
                        call_id = %self.call_id,
                        action = %request.name,
                        error = %action_error,
                        "requested action could not be executed"
                    );
                }
            }
        }

        response_text.unwrap_or_else(|| FALLBACK_LINE.to_string())
    }

    /// Ends the call: emits the summary, then resets every piece of per-call
    /// state regardless of where the conversation stood.
    pub fn end_call(&mut self) -> CallSummary {
        let summary = CallSummary {
            caller_phone: self.caller_phone.take(),
            pharmacy: self.pharmacy.take(),
            stage: self.stage,
            actions: self.executor.summary(),
        };

        info!(
            event_name = "call.ended",
            call_id = %self.call_id,
            stage = %summary.stage,
            emails_sent = summary.actions.emails_sent,
            callbacks_scheduled = summary.actions.callbacks_scheduled,
            leads_collected = summary.actions.leads_collected,
            "call ended"
        );

        self.stage = CallStage::Uninitialized;
        self.history.clear();
        self.executor.reset();

        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use pharmline_core::domain::call::CallStage;
    use pharmline_core::Pharmacy;
    use pharmline_directory::{DirectoryError, DirectoryLookup};
    use serde_json::json;

    use super::{CallSession, APOLOGY_LINE, FALLBACK_LINE};
    use crate::actions::ActionSpec;
    use crate::llm::{ActionRequest, ChatMessage, ChatOutcome, ChatRole, LlmClient, LlmError};

    struct ScriptedLlm {
        outcomes: Mutex<Vec<Result<ChatOutcome, LlmError>>>,
    }

    impl ScriptedLlm {
        fn new(outcomes: Vec<Result<ChatOutcome, LlmError>>) -> Box<Self> {
            Box::new(Self { outcomes: Mutex::new(outcomes) })
        }

        fn text(content: &str) -> Result<ChatOutcome, LlmError> {
            Ok(ChatOutcome { content: Some(content.to_string()), action: None })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            _system_prompt: &str,
            _history: &[ChatMessage],
            _user_text: &str,
            _actions: &[ActionSpec],
        ) -> Result<ChatOutcome, LlmError> {
            let mut outcomes = self.outcomes.lock().expect("script mutex");
            assert!(!outcomes.is_empty(), "scripted llm ran out of outcomes");
            outcomes.remove(0)
        }
    }

    /// Scripted backend that also captures the history slice passed to each
    /// `complete` call, so tests can observe what gets replayed per turn.
    #[derive(Clone)]
    struct RecordingLlm(Arc<RecordingState>);

    struct RecordingState {
        outcomes: Mutex<Vec<Result<ChatOutcome, LlmError>>>,
        histories: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl RecordingLlm {
        fn new(outcomes: Vec<Result<ChatOutcome, LlmError>>) -> Self {
            Self(Arc::new(RecordingState {
                outcomes: Mutex::new(outcomes),
                histories: Mutex::new(Vec::new()),
            }))
        }

        fn histories(&self) -> Vec<Vec<ChatMessage>> {
            self.0.histories.lock().expect("history mutex").clone()
        }

        fn text(content: &str) -> Result<ChatOutcome, LlmError> {
            Ok(ChatOutcome { content: Some(content.to_string()), action: None })
        }
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn complete(
            &self,
            _system_prompt: &str,
            history: &[ChatMessage],
            _user_text: &str,
            _actions: &[ActionSpec],
        ) -> Result<ChatOutcome, LlmError> {
            self.0.histories.lock().expect("history mutex").push(history.to_vec());
            let mut outcomes = self.0.outcomes.lock().expect("script mutex");
            assert!(!outcomes.is_empty(), "scripted llm ran out of outcomes");
            outcomes.remove(0)
        }
    }

    enum StubDirectory {
        Hit(Pharmacy),
        Miss,
        Broken,
    }

    #[async_trait]
    impl DirectoryLookup for StubDirectory {
        async fn find_by_phone(&self, _phone: &str) -> Result<Option<Pharmacy>, DirectoryError> {
            match self {
                Self::Hit(pharmacy) => Ok(Some(pharmacy.clone())),
                Self::Miss => Ok(None),
                Self::Broken => Err(DirectoryError::Status { status: 500 }),
            }
        }
    }

    fn pharmacy_fixture() -> Pharmacy {
        Pharmacy {
            name: "HealthFirst Pharmacy".to_string(),
            phone: "555-0001".to_string(),
            email: None,
            address: None,
            city: Some("Springfield".to_string()),
            rx_volume: Some("1500 per day".to_string()),
        }
    }

    #[tokio::test]
    async fn known_caller_starts_as_returning_customer() {
        let llm = ScriptedLlm::new(vec![ScriptedLlm::text("Welcome back, HealthFirst!")]);
        let mut session =
            CallSession::new(llm, Box::new(StubDirectory::Hit(pharmacy_fixture())));

        let reply = session.start_call("555-0001").await;
        assert_eq!(reply, "Welcome back, HealthFirst!");
        assert_eq!(session.stage(), CallStage::ReturningCustomer);
        assert_eq!(session.pharmacy().map(|p| p.name.as_str()), Some("HealthFirst Pharmacy"));
    }

    #[tokio::test]
    async fn unknown_caller_starts_as_new_customer() {
        let llm = ScriptedLlm::new(vec![ScriptedLlm::text("Welcome to Pharmline!")]);
        let mut session = CallSession::new(llm, Box::new(StubDirectory::Miss));

        session.start_call("555-9999").await;
        assert_eq!(session.stage(), CallStage::NewCustomer);
        assert!(session.pharmacy().is_none());
    }

    #[tokio::test]
    async fn directory_failure_degrades_to_new_customer() {
        let llm = ScriptedLlm::new(vec![ScriptedLlm::text("Welcome to Pharmline!")]);
        let mut session = CallSession::new(llm, Box::new(StubDirectory::Broken));

        session.start_call("555-0001").await;
        assert_eq!(session.stage(), CallStage::NewCustomer);
        assert!(session.pharmacy().is_none());
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_apology_and_call_continues() {
        let llm = ScriptedLlm::new(vec![
            ScriptedLlm::text("Welcome!"),
            Err(LlmError::Unavailable("boom".to_string())),
            ScriptedLlm::text("Back on track."),
        ]);
        let mut session = CallSession::new(llm, Box::new(StubDirectory::Miss));

        session.start_call("555-9999").await;
        let degraded = session.continue_turn("Tell me about your services").await;
        assert_eq!(degraded, APOLOGY_LINE);

        let recovered = session.continue_turn("Still there?").await;
        assert_eq!(recovered, "Back on track.");
    }

    #[tokio::test]
    async fn empty_backend_reply_degrades_to_fallback_line() {
        let llm = ScriptedLlm::new(vec![
            ScriptedLlm::text("Welcome!"),
            Ok(ChatOutcome::default()),
        ]);
        let mut session = CallSession::new(llm, Box::new(StubDirectory::Miss));

        session.start_call("555-9999").await;
        let reply = session.continue_turn("hello?").await;
        assert_eq!(reply, FALLBACK_LINE);
    }

    #[tokio::test]
    async fn requested_action_executes_and_joins_the_reply() {
        let llm = ScriptedLlm::new(vec![
            ScriptedLlm::text("Welcome!"),
            Ok(ChatOutcome {
                content: Some("Happy to follow up.".to_string()),
                action: Some(ActionRequest {
                    name: "send_email".to_string(),
                    arguments: json!({
                        "email": "owner@citycare.example",
                        "subject": "Pharmline overview",
                        "content": "Details attached."
                    }),
                }),
            }),
        ]);
        let mut session = CallSession::new(llm, Box::new(StubDirectory::Miss));

        session.start_call("555-9999").await;
        let reply = session.continue_turn("Can you email me details?").await;
        assert!(reply.starts_with("Happy to follow up."));
        assert!(reply.contains("owner@citycare.example"));

        let summary = session.end_call();
        assert_eq!(summary.actions.emails_sent, 1);
    }

    #[tokio::test]
    async fn recorded_lead_is_adopted_as_current_pharmacy() {
        let llm = ScriptedLlm::new(vec![
            ScriptedLlm::text("Welcome!"),
            Ok(ChatOutcome {
                content: None,
                action: Some(ActionRequest {
                    name: "record_lead".to_string(),
                    arguments: json!({
                        "name": "Sunrise Pharmacy",
                        "phone": "555-0099",
                        "rx_volume": "900 per day"
                    }),
                }),
            }),
        ]);
        let mut session = CallSession::new(llm, Box::new(StubDirectory::Miss));

        session.start_call("555-0099").await;
        let reply = session.continue_turn("We're Sunrise Pharmacy, 900 scripts a day").await;
        assert!(reply.contains("Sunrise Pharmacy"));
        assert_eq!(session.stage(), CallStage::LeadCollected);
        assert_eq!(session.pharmacy().map(|p| p.phone.as_str()), Some("555-0099"));
    }

    #[tokio::test]
    async fn rejected_action_degrades_to_text_reply() {
        let llm = ScriptedLlm::new(vec![
            ScriptedLlm::text("Welcome!"),
            Ok(ChatOutcome {
                content: Some("Let me note that down.".to_string()),
                action: Some(ActionRequest {
                    name: "transfer_call".to_string(),
                    arguments: json!({}),
                }),
            }),
        ]);
        let mut session = CallSession::new(llm, Box::new(StubDirectory::Miss));

        session.start_call("555-9999").await;
        let reply = session.continue_turn("Do something odd").await;
        assert_eq!(reply, "Let me note that down.");
        assert_eq!(session.end_call().actions.emails_sent, 0);
    }

    #[tokio::test]
    async fn end_call_reports_counts_and_resets_everything() {
        let llm = ScriptedLlm::new(vec![
            ScriptedLlm::text("Welcome back!"),
            Ok(ChatOutcome {
                content: None,
                action: Some(ActionRequest {
                    name: "schedule_callback".to_string(),
                    arguments: json!({"phone": "555-0001", "preferred_time": "tomorrow at 2pm"}),
                }),
            }),
        ]);
        let mut session =
            CallSession::new(llm, Box::new(StubDirectory::Hit(pharmacy_fixture())));

        session.start_call("555-0001").await;
        session.continue_turn("Call me back tomorrow").await;

        let summary = session.end_call();
        assert_eq!(summary.caller_phone.as_deref(), Some("555-0001"));
        assert_eq!(summary.stage, CallStage::ReturningCustomer);
        assert_eq!(summary.actions.callbacks_scheduled, 1);
        assert_eq!(summary.pharmacy.as_ref().map(|p| p.name.as_str()), Some("HealthFirst Pharmacy"));

        // Everything per-call is gone afterwards.
        assert_eq!(session.stage(), CallStage::Uninitialized);
        assert!(session.pharmacy().is_none());

        let empty = session.end_call();
        assert_eq!(empty.stage, CallStage::Uninitialized);
        assert!(empty.caller_phone.is_none());
        assert_eq!(empty.actions.callbacks_scheduled, 0);
    }

    #[tokio::test]
    async fn history_accumulates_within_a_call_and_clears_after_end_call() {
        let llm = RecordingLlm::new(vec![
            RecordingLlm::text("Welcome!"),
            Ok(ChatOutcome {
                content: Some("On it.".to_string()),
                action: Some(ActionRequest {
                    name: "send_email".to_string(),
                    arguments: json!({
                        "email": "owner@citycare.example",
                        "subject": "Overview",
                        "content": "Details attached."
                    }),
                }),
            }),
            RecordingLlm::text("Anything else?"),
            RecordingLlm::text("Welcome again!"),
        ]);
        let mut session = CallSession::new(Box::new(llm.clone()), Box::new(StubDirectory::Miss));

        session.start_call("555-9999").await;
        session.continue_turn("Can you email me details?").await;
        session.continue_turn("Thanks!").await;

        let histories = llm.histories();
        assert_eq!(histories.len(), 3);

        // The opening turn starts from a clean slate.
        assert!(histories[0].is_empty());

        // Second turn replays the opening exchange.
        let second_roles = histories[1].iter().map(|entry| entry.role).collect::<Vec<_>>();
        assert_eq!(second_roles, vec![ChatRole::User, ChatRole::Assistant]);
        assert_eq!(histories[1][1].content, "Welcome!");

        // Third turn also carries the executed action's confirmation entry.
        let third_roles = histories[2].iter().map(|entry| entry.role).collect::<Vec<_>>();
        assert_eq!(
            third_roles,
            vec![
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::Action,
            ]
        );
        let action_entry = &histories[2][4];
        assert_eq!(action_entry.name.as_deref(), Some("send_email"));
        assert!(action_entry.content.contains("owner@citycare.example"));

        // A fresh call after end_call sees none of it.
        session.end_call();
        session.start_call("555-9999").await;
        let histories = llm.histories();
        assert_eq!(histories.len(), 4);
        assert!(histories[3].is_empty());
    }
}
