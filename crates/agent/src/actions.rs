//! Callable action schemas and the append-only executor behind them.
//!
//! Three actions are exposed to the backend: `send_email`,
//! `schedule_callback`, and `record_lead`. Executing one appends exactly one
//! record to the in-memory log and returns a human-readable confirmation
//! string. Records live for the duration of a single call.

use chrono::{DateTime, Utc};
use pharmline_core::Pharmacy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::llm::ActionRequest;

pub const SEND_EMAIL: &str = "send_email";
pub const SCHEDULE_CALLBACK: &str = "schedule_callback";
pub const RECORD_LEAD: &str = "record_lead";

/// Schema advertised to the backend: name, description, JSON-Schema params.
#[derive(Clone, Debug, Serialize)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// The three built-in action schemas, in stable order.
pub fn builtin_specs() -> Vec<ActionSpec> {
    vec![
        ActionSpec {
            name: SEND_EMAIL,
            description: "Send a follow-up email to a pharmacy",
            parameters: json!({
                "type": "object",
                "properties": {
                    "email": {
                        "type": "string",
                        "description": "The pharmacy's email address"
                    },
                    "subject": {
                        "type": "string",
                        "description": "Email subject line"
                    },
                    "content": {
                        "type": "string",
                        "description": "Email content/message"
                    }
                },
                "required": ["email", "subject", "content"]
            }),
        },
        ActionSpec {
            name: SCHEDULE_CALLBACK,
            description: "Schedule a callback for the pharmacy",
            parameters: json!({
                "type": "object",
                "properties": {
                    "phone": {
                        "type": "string",
                        "description": "Phone number to call back"
                    },
                    "preferred_time": {
                        "type": "string",
                        "description": "Preferred callback time (e.g., 'tomorrow at 2pm', 'next week')"
                    },
                    "notes": {
                        "type": "string",
                        "description": "Any notes about the callback or what to discuss"
                    }
                },
                "required": ["phone", "preferred_time"]
            }),
        },
        ActionSpec {
            name: RECORD_LEAD,
            description: "Collect and store information about a new pharmacy",
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Pharmacy name"
                    },
                    "phone": {
                        "type": "string",
                        "description": "Pharmacy phone number"
                    },
                    "email": {
                        "type": "string",
                        "description": "Pharmacy email address"
                    },
                    "address": {
                        "type": "string",
                        "description": "Pharmacy address"
                    },
                    "city": {
                        "type": "string",
                        "description": "City location"
                    },
                    "rx_volume": {
                        "type": "string",
                        "description": "Current prescription volume (e.g., '500 per day', '3000 per month')"
                    }
                },
                "required": ["name", "phone"]
            }),
        },
    ]
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unknown action `{0}`")]
    Unknown(String),
    #[error("invalid arguments for `{action}`: {source}")]
    InvalidArguments { action: &'static str, source: serde_json::Error },
}

#[derive(Clone, Debug, Serialize)]
pub struct EmailRecord {
    pub to: String,
    pub subject: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CallbackRecord {
    pub phone: String,
    pub preferred_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LeadRecord {
    #[serde(flatten)]
    pub pharmacy: Pharmacy,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct EmailArgs {
    email: String,
    subject: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CallbackArgs {
    phone: String,
    preferred_time: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LeadArgs {
    name: String,
    phone: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    rx_volume: Option<String>,
}

/// Result of one action execution.
#[derive(Clone, Debug)]
pub struct ActionOutcome {
    pub confirmation: String,
    /// Present when the action collected a pharmacy record the session
    /// should adopt as the current caller.
    pub collected: Option<Pharmacy>,
}

/// Append-only, in-memory action log for the current call.
#[derive(Debug, Default)]
pub struct ActionExecutor {
    sent_emails: Vec<EmailRecord>,
    scheduled_callbacks: Vec<CallbackRecord>,
    collected_leads: Vec<LeadRecord>,
}

impl ActionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(&mut self, request: &ActionRequest) -> Result<ActionOutcome, ActionError> {
        match request.name.as_str() {
            SEND_EMAIL => self.send_email(decode(SEND_EMAIL, &request.arguments)?),
            SCHEDULE_CALLBACK => {
                self.schedule_callback(decode(SCHEDULE_CALLBACK, &request.arguments)?)
            }
            RECORD_LEAD => self.record_lead(decode(RECORD_LEAD, &request.arguments)?),
            other => Err(ActionError::Unknown(other.to_string())),
        }
    }

    fn send_email(&mut self, args: EmailArgs) -> Result<ActionOutcome, ActionError> {
        let confirmation = format!(
            "Email successfully sent to {email} with subject '{subject}'. The pharmacy will \
             receive our information shortly.",
            email = args.email,
            subject = args.subject,
        );

        info!(
            event_name = "action.email.sent",
            to = %args.email,
            subject = %args.subject,
            "follow-up email recorded"
        );

        self.sent_emails.push(EmailRecord {
            to: args.email,
            subject: args.subject,
            content: args.content,
            sent_at: Utc::now(),
        });

        Ok(ActionOutcome { confirmation, collected: None })
    }

    fn schedule_callback(&mut self, args: CallbackArgs) -> Result<ActionOutcome, ActionError> {
        let confirmation = format!(
            "Callback scheduled for {phone} at {preferred_time}. Our sales team will reach out \
             to discuss how Pharmline can support your pharmacy's needs.",
            phone = args.phone,
            preferred_time = args.preferred_time,
        );

        info!(
            event_name = "action.callback.scheduled",
            phone = %args.phone,
            preferred_time = %args.preferred_time,
            "callback recorded"
        );

        self.scheduled_callbacks.push(CallbackRecord {
            phone: args.phone,
            preferred_time: args.preferred_time,
            notes: args.notes,
            scheduled_at: Utc::now(),
        });

        Ok(ActionOutcome { confirmation, collected: None })
    }

    fn record_lead(&mut self, args: LeadArgs) -> Result<ActionOutcome, ActionError> {
        let pharmacy = Pharmacy {
            name: args.name,
            phone: args.phone,
            email: args.email,
            address: args.address,
            city: args.city,
            rx_volume: args.rx_volume,
        };

        let confirmation = format!(
            "Information for {name} has been recorded in our system. We'll use this to better \
             serve your pharmacy's needs.",
            name = pharmacy.name,
        );

        info!(
            event_name = "action.lead.recorded",
            pharmacy_name = %pharmacy.name,
            pharmacy_phone = %pharmacy.phone,
            "new lead recorded"
        );

        self.collected_leads
            .push(LeadRecord { pharmacy: pharmacy.clone(), collected_at: Utc::now() });

        Ok(ActionOutcome { confirmation, collected: Some(pharmacy) })
    }

    pub fn summary(&self) -> ActionSummary {
        ActionSummary {
            emails_sent: self.sent_emails.len(),
            callbacks_scheduled: self.scheduled_callbacks.len(),
            leads_collected: self.collected_leads.len(),
            details: ActionDetails {
                emails: self.sent_emails.clone(),
                callbacks: self.scheduled_callbacks.clone(),
                leads: self.collected_leads.clone(),
            },
        }
    }

    /// Drops every record; called at end of call.
    pub fn reset(&mut self) {
        self.sent_emails.clear();
        self.scheduled_callbacks.clear();
        self.collected_leads.clear();
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    action: &'static str,
    arguments: &Value,
) -> Result<T, ActionError> {
    serde_json::from_value(arguments.clone())
        .map_err(|source| ActionError::InvalidArguments { action, source })
}

#[derive(Clone, Debug, Serialize)]
pub struct ActionSummary {
    pub emails_sent: usize,
    pub callbacks_scheduled: usize,
    pub leads_collected: usize,
    pub details: ActionDetails,
}

#[derive(Clone, Debug, Serialize)]
pub struct ActionDetails {
    pub emails: Vec<EmailRecord>,
    pub callbacks: Vec<CallbackRecord>,
    pub leads: Vec<LeadRecord>,
}
