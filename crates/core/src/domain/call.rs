use serde::{Deserialize, Serialize};

/// Conversational stance for the current call.
///
/// Transitions are assigned imperatively by the session: lookup hit moves
/// `Uninitialized` to `ReturningCustomer`, lookup miss to `NewCustomer`, and a
/// successful `record_lead` action to `LeadCollected`. `end_call` always
/// resets back to `Uninitialized`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStage {
    #[default]
    Uninitialized,
    ReturningCustomer,
    NewCustomer,
    LeadCollected,
}

impl CallStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::ReturningCustomer => "returning_customer",
            Self::NewCustomer => "new_customer",
            Self::LeadCollected => "lead_collected",
        }
    }
}

impl std::fmt::Display for CallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
