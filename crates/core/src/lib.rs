pub mod config;
pub mod domain;
pub mod prompts;

pub use domain::call::CallStage;
pub use domain::pharmacy::Pharmacy;
