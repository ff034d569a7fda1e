pub mod call;
pub mod pharmacy;
