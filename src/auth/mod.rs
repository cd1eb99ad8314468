pub mod api_key;
pub mod gate;

pub use gate::{AccessAttempt, AuthorizationGate, Decision, DenyReason};
