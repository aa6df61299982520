//! Core trait definitions

mod agent;
mod login;

pub use agent::IdentityAgent;
pub use login::LoginFlow;
