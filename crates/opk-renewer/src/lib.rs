//! opk-renewer: Identity renewal for opkssh-renewer
//!
//! The renewer keeps one named identity loaded in the SSH agent. A fresh
//! identity is simply re-registered; a stale, missing or forced one is
//! replaced through the external login flow, and the new identity is
//! loaded into the agent before the old files are overwritten.

pub mod login;
pub mod monitor;
pub mod renewer;

pub use login::CommandLogin;
pub use monitor::{watch, LogNotifier, Notification, Notifier, StatusMonitor};
pub use renewer::{RenewalOutcome, Renewer, RenewerSettings};
