//! Email channel — provider client, mailbox registry, and the bridge that
//! folds email into the unified timeline.

pub mod bridge;
pub mod provider;
pub mod registry;

pub use bridge::{EmailBridge, InboundEmail, TRANSCRIPT_SUBJECT};
pub use provider::{AgentMailProvider, CreatedInbox, MailProvider};
pub use registry::MailboxRegistry;
