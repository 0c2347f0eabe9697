//! Persistence — thread timelines and mailbox bindings.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;
pub mod types;

pub use libsql_backend::LibSqlBackend;
pub use traits::Database;
pub use types::{ContextMessage, ContextRole, MailboxBinding, Message, MessageBody, Thread};
