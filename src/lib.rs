//! chatmail — one timeline per thread for chat, agent replies, and email.

pub mod agent;
pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod mail;
pub mod store;
pub mod transcript;
