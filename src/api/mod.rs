pub mod client;
pub mod messages;
pub mod models;
mod notifications;
pub mod service;

pub use client::GraphMailbox;
pub use service::{Connection, ConnectionEvent, MailboxService};
