//! `popbackup`: back up a POP3 mailbox to `.eml` files and pull the
//! readable body out of each message.
//!
//! The extraction core (`parser`, `extract`, `model`) works on any message
//! entity and never logs or fails: problems come back as
//! [`model::extraction::Degradation`] notes next to a defined result.
//! `pop3`, `backup`, `config` and `logging` are the surrounding tool.

pub mod backup;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod model;
pub mod parser;
pub mod pop3;
