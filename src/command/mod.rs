//! Command dispatch for the bridge
//!
//! This module handles:
//! - Looking up decoded commands by name
//! - Answering unknown commands and busy rejections directly
//! - Running each known command in its own bounded task
//! - Sending responses back to the learned peer endpoint

mod dispatcher;
pub mod handlers;
mod reply;

pub use dispatcher::{BusyPolicy, CommandDispatcher, DispatchConfig};
pub use reply::ReplySink;
