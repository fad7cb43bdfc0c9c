//! Click-to-Call Microservice
//!
//! Places calls through an Asterisk PBX on behalf of trusted clients:
//! - Client address allow-list (exact, wildcard, CIDR for IPv4 and IPv6)
//! - Manager interface session over `pbx-ami`
//! - Technology lookup in AstDB and asynchronous Originate
//! - Bounded retries for the idempotent connect/login/lookup steps

pub mod allowlist;
pub mod call;
pub mod config;
pub mod error;
pub mod handlers;
pub mod retry;
pub mod routes;
pub mod workflow;

use std::sync::Arc;

pub use call::{CallRequest, CallResult};
pub use config::Config;
pub use error::{CallError, Result};
pub use workflow::CallWorkflow;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<CallWorkflow>,
    pub config: Arc<Config>,
}
