//! AMI SDK
//!
//! Provides a Rust client for driving an Asterisk PBX through the
//! Asterisk Manager Interface: a line-oriented `Key: Value` protocol
//! where every request and every reply is a block closed by a blank line.

mod action;
mod client;
mod error;
mod types;

pub use action::Action;
pub use client::{AmiSession, SessionOptions};
pub use error::{AmiError, Result};
pub use types::{ProtocolResponse, SessionState};

/// Default manager interface port
pub const DEFAULT_AMI_PORT: u16 = 5038;
