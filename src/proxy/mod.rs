//! Out-of-process plugin execution.
//!
//! A [`PluginProxy`] drives a child speaking newline-delimited JSON frames:
//! each [`Request`] carries a sequence number the child echoes back in its
//! [`Response`]. The child side is a [`ProxyChild`], either in a separate
//! process (see the `plugspace-proxy` binary) or in a local task.

mod child;
mod client;
mod protocol;

pub use child::{ChildContext, Handler, ProxyChild};
pub use client::{Callback, PluginProxy, ProxyState};
pub use protocol::{Request, Response};

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown proxy instruction '{name}'")]
    UnknownInstruction { name: String },

    #[error("Proxy child exited with {}", exit_code_display(.code))]
    ChildExited { code: Option<i32> },

    #[error("Proxy is closed")]
    Closed,
}

fn exit_code_display(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

pub type ProxyResult<T> = std::result::Result<T, ProxyError>;
