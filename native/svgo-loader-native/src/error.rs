use std::time::Duration;

use thiserror::Error;

/// Errors raised while building the loader from host-supplied options.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("invalid {field} pattern `{pattern}`: {source}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid loader options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("failed to watch {path}: {source}")]
    Watch {
        path: String,
        #[source]
        source: notify::Error,
    },
}

/// Failure of a single transport endpoint. Never affects other channels.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,
}

/// Errors surfaced to the caller of a directed RPC call.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc call `{method}` timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("no such method `{0}`")]
    NoSuchMethod(String),

    #[error("namespace `{0}` is not registered")]
    UnregisteredNamespace(String),

    #[error("no connected channels")]
    NoChannels,

    #[error("`{method}` failed: {message}")]
    Remote { method: String, message: String },

    #[error("channel closed before `{0}` was answered")]
    ChannelClosed(String),
}

impl RpcError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }
}

pub type Result<T, E = LoaderError> = std::result::Result<T, E>;
