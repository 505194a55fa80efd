//! Transport failures
//!
//! Rule violations are never errors: they are silently dropped by the game
//! state. Everything here is fatal to the server.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("{0} channel closed")]
    ChannelClosed(&'static str),

    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
