use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("varint is longer than {0} bytes")]
    VarIntTooLong(usize),

    #[error("frame of {0} bytes exceeds the protocol limit")]
    FrameTooLarge(usize),

    #[error("packet ended early: needed {needed} more bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },

    #[error("invalid string: {0}")]
    InvalidString(String),

    #[error("compressed packet declared {declared} bytes but inflated to {actual}")]
    DecompressedSize { declared: usize, actual: usize },

    #[error("login rejected by server: {0}")]
    LoginRejected(String),

    #[error("server requires online-mode authentication")]
    OnlineModeRequired,

    #[error("connection closed during login")]
    LoginInterrupted,

    #[error("server sent nothing for {0:?}")]
    TimedOut(Duration),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
