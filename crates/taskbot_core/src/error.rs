use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("invalid_input - {0}")]
    InvalidInput(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("io_error - {0}")]
    Io(String),
    /// Creation text carried neither a date nor a recurrence marker.
    #[error("unrecognized - {0}")]
    Unrecognized(String),
    /// Index outside the owner's pending-task view.
    #[error("invalid_index - {0}")]
    InvalidIndex(String),
    /// Recurrence below the configured minimum, or too large to represent.
    #[error("invalid_interval - {0}")]
    InvalidInterval(String),
    #[error("send_failure - {0}")]
    SendFailure(String),
}

impl AppError {
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn unrecognized<M: Into<String>>(message: M) -> Self {
        Self::Unrecognized(message.into())
    }

    pub fn invalid_index<M: Into<String>>(message: M) -> Self {
        Self::InvalidIndex(message.into())
    }

    pub fn invalid_interval<M: Into<String>>(message: M) -> Self {
        Self::InvalidInterval(message.into())
    }

    pub fn send_failure<M: Into<String>>(message: M) -> Self {
        Self::SendFailure(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
            Self::Unrecognized(_) => "unrecognized",
            Self::InvalidIndex(_) => "invalid_index",
            Self::InvalidInterval(_) => "invalid_interval",
            Self::SendFailure(_) => "send_failure",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(message)
            | Self::InvalidData(message)
            | Self::Io(message)
            | Self::Unrecognized(message)
            | Self::InvalidIndex(message)
            | Self::InvalidInterval(message)
            | Self::SendFailure(message) => message,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_data(err.to_string())
    }
}
