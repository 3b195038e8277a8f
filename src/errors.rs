use thiserror::Error;

#[derive(Error, Debug)]
pub enum PkgError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Package `{0}` not found")]
    PackageNotFound(String),

    #[error("Malformed package id `{0}`")]
    MalformedId(String),

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Backend session not open")]
    SessionClosed,

    #[error("No transaction backend configured")]
    NoTransactionBackend,

    #[error("IPC transport error: {0}")]
    IpcError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PkgError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::BackendError(msg.into())
    }

    pub fn ipc<S: Into<String>>(msg: S) -> Self {
        Self::IpcError(msg.into())
    }
}
