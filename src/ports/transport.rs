use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

/// Failure classes a transport completion can report. Anything the bus layer
/// cannot classify arrives as `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpcFailure {
    /// Remote peer went away; treated as "no result", not an error.
    Disconnected,
    /// Method call timed out, commonly an expired authorization prompt.
    Timeout,
    NotAuthorized,
    Other(String),
}

/// Raw asynchronous notification frame from the daemon.
#[derive(Debug, Clone)]
pub struct IpcSignal {
    pub name: String,
    pub body: Value,
}

pub type IpcReplySender = oneshot::Sender<Result<Value, IpcFailure>>;
pub type IpcSignalSender = mpsc::UnboundedSender<IpcSignal>;

/// Callback-style bus transport to the package daemon. Completion is
/// reported through the supplied reply sender rather than a return value;
/// the bridge converts that into awaitable call semantics.
pub trait IpcTransport: Send + Sync {
    fn call(&self, method: &str, args: Value, reply: IpcReplySender);

    /// Registers the receiver for daemon signals. Must be invoked before any
    /// resolve or run-transaction call so mid-transaction notifications are
    /// not lost.
    fn subscribe(&self, signals: IpcSignalSender);
}
