use crate::{IpcFailure, IpcTransport};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

/// Upper bound on any single daemon round-trip. Interactive authorization
/// prompts can keep a call open for minutes, so this is deliberately large.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Message shown when a call fails because authorization was denied or the
/// authorization prompt expired. The spelling is load-bearing: callers
/// match and display this string as-is.
pub const AUTH_FAILED_MESSAGE: &str = "PolicyKit Autherisation failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeState {
    Idle,
    CallIssued,
    Completed,
    Failed,
    TimedOut,
}

/// Outcome of a bridged call. Transport failures never surface as errors;
/// they collapse into a missing value plus an optional caller-visible
/// message.
#[derive(Debug, Clone, PartialEq)]
pub struct IpcReply {
    pub value: Option<Value>,
    pub message: Option<String>,
}

impl IpcReply {
    fn empty() -> Self {
        Self {
            value: None,
            message: None,
        }
    }

    fn auth_failed() -> Self {
        Self {
            value: None,
            message: Some(AUTH_FAILED_MESSAGE.to_string()),
        }
    }
}

/// Converts the daemon's callback-style completion into awaitable call
/// semantics: issue the call, park on a oneshot channel with a bounded
/// timeout, classify the completion.
#[derive(Clone)]
pub struct IpcBridge {
    transport: Arc<dyn IpcTransport>,
    timeout: Duration,
}

impl IpcBridge {
    pub fn new(transport: Arc<dyn IpcTransport>) -> Self {
        Self {
            transport,
            timeout: CALL_TIMEOUT,
        }
    }

    /// Shortened timeout, for tests.
    pub fn with_timeout(transport: Arc<dyn IpcTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub async fn call(&self, method: &str, args: Value) -> IpcReply {
        let mut state = BridgeState::Idle;
        trace!(method, ?state, "bridge call");

        let (reply_tx, reply_rx) = oneshot::channel();
        self.transport.call(method, args, reply_tx);
        state = BridgeState::CallIssued;
        trace!(method, ?state, "awaiting completion");

        let reply = match tokio::time::timeout(self.timeout, reply_rx).await {
            Err(_) => {
                state = BridgeState::TimedOut;
                debug!(method, ?state, "daemon call timed out");
                IpcReply::auth_failed()
            }
            // Reply sender dropped without completing: the peer went away.
            Ok(Err(_)) => {
                state = BridgeState::Failed;
                debug!(method, ?state, "daemon disconnected mid-call");
                IpcReply::empty()
            }
            Ok(Ok(Ok(value))) => {
                state = BridgeState::Completed;
                trace!(method, ?state, "daemon call completed");
                IpcReply {
                    value: Some(value),
                    message: None,
                }
            }
            Ok(Ok(Err(failure))) => {
                state = BridgeState::Failed;
                Self::classify(method, failure)
            }
        };
        trace!(method, ?state, has_value = reply.value.is_some(), "bridge done");
        reply
    }

    fn classify(method: &str, failure: IpcFailure) -> IpcReply {
        match failure {
            IpcFailure::Disconnected => {
                debug!(method, "daemon disconnected, returning no result");
                IpcReply::empty()
            }
            IpcFailure::Timeout | IpcFailure::NotAuthorized => IpcReply::auth_failed(),
            IpcFailure::Other(cause) => {
                error!(method, %cause, "unclassified daemon failure");
                IpcReply::empty()
            }
        }
    }
}
