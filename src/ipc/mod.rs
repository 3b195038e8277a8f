pub use bridge::{AUTH_FAILED_MESSAGE, CALL_TIMEOUT, IpcBridge, IpcReply};

pub mod bridge;
