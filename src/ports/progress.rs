use crate::{KeyImportRequest, ProgressEvent};

/// Collaborator receiving daemon progress notifications and answering
/// mid-transaction confirmation requests.
pub trait ProgressSink: Send + Sync {
    fn handle(&self, event: ProgressEvent);

    /// Whether the given repository key should be imported. A `false` reply
    /// aborts the daemon-side transaction at the confirmation step.
    fn confirm_key_import(&self, request: &KeyImportRequest) -> bool;
}

/// Sink that drops progress and declines every key import.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn handle(&self, _event: ProgressEvent) {}

    fn confirm_key_import(&self, _request: &KeyImportRequest) -> bool {
        false
    }
}
