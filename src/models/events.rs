use crate::KeyImportRequest;

/// Asynchronous notification emitted by the daemon backend while a
/// transaction is in flight, forwarded to the progress collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    DownloadStart {
        nevra: String,
        total_bytes: u64,
    },

    DownloadProgress {
        nevra: String,
        downloaded: u64,
        total_bytes: u64,
    },

    DownloadEnd {
        nevra: String,
    },

    TransactionActionStart {
        action: String,
        nevra: String,
    },

    TransactionActionProgress {
        nevra: String,
        current: u64,
        total: u64,
    },

    TransactionActionEnd {
        action: String,
        nevra: String,
    },

    RepoKeyImport(KeyImportRequest),
}
