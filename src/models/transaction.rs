use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One package touched by a resolved transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransactionItem {
    pub nevra: String,
    pub repo: String,
    pub size: u64,
}

/// Repository GPG key awaiting user confirmation before a transaction can
/// proceed on the daemon side.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeyImportRequest {
    pub key_id: String,
    pub user_id: String,
    pub key_url: String,
    pub repo_id: String,
    pub timestamp: u64,
}

/// Outcome of a build-transaction or run-transaction call. Resolution
/// problems land in `error`, never in a raised error.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TransactionResult {
    pub completed: bool,
    pub data: HashMap<String, Vec<TransactionItem>>,
    pub error: String,
    pub key_import: Option<KeyImportRequest>,
}

impl TransactionResult {
    pub fn failed<S: Into<String>>(error: S) -> Self {
        Self {
            completed: false,
            error: error.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, action: &str, item: TransactionItem) {
        self.data.entry(action.to_string()).or_default().push(item);
    }

    pub fn is_empty(&self) -> bool {
        self.data.values().all(|v| v.is_empty())
    }
}
