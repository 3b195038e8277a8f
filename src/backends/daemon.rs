use crate::ipc::IpcBridge;
use crate::{
    InfoAttr, IpcSignal, IpcTransport, KeyImportRequest, PackageBackend, PackageFilter,
    PackageRecord, PackageState, PkgError, ProgressEvent, ProgressSink, RepoInfo, SearchField,
    TransactionItem, TransactionResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Attributes projected into every package listing call.
const PKG_ATTRS: [&str; 10] = [
    "name",
    "epoch",
    "version",
    "release",
    "arch",
    "repo",
    "summary",
    "description",
    "size",
    "download_size",
];

/// Wire shape of one projected package object.
#[derive(Deserialize)]
struct WirePackage {
    name: String,
    #[serde(default)]
    epoch: String,
    version: String,
    #[serde(default)]
    release: String,
    #[serde(default)]
    arch: String,
    #[serde(default)]
    repo: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    download_size: u64,
}

#[derive(Deserialize)]
struct WireResolve {
    completed: bool,
    #[serde(default)]
    actions: std::collections::HashMap<String, Vec<(String, u64)>>,
    #[serde(default)]
    error: String,
    #[serde(default)]
    key_import: Option<KeyImportRequest>,
}

/// Adapter over the out-of-process daemon reached via the bus, used for the
/// privileged transaction path. All semantically synchronous calls go
/// through the bridge; progress and confirmation signals are pumped to the
/// progress collaborator on a dedicated task.
pub struct DaemonBackend {
    bridge: IpcBridge,
    transport: Arc<dyn IpcTransport>,
    progress: Arc<dyn ProgressSink>,
    session_open: AtomicBool,
}

impl DaemonBackend {
    pub fn new(transport: Arc<dyn IpcTransport>, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            bridge: IpcBridge::new(Arc::clone(&transport)),
            transport,
            progress,
            session_open: AtomicBool::new(false),
        }
    }

    /// Opens the daemon session. The signal subscription is established
    /// first: notifications arriving mid-transaction are the only channel
    /// for progress and key-import confirmation.
    pub async fn open_session(&self) -> Result<(), PkgError> {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        self.transport.subscribe(signal_tx);
        self.spawn_signal_pump(signal_rx);

        let reply = self.bridge.call("OpenSession", json!({})).await;
        if reply.value.is_none() {
            return Err(PkgError::ipc(
                reply
                    .message
                    .unwrap_or_else(|| "session open failed".to_string()),
            ));
        }
        self.session_open.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn close_session(&self) {
        if self.session_open.swap(false, Ordering::SeqCst) {
            self.bridge.call("CloseSession", json!({})).await;
        }
    }

    fn ensure_open(&self) -> Result<(), PkgError> {
        if self.session_open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PkgError::SessionClosed)
        }
    }

    fn spawn_signal_pump(&self, mut signals: mpsc::UnboundedReceiver<IpcSignal>) {
        let progress = Arc::clone(&self.progress);
        let bridge = self.bridge.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                match decode_signal(&signal) {
                    Some(ProgressEvent::RepoKeyImport(request)) => {
                        let confirmed = progress.confirm_key_import(&request);
                        progress.handle(ProgressEvent::RepoKeyImport(request.clone()));
                        // the daemon-side transaction blocks until this reply
                        bridge
                            .call(
                                "ConfirmKeyImport",
                                json!({ "key_id": request.key_id, "confirmed": confirmed }),
                            )
                            .await;
                    }
                    Some(event) => progress.handle(event),
                    None => debug!(signal = %signal.name, "ignoring unknown daemon signal"),
                }
            }
        });
    }

    /// Builds and resolves a transaction from the given records, returning
    /// the outcome as data. Transport problems land in `error`.
    pub async fn build_transaction(
        &self,
        pkgs: &[PackageRecord],
    ) -> Result<TransactionResult, PkgError> {
        self.ensure_open()?;
        self.bridge.call("ClearTransaction", json!({})).await;
        for pkg in pkgs {
            let method = match pkg.state {
                PackageState::Installed => "AddRemove",
                PackageState::Update => "AddUpgrade",
                PackageState::Available | PackageState::Downgrade => "AddInstall",
            };
            let reply = self.bridge.call(method, json!({ "id": pkg.id() })).await;
            if let Some(message) = reply.message {
                return Ok(TransactionResult::failed(message));
            }
        }
        let reply = self.bridge.call("Resolve", json!({})).await;
        Ok(decode_transaction(reply.value, reply.message))
    }

    /// Executes the previously resolved transaction.
    pub async fn run_transaction(&self) -> Result<TransactionResult, PkgError> {
        self.ensure_open()?;
        let reply = self.bridge.call("RunTransaction", json!({})).await;
        Ok(decode_transaction(reply.value, reply.message))
    }

    async fn list_call(&self, method: &str, args: Value) -> Result<Vec<Value>, PkgError> {
        self.ensure_open()?;
        let reply = self.bridge.call(method, args).await;
        match reply.value {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => {
                warn!(method, ?other, "unexpected daemon reply shape");
                Ok(Vec::new())
            }
            None => {
                if let Some(message) = reply.message {
                    warn!(method, %message, "daemon call returned no result");
                }
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl PackageBackend for DaemonBackend {
    async fn get_packages(&self, filter: PackageFilter) -> Result<Vec<PackageRecord>, PkgError> {
        let items = self
            .list_call(
                "GetPackages",
                json!({ "scope": filter.as_str(), "attrs": PKG_ATTRS }),
            )
            .await?;
        Ok(decode_packages(items, scope_state(filter)))
    }

    async fn search(
        &self,
        text: &str,
        field: SearchField,
        limit: usize,
    ) -> Result<Vec<PackageRecord>, PkgError> {
        let field_name = match field {
            SearchField::Name => "name",
            SearchField::Summary => "summary",
            SearchField::Arch => "arch",
            SearchField::Repo => "repo",
        };
        let items = self
            .list_call(
                "Search",
                json!({
                    "fields": [field_name],
                    "keys": [text],
                    "attrs": PKG_ATTRS,
                    "limit": limit,
                }),
            )
            .await?;
        Ok(decode_packages(items, PackageState::Available))
    }

    async fn get_package_info(
        &self,
        pkg: &PackageRecord,
        attr: InfoAttr,
    ) -> Result<Option<String>, PkgError> {
        self.ensure_open()?;
        let attr_name = match attr {
            InfoAttr::Description => "description",
            InfoAttr::Files => "files",
            InfoAttr::UpdateInfo => "updateinfo",
        };
        let reply = self
            .bridge
            .call("GetAttribute", json!({ "id": pkg.id(), "attr": attr_name }))
            .await;
        match reply.value {
            Some(Value::String(text)) => Ok(Some(text)),
            Some(Value::Null) | None => {
                if let Some(message) = reply.message {
                    warn!(%message, "attribute lookup returned no result");
                }
                Ok(None)
            }
            Some(other) => Ok(Some(other.to_string())),
        }
    }

    async fn get_repositories(&self) -> Result<Vec<RepoInfo>, PkgError> {
        let items = self
            .list_call(
                "GetRepositories",
                json!({ "attrs": ["id", "name", "enabled", "priority"] }),
            )
            .await?;
        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<RepoInfo>(item) {
                Ok(repo) => Some(repo),
                Err(err) => {
                    debug!(%err, "skipping malformed repository entry");
                    None
                }
            })
            .collect())
    }

    async fn depsolve(&self, pkgs: &[PackageRecord]) -> Result<Vec<PackageRecord>, PkgError> {
        let result = self.build_transaction(pkgs).await?;
        if !result.completed {
            return Err(PkgError::backend(result.error));
        }
        let mut touched = Vec::new();
        for (action, items) in &result.data {
            for item in items {
                match item.nevra.parse::<crate::Nevra>() {
                    Ok(nevra) => {
                        let mut record = PackageRecord::new(
                            &nevra.name,
                            &nevra.epoch,
                            &nevra.version,
                            &nevra.release,
                            &nevra.arch,
                            &item.repo,
                            action_state(action),
                        );
                        record.size = item.size;
                        touched.push(record);
                    }
                    Err(err) => debug!(%err, "skipping malformed transaction member"),
                }
            }
        }
        Ok(touched)
    }
}

fn scope_state(filter: PackageFilter) -> PackageState {
    match filter {
        PackageFilter::Installed => PackageState::Installed,
        PackageFilter::Available => PackageState::Available,
        PackageFilter::Updates => PackageState::Update,
    }
}

fn action_state(action: &str) -> PackageState {
    match action {
        "erase" | "remove" => PackageState::Installed,
        "upgrade" => PackageState::Update,
        "downgrade" => PackageState::Downgrade,
        _ => PackageState::Available,
    }
}

fn decode_packages(items: Vec<Value>, state: PackageState) -> Vec<PackageRecord> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<WirePackage>(item) {
            Ok(wire) => {
                let mut record = PackageRecord::new(
                    &wire.name,
                    &wire.epoch,
                    &wire.version,
                    &wire.release,
                    &wire.arch,
                    &wire.repo,
                    state,
                );
                record.summary = wire.summary;
                record.description = wire.description;
                record.size = wire.size;
                record.download_size = wire.download_size;
                Some(record)
            }
            Err(err) => {
                debug!(%err, "skipping malformed package entry");
                None
            }
        })
        .collect()
}

fn decode_transaction(value: Option<Value>, message: Option<String>) -> TransactionResult {
    let Some(value) = value else {
        return TransactionResult::failed(message.unwrap_or_default());
    };
    match serde_json::from_value::<WireResolve>(value) {
        Ok(wire) => {
            let mut result = TransactionResult {
                completed: wire.completed,
                error: wire.error,
                key_import: wire.key_import,
                ..Default::default()
            };
            for (action, members) in wire.actions {
                for (id, size) in members {
                    match id.parse::<PackageRecord>() {
                        Ok(record) => result.add(
                            &action,
                            TransactionItem {
                                nevra: record.nevra().to_string(),
                                repo: record.repo_id,
                                size,
                            },
                        ),
                        Err(err) => debug!(%err, "skipping malformed transaction member"),
                    }
                }
            }
            result
        }
        Err(err) => TransactionResult::failed(format!("malformed resolve reply: {err}")),
    }
}

fn decode_signal(signal: &IpcSignal) -> Option<ProgressEvent> {
    let body = &signal.body;
    let text = |key: &str| body.get(key)?.as_str().map(|s| s.to_string());
    let number = |key: &str| body.get(key).and_then(Value::as_u64).unwrap_or(0);
    match signal.name.as_str() {
        "download-start" => Some(ProgressEvent::DownloadStart {
            nevra: text("nevra")?,
            total_bytes: number("total"),
        }),
        "download-progress" => Some(ProgressEvent::DownloadProgress {
            nevra: text("nevra")?,
            downloaded: number("downloaded"),
            total_bytes: number("total"),
        }),
        "download-end" => Some(ProgressEvent::DownloadEnd {
            nevra: text("nevra")?,
        }),
        "action-start" => Some(ProgressEvent::TransactionActionStart {
            action: text("action")?,
            nevra: text("nevra")?,
        }),
        "action-progress" => Some(ProgressEvent::TransactionActionProgress {
            nevra: text("nevra")?,
            current: number("current"),
            total: number("total"),
        }),
        "action-end" => Some(ProgressEvent::TransactionActionEnd {
            action: text("action")?,
            nevra: text("nevra")?,
        }),
        "repo-key-import" => Some(ProgressEvent::RepoKeyImport(KeyImportRequest {
            key_id: text("key_id")?,
            user_id: text("user_id").unwrap_or_default(),
            key_url: text("key_url").unwrap_or_default(),
            repo_id: text("repo_id").unwrap_or_default(),
            timestamp: number("timestamp"),
        })),
        _ => None,
    }
}
