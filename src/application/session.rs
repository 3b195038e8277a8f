use crate::backends::{create_backend, DaemonBackend, NativeBindings};
use crate::services::{build_transaction, depsolve, PackageCache, PackageQueue, SharedPackage};
use crate::{
    InfoAttr, Nevra, PackageBackend, PackageFilter, PackageTodo, PkgError, RepoInfo,
    RepoPriorityTable, SearchField, SessionConfig, SettingsStore, TransactionResult,
    KEY_METADATA_EXPIRE_INTERVAL, KEY_METADATA_LAST_REFRESH,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Owned, reset-able context tying the active backend, the package cache and
/// the selection queue together. One session per view lifetime; `reset`
/// recreates backend and cache wholesale rather than invalidating pieces.
pub struct Session<S: SettingsStore> {
    config: SessionConfig,
    bindings: NativeBindings,
    backend: Arc<dyn PackageBackend>,
    daemon: Option<Arc<DaemonBackend>>,
    cache: PackageCache,
    queue: PackageQueue,
    settings: S,
}

impl<S: SettingsStore> Session<S> {
    pub fn new(config: SessionConfig, bindings: NativeBindings, settings: S) -> Self {
        let backend = create_backend(config.backend, &bindings);
        Self {
            config,
            bindings,
            backend,
            daemon: None,
            cache: PackageCache::new(),
            queue: PackageQueue::new(),
            settings,
        }
    }

    /// Attaches the privileged daemon backend used to execute transactions.
    pub fn attach_daemon(&mut self, daemon: Arc<DaemonBackend>) {
        self.daemon = Some(daemon);
    }

    /// Identity-stable package listing for a filter string. Unknown filters
    /// fail before the backend is touched; an updates listing refreshes
    /// stale repository metadata first.
    pub async fn get_packages(
        &mut self,
        filter: &str,
        reset: bool,
    ) -> Result<Vec<SharedPackage>, PkgError> {
        if filter == PackageFilter::Updates.as_str() && self.metadata_expired() {
            self.backend.expire_cache().await?;
            self.mark_metadata_refreshed();
        }
        self.cache
            .get_packages_by_filter(filter, reset, &*self.backend)
            .await
    }

    pub async fn search(
        &mut self,
        text: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<SharedPackage>, PkgError> {
        let field: SearchField = field.parse()?;
        let records = self.backend.search(text, field, limit).await?;
        Ok(records
            .into_iter()
            .map(|r| self.cache.get_package(r))
            .collect())
    }

    pub async fn get_package_info(
        &self,
        pkg: &SharedPackage,
        attr: &str,
    ) -> Result<Option<String>, PkgError> {
        let attr: InfoAttr = attr.parse()?;
        let record = pkg.lock().unwrap().clone();
        self.backend.get_package_info(&record, attr).await
    }

    pub async fn get_repositories(&self) -> Result<Vec<RepoInfo>, PkgError> {
        self.backend.get_repositories().await
    }

    pub async fn repo_priorities(&self) -> Result<RepoPriorityTable, PkgError> {
        Ok(RepoPriorityTable::from_repos(&self.get_repositories().await?))
    }

    /// Resolves a `ref_to` relation against the cache.
    pub fn resolve_ref(&self, nevra: &Nevra) -> Option<SharedPackage> {
        self.cache.lookup(nevra)
    }

    pub fn queue(&self) -> &PackageQueue {
        &self.queue
    }

    /// Selects a package with the operation implied by its state.
    pub fn select(&mut self, pkg: &SharedPackage) {
        self.queue.add(pkg);
    }

    /// Selects a package with an explicit advanced operation.
    pub fn select_with_todo(&mut self, pkg: &SharedPackage, todo: PackageTodo) {
        self.queue.add_with_todo(pkg, todo);
    }

    pub fn deselect(&mut self, pkg: &SharedPackage) -> Result<(), PkgError> {
        self.queue.remove(pkg)
    }

    /// Recomputes the dependency closure of the current selection and keeps
    /// the queue's dependency entries in step with it.
    pub async fn depsolve(&mut self) -> Vec<SharedPackage> {
        let requested = self.queue.requested();
        let deps = depsolve(&*self.backend, &mut self.cache, &requested).await;
        let still_needed: HashSet<Nevra> =
            deps.iter().map(|d| d.lock().unwrap().nevra()).collect();
        self.queue.prune_deps(&still_needed);
        for dep in &deps {
            let todo = dep.lock().unwrap().todo;
            self.queue.add_with_todo(dep, todo);
        }
        deps
    }

    /// Resolves the selection into a transaction result without executing.
    pub async fn build_transaction(&mut self) -> TransactionResult {
        build_transaction(&*self.backend, &mut self.cache, &self.queue).await
    }

    /// Builds and runs the transaction through the privileged daemon path,
    /// then resets the session on success. Callers wanting a confirmation
    /// step use `build_transaction` first and simply skip this call to
    /// abort.
    pub async fn run_transaction(&mut self) -> Result<TransactionResult, PkgError> {
        let daemon = self.daemon.clone().ok_or(PkgError::NoTransactionBackend)?;
        let build = daemon.build_transaction(&self.queue.requested()).await?;
        if !build.completed {
            return Ok(build);
        }
        let run = daemon.run_transaction().await?;
        if run.completed {
            self.reset();
        }
        Ok(run)
    }

    /// Discards the backend and cache wholesale and empties the queue.
    pub fn reset(&mut self) {
        debug!("resetting session backend and cache");
        self.backend = create_backend(self.config.backend, &self.bindings);
        self.cache = PackageCache::new();
        self.queue.clear();
    }

    /// True when the persisted metadata-reload timestamp is older than the
    /// configured interval.
    pub fn metadata_expired(&self) -> bool {
        let interval = self
            .settings
            .get(KEY_METADATA_EXPIRE_INTERVAL)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(self.config.metadata_expire_secs);
        let last = self
            .settings
            .get(KEY_METADATA_LAST_REFRESH)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        now_secs().saturating_sub(last) >= interval
    }

    fn mark_metadata_refreshed(&self) {
        self.settings
            .set(KEY_METADATA_LAST_REFRESH, &now_secs().to_string());
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BackendKind, DnfPackage, DnfSack, GoalOp, HawkeyBinding, HkPackage, MemorySettings,
        PackageState, QueryScope,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    struct EmptySack {
        goal_extra: Option<DnfPackage>,
    }

    impl DnfSack for EmptySack {
        fn installed(&self) -> Vec<DnfPackage> {
            Vec::new()
        }

        fn available(&self) -> Vec<DnfPackage> {
            vec![DnfPackage {
                name: "alpha".to_string(),
                epoch: 0,
                version: "1.0".to_string(),
                release: "1".to_string(),
                arch: "x86_64".to_string(),
                reponame: "base".to_string(),
                summary: "first".to_string(),
                description: String::new(),
                install_size: 10,
                download_size: 5,
            }]
        }

        fn upgrades(&self) -> Vec<DnfPackage> {
            Vec::new()
        }

        fn repositories(&self) -> Vec<RepoInfo> {
            vec![RepoInfo::new("base", "Base", true, 1)]
        }

        fn description(&self, _nevra: &str) -> Option<String> {
            None
        }

        fn files(&self, _nevra: &str) -> Option<Vec<String>> {
            None
        }

        fn update_info(&self, _nevra: &str) -> Option<String> {
            None
        }

        fn resolve_goal(&self, ops: &[(GoalOp, String)]) -> Result<Vec<DnfPackage>, String> {
            let mut touched: Vec<DnfPackage> = self
                .available()
                .into_iter()
                .filter(|p| ops.iter().any(|(_, id)| id.starts_with(&p.name)))
                .collect();
            touched.extend(self.goal_extra.clone());
            Ok(touched)
        }
    }

    #[derive(Default)]
    struct ExpiringBinding {
        expired: AtomicBool,
    }

    impl HawkeyBinding for ExpiringBinding {
        fn query(&self, _scope: QueryScope) -> Vec<HkPackage> {
            Vec::new()
        }

        fn repos_offering(&self, _name: &str) -> Vec<String> {
            Vec::new()
        }

        fn list_repos(&self) -> Vec<RepoInfo> {
            Vec::new()
        }

        fn attribute(&self, _nevra: &str, _attr: InfoAttr) -> Option<String> {
            None
        }

        fn expire_cache(&self) -> Result<(), String> {
            self.expired.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn run_goal(&self, _ops: &[(GoalOp, String)]) -> Result<Vec<HkPackage>, String> {
            Ok(Vec::new())
        }
    }

    fn bindings(sack: EmptySack, binding: Arc<ExpiringBinding>) -> NativeBindings {
        NativeBindings {
            dnf: Arc::new(sack),
            hawkey: binding,
        }
    }

    fn session(kind: BackendKind) -> (Session<MemorySettings>, Arc<ExpiringBinding>) {
        let binding = Arc::new(ExpiringBinding::default());
        let config = SessionConfig {
            backend: kind,
            metadata_expire_secs: 3600,
        };
        let session = Session::new(
            config,
            bindings(EmptySack { goal_extra: None }, Arc::clone(&binding)),
            MemorySettings::new(),
        );
        (session, binding)
    }

    #[tokio::test]
    async fn test_invalid_search_field_rejected() {
        let (mut session, _) = session(BackendKind::Dnf);
        let result = session.search("bash", "flavor", 0).await;
        assert!(matches!(result, Err(PkgError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_updates_listing_expires_stale_metadata() {
        let (mut session, binding) = session(BackendKind::Hawkey);
        // no refresh timestamp recorded yet, so metadata counts as stale
        assert!(session.metadata_expired());
        session.get_packages("updates", false).await.unwrap();
        assert!(binding.expired.load(Ordering::SeqCst));
        assert!(!session.metadata_expired());
    }

    #[tokio::test]
    async fn test_fresh_metadata_not_expired_again() {
        let (mut session, binding) = session(BackendKind::Hawkey);
        session.get_packages("updates", false).await.unwrap();
        binding.expired.store(false, Ordering::SeqCst);
        session.get_packages("updates", true).await.unwrap();
        assert!(!binding.expired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_select_depsolve_queues_dependency() {
        let binding = Arc::new(ExpiringBinding::default());
        let sack = EmptySack {
            goal_extra: Some(DnfPackage {
                name: "libdep".to_string(),
                epoch: 0,
                version: "2.0".to_string(),
                release: "1".to_string(),
                arch: "x86_64".to_string(),
                reponame: "base".to_string(),
                summary: String::new(),
                description: String::new(),
                install_size: 3,
                download_size: 2,
            }),
        };
        let mut session = Session::new(
            SessionConfig::default(),
            bindings(sack, binding),
            MemorySettings::new(),
        );

        let available = session.get_packages("available", false).await.unwrap();
        session.select(&available[0]);
        assert_eq!(session.queue().len(), 1);

        let deps = session.depsolve().await;
        assert_eq!(deps.len(), 1);
        assert!(deps[0].lock().unwrap().is_dep);
        assert_eq!(session.queue().len(), 2);

        // user cannot deselect the pulled-in dependency
        assert!(session.deselect(&deps[0]).is_err());
    }

    #[tokio::test]
    async fn test_reset_recreates_cache_wholesale() {
        let (mut session, _) = session(BackendKind::Dnf);
        let before = session.get_packages("available", false).await.unwrap();
        session.reset();
        let after = session.get_packages("available", false).await.unwrap();
        assert!(!Arc::ptr_eq(&before[0], &after[0]));
    }

    #[tokio::test]
    async fn test_run_transaction_requires_daemon() {
        let (mut session, _) = session(BackendKind::Dnf);
        assert!(matches!(
            session.run_transaction().await,
            Err(PkgError::NoTransactionBackend)
        ));
    }

    #[tokio::test]
    async fn test_build_transaction_reports_selection() {
        let (mut session, _) = session(BackendKind::Dnf);
        let available = session.get_packages("available", false).await.unwrap();
        session.select(&available[0]);
        let result = session.build_transaction().await;
        assert!(result.completed);
        assert_eq!(result.data["install"].len(), 1);
        assert_eq!(available[0].lock().unwrap().state, PackageState::Available);
    }
}
