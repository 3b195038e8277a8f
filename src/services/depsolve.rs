use crate::services::cache::{PackageCache, SharedPackage};
use crate::{
    PackageAction, PackageBackend, PackageRecord, PackageTodo, PkgError, TransactionItem,
    TransactionResult,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pending user selections awaiting transaction build. Entries are owned by
/// the queue from selection until deselection or transaction completion.
#[derive(Default)]
pub struct PackageQueue {
    entries: Vec<SharedPackage>,
}

impl PackageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[SharedPackage] {
        &self.entries
    }

    /// Queues a package with the operation implied by its state.
    pub fn add(&mut self, pkg: &SharedPackage) {
        let todo = PackageTodo::from_state(pkg.lock().unwrap().state);
        self.add_with_todo(pkg, todo);
    }

    /// Queues a package with an explicitly chosen operation (advanced
    /// actions such as reinstall or distro-sync).
    pub fn add_with_todo(&mut self, pkg: &SharedPackage, todo: PackageTodo) {
        {
            let mut held = pkg.lock().unwrap();
            if held.queued {
                held.todo = todo;
                held.action = todo.action();
                drop(held);
                self.sort();
                return;
            }
            held.todo = todo;
            held.action = todo.action();
            held.queued = true;
        }
        self.entries.push(Arc::clone(pkg));
        self.sort();
    }

    /// Deselects a package. Dependency entries are refused; the engine
    /// prunes those itself once they are no longer required.
    pub fn remove(&mut self, pkg: &SharedPackage) -> Result<(), PkgError> {
        {
            let mut held = pkg.lock().unwrap();
            if held.is_dep {
                return Err(PkgError::invalid_argument(format!(
                    "`{}` is a dependency and cannot be deselected",
                    held.nevra()
                )));
            }
            held.queued = false;
            held.todo = PackageTodo::None;
            held.action = PackageAction::None;
        }
        self.entries.retain(|e| !Arc::ptr_eq(e, pkg));
        Ok(())
    }

    /// Drops dependency entries whose NEVRA is absent from the latest
    /// resolver output.
    pub fn prune_deps(&mut self, still_needed: &HashSet<crate::Nevra>) {
        self.entries.retain(|entry| {
            let mut held = entry.lock().unwrap();
            if held.is_dep && !still_needed.contains(&held.nevra()) {
                debug!(pkg = %held.nevra(), "pruning stale dependency entry");
                held.queued = false;
                held.is_dep = false;
                held.todo = PackageTodo::None;
                held.action = PackageAction::None;
                false
            } else {
                true
            }
        });
    }

    /// Empties the queue, resetting every entry. Used when a transaction
    /// completes and the view resets.
    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            let mut held = entry.lock().unwrap();
            held.queued = false;
            held.is_dep = false;
            held.todo = PackageTodo::None;
            held.action = PackageAction::None;
        }
    }

    fn sort(&mut self) {
        self.entries
            .sort_by_key(|e| action_rank(e.lock().unwrap().action));
    }

    /// Explicit user requests (non-deps), as plain records.
    pub fn requested(&self) -> Vec<PackageRecord> {
        self.entries
            .iter()
            .map(|e| e.lock().unwrap().clone())
            .filter(|r| !r.is_dep)
            .collect()
    }
}

fn action_rank(action: PackageAction) -> u8 {
    match action {
        PackageAction::Erase => 0,
        PackageAction::Downgrade => 1,
        PackageAction::Reinstall => 2,
        PackageAction::Upgrade => 3,
        PackageAction::Install => 4,
        PackageAction::None => 5,
    }
}

/// Computes the dependency closure of the queued request set. Every package
/// the resolver wants to touch that was not explicitly requested comes back
/// classified as a dependency, deduplicated through the cache. Resolver
/// failure is a normal outcome and yields an empty list plus a log entry.
pub async fn depsolve(
    backend: &dyn PackageBackend,
    cache: &mut PackageCache,
    requested: &[PackageRecord],
) -> Vec<SharedPackage> {
    match backend.depsolve(requested).await {
        Ok(touched) => classify_deps(cache, requested, touched),
        Err(err) => {
            warn!(%err, "depsolve failed, returning no dependencies");
            Vec::new()
        }
    }
}

/// Resolves the queue into a full transaction result keyed by action name.
pub async fn build_transaction(
    backend: &dyn PackageBackend,
    cache: &mut PackageCache,
    queue: &PackageQueue,
) -> TransactionResult {
    let requested = queue.requested();
    let touched = match backend.depsolve(&requested).await {
        Ok(touched) => touched,
        Err(err) => {
            warn!(%err, "transaction build failed");
            return TransactionResult::failed(err.to_string());
        }
    };

    let mut result = TransactionResult {
        completed: true,
        ..Default::default()
    };
    for record in &requested {
        result.add(
            record.action.as_str(),
            TransactionItem {
                nevra: record.nevra().to_string(),
                repo: record.repo_id.clone(),
                size: record.size,
            },
        );
    }
    for dep in classify_deps(cache, &requested, touched) {
        let held = dep.lock().unwrap();
        result.add(
            held.action.as_str(),
            TransactionItem {
                nevra: held.nevra().to_string(),
                repo: held.repo_id.clone(),
                size: held.size,
            },
        );
    }
    result
}

fn classify_deps(
    cache: &mut PackageCache,
    requested: &[PackageRecord],
    touched: Vec<PackageRecord>,
) -> Vec<SharedPackage> {
    let explicit: HashSet<_> = requested.iter().map(|r| r.nevra()).collect();
    touched
        .into_iter()
        .filter(|t| !explicit.contains(&t.nevra()))
        .map(|mut t| {
            t.todo = PackageTodo::from_state(t.state);
            t.action = t.todo.action();
            let shared = cache.get_package(t);
            shared.lock().unwrap().is_dep = true;
            shared
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InfoAttr, PackageFilter, PackageState, RepoInfo, SearchField};
    use async_trait::async_trait;

    fn record(name: &str, state: PackageState) -> PackageRecord {
        PackageRecord::new(name, "", "1.0", "1", "x86_64", "base", state)
    }

    /// Backend whose resolver touches the requested set plus a fixed extra,
    /// or fails outright.
    struct FakeResolver {
        extra: Option<PackageRecord>,
        fail: bool,
    }

    #[async_trait]
    impl PackageBackend for FakeResolver {
        async fn get_packages(
            &self,
            _filter: PackageFilter,
        ) -> Result<Vec<PackageRecord>, PkgError> {
            Ok(Vec::new())
        }

        async fn search(
            &self,
            _text: &str,
            _field: SearchField,
            _limit: usize,
        ) -> Result<Vec<PackageRecord>, PkgError> {
            Ok(Vec::new())
        }

        async fn get_package_info(
            &self,
            _pkg: &PackageRecord,
            _attr: InfoAttr,
        ) -> Result<Option<String>, PkgError> {
            Ok(None)
        }

        async fn get_repositories(&self) -> Result<Vec<RepoInfo>, PkgError> {
            Ok(Vec::new())
        }

        async fn depsolve(
            &self,
            pkgs: &[PackageRecord],
        ) -> Result<Vec<PackageRecord>, PkgError> {
            if self.fail {
                return Err(PkgError::backend("nothing provides libfoo"));
            }
            let mut touched = pkgs.to_vec();
            touched.extend(self.extra.clone());
            Ok(touched)
        }
    }

    #[tokio::test]
    async fn test_extras_classified_as_deps_requests_excluded() {
        let backend = FakeResolver {
            extra: Some(record("libb", PackageState::Available)),
            fail: false,
        };
        let mut cache = PackageCache::new();
        let requested = vec![record("a", PackageState::Available)];
        let deps = depsolve(&backend, &mut cache, &requested).await;
        assert_eq!(deps.len(), 1);
        let held = deps[0].lock().unwrap();
        assert_eq!(held.name, "libb");
        assert!(held.is_dep);
        assert_eq!(held.action, PackageAction::Install);
    }

    #[tokio::test]
    async fn test_resolver_failure_yields_empty_list() {
        let backend = FakeResolver {
            extra: None,
            fail: true,
        };
        let mut cache = PackageCache::new();
        let requested = vec![record("a", PackageState::Available)];
        let deps = depsolve(&backend, &mut cache, &requested).await;
        assert!(deps.is_empty());
    }

    #[tokio::test]
    async fn test_build_transaction_groups_by_action() {
        let backend = FakeResolver {
            extra: Some(record("libb", PackageState::Available)),
            fail: false,
        };
        let mut cache = PackageCache::new();
        let mut queue = PackageQueue::new();
        let pkg = cache.get_package(record("a", PackageState::Available));
        queue.add(&pkg);

        let result = build_transaction(&backend, &mut cache, &queue).await;
        assert!(result.completed);
        assert!(result.error.is_empty());
        let installs = &result.data["install"];
        assert_eq!(installs.len(), 2);
    }

    #[tokio::test]
    async fn test_build_transaction_failure_reported_as_data() {
        let backend = FakeResolver {
            extra: None,
            fail: true,
        };
        let mut cache = PackageCache::new();
        let mut queue = PackageQueue::new();
        let pkg = cache.get_package(record("a", PackageState::Available));
        queue.add(&pkg);

        let result = build_transaction(&backend, &mut cache, &queue).await;
        assert!(!result.completed);
        assert!(result.error.contains("libfoo"));
        assert!(result.is_empty());
    }

    #[test]
    fn test_queue_todo_derived_from_state() {
        let mut queue = PackageQueue::new();
        let mut cache = PackageCache::new();
        let installed = cache.get_package(record("gone", PackageState::Installed));
        queue.add(&installed);
        let held = installed.lock().unwrap();
        assert_eq!(held.todo, PackageTodo::Remove);
        assert_eq!(held.action, PackageAction::Erase);
        assert!(held.queued);
    }

    #[test]
    fn test_queue_orders_erase_before_install() {
        let mut queue = PackageQueue::new();
        let mut cache = PackageCache::new();
        let fresh = cache.get_package(record("fresh", PackageState::Available));
        let gone = cache.get_package(record("gone", PackageState::Installed));
        queue.add(&fresh);
        queue.add(&gone);
        let first = queue.entries()[0].lock().unwrap().name.clone();
        assert_eq!(first, "gone");
    }

    #[test]
    fn test_dependency_entries_cannot_be_removed() {
        let mut queue = PackageQueue::new();
        let mut cache = PackageCache::new();
        let dep = cache.get_package(record("libb", PackageState::Available));
        dep.lock().unwrap().is_dep = true;
        queue.add_with_todo(&dep, PackageTodo::Install);
        assert!(matches!(
            queue.remove(&dep),
            Err(PkgError::InvalidArgument(_))
        ));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_clear_resets_entries() {
        let mut queue = PackageQueue::new();
        let mut cache = PackageCache::new();
        let pkg = cache.get_package(record("a", PackageState::Available));
        queue.add(&pkg);
        queue.clear();
        assert!(queue.is_empty());
        let held = pkg.lock().unwrap();
        assert!(!held.queued);
        assert_eq!(held.todo, PackageTodo::None);
    }
}
