use crate::backends::run_native;
use crate::services::select_update_candidates;
use crate::{
    glob_match, is_glob_pattern, GoalOp, HawkeyBinding, HkPackage, InfoAttr, Nevra,
    PackageBackend, PackageFilter, PackageRecord, PackageState, PkgError, QueryScope, RefTo,
    RepoInfo, RepoPriorityTable, SearchField,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Adapter over the alternate in-process binding. Same responsibilities as
/// the dnf adapter behind a different native object model (identity arrives
/// as a single evr string), plus a repository-priority post-filter on
/// updates and a metadata-cache-expiry operation.
pub struct HawkeyBackend {
    binding: Arc<dyn HawkeyBinding>,
}

impl HawkeyBackend {
    pub fn new(binding: Arc<dyn HawkeyBinding>) -> Self {
        Self { binding }
    }
}

#[async_trait]
impl PackageBackend for HawkeyBackend {
    async fn get_packages(&self, filter: PackageFilter) -> Result<Vec<PackageRecord>, PkgError> {
        let binding = Arc::clone(&self.binding);
        run_native(move || Ok(list_packages(&*binding, filter))).await
    }

    async fn search(
        &self,
        text: &str,
        field: SearchField,
        limit: usize,
    ) -> Result<Vec<PackageRecord>, PkgError> {
        let binding = Arc::clone(&self.binding);
        let text = text.to_string();
        run_native(move || {
            let mut hits: Vec<PackageRecord> = list_packages(&*binding, PackageFilter::Installed)
                .into_iter()
                .chain(list_packages(&*binding, PackageFilter::Available))
                .filter(|pkg| field_matches(pkg, field, &text))
                .collect();
            dedup_first_seen(&mut hits);
            if limit > 0 {
                hits.truncate(limit);
            }
            Ok(hits)
        })
        .await
    }

    async fn get_package_info(
        &self,
        pkg: &PackageRecord,
        attr: InfoAttr,
    ) -> Result<Option<String>, PkgError> {
        let binding = Arc::clone(&self.binding);
        let nevra = pkg.nevra().to_string();
        run_native(move || {
            if binding.attribute(&nevra, InfoAttr::Description).is_none() {
                return Err(PkgError::PackageNotFound(nevra));
            }
            match attr {
                InfoAttr::Description => Ok(binding.attribute(&nevra, attr)),
                InfoAttr::Files => Ok(binding.attribute(&nevra, attr)),
                InfoAttr::UpdateInfo => Ok(binding.attribute(&nevra, attr)),
            }
        })
        .await
    }

    async fn get_repositories(&self) -> Result<Vec<RepoInfo>, PkgError> {
        let binding = Arc::clone(&self.binding);
        run_native(move || Ok(binding.list_repos())).await
    }

    async fn depsolve(&self, pkgs: &[PackageRecord]) -> Result<Vec<PackageRecord>, PkgError> {
        let binding = Arc::clone(&self.binding);
        let ops: Vec<(GoalOp, String)> = pkgs
            .iter()
            .map(|p| (goal_op(p.state), p.nevra().to_string()))
            .collect();
        run_native(move || {
            let touched = binding.run_goal(&ops).map_err(PkgError::BackendError)?;
            let installed: HashSet<Nevra> = binding
                .query(QueryScope::Installed)
                .iter()
                .map(native_nevra)
                .collect();
            Ok(touched
                .iter()
                .map(|n| {
                    let state = if installed.contains(&native_nevra(n)) {
                        PackageState::Installed
                    } else {
                        PackageState::Available
                    };
                    to_record(n, state)
                })
                .collect())
        })
        .await
    }

    async fn expire_cache(&self) -> Result<(), PkgError> {
        let binding = Arc::clone(&self.binding);
        run_native(move || binding.expire_cache().map_err(PkgError::BackendError)).await
    }
}

fn goal_op(state: PackageState) -> GoalOp {
    match state {
        PackageState::Installed => GoalOp::Erase,
        PackageState::Update => GoalOp::Upgrade,
        PackageState::Available | PackageState::Downgrade => GoalOp::Install,
    }
}

/// Splits the binding's combined `[epoch:]version-release` identity string.
fn parse_evr(evr: &str) -> (String, String, String) {
    let (epoch, rest) = match evr.split_once(':') {
        Some((epoch, rest)) => (epoch.to_string(), rest),
        None => (String::new(), evr),
    };
    let (version, release) = match rest.rsplit_once('-') {
        Some((version, release)) => (version.to_string(), release.to_string()),
        None => (rest.to_string(), String::new()),
    };
    (epoch, version, release)
}

fn native_nevra(native: &HkPackage) -> Nevra {
    let (epoch, version, release) = parse_evr(&native.evr);
    Nevra {
        name: native.name.clone(),
        epoch,
        version,
        release,
        arch: native.arch.clone(),
    }
}

fn to_record(native: &HkPackage, state: PackageState) -> PackageRecord {
    let nevra = native_nevra(native);
    let mut record = PackageRecord::new(
        &nevra.name,
        &nevra.epoch,
        &nevra.version,
        &nevra.release,
        &nevra.arch,
        &native.repo,
        state,
    );
    record.summary = native.summary.clone();
    record.description = native.description.clone();
    record.size = native.sizes.0;
    record.download_size = native.sizes.1;
    record
}

fn list_packages(binding: &dyn HawkeyBinding, filter: PackageFilter) -> Vec<PackageRecord> {
    let installed_by_na: HashMap<(String, String), Nevra> = binding
        .query(QueryScope::Installed)
        .iter()
        .map(|n| ((n.name.clone(), n.arch.clone()), native_nevra(n)))
        .collect();

    let mut records = match filter {
        PackageFilter::Installed => binding
            .query(QueryScope::Installed)
            .iter()
            .map(|n| to_record(n, PackageState::Installed))
            .collect(),
        PackageFilter::Available => binding
            .query(QueryScope::AvailableLatest)
            .iter()
            .map(|n| annotate_available(n, &installed_by_na))
            .collect(),
        PackageFilter::Updates => {
            let candidates: Vec<PackageRecord> = binding
                .query(QueryScope::Upgrades)
                .iter()
                .map(|n| {
                    let mut record = to_record(n, PackageState::Update);
                    record.ref_to = installed_by_na
                        .get(&(n.name.clone(), n.arch.clone()))
                        .map(|nevra| RefTo {
                            nevra: nevra.clone(),
                            state: PackageState::Installed,
                        });
                    record
                })
                .collect();
            // the same name can land in several repos; keep one candidate
            // per name by repository priority
            let table = RepoPriorityTable::from_repos(&binding.list_repos());
            select_update_candidates(candidates, &table, |name| binding.repos_offering(name))
        }
    };
    dedup_first_seen(&mut records);
    records
}

fn annotate_available(
    native: &HkPackage,
    installed_by_na: &HashMap<(String, String), Nevra>,
) -> PackageRecord {
    let candidate = native_nevra(native);
    match installed_by_na.get(&(native.name.clone(), native.arch.clone())) {
        Some(installed) if candidate.cmp_evr(installed) == std::cmp::Ordering::Greater => {
            let mut record = to_record(native, PackageState::Update);
            record.ref_to = Some(RefTo {
                nevra: installed.clone(),
                state: PackageState::Installed,
            });
            record
        }
        Some(_) => to_record(native, PackageState::Installed),
        None => to_record(native, PackageState::Available),
    }
}

fn dedup_first_seen(records: &mut Vec<PackageRecord>) {
    let mut seen: HashSet<Nevra> = HashSet::new();
    records.retain(|record| {
        if seen.insert(record.nevra()) {
            true
        } else {
            debug!(pkg = %record, "suppressing duplicate query result");
            false
        }
    });
}

fn field_matches(pkg: &PackageRecord, field: SearchField, text: &str) -> bool {
    match field {
        SearchField::Name => {
            if is_glob_pattern(text) {
                glob_match(text, &pkg.name)
            } else {
                pkg.name.to_lowercase().contains(&text.to_lowercase())
            }
        }
        SearchField::Summary => pkg.summary.to_lowercase().contains(&text.to_lowercase()),
        SearchField::Arch => pkg.arch == text,
        SearchField::Repo => pkg.repo_id == text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn native(name: &str, evr: &str, repo: &str) -> HkPackage {
        HkPackage {
            name: name.to_string(),
            evr: evr.to_string(),
            arch: "x86_64".to_string(),
            repo: repo.to_string(),
            summary: String::new(),
            description: format!("{name} description"),
            sizes: (100, 50),
        }
    }

    #[derive(Default)]
    struct MockBinding {
        installed: Vec<HkPackage>,
        available: Vec<HkPackage>,
        upgrades: Vec<HkPackage>,
        repos: Vec<RepoInfo>,
        offering: HashMap<String, Vec<String>>,
        expired: AtomicBool,
    }

    impl HawkeyBinding for MockBinding {
        fn query(&self, scope: QueryScope) -> Vec<HkPackage> {
            match scope {
                QueryScope::Installed => self.installed.clone(),
                QueryScope::AvailableLatest => self.available.clone(),
                QueryScope::Upgrades => self.upgrades.clone(),
            }
        }

        fn repos_offering(&self, name: &str) -> Vec<String> {
            self.offering.get(name).cloned().unwrap_or_default()
        }

        fn list_repos(&self) -> Vec<RepoInfo> {
            self.repos.clone()
        }

        fn attribute(&self, nevra: &str, attr: InfoAttr) -> Option<String> {
            self.installed
                .iter()
                .chain(&self.available)
                .find(|n| native_nevra(n).to_string() == nevra)
                .map(|n| match attr {
                    InfoAttr::Description => n.description.clone(),
                    InfoAttr::Files => "/usr/bin/x".to_string(),
                    InfoAttr::UpdateInfo => "FEDORA-2026-1".to_string(),
                })
        }

        fn expire_cache(&self) -> Result<(), String> {
            self.expired.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn run_goal(&self, _ops: &[(GoalOp, String)]) -> Result<Vec<HkPackage>, String> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_parse_evr() {
        assert_eq!(
            parse_evr("1:5.2-3.fc40"),
            ("1".to_string(), "5.2".to_string(), "3.fc40".to_string())
        );
        assert_eq!(
            parse_evr("9.1-1"),
            (String::new(), "9.1".to_string(), "1".to_string())
        );
    }

    #[tokio::test]
    async fn test_updates_filtered_by_repo_priority() {
        let binding = MockBinding {
            installed: vec![native("pkg", "1.0-1", "base")],
            upgrades: vec![
                native("pkg", "2.0-1", "base"),
                native("pkg", "2.0-1", "epel"),
            ],
            repos: vec![
                RepoInfo::new("base", "Base", true, 1),
                RepoInfo::new("epel", "EPEL", true, 3),
            ],
            offering: HashMap::from([(
                "pkg".to_string(),
                vec!["base".to_string(), "epel".to_string()],
            )]),
            ..Default::default()
        };
        let backend = HawkeyBackend::new(Arc::new(binding));
        let updates = backend.get_packages(PackageFilter::Updates).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].repo_id, "base");
        // the surviving candidate still points back at the installed version
        assert_eq!(
            updates[0].ref_to.as_ref().unwrap().nevra.version,
            "1.0"
        );
    }

    #[tokio::test]
    async fn test_epoch_parsed_from_combined_evr() {
        let binding = MockBinding {
            installed: vec![native("bash", "1:5.2-3", "base")],
            ..Default::default()
        };
        let backend = HawkeyBackend::new(Arc::new(binding));
        let pkgs = backend.get_packages(PackageFilter::Installed).await.unwrap();
        assert_eq!(pkgs[0].epoch, "1");
        assert_eq!(pkgs[0].version, "5.2");
        assert_eq!(pkgs[0].release, "3");
    }

    #[tokio::test]
    async fn test_expire_cache_reaches_binding() {
        let binding = Arc::new(MockBinding::default());
        let backend = HawkeyBackend::new(Arc::clone(&binding) as Arc<dyn HawkeyBinding>);
        backend.expire_cache().await.unwrap();
        assert!(binding.expired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_newer_available_promoted_to_update() {
        let binding = MockBinding {
            installed: vec![native("bash", "5.1-1", "base")],
            available: vec![native("bash", "5.2-1", "updates")],
            ..Default::default()
        };
        let backend = HawkeyBackend::new(Arc::new(binding));
        let pkgs = backend.get_packages(PackageFilter::Available).await.unwrap();
        assert_eq!(pkgs[0].state, PackageState::Update);
    }
}
