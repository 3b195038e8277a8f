use crate::backends::run_native;
use crate::{
    glob_match, is_glob_pattern, DnfPackage, DnfSack, GoalOp, InfoAttr, Nevra, PackageBackend,
    PackageFilter, PackageRecord, PackageState, PkgError, RefTo, RepoInfo, SearchField,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Adapter over the synchronous in-process dnf library binding. Native calls
/// may hit disk or network, so every query runs off the owning task.
pub struct DnfBackend {
    sack: Arc<dyn DnfSack>,
}

impl DnfBackend {
    pub fn new(sack: Arc<dyn DnfSack>) -> Self {
        Self { sack }
    }
}

#[async_trait]
impl PackageBackend for DnfBackend {
    async fn get_packages(&self, filter: PackageFilter) -> Result<Vec<PackageRecord>, PkgError> {
        let sack = Arc::clone(&self.sack);
        run_native(move || Ok(list_packages(&*sack, filter))).await
    }

    async fn search(
        &self,
        text: &str,
        field: SearchField,
        limit: usize,
    ) -> Result<Vec<PackageRecord>, PkgError> {
        let sack = Arc::clone(&self.sack);
        let text = text.to_string();
        run_native(move || {
            let mut hits: Vec<PackageRecord> = list_packages(&*sack, PackageFilter::Installed)
                .into_iter()
                .chain(list_packages(&*sack, PackageFilter::Available))
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
        let sack = Arc::clone(&self.sack);
        let nevra = pkg.nevra().to_string();
        run_native(move || match attr {
            InfoAttr::Description => sack
                .description(&nevra)
                .map(Some)
                .ok_or(PkgError::PackageNotFound(nevra)),
            InfoAttr::Files => sack
                .files(&nevra)
                .map(|files| Some(files.join("\n")))
                .ok_or(PkgError::PackageNotFound(nevra)),
            InfoAttr::UpdateInfo => {
                if sack.description(&nevra).is_none() {
                    return Err(PkgError::PackageNotFound(nevra));
                }
                Ok(sack.update_info(&nevra))
            }
        })
        .await
    }

    async fn get_repositories(&self) -> Result<Vec<RepoInfo>, PkgError> {
        let sack = Arc::clone(&self.sack);
        run_native(move || Ok(sack.repositories())).await
    }

    async fn depsolve(&self, pkgs: &[PackageRecord]) -> Result<Vec<PackageRecord>, PkgError> {
        let sack = Arc::clone(&self.sack);
        let ops: Vec<(GoalOp, String)> = pkgs
            .iter()
            .map(|p| (goal_op(p.state), p.nevra().to_string()))
            .collect();
        run_native(move || {
            let touched = sack.resolve_goal(&ops).map_err(PkgError::BackendError)?;
            let installed: HashSet<Nevra> =
                sack.installed().iter().map(|n| native_nevra(n)).collect();
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
}

fn goal_op(state: PackageState) -> GoalOp {
    match state {
        PackageState::Installed => GoalOp::Erase,
        PackageState::Update => GoalOp::Upgrade,
        PackageState::Available | PackageState::Downgrade => GoalOp::Install,
    }
}

fn native_nevra(native: &DnfPackage) -> Nevra {
    let epoch = if native.epoch == 0 {
        String::new()
    } else {
        native.epoch.to_string()
    };
    Nevra {
        name: native.name.clone(),
        epoch,
        version: native.version.clone(),
        release: native.release.clone(),
        arch: native.arch.clone(),
    }
}

fn to_record(native: &DnfPackage, state: PackageState) -> PackageRecord {
    let nevra = native_nevra(native);
    let mut record = PackageRecord::new(
        &nevra.name,
        &nevra.epoch,
        &nevra.version,
        &nevra.release,
        &nevra.arch,
        &native.reponame,
        state,
    );
    record.summary = native.summary.clone();
    record.description = native.description.clone();
    record.size = native.install_size;
    record.download_size = native.download_size;
    record
}

fn list_packages(sack: &dyn DnfSack, filter: PackageFilter) -> Vec<PackageRecord> {
    let installed_by_na: HashMap<(String, String), Nevra> = sack
        .installed()
        .iter()
        .map(|n| {
            let nevra = native_nevra(n);
            ((n.name.clone(), n.arch.clone()), nevra)
        })
        .collect();

    let mut records = match filter {
        PackageFilter::Installed => sack
            .installed()
            .iter()
            .map(|n| to_record(n, PackageState::Installed))
            .collect(),
        PackageFilter::Available => sack
            .available()
            .iter()
            .map(|n| annotate_available(n, &installed_by_na))
            .collect(),
        PackageFilter::Updates => sack
            .upgrades()
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
            .collect(),
    };
    dedup_first_seen(&mut records);
    records
}

/// An available package already installed under the same name and arch is
/// shown as installed, or as a pending update when it is newer.
fn annotate_available(
    native: &DnfPackage,
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

/// Overlapping query unions can yield the same NEVRA twice; the first
/// observation wins and the duplicate is logged, not raised.
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
