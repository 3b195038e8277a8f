use crate::{Nevra, PackageBackend, PackageFilter, PackageRecord, PackageState, PkgError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Canonical package record shared between the cache, the queue and the
/// presenter. Identity stability means handing out the same `Arc` for the
/// same NEVRA across queries.
pub type SharedPackage = Arc<Mutex<PackageRecord>>;

/// Deduplicates package observations across repeated queries. Not designed
/// for concurrent mutation; all operations run on the owning task.
#[derive(Default)]
pub struct PackageCache {
    by_nevra: HashMap<Nevra, SharedPackage>,
    by_filter: HashMap<PackageFilter, Vec<SharedPackage>>,
}

impl PackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts an unseen record as canonical, or merges the observation into
    /// the existing canonical record. The canonical record is returned
    /// either way; the incoming instance is discarded on merge.
    pub fn get_package(&mut self, incoming: PackageRecord) -> SharedPackage {
        let key = incoming.nevra();
        if let Some(canonical) = self.by_nevra.get(&key) {
            let mut held = canonical.lock().unwrap();
            // newest selection wins so queue ordering follows the latest
            // requested operation
            held.action = incoming.action;
            if incoming.state != held.state {
                if merge_allowed(held.state, incoming.state) {
                    held.state = incoming.state;
                    if incoming.ref_to.is_some() {
                        held.ref_to = incoming.ref_to;
                    }
                } else if held.state == PackageState::Downgrade
                    || incoming.state == PackageState::Downgrade
                {
                    // behavior for conflicting downgrade observations is
                    // undefined upstream; keep the canonical state
                    warn!(pkg = %held.nevra(), from = ?held.state, to = ?incoming.state,
                        "ignoring downgrade state conflict");
                } else {
                    debug!(pkg = %held.nevra(), from = ?held.state, to = ?incoming.state,
                        "rejected state merge");
                }
            }
            drop(held);
            Arc::clone(canonical)
        } else {
            let shared = Arc::new(Mutex::new(incoming));
            self.by_nevra.insert(key, Arc::clone(&shared));
            shared
        }
    }

    /// Resolves a `ref_to` relation to its canonical record, if cached.
    pub fn lookup(&self, nevra: &Nevra) -> Option<SharedPackage> {
        self.by_nevra.get(nevra).map(Arc::clone)
    }

    /// Returns the cached result list for `filter`, querying the backend
    /// only on first use or when `reset` is set. The filter string is
    /// validated before the backend is touched.
    pub async fn get_packages_by_filter(
        &mut self,
        filter: &str,
        reset: bool,
        backend: &dyn PackageBackend,
    ) -> Result<Vec<SharedPackage>, PkgError> {
        let parsed: PackageFilter = filter.parse()?;
        if reset {
            self.by_filter.remove(&parsed);
        }
        if let Some(cached) = self.by_filter.get(&parsed) {
            return Ok(cached.clone());
        }
        let records = backend.get_packages(parsed).await?;
        let shared: Vec<SharedPackage> =
            records.into_iter().map(|r| self.get_package(r)).collect();
        self.by_filter.insert(parsed, shared.clone());
        Ok(shared)
    }
}

/// One-directional state precedence: once a package is known installed or
/// updatable it never silently reverts to merely available.
fn merge_allowed(from: PackageState, to: PackageState) -> bool {
    matches!(
        (from, to),
        (PackageState::Available, PackageState::Update)
            | (PackageState::Installed, PackageState::Update)
            | (PackageState::Available, PackageState::Installed)
    )
}
