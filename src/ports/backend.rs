use crate::{InfoAttr, PackageFilter, PackageRecord, PkgError, RepoInfo, SearchField};
use async_trait::async_trait;

/// Contract every package-management backend implements. The canonical
/// `PackageRecord` is the only type crossing this boundary; the rest of the
/// core stays backend-agnostic.
#[async_trait]
pub trait PackageBackend: Send + Sync {
    async fn get_packages(&self, filter: PackageFilter) -> Result<Vec<PackageRecord>, PkgError>;

    /// Free-text search over one field. NAME patterns containing a wildcard
    /// character are matched as globs.
    async fn search(
        &self,
        text: &str,
        field: SearchField,
        limit: usize,
    ) -> Result<Vec<PackageRecord>, PkgError>;

    /// Lazily fetched detail attribute. A package the backend cannot locate
    /// is an error here, unlike during bulk result assembly.
    async fn get_package_info(
        &self,
        pkg: &PackageRecord,
        attr: InfoAttr,
    ) -> Result<Option<String>, PkgError>;

    async fn get_repositories(&self) -> Result<Vec<RepoInfo>, PkgError>;

    /// Dependency closure for the given install/update/remove set. Resets
    /// any prior goal state before resolving. Resolver failures are returned
    /// as `Err` and absorbed by the depsolve engine, not by callers.
    async fn depsolve(&self, pkgs: &[PackageRecord]) -> Result<Vec<PackageRecord>, PkgError>;

    /// Force repository metadata to be considered stale before the next
    /// updates query. Only meaningful for backends owning a metadata cache.
    async fn expire_cache(&self) -> Result<(), PkgError> {
        Ok(())
    }
}
