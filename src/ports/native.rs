use crate::{InfoAttr, RepoInfo};

/// Operation submitted to a native resolver goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalOp {
    Install,
    Upgrade,
    Erase,
}

/// Native package object of the dnf library binding: fully split-out
/// identity fields, integer epoch.
#[derive(Debug, Clone)]
pub struct DnfPackage {
    pub name: String,
    pub epoch: i64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub reponame: String,
    pub summary: String,
    pub description: String,
    pub install_size: u64,
    pub download_size: u64,
}

/// In-process dnf library binding. Calls are synchronous and may touch disk
/// or network; adapters run them off the owning task.
pub trait DnfSack: Send + Sync + 'static {
    fn installed(&self) -> Vec<DnfPackage>;

    /// Latest available version per name, source packages excluded.
    fn available(&self) -> Vec<DnfPackage>;

    fn upgrades(&self) -> Vec<DnfPackage>;

    fn repositories(&self) -> Vec<RepoInfo>;

    fn description(&self, nevra: &str) -> Option<String>;

    fn files(&self, nevra: &str) -> Option<Vec<String>>;

    fn update_info(&self, nevra: &str) -> Option<String>;

    /// Resolves a fresh goal built from `ops` (NEVRA strings) and returns
    /// every package the transaction would touch.
    fn resolve_goal(&self, ops: &[(GoalOp, String)]) -> Result<Vec<DnfPackage>, String>;
}

/// Listing scope of the hawkey-style query object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    Installed,
    AvailableLatest,
    Upgrades,
}

/// Native package object of the alternate library binding: identity carried
/// as a single preformatted `evr` string.
#[derive(Debug, Clone)]
pub struct HkPackage {
    pub name: String,
    /// `version-release` or `epoch:version-release`.
    pub evr: String,
    pub arch: String,
    pub repo: String,
    pub summary: String,
    pub description: String,
    /// (installed size, download size) in bytes.
    pub sizes: (u64, u64),
}

/// In-process alternate library binding.
pub trait HawkeyBinding: Send + Sync + 'static {
    fn query(&self, scope: QueryScope) -> Vec<HkPackage>;

    /// Every enabled repository currently offering `name`, consulted by the
    /// repository-priority post-filter on updates.
    fn repos_offering(&self, name: &str) -> Vec<String>;

    fn list_repos(&self) -> Vec<RepoInfo>;

    fn attribute(&self, nevra: &str, attr: InfoAttr) -> Option<String>;

    /// Marks cached repository metadata expired.
    fn expire_cache(&self) -> Result<(), String>;

    fn run_goal(&self, ops: &[(GoalOp, String)]) -> Result<Vec<HkPackage>, String>;
}
