pub use cache::{PackageCache, SharedPackage};
pub use depsolve::{build_transaction, depsolve, PackageQueue};
pub use repo_priority::select_update_candidates;

pub mod cache;
pub mod depsolve;
pub mod repo_priority;
