pub use daemon::DaemonBackend;
pub use dnf::DnfBackend;
pub use hawkey::HawkeyBackend;

pub mod daemon;
pub mod dnf;
pub mod hawkey;

use crate::{BackendKind, DnfSack, HawkeyBinding, PackageBackend, PkgError};
use std::sync::Arc;

/// Pair of native bindings a session can be built from; which one is used
/// follows the configured backend type.
pub struct NativeBindings {
    pub dnf: Arc<dyn DnfSack>,
    pub hawkey: Arc<dyn HawkeyBinding>,
}

/// Selects the in-process adapter for the configured backend type. The
/// daemon adapter is not selected here; it is attached separately for the
/// privileged transaction path.
pub fn create_backend(kind: BackendKind, bindings: &NativeBindings) -> Arc<dyn PackageBackend> {
    match kind {
        BackendKind::Dnf => Arc::new(DnfBackend::new(Arc::clone(&bindings.dnf))),
        BackendKind::Hawkey => Arc::new(HawkeyBackend::new(Arc::clone(&bindings.hawkey))),
    }
}

/// Runs a synchronous native-library call off the owning task.
pub(crate) async fn run_native<T, F>(f: F) -> Result<T, PkgError>
where
    F: FnOnce() -> Result<T, PkgError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| PkgError::backend(err.to_string()))?
}
