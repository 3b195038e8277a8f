pub use backend::PackageBackend;
pub use native::{DnfPackage, DnfSack, GoalOp, HawkeyBinding, HkPackage, QueryScope};
pub use progress::{NullProgress, ProgressSink};
pub use settings::{MemorySettings, SettingsStore};
pub use transport::{IpcFailure, IpcReplySender, IpcSignal, IpcSignalSender, IpcTransport};

pub mod backend;
pub mod native;
pub mod progress;
pub mod settings;
pub mod transport;
