use crate::PkgError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Settings key holding the unix timestamp of the last metadata refresh.
pub const KEY_METADATA_LAST_REFRESH: &str = "metadata-last-refresh";
/// Settings key holding the refresh interval in seconds.
pub const KEY_METADATA_EXPIRE_INTERVAL: &str = "metadata-expire-interval";

/// Which in-process library binding backs the session. The daemon backend is
/// not selectable here; it is attached separately for the privileged
/// transaction path.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Dnf,
    Hawkey,
}

impl FromStr for BackendKind {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dnf" => Ok(BackendKind::Dnf),
            "hawkey" => Ok(BackendKind::Hawkey),
            other => Err(PkgError::ConfigError(format!(
                "unknown backend type `{other}`"
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionConfig {
    pub backend: BackendKind,
    /// Seconds before cached repository metadata is considered stale.
    pub metadata_expire_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Dnf,
            metadata_expire_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("hawkey".parse::<BackendKind>().unwrap(), BackendKind::Hawkey);
        assert!("apt".parse::<BackendKind>().is_err());
    }
}
