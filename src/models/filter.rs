use crate::PkgError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base package listing filter shared by all backends.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageFilter {
    Installed,
    Available,
    Updates,
}

impl PackageFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageFilter::Installed => "installed",
            PackageFilter::Available => "available",
            PackageFilter::Updates => "updates",
        }
    }
}

impl FromStr for PackageFilter {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installed" => Ok(PackageFilter::Installed),
            "available" => Ok(PackageFilter::Available),
            "updates" => Ok(PackageFilter::Updates),
            other => Err(PkgError::invalid_argument(format!(
                "unknown package filter `{other}`"
            ))),
        }
    }
}

impl fmt::Display for PackageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field a free-text search matches against.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Name,
    Summary,
    Arch,
    Repo,
}

impl FromStr for SearchField {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SearchField::Name),
            "summary" => Ok(SearchField::Summary),
            "arch" => Ok(SearchField::Arch),
            "repo" => Ok(SearchField::Repo),
            other => Err(PkgError::invalid_argument(format!(
                "unknown search field `{other}`"
            ))),
        }
    }
}

/// Detail attribute fetched lazily for a single package.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoAttr {
    Description,
    Files,
    UpdateInfo,
}

impl FromStr for InfoAttr {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "description" => Ok(InfoAttr::Description),
            "files" => Ok(InfoAttr::Files),
            "updateinfo" => Ok(InfoAttr::UpdateInfo),
            other => Err(PkgError::invalid_argument(format!(
                "unknown info attribute `{other}`"
            ))),
        }
    }
}

/// True when a NAME search pattern should be treated as a glob.
pub fn is_glob_pattern(text: &str) -> bool {
    text.contains(['*', '?'])
}

/// Minimal glob match supporting `*` (any run) and `?` (single char).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => inner(&p[1..], t) || (!t.is_empty() && inner(p, &t[1..])),
            (Some(b'?'), Some(_)) => inner(&p[1..], &t[1..]),
            (Some(c), Some(d)) if c == d => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}
