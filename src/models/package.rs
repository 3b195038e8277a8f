use crate::PkgError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Display state of a package as reported by a backend query.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    Available,
    Installed,
    Update,
    Downgrade,
}

/// Pending action, used only to order entries in the transaction queue.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    None,
    Install,
    Upgrade,
    Downgrade,
    Reinstall,
    Erase,
}

impl PackageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageAction::None => "none",
            PackageAction::Install => "install",
            PackageAction::Upgrade => "upgrade",
            PackageAction::Downgrade => "downgrade",
            PackageAction::Reinstall => "reinstall",
            PackageAction::Erase => "erase",
        }
    }
}

/// Operation explicitly requested for a queued package.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageTodo {
    None,
    Install,
    Remove,
    Update,
    Reinstall,
    Downgrade,
    DistroSync,
}

impl PackageTodo {
    /// Default operation implied by a package's current state.
    pub fn from_state(state: PackageState) -> Self {
        match state {
            PackageState::Installed => PackageTodo::Remove,
            PackageState::Update => PackageTodo::Update,
            PackageState::Available => PackageTodo::Install,
            PackageState::Downgrade => PackageTodo::Downgrade,
        }
    }

    pub fn action(&self) -> PackageAction {
        match self {
            PackageTodo::None => PackageAction::None,
            PackageTodo::Install => PackageAction::Install,
            PackageTodo::Remove => PackageAction::Erase,
            PackageTodo::Update | PackageTodo::DistroSync => PackageAction::Upgrade,
            PackageTodo::Reinstall => PackageAction::Reinstall,
            PackageTodo::Downgrade => PackageAction::Downgrade,
        }
    }
}

/// Canonical package identity: name, epoch, version, release, arch.
///
/// An empty epoch means "0"; equality and hashing normalize the two so that
/// observations from backends that report epochs differently still collide.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Nevra {
    pub name: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl Nevra {
    pub fn new(name: &str, epoch: &str, version: &str, release: &str, arch: &str) -> Self {
        Self {
            name: name.to_string(),
            epoch: epoch.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
        }
    }

    pub fn epoch_or_zero(&self) -> &str {
        if self.epoch.is_empty() { "0" } else { &self.epoch }
    }

    /// Orders two identities by epoch, version, release (rpm semantics).
    /// Name and arch are not consulted.
    pub fn cmp_evr(&self, other: &Nevra) -> Ordering {
        let ea: u64 = self.epoch_or_zero().parse().unwrap_or(0);
        let eb: u64 = other.epoch_or_zero().parse().unwrap_or(0);
        ea.cmp(&eb)
            .then_with(|| rpm_vercmp(&self.version, &other.version))
            .then_with(|| rpm_vercmp(&self.release, &other.release))
    }
}

impl PartialEq for Nevra {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.epoch_or_zero() == other.epoch_or_zero()
            && self.version == other.version
            && self.release == other.release
            && self.arch == other.arch
    }
}

impl Eq for Nevra {}

impl Hash for Nevra {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.epoch_or_zero().hash(state);
        self.version.hash(state);
        self.release.hash(state);
        self.arch.hash(state);
    }
}

impl FromStr for Nevra {
    type Err = PkgError;

    /// Parses the human rendering `name-[epoch:]version-release.arch`.
    /// Dashes in the name are fine; version and release never contain one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, arch) = s
            .rsplit_once('.')
            .ok_or_else(|| PkgError::MalformedId(s.to_string()))?;
        let (rest, release) = rest
            .rsplit_once('-')
            .ok_or_else(|| PkgError::MalformedId(s.to_string()))?;
        let (name, version) = rest
            .rsplit_once('-')
            .ok_or_else(|| PkgError::MalformedId(s.to_string()))?;
        let (epoch, version) = match version.split_once(':') {
            Some((epoch, version)) => (epoch, version),
            None => ("", version),
        };
        if name.is_empty() || version.is_empty() {
            return Err(PkgError::MalformedId(s.to_string()));
        }
        Ok(Nevra::new(name, epoch, version, release, arch))
    }
}

impl fmt::Display for Nevra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch.is_empty() {
            write!(
                f,
                "{}-{}-{}.{}",
                self.name, self.version, self.release, self.arch
            )
        } else {
            write!(
                f,
                "{}-{}:{}-{}.{}",
                self.name, self.epoch, self.version, self.release, self.arch
            )
        }
    }
}

/// Non-owning back-reference to another record plus the state that reference
/// should carry, resolved through the package cache.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RefTo {
    pub nevra: Nevra,
    pub state: PackageState,
}

/// Canonical package record, the only type crossing the backend boundary.
///
/// Equality and hashing are defined solely by NEVRA; two records with the
/// same identity are the same package even when state or action differ.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PackageRecord {
    pub name: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub repo_id: String,
    pub summary: String,
    pub description: String,
    pub size: u64,
    pub download_size: u64,
    pub state: PackageState,
    pub action: PackageAction,
    pub is_dep: bool,
    pub queued: bool,
    pub todo: PackageTodo,
    pub ref_to: Option<RefTo>,
}

impl PackageRecord {
    pub fn new(
        name: &str,
        epoch: &str,
        version: &str,
        release: &str,
        arch: &str,
        repo_id: &str,
        state: PackageState,
    ) -> Self {
        Self {
            name: name.to_string(),
            epoch: epoch.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
            repo_id: repo_id.to_string(),
            summary: String::new(),
            description: String::new(),
            size: 0,
            download_size: 0,
            state,
            action: PackageAction::None,
            is_dep: false,
            queued: false,
            todo: PackageTodo::None,
            ref_to: None,
        }
    }

    pub fn nevra(&self) -> Nevra {
        Nevra::new(
            &self.name,
            &self.epoch,
            &self.version,
            &self.release,
            &self.arch,
        )
    }

    /// Backend-facing identifier: `name,epoch,version,release,arch,repo`
    /// with the epoch defaulting to "0" when empty.
    pub fn id(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.name,
            if self.epoch.is_empty() { "0" } else { &self.epoch },
            self.version,
            self.release,
            self.arch,
            self.repo_id
        )
    }

    pub fn cmp_evr(&self, other: &PackageRecord) -> Ordering {
        self.nevra().cmp_evr(&other.nevra())
    }
}

impl FromStr for PackageRecord {
    type Err = PkgError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = id.split(',').collect();
        let &[name, epoch, version, release, arch, repo] = fields.as_slice() else {
            return Err(PkgError::MalformedId(id.to_string()));
        };
        if name.is_empty() || version.is_empty() {
            return Err(PkgError::MalformedId(id.to_string()));
        }
        Ok(PackageRecord::new(
            name,
            epoch,
            version,
            release,
            arch,
            repo,
            PackageState::Available,
        ))
    }
}

impl PartialEq for PackageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.nevra() == other.nevra()
    }
}

impl Eq for PackageRecord {}

impl Hash for PackageRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nevra().hash(state);
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.nevra().fmt(f)
    }
}

/// rpm version segment comparison: split into runs of digits or letters,
/// compare numerically or lexically per run, numeric runs sort newer than
/// alphabetic ones, `~` sorts before anything including the empty string.
pub fn rpm_vercmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);
    loop {
        while i < a.len() && !a[i].is_ascii_alphanumeric() && a[i] != b'~' {
            i += 1;
        }
        while j < b.len() && !b[j].is_ascii_alphanumeric() && b[j] != b'~' {
            j += 1;
        }
        let ta = i < a.len() && a[i] == b'~';
        let tb = j < b.len() && b[j] == b'~';
        match (ta, tb) {
            (true, true) => {
                i += 1;
                j += 1;
                continue;
            }
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        if i >= a.len() || j >= b.len() {
            break;
        }
        let numeric = a[i].is_ascii_digit();
        let start_a = i;
        while i < a.len()
            && (numeric && a[i].is_ascii_digit() || !numeric && a[i].is_ascii_alphabetic())
        {
            i += 1;
        }
        let start_b = j;
        while j < b.len()
            && (numeric && b[j].is_ascii_digit() || !numeric && b[j].is_ascii_alphabetic())
        {
            j += 1;
        }
        if start_b == j {
            // mismatched run classes; the numeric side is newer
            return if numeric { Ordering::Greater } else { Ordering::Less };
        }
        let seg_a = &a[start_a..i];
        let seg_b = &b[start_b..j];
        let ord = if numeric {
            let seg_a = trim_leading_zeros(seg_a);
            let seg_b = trim_leading_zeros(seg_b);
            seg_a.len().cmp(&seg_b.len()).then_with(|| seg_a.cmp(seg_b))
        } else {
            seg_a.cmp(seg_b)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    (i < a.len()).cmp(&(j < b.len()))
}

fn trim_leading_zeros(seg: &[u8]) -> &[u8] {
    let first = seg.iter().position(|&c| c != b'0').unwrap_or(seg.len());
    &seg[first..]
}
