use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Priority assumed for a repository absent from the table.
pub const DEFAULT_PRIORITY: i32 = 99;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
}

impl RepoInfo {
    pub fn new(id: &str, name: &str, enabled: bool, priority: i32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            enabled,
            priority,
        }
    }
}

/// Repository id to priority mapping; lower value wins. Rebuilt per backend
/// session, never persisted.
#[derive(Debug, Clone, Default)]
pub struct RepoPriorityTable {
    priorities: HashMap<String, i32>,
}

impl RepoPriorityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_repos(repos: &[RepoInfo]) -> Self {
        let priorities = repos
            .iter()
            .filter(|r| r.enabled)
            .map(|r| (r.id.clone(), r.priority))
            .collect();
        Self { priorities }
    }

    pub fn priority(&self, repo_id: &str) -> i32 {
        self.priorities
            .get(repo_id)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_repo_gets_default_priority() {
        let table = RepoPriorityTable::from_repos(&[RepoInfo::new("base", "Base", true, 1)]);
        assert_eq!(table.priority("base"), 1);
        assert_eq!(table.priority("copr"), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_disabled_repo_excluded() {
        let table = RepoPriorityTable::from_repos(&[RepoInfo::new("t", "Testing", false, 1)]);
        assert_eq!(table.priority("t"), DEFAULT_PRIORITY);
    }
}
