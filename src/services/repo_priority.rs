use crate::{PackageRecord, RepoPriorityTable, DEFAULT_PRIORITY};
use std::cmp::Ordering;
use tracing::debug;

/// Picks exactly one update candidate per package name when several
/// repositories offer conflicting versions: a candidate survives only if its
/// repository's priority equals the minimum priority over every repository
/// offering that name, and among surviving same-name candidates the highest
/// EVR wins. Dropped candidates are logged, never reported as errors.
pub fn select_update_candidates<F>(
    candidates: Vec<PackageRecord>,
    table: &RepoPriorityTable,
    offering_repos: F,
) -> Vec<PackageRecord>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut kept: Vec<PackageRecord> = Vec::new();
    for candidate in candidates {
        let best = offering_repos(&candidate.name)
            .iter()
            .map(|repo| table.priority(repo))
            .min()
            .unwrap_or(DEFAULT_PRIORITY);
        if table.priority(&candidate.repo_id) != best {
            debug!(pkg = %candidate, repo = %candidate.repo_id,
                "dropping update candidate from lower-priority repo");
            continue;
        }
        match kept.iter_mut().find(|k| k.name == candidate.name) {
            Some(existing) => {
                if candidate.cmp_evr(existing) == Ordering::Greater {
                    *existing = candidate;
                } else {
                    debug!(pkg = %candidate, "dropping older same-name candidate");
                }
            }
            None => kept.push(candidate),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PackageState, RepoInfo};

    fn candidate(version: &str, repo: &str) -> PackageRecord {
        PackageRecord::new("pkg", "", version, "1", "x86_64", repo, PackageState::Update)
    }

    fn table() -> RepoPriorityTable {
        RepoPriorityTable::from_repos(&[
            RepoInfo::new("base", "Base", true, 1),
            RepoInfo::new("updates", "Updates", true, 2),
            RepoInfo::new("epel", "EPEL", true, 3),
        ])
    }

    #[test]
    fn test_keeps_only_most_preferred_repo() {
        let candidates = vec![
            candidate("2.0", "epel"),
            candidate("2.0", "base"),
            candidate("2.0", "updates"),
        ];
        let offering = |_: &str| vec!["base".to_string(), "updates".to_string(), "epel".to_string()];
        let kept = select_update_candidates(candidates, &table(), offering);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].repo_id, "base");
    }

    #[test]
    fn test_newest_version_wins_on_priority_tie() {
        let shared = RepoPriorityTable::from_repos(&[
            RepoInfo::new("a", "A", true, 1),
            RepoInfo::new("b", "B", true, 1),
        ]);
        let candidates = vec![candidate("1.0", "a"), candidate("2.0", "b")];
        let offering = |_: &str| vec!["a".to_string(), "b".to_string()];
        let kept = select_update_candidates(candidates, &shared, offering);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].version, "2.0");
    }

    #[test]
    fn test_unknown_repo_treated_as_default_priority() {
        let candidates = vec![candidate("1.0", "copr"), candidate("1.0", "base")];
        let offering = |_: &str| vec!["copr".to_string(), "base".to_string()];
        let kept = select_update_candidates(candidates, &table(), offering);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].repo_id, "base");
    }

    #[test]
    fn test_independent_names_each_survive() {
        let mut other = candidate("1.0", "base");
        other.name = "otherpkg".to_string();
        let candidates = vec![candidate("1.0", "base"), other];
        let offering = |_: &str| vec!["base".to_string()];
        let kept = select_update_candidates(candidates, &table(), offering);
        assert_eq!(kept.len(), 2);
    }
}
