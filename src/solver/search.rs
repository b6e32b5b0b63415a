//! Level-wise search for inclusion-minimal distinguishing subsets.
//!
//! Each target feature gets a satisfaction bitset over the other corpus
//! methods. A subset's survivors are the AND of its members' bitsets; the
//! subset distinguishes the target when nothing survives.
//!
//! Level `k + 1` is generated from the level-`k` frontier by joining sets
//! that share their first `k - 1` indices. A candidate is only evaluated if
//! every one of its `k`-subsets is in the frontier, i.e. none of them was
//! accepted or found redundant. A subset is redundant when adding its last
//! feature removed no survivor compared to one of its immediate subsets;
//! no superset of a redundant subset can be minimal.

use ahash::AHashMap;
use bitvec::prelude::*;
use smallvec::SmallVec;

/// Canonical feature indices of a subset, ascending.
pub(crate) type SubsetKey = SmallVec<[u16; 8]>;

/// Most features a single search can index.
pub(crate) const MAX_SEARCH_FEATURES: usize = u16::MAX as usize;

/// Counters collected during the search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SearchStats {
    /// Subsets whose survivors were computed
    pub candidates_evaluated: usize,
    /// Subsets dropped because a feature narrowed nothing
    pub pruned_redundant: usize,
    /// Joined subsets skipped because a sub-subset left the frontier
    pub pruned_subsumed: usize,
    /// Deepest subset size examined
    pub levels: usize,
}

/// Raw search result, in canonical index space.
#[derive(Debug, Clone, Default)]
pub(crate) struct SearchResult {
    pub accepted: Vec<SubsetKey>,
    pub stats: SearchStats,
    pub exhausted_budget: bool,
    pub hit_size_limit: bool,
}

pub(crate) struct SearchLimits {
    pub max_subset_size: usize,
    pub max_candidates: usize,
}

struct Node {
    key: SubsetKey,
    survivors: BitVec,
    count: usize,
}

/// Run the search over per-feature satisfaction bitsets.
///
/// `others` is the number of non-target methods; every bitset has that length.
pub(crate) fn minimal_subsets(
    satisfaction: &[BitVec],
    others: usize,
    limits: &SearchLimits,
) -> SearchResult {
    let mut result = SearchResult::default();

    if others == 0 {
        result.accepted.push(SubsetKey::new());
        return result;
    }
    if satisfaction.is_empty() || limits.max_subset_size == 0 {
        return result;
    }

    let mut frontier: Vec<Node> = Vec::new();
    result.stats.levels = 1;
    // callers cap the vector at MAX_SEARCH_FEATURES; anything past it is ignored
    for (index, bits) in (0..=u16::MAX).zip(satisfaction.iter().take(MAX_SEARCH_FEATURES)) {
        if result.stats.candidates_evaluated >= limits.max_candidates {
            result.exhausted_budget = true;
            return result;
        }
        result.stats.candidates_evaluated += 1;

        let count = bits.count_ones();
        let key: SubsetKey = smallvec::smallvec![index];
        if count == 0 {
            result.accepted.push(key);
        } else if count == others {
            result.stats.pruned_redundant += 1;
        } else {
            frontier.push(Node {
                key,
                survivors: bits.clone(),
                count,
            });
        }
    }

    let mut size = 1;
    while !frontier.is_empty() {
        if size >= limits.max_subset_size {
            // nothing larger than the full vector exists
            result.hit_size_limit = size < satisfaction.len().min(MAX_SEARCH_FEATURES);
            break;
        }
        size += 1;
        result.stats.levels = size;

        match next_level(&frontier, satisfaction, limits, &mut result) {
            Some(next) => frontier = next,
            None => {
                result.exhausted_budget = true;
                break;
            }
        }
    }

    result
}

/// Build the next frontier; `None` when the candidate budget runs out.
fn next_level(
    frontier: &[Node],
    satisfaction: &[BitVec],
    limits: &SearchLimits,
    result: &mut SearchResult,
) -> Option<Vec<Node>> {
    let counts: AHashMap<&[u16], usize> = frontier
        .iter()
        .map(|node| (node.key.as_slice(), node.count))
        .collect();

    let mut next = Vec::new();
    let mut group_start = 0;
    while group_start < frontier.len() {
        let prefix = &frontier[group_start].key[..frontier[group_start].key.len() - 1];
        let group_end = frontier[group_start..]
            .iter()
            .position(|node| &node.key[..node.key.len() - 1] != prefix)
            .map_or(frontier.len(), |offset| group_start + offset);

        for left in group_start..group_end {
            for right in left + 1..group_end {
                let base = &frontier[left];
                let added = frontier[right].key[frontier[right].key.len() - 1];

                let mut key = base.key.clone();
                key.push(added);

                let Some(floor) = smallest_subset_count(&key, &counts) else {
                    result.stats.pruned_subsumed += 1;
                    continue;
                };

                if result.stats.candidates_evaluated >= limits.max_candidates {
                    return None;
                }
                result.stats.candidates_evaluated += 1;

                let mut survivors = base.survivors.clone();
                survivors &= satisfaction[usize::from(added)].as_bitslice();
                let count = survivors.count_ones();

                if count == 0 {
                    result.accepted.push(key);
                } else if count == floor {
                    result.stats.pruned_redundant += 1;
                } else {
                    next.push(Node {
                        key,
                        survivors,
                        count,
                    });
                }
            }
        }

        group_start = group_end;
    }

    Some(next)
}

/// Smallest survivor count among the immediate subsets of `key`, or `None`
/// if any of them is missing from the frontier.
fn smallest_subset_count(key: &[u16], counts: &AHashMap<&[u16], usize>) -> Option<usize> {
    let mut smallest = usize::MAX;
    let mut subset: SubsetKey = SmallVec::with_capacity(key.len() - 1);
    for skip in 0..key.len() {
        subset.clear();
        subset.extend(
            key.iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, index)| *index),
        );
        smallest = smallest.min(*counts.get(subset.as_slice())?);
    }
    Some(smallest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(pattern: &str) -> BitVec {
        pattern.chars().map(|c| c == '1').collect()
    }

    fn unlimited() -> SearchLimits {
        SearchLimits {
            max_subset_size: usize::MAX,
            max_candidates: usize::MAX,
        }
    }

    fn keys(result: &SearchResult) -> Vec<Vec<u16>> {
        result.accepted.iter().map(|key| key.to_vec()).collect()
    }

    #[test]
    fn test_single_features_win_immediately() {
        let satisfaction = vec![bits("000"), bits("110"), bits("111")];
        let result = minimal_subsets(&satisfaction, 3, &unlimited());

        assert_eq!(keys(&result), vec![vec![0]]);
        assert_eq!(result.stats.levels, 2);
    }

    #[test]
    fn test_pairs_before_triples() {
        let satisfaction = vec![bits("1100"), bits("0011"), bits("0110"), bits("1001")];
        let result = minimal_subsets(&satisfaction, 4, &unlimited());

        assert_eq!(keys(&result), vec![vec![0, 1], vec![2, 3]]);
        assert!(!result.exhausted_budget);
    }

    #[test]
    fn test_triple_when_no_pair_suffices() {
        let satisfaction = vec![bits("110"), bits("011"), bits("101"), bits("111")];
        let result = minimal_subsets(&satisfaction, 3, &unlimited());

        assert_eq!(keys(&result), vec![vec![0, 1, 2]]);
        assert_eq!(result.stats.pruned_redundant, 1);
        assert_eq!(result.stats.levels, 3);
    }

    #[test]
    fn test_redundant_feature_never_extends() {
        // feature 1 implies feature 0 over the other methods
        let satisfaction = vec![bits("1100"), bits("0100"), bits("1011")];
        let result = minimal_subsets(&satisfaction, 4, &unlimited());

        assert_eq!(keys(&result), vec![vec![1, 2]]);
        assert_eq!(result.stats.pruned_redundant, 1);
    }

    #[test]
    fn test_identical_target_has_no_subsets() {
        let satisfaction = vec![bits("10"), bits("11"), bits("10")];
        let result = minimal_subsets(&satisfaction, 2, &unlimited());

        assert!(result.accepted.is_empty());
        assert!(!result.exhausted_budget);
        assert!(!result.hit_size_limit);
    }

    #[test]
    fn test_lonely_target_needs_no_features() {
        let result = minimal_subsets(&[BitVec::new()], 0, &unlimited());
        assert_eq!(keys(&result), vec![Vec::<u16>::new()]);
    }

    #[test]
    fn test_limits_are_reported() {
        let satisfaction = vec![bits("110"), bits("011"), bits("101")];

        let shallow = minimal_subsets(
            &satisfaction,
            3,
            &SearchLimits {
                max_subset_size: 1,
                max_candidates: usize::MAX,
            },
        );
        assert!(shallow.accepted.is_empty());
        assert!(shallow.hit_size_limit);

        let starved = minimal_subsets(
            &[bits("110"), bits("001"), bits("011")],
            3,
            &SearchLimits {
                max_subset_size: usize::MAX,
                max_candidates: 4,
            },
        );
        assert!(starved.exhausted_budget);
        assert_eq!(starved.stats.candidates_evaluated, 4);
        assert_eq!(keys(&starved), vec![vec![0, 1]]);
    }

    #[test]
    fn test_indices_past_u16_range_are_never_aliased() {
        // index 65536 would wrap to 0 as a u16
        let wrapped = usize::from(u16::MAX) + 1;
        let mut satisfaction = vec![bits("1"); wrapped + 1];
        satisfaction[wrapped] = bits("0");

        let result = minimal_subsets(&satisfaction, 1, &unlimited());

        assert!(result
            .accepted
            .iter()
            .all(|key| key.iter().all(|&i| satisfaction[usize::from(i)].not_any())));
        assert!(result.accepted.is_empty());
    }
}
