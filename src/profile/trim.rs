use std::{cmp::Ordering, collections::HashSet};

use ahash::RandomState;

use crate::{profile::store::Profile, utils::sort::top_k_by};

/// One ranked term of a profile
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTerm<'a> {
    pub term: &'a str,
    pub weight: f64,
    pub count: u64,
}

/// Total order used for trimming
/// weight desc, then raw count desc, then term ascending
#[inline]
pub fn rank_order(a: &RankedTerm<'_>, b: &RankedTerm<'_>) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| b.count.cmp(&a.count))
        .then_with(|| a.term.cmp(b.term))
}

/// The `k` highest ranked terms of a profile, best first
/// Terms without a weight rank as weight 0.
pub fn top_terms(profile: &Profile, k: usize) -> Vec<RankedTerm<'_>> {
    let mut ranked: Vec<RankedTerm<'_>> = profile
        .raw_counts()
        .iter()
        .map(|(term, &count)| RankedTerm {
            term,
            weight: profile.weight(term).unwrap_or(0.0),
            count,
        })
        .collect();
    top_k_by(&mut ranked, k, rank_order);
    ranked
}

/// Term set a trim to `max_terms` keeps
/// `None` when the profile is already within the bound.
pub fn retained_terms(profile: &Profile, max_terms: usize) -> Option<HashSet<Box<str>, RandomState>> {
    if profile.term_num() <= max_terms {
        return None;
    }
    Some(
        top_terms(profile, max_terms)
            .into_iter()
            .map(|ranked| Box::<str>::from(ranked.term))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{profile::store::TermVector, TermFrequency};
    use proptest::prelude::*;

    fn weighted(pairs: &[(&str, u64, f64)]) -> Profile {
        let mut profile = Profile::new();
        let mut freq = TermFrequency::new();
        for &(term, count, _) in pairs {
            freq.add_term_n(term, count);
        }
        profile.fold_counts(&freq);
        let weights: TermVector<f64> = pairs
            .iter()
            .map(|&(term, _, w)| (Box::<str>::from(term), w))
            .collect();
        let revision = profile.revision();
        profile.set_weights(weights, revision);
        profile
    }

    fn sorted(set: HashSet<Box<str>, RandomState>) -> Vec<String> {
        let mut v: Vec<String> = set.into_iter().map(String::from).collect();
        v.sort();
        v
    }

    #[test]
    fn keeps_highest_weights() {
        let profile = weighted(&[("a", 1, 0.9), ("b", 1, 0.5), ("c", 1, 0.7)]);
        let keep = retained_terms(&profile, 2).unwrap();
        assert_eq!(sorted(keep), vec!["a", "c"]);
    }

    #[test]
    fn within_bound_is_none() {
        let profile = weighted(&[("a", 1, 0.9), ("b", 1, 0.5)]);
        assert!(retained_terms(&profile, 2).is_none());
    }

    #[test]
    fn ties_break_on_count_then_term() {
        let profile = weighted(&[("pear", 1, 1.0), ("fig", 3, 1.0), ("apple", 1, 1.0), ("kiwi", 1, 0.2)]);
        let top: Vec<&str> = top_terms(&profile, 3).iter().map(|r| r.term).collect();
        assert_eq!(top, vec!["fig", "apple", "pear"]);
    }

    proptest! {
        #[test]
        fn trimming_is_deterministic_and_bounded(
            entries in prop::collection::btree_map("[a-e]{1,3}", (1u64..5, 0u32..4), 0..40),
            max in 1usize..10,
        ) {
            // 重みを粗く量子化して同値を多く作る
            let pairs: Vec<(String, u64, f64)> = entries
                .into_iter()
                .map(|(t, (c, w))| (t, c, w as f64 * 0.25))
                .collect();
            let borrowed: Vec<(&str, u64, f64)> =
                pairs.iter().map(|(t, c, w)| (t.as_str(), *c, *w)).collect();
            let forward = weighted(&borrowed);
            let mut reversed_pairs = borrowed.clone();
            reversed_pairs.reverse();
            let backward = weighted(&reversed_pairs);

            let a = retained_terms(&forward, max);
            let b = retained_terms(&backward, max);
            prop_assert_eq!(a.clone().map(sorted), b.map(sorted));
            if let Some(keep) = a {
                prop_assert_eq!(keep.len(), max);
            } else {
                prop_assert!(forward.term_num() <= max);
            }
        }
    }
}
