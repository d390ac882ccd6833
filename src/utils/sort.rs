use std::cmp::Ordering;

/// Keep the first `k` elements of `items` under `cmp` and sort them.
/// - `cmp` must be a total order, otherwise the kept set is unspecified
/// - O(n) selection + O(k log k) sort of the survivors
///
/// Large profiles hold far more terms than the cap, so partial selection
/// avoids sorting the tail that is thrown away.
#[inline]
pub fn top_k_by<T, F>(items: &mut Vec<T>, k: usize, mut cmp: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    if k == 0 {
        items.clear();
        return;
    }
    if items.len() > k {
        items.select_nth_unstable_by(k - 1, &mut cmp);
        items.truncate(k);
    }
    items.sort_unstable_by(cmp);
}
