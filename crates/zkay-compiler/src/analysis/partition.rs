//! Equivalence classes over privacy labels
//!
//! A `PartitionState` records which labels are provably equal at a program
//! point. Labels in the same partition may be used interchangeably by the
//! type checker.

use std::collections::BTreeSet;
use std::fmt;

/// Disjoint sets of elements
///
/// # Examples
///
/// ```
/// use zkay_compiler::PartitionState;
///
/// let mut s = PartitionState::new();
/// s.insert("a");
/// s.insert("b");
/// s.insert("c");
/// s.merge(&"a", &"b");
/// assert!(s.same_partition(&"a", &"b"));
/// assert!(!s.same_partition(&"a", &"c"));
/// ```
#[derive(Clone)]
pub struct PartitionState<T: Ord + Clone> {
    partitions: Vec<BTreeSet<T>>,
}

impl<T: Ord + Clone> Default for PartitionState<T> {
    fn default() -> Self {
        Self { partitions: Vec::new() }
    }
}

impl<T: Ord + Clone> PartitionState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, x: &T) -> Option<usize> {
        self.partitions.iter().position(|p| p.contains(x))
    }

    pub fn has(&self, x: &T) -> bool {
        self.find(x).is_some()
    }

    /// Adds `x` as a singleton; no-op if already present
    pub fn insert(&mut self, x: T) {
        if !self.has(&x) {
            self.partitions.push(BTreeSet::from([x]));
        }
    }

    pub fn remove(&mut self, x: &T) {
        if let Some(i) = self.find(x) {
            self.partitions[i].remove(x);
            if self.partitions[i].is_empty() {
                self.partitions.swap_remove(i);
            }
        }
    }

    pub fn get_partition(&self, x: &T) -> Option<&BTreeSet<T>> {
        self.find(x).map(|i| &self.partitions[i])
    }

    pub fn same_partition(&self, x: &T, y: &T) -> bool {
        if x == y {
            return true;
        }
        match (self.find(x), self.find(y)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Unites the partitions of `x` and `y`
    pub fn merge(&mut self, x: &T, y: &T) {
        let (Some(a), Some(b)) = (self.find(x), self.find(y)) else {
            return;
        };
        if a == b {
            return;
        }
        let (keep, drop) = if a < b { (a, b) } else { (b, a) };
        let moved = self.partitions.swap_remove(drop);
        self.partitions[keep].extend(moved);
    }

    /// Moves `x` out of its partition into the partition of `target`
    pub fn move_to(&mut self, x: &T, target: &T) {
        if self.same_partition(x, target) && self.has(x) {
            return;
        }
        self.remove(x);
        match self.find(target) {
            Some(i) => {
                self.partitions[i].insert(x.clone());
            }
            None => self.insert(x.clone()),
        }
    }

    /// Moves `x` into a fresh singleton partition
    pub fn move_to_separate(&mut self, x: &T) {
        self.remove(x);
        self.insert(x.clone());
    }

    /// Forgets all aliasing, except between elements for which `keep_together` holds
    ///
    /// Elements satisfying `keep_together` that shared a partition stay together.
    pub fn separate_all(&mut self, keep_together: impl Fn(&T) -> bool) {
        let mut out = Vec::new();
        for p in self.partitions.drain(..) {
            let (kept, rest): (BTreeSet<T>, BTreeSet<T>) = p.into_iter().partition(|x| keep_together(x));
            if !kept.is_empty() {
                out.push(kept);
            }
            out.extend(rest.into_iter().map(|x| BTreeSet::from([x])));
        }
        self.partitions = out;
    }

    /// Pessimistic merge of two states: two elements stay aliased only if they
    /// are aliased in both
    pub fn join(&self, other: &Self) -> Self {
        let mut partitions = Vec::new();
        for p in &self.partitions {
            for q in &other.partitions {
                let common: BTreeSet<T> = p.intersection(q).cloned().collect();
                if !common.is_empty() {
                    partitions.push(common);
                }
            }
        }
        Self { partitions }
    }

    pub fn elements(&self) -> impl Iterator<Item = &T> {
        self.partitions.iter().flat_map(|p| p.iter())
    }

    /// Canonical form, independent of insertion order
    pub fn normalized(&self) -> BTreeSet<BTreeSet<T>> {
        self.partitions.iter().cloned().collect()
    }
}

impl<T: Ord + Clone> PartialEq for PartitionState<T> {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl<T: Ord + Clone> Eq for PartitionState<T> {}

impl<T: Ord + Clone + fmt::Debug> fmt::Debug for PartitionState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.normalized()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(xs: &[u32]) -> PartitionState<u32> {
        let mut s = PartitionState::new();
        for x in xs {
            s.insert(*x);
        }
        s
    }

    #[test]
    fn test_merge_is_transitive() {
        let mut s = state(&[1, 2, 3, 4]);
        s.merge(&1, &2);
        s.merge(&2, &3);
        assert!(s.same_partition(&1, &3));
        assert!(!s.same_partition(&1, &4));
    }

    #[test]
    fn test_move_to_leaves_old_partition() {
        let mut s = state(&[1, 2, 3]);
        s.merge(&1, &2);
        s.move_to(&1, &3);
        assert!(s.same_partition(&1, &3));
        assert!(!s.same_partition(&1, &2));
    }

    #[test]
    fn test_separate_all_keeps_marked_elements_together() {
        let mut s = state(&[1, 2, 3, 4]);
        s.merge(&1, &2);
        s.merge(&2, &3);
        s.separate_all(|x| *x <= 2);
        assert!(s.same_partition(&1, &2));
        assert!(!s.same_partition(&1, &3));
        assert!(s.has(&4));
    }

    #[test]
    fn test_join_is_intersection() {
        let mut a = state(&[1, 2, 3]);
        let mut b = state(&[1, 2, 3]);
        a.merge(&1, &2);
        a.merge(&1, &3);
        b.merge(&1, &2);
        let j = a.join(&b);
        assert!(j.same_partition(&1, &2));
        assert!(!j.same_partition(&1, &3));
        assert!(j.has(&3));
    }

    #[test]
    fn test_remove_drops_empty_partition() {
        let mut s = state(&[1]);
        s.remove(&1);
        assert!(!s.has(&1));
        assert_eq!(s, PartitionState::new());
    }

    fn merged(pairs: &[(u32, u32)]) -> PartitionState<u32> {
        let mut s = state(&[0, 1, 2, 3, 4, 5]);
        for (x, y) in pairs {
            s.merge(x, y);
        }
        s
    }

    proptest::proptest! {
        #[test]
        fn test_join_aliases_only_what_both_alias(
            a in proptest::collection::vec((0u32..6, 0u32..6), 0..8),
            b in proptest::collection::vec((0u32..6, 0u32..6), 0..8),
        ) {
            let (a, b) = (merged(&a), merged(&b));
            let j = a.join(&b);
            for x in 0..6 {
                proptest::prop_assert!(j.has(&x));
                for y in 0..6 {
                    proptest::prop_assert_eq!(
                        j.same_partition(&x, &y),
                        a.same_partition(&x, &y) && b.same_partition(&x, &y)
                    );
                }
            }
        }
    }
}
