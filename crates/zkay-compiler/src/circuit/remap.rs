//! SSA simulation for circuit variables
//!
//! Circuit variables are immutable. Whenever a source variable is written
//! inside the circuit, a fresh circuit variable is created and the
//! [`Remapper`] rebinds the source name to it. Subsequent reads go through
//! [`Remapper::get_current`].

use std::collections::BTreeMap;

use crate::ast::{FunctionId, VarId};

/// Name under which a circuit value is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RemapKey {
    Var(VarId),
    /// The `idx`-th return value of an inlined function
    Return(FunctionId, usize),
}

/// Opaque snapshot of a [`Remapper`]
pub type RemapState<K, V> = BTreeMap<K, V>;

#[derive(Debug, Clone)]
pub struct Remapper<K: Ord + Clone, V: Clone + PartialEq> {
    map: BTreeMap<K, V>,
}

impl<K: Ord + Clone, V: Clone + PartialEq> Default for Remapper<K, V> {
    fn default() -> Self {
        Self { map: BTreeMap::new() }
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> Remapper<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no name is currently rebound
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Rebinds `key` to its newest version
    pub fn remap(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }

    pub fn is_remapped(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// The current binding, or `None` if `key` was never rebound
    pub fn get_current(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn get_state(&self) -> RemapState<K, V> {
        self.map.clone()
    }

    pub fn set_state(&mut self, state: RemapState<K, V>) {
        self.map = state;
    }

    /// Restores a checkpoint taken with [`Remapper::get_state`]
    ///
    /// Bindings of keys for which `persist` holds survive the rollback.
    pub fn rollback(&mut self, mut saved: RemapState<K, V>, persist: impl Fn(&K) -> bool) {
        for (k, v) in std::mem::take(&mut self.map) {
            if persist(&k) {
                saved.insert(k, v);
            }
        }
        self.map = saved;
    }

    /// Forgets the bindings of names which go out of scope
    pub fn drop_keys(&mut self, keys: impl IntoIterator<Item = K>) {
        for k in keys {
            self.map.remove(&k);
        }
    }

    /// Merges the state at the end of the `then` branch into the current
    /// state (the end of the `else` branch)
    ///
    /// Keys bound to the same value in both branches keep that value. For any
    /// other key `merge(key, then_value, else_value)` produces the joined
    /// binding; a side is `None` when the key is unbound there.
    ///
    /// ```
    /// use zkay_compiler::circuit::remap::Remapper;
    ///
    /// let mut r: Remapper<&str, i32> = Remapper::new();
    /// r.remap("a", 1);
    /// r.remap("b", 2);
    /// let saved = r.get_state();
    /// r.remap("a", 10);
    /// let then_state = r.get_state();
    /// r.set_state(saved);
    ///
    /// r.join_branch(then_state, |_, t, e| Ok::<_, ()>(t.unwrap() * 100 + e.unwrap())).unwrap();
    /// assert_eq!(r.get_current(&"a"), Some(&1001));
    /// assert_eq!(r.get_current(&"b"), Some(&2));
    /// ```
    pub fn join_branch<E>(
        &mut self,
        then_state: RemapState<K, V>,
        mut merge: impl FnMut(&K, Option<V>, Option<V>) -> Result<V, E>,
    ) -> Result<(), E> {
        let mut else_state = std::mem::take(&mut self.map);
        let mut joined = BTreeMap::new();
        for (key, then_val) in then_state {
            match else_state.remove(&key) {
                Some(else_val) if else_val == then_val => {
                    joined.insert(key, then_val);
                }
                else_val => {
                    let merged = merge(&key, Some(then_val), else_val)?;
                    joined.insert(key, merged);
                }
            }
        }
        for (key, else_val) in else_state {
            let merged = merge(&key, None, Some(else_val))?;
            joined.insert(key, merged);
        }
        self.map = joined;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_persists_selected_keys() {
        let mut r: Remapper<(bool, &str), u32> = Remapper::new();
        r.remap((false, "state"), 1);
        let saved = r.get_state();
        r.remap((true, "local"), 2);
        r.remap((false, "state"), 3);
        r.rollback(saved, |(is_local, _)| !is_local);
        assert_eq!(r.get_current(&(false, "state")), Some(&3));
        assert!(!r.is_remapped(&(true, "local")));
    }

    #[test]
    fn test_join_single_sided_binding() {
        let mut r: Remapper<&str, u32> = Remapper::new();
        let saved = r.get_state();
        r.remap("v", 7);
        let then_state = r.get_state();
        r.set_state(saved);

        let mut seen = Vec::new();
        r.join_branch(then_state, |k, t, e| {
            seen.push((*k, t, e));
            Ok::<_, ()>(42)
        })
        .unwrap();
        assert_eq!(seen, vec![("v", Some(7), None)]);
        assert_eq!(r.get_current(&"v"), Some(&42));
    }

    #[test]
    fn test_join_else_only_binding() {
        let mut r: Remapper<&str, u32> = Remapper::new();
        let then_state = r.get_state();
        r.remap("w", 5);
        r.join_branch(then_state, |_, t, e| Ok::<_, ()>(t.unwrap_or(0) + e.unwrap_or(0) + 1)).unwrap();
        assert_eq!(r.get_current(&"w"), Some(&6));
    }

    #[test]
    fn test_drop_keys() {
        let mut r: Remapper<u8, u8> = Remapper::new();
        r.remap(1, 1);
        r.remap(2, 2);
        r.drop_keys([1]);
        assert!(!r.is_remapped(&1));
        assert!(r.is_remapped(&2));
        assert!(!r.is_empty());
    }
}
