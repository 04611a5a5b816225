/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Key/value pairs with stack ordering. Besides `push` and `pop`, a value can be
/// removed by key from anywhere in the stack. Keys are unique: pushing a key that
/// is already present removes the old entry first.
#[derive(Debug)]
pub(crate) struct MapStack<K, V> {
    stack: Vec<K>,
    map: FxHashMap<K, V>,
}

impl<K: Clone + Eq + Hash, V> Default for MapStack<K, V> {
    fn default() -> Self {
        MapStack {
            stack: vec![],
            map: FxHashMap::default(),
        }
    }
}

impl<K: Clone + Eq + Hash, V> MapStack<K, V> {
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// The key on top of the stack.
    pub fn peek_key(&self) -> Option<&K> {
        self.stack.last()
    }

    pub fn has(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    /// Push a value, returning the value previously stored under the same key.
    pub fn push(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.delete(&key);
        self.stack.push(key.clone());
        self.map.insert(key, value);
        previous
    }

    pub fn pop(&mut self) -> Option<(K, V)> {
        let key = self.stack.pop()?;
        let value = self.map.remove(&key)?;
        Some((key, value))
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        let value = self.map.remove(key)?;
        if let Some(index) = self.stack.iter().rposition(|entry| entry == key) {
            self.stack.remove(index);
        }
        Some(value)
    }
}

#[cfg(test)]
mod test {
    use super::MapStack;

    #[test]
    fn pops_in_reverse_push_order() {
        let mut stack = MapStack::default();
        stack.push("a", 1);
        stack.push("b", 2);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.peek_key(), Some(&"b"));
        assert_eq!(stack.pop(), Some(("b", 2)));
        assert_eq!(stack.pop(), Some(("a", 1)));
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn delete_removes_from_the_middle() {
        let mut stack = MapStack::default();
        stack.push("a", 1);
        stack.push("b", 2);
        stack.push("c", 3);
        assert_eq!(stack.delete(&"b"), Some(2));
        assert_eq!(stack.delete(&"b"), None);
        assert!(!stack.has(&"b"));
        assert_eq!(stack.pop(), Some(("c", 3)));
        assert_eq!(stack.pop(), Some(("a", 1)));
    }

    #[test]
    fn pushing_an_existing_key_moves_it_to_the_top() {
        let mut stack = MapStack::default();
        stack.push("a", 1);
        stack.push("b", 2);
        assert_eq!(stack.push("a", 3), Some(1));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.get(&"a"), Some(&3));
        assert_eq!(stack.peek_key(), Some(&"a"));
        assert_eq!(stack.pop(), Some(("a", 3)));
        assert_eq!(stack.pop(), Some(("b", 2)));
    }
}
