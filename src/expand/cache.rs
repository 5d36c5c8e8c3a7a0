//! Expansion Caches
//!
//! Small bounded LRU caches for the pure expansion steps. Globbing walks
//! the filesystem and arithmetic re-evaluates identical expressions in
//! loops; both are cached with explicit invalidation on assignment, `cd`,
//! and trap execution. Parameter lookup itself is a hash access and needs
//! no cache in front of it.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::hash::Hash;

/// A bounded map that evicts the least recently used entry.
#[derive(Debug, Clone)]
pub struct LruCache<K: Eq + Hash + Clone, V: Clone> {
    map: HashMap<K, V>,
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        if self.map.contains_key(key) {
            self.touch(key);
        }
        self.map.get(key).cloned()
    }

    pub fn put(&mut self, key: K, value: V) {
        if self.map.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
            if self.order.len() > self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.map.remove(&oldest);
                }
            }
        } else {
            self.touch(&key);
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
            self.order.push_back(key.clone());
        }
    }
}

/// The cache set carried by the shell state.
#[derive(Debug, Clone)]
pub struct ExpansionCaches {
    /// (cwd, pattern) → sorted matches
    pub glob: LruCache<(String, String), Vec<String>>,
    /// (expression text, free-variable snapshot) → value
    pub arith: LruCache<(String, String), i64>,
    /// user name → home directory
    pub user_home: LruCache<String, String>,
}

impl ExpansionCaches {
    pub fn new(capacity: usize) -> Self {
        Self {
            glob: LruCache::new(capacity),
            arith: LruCache::new(capacity),
            user_home: LruCache::new(capacity),
        }
    }

    /// Invalidate everything that may depend on shell state.
    pub fn invalidate(&mut self) {
        self.glob.clear();
        self.arith.clear();
    }
}

impl Default for ExpansionCaches {
    fn default() -> Self {
        Self::new(256)
    }
}

// ============================================================================
// Tests
// ============================================================================
