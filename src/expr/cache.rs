use std::collections::{HashMap, VecDeque};

use super::{ExprId, SymbolId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Partial derivative of an expression with respect to a symbol.
    Partial(ExprId, SymbolId),
    /// Total time derivative of an expression.
    TimeDerivative(ExprId),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Memo table for derivative results, owned by the caller and handed to the
/// graph operations that use it.
///
/// Holds at most `capacity` entries; the oldest entry is evicted first.
/// Results are hash-consed nodes, so an evicted entry only costs a
/// recomputation.
pub struct ExprCache {
    capacity: usize,
    entries: HashMap<CacheKey, ExprId>,
    order: VecDeque<CacheKey>,
    stats: CacheStats,
}

impl ExprCache {
    pub fn new(capacity: usize) -> Self {
        ExprCache {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<ExprId> {
        let hit = self.entries.get(key).copied();
        match hit {
            Some(_) => self.stats.hits += 1,
            None => self.stats.misses += 1,
        }
        hit
    }

    pub fn insert(&mut self, key: CacheKey, value: ExprId) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key, value).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;

    #[test]
    fn evicts_oldest_entry() {
        // Arrange
        let mut cache = ExprCache::new(2);
        let keys = [
            CacheKey::TimeDerivative(ExprId(1)),
            CacheKey::TimeDerivative(ExprId(2)),
            CacheKey::Partial(ExprId(3), SymbolId(0)),
        ];

        // Act
        for (i, key) in keys.iter().enumerate() {
            cache.insert(*key, ExprId(10 + i as u32));
        }

        // Assert
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&keys[0]), None);
        assert_eq!(cache.get(&keys[1]), Some(ExprId(11)));
        assert_eq!(cache.get(&keys[2]), Some(ExprId(12)));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 2,
                misses: 1,
                evictions: 1
            }
        );
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        // Arrange
        let mut cache = ExprCache::new(0);

        // Act
        cache.insert(CacheKey::TimeDerivative(ExprId(1)), ExprId(2));

        // Assert
        assert!(cache.is_empty());
    }
}
