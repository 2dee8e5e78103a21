//! Kernel row cache
//!
//! Caches rows of the kernel matrix (or of Q) keyed by the row's current
//! position in the solver's permuted order. Rows may be partially filled:
//! a row cached with `len` entries only holds columns `0..len`, and a
//! later request for a longer row computes the missing tail only.
//!
//! The budget is counted in stored `f64` values. When a new row does not
//! fit, least-recently-used rows are evicted until it does.

use lru::LruCache;

/// Bytes per stored value
const VALUE_BYTES: usize = std::mem::size_of::<f64>();

/// LRU cache of kernel matrix rows
pub struct RowCache {
    rows: LruCache<usize, Vec<f64>>,
    /// Budget in stored values
    capacity: usize,
    /// Values currently stored across all rows
    used: usize,
    hits: u64,
    misses: u64,
}

impl RowCache {
    /// Create a cache for an `l × l` matrix within `bytes` of row storage.
    ///
    /// The budget never drops below two full rows, so the solver can always
    /// hold the rows of both working-set variables.
    pub fn new(l: usize, bytes: usize) -> Self {
        let capacity = (bytes / VALUE_BYTES).max(2 * l);
        Self {
            rows: LruCache::unbounded(),
            capacity,
            used: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Create a cache sized in megabytes, as configured by `cache_size`
    pub fn with_megabytes(l: usize, megabytes: f64) -> Self {
        let bytes = (megabytes.max(0.0) * (1 << 20) as f64) as usize;
        Self::new(l, bytes)
    }

    /// Fetch row `index` with room for at least `len` leading values.
    ///
    /// Returns the row and the number of leading values that were already
    /// valid. The caller must fill `row[start..len]`. The row becomes the
    /// most recently used.
    pub fn get_data(&mut self, index: usize, len: usize) -> (&mut [f64], usize) {
        let cached = self.rows.peek(&index).map_or(0, Vec::len);

        if cached >= len {
            self.hits += 1;
            let row = self.rows.get_or_insert_mut(index, Vec::new);
            return (row.as_mut_slice(), cached);
        }

        self.misses += 1;
        let mut row = self.rows.pop(&index).unwrap_or_default();
        self.used -= row.len();

        while self.used + len > self.capacity {
            match self.rows.pop_lru() {
                Some((evicted, old)) => {
                    log::trace!("evicting cached row {} ({} values)", evicted, old.len());
                    self.used -= old.len();
                }
                None => break,
            }
        }

        row.resize(len, 0.0);
        self.used += len;
        let row = self.rows.get_or_insert_mut(index, move || row);
        (row.as_mut_slice(), cached)
    }

    /// Swap rows `i` and `j`, and columns `i` and `j` inside every cached row.
    ///
    /// A row that holds the smaller of the two columns but not the larger
    /// one cannot be patched and is dropped.
    pub fn swap_index(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }

        let row_i = self.rows.pop(&i);
        let row_j = self.rows.pop(&j);
        if let Some(row) = row_j {
            self.rows.put(i, row);
        }
        if let Some(row) = row_i {
            self.rows.put(j, row);
        }

        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let mut dropped = Vec::new();
        for (&key, row) in self.rows.iter_mut() {
            if row.len() > hi {
                row.swap(lo, hi);
            } else if row.len() > lo {
                dropped.push(key);
            }
        }
        for key in dropped {
            if let Some(row) = self.rows.pop(&key) {
                self.used -= row.len();
            }
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.capacity,
            used: self.used,
            rows: self.rows.len(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Budget in stored values
    pub capacity: usize,
    /// Values currently stored
    pub used: usize,
    /// Rows currently cached
    pub rows: usize,
}

impl CacheStats {
    /// Fraction of row requests served without computing anything
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
