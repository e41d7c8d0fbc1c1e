//! Compact per-sector bitset.

/// A simple bitset for tracking sector states.
///
/// Used for the engine's allocation map and for the memory store's
/// written-sector tracking. Backed by `u64` words.
#[derive(Debug, Clone)]
pub struct SectorBitSet {
    bits: Vec<u64>,
    len: usize,
}

impl SectorBitSet {
    /// Create a new bitset with capacity for the given number of sectors.
    ///
    /// All bits are initially unset (false).
    pub fn new(num_sectors: usize) -> Self {
        let num_words = num_sectors.div_ceil(64);
        Self {
            bits: vec![0; num_words],
            len: num_sectors,
        }
    }

    /// Set the bit for the given sector.
    ///
    /// # Panics
    ///
    /// Panics if `sector` is out of bounds.
    pub fn set(&mut self, sector: usize) {
        assert!(sector < self.len, "sector index out of bounds");
        self.bits[sector / 64] |= 1 << (sector % 64);
    }

    /// Check if the bit for the given sector is set.
    ///
    /// # Panics
    ///
    /// Panics if `sector` is out of bounds.
    pub fn is_set(&self, sector: usize) -> bool {
        assert!(sector < self.len, "sector index out of bounds");
        (self.bits[sector / 64] & (1 << (sector % 64))) != 0
    }

    /// Index of the first unset bit at or after `from`, if any.
    pub fn first_clear_from(&self, from: usize) -> Option<usize> {
        let mut word_idx = from / 64;
        let mut mask = !0u64 << (from % 64);
        while word_idx < self.bits.len() {
            let free = !self.bits[word_idx] & mask;
            if free != 0 {
                let idx = word_idx * 64 + free.trailing_zeros() as usize;
                return (idx < self.len).then_some(idx);
            }
            word_idx += 1;
            mask = !0;
        }
        None
    }

    /// Number of set bits.
    pub fn count_set(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Return the number of sectors this bitset can track.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the bitset is empty (has zero capacity).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
