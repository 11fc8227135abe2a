#[cfg(feature = "parallel")]
use std::sync::atomic::{AtomicU64, Ordering};

/// Plain bit set backed by 64-bit words.
#[derive(Debug, Clone)]
pub struct BitSet {
    bits: Vec<u64>,
}

impl BitSet {
    pub fn new(n: usize) -> Self {
        let words = n.div_ceil(64);
        Self { bits: vec![0; words] }
    }
    #[inline]
    pub fn test(&self, idx: usize) -> bool {
        let (w, b) = (idx / 64, idx % 64);
        (self.bits[w] >> b) & 1 == 1
    }
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let (w, b) = (idx / 64, idx % 64);
        self.bits[w] |= 1u64 << b;
    }
    /// Sets the bit and reports whether it was clear before.
    #[inline]
    pub fn insert(&mut self, idx: usize) -> bool {
        let fresh = !self.test(idx);
        self.set(idx);
        fresh
    }
    pub fn into_words(self) -> Vec<u64> {
        self.bits
    }
}

/// Bit set shared between rayon workers during a count pass.
#[cfg(feature = "parallel")]
#[derive(Debug)]
pub struct AtomicBitSet {
    bits: Vec<AtomicU64>,
}

#[cfg(feature = "parallel")]
impl AtomicBitSet {
    pub fn new(n: usize) -> Self {
        let words = n.div_ceil(64);
        Self {
            bits: (0..words).map(|_| AtomicU64::new(0)).collect(),
        }
    }
    #[inline]
    pub fn test(&self, idx: usize) -> bool {
        let (w, b) = (idx / 64, idx % 64);
        (self.bits[w].load(Ordering::Relaxed) >> b) & 1 == 1
    }
    /// Sets the bit and reports whether this call was the one that set it.
    /// Exactly one concurrent caller per position observes `true`.
    #[inline]
    pub fn insert(&self, idx: usize) -> bool {
        let (w, b) = (idx / 64, idx % 64);
        let mask = 1u64 << b;
        self.bits[w].fetch_or(mask, Ordering::Relaxed) & mask == 0
    }
    pub fn into_bitset(self) -> BitSet {
        BitSet {
            bits: self.bits.into_iter().map(AtomicU64::into_inner).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_first_set() {
        let mut bs = BitSet::new(130);
        assert!(bs.insert(129));
        assert!(!bs.insert(129));
        assert!(bs.test(129));
        assert!(!bs.test(128));
        assert_eq!(bs.into_words().len(), 3);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn atomic_insert_is_exclusive() {
        use rayon::prelude::*;

        let bs = AtomicBitSet::new(256);
        let winners: usize = (0..64)
            .into_par_iter()
            .map(|_| bs.insert(77) as usize)
            .sum();
        assert_eq!(winners, 1);
        assert!(bs.test(77));
        let plain = bs.into_bitset();
        assert!(plain.test(77));
        assert!(!plain.test(76));
    }
}
