#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Words covered by one cumulative rank sample (512 bits).
const BLOCK_WORDS: usize = 8;

/// Level bitmap with a block rank index.
///
/// `blocks[i]` holds the number of set bits in `words[..i * 8]`, so a rank
/// query costs one sample read plus at most eight popcounts.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedBits {
    words: Vec<u64>,
    blocks: Vec<u64>,
    ones: u64,
}

impl RankedBits {
    pub fn from_words(words: Vec<u64>) -> Self {
        let (blocks, ones) = block_ranks(&words);
        Self { words, blocks, ones }
    }

    /// Bitmap size in bits.
    #[inline]
    pub fn len(&self) -> u64 {
        self.words.len() as u64 * 64
    }

    #[inline]
    pub fn count_ones(&self) -> u64 {
        self.ones
    }

    #[inline]
    pub fn contains(&self, pos: u64) -> bool {
        let pos = pos as usize;
        (self.word(pos / 64) >> (pos % 64)) & 1 == 1
    }

    /// Number of set bits strictly before `pos`.
    #[inline]
    pub fn rank(&self, pos: u64) -> u64 {
        let pos = pos as usize;
        let w = pos / 64;
        let block = w / BLOCK_WORDS;
        let mut rank = self.block(block);
        for j in block * BLOCK_WORDS..w {
            rank += self.word(j).count_ones() as u64;
        }
        let below = (1u64 << (pos % 64)) - 1;
        rank + (self.word(w) & below).count_ones() as u64
    }

    pub fn index_bits(&self) -> u64 {
        self.blocks.len() as u64 * 64
    }

    pub fn heap_size_bytes(&self) -> usize {
        (self.words.len() + self.blocks.len()) * std::mem::size_of::<u64>()
    }

    /// True when the stored rank samples match the bitmap.
    #[cfg(any(feature = "serde", test))]
    pub fn is_consistent(&self) -> bool {
        let (blocks, ones) = block_ranks(&self.words);
        blocks == self.blocks && ones == self.ones
    }

    #[inline]
    fn word(&self, i: usize) -> u64 {
        #[cfg(feature = "unsafe_optimizations")]
        {
            // SAFETY: callers pass positions below `len()`.
            unsafe { *self.words.get_unchecked(i) }
        }
        #[cfg(not(feature = "unsafe_optimizations"))]
        {
            self.words[i]
        }
    }

    #[inline]
    fn block(&self, i: usize) -> u64 {
        #[cfg(feature = "unsafe_optimizations")]
        {
            // SAFETY: one sample per started block of `words`.
            unsafe { *self.blocks.get_unchecked(i) }
        }
        #[cfg(not(feature = "unsafe_optimizations"))]
        {
            self.blocks[i]
        }
    }
}

fn block_ranks(words: &[u64]) -> (Vec<u64>, u64) {
    let mut blocks = Vec::with_capacity(words.len().div_ceil(BLOCK_WORDS));
    let mut pop = 0u64;
    for (i, w) in words.iter().enumerate() {
        if i % BLOCK_WORDS == 0 {
            blocks.push(pop);
        }
        pop += w.count_ones() as u64;
    }
    (blocks, pop)
}
