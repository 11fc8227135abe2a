use crate::hash::{HashFamily, WyHashFamily};
use crate::key::MphKey;
use crate::rank::RankedBits;
#[cfg(feature = "serde")]
use crate::MphError;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Returned by [`Mphf::index`] when a key matches no level.
pub const NOT_FOUND: u64 = u64::MAX;

/// One cascade level: its bitmap and the number of keys placed by earlier levels.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Level {
    pub(crate) base: u64,
    pub(crate) bits: RankedBits,
}

/// Built minimal perfect hash function over keys of type `K`.
///
/// Maps each key of the construction set to a distinct index in `[0..n)`.
/// Keys outside that set map to an arbitrary index or to [`NOT_FOUND`].
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "", deserialize = "H: Default"))
)]
#[derive(Debug, Clone)]
pub struct Mphf<K, H = WyHashFamily> {
    n: u64,
    seed: u64,
    family_name: String,
    levels: Vec<Level>,
    terminal_base: u64,
    /// Sorted key words that the cascade left unresolved.
    terminal: Vec<u64>,
    #[cfg_attr(feature = "serde", serde(skip))]
    family: H,
    #[cfg_attr(feature = "serde", serde(skip))]
    _key: PhantomData<fn(K) -> K>,
}

/// Size breakdown of a built structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MphfStats {
    pub keys: u64,
    pub levels: usize,
    pub bitmap_bits: u64,
    pub rank_bits: u64,
    pub terminal_keys: usize,
    pub bits_per_key: f64,
}

impl<K: MphKey, H: HashFamily> Mphf<K, H> {
    pub(crate) fn from_parts(
        n: u64,
        seed: u64,
        levels: Vec<Level>,
        terminal_base: u64,
        terminal: Vec<u64>,
        family: H,
    ) -> Self {
        Self {
            n,
            seed,
            family_name: H::NAME.to_string(),
            levels,
            terminal_base,
            terminal,
            family,
            _key: PhantomData,
        }
    }

    /// O(1) expected lookup; [`NOT_FOUND`] if no level claims the key.
    #[inline]
    pub fn index(&self, key: K) -> u64 {
        self.try_index(key).unwrap_or(NOT_FOUND)
    }

    pub fn try_index(&self, key: K) -> Option<u64> {
        let word = key.to_word();
        let pre = self.family.prehash(word, self.seed);
        for (i, level) in self.levels.iter().enumerate() {
            let pos = self.family.position(pre, i as u32, level.bits.len());
            if level.bits.contains(pos) {
                return Some(level.base + level.bits.rank(pos));
            }
        }
        self.terminal
            .binary_search(&word)
            .ok()
            .map(|i| self.terminal_base + i as u64)
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn hash_family(&self) -> &'static str {
        H::NAME
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Bitmap size of each level, in bits.
    pub fn level_sizes(&self) -> Vec<u64> {
        self.levels.iter().map(|l| l.bits.len()).collect()
    }

    /// Bits held by bitmaps, rank samples and the terminal table.
    pub fn total_bits(&self) -> u64 {
        let levels: u64 = self
            .levels
            .iter()
            .map(|l| l.bits.len() + l.bits.index_bits())
            .sum();
        levels + self.terminal.len() as u64 * 64
    }

    pub fn heap_size_bytes(&self) -> usize {
        self.levels
            .iter()
            .map(|l| l.bits.heap_size_bytes())
            .sum::<usize>()
            + self.terminal.len() * std::mem::size_of::<u64>()
    }

    pub fn stats(&self) -> MphfStats {
        let bitmap_bits = self.levels.iter().map(|l| l.bits.len()).sum();
        let rank_bits = self.levels.iter().map(|l| l.bits.index_bits()).sum();
        let bits_per_key = if self.n == 0 {
            0.0
        } else {
            self.total_bits() as f64 / self.n as f64
        };
        MphfStats {
            keys: self.n,
            levels: self.levels.len(),
            bitmap_bits,
            rank_bits,
            terminal_keys: self.terminal.len(),
            bits_per_key,
        }
    }

    #[cfg(feature = "serde")]
    pub fn to_bytes(&self) -> Result<Vec<u8>, MphError> {
        Ok(bincode::serialize(self)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MphError> {
        let mph: Self = bincode::deserialize(bytes)?;
        mph.validate()?;
        Ok(mph)
    }

    #[cfg(feature = "serde")]
    pub fn write_to<W: std::io::Write>(&self, writer: W) -> Result<(), MphError> {
        Ok(bincode::serialize_into(writer, self)?)
    }

    #[cfg(feature = "serde")]
    pub fn read_from<R: std::io::Read>(reader: R) -> Result<Self, MphError> {
        let mph: Self = bincode::deserialize_from(reader)?;
        mph.validate()?;
        Ok(mph)
    }

    /// Structural checks for decoded data; lookups on a structure that
    /// passes them cannot index out of bounds.
    #[cfg(feature = "serde")]
    fn validate(&self) -> Result<(), MphError> {
        if self.family_name != H::NAME {
            return Err(MphError::HashFamilyMismatch {
                expected: H::NAME,
                found: self.family_name.clone(),
            });
        }
        let mut placed = 0u64;
        for level in &self.levels {
            if level.bits.len() == 0 {
                return Err(MphError::Corrupt("empty level bitmap"));
            }
            if !level.bits.is_consistent() {
                return Err(MphError::Corrupt("rank index does not match bitmap"));
            }
            if level.base != placed {
                return Err(MphError::Corrupt("level base offset out of sequence"));
            }
            placed += level.bits.count_ones();
        }
        if self.terminal_base != placed {
            return Err(MphError::Corrupt("terminal base offset out of sequence"));
        }
        if self.terminal.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MphError::Corrupt("terminal table is not strictly sorted"));
        }
        if placed + self.terminal.len() as u64 != self.n {
            return Err(MphError::Corrupt("key count does not match levels"));
        }
        Ok(())
    }
}
