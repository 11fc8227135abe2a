use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Seeded hash family feeding the cascade.
///
/// A key is hashed once with the build seed (`prehash`); the value for each
/// level is then derived from that word (`level_hash`). Both must be pure so
/// that construction and every later lookup agree.
pub trait HashFamily: Clone + Default + Send + Sync {
    /// Identifier stored alongside serialized structures.
    const NAME: &'static str;

    fn prehash(&self, word: u64, seed: u64) -> u64;

    fn level_hash(&self, pre: u64, level: u32) -> u64;

    /// Bitmap position of a pre-hashed key at `level`.
    #[inline]
    fn position(&self, pre: u64, level: u32, size: u64) -> u64 {
        self.level_hash(pre, level) % size.max(1)
    }
}

/// One wyhash per key, then splitmix64 per level.
#[derive(Clone, Copy, Debug, Default)]
pub struct WyHashFamily;

impl HashFamily for WyHashFamily {
    const NAME: &'static str = "single-wyhash";

    #[inline]
    fn prehash(&self, word: u64, seed: u64) -> u64 {
        wyhash::wyhash(&word.to_le_bytes(), seed)
    }

    #[inline]
    fn level_hash(&self, pre: u64, level: u32) -> u64 {
        splitmix64(pre.wrapping_add((level as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)))
    }
}

/// Independent xxh3 evaluation per level.
#[derive(Clone, Copy, Debug, Default)]
pub struct Xxh3Family;

impl HashFamily for Xxh3Family {
    const NAME: &'static str = "xxh3";

    #[inline]
    fn prehash(&self, word: u64, seed: u64) -> u64 {
        xxh3_64_with_seed(&word.to_le_bytes(), seed)
    }

    #[inline]
    fn level_hash(&self, pre: u64, level: u32) -> u64 {
        if level == 0 {
            return pre;
        }
        xxh3_64_with_seed(&pre.to_le_bytes(), mix_salt(0x853C_49E6_0A6C_9D39, level))
    }
}

#[inline]
pub(crate) fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Deterministically tweak a base salt by round (FNV-like).
#[inline]
fn mix_salt(base: u64, round: u32) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut h = FNV_OFFSET ^ base;
    h ^= round as u64;
    h = h.wrapping_mul(FNV_PRIME);
    h ^ (h >> 33)
}
