use crate::hash::{HashFamily, WyHashFamily};
use crate::key::MphKey;
use crate::mphf::{Level, Mphf};
use crate::rank::RankedBits;
use crate::util::BitSet;
use crate::MphError;
use hashbrown::HashSet;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::{debug, info, info_span, warn};

/// Keys handed to one rayon task during a parallel pass.
#[cfg(feature = "parallel")]
const CHUNK: usize = 1 << 16;

/// Largest accepted load factor. Beyond it a level bitmap outweighs the keys themselves.
pub const MAX_GAMMA: f64 = 100.0;

/// Build parameters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    /// Load factor: bitmap bits per remaining key at every level, in `(1.0, MAX_GAMMA]`.
    /// Larger values spend more bits and converge in fewer levels.
    pub gamma: f64,
    /// Seed for the hash family. Equal seeds give equal structures.
    pub seed: u64,
    /// Levels tried before the remainder goes to the terminal table.
    pub max_levels: u32,
    /// Largest remainder the terminal table accepts; beyond it the build fails.
    pub fallback_limit: usize,
    /// 1 = serial, 0 = rayon global pool, n = dedicated pool of n threads.
    pub threads: usize,
    /// Reject duplicate keys up front instead of when they reach the terminal table.
    pub check_duplicates: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            gamma: 2.0,
            seed: 0xC0FF_EE00_D15E_A5E,
            max_levels: 25,
            fallback_limit: 1 << 16,
            threads: 1,
            check_duplicates: true,
        }
    }
}

pub struct Builder<K, H = WyHashFamily> {
    cfg: BuildConfig,
    family: H,
    _key: PhantomData<fn(K) -> K>,
}

impl<K: MphKey> Builder<K> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: MphKey, H: HashFamily> Default for Builder<K, H> {
    fn default() -> Self {
        Self {
            cfg: BuildConfig::default(),
            family: H::default(),
            _key: PhantomData,
        }
    }
}

impl<K: MphKey, H: HashFamily> Builder<K, H> {
    /// Builder for a non-default hash family, e.g. `Builder::with_family(Xxh3Family)`.
    pub fn with_family(family: H) -> Self {
        Self {
            cfg: BuildConfig::default(),
            family,
            _key: PhantomData,
        }
    }

    pub fn with_config(mut self, cfg: BuildConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.cfg.gamma = gamma;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.cfg.seed = seed;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.cfg.threads = threads;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.cfg
    }

    /// Build the MPH from **unique** keys.
    ///
    /// The builder is consumed; on error nothing partially built escapes.
    pub fn build<I>(self, keys: I) -> Result<Mphf<K, H>, MphError>
    where
        I: IntoIterator<Item = K>,
    {
        let Self { cfg, family, .. } = self;
        if !(cfg.gamma > 1.0 && cfg.gamma <= MAX_GAMMA) {
            return Err(MphError::InvalidGamma(cfg.gamma));
        }

        let words: Vec<u64> = keys.into_iter().map(MphKey::to_word).collect();
        if cfg.check_duplicates {
            check_unique(&words)?;
        }

        run_with_threads(cfg.threads, |parallel| {
            cascade(&family, &cfg, words, parallel)
        })?
    }
}

/// A key still waiting for a level, with its seed-dependent pre-hash.
#[derive(Clone, Copy, Debug)]
struct Pending {
    word: u64,
    pre: u64,
}

/// Outcome for one key at one level, decided after the count pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyStatus {
    /// Shared its position with another key; deferred to the next level.
    Unresolved { level: u32 },
    Resolved { level: u32, position: u64 },
}

fn cascade<K: MphKey, H: HashFamily>(
    family: &H,
    cfg: &BuildConfig,
    words: Vec<u64>,
    parallel: bool,
) -> Result<Mphf<K, H>, MphError> {
    let n = words.len();
    let _span = info_span!("mphf_build", keys = n, gamma = cfg.gamma, parallel).entered();

    let mut pending = prehash_all(family, cfg.seed, words, parallel);
    let mut levels = Vec::new();
    let mut base = 0u64;
    let mut level = 0u32;

    while !pending.is_empty() && level < cfg.max_levels {
        let size = level_size(cfg.gamma, pending.len())?;
        let collide = count_collisions(family, &pending, level, size, parallel);
        let statuses = classify(family, &pending, &collide, level, size, parallel);
        let keys = pending.len();
        let (bits, next) = commit(pending, &statuses, level, size);
        let resolved = bits.count_ones();
        debug!(level, keys, size, resolved, "cascade level");

        levels.push(Level { base, bits });
        base += resolved;
        pending = next;
        level += 1;
    }

    let terminal = if pending.is_empty() {
        Vec::new()
    } else {
        terminal_table(pending, cfg.fallback_limit, level)?
    };

    let mph = Mphf::from_parts(n as u64, cfg.seed, levels, base, terminal, family.clone());
    let stats = mph.stats();
    info!(
        keys = n,
        levels = stats.levels,
        terminal = stats.terminal_keys,
        bits_per_key = stats.bits_per_key,
        "mphf built"
    );
    Ok(mph)
}

/// Bitmap size for a level: ⌈γ · remaining⌉ rounded up to whole words.
/// Fails when the size does not fit the address space.
fn level_size(gamma: f64, remaining: usize) -> Result<u64, MphError> {
    let raw = (gamma * remaining as f64).ceil();
    if !(raw < u64::MAX as f64) {
        return Err(MphError::InvalidGamma(gamma));
    }
    (raw as u64)
        .max(1)
        .checked_next_multiple_of(64)
        .filter(|&size| usize::try_from(size).is_ok())
        .ok_or(MphError::InvalidGamma(gamma))
}

fn status_of<H: HashFamily>(
    family: &H,
    p: &Pending,
    collide: &BitSet,
    level: u32,
    size: u64,
) -> KeyStatus {
    let position = family.position(p.pre, level, size);
    if collide.test(position as usize) {
        KeyStatus::Unresolved { level }
    } else {
        KeyStatus::Resolved { level, position }
    }
}

/// Set the bits of resolved keys and gather the rest for the next level.
fn commit(
    pending: Vec<Pending>,
    statuses: &[KeyStatus],
    level: u32,
    size: u64,
) -> (RankedBits, Vec<Pending>) {
    let mut bits = BitSet::new(size as usize);
    let mut next = Vec::new();
    for (p, status) in pending.into_iter().zip(statuses) {
        match *status {
            KeyStatus::Resolved { level: at, position } => {
                debug_assert_eq!(at, level);
                bits.set(position as usize);
            }
            KeyStatus::Unresolved { level: at } => {
                debug_assert_eq!(at, level);
                next.push(p);
            }
        }
    }
    (RankedBits::from_words(bits.into_words()), next)
}

fn terminal_table(
    pending: Vec<Pending>,
    fallback_limit: usize,
    levels: u32,
) -> Result<Vec<u64>, MphError> {
    let remaining = pending.len();
    if remaining > fallback_limit {
        return Err(MphError::LevelBoundExceeded { levels, remaining });
    }
    let mut words: Vec<u64> = pending.into_iter().map(|p| p.word).collect();
    words.sort_unstable();
    // Duplicates collide at every level, so they always end up here.
    if words.windows(2).any(|w| w[0] == w[1]) {
        return Err(MphError::DuplicateKey);
    }
    warn!(keys = remaining, levels, "unresolved keys moved to the terminal table");
    Ok(words)
}

/// Exact uniqueness check on key words (no probabilistic deduplication).
fn check_unique(words: &[u64]) -> Result<(), MphError> {
    let mut seen: HashSet<u64, ahash::RandomState> =
        HashSet::with_capacity_and_hasher(words.len(), ahash::RandomState::new());
    for &w in words {
        if !seen.insert(w) {
            debug!(word = w, "duplicate key");
            return Err(MphError::DuplicateKey);
        }
    }
    Ok(())
}

fn serial_count<H: HashFamily>(family: &H, pending: &[Pending], level: u32, size: u64) -> BitSet {
    let mut seen = BitSet::new(size as usize);
    let mut collide = BitSet::new(size as usize);
    for p in pending {
        let pos = family.position(p.pre, level, size) as usize;
        if !seen.insert(pos) {
            collide.set(pos);
        }
    }
    collide
}

#[cfg(feature = "parallel")]
fn run_with_threads<T: Send>(threads: usize, job: impl FnOnce(bool) -> T + Send) -> Result<T, MphError> {
    match threads {
        1 => Ok(job(false)),
        0 => Ok(job(true)),
        n => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
            Ok(pool.install(|| job(true)))
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn run_with_threads<T>(threads: usize, job: impl FnOnce(bool) -> T) -> Result<T, MphError> {
    if threads != 1 {
        warn!(threads, "built without the `parallel` feature, building serially");
    }
    Ok(job(false))
}

#[cfg(feature = "parallel")]
fn prehash_all<H: HashFamily>(family: &H, seed: u64, words: Vec<u64>, parallel: bool) -> Vec<Pending> {
    let one = |word: u64| Pending { word, pre: family.prehash(word, seed) };
    if parallel {
        words.into_par_iter().map(one).collect()
    } else {
        words.into_iter().map(one).collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn prehash_all<H: HashFamily>(family: &H, seed: u64, words: Vec<u64>, _parallel: bool) -> Vec<Pending> {
    words
        .into_iter()
        .map(|word| Pending { word, pre: family.prehash(word, seed) })
        .collect()
}

/// Marks every position hit by two or more keys. In the parallel pass a
/// position's first claimant is decided by `fetch_or`, so exactly one thread
/// sees it as fresh and any later hit marks the collision.
#[cfg(feature = "parallel")]
fn count_collisions<H: HashFamily>(
    family: &H,
    pending: &[Pending],
    level: u32,
    size: u64,
    parallel: bool,
) -> BitSet {
    use crate::util::AtomicBitSet;

    if !parallel {
        return serial_count(family, pending, level, size);
    }
    let seen = AtomicBitSet::new(size as usize);
    let collide = AtomicBitSet::new(size as usize);
    pending.par_chunks(CHUNK).for_each(|chunk| {
        for p in chunk {
            let pos = family.position(p.pre, level, size) as usize;
            if collide.test(pos) {
                continue;
            }
            if !seen.insert(pos) {
                collide.insert(pos);
            }
        }
    });
    collide.into_bitset()
}

#[cfg(not(feature = "parallel"))]
fn count_collisions<H: HashFamily>(
    family: &H,
    pending: &[Pending],
    level: u32,
    size: u64,
    _parallel: bool,
) -> BitSet {
    serial_count(family, pending, level, size)
}

#[cfg(feature = "parallel")]
fn classify<H: HashFamily>(
    family: &H,
    pending: &[Pending],
    collide: &BitSet,
    level: u32,
    size: u64,
    parallel: bool,
) -> Vec<KeyStatus> {
    if parallel {
        pending
            .par_iter()
            .map(|p| status_of(family, p, collide, level, size))
            .collect()
    } else {
        pending
            .iter()
            .map(|p| status_of(family, p, collide, level, size))
            .collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn classify<H: HashFamily>(
    family: &H,
    pending: &[Pending],
    collide: &BitSet,
    level: u32,
    size: u64,
    _parallel: bool,
) -> Vec<KeyStatus> {
    pending
        .iter()
        .map(|p| status_of(family, p, collide, level, size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_size_rounds_to_words() {
        assert_eq!(level_size(2.0, 0).unwrap(), 64);
        assert_eq!(level_size(2.0, 1).unwrap(), 64);
        assert_eq!(level_size(2.0, 32).unwrap(), 64);
        assert_eq!(level_size(2.0, 33).unwrap(), 128);
        assert_eq!(level_size(1.5, 1000).unwrap(), 1536);
    }

    #[test]
    fn level_size_overflow_is_an_error() {
        assert!(matches!(level_size(f64::MAX, 3), Err(MphError::InvalidGamma(_))));
        assert!(matches!(level_size(1e19, 2), Err(MphError::InvalidGamma(_))));
        // usize::MAX widens to 2^64 as f64, one past the largest u64.
        assert!(level_size(1.0, usize::MAX).is_err());
    }

    #[test]
    fn commit_splits_by_status() {
        let pending = vec![
            Pending { word: 1, pre: 10 },
            Pending { word: 2, pre: 20 },
            Pending { word: 3, pre: 30 },
        ];
        let statuses = vec![
            KeyStatus::Resolved { level: 0, position: 5 },
            KeyStatus::Unresolved { level: 0 },
            KeyStatus::Resolved { level: 0, position: 63 },
        ];
        let (bits, next) = commit(pending, &statuses, 0, 64);
        assert_eq!(bits.count_ones(), 2);
        assert!(bits.contains(5) && bits.contains(63));
        assert_eq!(bits.rank(63), 1);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].word, 2);
    }

    #[test]
    fn colliding_positions_are_never_resolved() {
        let family = WyHashFamily;
        let pending: Vec<Pending> = (0..500u64)
            .map(|word| Pending { word, pre: family.prehash(word, 9) })
            .collect();
        let size = 512;
        let collide = serial_count(&family, &pending, 0, size);
        let statuses = classify(&family, &pending, &collide, 0, size, false);
        let mut hits = vec![0u32; size as usize];
        for p in &pending {
            hits[family.position(p.pre, 0, size) as usize] += 1;
        }
        for (p, s) in pending.iter().zip(&statuses) {
            let pos = family.position(p.pre, 0, size) as usize;
            match s {
                KeyStatus::Resolved { .. } => assert_eq!(hits[pos], 1),
                KeyStatus::Unresolved { .. } => assert!(hits[pos] >= 2),
            }
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_count_matches_serial() {
        let family = WyHashFamily;
        let pending: Vec<Pending> = (0..200_000u64)
            .map(|word| Pending { word, pre: family.prehash(word, 3) })
            .collect();
        let size = level_size(2.0, pending.len()).unwrap();
        let serial = serial_count(&family, &pending, 1, size);
        let parallel = count_collisions(&family, &pending, 1, size, true);
        assert_eq!(serial.into_words(), parallel.into_words());
    }

    #[test]
    fn terminal_table_limits() {
        let pending = vec![Pending { word: 9, pre: 0 }, Pending { word: 4, pre: 0 }];
        assert!(matches!(
            terminal_table(pending.clone(), 1, 3),
            Err(MphError::LevelBoundExceeded { levels: 3, remaining: 2 })
        ));
        assert_eq!(terminal_table(pending, 2, 3).unwrap(), vec![4, 9]);

        let dup = vec![Pending { word: 4, pre: 0 }, Pending { word: 4, pre: 0 }];
        assert!(matches!(terminal_table(dup, 8, 1), Err(MphError::DuplicateKey)));
    }

    #[test]
    fn rejects_bad_gamma() {
        for gamma in [1.0, 0.5, f64::NAN, f64::INFINITY, f64::MAX, 1e12, MAX_GAMMA + 0.5] {
            let res = Builder::<u32>::new().with_gamma(gamma).build([1u32, 2, 3]);
            assert!(matches!(res, Err(MphError::InvalidGamma(_))));
        }
        let res = Builder::<u64>::new().with_gamma(MAX_GAMMA).build([1u64, 2, 3]);
        assert_eq!(res.unwrap().len(), 3);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_config_fills_defaults() {
        let cfg: BuildConfig = serde_json::from_str(r#"{ "gamma": 3.5, "threads": 0 }"#).unwrap();
        assert_eq!(cfg.gamma, 3.5);
        assert_eq!(cfg.threads, 0);
        let defaults = BuildConfig::default();
        assert_eq!(cfg.seed, defaults.seed);
        assert_eq!(cfg.max_levels, defaults.max_levels);
        assert_eq!(cfg.fallback_limit, defaults.fallback_limit);
        assert!(cfg.check_duplicates);

        let json = serde_json::to_string(&cfg).unwrap();
        let back: BuildConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
        assert_eq!(Builder::<u32>::new().with_config(back).config(), &cfg);
    }
}
