//! cascade_mph — minimal perfect hashing for integer keys, BBHash style.
//!
//! - Build once on a set of **unique** fixed-width integer keys.
//! - Each level hashes the keys still unresolved into a bitmap of ~γ bits per
//!   key; keys that land alone are placed, colliding keys drop to the next level.
//! - O(1) expected lookups: key -> unique index in `[0..n)` via a rank query.
//! - Deterministic: the same keys, γ and seed give the same function.
//!
//! ```
//! use cascade_mph::Builder;
//!
//! let keys = [5u64, 17, 42, 99];
//! let mph = Builder::new().with_gamma(2.0).with_seed(1).build(keys)?;
//! let mut idx: Vec<u64> = keys.iter().map(|&k| mph.index(k)).collect();
//! idx.sort();
//! assert_eq!(idx, vec![0, 1, 2, 3]);
//! # Ok::<(), cascade_mph::MphError>(())
//! ```

mod builder;
mod error;
mod hash;
mod key;
mod mphf;
mod rank;
mod util;

pub use builder::{BuildConfig, Builder, MAX_GAMMA};
pub use error::MphError;
pub use hash::{HashFamily, WyHashFamily, Xxh3Family};
pub use key::MphKey;
pub use mphf::{Mphf, MphfStats, NOT_FOUND};

/// MPHF over signed 64-bit keys with the default hash family.
pub type DefaultMphf = Mphf<i64>;
