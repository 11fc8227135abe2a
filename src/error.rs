use thiserror::Error;

#[derive(Debug, Error)]
pub enum MphError {
    #[error("duplicate key detected during build")]
    DuplicateKey,
    #[error("cascade did not converge: {remaining} keys unresolved after {levels} levels")]
    LevelBoundExceeded { levels: u32, remaining: usize },
    #[error("load factor must be in (1.0, 100.0] and fit the key count, got {0}")]
    InvalidGamma(f64),
    #[cfg(feature = "parallel")]
    #[error("could not start build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[cfg(feature = "serde")]
    #[error("serialization error: {0}")]
    Serde(#[from] Box<bincode::ErrorKind>),
    #[cfg(feature = "serde")]
    #[error("hash family mismatch: structure uses {found:?}, expected {expected:?}")]
    HashFamilyMismatch { expected: &'static str, found: String },
    #[cfg(feature = "serde")]
    #[error("corrupt structure: {0}")]
    Corrupt(&'static str),
}
