// shared/src/lib.rs

/// Error taxonomy shared by every crate in the workspace.
///
/// `CacheUnavailable` and `Propagation` are recovered internally and never
/// reach an API caller; the rest map onto HTTP statuses at the edge.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),
    #[error("origin store: {0}")]
    Origin(String),
    #[error("propagation: {0}")]
    Propagation(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Time-to-live in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlMs(pub u64);

impl TtlMs {
    pub fn as_duration(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0)
    }
}

impl From<std::time::Duration> for TtlMs {
    fn from(d: std::time::Duration) -> Self {
        TtlMs(d.as_millis() as u64)
    }
}

pub mod config;
