use thiserror::Error;

/// Why a byte string was rejected before execution could begin (§4.11, §6).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("bytecode is {len} bytes, shorter than the 16-byte header")]
    TooShortForHeader { len: usize },
    #[error("bytecode magic does not match the FVM header")]
    MagicMismatch,
    #[error("bytecode format version {found} is not the supported version {expected}")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("header declares a payload of {declared} bytes but only {available} are present")]
    TruncatedPayload { declared: u32, available: usize },
}
