use std::io;

use thiserror::Error;

/// Driver/tooling failures (§7(f)): missing files, un-writable output,
/// malformed bytecode. Distinct from source-program diagnostics, which
/// never become a Rust `Err` and instead flow through the Log.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed bytecode")]
    Bytecode(#[from] funcy_vm::LoadError),
    #[error("invalid configuration: {0}")]
    Config(String),
}
