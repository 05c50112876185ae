//! funcy-util - shared foundations for the Funcy toolchain.
//!
//! Every other crate in the workspace (lexer, parser, semantic analysis, IR,
//! bytecode serializer, VM, driver) depends on this one. It carries the
//! things that have no phase of their own: source positions and the
//! diagnostic log.
//!
//! Nothing in this crate touches stdin/stdout or the filesystem — it is pure
//! data and pure functions, which is what lets every downstream phase stay
//! single-threaded and synchronous (see the workspace's concurrency model).

pub mod log;
pub mod position;

pub use log::{Log, LogRecord};
pub use position::{Position, Span};
