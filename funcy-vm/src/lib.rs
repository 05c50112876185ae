//! funcy-vm - the FVM stack machine (§4.11): loads serialized bytecode and
//! executes it to an exit code, crashing on any illegal operation.

mod error;
mod vm;

pub use error::LoadError;
pub use vm::Vm;
