//! funcy-sem - semantic analysis: a scope-stack-driven visitor that walks a
//! resolved [`funcy_par::Root`] and lowers it straight to [`funcy_ir::IRCode`].

mod intrinsics;
mod scope;
mod visitor;

pub use scope::{JumpTarget, ScopeStack, ScopedLabel, Symbol, SymbolAccess};
pub use visitor::visit;
