//! funcy-par - the Funcy parser: source text to AST, and the module
//! resolver that assembles a [`Root`] out of `include`-linked modules.

pub mod ast;
mod parser;
mod resolver;

pub use ast::{
    AssignOp, BinOp, Decl, Expr, ExprKind, Incl, JumpKind, Module, Root, Stmt, StmtKind, UnOp,
};
pub use parser::Parser;
pub use resolver::{resolve, SourceProvider};
