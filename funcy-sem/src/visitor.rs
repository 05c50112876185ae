//! The visitor (§4.7): walks a resolved [`Root`] and emits [`funcy_ir::IRCode`],
//! using a [`ScopeStack`] to track what every name currently means.

use funcy_ir::{IRCode, IROp, MAIN_LABEL};
use funcy_par::{AssignOp, BinOp, Decl, Expr, ExprKind, Root, Stmt, StmtKind, UnOp};
use funcy_util::{Log, Span};

use crate::intrinsics;
use crate::scope::{JumpTarget, ScopeStack, SymbolAccess};

fn function_label(name: &str) -> String {
    format!("func_{name}")
}

fn bin_op_to_ir(op: BinOp) -> IROp {
    match op {
        BinOp::Add => IROp::BinaryAdd,
        BinOp::Subtract => IROp::BinarySubtract,
        BinOp::Multiply => IROp::BinaryMultiply,
        BinOp::Divide => IROp::BinaryDivide,
        BinOp::Modulo => IROp::BinaryModulo,
        BinOp::Equals => IROp::BinaryEquals,
        BinOp::NotEquals => IROp::BinaryNotEquals,
        BinOp::Greater => IROp::BinaryGreater,
        BinOp::GreaterEquals => IROp::BinaryGreaterEquals,
        BinOp::Less => IROp::BinaryLess,
        BinOp::LessEquals => IROp::BinaryLessEquals,
        BinOp::And => IROp::BinaryAnd,
        BinOp::Or => IROp::BinaryOr,
    }
}

struct Visitor<'l> {
    scope: ScopeStack,
    code: IRCode,
    log: &'l mut Log,
    module: String,
}

/// Visit every module in `root` and return the generated (un-optimized) IR.
/// Running the optimizer is a separate pipeline stage (see `funcy_ir::optimize`).
pub fn visit(root: &Root, log: &mut Log) -> IRCode {
    let mut visitor = Visitor {
        scope: ScopeStack::new(),
        code: IRCode::new(),
        log,
        module: String::new(),
    };
    visitor.run(root);
    visitor.code
}

impl<'l> Visitor<'l> {
    fn run(&mut self, root: &Root) {
        // Pass 1: declare every top-level signature first, so calls can
        // forward-reference functions declared later in the same or a
        // later module.
        for module in &root.modules {
            self.module = module.name.clone();
            for item in &module.items {
                match &item.kind {
                    StmtKind::Func { name, params, .. } => {
                        let label = function_label(name);
                        self.scope
                            .define_func(&mut *self.log, &self.module, name, &label, params.len() as i32);
                    }
                    StmtKind::Intrinsic { name } => self.visit_intrinsic_decl(name, &item.span),
                    _ => {}
                }
            }
        }

        // Pass 2: emit bodies.
        for module in &root.modules {
            self.module = module.name.clone();
            for item in &module.items {
                if let StmtKind::Func { name, params, body } = &item.kind {
                    self.visit_function(name, params, body);
                }
            }
        }

        self.emit_entry_point();
    }

    fn emit_entry_point(&mut self) {
        self.code.set_cursor(MAIN_LABEL);
        let main = self.scope.get("main");
        if main.access == SymbolAccess::Func {
            let arity = main.int_value.max(0);
            for _ in 0..arity {
                self.code.emit(IROp::PushInt(0));
            }
            self.code.emit(IROp::PushLabel(main.str_value.clone()));
            self.code.emit(IROp::CallParamc(arity as u32));
        } else {
            self.code.emit(IROp::PushInt(0));
        }
        self.code.emit(IROp::Halt);
    }

    fn visit_intrinsic_decl(&mut self, name: &str, span: &Span) {
        let Some(def) = intrinsics::lookup(name) else {
            self.log.log_at(format!("Unknown intrinsic '{name}'!"), span.clone());
            return;
        };

        let saved_cursor = self.code.current_label().to_string();
        let label = format!("intrinsic_{name}");
        self.code.append_named_block(label.clone());
        (def.generate)(&mut self.code);
        self.code.emit(IROp::Return);
        self.code.set_cursor(&saved_cursor);

        self.scope
            .define_intrinsic(&mut *self.log, &self.module, name, &label, def.arity);
    }

    fn visit_function(&mut self, name: &str, params: &[Decl], body: &Stmt) {
        let label = function_label(name);
        self.code.append_named_block(label);

        // The buffer scope masks every local visible from an enclosing
        // function so a nested function body can never read or write an
        // outer frame's locals or jump into an outer loop.
        self.scope.push();
        self.scope.undefine_locals();
        self.scope.undefine_scoped_labels();

        self.scope.push();
        for p in params {
            if p.is_mutable {
                self.scope.define_local_mut(&mut *self.log, &self.module, &p.name);
            } else {
                self.scope.define_local(&mut *self.log, &self.module, &p.name);
            }
        }

        self.visit_stmt(body);

        // Every function falls through to an implicit `return 0;`.
        self.code.emit(IROp::PushInt(0));
        self.code.emit(IROp::Return);

        self.scope.pop(&mut *self.log, &self.module);
        self.scope.pop(&mut *self.log, &self.module);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Func { .. } | StmtKind::Intrinsic { .. } => {
                self.log.log_bug("Top-level item reached statement visiting!", &self.module);
            }
            StmtKind::Block(stmts) => self.visit_block(stmts),
            StmtKind::If { cond, then_branch } => self.visit_if(cond, then_branch, None),
            StmtKind::IfElse { cond, then_branch, else_branch } => {
                self.visit_if(cond, then_branch, Some(else_branch))
            }
            StmtKind::While { cond, body } => self.visit_while(cond, body),
            StmtKind::Nop => {}
            StmtKind::Let { decl } => self.visit_let(decl, None),
            StmtKind::LetExpr { decl, init } => self.visit_let(decl, Some(init)),
            StmtKind::Return => {
                self.code.emit(IROp::PushInt(0));
                self.code.emit(IROp::Return);
            }
            StmtKind::ReturnExpr(e) => {
                self.visit_expr(e);
                self.code.emit(IROp::Return);
            }
            StmtKind::ScopedJump(kind) => self.visit_scoped_jump(*kind, &stmt.span),
            StmtKind::Expr(e) => {
                self.visit_expr(e);
                self.code.emit(IROp::Drop);
            }
            StmtKind::Error(_) => {}
        }
    }

    fn visit_block(&mut self, stmts: &[Stmt]) {
        self.scope.push();
        for s in stmts {
            self.visit_stmt(s);
        }
        let drops = self.scope.scope_local_count();
        for _ in 0..drops {
            self.code.emit(IROp::Drop);
        }
        self.scope.pop(&mut *self.log, &self.module);
    }

    /// Run a single if/while arm in its own scope, regardless of whether
    /// the arm is itself a block (which would push another scope of its
    /// own — harmless nesting).
    fn visit_arm(&mut self, stmt: &Stmt) {
        self.scope.push();
        self.visit_stmt(stmt);
        let drops = self.scope.scope_local_count();
        for _ in 0..drops {
            self.code.emit(IROp::Drop);
        }
        self.scope.pop(&mut *self.log, &self.module);
    }

    fn visit_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        self.visit_expr(cond);

        match else_branch {
            None => {
                let end = self.code.insert_block_after_cursor("if_end");
                self.code.emit(IROp::JumpZeroLabel(end.clone()));
                self.visit_arm(then_branch);
                self.code.set_cursor(&end);
            }
            Some(else_stmt) => {
                let else_label = self.code.insert_block_after_cursor("else");
                self.code.emit(IROp::JumpZeroLabel(else_label.clone()));
                self.visit_arm(then_branch);

                let end = self.code.insert_block_after(&else_label, "if_end");
                self.code.emit(IROp::JumpLabel(end.clone()));

                self.code.set_cursor(&else_label);
                self.visit_arm(else_stmt);
                self.code.set_cursor(&end);
            }
        }
    }

    fn visit_while(&mut self, cond: &Expr, body: &Stmt) {
        let cond_label = self.code.insert_block_after_cursor("while_cond");
        self.code.emit(IROp::JumpLabel(cond_label.clone()));

        self.code.set_cursor(&cond_label);
        let body_label = self.code.insert_block_after_cursor("while_body");
        let end_label = self.code.insert_block_after(&body_label, "while_end");

        self.visit_expr(cond);
        self.code.emit(IROp::JumpZeroLabel(end_label.clone()));

        self.code.set_cursor(&body_label);
        self.scope.push();
        let base_locals = self.scope.local_count();
        self.scope.define_scoped_label(JumpTarget::Break, &end_label, base_locals);
        self.scope.define_scoped_label(JumpTarget::Continue, &cond_label, base_locals);

        self.scope.push();
        self.visit_stmt(body);
        let drops = self.scope.scope_local_count();
        for _ in 0..drops {
            self.code.emit(IROp::Drop);
        }
        self.scope.pop(&mut *self.log, &self.module);
        self.scope.pop(&mut *self.log, &self.module);

        self.code.emit(IROp::JumpLabel(cond_label));
        self.code.set_cursor(&end_label);
    }

    fn visit_let(&mut self, decl: &Decl, init: Option<&Expr>) {
        match init {
            Some(e) => self.visit_expr(e),
            None => {
                if !decl.is_mutable {
                    self.log.log_at(
                        "Immutable binding has no initializer and can never be assigned one!",
                        decl.span.clone(),
                    );
                }
                self.code.emit(IROp::PushInt(0));
            }
        }
        self.scope.define_shadowable_local(&decl.name, decl.is_mutable);
    }

    fn visit_scoped_jump(&mut self, kind: funcy_par::JumpKind, span: &Span) {
        let target = match kind {
            funcy_par::JumpKind::Break => JumpTarget::Break,
            funcy_par::JumpKind::Continue => JumpTarget::Continue,
        };

        match self.scope.get_scoped_label(target) {
            Some(scoped) => {
                let drops = self.scope.local_count().saturating_sub(scoped.local_count);
                for _ in 0..drops {
                    self.code.emit(IROp::Drop);
                }
                self.code.emit(IROp::JumpLabel(scoped.label));
            }
            None => {
                let what = if target == JumpTarget::Break { "break" } else { "continue" };
                self.log.log_at(format!("'{what}' outside of a loop!"), span.clone());
            }
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Int(v) => self.code.emit(IROp::PushInt(*v as i32)),
            ExprKind::Chr(content) => self.visit_chr(content, &expr.span),
            ExprKind::Str(s) => self.code.emit(IROp::PushStr(s.clone())),
            ExprKind::Identifier(name) => self.visit_identifier(name, &expr.span),
            ExprKind::Call { callee, args } => self.visit_call(callee, args, &expr.span),
            ExprKind::Intrinsic { name, args } => self.visit_intrinsic_call(name, args, &expr.span),
            ExprKind::And(lhs, rhs) => self.visit_and(lhs, rhs),
            ExprKind::Or(lhs, rhs) => self.visit_or(lhs, rhs),
            ExprKind::Assign { op, target, value } => self.visit_assign(*op, target, value),
            ExprKind::Unary { op, operand } => self.visit_unary(*op, operand),
            ExprKind::Binary { op, lhs, rhs } => {
                self.visit_expr(lhs);
                self.visit_expr(rhs);
                self.code.emit(bin_op_to_ir(*op));
            }
            ExprKind::Error(_) => self.code.emit(IROp::PushInt(0)),
        }
    }

    /// CHR literals must contain exactly one character; the lexer hands us
    /// the raw, unvalidated content (§4.3), so the check happens here.
    fn visit_chr(&mut self, content: &str, span: &Span) {
        let mut chars = content.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => self.code.emit(IROp::PushChr(c as u8)),
            _ => {
                self.log.log_at("Character literal must contain exactly one character!", span.clone());
                self.code.emit(IROp::PushInt(0));
            }
        }
    }

    fn visit_identifier(&mut self, name: &str, span: &Span) {
        let sym = self.scope.get(name);
        match sym.access {
            SymbolAccess::Func | SymbolAccess::Intrinsic => {
                self.code.emit(IROp::PushLabel(sym.str_value))
            }
            SymbolAccess::Local | SymbolAccess::LocalMut => {
                self.code.emit(IROp::LoadLocalOffset(sym.int_value as u32))
            }
            SymbolAccess::Undefined => {
                self.log.log_at(format!("'{name}' is not defined!"), span.clone());
                self.code.emit(IROp::PushInt(0));
            }
        }
    }

    /// Evaluate `args` and leave exactly `arity` values on the stack,
    /// diagnosing (but not failing) an arity mismatch: extra arguments are
    /// still evaluated for side effects then dropped, and missing ones are
    /// padded with zero, so the call site's stack discipline always holds.
    fn emit_args_matching_arity(&mut self, args: &[Expr], arity: i32, span: &Span) {
        if args.len() as i32 != arity {
            self.log
                .log_at(format!("Expected {arity} argument(s), found {}!", args.len()), span.clone());
        }

        let arity = arity.max(0) as usize;
        for (i, arg) in args.iter().enumerate() {
            self.visit_expr(arg);
            if i >= arity {
                self.code.emit(IROp::Drop);
            }
        }
        for _ in args.len()..arity {
            self.code.emit(IROp::PushInt(0));
        }
    }

    fn visit_call(&mut self, callee: &Expr, args: &[Expr], span: &Span) {
        let ExprKind::Identifier(name) = &callee.kind else {
            self.log.log_at("Only a named function can be called!", callee.span.clone());
            for arg in args {
                self.visit_expr(arg);
                self.code.emit(IROp::Drop);
            }
            self.code.emit(IROp::PushInt(0));
            return;
        };

        let sym = self.scope.get(name);
        match sym.access {
            SymbolAccess::Func | SymbolAccess::Intrinsic => {
                let arity = sym.int_value;
                self.emit_args_matching_arity(args, arity, span);
                self.code.emit(IROp::PushLabel(sym.str_value));
                self.code.emit(IROp::CallParamc(arity.max(0) as u32));
            }
            _ => {
                self.log.log_at(format!("'{name}' is not callable!"), callee.span.clone());
                for arg in args {
                    self.visit_expr(arg);
                    self.code.emit(IROp::Drop);
                }
                self.code.emit(IROp::PushInt(0));
            }
        }
    }

    fn visit_intrinsic_call(&mut self, name: &str, args: &[Expr], span: &Span) {
        let Some(def) = intrinsics::lookup(name) else {
            self.log.log_at(format!("Unknown intrinsic '{name}'!"), span.clone());
            for arg in args {
                self.visit_expr(arg);
                self.code.emit(IROp::Drop);
            }
            self.code.emit(IROp::PushInt(0));
            return;
        };

        self.emit_args_matching_arity(args, def.arity, span);
        (def.generate)(&mut self.code);
    }

    fn visit_and(&mut self, lhs: &Expr, rhs: &Expr) {
        self.visit_expr(lhs);
        self.code.emit(IROp::Duplicate);
        let end = self.code.insert_block_after_cursor("and_end");
        self.code.emit(IROp::JumpZeroLabel(end.clone()));
        self.code.emit(IROp::Drop);
        self.visit_expr(rhs);
        self.code.set_cursor(&end);
    }

    fn visit_or(&mut self, lhs: &Expr, rhs: &Expr) {
        self.visit_expr(lhs);
        self.code.emit(IROp::Duplicate);
        let end = self.code.insert_block_after_cursor("or_end");
        self.code.emit(IROp::JumpNotZeroLabel(end.clone()));
        self.code.emit(IROp::Drop);
        self.visit_expr(rhs);
        self.code.set_cursor(&end);
    }

    fn visit_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr) {
        let ExprKind::Identifier(name) = &target.kind else {
            self.log.log_at("Assignment target must be a mutable local!", target.span.clone());
            self.visit_expr(value);
            return;
        };

        let sym = self.scope.get(name);
        if sym.access != SymbolAccess::LocalMut {
            self.log.log_at(format!("'{name}' is not a mutable local!"), target.span.clone());
            self.visit_expr(value);
            return;
        }

        let offset = sym.int_value as u32;
        match op.binary_op() {
            Some(bin) => {
                self.code.emit(IROp::LoadLocalOffset(offset));
                self.visit_expr(value);
                self.code.emit(bin_op_to_ir(bin));
            }
            None => self.visit_expr(value),
        }

        self.code.emit(IROp::Duplicate);
        self.code.emit(IROp::StoreLocalOffset(offset));
    }

    fn visit_unary(&mut self, op: UnOp, operand: &Expr) {
        self.visit_expr(operand);
        match op {
            UnOp::Dereference => self.code.emit(IROp::UnaryDereference),
            UnOp::Affirm => {}
            UnOp::Negate => self.code.emit(IROp::UnaryNegate),
            UnOp::Not => self.code.emit(IROp::UnaryNot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funcy_par::Module;

    fn sp() -> Span {
        Span::new("m")
    }

    fn main_with_body(body: Vec<Stmt>) -> Root {
        let func = Stmt::new(
            StmtKind::Func {
                name: "main".to_string(),
                params: vec![],
                body: Box::new(Stmt::new(StmtKind::Block(body), sp())),
            },
            sp(),
        );
        Root {
            modules: vec![Module {
                name: "m".to_string(),
                incls: vec![],
                items: vec![func],
            }],
        }
    }

    fn block_ops<'a>(code: &'a IRCode, label: &str) -> &'a [IROp] {
        &code.blocks().iter().find(|b| b.label == label).unwrap().ops
    }

    #[test]
    fn entry_point_calls_main_and_halts() {
        let root = main_with_body(vec![Stmt::new(
            StmtKind::ReturnExpr(Expr::new(ExprKind::Int(42), sp())),
            sp(),
        )]);
        let mut log = Log::new();
        let code = visit(&root, &mut log);

        assert_eq!(
            block_ops(&code, MAIN_LABEL),
            &[
                IROp::PushLabel("func_main".to_string()),
                IROp::CallParamc(0),
                IROp::Halt,
            ]
        );
        assert_eq!(
            block_ops(&code, "func_main"),
            &[IROp::PushInt(42), IROp::Return, IROp::PushInt(0), IROp::Return]
        );
        assert!(!log.has_records());
    }

    #[test]
    fn missing_main_pushes_zero_exit_code() {
        let root = Root { modules: vec![] };
        let mut log = Log::new();
        let code = visit(&root, &mut log);
        assert_eq!(block_ops(&code, MAIN_LABEL), &[IROp::PushInt(0), IROp::Halt]);
    }

    #[test]
    fn undefined_identifier_is_diagnosed_and_still_balances_the_stack() {
        let root = main_with_body(vec![Stmt::new(
            StmtKind::Expr(Expr::new(ExprKind::Identifier("x".to_string()), sp())),
            sp(),
        )]);
        let mut log = Log::new();
        let code = visit(&root, &mut log);

        assert!(log.has_records());
        let ops = block_ops(&code, "func_main");
        assert_eq!(&ops[..2], &[IROp::PushInt(0), IROp::Drop]);
    }

    #[test]
    fn a_single_character_chr_literal_pushes_it() {
        let root = main_with_body(vec![Stmt::new(
            StmtKind::Expr(Expr::new(ExprKind::Chr("a".to_string()), sp())),
            sp(),
        )]);
        let mut log = Log::new();
        let code = visit(&root, &mut log);

        assert!(!log.has_records());
        assert_eq!(&block_ops(&code, "func_main")[..1], &[IROp::PushChr(b'a')]);
    }

    #[test]
    fn a_multi_character_chr_literal_is_diagnosed_and_still_balances_the_stack() {
        let root = main_with_body(vec![Stmt::new(
            StmtKind::Expr(Expr::new(ExprKind::Chr("ab".to_string()), sp())),
            sp(),
        )]);
        let mut log = Log::new();
        let code = visit(&root, &mut log);

        assert!(log.has_records());
        assert_eq!(&block_ops(&code, "func_main")[..2], &[IROp::PushInt(0), IROp::Drop]);
    }

    #[test]
    fn an_empty_chr_literal_is_diagnosed() {
        let root = main_with_body(vec![Stmt::new(
            StmtKind::Expr(Expr::new(ExprKind::Chr(String::new()), sp())),
            sp(),
        )]);
        let mut log = Log::new();
        let code = visit(&root, &mut log);

        assert!(log.has_records());
    }

    #[test]
    fn break_outside_a_loop_is_diagnosed() {
        let root = main_with_body(vec![Stmt::new(
            StmtKind::ScopedJump(funcy_par::JumpKind::Break),
            sp(),
        )]);
        let mut log = Log::new();
        let code = visit(&root, &mut log);

        assert!(log.has_records());
        // The diagnosed jump emits nothing; only the function's implicit
        // `return 0;` tail remains.
        assert_eq!(block_ops(&code, "func_main"), &[IROp::PushInt(0), IROp::Return]);
    }

    #[test]
    fn chr_at_intrinsic_call_inlines_add_then_dereference() {
        let call = Expr::new(
            ExprKind::Intrinsic {
                name: "chrAt".to_string(),
                args: vec![
                    Expr::new(ExprKind::Int(100), sp()),
                    Expr::new(ExprKind::Int(2), sp()),
                ],
            },
            sp(),
        );
        let root = main_with_body(vec![Stmt::new(StmtKind::Expr(call), sp())]);
        let mut log = Log::new();
        let code = visit(&root, &mut log);

        assert!(!log.has_records());
        let ops = block_ops(&code, "func_main");
        assert_eq!(
            &ops[..5],
            &[
                IROp::PushInt(100),
                IROp::PushInt(2),
                IROp::BinaryAdd,
                IROp::UnaryDereference,
                IROp::Drop,
            ]
        );
    }

    #[test]
    fn let_shadowing_at_the_same_depth_is_not_a_bug() {
        let root = main_with_body(vec![
            Stmt::new(
                StmtKind::LetExpr {
                    decl: Decl { is_mutable: false, name: "x".to_string(), span: sp() },
                    init: Expr::new(ExprKind::Int(1), sp()),
                },
                sp(),
            ),
            Stmt::new(
                StmtKind::LetExpr {
                    decl: Decl { is_mutable: false, name: "x".to_string(), span: sp() },
                    init: Expr::new(ExprKind::Int(2), sp()),
                },
                sp(),
            ),
        ]);
        let mut log = Log::new();
        let code = visit(&root, &mut log);

        assert!(!log.has_records());
        let ops = block_ops(&code, "func_main");
        assert_eq!(&ops[..4], &[IROp::PushInt(1), IROp::PushInt(2), IROp::Drop, IROp::Drop]);
    }
}
