use std::rc::Rc;

use funcy_lex::{Lexer, Token, TokenKind};
use funcy_util::{Log, Position, Span};

use crate::ast::*;

/// Recursive-descent parser with one token of lookahead, a span-start
/// stack for the `begin()`/`end()` discipline, and synthetic `Error` nodes
/// for recovery (§4.4).
pub struct Parser<'s, 'l> {
    lexer: Lexer<'s>,
    log: &'l mut Log,
    current: Token,
    next: Token,
    /// End position of the last token consumed by `advance`, i.e. the end
    /// of whatever `current` pointed at just before it was replaced. This
    /// is what `end_span` reports, not `current.span.end` — `current` is
    /// always the next *unconsumed* token by the time a production is
    /// done, not the token it just finished consuming.
    last_end: Position,
    span_starts: Vec<Position>,
    module: Rc<str>,
    /// Whether `$(...)` intrinsic syntax is available — only while parsing
    /// the standard library.
    allow_intrinsic: bool,
}

impl<'s, 'l> Parser<'s, 'l> {
    pub fn new(
        module: impl Into<Rc<str>>,
        source: &'s str,
        allow_intrinsic: bool,
        log: &'l mut Log,
    ) -> Self {
        let module = module.into();
        let mut lexer = Lexer::new(Rc::clone(&module), source, allow_intrinsic);
        let first = lexer.next_token(log);
        let second = lexer.next_token(log);

        Self {
            lexer,
            log,
            last_end: first.span.start.clone(),
            current: first,
            next: second,
            span_starts: Vec::new(),
            module,
            allow_intrinsic,
        }
    }

    // ---- token stream plumbing -----------------------------------------

    fn advance(&mut self) {
        let fetched = self.lexer.next_token(self.log);
        self.last_end = self.current.span.end.clone();
        self.current = std::mem::replace(&mut self.next, fetched);
    }

    fn begin(&mut self) {
        self.span_starts.push(self.current.span.start.clone());
    }

    fn end_span(&mut self) -> Span {
        let start = self
            .span_starts
            .pop()
            .expect("end_span called without a matching begin");
        Span {
            start,
            end: self.last_end.clone(),
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    /// Consume `kind` if present; otherwise log a diagnostic and leave the
    /// stream where it is so the caller can keep going.
    fn expect(&mut self, kind: TokenKind, what: &str) -> bool {
        if self.check(&kind) {
            self.advance();
            true
        } else {
            self.log.log_at(
                format!("Expected {what}!"),
                self.current.span.clone(),
            );
            false
        }
    }

    // ---- module / top level --------------------------------------------

    pub fn parse_module(&mut self, name: impl Into<String>) -> Module {
        let mut module = Module {
            name: name.into(),
            incls: Vec::new(),
            items: Vec::new(),
        };

        while self.check(&TokenKind::Include) {
            module.incls.push(self.parse_incl());
        }

        while !self.check(&TokenKind::Eof) {
            if let Some(item) = self.parse_top_level_item() {
                module.items.push(item);
            }
        }

        module
    }

    fn parse_incl(&mut self) -> Incl {
        self.begin();
        self.advance(); // `include`

        let path = match self.current.kind.clone() {
            TokenKind::LiteralStr(s) => {
                self.advance();
                s
            }
            _ => {
                self.log.log_at("Expected include path string!", self.current.span.clone());
                String::new()
            }
        };

        self.expect(TokenKind::Semi, "';' after include directive");
        let span = self.end_span();
        Incl { path, span }
    }

    fn parse_top_level_item(&mut self) -> Option<Stmt> {
        if self.check(&TokenKind::Func) {
            return Some(self.parse_func());
        }
        if self.allow_intrinsic && self.check(&TokenKind::DollarParen) {
            return Some(self.parse_intrinsic_decl());
        }

        self.log.log_at(
            "Expected a function declaration!",
            self.current.span.clone(),
        );
        self.advance();
        None
    }

    fn parse_intrinsic_decl(&mut self) -> Stmt {
        self.begin();
        self.advance(); // `$(`

        let name = self.parse_ident_text("intrinsic name");
        self.expect(TokenKind::RParen, "')' after intrinsic name");
        self.expect(TokenKind::Semi, "';' after intrinsic declaration");

        let span = self.end_span();
        Stmt::new(StmtKind::Intrinsic { name }, span)
    }

    fn parse_ident_text(&mut self, what: &str) -> String {
        match self.current.kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                name
            }
            _ => {
                self.log
                    .log_at(format!("Expected {what}!"), self.current.span.clone());
                String::new()
            }
        }
    }

    // ---- statements ------------------------------------------------------

    fn parse_func(&mut self) -> Stmt {
        self.begin();
        self.advance(); // `func`
        let name = self.parse_ident_text("function name");

        self.expect(TokenKind::LParen, "'(' after function name");
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.parse_decl());
                if self.check(&TokenKind::Comma) {
                    self.advance();
                    if self.check(&TokenKind::RParen) {
                        self.log.log_at(
                            "Trailing comma in parameter list!",
                            self.current.span.clone(),
                        );
                        break;
                    }
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' after parameter list");

        let body = Box::new(self.parse_block());
        let span = self.end_span();
        Stmt::new(
            StmtKind::Func {
                name,
                params,
                body,
            },
            span,
        )
    }

    fn parse_decl(&mut self) -> Decl {
        self.begin();
        let is_mutable = if self.check(&TokenKind::Mut) {
            self.advance();
            true
        } else {
            false
        };
        let name = self.parse_ident_text("parameter or binding name");
        let span = self.end_span();
        Decl {
            is_mutable,
            name,
            span,
        }
    }

    fn parse_block(&mut self) -> Stmt {
        self.begin();
        self.expect(TokenKind::LBrace, "'{'");

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_stmt());
        }
        self.expect(TokenKind::RBrace, "'}'");

        let span = self.end_span();
        Stmt::new(StmtKind::Block(stmts), span)
    }

    fn parse_stmt(&mut self) -> Stmt {
        match self.current.kind {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Let => self.parse_let(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => self.parse_scoped_jump(JumpKind::Break),
            TokenKind::Continue => self.parse_scoped_jump(JumpKind::Continue),
            TokenKind::Semi => {
                self.begin();
                self.advance();
                let span = self.end_span();
                Stmt::new(StmtKind::Nop, span)
            }
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_if(&mut self) -> Stmt {
        self.begin();
        self.advance(); // `if`
        self.expect(TokenKind::LParen, "'(' after 'if'");
        let cond = self.parse_expr();
        self.expect(TokenKind::RParen, "')' after if condition");
        let then_branch = Box::new(self.parse_stmt());

        if self.check(&TokenKind::Else) {
            self.advance();
            let else_branch = Box::new(self.parse_stmt());
            let span = self.end_span();
            Stmt::new(
                StmtKind::IfElse {
                    cond,
                    then_branch,
                    else_branch,
                },
                span,
            )
        } else {
            let span = self.end_span();
            Stmt::new(StmtKind::If { cond, then_branch }, span)
        }
    }

    fn parse_while(&mut self) -> Stmt {
        self.begin();
        self.advance(); // `while`
        self.expect(TokenKind::LParen, "'(' after 'while'");
        let cond = self.parse_expr();
        self.expect(TokenKind::RParen, "')' after while condition");
        let body = Box::new(self.parse_stmt());
        let span = self.end_span();
        Stmt::new(StmtKind::While { cond, body }, span)
    }

    fn parse_let(&mut self) -> Stmt {
        self.begin();
        self.advance(); // `let`
        let decl = self.parse_decl();

        let kind = if self.check(&TokenKind::Eq) {
            self.advance();
            let init = self.parse_expr();
            StmtKind::LetExpr { decl, init }
        } else {
            self.log.log_at(
                "Immutable binding without an initializer!",
                self.current.span.clone(),
            );
            StmtKind::Let { decl }
        };

        self.expect(TokenKind::Semi, "';' after let binding");
        let span = self.end_span();
        Stmt::new(kind, span)
    }

    fn parse_return(&mut self) -> Stmt {
        self.begin();
        self.advance(); // `return`

        let kind = if self.check(&TokenKind::Semi) {
            StmtKind::Return
        } else {
            StmtKind::ReturnExpr(self.parse_expr())
        };

        self.expect(TokenKind::Semi, "';' after return");
        let span = self.end_span();
        Stmt::new(kind, span)
    }

    fn parse_scoped_jump(&mut self, jump: JumpKind) -> Stmt {
        self.begin();
        self.advance(); // `break` / `continue`
        self.expect(TokenKind::Semi, "';' after break/continue");
        let span = self.end_span();
        Stmt::new(StmtKind::ScopedJump(jump), span)
    }

    fn parse_expr_stmt(&mut self) -> Stmt {
        self.begin();
        let expr = self.parse_expr();
        self.expect(TokenKind::Semi, "';' after expression");
        let span = self.end_span();
        Stmt::new(StmtKind::Expr(expr), span)
    }

    // ---- expressions: precedence climbing --------------------------------

    fn parse_expr(&mut self) -> Expr {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Expr {
        self.begin();
        let target = self.parse_logical_or();

        let op = match self.current.kind {
            TokenKind::Eq => Some(AssignOp::Simple),
            TokenKind::PlusEq => Some(AssignOp::Add),
            TokenKind::MinusEq => Some(AssignOp::Subtract),
            TokenKind::StarEq => Some(AssignOp::Multiply),
            TokenKind::SlashEq => Some(AssignOp::Divide),
            TokenKind::PercentEq => Some(AssignOp::Modulo),
            TokenKind::AmpEq => Some(AssignOp::And),
            TokenKind::PipeEq => Some(AssignOp::Or),
            _ => None,
        };

        let Some(op) = op else {
            self.span_starts.pop();
            return target;
        };

        self.advance();
        let value = Box::new(self.parse_assignment()); // right-associative
        let span = self.end_span();
        Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value,
            },
            span,
        )
    }

    fn parse_logical_or(&mut self) -> Expr {
        self.begin();
        let mut lhs = self.parse_logical_and();
        while self.check(&TokenKind::PipePipe) {
            self.advance();
            let rhs = self.parse_logical_and();
            let span = lhs.span.include(&rhs.span);
            lhs = Expr::new(ExprKind::Or(Box::new(lhs), Box::new(rhs)), span);
        }
        self.span_starts.pop();
        lhs
    }

    fn parse_logical_and(&mut self) -> Expr {
        self.begin();
        let mut lhs = self.parse_eager_or();
        while self.check(&TokenKind::AmpAmp) {
            self.advance();
            let rhs = self.parse_eager_or();
            let span = lhs.span.include(&rhs.span);
            lhs = Expr::new(ExprKind::And(Box::new(lhs), Box::new(rhs)), span);
        }
        self.span_starts.pop();
        lhs
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Expr,
        ops: &[(TokenKind, BinOp)],
    ) -> Expr {
        self.begin();
        let mut lhs = next(self);
        loop {
            let matched = ops.iter().find(|(tok, _)| self.check(tok)).map(|(_, op)| *op);
            let Some(op) = matched else { break };
            self.advance();
            let rhs = next(self);
            let span = lhs.span.include(&rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        self.span_starts.pop();
        lhs
    }

    fn parse_eager_or(&mut self) -> Expr {
        self.binary_level(Self::parse_eager_and, &[(TokenKind::Pipe, BinOp::Or)])
    }

    fn parse_eager_and(&mut self) -> Expr {
        self.binary_level(Self::parse_equality, &[(TokenKind::Amp, BinOp::And)])
    }

    fn parse_equality(&mut self) -> Expr {
        self.binary_level(
            Self::parse_comparison,
            &[
                (TokenKind::EqEq, BinOp::Equals),
                (TokenKind::BangEq, BinOp::NotEquals),
            ],
        )
    }

    fn parse_comparison(&mut self) -> Expr {
        self.binary_level(
            Self::parse_sum,
            &[
                (TokenKind::Lt, BinOp::Less),
                (TokenKind::LtEq, BinOp::LessEquals),
                (TokenKind::Gt, BinOp::Greater),
                (TokenKind::GtEq, BinOp::GreaterEquals),
            ],
        )
    }

    fn parse_sum(&mut self) -> Expr {
        self.binary_level(
            Self::parse_term,
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Subtract)],
        )
    }

    fn parse_term(&mut self) -> Expr {
        self.binary_level(
            Self::parse_prefix,
            &[
                (TokenKind::Star, BinOp::Multiply),
                (TokenKind::Slash, BinOp::Divide),
                (TokenKind::Percent, BinOp::Modulo),
            ],
        )
    }

    fn parse_prefix(&mut self) -> Expr {
        let op = match self.current.kind {
            TokenKind::Bang => Some(UnOp::Not),
            TokenKind::Star => Some(UnOp::Dereference),
            TokenKind::Plus => Some(UnOp::Affirm),
            TokenKind::Minus => Some(UnOp::Negate),
            _ => None,
        };

        let Some(op) = op else {
            return self.parse_call();
        };

        self.begin();
        self.advance();
        let operand = Box::new(self.parse_prefix()); // right-associative
        let span = self.end_span();
        Expr::new(ExprKind::Unary { op, operand }, span)
    }

    fn parse_call(&mut self) -> Expr {
        self.begin();
        let mut expr = self.parse_primary();

        while self.check(&TokenKind::LParen) {
            self.advance();
            let mut args = Vec::new();
            if !self.check(&TokenKind::RParen) {
                loop {
                    args.push(self.parse_expr());
                    if self.check(&TokenKind::Comma) {
                        self.advance();
                        if self.check(&TokenKind::RParen) {
                            self.log.log_at(
                                "Trailing comma in argument list!",
                                self.current.span.clone(),
                            );
                            break;
                        }
                    } else {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen, "')' after argument list");
            let span = expr.span.include(&self.current.span);
            expr = Expr::new(
                ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
                span,
            );
        }

        self.span_starts.pop();
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        self.begin();

        let expr = match self.current.kind.clone() {
            TokenKind::LiteralInt(v) => {
                self.advance();
                ExprKind::Int(v)
            }
            TokenKind::LiteralChr(c) => {
                self.advance();
                ExprKind::Chr(c)
            }
            TokenKind::LiteralStr(s) => {
                self.advance();
                ExprKind::Str(s)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                ExprKind::Identifier(name)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Int(1)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Int(0)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(TokenKind::RParen, "')' after parenthesized expression");
                self.span_starts.pop();
                return inner;
            }
            TokenKind::DollarParen if self.allow_intrinsic => {
                self.advance();
                let name = self.parse_ident_text("intrinsic name");
                let mut args = Vec::new();
                if self.check(&TokenKind::Comma) {
                    self.advance();
                    loop {
                        args.push(self.parse_expr());
                        if self.check(&TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "')' after intrinsic call");
                ExprKind::Intrinsic { name, args }
            }
            TokenKind::Error(message) => {
                self.advance();
                ExprKind::Error(message)
            }
            _ => {
                let span = self.current.span.clone();
                self.log
                    .log_at("Expected an expression!", span.clone());
                self.advance();
                ExprKind::Error(String::new())
            }
        };

        let span = self.end_span();
        Expr::new(expr, span)
    }
}
