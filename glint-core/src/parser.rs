use crate::ast::*;
use crate::error::Result;
use crate::lexer::{Token, TokenKind};
use log::trace;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    node_counter: NodeCounter,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            node_counter: NodeCounter::new(),
        }
    }

    pub fn new_with_counter(tokens: Vec<Token>, node_counter: NodeCounter) -> Self {
        Parser {
            tokens,
            current: 0,
            node_counter,
        }
    }

    /// Hand the node counter back so later phases can mint fresh ids.
    pub fn into_counter(self) -> NodeCounter {
        self.node_counter
    }

    /// Parse one shader fragment: a flat statement list forming a single
    /// implicit top-level scope.
    pub fn parse_fragment(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    // ---- statements ----

    fn parse_statement(&mut self) -> Result<Stmt> {
        trace!("parse_statement: next token = {:?}", self.peek());
        let span = self.peek_span();
        match self.peek() {
            TokenKind::Val => self.parse_decl(false),
            TokenKind::Var => self.parse_decl(true),
            TokenKind::If => self.parse_if(),
            TokenKind::LBrace => {
                let body = self.parse_block()?;
                Ok(self.node_counter.mk_node(span, StmtKind::Block(body)))
            }
            TokenKind::Discard => {
                self.advance();
                self.expect(&TokenKind::Semi)?;
                Ok(self.node_counter.mk_node(span, StmtKind::Discard))
            }
            TokenKind::Return => {
                self.advance();
                self.expect(&TokenKind::Semi)?;
                Ok(self.node_counter.mk_node(span, StmtKind::Return))
            }
            _ => self.parse_assignment(),
        }
    }

    fn parse_decl(&mut self, mutable: bool) -> Result<Stmt> {
        let span = self.peek_span();
        self.advance(); // val / var
        let name = self.expect_identifier()?;
        self.expect_symbol("=")?;
        let init = self.parse_expression()?;
        self.expect(&TokenKind::Semi)?;
        Ok(self
            .node_counter
            .mk_node(span, StmtKind::Decl { mutable, name, init }))
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let span = self.peek_span();
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.check(&TokenKind::Else) {
            self.advance();
            if self.check(&TokenKind::If) {
                // `else if` chains nest as a single-statement else block.
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(self.node_counter.mk_node(
            span,
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
        ))
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                crate::bail_parse_at!(self.peek_span(), "unterminated block, expected '}}'");
            }
            stmts.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_assignment(&mut self) -> Result<Stmt> {
        let span = self.peek_span();
        let target = self.parse_expression()?;
        if !Self::is_assign_target(&target) {
            crate::bail_parse_at!(target.span, "expression is not assignable");
        }
        self.expect_symbol("=")?;
        let value = self.parse_expression()?;
        self.expect(&TokenKind::Semi)?;
        Ok(self
            .node_counter
            .mk_node(span, StmtKind::Assign { target, value }))
    }

    fn is_assign_target(expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Var(_) => true,
            ExprKind::Field { target, .. } => matches!(
                target.kind,
                ExprKind::Var(_)
                    | ExprKind::Field { .. }
                    | ExprKind::GlobalRef
                    | ExprKind::MaterialRef
                    | ExprKind::VertRef
                    | ExprKind::FragRef
            ),
            _ => false,
        }
    }

    // ---- expressions, loosest band first ----

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_logical()
    }

    fn parse_logical(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        loop {
            let op = match self.peek_symbol() {
                Some("&&") => BinOp::And,
                Some("||") => BinOp::Or,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = self.mk_binary(span, op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek_symbol() {
                Some("==") => BinOp::Eq,
                Some("!=") => BinOp::Ne,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = self.mk_binary(span, op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_symbol() {
                Some("<") => BinOp::Lt,
                Some(">") => BinOp::Gt,
                Some("<=") => BinOp::Le,
                Some(">=") => BinOp::Ge,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = self.mk_binary(span, op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_symbol() {
                Some("+") => BinOp::Add,
                Some("-") => BinOp::Sub,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = self.mk_binary(span, op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_symbol() {
                Some("*") => BinOp::Mul,
                Some("/") => BinOp::Div,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = self.mk_binary(span, op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek_symbol() {
            Some("!") => Some(UnaryOp::Not),
            Some("-") => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            let span = self.peek_span();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(self.node_counter.mk_node(
                span,
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        // Calls are only legal on a bare function name; a parenthesized
        // variable or any postfix result is not callable.
        let mut callable =
            matches!(self.peek(), TokenKind::Identifier(n) if n != "true" && n != "false");
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&TokenKind::Dot) {
                callable = false;
                let span = self.peek_span();
                self.advance();
                let name = self.expect_identifier()?;
                expr = self.node_counter.mk_node(
                    span,
                    ExprKind::Field {
                        target: Box::new(expr),
                        name,
                    },
                );
            } else if self.check(&TokenKind::LParen) {
                let callee = match &expr.kind {
                    ExprKind::Var(name) if callable => name.clone(),
                    _ => {
                        crate::bail_parse_at!(expr.span, "only a function name can be called");
                    }
                };
                callable = false;
                let span = expr.span;
                self.advance();
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.check(&TokenKind::Comma) {
                            break;
                        }
                        self.advance();
                    }
                }
                self.expect(&TokenKind::RParen)?;
                expr = self.node_counter.mk_node(span, ExprKind::Call { callee, args });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        trace!("parse_primary: next token = {:?}", self.peek());
        let span = self.peek_span();
        let kind = match self.peek().clone() {
            TokenKind::Number(text) => {
                self.advance();
                self.parse_number(&text, span)?
            }
            TokenKind::Identifier(name) => {
                self.advance();
                match name.as_str() {
                    "true" => ExprKind::BoolLiteral(true),
                    "false" => ExprKind::BoolLiteral(false),
                    _ => ExprKind::Var(name),
                }
            }
            TokenKind::Global => {
                self.advance();
                ExprKind::GlobalRef
            }
            TokenKind::Material => {
                self.advance();
                ExprKind::MaterialRef
            }
            TokenKind::Vert => {
                self.advance();
                ExprKind::VertRef
            }
            TokenKind::Frag => {
                self.advance();
                ExprKind::FragRef
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            other => {
                crate::bail_parse_at!(span, "unexpected token {:?}", other);
            }
        };
        Ok(self.node_counter.mk_node(span, kind))
    }

    fn parse_number(&self, text: &str, span: Span) -> Result<ExprKind> {
        if text.contains('.') || text.contains('e') || text.contains('E') {
            match text.parse::<f64>() {
                Ok(v) => Ok(ExprKind::FloatLiteral(v)),
                Err(_) => {
                    crate::bail_parse_at!(span, "invalid float literal '{}'", text);
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => Ok(ExprKind::IntLiteral(v)),
                Err(_) => {
                    crate::bail_parse_at!(span, "invalid int literal '{}'", text);
                }
            }
        }
    }

    // ---- token helpers ----

    fn mk_binary(&mut self, span: Span, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        self.node_counter.mk_node(
            span,
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.current.min(self.tokens.len() - 1)].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.current.min(self.tokens.len() - 1)].span
    }

    /// Current symbol-run text, if the current token is a symbol run. The
    /// caller matches it against known operator strings exactly.
    fn peek_symbol(&self) -> Option<&str> {
        match self.peek() {
            TokenKind::Symbol(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn advance(&mut self) {
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            crate::bail_parse_at!(
                self.peek_span(),
                "expected {:?}, found {:?}",
                kind,
                self.peek()
            );
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        if self.peek_symbol() == Some(symbol) {
            self.advance();
            Ok(())
        } else {
            crate::bail_parse_at!(
                self.peek_span(),
                "expected '{}', found {:?}",
                symbol,
                self.peek()
            );
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => {
                crate::bail_parse_at!(self.peek_span(), "expected identifier, found {:?}", other);
            }
        }
    }
}
