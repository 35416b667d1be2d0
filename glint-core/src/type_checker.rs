//! Single-pass, stage-aware type checking.
//!
//! The checker never mutates the parsed tree. It returns a rewritten tree
//! (implicit widening conversions become synthetic constructor calls with
//! fresh node ids) and records a type for every node of that tree in a
//! node-id-indexed table, exactly once. Reads that cross the stage boundary
//! are recorded in the transfer set at the moment of the read.

use crate::ast::*;
use crate::context::{self, ShaderContext};
use crate::error::Result;
use crate::scope::ScopeStack;
use crate::transfer::{TransferEntry, TransferSet};
use crate::types::{parse_swizzle, Access, Ty, Type};
use log::trace;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

#[derive(Debug, Clone)]
struct Binding {
    ty: Type,
    /// Declared by an earlier pipeline stage; reading it records a
    /// transfer.
    earlier: bool,
}

/// Everything one checked fragment hands to the next stage and to codegen.
#[derive(Debug)]
pub struct CheckedFragment {
    pub stmts: Vec<Stmt>,
    pub table: TypeTable,
    /// Top-level declarations, in declaration order, for seeding the next
    /// stage's checker.
    pub exports: Vec<(String, Ty)>,
    pub transfers: TransferSet,
    pub counter: NodeCounter,
}

pub struct TypeChecker<'a> {
    ctx: &'a ShaderContext,
    stage: Stage,
    scopes: ScopeStack<Binding>,
    table: TypeTable,
    transfers: TransferSet,
    counter: NodeCounter,
    exports: Vec<(String, Ty)>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(
        ctx: &'a ShaderContext,
        stage: Stage,
        earlier: &[(String, Ty)],
        counter: NodeCounter,
    ) -> Self {
        let mut scopes = ScopeStack::new();

        // The writable sink `out` is an ordinary identifier bound to a
        // namespace marker: the vertex body object or the fragment output.
        let sink = match stage {
            Stage::Vertex => Ty::Body,
            Stage::Fragment => Ty::Output,
        };
        scopes.insert(
            "out".to_string(),
            Binding {
                ty: Type::read_write(sink),
                earlier: false,
            },
        );

        for (name, ty) in earlier {
            scopes.insert(
                name.clone(),
                Binding {
                    ty: Type::read_only(ty.clone()),
                    earlier: true,
                },
            );
        }

        TypeChecker {
            ctx,
            stage,
            scopes,
            table: TypeTable::new(),
            transfers: TransferSet::new(),
            counter,
            exports: Vec::new(),
        }
    }

    pub fn check_fragment(mut self, stmts: &[Stmt]) -> Result<CheckedFragment> {
        let mut checked = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            checked.push(self.check_stmt(stmt)?);
        }
        Ok(CheckedFragment {
            stmts: checked,
            table: self.table,
            exports: self.exports,
            transfers: self.transfers,
            counter: self.counter,
        })
    }

    // ---- statements ----

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<Stmt> {
        trace!("check_stmt: {:?}", stmt.kind);
        let kind = match &stmt.kind {
            StmtKind::Decl { mutable, name, init } => {
                // Once a vertex-stage value has been read (and therefore
                // claimed a transfer channel under this name), the name can
                // no longer be redeclared locally.
                if self
                    .transfers
                    .contains(crate::transfer::TransferKind::Authored, &[name.clone()])
                {
                    crate::bail_type_at!(
                        stmt.span,
                        "cannot redeclare '{}' after reading the vertex-stage value",
                        name
                    );
                }
                // Generated entry points own these prefixes: stage scratch,
                // unpacked transfers, sinks, attributes, uniforms,
                // interpolator slots, render-target outputs, and the GLSL
                // built-in namespace.
                if ["gx_", "xv_", "xi_", "xo_", "a_", "u_", "v_", "o_", "gl_"]
                    .iter()
                    .any(|p| name.starts_with(p))
                {
                    crate::bail_type_at!(
                        stmt.span,
                        "identifier '{}' uses a reserved prefix",
                        name
                    );
                }
                // Shadowing a binding from an earlier stage (or the `out`
                // sink) is allowed; redeclaring a local of this stage in
                // the same scope is not.
                if let Some(existing) = self.scopes.lookup_in_current_scope(name) {
                    if !existing.earlier && !existing.ty.ty.is_namespace() {
                        crate::bail_type_at!(
                            stmt.span,
                            "redeclaration of '{}' in the same scope",
                            name
                        );
                    }
                }
                let (init, init_ty) = self.check_expr(init)?;
                if !init_ty.ty.is_first_class() {
                    crate::bail_type_at!(
                        init.span,
                        "type {} is not first-class and cannot be stored in '{}'",
                        init_ty.ty,
                        name
                    );
                }
                let access = if *mutable { Access::READ_WRITE } else { Access::READ };
                self.scopes.insert(
                    name.clone(),
                    Binding {
                        ty: Type {
                            ty: init_ty.ty.clone(),
                            access,
                        },
                        earlier: false,
                    },
                );
                if self.scopes.depth() == 0 {
                    self.exports.push((name.clone(), init_ty.ty.clone()));
                }
                StmtKind::Decl {
                    mutable: *mutable,
                    name: name.clone(),
                    init,
                }
            }
            StmtKind::Assign { target, value } => {
                let (target, target_ty) = self.check_expr(target)?;
                if target_ty.ty.is_namespace() {
                    crate::bail_type_at!(target.span, "cannot assign to a namespace object");
                }
                if !target_ty.access.write {
                    crate::bail_type_at!(target.span, "{}", self.write_error(&target));
                }
                let (value, value_ty) = self.check_expr(value)?;
                // The colour sink takes an alpha-less value; the alpha
                // channel defaults to 1.
                let value = if value_ty.ty == Ty::Float(3) && self.is_colour_sink(&target) {
                    self.widen_with_alpha(value)
                } else {
                    self.coerce(value, &value_ty.ty, &target_ty.ty).map_err(|_| {
                        crate::error::CompilerError::TypeError(
                            format!("cannot assign {} to {}", value_ty.ty, target_ty.ty),
                            Some(stmt.span),
                        )
                    })?
                };
                StmtKind::Assign { target, value }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let (cond, cond_ty) = self.check_expr(cond)?;
                if cond_ty.ty != Ty::Bool {
                    crate::bail_type_at!(cond.span, "if condition must be Bool, got {}", cond_ty.ty);
                }
                let then_branch = self.check_scope(then_branch)?;
                let else_branch = match else_branch {
                    Some(stmts) => Some(self.check_scope(stmts)?),
                    None => None,
                };
                StmtKind::If {
                    cond,
                    then_branch,
                    else_branch,
                }
            }
            StmtKind::Block(stmts) => StmtKind::Block(self.check_scope(stmts)?),
            StmtKind::Discard => StmtKind::Discard,
            StmtKind::Return => StmtKind::Return,
        };
        let node = Stmt {
            id: stmt.id,
            span: stmt.span,
            kind,
        };
        self.table.set(node.id, Type::value(Ty::Void));
        Ok(node)
    }

    fn check_scope(&mut self, stmts: &[Stmt]) -> Result<Vec<Stmt>> {
        self.scopes.push_scope();
        let mut checked = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            let result = self.check_stmt(stmt);
            match result {
                Ok(s) => checked.push(s),
                Err(e) => {
                    self.scopes.pop_scope();
                    return Err(e);
                }
            }
        }
        self.scopes.pop_scope();
        Ok(checked)
    }

    fn write_error(&self, target: &Expr) -> String {
        match &target.kind {
            ExprKind::Var(name) => format!("cannot assign to immutable value '{}'", name),
            ExprKind::Field { target, name } => match target.kind {
                ExprKind::GlobalRef => format!("global field '{}' is read-only", name),
                ExprKind::MaterialRef => format!("material field '{}' is read-only", name),
                ExprKind::VertRef => format!("per-vertex input '{}' is read-only", name),
                ExprKind::FragRef => format!("per-fragment value '{}' is read-only", name),
                _ => format!("field '{}' is not writable here", name),
            },
            _ => "expression is not writable".to_string(),
        }
    }

    // ---- expressions ----

    /// Check an expression, returning the (possibly rewritten) node and its
    /// type. The returned node's type is already recorded in the table.
    fn check_expr(&mut self, expr: &Expr) -> Result<(Expr, Type)> {
        let (kind, ty) = match &expr.kind {
            ExprKind::IntLiteral(v) => (ExprKind::IntLiteral(*v), Type::value(Ty::Int(1))),
            ExprKind::FloatLiteral(v) => (ExprKind::FloatLiteral(*v), Type::value(Ty::Float(1))),
            ExprKind::BoolLiteral(v) => (ExprKind::BoolLiteral(*v), Type::value(Ty::Bool)),

            ExprKind::Var(name) => {
                let binding = match self.scopes.lookup(name) {
                    Some(b) => b.clone(),
                    None => {
                        crate::bail_undef_at!(expr.span, "{}", name);
                    }
                };
                if binding.earlier && self.stage == Stage::Fragment {
                    self.transfers
                        .insert(TransferEntry::authored(name.clone(), binding.ty.ty.clone()));
                }
                (ExprKind::Var(name.clone()), binding.ty)
            }

            ExprKind::GlobalRef => (ExprKind::GlobalRef, Type::read_only(Ty::Global)),
            ExprKind::MaterialRef => (ExprKind::MaterialRef, Type::read_only(Ty::Material)),
            ExprKind::VertRef => (ExprKind::VertRef, Type::read_only(Ty::PerVertex)),
            ExprKind::FragRef => {
                if self.stage == Stage::Vertex {
                    crate::bail_type_at!(
                        expr.span,
                        "per-fragment values are not available in the vertex stage"
                    );
                }
                (ExprKind::FragRef, Type::read_only(Ty::PerFragment))
            }

            ExprKind::Field { target, name } => {
                let (target, target_ty) = self.check_expr(target)?;
                let field_ty = self.resolve_field(&target_ty, name, expr.span)?;
                (
                    ExprKind::Field {
                        target: Box::new(target),
                        name: name.clone(),
                    },
                    field_ty,
                )
            }

            ExprKind::Call { callee, args } => {
                let mut checked_args = Vec::with_capacity(args.len());
                for arg in args {
                    checked_args.push(self.check_expr(arg)?);
                }
                let (args, ret) = self.resolve_call(callee, checked_args, expr.span)?;
                (
                    ExprKind::Call {
                        callee: callee.clone(),
                        args,
                    },
                    Type::value(ret),
                )
            }

            ExprKind::Unary { op, operand } => {
                let (operand, operand_ty) = self.check_expr(operand)?;
                let ty = match (op, &operand_ty.ty) {
                    (UnaryOp::Neg, Ty::Float(n)) => Ty::Float(*n),
                    (UnaryOp::Neg, Ty::Int(n)) => Ty::Int(*n),
                    (UnaryOp::Not, Ty::Bool) => Ty::Bool,
                    (op, ty) => {
                        crate::bail_type_at!(
                            expr.span,
                            "operator '{}' cannot be applied to {}",
                            op.symbol(),
                            ty
                        );
                    }
                };
                (
                    ExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    Type::value(ty),
                )
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let (lhs, lhs_ty) = self.check_expr(lhs)?;
                let (rhs, rhs_ty) = self.check_expr(rhs)?;
                let (lhs, rhs, ty) =
                    self.check_binary(*op, lhs, lhs_ty, rhs, rhs_ty, expr.span)?;
                (
                    ExprKind::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    Type::value(ty),
                )
            }
        };
        let node = Expr {
            id: expr.id,
            span: expr.span,
            kind,
        };
        self.table.set(node.id, ty.clone());
        Ok((node, ty))
    }

    /// Field resolution, dispatched on the target's type.
    fn resolve_field(&mut self, target_ty: &Type, name: &str, span: Span) -> Result<Type> {
        match &target_ty.ty {
            Ty::Global => match self.ctx.global(name) {
                Some(ty) => Ok(Type::read_only(ty.clone())),
                None => {
                    crate::bail_type_at!(span, "unknown global field '{}'", name);
                }
            },
            Ty::Material => match self.ctx.material(name) {
                Some(field) => Ok(Type::read_only(field.ty.clone())),
                None => {
                    crate::bail_type_at!(span, "unknown material field '{}'", name);
                }
            },
            Ty::PerVertex => match context::vert_field(name) {
                Some(ty) => {
                    if self.stage == Stage::Fragment {
                        self.transfers
                            .insert(TransferEntry::vertex_input(name, ty.clone()));
                    }
                    Ok(Type::read_only(ty))
                }
                None => {
                    crate::bail_type_at!(span, "unknown per-vertex input '{}'", name);
                }
            },
            Ty::PerFragment => match context::frag_field(name) {
                Some(ty) => Ok(Type::read_only(ty)),
                None => {
                    crate::bail_type_at!(span, "unknown per-fragment value '{}'", name);
                }
            },
            Ty::Body => match context::body_field(name) {
                Some(ty) => Ok(Type::read_write(ty)),
                None => {
                    crate::bail_type_at!(span, "the vertex body has no field '{}'", name);
                }
            },
            Ty::Output => match context::output_field(name) {
                Some(ty) => Ok(Type::read_write(ty)),
                None => {
                    crate::bail_type_at!(span, "the shader output has no field '{}'", name);
                }
            },
            Ty::Float(dim) => match parse_swizzle(name, *dim) {
                Some(offsets) => Ok(Type {
                    ty: Ty::Float(offsets.len() as u8),
                    access: target_ty.access,
                }),
                None => {
                    crate::bail_type_at!(
                        span,
                        "invalid swizzle '{}' on {}",
                        name,
                        target_ty.ty
                    );
                }
            },
            other => {
                crate::bail_type_at!(span, "type {} has no fields", other);
            }
        }
    }

    /// Two-pass overload resolution: exact structural match first, then a
    /// unique candidate reachable through implicit conversions. A tie among
    /// coercion candidates is an ambiguity error.
    fn resolve_call(
        &mut self,
        callee: &str,
        args: Vec<(Expr, Type)>,
        span: Span,
    ) -> Result<(Vec<Expr>, Ty)> {
        let overloads = match self.ctx.overloads(callee) {
            Some(sigs) => sigs.to_vec(),
            None => {
                crate::bail_type_at!(span, "unknown function '{}'", callee);
            }
        };
        let arg_tys: Vec<Ty> = args.iter().map(|(_, t)| t.ty.clone()).collect();

        let arity: Vec<_> = overloads
            .iter()
            .filter(|sig| sig.params.len() == args.len())
            .collect();
        if arity.is_empty() {
            crate::bail_type_at!(
                span,
                "no overload of '{}' takes {} argument(s)",
                callee,
                args.len()
            );
        }

        // Exact pass
        if let Some(sig) = arity.iter().find(|sig| sig.params == arg_tys) {
            let ret = sig.ret.clone();
            let exprs = args.into_iter().map(|(e, _)| e).collect();
            return Ok((exprs, ret));
        }

        // Coercion pass: every argument must be exact or convertible.
        let viable: Vec<_> = arity
            .iter()
            .filter(|sig| {
                sig.params
                    .iter()
                    .zip(&arg_tys)
                    .all(|(param, arg)| arg == param || arg.converts_to(param))
            })
            .collect();
        match viable.len() {
            0 => {
                let got: Vec<String> = arg_tys.iter().map(|t| t.to_string()).collect();
                crate::bail_type_at!(
                    span,
                    "no overload of '{}' matches ({})",
                    callee,
                    got.join(", ")
                );
            }
            1 => {
                let sig = viable[0];
                let ret = sig.ret.clone();
                let mut exprs = Vec::with_capacity(args.len());
                for ((arg, arg_ty), param) in args.into_iter().zip(sig.params.iter()) {
                    let arg = self
                        .coerce(arg, &arg_ty.ty, param)
                        .expect("viable overload argument must coerce");
                    exprs.push(arg);
                }
                Ok((exprs, ret))
            }
            n => {
                crate::bail_type_at!(
                    span,
                    "call to '{}' is ambiguous: {} overloads match through implicit conversions",
                    callee,
                    n
                );
            }
        }
    }

    fn check_binary(
        &mut self,
        op: BinOp,
        lhs: Expr,
        lhs_ty: Type,
        rhs: Expr,
        rhs_ty: Type,
        span: Span,
    ) -> Result<(Expr, Expr, Ty)> {
        if op.is_logical() {
            if lhs_ty.ty != Ty::Bool || rhs_ty.ty != Ty::Bool {
                crate::bail_type_at!(
                    span,
                    "operator '{}' requires Bool operands, got {} and {}",
                    op.symbol(),
                    lhs_ty.ty,
                    rhs_ty.ty
                );
            }
            return Ok((lhs, rhs, Ty::Bool));
        }

        // Matrix forms of '*' do not unify; they have their own shapes.
        if op == BinOp::Mul {
            match (&lhs_ty.ty, &rhs_ty.ty) {
                (Ty::Mat(c, r), Ty::Float(n)) if c == n => {
                    return Ok((lhs, rhs, Ty::Float(*r)));
                }
                (Ty::Mat(c, r), Ty::Mat(c2, r2)) if c == r2 => {
                    return Ok((lhs, rhs, Ty::Mat(*c2, *r)));
                }
                _ => {}
            }
        }

        let (lhs, rhs, ty) = self.unify(lhs, lhs_ty, rhs, rhs_ty, op, span)?;

        if op.is_comparison() {
            let scalar_ok = match (&ty, op) {
                (Ty::Bool, BinOp::Eq) | (Ty::Bool, BinOp::Ne) => true,
                (Ty::Float(1), _) | (Ty::Int(1), _) => true,
                _ => false,
            };
            if !scalar_ok {
                crate::bail_type_at!(
                    span,
                    "operator '{}' cannot compare values of type {}",
                    op.symbol(),
                    ty
                );
            }
            return Ok((lhs, rhs, Ty::Bool));
        }

        match ty {
            Ty::Float(_) | Ty::Int(_) => Ok((lhs, rhs, ty)),
            other => {
                crate::bail_type_at!(
                    span,
                    "operator '{}' cannot be applied to {}",
                    op.symbol(),
                    other
                );
            }
        }
    }

    /// Operand unification: try converting the left operand to the right's
    /// type, then the right to the left's; fail if neither exists.
    fn unify(
        &mut self,
        lhs: Expr,
        lhs_ty: Type,
        rhs: Expr,
        rhs_ty: Type,
        op: BinOp,
        span: Span,
    ) -> Result<(Expr, Expr, Ty)> {
        if lhs_ty.ty == rhs_ty.ty {
            return Ok((lhs, rhs, lhs_ty.ty));
        }
        if lhs_ty.ty.converts_to(&rhs_ty.ty) {
            let lhs = self.wrap_conversion(lhs, &rhs_ty.ty);
            return Ok((lhs, rhs, rhs_ty.ty));
        }
        if rhs_ty.ty.converts_to(&lhs_ty.ty) {
            let rhs = self.wrap_conversion(rhs, &lhs_ty.ty);
            return Ok((lhs, rhs, lhs_ty.ty));
        }
        crate::bail_type_at!(
            span,
            "operator '{}' cannot unify {} and {}",
            op.symbol(),
            lhs_ty.ty,
            rhs_ty.ty
        );
    }

    /// Identity-or-conversion used by assignments and call arguments.
    fn coerce(&mut self, expr: Expr, from: &Ty, to: &Ty) -> std::result::Result<Expr, ()> {
        if from == to {
            Ok(expr)
        } else if from.converts_to(to) {
            Ok(self.wrap_conversion(expr, to))
        } else {
            Err(())
        }
    }

    fn is_colour_sink(&self, target: &Expr) -> bool {
        match &target.kind {
            ExprKind::Field { target: base, name } => {
                name == "colour"
                    && matches!(self.table.get(base.id), Some(t) if t.ty == Ty::Output)
            }
            _ => false,
        }
    }

    /// `out.colour = <Float3>` fills in the alpha channel.
    fn widen_with_alpha(&mut self, expr: Expr) -> Expr {
        let span = expr.span;
        let alpha = self.counter.mk_node(span, ExprKind::FloatLiteral(1.0));
        self.table.set(alpha.id, Type::value(Ty::Float(1)));
        let node = self.counter.mk_node(
            span,
            ExprKind::Call {
                callee: "Float4".to_string(),
                args: vec![expr, alpha],
            },
        );
        self.table.set(node.id, Type::value(Ty::Float(4)));
        node
    }

    /// Materialize an implicit conversion as a synthetic constructor call,
    /// so the conversion is visible to code generation.
    fn wrap_conversion(&mut self, expr: Expr, to: &Ty) -> Expr {
        let callee = to
            .constructor_name()
            .expect("implicit conversion targets are constructible");
        let span = expr.span;
        let node = self.counter.mk_node(
            span,
            ExprKind::Call {
                callee,
                args: vec![expr],
            },
        );
        self.table.set(node.id, Type::value(to.clone()));
        node
    }
}
