//! Code generation.
//!
//! Both backends share one typed-AST walker; everything dialect-specific
//! (type spellings, intrinsic names, texture sampling, matrix multiply,
//! stage I/O plumbing) goes through the `Dialect` trait. The per-dialect
//! modules own the entry-point scaffolding and preambles.

pub mod glsl;
pub mod hlsl;

use crate::ast::{BinOp, Expr, ExprKind, Stmt, StmtKind, TypeTable};
use crate::context::{Environment, MaterialField, ShaderContext};
use crate::error::Result;
use crate::transfer::{PackPlan, TransferEntry, TransferKind, TransferSet};
use crate::types::Ty;
use log::debug;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    Glsl,
    Hlsl,
}

/// A compilation purpose: which stage fragments participate and what
/// lighting the generated fragment program applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Plain surface colour, no lighting.
    Colour,
    /// Lit surface: sun plus environment-probe lighting applied on top of
    /// the authored colour.
    Lit,
    /// Position-only passes (depth, shadow); no authored colour fragment.
    Depth,
}

impl Purpose {
    pub fn has_colour_fragment(&self) -> bool {
        !matches!(self, Purpose::Depth)
    }

    pub fn is_lit(&self) -> bool {
        matches!(self, Purpose::Lit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Vertex,
    Fragment,
}

/// The generated program pair handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPair {
    pub vertex: String,
    pub fragment: String,
}

/// One type-checked stage fragment, ready for emission.
#[derive(Debug)]
pub struct StageProgram {
    pub stmts: Vec<Stmt>,
    pub table: TypeTable,
}

/// Everything a backend needs to emit one variant.
pub struct GenInput<'a> {
    pub purpose: Purpose,
    pub vertex: &'a StageProgram,
    pub colour: Option<&'a StageProgram>,
    pub transfers: &'a TransferSet,
    pub env: &'a Environment,
    pub ctx: &'a ShaderContext,
}

pub fn generate(dialect: DialectKind, input: &GenInput) -> Result<ShaderPair> {
    debug!(
        "generate: dialect={:?} purpose={:?} probes={} bones={} instancing={} dither={}",
        dialect,
        input.purpose,
        input.env.probes,
        input.env.bone_weights,
        input.env.instancing,
        input.env.fade_dither
    );
    match dialect {
        DialectKind::Glsl => glsl::generate(input),
        DialectKind::Hlsl => hlsl::generate(input),
    }
}

/// Vertex-input channels referenced by the authored code or required by
/// the transfer set and purpose.
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexInputs {
    pub normal: bool,
    pub texcoord: bool,
    pub colour: bool,
}

impl VertexInputs {
    pub fn scan(input: &GenInput) -> VertexInputs {
        let mut used = VertexInputs::default();
        scan_stmts(&input.vertex.stmts, &mut used);
        if let Some(colour) = input.colour {
            scan_stmts(&colour.stmts, &mut used);
        }
        for entry in input.transfers.ordered() {
            if entry.kind == TransferKind::VertexInput {
                used.mark(&entry.path[0]);
            }
        }
        // The lit purpose interpolates the world normal.
        if input.purpose.is_lit() {
            used.normal = true;
        }
        used
    }

    fn mark(&mut self, field: &str) {
        match field {
            "normal" => self.normal = true,
            "texcoord" => self.texcoord = true,
            "colour" => self.colour = true,
            _ => {}
        }
    }
}

fn scan_stmts(stmts: &[Stmt], used: &mut VertexInputs) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Decl { init, .. } => scan_expr(init, used),
            StmtKind::Assign { target, value } => {
                scan_expr(target, used);
                scan_expr(value, used);
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                scan_expr(cond, used);
                scan_stmts(then_branch, used);
                if let Some(stmts) = else_branch {
                    scan_stmts(stmts, used);
                }
            }
            StmtKind::Block(stmts) => scan_stmts(stmts, used),
            StmtKind::Discard | StmtKind::Return => {}
        }
    }
}

fn scan_expr(expr: &Expr, used: &mut VertexInputs) {
    match &expr.kind {
        ExprKind::Field { target, name } => {
            if matches!(target.kind, ExprKind::VertRef) {
                used.mark(name);
            }
            scan_expr(target, used);
        }
        ExprKind::Call { args, .. } => args.iter().for_each(|a| scan_expr(a, used)),
        ExprKind::Unary { operand, .. } => scan_expr(operand, used),
        ExprKind::Binary { lhs, rhs, .. } => {
            scan_expr(lhs, used);
            scan_expr(rhs, used);
        }
        _ => {}
    }
}

/// Ordered 4x4 dither thresholds (Bayer matrix over 16), row-major.
pub const DITHER_PATTERN: [f32; 16] = [
    0.0000, 0.5000, 0.1250, 0.6250, //
    0.7500, 0.2500, 0.8750, 0.3750, //
    0.1875, 0.6875, 0.0625, 0.5625, //
    0.9375, 0.4375, 0.8125, 0.3125,
];

/// Annotation on a texture uniform naming the solid colour the binding
/// layer substitutes when no texture is bound.
pub(crate) fn fallback_note(field: &MaterialField) -> String {
    match field.fallback {
        Some([r, g, b, a]) => format!(" // unbound: {:?} {:?} {:?} {:?}", r, g, b, a),
        None => String::new(),
    }
}

/// Syntax hooks one backend dialect provides to the shared emitter.
pub trait Dialect {
    fn type_name(&self, ty: &Ty) -> String;

    /// Spelling of a built-in (or constructor) call in this dialect.
    fn builtin_call(&self, callee: &str, args: Vec<String>) -> String;

    /// Texture sampling; `channels` is the sampled texture's channel count
    /// and decides the result swizzle.
    fn sample(&self, tex: String, coord: String, cube: bool, channels: u8) -> String;

    /// Multiplication, which is an intrinsic rather than an operator for
    /// matrix operands in some dialects.
    fn multiply(&self, lhs: String, lhs_ty: &Ty, rhs: String, rhs_ty: &Ty) -> String;

    /// Name of a vertex attribute as visible inside the authored body.
    /// Both backends expose attributes under the same `a_` names.
    fn vertex_attr(&self, field: &str) -> String {
        format!("a_{}", field)
    }

    /// Per-fragment built-in (`coord`, `depth`).
    fn frag_builtin(&self, field: &str) -> String;

    /// Numeric cast used when packing int/bool transfers through the
    /// float interpolators and back.
    fn cast(&self, ty: &Ty, expr: String) -> String;

    fn global_uniform(&self, name: &str) -> String {
        format!("u_g_{}", name)
    }

    fn material_uniform(&self, name: &str) -> String {
        format!("u_m_{}", name)
    }
}

/// Shared statement/expression emitter over the typed AST.
pub struct Emitter<'a> {
    pub dialect: &'a dyn Dialect,
    pub stage: StageKind,
    pub table: &'a TypeTable,
    pub indent: usize,
    /// Top-level authored variables that live at file scope because a later
    /// stage reads them. Their declarations emit as plain assignments.
    pub hoisted: std::collections::HashSet<String>,
}

impl<'a> Emitter<'a> {
    pub fn new(dialect: &'a dyn Dialect, stage: StageKind, table: &'a TypeTable) -> Self {
        Emitter {
            dialect,
            stage,
            table,
            indent: 1,
            hoisted: std::collections::HashSet::new(),
        }
    }

    fn indent_str(&self) -> String {
        "    ".repeat(self.indent)
    }

    fn ty_of(&self, expr: &Expr) -> &Ty {
        &self
            .table
            .get(expr.id)
            .expect("codegen ran on an unchecked node")
            .ty
    }

    pub fn emit_stmts(&mut self, stmts: &[Stmt], out: &mut String) -> Result<()> {
        for stmt in stmts {
            self.emit_stmt(stmt, out)?;
        }
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt, out: &mut String) -> Result<()> {
        match &stmt.kind {
            StmtKind::Decl { name, init, .. } => {
                let ty = self.ty_of(init).clone();
                let value = self.emit_expr(init)?;
                if self.indent == 1 && self.hoisted.contains(name) {
                    // Declared at file scope by the stage prologue.
                    writeln!(out, "{}{} = {};", self.indent_str(), name, value).unwrap();
                } else {
                    writeln!(
                        out,
                        "{}{} {} = {};",
                        self.indent_str(),
                        self.dialect.type_name(&ty),
                        name,
                        value
                    )
                    .unwrap();
                }
            }
            StmtKind::Assign { target, value } => {
                let target = self.emit_expr(target)?;
                let value = self.emit_expr(value)?;
                writeln!(out, "{}{} = {};", self.indent_str(), target, value).unwrap();
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.emit_expr(cond)?;
                writeln!(out, "{}if ({}) {{", self.indent_str(), cond).unwrap();
                self.indent += 1;
                self.emit_stmts(then_branch, out)?;
                self.indent -= 1;
                match else_branch {
                    Some(stmts) => {
                        writeln!(out, "{}}} else {{", self.indent_str()).unwrap();
                        self.indent += 1;
                        self.emit_stmts(stmts, out)?;
                        self.indent -= 1;
                        writeln!(out, "{}}}", self.indent_str()).unwrap();
                    }
                    None => {
                        writeln!(out, "{}}}", self.indent_str()).unwrap();
                    }
                }
            }
            StmtKind::Block(stmts) => {
                writeln!(out, "{}{{", self.indent_str()).unwrap();
                self.indent += 1;
                self.emit_stmts(stmts, out)?;
                self.indent -= 1;
                writeln!(out, "{}}}", self.indent_str()).unwrap();
            }
            StmtKind::Discard => {
                if self.stage == StageKind::Vertex {
                    crate::bail_codegen_at!(stmt.span, "discard cannot be honored in the vertex stage");
                }
                writeln!(out, "{}discard;", self.indent_str()).unwrap();
            }
            StmtKind::Return => {
                writeln!(out, "{}return;", self.indent_str()).unwrap();
            }
        }
        Ok(())
    }

    pub fn emit_expr(&mut self, expr: &Expr) -> Result<String> {
        match &expr.kind {
            ExprKind::IntLiteral(v) => Ok(format!("{}", v)),
            ExprKind::FloatLiteral(v) => Ok(format!("{:?}", v)),
            ExprKind::BoolLiteral(v) => Ok(if *v { "true" } else { "false" }.to_string()),

            ExprKind::Var(name) => Ok(name.clone()),

            // Namespace objects are never values; they only occur beneath a
            // field access, which resolves them below.
            ExprKind::GlobalRef
            | ExprKind::MaterialRef
            | ExprKind::VertRef
            | ExprKind::FragRef => {
                crate::bail_codegen_at!(expr.span, "namespace object used as a value")
            }

            ExprKind::Field { target, name } => self.emit_field(expr, target, name),

            ExprKind::Call { callee, args } => {
                if callee == "sample" {
                    if self.stage == StageKind::Vertex {
                        crate::bail_codegen_at!(
                            expr.span,
                            "texture sampling is not available in the vertex stage"
                        );
                    }
                    let (cube, channels) = match self.ty_of(&args[0]) {
                        Ty::TexCube => (true, 4),
                        Ty::Tex(n) => (false, *n),
                        other => {
                            crate::bail_codegen_at!(expr.span, "cannot sample {}", other);
                        }
                    };
                    let tex = self.emit_expr(&args[0])?;
                    let coord = self.emit_expr(&args[1])?;
                    return Ok(self.dialect.sample(tex, coord, cube, channels));
                }
                let mut emitted = Vec::with_capacity(args.len());
                for arg in args {
                    emitted.push(self.emit_expr(arg)?);
                }
                Ok(self.dialect.builtin_call(callee, emitted))
            }

            ExprKind::Unary { op, operand } => {
                let inner = self.emit_expr(operand)?;
                Ok(format!("({}{})", op.symbol(), inner))
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.ty_of(lhs).clone();
                let rhs_ty = self.ty_of(rhs).clone();
                let l = self.emit_expr(lhs)?;
                let r = self.emit_expr(rhs)?;
                if *op == BinOp::Mul
                    && (matches!(lhs_ty, Ty::Mat(..)) || matches!(rhs_ty, Ty::Mat(..)))
                {
                    return Ok(self.dialect.multiply(l, &lhs_ty, r, &rhs_ty));
                }
                Ok(format!("({} {} {})", l, op.symbol(), r))
            }
        }
    }

    /// Field access: namespace routing happens on the *target's checked
    /// type*, so a shadowed `out` still swizzles correctly.
    fn emit_field(&mut self, expr: &Expr, target: &Expr, name: &str) -> Result<String> {
        match self.ty_of(target).clone() {
            Ty::Global => Ok(self.dialect.global_uniform(name)),
            Ty::Material => Ok(self.dialect.material_uniform(name)),
            Ty::PerVertex => match self.stage {
                StageKind::Vertex => Ok(match name {
                    // Position and normal pass through skinning and the
                    // model transform before authored logic sees them.
                    "position" => "gx_position".to_string(),
                    "normal" => "gx_normal".to_string(),
                    other => self.dialect.vertex_attr(other),
                }),
                // In the fragment stage the value arrives through an
                // interpolated transfer channel.
                StageKind::Fragment => Ok(format!("xv_{}", name)),
            },
            Ty::PerFragment => Ok(self.dialect.frag_builtin(name)),
            Ty::Body => match name {
                "position" => Ok("gx_world".to_string()),
                other => {
                    crate::bail_codegen_at!(expr.span, "unknown body field '{}'", other);
                }
            },
            Ty::Output => match name {
                "colour" => Ok("xo_colour".to_string()),
                other => {
                    crate::bail_codegen_at!(expr.span, "unknown output field '{}'", other);
                }
            },
            // Plain swizzle.
            _ => {
                let target = self.emit_expr(target)?;
                Ok(format!("{}.{}", target, name))
            }
        }
    }
}

/// Expression converting a transfer value into its float interpolator
/// lanes. Int and bool transfers ride the float channels.
pub fn pack_value(dialect: &dyn Dialect, entry: &TransferEntry, src: String) -> String {
    match &entry.ty {
        Ty::Int(n) => dialect.cast(&Ty::Float(*n), src),
        Ty::Bool => dialect.cast(&Ty::Float(1), src),
        _ => src,
    }
}

/// Expression recovering a transfer value from its interpolated lanes.
pub fn unpack_value(dialect: &dyn Dialect, entry: &TransferEntry, lanes: String) -> String {
    match &entry.ty {
        Ty::Int(n) => dialect.cast(&Ty::Int(*n), lanes),
        Ty::Bool => format!("({} != 0.0)", lanes),
        _ => lanes,
    }
}

/// The vertex-stage expression a transfer entry is packed from.
pub fn transfer_source(entry: &TransferEntry, dialect: &dyn Dialect) -> String {
    match entry.kind {
        TransferKind::Authored => entry.path.join("."),
        TransferKind::VertexInput => match entry.path[0].as_str() {
            "position" => "gx_position".to_string(),
            "normal" => "gx_normal".to_string(),
            other => dialect.vertex_attr(other),
        },
        // The only internal transfer today is the lit purpose's world
        // normal.
        TransferKind::Internal => "gx_normal".to_string(),
    }
}

/// Build the pack plan both entry points must agree on.
pub fn pack_plan(transfers: &TransferSet) -> PackPlan {
    PackPlan::build(transfers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_predicates() {
        assert!(Purpose::Colour.has_colour_fragment());
        assert!(Purpose::Lit.has_colour_fragment());
        assert!(!Purpose::Depth.has_colour_fragment());
        assert!(Purpose::Lit.is_lit());
        assert!(!Purpose::Colour.is_lit());
    }

    #[test]
    fn test_dither_pattern_is_a_permutation_of_sixteenths() {
        let mut seen: Vec<_> = DITHER_PATTERN.iter().map(|v| (v * 16.0) as u32).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
    }
}
