pub mod ast;
pub mod codegen;
pub mod context;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod transfer;
pub mod type_checker;
pub mod types;

#[cfg(test)]
mod integration_tests;

use codegen::{DialectKind, GenInput, Purpose, ShaderPair, StageProgram};
use context::{Environment, ShaderContext};
use error::{CompilerError, Result};
use log::debug;
use transfer::{TransferEntry, TransferSet};
use type_checker::{Stage, TypeChecker};
use types::Ty;

/// Authored source for one shader: a vertex body and a fragment body.
///
/// The fragment body is ignored for purposes that do not run an authored
/// fragment stage.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

/// One compilation request. The same source compiles to different programs
/// depending on purpose, dialect and environment; the caller keys its
/// variant cache on exactly these fields.
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    pub source: &'a ShaderSource,
    pub context: &'a ShaderContext,
    pub environment: Environment,
    pub purpose: Purpose,
    pub dialect: DialectKind,
}

pub struct Compiler;

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler
    }

    /// Front-end only: lex, parse and type-check both stages without
    /// generating code. Environment knobs do not affect checking, so one
    /// check covers every variant of the source.
    pub fn check(&self, source: &ShaderSource, context: &ShaderContext) -> Result<()> {
        self.front_end(source, context, true)?;
        Ok(())
    }

    pub fn compile(&self, req: &CompileRequest) -> Result<ShaderPair> {
        req.environment
            .validate()
            .map_err(CompilerError::InvalidRequest)?;

        let checked = self.front_end(req.source, req.context, req.purpose.has_colour_fragment())?;
        let CheckedShader {
            vertex,
            colour,
            mut transfers,
        } = checked;

        // The lit purpose interpolates the world-space normal whether or
        // not the authored code mentions it.
        if req.purpose.is_lit() {
            transfers.insert(TransferEntry::internal("normal", Ty::Float(3)));
        }

        debug!(
            "compile: purpose={:?} dialect={:?} transfers={}",
            req.purpose,
            req.dialect,
            transfers.len()
        );

        let input = GenInput {
            purpose: req.purpose,
            vertex: &vertex,
            colour: colour.as_ref(),
            transfers: &transfers,
            env: &req.environment,
            ctx: req.context,
        };
        codegen::generate(req.dialect, &input)
    }

    /// Shared lex/parse/check pipeline. Node ids are threaded through both
    /// stages so every id is unique across the whole shader.
    fn front_end(
        &self,
        source: &ShaderSource,
        context: &ShaderContext,
        with_fragment: bool,
    ) -> Result<CheckedShader> {
        // Vertex stage
        let tokens = lexer::lex(&source.vertex)?;
        let mut parser = parser::Parser::new(tokens);
        let stmts = parser.parse_fragment()?;
        let counter = parser.into_counter();

        let checker = TypeChecker::new(context, Stage::Vertex, &[], counter);
        let vertex = checker.check_fragment(&stmts)?;

        let mut transfers = TransferSet::new();
        transfers.merge(&vertex.transfers);

        // Fragment stage, seeded with the vertex stage's top-level
        // declarations.
        let colour = if with_fragment {
            let tokens = lexer::lex(&source.fragment)?;
            let mut parser = parser::Parser::new_with_counter(tokens, vertex.counter.clone());
            let stmts = parser.parse_fragment()?;
            let counter = parser.into_counter();

            let checker = TypeChecker::new(context, Stage::Fragment, &vertex.exports, counter);
            let checked = checker.check_fragment(&stmts)?;
            transfers.merge(&checked.transfers);
            Some(StageProgram {
                stmts: checked.stmts,
                table: checked.table,
            })
        } else {
            None
        };

        Ok(CheckedShader {
            vertex: StageProgram {
                stmts: vertex.stmts,
                table: vertex.table,
            },
            colour,
            transfers,
        })
    }
}

struct CheckedShader {
    vertex: StageProgram,
    colour: Option<StageProgram>,
    transfers: TransferSet,
}
