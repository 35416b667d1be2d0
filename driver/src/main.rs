use clap::{Parser, Subcommand, ValueEnum};
use glint_core::codegen::{DialectKind, Purpose};
use glint_core::context::{Environment, ShaderContext};
use glint_core::types::Ty;
use glint_core::{CompileRequest, Compiler, ShaderSource};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "glintc")]
#[command(about = "Cross-compiles Glint shader bodies to GLSL or HLSL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Glsl,
    Hlsl,
}

#[derive(Clone, Copy, ValueEnum)]
enum PurposeArg {
    Colour,
    Lit,
    Depth,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a vertex and fragment body to native shader source
    Compile {
        /// Vertex-stage source file
        #[arg(value_name = "VERT")]
        vertex: PathBuf,

        /// Fragment-stage source file (ignored for the depth purpose)
        #[arg(value_name = "FRAG")]
        fragment: Option<PathBuf>,

        /// Output path stem (defaults to the vertex file without extension)
        #[arg(short, long, value_name = "STEM")]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "glsl")]
        dialect: DialectArg,

        #[arg(short, long, value_enum, default_value = "colour")]
        purpose: PurposeArg,

        /// Bound environment-light probes (0-2)
        #[arg(long, default_value_t = 0)]
        probes: u8,

        /// Skinning bone weights per vertex (0-4)
        #[arg(long, default_value_t = 0)]
        bones: u8,

        /// Take the model matrix from a per-instance attribute
        #[arg(long)]
        instancing: bool,

        /// Emit the screen-door fade dither in the fragment stage
        #[arg(long)]
        fade_dither: bool,

        /// Global parameter available as `global.NAME` (repeatable)
        #[arg(long = "global", value_name = "NAME:TYPE")]
        globals: Vec<String>,

        /// Material parameter available as `material.NAME`; texture types
        /// take an optional unbound fallback colour (repeatable)
        #[arg(long = "material", value_name = "NAME:TYPE[:R,G,B,A]")]
        materials: Vec<String>,

        /// Print verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Type-check shader bodies without generating output
    Check {
        /// Vertex-stage source file
        #[arg(value_name = "VERT")]
        vertex: PathBuf,

        /// Fragment-stage source file
        #[arg(value_name = "FRAG")]
        fragment: PathBuf,

        /// Global parameter available as `global.NAME` (repeatable)
        #[arg(long = "global", value_name = "NAME:TYPE")]
        globals: Vec<String>,

        /// Material parameter available as `material.NAME`; texture types
        /// take an optional unbound fallback colour (repeatable)
        #[arg(long = "material", value_name = "NAME:TYPE[:R,G,B,A]")]
        materials: Vec<String>,

        /// Print verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Debug, Error)]
enum DriverError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Compilation error: {0}")]
    CompilationError(#[from] glint_core::error::CompilerError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

fn main() -> Result<(), DriverError> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            vertex,
            fragment,
            output,
            dialect,
            purpose,
            probes,
            bones,
            instancing,
            fade_dither,
            globals,
            materials,
            verbose,
        } => {
            let purpose = match purpose {
                PurposeArg::Colour => Purpose::Colour,
                PurposeArg::Lit => Purpose::Lit,
                PurposeArg::Depth => Purpose::Depth,
            };
            let dialect = match dialect {
                DialectArg::Glsl => DialectKind::Glsl,
                DialectArg::Hlsl => DialectKind::Hlsl,
            };
            let environment = Environment {
                probes,
                bone_weights: bones,
                instancing,
                fade_dither,
            };
            let context = build_context(&globals, &materials)?;
            compile_files(
                vertex,
                fragment,
                output,
                dialect,
                purpose,
                environment,
                context,
                verbose,
            )?;
        }
        Commands::Check {
            vertex,
            fragment,
            globals,
            materials,
            verbose,
        } => {
            let context = build_context(&globals, &materials)?;
            check_files(vertex, fragment, context, verbose)?;
        }
    }

    Ok(())
}

fn read_source(vertex: &PathBuf, fragment: Option<&PathBuf>) -> Result<ShaderSource, DriverError> {
    Ok(ShaderSource {
        vertex: fs::read_to_string(vertex)?,
        fragment: match fragment {
            Some(path) => fs::read_to_string(path)?,
            None => String::new(),
        },
    })
}

fn parse_ty(text: &str) -> Option<Ty> {
    Some(match text {
        "float" => Ty::Float(1),
        "float2" => Ty::Float(2),
        "float3" => Ty::Float(3),
        "float4" => Ty::Float(4),
        "int" => Ty::Int(1),
        "int2" => Ty::Int(2),
        "int3" => Ty::Int(3),
        "int4" => Ty::Int(4),
        "bool" => Ty::Bool,
        "tex1" => Ty::Tex(1),
        "tex2" => Ty::Tex(2),
        "tex3" => Ty::Tex(3),
        "tex4" => Ty::Tex(4),
        "texcube" => Ty::TexCube,
        _ => return None,
    })
}

fn parse_fallback(text: &str) -> Option<[f32; 4]> {
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut colour = [0.0f32; 4];
    for (slot, part) in colour.iter_mut().zip(&parts) {
        *slot = part.trim().parse().ok()?;
    }
    Some(colour)
}

/// Builds the compilation context from repeated `--global NAME:TYPE` and
/// `--material NAME:TYPE[:R,G,B,A]` flags.
fn build_context(globals: &[String], materials: &[String]) -> Result<ShaderContext, DriverError> {
    let mut ctx = ShaderContext::new();
    for spec in globals {
        let (name, ty_text) = spec.split_once(':').ok_or_else(|| {
            DriverError::InvalidArgument(format!("--global '{}' is not NAME:TYPE", spec))
        })?;
        let ty = parse_ty(ty_text).ok_or_else(|| {
            DriverError::InvalidArgument(format!("unknown type '{}' in --global '{}'", ty_text, spec))
        })?;
        ctx.add_global(name, ty);
    }
    for spec in materials {
        let (name, rest) = spec.split_once(':').ok_or_else(|| {
            DriverError::InvalidArgument(format!("--material '{}' is not NAME:TYPE", spec))
        })?;
        let (ty_text, fallback) = match rest.split_once(':') {
            Some((ty_text, fallback)) => (ty_text, Some(fallback)),
            None => (rest, None),
        };
        let ty = parse_ty(ty_text).ok_or_else(|| {
            DriverError::InvalidArgument(format!(
                "unknown type '{}' in --material '{}'",
                ty_text, spec
            ))
        })?;
        match (ty, fallback) {
            (Ty::Tex(channels), fallback) => {
                let colour = match fallback {
                    Some(text) => parse_fallback(text).ok_or_else(|| {
                        DriverError::InvalidArgument(format!(
                            "fallback '{}' in --material '{}' is not R,G,B,A",
                            text, spec
                        ))
                    })?,
                    None => [1.0; 4],
                };
                ctx.add_material_texture(name, channels, colour);
            }
            (ty, None) => ctx.add_material(name, ty),
            (_, Some(_)) => {
                return Err(DriverError::InvalidArgument(format!(
                    "only texture materials take a fallback colour: '{}'",
                    spec
                )))
            }
        }
    }
    Ok(ctx)
}

fn compile_files(
    vertex: PathBuf,
    fragment: Option<PathBuf>,
    output: Option<PathBuf>,
    dialect: DialectKind,
    purpose: Purpose,
    environment: Environment,
    context: ShaderContext,
    verbose: bool,
) -> Result<(), DriverError> {
    if verbose {
        println!("Compiling {}...", vertex.display());
    }

    let source = read_source(&vertex, fragment.as_ref())?;

    let pair = Compiler::new().compile(&CompileRequest {
        source: &source,
        context: &context,
        environment,
        purpose,
        dialect,
    })?;

    let stem = output.unwrap_or_else(|| vertex.with_extension(""));
    let (vert_ext, frag_ext) = match dialect {
        DialectKind::Glsl => ("vert", "frag"),
        DialectKind::Hlsl => ("vs.hlsl", "ps.hlsl"),
    };
    let vert_path = stem.with_extension(vert_ext);
    let frag_path = stem.with_extension(frag_ext);
    fs::write(&vert_path, &pair.vertex)?;
    fs::write(&frag_path, &pair.fragment)?;

    if verbose {
        println!("Wrote {}", vert_path.display());
        println!("Wrote {}", frag_path.display());
    }

    Ok(())
}

fn check_files(
    vertex: PathBuf,
    fragment: PathBuf,
    context: ShaderContext,
    verbose: bool,
) -> Result<(), DriverError> {
    if verbose {
        println!("Checking {}...", vertex.display());
    }

    let source = read_source(&vertex, Some(&fragment))?;
    Compiler::new().check(&source, &context)?;

    if verbose {
        println!("{} and {} are valid", vertex.display(), fragment.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_context_parses_parameter_specs() {
        let globals = vec!["time:float".to_string(), "camera_pos:float3".to_string()];
        let materials = vec![
            "tint:float4".to_string(),
            "albedo:tex4:1,0.5,0,1".to_string(),
            "mask:tex1".to_string(),
        ];
        let ctx = build_context(&globals, &materials).unwrap();
        assert_eq!(ctx.global("time"), Some(&Ty::Float(1)));
        assert_eq!(ctx.global("camera_pos"), Some(&Ty::Float(3)));
        assert_eq!(ctx.material("tint").unwrap().ty, Ty::Float(4));
        let albedo = ctx.material("albedo").unwrap();
        assert_eq!(albedo.ty, Ty::Tex(4));
        assert_eq!(albedo.fallback, Some([1.0, 0.5, 0.0, 1.0]));
        // Unbound textures fall back to opaque white by default.
        assert_eq!(ctx.material("mask").unwrap().fallback, Some([1.0; 4]));
    }

    #[test]
    fn test_build_context_rejects_malformed_specs() {
        for (globals, materials) in [
            (vec!["time".to_string()], vec![]),
            (vec!["time:quaternion".to_string()], vec![]),
            (vec![], vec!["tint:float4:1,1,1,1".to_string()]),
            (vec![], vec!["albedo:tex4:1,1,1".to_string()]),
        ] {
            let err = build_context(&globals, &materials).unwrap_err();
            assert!(matches!(err, DriverError::InvalidArgument(_)), "{err}");
        }
    }
}
