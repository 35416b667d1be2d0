//! GLSL backend.
//!
//! Emits one vertex and one fragment shader in desktop GLSL 330. The
//! authored body of each stage becomes a file-scope `gx_body()` helper so
//! an authored `return;` exits the body without skipping the stage's
//! packing and sink epilogue. Values shared between the prologue, the body
//! and the epilogue live at file scope.

use super::{
    fallback_note, pack_plan, pack_value, transfer_source, unpack_value, Dialect, Emitter,
    GenInput, ShaderPair, StageKind, VertexInputs, DITHER_PATTERN,
};
use crate::error::Result;
use crate::transfer::TransferKind;
use crate::types::Ty;
use std::fmt::Write;

pub const BONE_ARRAY_LEN: usize = 64;

pub struct Glsl;

impl Dialect for Glsl {
    fn type_name(&self, ty: &Ty) -> String {
        match ty {
            Ty::Float(1) => "float".to_string(),
            Ty::Float(n) => format!("vec{}", n),
            Ty::Int(1) => "int".to_string(),
            Ty::Int(n) => format!("ivec{}", n),
            Ty::Mat(c, r) if c == r => format!("mat{}", c),
            Ty::Mat(c, r) => format!("mat{}x{}", c, r),
            Ty::Tex(_) => "sampler2D".to_string(),
            Ty::TexCube => "samplerCube".to_string(),
            Ty::Bool => "bool".to_string(),
            Ty::Void => "void".to_string(),
            other => format!("/* {} */", other),
        }
    }

    fn builtin_call(&self, callee: &str, args: Vec<String>) -> String {
        match callee {
            // Constructors spell as the dialect's type names.
            "Float" => format!("float({})", args.join(", ")),
            "Int" => format!("int({})", args.join(", ")),
            "Float2" | "Float3" | "Float4" => {
                format!("vec{}({})", &callee[5..], args.join(", "))
            }
            "Int2" | "Int3" | "Int4" => format!("ivec{}({})", &callee[3..], args.join(", ")),
            "frac" => format!("fract({})", args.join(", ")),
            "saturate" => format!("clamp({}, 0.0, 1.0)", args[0]),
            other => format!("{}({})", other, args.join(", ")),
        }
    }

    fn sample(&self, tex: String, coord: String, _cube: bool, channels: u8) -> String {
        let call = format!("texture({}, {})", tex, coord);
        match channels {
            1 => format!("{}.x", call),
            2 => format!("{}.xy", call),
            3 => format!("{}.xyz", call),
            _ => call,
        }
    }

    fn multiply(&self, lhs: String, _lhs_ty: &Ty, rhs: String, _rhs_ty: &Ty) -> String {
        format!("({} * {})", lhs, rhs)
    }

    fn frag_builtin(&self, field: &str) -> String {
        match field {
            "coord" => "gl_FragCoord.xy".to_string(),
            _ => "gl_FragCoord.z".to_string(),
        }
    }

    fn cast(&self, ty: &Ty, expr: String) -> String {
        format!("{}({})", self.type_name(ty), expr)
    }
}

pub fn generate(input: &GenInput) -> Result<ShaderPair> {
    let used = VertexInputs::scan(input);
    let plan = pack_plan(input.transfers);
    Ok(ShaderPair {
        vertex: vertex_shader(input, &used, &plan)?,
        fragment: fragment_shader(input, &plan)?,
    })
}

fn emit_uniforms(out: &mut String, input: &GenInput) {
    let d = Glsl;
    writeln!(out, "uniform mat4 u_view_proj;").unwrap();
    if !input.env.instancing {
        writeln!(out, "uniform mat4 u_model;").unwrap();
    }
    if input.env.bone_weights > 0 {
        writeln!(out, "uniform mat4 u_bones[{}];", BONE_ARRAY_LEN).unwrap();
    }
    if input.env.fade_dither {
        writeln!(out, "uniform float u_fade;").unwrap();
    }
    if input.purpose.is_lit() {
        writeln!(out, "uniform vec3 u_sun_dir;").unwrap();
        writeln!(out, "uniform vec3 u_sun_colour;").unwrap();
        writeln!(out, "uniform vec3 u_ambient;").unwrap();
        for i in 0..input.env.probes {
            writeln!(out, "uniform samplerCube u_probe{};", i).unwrap();
        }
        if input.env.probes > 0 {
            writeln!(out, "uniform float u_probe_fade;").unwrap();
        }
    }
    for (name, ty) in input.ctx.sorted_globals() {
        writeln!(out, "uniform {} {};", d.type_name(ty), d.global_uniform(name)).unwrap();
    }
    for (name, field) in input.ctx.sorted_materials() {
        writeln!(
            out,
            "uniform {} {};{}",
            d.type_name(&field.ty),
            d.material_uniform(name),
            fallback_note(field)
        )
        .unwrap();
    }
}

fn vertex_shader(
    input: &GenInput,
    used: &VertexInputs,
    plan: &crate::transfer::PackPlan,
) -> Result<String> {
    let d = Glsl;
    let mut out = String::new();
    writeln!(out, "#version 330 core").unwrap();
    writeln!(out).unwrap();

    writeln!(out, "in vec3 a_position;").unwrap();
    if used.normal {
        writeln!(out, "in vec3 a_normal;").unwrap();
    }
    if used.texcoord {
        writeln!(out, "in vec2 a_texcoord;").unwrap();
    }
    if used.colour {
        writeln!(out, "in vec4 a_colour;").unwrap();
    }
    if input.env.bone_weights > 0 {
        writeln!(out, "in vec4 a_bone_weights;").unwrap();
        writeln!(out, "in ivec4 a_bone_indices;").unwrap();
    }
    if input.env.instancing {
        writeln!(out, "in mat4 a_model;").unwrap();
    }
    writeln!(out).unwrap();

    emit_uniforms(&mut out, input);
    writeln!(out).unwrap();

    for slot in 0..plan.slot_count {
        writeln!(out, "out vec4 v_xfer{};", slot).unwrap();
    }
    if plan.slot_count > 0 {
        writeln!(out).unwrap();
    }

    // Compiler-managed state shared between the prologue, the authored
    // body and the epilogue.
    writeln!(out, "vec3 gx_position;").unwrap();
    if used.normal {
        writeln!(out, "vec3 gx_normal;").unwrap();
    }
    writeln!(out, "vec3 gx_world;").unwrap();
    let mut hoisted = std::collections::HashSet::new();
    for entry in input.transfers.ordered() {
        if entry.kind == TransferKind::Authored {
            writeln!(out, "{} {};", d.type_name(&entry.ty), entry.local_name()).unwrap();
            hoisted.insert(entry.local_name());
        }
    }
    writeln!(out).unwrap();

    writeln!(out, "void gx_body() {{").unwrap();
    let mut em = Emitter::new(&d, StageKind::Vertex, &input.vertex.table);
    em.hoisted = hoisted;
    em.emit_stmts(&input.vertex.stmts, &mut out)?;
    writeln!(out, "}}").unwrap();
    writeln!(out).unwrap();

    writeln!(out, "void main() {{").unwrap();
    if input.env.instancing {
        writeln!(out, "    mat4 gx_model = a_model;").unwrap();
    } else {
        writeln!(out, "    mat4 gx_model = u_model;").unwrap();
    }
    let bones = input.env.bone_weights;
    if bones > 0 {
        writeln!(
            out,
            "    mat4 gx_skin = a_bone_weights.x * u_bones[a_bone_indices.x];"
        )
        .unwrap();
        for (lane, _) in ["y", "z", "w"].iter().zip(1..bones) {
            writeln!(
                out,
                "    gx_skin += a_bone_weights.{lane} * u_bones[a_bone_indices.{lane}];"
            )
            .unwrap();
        }
        writeln!(out, "    gx_model = gx_model * gx_skin;").unwrap();
    }
    writeln!(
        out,
        "    gx_position = (gx_model * vec4(a_position, 1.0)).xyz;"
    )
    .unwrap();
    if used.normal {
        writeln!(
            out,
            "    gx_normal = normalize((gx_model * vec4(a_normal, 0.0)).xyz);"
        )
        .unwrap();
    }
    writeln!(out, "    gx_world = gx_position;").unwrap();
    writeln!(out, "    gx_body();").unwrap();
    for field in &plan.fields {
        let src = transfer_source(&field.entry, &d);
        writeln!(
            out,
            "    v_xfer{}.{} = {};",
            field.slot,
            field.swizzle(),
            pack_value(&d, &field.entry, src)
        )
        .unwrap();
    }
    writeln!(out, "    gl_Position = u_view_proj * vec4(gx_world, 1.0);").unwrap();
    writeln!(out, "}}").unwrap();
    Ok(out)
}

fn fragment_shader(input: &GenInput, plan: &crate::transfer::PackPlan) -> Result<String> {
    let d = Glsl;
    let mut out = String::new();
    writeln!(out, "#version 330 core").unwrap();
    writeln!(out).unwrap();

    emit_uniforms(&mut out, input);
    writeln!(out).unwrap();

    for slot in 0..plan.slot_count {
        writeln!(out, "in vec4 v_xfer{};", slot).unwrap();
    }
    if plan.slot_count > 0 {
        writeln!(out).unwrap();
    }

    let colour = input.purpose.has_colour_fragment();
    if colour {
        writeln!(out, "out vec4 o_colour;").unwrap();
        writeln!(out).unwrap();
    }

    // Unpacked transfer values, at file scope so the authored body sees
    // them.
    for field in &plan.fields {
        writeln!(
            out,
            "{} {};",
            d.type_name(&field.entry.ty),
            field.entry.local_name()
        )
        .unwrap();
    }
    if colour {
        writeln!(out, "vec4 xo_colour;").unwrap();
    }
    writeln!(out).unwrap();

    if input.env.fade_dither {
        write!(out, "const float gx_dither[16] = float[16](").unwrap();
        for (i, v) in DITHER_PATTERN.iter().enumerate() {
            if i > 0 {
                write!(out, ", ").unwrap();
            }
            write!(out, "{:?}", v).unwrap();
        }
        writeln!(out, ");").unwrap();
        writeln!(out).unwrap();
    }

    if let Some(program) = input.colour {
        writeln!(out, "void gx_body() {{").unwrap();
        let mut em = Emitter::new(&d, StageKind::Fragment, &program.table);
        em.emit_stmts(&program.stmts, &mut out)?;
        writeln!(out, "}}").unwrap();
        writeln!(out).unwrap();
    }

    writeln!(out, "void main() {{").unwrap();
    if input.env.fade_dither {
        writeln!(
            out,
            "    float gx_threshold = gx_dither[(int(gl_FragCoord.y) & 3) * 4 + (int(gl_FragCoord.x) & 3)];"
        )
        .unwrap();
        writeln!(out, "    if (u_fade < gx_threshold) {{").unwrap();
        writeln!(out, "        discard;").unwrap();
        writeln!(out, "    }}").unwrap();
    }
    for field in &plan.fields {
        let lanes = format!("v_xfer{}.{}", field.slot, field.swizzle());
        writeln!(
            out,
            "    {} = {};",
            field.entry.local_name(),
            unpack_value(&d, &field.entry, lanes)
        )
        .unwrap();
    }
    if colour {
        writeln!(out, "    xo_colour = vec4(1.0, 1.0, 1.0, 1.0);").unwrap();
        if input.colour.is_some() {
            writeln!(out, "    gx_body();").unwrap();
        }
        if input.purpose.is_lit() {
            writeln!(out, "    vec3 gx_n = normalize(xi_normal);").unwrap();
            writeln!(
                out,
                "    vec3 gx_light = u_ambient + u_sun_colour * max(dot(gx_n, -u_sun_dir), 0.0);"
            )
            .unwrap();
            match input.env.probes {
                1 => {
                    writeln!(
                        out,
                        "    gx_light += texture(u_probe0, gx_n).xyz * u_probe_fade;"
                    )
                    .unwrap();
                }
                2 => {
                    writeln!(
                        out,
                        "    gx_light += mix(texture(u_probe0, gx_n).xyz, texture(u_probe1, gx_n).xyz, u_probe_fade);"
                    )
                    .unwrap();
                }
                _ => {}
            }
            writeln!(out, "    xo_colour.xyz = xo_colour.xyz * gx_light;").unwrap();
        }
        writeln!(out, "    o_colour = xo_colour;").unwrap();
    }
    writeln!(out, "}}").unwrap();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        let d = Glsl;
        assert_eq!(d.type_name(&Ty::Float(1)), "float");
        assert_eq!(d.type_name(&Ty::Float(3)), "vec3");
        assert_eq!(d.type_name(&Ty::Int(2)), "ivec2");
        assert_eq!(d.type_name(&Ty::Mat(4, 4)), "mat4");
        assert_eq!(d.type_name(&Ty::TexCube), "samplerCube");
    }

    #[test]
    fn test_builtin_renames() {
        let d = Glsl;
        assert_eq!(d.builtin_call("frac", vec!["x".into()]), "fract(x)");
        assert_eq!(
            d.builtin_call("saturate", vec!["x".into()]),
            "clamp(x, 0.0, 1.0)"
        );
        assert_eq!(
            d.builtin_call("Float3", vec!["x".into(), "y".into(), "z".into()]),
            "vec3(x, y, z)"
        );
        assert_eq!(d.builtin_call("mix", vec!["a".into(), "b".into(), "t".into()]), "mix(a, b, t)");
    }

    #[test]
    fn test_sample_swizzles_to_channel_count() {
        let d = Glsl;
        assert_eq!(d.sample("t".into(), "uv".into(), false, 4), "texture(t, uv)");
        assert_eq!(d.sample("t".into(), "uv".into(), false, 1), "texture(t, uv).x");
        assert_eq!(d.sample("t".into(), "uv".into(), false, 3), "texture(t, uv).xyz");
    }
}
