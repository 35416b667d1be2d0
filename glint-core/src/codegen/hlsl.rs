//! HLSL backend.
//!
//! Mirrors the GLSL backend's shape: the authored body lands in a
//! file-scope `gx_body()` helper, with compiler-managed values and
//! attribute copies held in `static` globals so the body can reach them.
//! Output clip z is remapped from the [-w, w] convention the shared
//! view-projection matrix produces to the [0, w] range the rasterizer
//! expects.

use super::{
    fallback_note, pack_plan, pack_value, transfer_source, unpack_value, Dialect, Emitter,
    GenInput, ShaderPair, StageKind, VertexInputs, DITHER_PATTERN,
};
use crate::error::Result;
use crate::transfer::TransferKind;
use crate::types::Ty;
use std::fmt::Write;

use super::glsl::BONE_ARRAY_LEN;

pub struct Hlsl;

impl Dialect for Hlsl {
    fn type_name(&self, ty: &Ty) -> String {
        match ty {
            Ty::Float(1) => "float".to_string(),
            Ty::Float(n) => format!("float{}", n),
            Ty::Int(1) => "int".to_string(),
            Ty::Int(n) => format!("int{}", n),
            Ty::Mat(c, r) => format!("float{}x{}", r, c),
            Ty::Tex(_) => "Texture2D".to_string(),
            Ty::TexCube => "TextureCube".to_string(),
            Ty::Bool => "bool".to_string(),
            Ty::Void => "void".to_string(),
            other => format!("/* {} */", other),
        }
    }

    fn builtin_call(&self, callee: &str, args: Vec<String>) -> String {
        match callee {
            "Float" => format!("float({})", args.join(", ")),
            "Int" => format!("int({})", args.join(", ")),
            "Float2" | "Float3" | "Float4" => {
                format!("float{}({})", &callee[5..], args.join(", "))
            }
            "Int2" | "Int3" | "Int4" => format!("int{}({})", &callee[3..], args.join(", ")),
            "mix" => format!("lerp({})", args.join(", ")),
            other => format!("{}({})", other, args.join(", ")),
        }
    }

    fn sample(&self, tex: String, coord: String, _cube: bool, channels: u8) -> String {
        let call = format!("{}.Sample({}_s, {})", tex, tex, coord);
        match channels {
            1 => format!("{}.x", call),
            2 => format!("{}.xy", call),
            3 => format!("{}.xyz", call),
            _ => call,
        }
    }

    fn multiply(&self, lhs: String, _lhs_ty: &Ty, rhs: String, _rhs_ty: &Ty) -> String {
        format!("mul({}, {})", lhs, rhs)
    }

    fn frag_builtin(&self, field: &str) -> String {
        match field {
            "coord" => "gx_fragcoord.xy".to_string(),
            _ => "gx_fragcoord.z".to_string(),
        }
    }

    fn cast(&self, ty: &Ty, expr: String) -> String {
        format!("(({})({}))", self.type_name(ty), expr)
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
    let d = Hlsl;
    writeln!(out, "cbuffer GxParams {{").unwrap();
    writeln!(out, "    float4x4 u_view_proj;").unwrap();
    if !input.env.instancing {
        writeln!(out, "    float4x4 u_model;").unwrap();
    }
    if input.env.bone_weights > 0 {
        writeln!(out, "    float4x4 u_bones[{}];", BONE_ARRAY_LEN).unwrap();
    }
    if input.env.fade_dither {
        writeln!(out, "    float u_fade;").unwrap();
    }
    if input.purpose.is_lit() {
        writeln!(out, "    float3 u_sun_dir;").unwrap();
        writeln!(out, "    float3 u_sun_colour;").unwrap();
        writeln!(out, "    float3 u_ambient;").unwrap();
        if input.env.probes > 0 {
            writeln!(out, "    float u_probe_fade;").unwrap();
        }
    }
    for (name, ty) in input.ctx.sorted_globals() {
        writeln!(out, "    {} {};", d.type_name(ty), d.global_uniform(name)).unwrap();
    }
    for (name, field) in input.ctx.sorted_materials() {
        if !matches!(field.ty, Ty::Tex(_) | Ty::TexCube) {
            writeln!(
                out,
                "    {} {};",
                d.type_name(&field.ty),
                d.material_uniform(name)
            )
            .unwrap();
        }
    }
    writeln!(out, "}};").unwrap();
    writeln!(out).unwrap();

    let mut any = false;
    if input.purpose.is_lit() {
        for i in 0..input.env.probes {
            writeln!(out, "TextureCube u_probe{};", i).unwrap();
            writeln!(out, "SamplerState u_probe{}_s;", i).unwrap();
            any = true;
        }
    }
    for (name, field) in input.ctx.sorted_materials() {
        if matches!(field.ty, Ty::Tex(_) | Ty::TexCube) {
            let uniform = d.material_uniform(name);
            writeln!(
                out,
                "{} {};{}",
                d.type_name(&field.ty),
                uniform,
                fallback_note(field)
            )
            .unwrap();
            writeln!(out, "SamplerState {}_s;", uniform).unwrap();
            any = true;
        }
    }
    if any {
        writeln!(out).unwrap();
    }
}

fn emit_stage_io(out: &mut String, plan: &crate::transfer::PackPlan) {
    writeln!(out, "struct GxStageIo {{").unwrap();
    writeln!(out, "    float4 pos : SV_Position;").unwrap();
    for slot in 0..plan.slot_count {
        writeln!(out, "    float4 xfer{} : TEXCOORD{};", slot, slot).unwrap();
    }
    writeln!(out, "}};").unwrap();
    writeln!(out).unwrap();
}

fn vertex_shader(
    input: &GenInput,
    used: &VertexInputs,
    plan: &crate::transfer::PackPlan,
) -> Result<String> {
    let d = Hlsl;
    let mut out = String::new();

    emit_uniforms(&mut out, input);

    writeln!(out, "struct GxVsIn {{").unwrap();
    writeln!(out, "    float3 position : POSITION;").unwrap();
    if used.normal {
        writeln!(out, "    float3 normal : NORMAL;").unwrap();
    }
    if used.texcoord {
        writeln!(out, "    float2 texcoord : TEXCOORD0;").unwrap();
    }
    if used.colour {
        writeln!(out, "    float4 colour : COLOR0;").unwrap();
    }
    if input.env.bone_weights > 0 {
        writeln!(out, "    float4 bone_weights : BLENDWEIGHT;").unwrap();
        writeln!(out, "    uint4 bone_indices : BLENDINDICES;").unwrap();
    }
    if input.env.instancing {
        for row in 0..4 {
            writeln!(out, "    float4 model{} : TEXCOORD{};", row, 4 + row).unwrap();
        }
    }
    writeln!(out, "}};").unwrap();
    writeln!(out).unwrap();

    emit_stage_io(&mut out, plan);

    // Statics bridge the entry point and the authored body.
    writeln!(out, "static float3 gx_position;").unwrap();
    if used.normal {
        writeln!(out, "static float3 gx_normal;").unwrap();
    }
    writeln!(out, "static float3 gx_world;").unwrap();
    writeln!(out, "static float3 a_position;").unwrap();
    if used.texcoord {
        writeln!(out, "static float2 a_texcoord;").unwrap();
    }
    if used.colour {
        writeln!(out, "static float4 a_colour;").unwrap();
    }
    let mut hoisted = std::collections::HashSet::new();
    for entry in input.transfers.ordered() {
        if entry.kind == TransferKind::Authored {
            writeln!(
                out,
                "static {} {};",
                d.type_name(&entry.ty),
                entry.local_name()
            )
            .unwrap();
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

    writeln!(out, "GxStageIo vs_main(GxVsIn vin) {{").unwrap();
    if input.env.instancing {
        writeln!(
            out,
            "    float4x4 gx_model = float4x4(vin.model0, vin.model1, vin.model2, vin.model3);"
        )
        .unwrap();
    } else {
        writeln!(out, "    float4x4 gx_model = u_model;").unwrap();
    }
    let bones = input.env.bone_weights;
    if bones > 0 {
        writeln!(
            out,
            "    float4x4 gx_skin = vin.bone_weights.x * u_bones[vin.bone_indices.x];"
        )
        .unwrap();
        for (lane, _) in ["y", "z", "w"].iter().zip(1..bones) {
            writeln!(
                out,
                "    gx_skin += vin.bone_weights.{lane} * u_bones[vin.bone_indices.{lane}];"
            )
            .unwrap();
        }
        writeln!(out, "    gx_model = mul(gx_model, gx_skin);").unwrap();
    }
    writeln!(out, "    a_position = vin.position;").unwrap();
    if used.texcoord {
        writeln!(out, "    a_texcoord = vin.texcoord;").unwrap();
    }
    if used.colour {
        writeln!(out, "    a_colour = vin.colour;").unwrap();
    }
    writeln!(
        out,
        "    gx_position = mul(gx_model, float4(vin.position, 1.0)).xyz;"
    )
    .unwrap();
    if used.normal {
        writeln!(
            out,
            "    gx_normal = normalize(mul(gx_model, float4(vin.normal, 0.0)).xyz);"
        )
        .unwrap();
    }
    writeln!(out, "    gx_world = gx_position;").unwrap();
    writeln!(out, "    gx_body();").unwrap();
    writeln!(out, "    GxStageIo vout = (GxStageIo)0;").unwrap();
    for field in &plan.fields {
        let src = transfer_source(&field.entry, &d);
        writeln!(
            out,
            "    vout.xfer{}.{} = {};",
            field.slot,
            field.swizzle(),
            pack_value(&d, &field.entry, src)
        )
        .unwrap();
    }
    writeln!(
        out,
        "    vout.pos = mul(u_view_proj, float4(gx_world, 1.0));"
    )
    .unwrap();
    writeln!(out, "    vout.pos.z = (vout.pos.z + vout.pos.w) * 0.5;").unwrap();
    writeln!(out, "    return vout;").unwrap();
    writeln!(out, "}}").unwrap();
    Ok(out)
}

fn fragment_shader(input: &GenInput, plan: &crate::transfer::PackPlan) -> Result<String> {
    let d = Hlsl;
    let mut out = String::new();

    emit_uniforms(&mut out, input);
    emit_stage_io(&mut out, plan);

    let colour = input.purpose.has_colour_fragment();
    writeln!(out, "static float4 gx_fragcoord;").unwrap();
    for field in &plan.fields {
        writeln!(
            out,
            "static {} {};",
            d.type_name(&field.entry.ty),
            field.entry.local_name()
        )
        .unwrap();
    }
    if colour {
        writeln!(out, "static float4 xo_colour;").unwrap();
    }
    writeln!(out).unwrap();

    if input.env.fade_dither {
        write!(out, "static const float gx_dither[16] = {{").unwrap();
        for (i, v) in DITHER_PATTERN.iter().enumerate() {
            if i > 0 {
                write!(out, ", ").unwrap();
            }
            write!(out, "{:?}", v).unwrap();
        }
        writeln!(out, "}};").unwrap();
        writeln!(out).unwrap();
    }

    if let Some(program) = input.colour {
        writeln!(out, "void gx_body() {{").unwrap();
        let mut em = Emitter::new(&d, StageKind::Fragment, &program.table);
        em.emit_stmts(&program.stmts, &mut out)?;
        writeln!(out, "}}").unwrap();
        writeln!(out).unwrap();
    }

    if colour {
        writeln!(out, "float4 ps_main(GxStageIo pin) : SV_Target {{").unwrap();
    } else {
        writeln!(out, "void ps_main(GxStageIo pin) {{").unwrap();
    }
    writeln!(out, "    gx_fragcoord = pin.pos;").unwrap();
    if input.env.fade_dither {
        writeln!(
            out,
            "    float gx_threshold = gx_dither[((int)pin.pos.y & 3) * 4 + ((int)pin.pos.x & 3)];"
        )
        .unwrap();
        writeln!(out, "    if (u_fade < gx_threshold) {{").unwrap();
        writeln!(out, "        discard;").unwrap();
        writeln!(out, "    }}").unwrap();
    }
    for field in &plan.fields {
        let lanes = format!("pin.xfer{}.{}", field.slot, field.swizzle());
        writeln!(
            out,
            "    {} = {};",
            field.entry.local_name(),
            unpack_value(&d, &field.entry, lanes)
        )
        .unwrap();
    }
    if colour {
        writeln!(out, "    xo_colour = float4(1.0, 1.0, 1.0, 1.0);").unwrap();
        if input.colour.is_some() {
            writeln!(out, "    gx_body();").unwrap();
        }
        if input.purpose.is_lit() {
            writeln!(out, "    float3 gx_n = normalize(xi_normal);").unwrap();
            writeln!(
                out,
                "    float3 gx_light = u_ambient + u_sun_colour * max(dot(gx_n, -u_sun_dir), 0.0);"
            )
            .unwrap();
            match input.env.probes {
                1 => {
                    writeln!(
                        out,
                        "    gx_light += u_probe0.Sample(u_probe0_s, gx_n).xyz * u_probe_fade;"
                    )
                    .unwrap();
                }
                2 => {
                    writeln!(
                        out,
                        "    gx_light += lerp(u_probe0.Sample(u_probe0_s, gx_n).xyz, u_probe1.Sample(u_probe1_s, gx_n).xyz, u_probe_fade);"
                    )
                    .unwrap();
                }
                _ => {}
            }
            writeln!(out, "    xo_colour.xyz = xo_colour.xyz * gx_light;").unwrap();
        }
        writeln!(out, "    return xo_colour;").unwrap();
    }
    writeln!(out, "}}").unwrap();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        let d = Hlsl;
        assert_eq!(d.type_name(&Ty::Float(1)), "float");
        assert_eq!(d.type_name(&Ty::Float(4)), "float4");
        assert_eq!(d.type_name(&Ty::Int(3)), "int3");
        assert_eq!(d.type_name(&Ty::Mat(4, 4)), "float4x4");
        assert_eq!(d.type_name(&Ty::Tex(4)), "Texture2D");
    }

    #[test]
    fn test_builtin_renames() {
        let d = Hlsl;
        assert_eq!(
            d.builtin_call("mix", vec!["a".into(), "b".into(), "t".into()]),
            "lerp(a, b, t)"
        );
        assert_eq!(d.builtin_call("frac", vec!["x".into()]), "frac(x)");
        assert_eq!(d.builtin_call("saturate", vec!["x".into()]), "saturate(x)");
        assert_eq!(
            d.builtin_call("Float2", vec!["x".into(), "y".into()]),
            "float2(x, y)"
        );
    }

    #[test]
    fn test_sample_uses_paired_sampler_state() {
        let d = Hlsl;
        assert_eq!(
            d.sample("u_m_albedo".into(), "uv".into(), false, 4),
            "u_m_albedo.Sample(u_m_albedo_s, uv)"
        );
        assert_eq!(
            d.sample("u_m_mask".into(), "uv".into(), false, 1),
            "u_m_mask.Sample(u_m_mask_s, uv).x"
        );
    }

    #[test]
    fn test_matrix_multiply_is_an_intrinsic() {
        let d = Hlsl;
        assert_eq!(
            d.multiply("m".into(), &Ty::Mat(4, 4), "v".into(), &Ty::Float(4)),
            "mul(m, v)"
        );
    }
}
