#[cfg(test)]
mod tests {
    use crate::codegen::{DialectKind, Purpose};
    use crate::context::{Environment, ShaderContext};
    use crate::error::CompilerError;
    use crate::types::Ty;
    use crate::{CompileRequest, Compiler, ShaderSource};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn plain_source() -> ShaderSource {
        ShaderSource {
            vertex: "".to_string(),
            fragment: "out.colour = Float4(1.0, 0.5, 0.25, 1.0);".to_string(),
        }
    }

    fn compile(
        source: &ShaderSource,
        context: &ShaderContext,
        environment: Environment,
        purpose: Purpose,
        dialect: DialectKind,
    ) -> crate::error::Result<crate::codegen::ShaderPair> {
        Compiler::new().compile(&CompileRequest {
            source,
            context,
            environment,
            purpose,
            dialect,
        })
    }

    #[test]
    fn test_plain_colour_shader_compiles_in_both_dialects() {
        init_logging();
        let source = plain_source();
        let ctx = ShaderContext::new();
        for dialect in [DialectKind::Glsl, DialectKind::Hlsl] {
            let pair = compile(
                &source,
                &ctx,
                Environment::default(),
                Purpose::Colour,
                dialect,
            )
            .unwrap();
            assert!(!pair.vertex.is_empty());
            assert!(!pair.fragment.is_empty());
        }
    }

    #[test]
    fn test_rgb_colour_write_defaults_the_alpha_channel() {
        init_logging();
        let source = ShaderSource {
            vertex: "".to_string(),
            fragment: "val x = 1.0; out.colour = Float3(x, x, x);".to_string(),
        };
        let ctx = ShaderContext::new();
        let glsl = compile(
            &source,
            &ctx,
            Environment::default(),
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(glsl.fragment.contains("xo_colour = vec4(vec3(x, x, x), 1.0);"));
        let hlsl = compile(
            &source,
            &ctx,
            Environment::default(),
            Purpose::Colour,
            DialectKind::Hlsl,
        )
        .unwrap();
        assert!(hlsl
            .fragment
            .contains("xo_colour = float4(float3(x, x, x), 1.0);"));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        init_logging();
        let source = ShaderSource {
            vertex: "val n = vert.normal;".to_string(),
            fragment: "out.colour = Float4(n * 0.5 + 0.5, 1.0);".to_string(),
        };
        let mut ctx = ShaderContext::new();
        ctx.add_global("time", Ty::Float(1));
        ctx.add_global("camera_pos", Ty::Float(3));
        ctx.add_material("tint", Ty::Float(4));
        let env = Environment {
            probes: 2,
            bone_weights: 2,
            instancing: true,
            fade_dither: true,
        };
        for dialect in [DialectKind::Glsl, DialectKind::Hlsl] {
            let a = compile(&source, &ctx, env, Purpose::Lit, dialect).unwrap();
            let b = compile(&source, &ctx, env, Purpose::Lit, dialect).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_no_transfers_means_no_interpolator_slots() {
        init_logging();
        let pair = compile(
            &plain_source(),
            &ShaderContext::new(),
            Environment::default(),
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(!pair.vertex.contains("v_xfer"));
        assert!(!pair.fragment.contains("v_xfer"));
    }

    #[test]
    fn test_authored_transfer_claims_one_slot() {
        init_logging();
        let source = ShaderSource {
            vertex: "val n = vert.normal;".to_string(),
            fragment: "out.colour = Float4(n, 1.0);".to_string(),
        };
        let pair = compile(
            &source,
            &ShaderContext::new(),
            Environment::default(),
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap();
        // Vertex packs, fragment unpacks, and both agree on the slot.
        assert!(pair.vertex.contains("out vec4 v_xfer0;"));
        assert!(pair.vertex.contains("v_xfer0.xyz = n;"));
        assert!(pair.fragment.contains("in vec4 v_xfer0;"));
        assert!(pair.fragment.contains("n = v_xfer0.xyz;"));
        assert!(!pair.vertex.contains("v_xfer1"));
    }

    #[test]
    fn test_vertex_input_read_from_fragment_crosses_the_boundary() {
        init_logging();
        let source = ShaderSource {
            vertex: "".to_string(),
            fragment: "out.colour = Float4(vert.texcoord, 0.0, 1.0);".to_string(),
        };
        let pair = compile(
            &source,
            &ShaderContext::new(),
            Environment::default(),
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(pair.vertex.contains("in vec2 a_texcoord;"));
        assert!(pair.vertex.contains("v_xfer0.xy = a_texcoord;"));
        assert!(pair.fragment.contains("xv_texcoord = v_xfer0.xy;"));
    }

    #[test]
    fn test_lit_purpose_interpolates_the_world_normal() {
        init_logging();
        let pair = compile(
            &plain_source(),
            &ShaderContext::new(),
            Environment::default(),
            Purpose::Lit,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(pair.vertex.contains("in vec3 a_normal;"));
        assert!(pair.vertex.contains("gx_normal"));
        assert!(pair.fragment.contains("xi_normal"));
        assert!(pair.fragment.contains("u_sun_dir"));
        assert!(pair.fragment.contains("u_ambient"));
    }

    #[test]
    fn test_probe_count_changes_the_lighting_code() {
        init_logging();
        let ctx = ShaderContext::new();
        let source = plain_source();
        let none = compile(
            &source,
            &ctx,
            Environment::default(),
            Purpose::Lit,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(!none.fragment.contains("u_probe0"));

        let one = compile(
            &source,
            &ctx,
            Environment {
                probes: 1,
                ..Environment::default()
            },
            Purpose::Lit,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(one.fragment.contains("u_probe0"));
        assert!(!one.fragment.contains("u_probe1"));

        let two = compile(
            &source,
            &ctx,
            Environment {
                probes: 2,
                ..Environment::default()
            },
            Purpose::Lit,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(two.fragment.contains("u_probe1"));
        assert!(two.fragment.contains("u_probe_fade"));
    }

    #[test]
    fn test_fade_dither_emits_the_threshold_table_and_discard() {
        init_logging();
        let with = compile(
            &plain_source(),
            &ShaderContext::new(),
            Environment {
                fade_dither: true,
                ..Environment::default()
            },
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(with.fragment.contains("gx_dither"));
        assert!(with.fragment.contains("discard;"));
        assert!(with.fragment.contains("u_fade"));
        // Row-major lookup: y selects the row of the threshold table.
        assert!(with
            .fragment
            .contains("gx_dither[(int(gl_FragCoord.y) & 3) * 4 + (int(gl_FragCoord.x) & 3)]"));

        let without = compile(
            &plain_source(),
            &ShaderContext::new(),
            Environment::default(),
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(!without.fragment.contains("gx_dither"));
        assert!(!without.fragment.contains("discard;"));
    }

    #[test]
    fn test_skinning_and_instancing_paths() {
        init_logging();
        let ctx = ShaderContext::new();
        let skinned = compile(
            &plain_source(),
            &ctx,
            Environment {
                bone_weights: 3,
                ..Environment::default()
            },
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(skinned.vertex.contains("u_bones[a_bone_indices.x]"));
        assert!(skinned.vertex.contains("a_bone_weights.z"));
        assert!(!skinned.vertex.contains("a_bone_weights.w"));

        let instanced = compile(
            &plain_source(),
            &ctx,
            Environment {
                instancing: true,
                ..Environment::default()
            },
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(instanced.vertex.contains("in mat4 a_model;"));
        assert!(!instanced.vertex.contains("u_model"));
    }

    #[test]
    fn test_depth_purpose_skips_the_authored_fragment() {
        init_logging();
        let source = ShaderSource {
            vertex: "".to_string(),
            // Deliberately broken fragment body: depth must not touch it.
            fragment: "out.colour = no_such_fn();".to_string(),
        };
        let pair = compile(
            &source,
            &ShaderContext::new(),
            Environment::default(),
            Purpose::Depth,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(!pair.fragment.contains("o_colour"));
        assert!(!pair.fragment.contains("gx_body"));
    }

    #[test]
    fn test_material_texture_sampling() {
        init_logging();
        let mut ctx = ShaderContext::new();
        ctx.add_material_texture("albedo", 4, [1.0, 1.0, 1.0, 1.0]);
        let source = ShaderSource {
            vertex: "".to_string(),
            fragment: "out.colour = sample(material.albedo, vert.texcoord);".to_string(),
        };
        let glsl = compile(
            &source,
            &ctx,
            Environment::default(),
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap();
        // The sampler line documents the unbound-texture fallback colour.
        assert!(glsl
            .fragment
            .contains("uniform sampler2D u_m_albedo; // unbound: 1.0 1.0 1.0 1.0"));
        assert!(glsl.fragment.contains("texture(u_m_albedo, xv_texcoord)"));

        let hlsl = compile(
            &source,
            &ctx,
            Environment::default(),
            Purpose::Colour,
            DialectKind::Hlsl,
        )
        .unwrap();
        assert!(hlsl
            .fragment
            .contains("Texture2D u_m_albedo; // unbound: 1.0 1.0 1.0 1.0"));
        assert!(hlsl
            .fragment
            .contains("u_m_albedo.Sample(u_m_albedo_s, xv_texcoord)"));
    }

    #[test]
    fn test_sampling_in_the_vertex_stage_is_rejected() {
        init_logging();
        let mut ctx = ShaderContext::new();
        ctx.add_material_texture("albedo", 4, [1.0, 1.0, 1.0, 1.0]);
        let source = ShaderSource {
            vertex: "val c = sample(material.albedo, vert.texcoord);".to_string(),
            fragment: "out.colour = Float4(1.0);".to_string(),
        };
        let err = compile(
            &source,
            &ctx,
            Environment::default(),
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap_err();
        assert!(matches!(err, CompilerError::CodegenError(..)), "{err:?}");
    }

    #[test]
    fn test_discard_in_the_vertex_stage_is_rejected() {
        init_logging();
        let source = ShaderSource {
            vertex: "discard;".to_string(),
            fragment: "out.colour = Float4(1.0);".to_string(),
        };
        let err = compile(
            &source,
            &ShaderContext::new(),
            Environment::default(),
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap_err();
        assert!(matches!(err, CompilerError::CodegenError(..)), "{err:?}");
    }

    #[test]
    fn test_hlsl_uses_mul_and_remaps_clip_z() {
        init_logging();
        let pair = compile(
            &plain_source(),
            &ShaderContext::new(),
            Environment::default(),
            Purpose::Colour,
            DialectKind::Hlsl,
        )
        .unwrap();
        assert!(pair.vertex.contains("mul(u_view_proj, float4(gx_world, 1.0))"));
        assert!(pair
            .vertex
            .contains("vout.pos.z = (vout.pos.z + vout.pos.w) * 0.5;"));
    }

    #[test]
    fn test_invalid_environment_is_rejected_up_front() {
        init_logging();
        let err = compile(
            &plain_source(),
            &ShaderContext::new(),
            Environment {
                probes: 3,
                ..Environment::default()
            },
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap_err();
        assert!(matches!(err, CompilerError::InvalidRequest(_)), "{err:?}");
    }

    #[test]
    fn test_check_reports_type_errors_without_codegen() {
        init_logging();
        let source = ShaderSource {
            vertex: "".to_string(),
            fragment: "out.colour = Float2(1.0, 1.0);".to_string(),
        };
        let err = Compiler::new()
            .check(&source, &ShaderContext::new())
            .unwrap_err();
        assert!(matches!(err, CompilerError::TypeError(..)), "{err:?}");

        let ok = plain_source();
        assert!(Compiler::new().check(&ok, &ShaderContext::new()).is_ok());
    }

    #[test]
    fn test_implicit_widening_reaches_generated_code() {
        init_logging();
        let source = ShaderSource {
            vertex: "".to_string(),
            // `0.5` widens to Float3 against `vert.normal`.
            fragment: "out.colour = Float4(vert.normal + 0.5, 1.0);".to_string(),
        };
        let pair = compile(
            &source,
            &ShaderContext::new(),
            Environment::default(),
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap();
        assert!(pair.fragment.contains("(xv_normal + vec3(0.5))"));
    }

    #[test]
    fn test_globals_and_materials_emit_sorted() {
        init_logging();
        let mut ctx = ShaderContext::new();
        ctx.add_global("zoom", Ty::Float(1));
        ctx.add_global("ambient_shift", Ty::Float(3));
        let pair = compile(
            &plain_source(),
            &ctx,
            Environment::default(),
            Purpose::Colour,
            DialectKind::Glsl,
        )
        .unwrap();
        let a = pair.vertex.find("u_g_ambient_shift").unwrap();
        let z = pair.vertex.find("u_g_zoom").unwrap();
        assert!(a < z);
    }
}
