//! Caller-supplied compilation context: global and material field tables,
//! the function overload table (pre-seeded with the built-in library), and
//! the environment configuration that selects among generated variants.

use crate::types::Ty;
use std::collections::HashMap;

/// One function signature in an overload set.
#[derive(Debug, Clone, PartialEq)]
pub struct FnSig {
    pub params: Vec<Ty>,
    pub ret: Ty,
}

impl FnSig {
    pub fn new(params: Vec<Ty>, ret: Ty) -> Self {
        FnSig { params, ret }
    }
}

/// A named material parameter. Texture parameters carry a fallback solid
/// colour used when no texture is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialField {
    pub ty: Ty,
    pub fallback: Option<[f32; 4]>,
}

/// Compile-time knobs selecting among generated variants of the same
/// authored source. Part of the caller's variant-cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Environment {
    /// Bound environment-light probes, 0..=2.
    pub probes: u8,
    /// Blended skeletal bone weights per vertex, 0..=4.
    pub bone_weights: u8,
    pub instancing: bool,
    pub fade_dither: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            probes: 0,
            bone_weights: 0,
            instancing: false,
            fade_dither: false,
        }
    }
}

impl Environment {
    pub fn validate(&self) -> Result<(), String> {
        if self.probes > 2 {
            return Err(format!("probe count {} out of range 0..=2", self.probes));
        }
        if self.bone_weights > 4 {
            return Err(format!(
                "bone weight count {} out of range 0..=4",
                self.bone_weights
            ));
        }
        Ok(())
    }
}

/// Read-only input to a compile call. Never mutated by compilation.
#[derive(Debug, Clone)]
pub struct ShaderContext {
    globals: HashMap<String, Ty>,
    materials: HashMap<String, MaterialField>,
    functions: HashMap<String, Vec<FnSig>>,
}

impl Default for ShaderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderContext {
    /// A context with the built-in function library loaded and empty
    /// global/material tables.
    pub fn new() -> Self {
        let mut ctx = ShaderContext {
            globals: HashMap::new(),
            materials: HashMap::new(),
            functions: HashMap::new(),
        };
        ctx.load_builtins();
        ctx
    }

    pub fn add_global(&mut self, name: impl Into<String>, ty: Ty) {
        self.globals.insert(name.into(), ty);
    }

    pub fn add_material(&mut self, name: impl Into<String>, ty: Ty) {
        self.materials.insert(name.into(), MaterialField { ty, fallback: None });
    }

    /// A texture material parameter with a solid fallback colour for when
    /// no texture is bound.
    pub fn add_material_texture(&mut self, name: impl Into<String>, channels: u8, fallback: [f32; 4]) {
        self.materials.insert(
            name.into(),
            MaterialField {
                ty: Ty::Tex(channels),
                fallback: Some(fallback),
            },
        );
    }

    pub fn add_function(&mut self, name: impl Into<String>, sig: FnSig) {
        self.functions.entry(name.into()).or_default().push(sig);
    }

    pub fn global(&self, name: &str) -> Option<&Ty> {
        self.globals.get(name)
    }

    pub fn material(&self, name: &str) -> Option<&MaterialField> {
        self.materials.get(name)
    }

    pub fn overloads(&self, name: &str) -> Option<&[FnSig]> {
        self.functions.get(name).map(|v| v.as_slice())
    }

    /// Global names in deterministic (sorted) order, for codegen.
    pub fn sorted_globals(&self) -> Vec<(&String, &Ty)> {
        let mut v: Vec<_> = self.globals.iter().collect();
        v.sort_by(|a, b| a.0.cmp(b.0));
        v
    }

    /// Material names in deterministic (sorted) order, for codegen.
    pub fn sorted_materials(&self) -> Vec<(&String, &MaterialField)> {
        let mut v: Vec<_> = self.materials.iter().collect();
        v.sort_by(|a, b| a.0.cmp(b.0));
        v
    }

    fn load_builtins(&mut self) {
        use Ty::*;

        // Vector constructors. These double as the synthetic wrappers the
        // checker inserts for implicit widening conversions.
        self.add_function("Float", FnSig::new(vec![Float(1)], Float(1)));
        self.add_function("Float", FnSig::new(vec![Int(1)], Float(1)));
        self.add_function("Int", FnSig::new(vec![Int(1)], Int(1)));
        self.add_function("Int", FnSig::new(vec![Float(1)], Int(1)));
        for n in 2..=4u8 {
            let name = format!("Float{}", n);
            self.add_function(&name, FnSig::new(vec![Float(1); n as usize], Float(n)));
            self.add_function(&name, FnSig::new(vec![Float(1)], Float(n)));
            let iname = format!("Int{}", n);
            self.add_function(&iname, FnSig::new(vec![Int(1); n as usize], Int(n)));
            self.add_function(&iname, FnSig::new(vec![Int(1)], Int(n)));
        }
        self.add_function("Float3", FnSig::new(vec![Float(2), Float(1)], Float(3)));
        self.add_function("Float3", FnSig::new(vec![Float(1), Float(2)], Float(3)));
        self.add_function("Float4", FnSig::new(vec![Float(3), Float(1)], Float(4)));
        self.add_function("Float4", FnSig::new(vec![Float(1), Float(3)], Float(4)));
        self.add_function("Float4", FnSig::new(vec![Float(2), Float(2)], Float(4)));
        self.add_function("Float4", FnSig::new(vec![Float(2), Float(1), Float(1)], Float(4)));
        self.add_function("Float4", FnSig::new(vec![Float(1), Float(2), Float(1)], Float(4)));
        self.add_function("Float4", FnSig::new(vec![Float(1), Float(1), Float(2)], Float(4)));

        // Componentwise math
        for n in 1..=4u8 {
            for f in ["abs", "floor", "frac", "sqrt", "sin", "cos", "saturate"] {
                self.add_function(f, FnSig::new(vec![Float(n)], Float(n)));
            }
            for f in ["pow", "min", "max"] {
                self.add_function(f, FnSig::new(vec![Float(n), Float(n)], Float(n)));
            }
            self.add_function(
                "clamp",
                FnSig::new(vec![Float(n), Float(n), Float(n)], Float(n)),
            );
            self.add_function(
                "mix",
                FnSig::new(vec![Float(n), Float(n), Float(1)], Float(n)),
            );
        }
        self.add_function("min", FnSig::new(vec![Int(1), Int(1)], Int(1)));
        self.add_function("max", FnSig::new(vec![Int(1), Int(1)], Int(1)));

        // Geometry
        for n in 2..=4u8 {
            self.add_function("dot", FnSig::new(vec![Float(n), Float(n)], Float(1)));
            self.add_function("normalize", FnSig::new(vec![Float(n)], Float(n)));
            self.add_function("length", FnSig::new(vec![Float(n)], Float(1)));
        }
        self.add_function("cross", FnSig::new(vec![Float(3), Float(3)], Float(3)));
        self.add_function("reflect", FnSig::new(vec![Float(3), Float(3)], Float(3)));

        // Texture sampling
        for n in 1..=4u8 {
            self.add_function("sample", FnSig::new(vec![Tex(n), Float(2)], Float(n)));
        }
        self.add_function("sample", FnSig::new(vec![TexCube, Float(3)], Float(4)));
    }
}

/// Fixed per-vertex input fields addressable as `vert.<name>`.
pub fn vert_field(name: &str) -> Option<Ty> {
    match name {
        "position" => Some(Ty::Float(3)),
        "normal" => Some(Ty::Float(3)),
        "texcoord" => Some(Ty::Float(2)),
        "colour" => Some(Ty::Float(4)),
        _ => None,
    }
}

/// Fixed per-fragment built-ins addressable as `frag.<name>` from the
/// fragment stage only.
pub fn frag_field(name: &str) -> Option<Ty> {
    match name {
        "coord" => Some(Ty::Float(2)),
        "depth" => Some(Ty::Float(1)),
        _ => None,
    }
}

/// Writable fields of the vertex stage's `out` object.
pub fn body_field(name: &str) -> Option<Ty> {
    match name {
        "position" => Some(Ty::Float(3)),
        _ => None,
    }
}

/// Writable fields of the fragment stage's `out` object.
pub fn output_field(name: &str) -> Option<Ty> {
    match name {
        "colour" => Some(Ty::Float(4)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_validation() {
        assert!(Environment::default().validate().is_ok());
        let bad = Environment {
            probes: 3,
            ..Environment::default()
        };
        assert!(bad.validate().is_err());
        let bad = Environment {
            bone_weights: 5,
            ..Environment::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_builtin_overloads_present() {
        let ctx = ShaderContext::new();
        assert!(ctx.overloads("Float3").is_some());
        assert!(ctx
            .overloads("Float4")
            .unwrap()
            .iter()
            .any(|s| s.params == vec![Ty::Float(2), Ty::Float(1), Ty::Float(1)]));
        assert!(ctx.overloads("dot").unwrap().len() == 3);
        assert!(ctx.overloads("sample").unwrap().len() == 5);
        assert!(ctx.overloads("no_such_fn").is_none());
    }

    #[test]
    fn test_sorted_tables_are_deterministic() {
        let mut ctx = ShaderContext::new();
        ctx.add_global("time", Ty::Float(1));
        ctx.add_global("camera_pos", Ty::Float(3));
        let names: Vec<_> = ctx.sorted_globals().iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["camera_pos".to_string(), "time".to_string()]);
    }
}
