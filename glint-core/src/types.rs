//! The shading language's type universe.
//!
//! Types are a closed sum; equality is structural (dimensions and shapes),
//! so two independently built `Float(3)` instances compare equal. Read and
//! write permissions travel next to the shape on `Type`, not inside it, and
//! never take part in equality.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    /// Scalar or vector float, dimension 1..=4.
    Float(u8),
    /// Scalar or vector int, dimension 1..=4.
    Int(u8),
    /// Column-major float matrix, `Mat(columns, rows)`.
    Mat(u8, u8),
    /// 2D float texture with `n` channels, 1..=4.
    Tex(u8),
    TexCube,
    Bool,
    Void,
    Func(Vec<Ty>, Box<Ty>),

    // Namespace markers. Never value types; they exist only to route field
    // access to the right table in the type checker.
    Global,
    Material,
    PerVertex,
    PerFragment,
    Output,
    Body,
}

impl Ty {
    /// First-class types can be stored in a `val`/`var` local.
    pub fn is_first_class(&self) -> bool {
        matches!(self, Ty::Float(_) | Ty::Int(_) | Ty::Bool)
    }

    pub fn is_namespace(&self) -> bool {
        matches!(
            self,
            Ty::Global | Ty::Material | Ty::PerVertex | Ty::PerFragment | Ty::Output | Ty::Body
        )
    }

    /// Vector or scalar dimension, if this is a float/int shape.
    pub fn dim(&self) -> Option<u8> {
        match self {
            Ty::Float(n) | Ty::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether a value of this type implicitly converts to `target`.
    ///
    /// The only widenings are scalar splats: `Int(1) -> Int(n)`,
    /// `Float(1) -> Float(n)` and `Int(1) -> Float(n)` for n in 1..=4.
    /// Identity is not a conversion.
    pub fn converts_to(&self, target: &Ty) -> bool {
        if self == target {
            return false;
        }
        match (self, target) {
            (Ty::Int(1), Ty::Int(n)) => (1..=4).contains(n),
            (Ty::Float(1), Ty::Float(n)) => (1..=4).contains(n),
            (Ty::Int(1), Ty::Float(n)) => (1..=4).contains(n),
            _ => false,
        }
    }

    /// Name of the constructor function used to materialize an implicit
    /// conversion to this type (`Float3`, `Int2`, ...).
    pub fn constructor_name(&self) -> Option<String> {
        match self {
            Ty::Float(1) => Some("Float".to_string()),
            Ty::Float(n) if (2..=4).contains(n) => Some(format!("Float{}", n)),
            Ty::Int(1) => Some("Int".to_string()),
            Ty::Int(n) if (2..=4).contains(n) => Some(format!("Int{}", n)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Ty::Float(1) => write!(f, "Float"),
            Ty::Float(n) => write!(f, "Float{}", n),
            Ty::Int(1) => write!(f, "Int"),
            Ty::Int(n) => write!(f, "Int{}", n),
            Ty::Mat(c, r) => write!(f, "Mat{}x{}", c, r),
            Ty::Tex(n) => write!(f, "Texture{}", n),
            Ty::TexCube => write!(f, "TextureCube"),
            Ty::Bool => write!(f, "Bool"),
            Ty::Void => write!(f, "Void"),
            Ty::Func(params, ret) => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", ret)
            }
            Ty::Global => write!(f, "global"),
            Ty::Material => write!(f, "material"),
            Ty::PerVertex => write!(f, "vert"),
            Ty::PerFragment => write!(f, "frag"),
            Ty::Output => write!(f, "out"),
            Ty::Body => write!(f, "body"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub read: bool,
    pub write: bool,
}

impl Access {
    pub const READ: Access = Access {
        read: true,
        write: false,
    };
    pub const WRITE: Access = Access {
        read: false,
        write: true,
    };
    pub const READ_WRITE: Access = Access {
        read: true,
        write: true,
    };
}

/// A type instance as seen by the checker: a shape plus the permissions the
/// expression it annotates grants.
#[derive(Debug, Clone)]
pub struct Type {
    pub ty: Ty,
    pub access: Access,
}

impl Type {
    /// An ordinary readable value (literals, call results, operators).
    pub fn value(ty: Ty) -> Self {
        Type {
            ty,
            access: Access::READ,
        }
    }

    pub fn read_only(ty: Ty) -> Self {
        Type {
            ty,
            access: Access::READ,
        }
    }

    pub fn read_write(ty: Ty) -> Self {
        Type {
            ty,
            access: Access::READ_WRITE,
        }
    }
}

/// Structural equality: shape only, permissions are not part of identity.
impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

/// Parse a swizzle mask against a source vector dimension.
///
/// Characters come from `xyzw` or `rgba`, each mapping to offsets 0..=3;
/// every offset must exist in the source vector and the mask is at most 4
/// long. Returns the component offsets.
pub fn parse_swizzle(mask: &str, src_dim: u8) -> Option<Vec<u8>> {
    if mask.is_empty() || mask.len() > 4 {
        return None;
    }
    let mut offsets = Vec::with_capacity(mask.len());
    for c in mask.chars() {
        let off = match c {
            'x' | 'r' => 0,
            'y' | 'g' => 1,
            'z' | 'b' => 2,
            'w' | 'a' => 3,
            _ => return None,
        };
        if off >= src_dim {
            return None;
        }
        offsets.push(off);
    }
    Some(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality_ignores_access() {
        assert_eq!(Type::read_only(Ty::Float(3)), Type::read_write(Ty::Float(3)));
        assert_ne!(Type::value(Ty::Float(3)), Type::value(Ty::Float(4)));
        assert_ne!(Type::value(Ty::Float(1)), Type::value(Ty::Int(1)));
    }

    #[test]
    fn test_documented_conversions() {
        for n in 1..=4u8 {
            assert_eq!(Ty::Int(1).converts_to(&Ty::Float(n)), true);
            if n > 1 {
                assert!(Ty::Int(1).converts_to(&Ty::Int(n)));
                assert!(Ty::Float(1).converts_to(&Ty::Float(n)));
            }
        }
        // Identity is not a conversion; exact matching handles it.
        assert!(!Ty::Float(1).converts_to(&Ty::Float(1)));
        assert!(!Ty::Int(1).converts_to(&Ty::Int(1)));
    }

    #[test]
    fn test_undocumented_conversions_rejected() {
        assert!(!Ty::Float(1).converts_to(&Ty::Int(1)));
        assert!(!Ty::Float(2).converts_to(&Ty::Float(3)));
        assert!(!Ty::Int(2).converts_to(&Ty::Int(4)));
        assert!(!Ty::Float(1).converts_to(&Ty::Int(3)));
        assert!(!Ty::Bool.converts_to(&Ty::Int(1)));
        assert!(!Ty::Float(3).converts_to(&Ty::Float(1)));
    }

    #[test]
    fn test_swizzle_parsing() {
        assert_eq!(parse_swizzle("xyz", 3), Some(vec![0, 1, 2]));
        assert_eq!(parse_swizzle("rgb", 4), Some(vec![0, 1, 2]));
        assert_eq!(parse_swizzle("wx", 4), Some(vec![3, 0]));
        assert_eq!(parse_swizzle("x", 1), Some(vec![0]));
        // Out of range for the source vector
        assert_eq!(parse_swizzle("z", 2), None);
        // Not swizzle characters
        assert_eq!(parse_swizzle("uv", 2), None);
        // Too long
        assert_eq!(parse_swizzle("xxxxx", 4), None);
        assert_eq!(parse_swizzle("", 4), None);
    }

    #[test]
    fn test_first_class() {
        assert!(Ty::Float(4).is_first_class());
        assert!(Ty::Int(1).is_first_class());
        assert!(Ty::Bool.is_first_class());
        assert!(!Ty::Mat(4, 4).is_first_class());
        assert!(!Ty::Tex(4).is_first_class());
        assert!(!Ty::Void.is_first_class());
        assert!(!Ty::Global.is_first_class());
    }
}
