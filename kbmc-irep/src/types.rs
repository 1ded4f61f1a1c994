#![forbid(unsafe_code)]

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Expr, IrepError};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArraySize {
    Fixed(Expr),
    Infinite,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub ty: Type,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Members plus tag, shared by struct and union types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructType {
    pub tag: String,
    pub members: Vec<Member>,
}

impl StructType {
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Bool,
    SignedBv { width: u32 },
    UnsignedBv { width: u32 },
    /// `width` total bits, of which `integer_bits` sit left of the point.
    FixedBv { width: u32, integer_bits: u32 },
    Array { subtype: Type, size: ArraySize },
    Pointer { subtype: Type },
    Struct(StructType),
    Union(StructType),
    /// Resolved later against a symbol table.
    Symbol { name: String },
    Code { params: Vec<Type>, ret: Type },
    Empty,
    String { length: u64 },
}

struct TypeNode {
    kind: TypeKind,
    hash: u64,
}

/// Immutable, shared type handle. Equality is structural.
#[derive(Clone)]
pub struct Type(Arc<TypeNode>);

impl Type {
    pub fn new(kind: TypeKind) -> Result<Type, IrepError> {
        validate(&kind)?;
        let mut h = FxHasher::default();
        kind.hash(&mut h);
        Ok(Type(Arc::new(TypeNode {
            hash: h.finish(),
            kind,
        })))
    }

    // Variants that cannot fail validation.
    fn trusted(kind: TypeKind) -> Type {
        let mut h = FxHasher::default();
        kind.hash(&mut h);
        Type(Arc::new(TypeNode {
            hash: h.finish(),
            kind,
        }))
    }

    pub fn bool() -> Type {
        Type::trusted(TypeKind::Bool)
    }

    pub fn empty() -> Type {
        Type::trusted(TypeKind::Empty)
    }

    pub fn pointer(subtype: Type) -> Type {
        Type::trusted(TypeKind::Pointer { subtype })
    }

    pub fn code(params: Vec<Type>, ret: Type) -> Type {
        Type::trusted(TypeKind::Code { params, ret })
    }

    pub fn string(length: u64) -> Type {
        Type::trusted(TypeKind::String { length })
    }

    pub fn signed_bv(width: u32) -> Result<Type, IrepError> {
        Type::new(TypeKind::SignedBv { width })
    }

    pub fn unsigned_bv(width: u32) -> Result<Type, IrepError> {
        Type::new(TypeKind::UnsignedBv { width })
    }

    pub fn fixed_bv(width: u32, integer_bits: u32) -> Result<Type, IrepError> {
        Type::new(TypeKind::FixedBv { width, integer_bits })
    }

    pub fn array(subtype: Type, size: ArraySize) -> Result<Type, IrepError> {
        Type::new(TypeKind::Array { subtype, size })
    }

    pub fn struct_type(tag: impl Into<String>, members: Vec<Member>) -> Result<Type, IrepError> {
        Type::new(TypeKind::Struct(StructType {
            tag: tag.into(),
            members,
        }))
    }

    pub fn union_type(tag: impl Into<String>, members: Vec<Member>) -> Result<Type, IrepError> {
        Type::new(TypeKind::Union(StructType {
            tag: tag.into(),
            members,
        }))
    }

    pub fn symbol(name: impl Into<String>) -> Result<Type, IrepError> {
        Type::new(TypeKind::Symbol { name: name.into() })
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn ptr_eq(&self, other: &Type) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.kind(), TypeKind::Bool)
    }

    pub fn is_bv(&self) -> bool {
        matches!(self.kind(), TypeKind::SignedBv { .. } | TypeKind::UnsignedBv { .. })
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.kind(), TypeKind::SignedBv { .. } | TypeKind::FixedBv { .. })
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind(), TypeKind::Pointer { .. })
    }

    /// Bit-vectors, fixed-point and pointers: everything arithmetic applies to.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.kind(),
            TypeKind::SignedBv { .. }
                | TypeKind::UnsignedBv { .. }
                | TypeKind::FixedBv { .. }
                | TypeKind::Pointer { .. }
        )
    }

    pub fn width(&self) -> Option<u32> {
        match self.kind() {
            TypeKind::Bool => Some(1),
            TypeKind::SignedBv { width }
            | TypeKind::UnsignedBv { width }
            | TypeKind::FixedBv { width, .. } => Some(*width),
            _ => None,
        }
    }

    /// Element type for arrays and pointers.
    pub fn subtype(&self) -> Option<&Type> {
        match self.kind() {
            TypeKind::Array { subtype, .. } | TypeKind::Pointer { subtype } => Some(subtype),
            _ => None,
        }
    }

    pub fn struct_like(&self) -> Option<&StructType> {
        match self.kind() {
            TypeKind::Struct(s) | TypeKind::Union(s) => Some(s),
            _ => None,
        }
    }
}

fn validate(kind: &TypeKind) -> Result<(), IrepError> {
    match kind {
        TypeKind::Bool | TypeKind::Empty | TypeKind::String { .. } => Ok(()),
        TypeKind::Pointer { .. } | TypeKind::Code { .. } => Ok(()),
        TypeKind::SignedBv { width } | TypeKind::UnsignedBv { width } => {
            if *width == 0 {
                return Err(IrepError::invalid_type("bit-vector width must be non-zero", kind));
            }
            Ok(())
        }
        TypeKind::FixedBv { width, integer_bits } => {
            if *width == 0 || integer_bits > width {
                return Err(IrepError::invalid_type(
                    format!("fixed-point split {integer_bits}/{width} is not representable"),
                    kind,
                ));
            }
            Ok(())
        }
        TypeKind::Array { size, .. } => match size {
            ArraySize::Infinite => Ok(()),
            ArraySize::Fixed(e) if e.ty().is_bv() => Ok(()),
            ArraySize::Fixed(_) => Err(IrepError::invalid_type("array size must be a bit-vector", kind)),
        },
        TypeKind::Struct(s) | TypeKind::Union(s) => {
            if s.tag.is_empty() {
                return Err(IrepError::invalid_type("struct/union tag must be non-empty", kind));
            }
            for (i, m) in s.members.iter().enumerate() {
                if m.name.is_empty() {
                    return Err(IrepError::invalid_type(format!("member #{i} of `{}` has no name", s.tag), kind));
                }
                if s.members[..i].iter().any(|o| o.name == m.name) {
                    return Err(IrepError::invalid_type(
                        format!("duplicate member `{}` in `{}`", m.name, s.tag),
                        kind,
                    ));
                }
            }
            Ok(())
        }
        TypeKind::Symbol { name } => {
            if name.is_empty() {
                return Err(IrepError::invalid_type("symbol type needs a name", kind));
            }
            Ok(())
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || (self.0.hash == other.0.hash && self.0.kind == other.0.kind)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.kind.fmt(f)
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.kind.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Type {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kind = TypeKind::deserialize(deserializer)?;
        Type::new(kind).map_err(serde::de::Error::custom)
    }
}
