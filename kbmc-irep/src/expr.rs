#![forbid(unsafe_code)]

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{IrepError, Type, TypeKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Ashr,
    Lshr,

    BitAnd,
    BitOr,
    BitXor,
    BitNand,
    BitNor,
    BitNxor,

    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,

    And,
    Or,
    Xor,
    Implies,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpClass {
    Arithmetic,
    Bitwise,
    Relational,
    Logical,
}

impl BinaryOp {
    pub fn class(self) -> OpClass {
        use BinaryOp::*;
        match self {
            Add | Sub | Mul | Div | Mod | Shl | Ashr | Lshr => OpClass::Arithmetic,
            BitAnd | BitOr | BitXor | BitNand | BitNor | BitNxor => OpClass::Bitwise,
            Eq | NotEq | Lt | Gt | Le | Ge => OpClass::Relational,
            And | Or | Xor | Implies => OpClass::Logical,
        }
    }

    pub fn symbol(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Shl => "<<",
            Ashr => ">>",
            Lshr => ">>>",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            BitNand => "~&",
            BitNor => "~|",
            BitNxor => "~^",
            Eq => "==",
            NotEq => "!=",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            And => "&&",
            Or => "||",
            Xor => "^^",
            Implies => "==>",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Abs,
    Not,
    BitNot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

/// What a `with` update replaces: a named member or an indexed element.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Designator {
    Member(String),
    Index(Expr),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExprKind {
    ConstantInt(i128),
    ConstantBool(bool),
    /// Raw two's-complement bits of the fixed-point value.
    ConstantFixedBv { bits: i128 },
    ConstantString(String),
    ConstantArray(Vec<Expr>),
    ConstantStruct(Vec<Expr>),
    ConstantUnion(Vec<Expr>),
    ArrayOf(Expr),

    Symbol(String),
    Typecast(Expr),
    If {
        cond: Expr,
        then_value: Expr,
        else_value: Expr,
    },
    Binary {
        op: BinaryOp,
        lhs: Expr,
        rhs: Expr,
    },
    Unary {
        op: UnaryOp,
        operand: Expr,
    },

    Member {
        source: Expr,
        member: String,
    },
    Index {
        source: Expr,
        index: Expr,
    },
    With {
        source: Expr,
        designator: Designator,
        update: Expr,
    },
    ByteExtract {
        endian: Endianness,
        source: Expr,
        offset: Expr,
    },
    ByteUpdate {
        endian: Endianness,
        source: Expr,
        offset: Expr,
        update: Expr,
    },

    PointerOffset(Expr),
    PointerObject(Expr),
    AddressOf(Expr),
    SameObject(Expr, Expr),

    /// Operand is the add/sub/mul whose overflow is asked about.
    Overflow(Expr),
    OverflowCast { operand: Expr, bits: u32 },
    OverflowNeg(Expr),

    ZeroString(Expr),
    ZeroStringLength(Expr),
    IsNan(Expr),
    InvalidObject,
}

struct ExprNode {
    ty: Type,
    kind: ExprKind,
    hash: u64,
}

/// Immutable, shared expression handle.
///
/// Every `Expr` in existence went through [`Expr::new`], so its declared type
/// agrees with its variant. Equality is structural; `Arc` identity is only a
/// fast path.
#[derive(Clone)]
pub struct Expr(Arc<ExprNode>);

impl Expr {
    pub fn new(ty: Type, kind: ExprKind) -> Result<Expr, IrepError> {
        check(&ty, &kind)?;
        let mut h = FxHasher::default();
        ty.hash(&mut h);
        kind.hash(&mut h);
        Ok(Expr(Arc::new(ExprNode {
            ty,
            hash: h.finish(),
            kind,
        })))
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn bool_const(value: bool) -> Expr {
        // Always well-typed.
        let ty = Type::bool();
        let kind = ExprKind::ConstantBool(value);
        let mut h = FxHasher::default();
        ty.hash(&mut h);
        kind.hash(&mut h);
        Expr(Arc::new(ExprNode {
            ty,
            hash: h.finish(),
            kind,
        }))
    }

    pub fn true_expr() -> Expr {
        Expr::bool_const(true)
    }

    pub fn false_expr() -> Expr {
        Expr::bool_const(false)
    }

    pub fn int(value: i128, ty: Type) -> Result<Expr, IrepError> {
        Expr::new(ty, ExprKind::ConstantInt(value))
    }

    pub fn symbol(name: impl Into<String>, ty: Type) -> Result<Expr, IrepError> {
        Expr::new(ty, ExprKind::Symbol(name.into()))
    }

    pub fn binary(op: BinaryOp, ty: Type, lhs: Expr, rhs: Expr) -> Result<Expr, IrepError> {
        Expr::new(ty, ExprKind::Binary { op, lhs, rhs })
    }

    /// Relational or logical operator; the result type is always `bool`.
    pub fn predicate(op: BinaryOp, lhs: Expr, rhs: Expr) -> Result<Expr, IrepError> {
        Expr::binary(op, Type::bool(), lhs, rhs)
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Result<Expr, IrepError> {
        Expr::predicate(BinaryOp::Eq, lhs, rhs)
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Result<Expr, IrepError> {
        Expr::predicate(BinaryOp::And, lhs, rhs)
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Result<Expr, IrepError> {
        Expr::predicate(BinaryOp::Or, lhs, rhs)
    }

    pub fn implies(lhs: Expr, rhs: Expr) -> Result<Expr, IrepError> {
        Expr::predicate(BinaryOp::Implies, lhs, rhs)
    }

    pub fn not(operand: Expr) -> Result<Expr, IrepError> {
        Expr::new(
            Type::bool(),
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            },
        )
    }

    pub fn if_then_else(cond: Expr, then_value: Expr, else_value: Expr) -> Result<Expr, IrepError> {
        let ty = then_value.ty().clone();
        Expr::new(
            ty,
            ExprKind::If {
                cond,
                then_value,
                else_value,
            },
        )
    }

    pub fn address_of(operand: Expr) -> Result<Expr, IrepError> {
        Expr::new(Type::pointer(operand.ty().clone()), ExprKind::AddressOf(operand))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind() {
            ExprKind::ConstantBool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.as_bool() == Some(true)
    }

    pub fn is_false(&self) -> bool {
        self.as_bool() == Some(false)
    }

    pub fn as_int(&self) -> Option<i128> {
        match self.kind() {
            ExprKind::ConstantInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        match self.kind() {
            ExprKind::ConstantInt(_)
            | ExprKind::ConstantBool(_)
            | ExprKind::ConstantFixedBv { .. }
            | ExprKind::ConstantString(_) => true,
            ExprKind::ConstantArray(es) | ExprKind::ConstantStruct(es) | ExprKind::ConstantUnion(es) => {
                es.iter().all(Expr::is_constant)
            }
            ExprKind::ArrayOf(e) => e.is_constant(),
            _ => false,
        }
    }

    /// Direct sub-expressions, left to right.
    pub fn operands(&self) -> Vec<&Expr> {
        match self.kind() {
            ExprKind::ConstantInt(_)
            | ExprKind::ConstantBool(_)
            | ExprKind::ConstantFixedBv { .. }
            | ExprKind::ConstantString(_)
            | ExprKind::Symbol(_)
            | ExprKind::InvalidObject => Vec::new(),
            ExprKind::ConstantArray(es) | ExprKind::ConstantStruct(es) | ExprKind::ConstantUnion(es) => {
                es.iter().collect()
            }
            ExprKind::ArrayOf(e)
            | ExprKind::Typecast(e)
            | ExprKind::PointerOffset(e)
            | ExprKind::PointerObject(e)
            | ExprKind::AddressOf(e)
            | ExprKind::Overflow(e)
            | ExprKind::OverflowNeg(e)
            | ExprKind::ZeroString(e)
            | ExprKind::ZeroStringLength(e)
            | ExprKind::IsNan(e) => vec![e],
            ExprKind::OverflowCast { operand, .. } | ExprKind::Unary { operand, .. } => vec![operand],
            ExprKind::If {
                cond,
                then_value,
                else_value,
            } => vec![cond, then_value, else_value],
            ExprKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            ExprKind::SameObject(a, b) => vec![a, b],
            ExprKind::Member { source, .. } => vec![source],
            ExprKind::Index { source, index } => vec![source, index],
            ExprKind::With {
                source,
                designator,
                update,
            } => match designator {
                Designator::Member(_) => vec![source, update],
                Designator::Index(i) => vec![source, i, update],
            },
            ExprKind::ByteExtract { source, offset, .. } => vec![source, offset],
            ExprKind::ByteUpdate {
                source, offset, update, ..
            } => vec![source, offset, update],
        }
    }

    /// Rebuilds this node with every operand replaced by `f(operand)`.
    ///
    /// The result is re-validated; when nothing changed the original handle is
    /// returned so sharing is preserved.
    pub fn map_operands<E: From<IrepError>>(&self, mut f: impl FnMut(&Expr) -> Result<Expr, E>) -> Result<Expr, E> {
        let mut changed = false;
        let mut m = |e: &Expr| -> Result<Expr, E> {
            let out = f(e)?;
            if !out.ptr_eq(e) {
                changed = true;
            }
            Ok(out)
        };

        let kind = match self.kind() {
            ExprKind::ConstantInt(_)
            | ExprKind::ConstantBool(_)
            | ExprKind::ConstantFixedBv { .. }
            | ExprKind::ConstantString(_)
            | ExprKind::Symbol(_)
            | ExprKind::InvalidObject => return Ok(self.clone()),
            ExprKind::ConstantArray(es) => ExprKind::ConstantArray(es.iter().map(&mut m).collect::<Result<_, _>>()?),
            ExprKind::ConstantStruct(es) => ExprKind::ConstantStruct(es.iter().map(&mut m).collect::<Result<_, _>>()?),
            ExprKind::ConstantUnion(es) => ExprKind::ConstantUnion(es.iter().map(&mut m).collect::<Result<_, _>>()?),
            ExprKind::ArrayOf(e) => ExprKind::ArrayOf(m(e)?),
            ExprKind::Typecast(e) => ExprKind::Typecast(m(e)?),
            ExprKind::If {
                cond,
                then_value,
                else_value,
            } => ExprKind::If {
                cond: m(cond)?,
                then_value: m(then_value)?,
                else_value: m(else_value)?,
            },
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op: *op,
                lhs: m(lhs)?,
                rhs: m(rhs)?,
            },
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op: *op,
                operand: m(operand)?,
            },
            ExprKind::Member { source, member } => ExprKind::Member {
                source: m(source)?,
                member: member.clone(),
            },
            ExprKind::Index { source, index } => ExprKind::Index {
                source: m(source)?,
                index: m(index)?,
            },
            ExprKind::With {
                source,
                designator,
                update,
            } => {
                let source = m(source)?;
                let designator = match designator {
                    Designator::Member(n) => Designator::Member(n.clone()),
                    Designator::Index(i) => Designator::Index(m(i)?),
                };
                ExprKind::With {
                    source,
                    designator,
                    update: m(update)?,
                }
            }
            ExprKind::ByteExtract { endian, source, offset } => ExprKind::ByteExtract {
                endian: *endian,
                source: m(source)?,
                offset: m(offset)?,
            },
            ExprKind::ByteUpdate {
                endian,
                source,
                offset,
                update,
            } => ExprKind::ByteUpdate {
                endian: *endian,
                source: m(source)?,
                offset: m(offset)?,
                update: m(update)?,
            },
            ExprKind::PointerOffset(e) => ExprKind::PointerOffset(m(e)?),
            ExprKind::PointerObject(e) => ExprKind::PointerObject(m(e)?),
            ExprKind::AddressOf(e) => ExprKind::AddressOf(m(e)?),
            ExprKind::SameObject(a, b) => ExprKind::SameObject(m(a)?, m(b)?),
            ExprKind::Overflow(e) => ExprKind::Overflow(m(e)?),
            ExprKind::OverflowCast { operand, bits } => ExprKind::OverflowCast {
                operand: m(operand)?,
                bits: *bits,
            },
            ExprKind::OverflowNeg(e) => ExprKind::OverflowNeg(m(e)?),
            ExprKind::ZeroString(e) => ExprKind::ZeroString(m(e)?),
            ExprKind::ZeroStringLength(e) => ExprKind::ZeroStringLength(m(e)?),
            ExprKind::IsNan(e) => ExprKind::IsNan(m(e)?),
        };

        if !changed {
            return Ok(self.clone());
        }
        // An address-of keeps pointing at whatever its operand became.
        let ty = match &kind {
            ExprKind::AddressOf(e) => Type::pointer(e.ty().clone()),
            _ => self.ty().clone(),
        };
        Ok(Expr::new(ty, kind)?)
    }

    /// Pre-order visit of every node.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        for op in self.operands() {
            op.visit(f);
        }
    }
}

/// Range of a two's-complement or unsigned bit-vector, when it fits `i128`.
pub fn bv_range(ty: &Type) -> Option<(i128, i128)> {
    match ty.kind() {
        TypeKind::UnsignedBv { width } if *width < 127 => Some((0, (1i128 << width) - 1)),
        TypeKind::SignedBv { width } if *width <= 127 => {
            let half = 1i128 << (width - 1);
            Some((-half, half - 1))
        }
        _ => None,
    }
}

fn check(ty: &Type, kind: &ExprKind) -> Result<(), IrepError> {
    let fail = |msg: String| Err(IrepError::ill_typed(msg, kind));

    match kind {
        ExprKind::ConstantInt(v) => {
            if !ty.is_bv() {
                return fail(format!("integer constant of non-bit-vector type {ty}"));
            }
            let fits = match bv_range(ty) {
                Some((lo, hi)) => *v >= lo && *v <= hi,
                // Wide unsigned types: the upper bound is past i128 anyway.
                None => *v >= 0 || !matches!(ty.kind(), TypeKind::UnsignedBv { .. }),
            };
            if !fits {
                return fail(format!("constant {v} does not fit {ty}"));
            }
            Ok(())
        }
        ExprKind::ConstantBool(_) => expect_bool(ty, kind),
        ExprKind::ConstantFixedBv { .. } => match ty.kind() {
            TypeKind::FixedBv { .. } => Ok(()),
            _ => fail(format!("fixed-point constant of type {ty}")),
        },
        ExprKind::ConstantString(_) => match ty.kind() {
            TypeKind::String { .. } => Ok(()),
            _ => fail(format!("string constant of type {ty}")),
        },
        ExprKind::ConstantArray(elems) => {
            let TypeKind::Array { subtype, .. } = ty.kind() else {
                return fail(format!("array constant of type {ty}"));
            };
            if let Some(bad) = elems.iter().find(|e| e.ty() != subtype) {
                return fail(format!("array element of type {} in array of {subtype}", bad.ty()));
            }
            Ok(())
        }
        ExprKind::ConstantStruct(elems) => {
            let TypeKind::Struct(s) = ty.kind() else {
                return fail(format!("struct constant of type {ty}"));
            };
            if elems.len() != s.members.len() {
                return fail(format!(
                    "struct `{}` has {} members, constant has {}",
                    s.tag,
                    s.members.len(),
                    elems.len()
                ));
            }
            for (e, m) in elems.iter().zip(&s.members) {
                if e.ty() != &m.ty {
                    return fail(format!("member `{}` expects {}, got {}", m.name, m.ty, e.ty()));
                }
            }
            Ok(())
        }
        ExprKind::ConstantUnion(elems) => {
            let TypeKind::Union(s) = ty.kind() else {
                return fail(format!("union constant of type {ty}"));
            };
            if elems.len() > s.members.len() || elems.iter().any(|e| !s.members.iter().any(|m| &m.ty == e.ty())) {
                return fail(format!("union constant does not match `{}`", s.tag));
            }
            Ok(())
        }
        ExprKind::ArrayOf(value) => match ty.kind() {
            TypeKind::Array { subtype, .. } if subtype == value.ty() => Ok(()),
            _ => fail(format!("array_of {} cannot have type {ty}", value.ty())),
        },
        ExprKind::Symbol(name) => {
            if name.is_empty() {
                return fail("symbol without a name".to_string());
            }
            Ok(())
        }
        ExprKind::Typecast(_) => Ok(()),
        ExprKind::If {
            cond,
            then_value,
            else_value,
        } => {
            expect_bool(cond.ty(), kind)?;
            if then_value.ty() != ty || else_value.ty() != ty {
                return fail(format!(
                    "if branches {} / {} disagree with {ty}",
                    then_value.ty(),
                    else_value.ty()
                ));
            }
            Ok(())
        }
        ExprKind::Binary { op, lhs, rhs } => match op.class() {
            OpClass::Relational => {
                expect_bool(ty, kind)?;
                if lhs.ty() != rhs.ty() {
                    return fail(format!("`{}` compares {} with {}", op.symbol(), lhs.ty(), rhs.ty()));
                }
                if !matches!(op, BinaryOp::Eq | BinaryOp::NotEq) && !lhs.ty().is_numeric() {
                    return fail(format!("ordering `{}` on {}", op.symbol(), lhs.ty()));
                }
                Ok(())
            }
            OpClass::Logical => {
                expect_bool(ty, kind)?;
                expect_bool(lhs.ty(), kind)?;
                expect_bool(rhs.ty(), kind)
            }
            OpClass::Arithmetic => {
                if !ty.is_numeric() || !lhs.ty().is_numeric() || !rhs.ty().is_numeric() {
                    return fail(format!(
                        "`{}` over {} and {} yielding {ty}",
                        op.symbol(),
                        lhs.ty(),
                        rhs.ty()
                    ));
                }
                Ok(())
            }
            OpClass::Bitwise => {
                let ok = |t: &Type| t.is_numeric() || t.is_bool();
                if !ok(ty) || !ok(lhs.ty()) || !ok(rhs.ty()) {
                    return fail(format!("bitwise `{}` over {} and {}", op.symbol(), lhs.ty(), rhs.ty()));
                }
                Ok(())
            }
        },
        ExprKind::Unary { op, operand } => match op {
            UnaryOp::Not => {
                expect_bool(ty, kind)?;
                expect_bool(operand.ty(), kind)
            }
            UnaryOp::Neg | UnaryOp::Abs => {
                if !ty.is_numeric() || !operand.ty().is_numeric() {
                    return fail(format!("{op:?} of {} yielding {ty}", operand.ty()));
                }
                Ok(())
            }
            UnaryOp::BitNot => {
                if !(ty.is_numeric() || ty.is_bool()) {
                    return fail(format!("bitwise not yielding {ty}"));
                }
                Ok(())
            }
        },
        ExprKind::Member { source, member } => match source.ty().kind() {
            TypeKind::Struct(s) | TypeKind::Union(s) => match s.member(member) {
                Some(m) if &m.ty == ty => Ok(()),
                Some(m) => fail(format!("member `{member}` has type {}, not {ty}", m.ty)),
                None => fail(format!("`{}` has no member `{member}`", s.tag)),
            },
            TypeKind::Symbol { .. } => Ok(()),
            _ => fail(format!("member `{member}` of non-aggregate {}", source.ty())),
        },
        ExprKind::Index { source, index } => {
            if !index.ty().is_bv() {
                return fail(format!("index of type {}", index.ty()));
            }
            match source.ty().kind() {
                TypeKind::Array { subtype, .. } | TypeKind::Pointer { subtype } if subtype == ty => Ok(()),
                TypeKind::String { .. } if ty.is_bv() => Ok(()),
                _ => fail(format!("indexing {} to get {ty}", source.ty())),
            }
        }
        ExprKind::With {
            source,
            designator,
            update,
        } => {
            if source.ty() != ty {
                return fail(format!("with over {} declared as {ty}", source.ty()));
            }
            match designator {
                Designator::Member(name) => match ty.struct_like().and_then(|s| s.member(name)) {
                    Some(m) if &m.ty == update.ty() => Ok(()),
                    Some(m) => fail(format!("member `{name}` is {}, update is {}", m.ty, update.ty())),
                    None => fail(format!("with `.{name}` on {ty}")),
                },
                Designator::Index(i) => {
                    if !i.ty().is_bv() {
                        return fail(format!("with index of type {}", i.ty()));
                    }
                    match ty.kind() {
                        TypeKind::Array { subtype, .. } if subtype == update.ty() => Ok(()),
                        TypeKind::String { .. } => Ok(()),
                        _ => fail(format!("with [{}] on {ty}", update.ty())),
                    }
                }
            }
        }
        ExprKind::ByteExtract { offset, .. } => expect_bv(offset.ty(), kind),
        ExprKind::ByteUpdate { source, offset, .. } => {
            if source.ty() != ty {
                return fail(format!("byte_update over {} declared as {ty}", source.ty()));
            }
            expect_bv(offset.ty(), kind)
        }
        ExprKind::PointerOffset(p) | ExprKind::PointerObject(p) => {
            expect_bv(ty, kind)?;
            expect_pointer(p.ty(), kind)
        }
        ExprKind::AddressOf(operand) => match ty.kind() {
            TypeKind::Pointer { subtype } if subtype == operand.ty() => Ok(()),
            _ => fail(format!("address-of {} must be a pointer to it, not {ty}", operand.ty())),
        },
        ExprKind::SameObject(a, b) => {
            expect_bool(ty, kind)?;
            expect_pointer(a.ty(), kind)?;
            expect_pointer(b.ty(), kind)
        }
        ExprKind::Overflow(operand) => {
            expect_bool(ty, kind)?;
            match operand.kind() {
                ExprKind::Binary {
                    op: BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul,
                    ..
                } => Ok(()),
                _ => fail("overflow predicate needs an add, sub or mul operand".to_string()),
            }
        }
        ExprKind::OverflowCast { operand, bits } => {
            expect_bool(ty, kind)?;
            if *bits == 0 || !operand.ty().is_numeric() {
                return fail(format!("overflow cast of {} to {bits} bits", operand.ty()));
            }
            Ok(())
        }
        ExprKind::OverflowNeg(_) | ExprKind::ZeroString(_) | ExprKind::IsNan(_) => expect_bool(ty, kind),
        ExprKind::ZeroStringLength(_) => expect_bv(ty, kind),
        ExprKind::InvalidObject => expect_pointer(ty, kind),
    }
}

fn expect_bool(ty: &Type, kind: &ExprKind) -> Result<(), IrepError> {
    if ty.is_bool() {
        Ok(())
    } else {
        Err(IrepError::ill_typed(format!("expected bool, found {ty}"), kind))
    }
}

fn expect_bv(ty: &Type, kind: &ExprKind) -> Result<(), IrepError> {
    if ty.is_bv() {
        Ok(())
    } else {
        Err(IrepError::ill_typed(format!("expected bit-vector, found {ty}"), kind))
    }
}

fn expect_pointer(ty: &Type, kind: &ExprKind) -> Result<(), IrepError> {
    if ty.is_pointer() {
        Ok(())
    } else {
        Err(IrepError::ill_typed(format!("expected pointer, found {ty}"), kind))
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.hash == other.0.hash && self.0.ty == other.0.ty && self.0.kind == other.0.kind)
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("ty", &self.0.ty)
            .field("kind", &self.0.kind)
            .finish()
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.0.ty, &self.0.kind).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (ty, kind) = <(Type, ExprKind)>::deserialize(deserializer)?;
        Expr::new(ty, kind).map_err(serde::de::Error::custom)
    }
}
