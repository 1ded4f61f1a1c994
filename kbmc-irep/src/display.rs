#![forbid(unsafe_code)]

use std::fmt;

use crate::{ArraySize, Designator, Endianness, Expr, ExprKind, Type, TypeKind, UnaryOp};

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::SignedBv { width } => write!(f, "s{width}"),
            TypeKind::UnsignedBv { width } => write!(f, "u{width}"),
            TypeKind::FixedBv { width, integer_bits } => write!(f, "fixed{width}.{integer_bits}"),
            TypeKind::Array { subtype, size } => match size {
                ArraySize::Fixed(n) => write!(f, "{subtype}[{n}]"),
                ArraySize::Infinite => write!(f, "{subtype}[inf]"),
            },
            TypeKind::Pointer { subtype } => write!(f, "{subtype}*"),
            TypeKind::Struct(s) => write!(f, "struct {}", s.tag),
            TypeKind::Union(s) => write!(f, "union {}", s.tag),
            TypeKind::Symbol { name } => write!(f, "symbol {name}"),
            TypeKind::Code { params, ret } => {
                let ps = params.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ");
                write!(f, "{ret}({ps})")
            }
            TypeKind::Empty => write!(f, "void"),
            TypeKind::String { length } => write!(f, "string[{length}]"),
        }
    }
}

fn list(f: &mut fmt::Formatter<'_>, es: &[Expr]) -> fmt::Result {
    for (i, e) in es.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

fn endian(e: Endianness) -> &'static str {
    match e {
        Endianness::Little => "le",
        Endianness::Big => "be",
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::ConstantInt(v) => write!(f, "{v}"),
            ExprKind::ConstantBool(b) => write!(f, "{b}"),
            ExprKind::ConstantFixedBv { bits } => write!(f, "fixed({bits:#x})"),
            ExprKind::ConstantString(s) => write!(f, "{s:?}"),
            ExprKind::ConstantArray(es) => {
                write!(f, "{{ ")?;
                list(f, es)?;
                write!(f, " }}")
            }
            ExprKind::ConstantStruct(es) | ExprKind::ConstantUnion(es) => {
                write!(f, "({}){{ ", self.ty())?;
                list(f, es)?;
                write!(f, " }}")
            }
            ExprKind::ArrayOf(v) => write!(f, "array_of({v})"),
            ExprKind::Symbol(name) => write!(f, "{name}"),
            ExprKind::Typecast(e) => write!(f, "({}){e}", self.ty()),
            ExprKind::If {
                cond,
                then_value,
                else_value,
            } => write!(f, "({cond} ? {then_value} : {else_value})"),
            ExprKind::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "-{operand}"),
                UnaryOp::Abs => write!(f, "abs({operand})"),
                UnaryOp::Not => write!(f, "!{operand}"),
                UnaryOp::BitNot => write!(f, "~{operand}"),
            },
            ExprKind::Member { source, member } => write!(f, "{source}.{member}"),
            ExprKind::Index { source, index } => write!(f, "{source}[{index}]"),
            ExprKind::With {
                source,
                designator,
                update,
            } => match designator {
                Designator::Member(m) => write!(f, "({source} with .{m} := {update})"),
                Designator::Index(i) => write!(f, "({source} with [{i}] := {update})"),
            },
            ExprKind::ByteExtract { endian: e, source, offset } => {
                write!(f, "byte_extract_{}({source}, {offset})", endian(*e))
            }
            ExprKind::ByteUpdate {
                endian: e,
                source,
                offset,
                update,
            } => write!(f, "byte_update_{}({source}, {offset}, {update})", endian(*e)),
            ExprKind::PointerOffset(p) => write!(f, "pointer_offset({p})"),
            ExprKind::PointerObject(p) => write!(f, "pointer_object({p})"),
            ExprKind::AddressOf(e) => write!(f, "&{e}"),
            ExprKind::SameObject(a, b) => write!(f, "same_object({a}, {b})"),
            ExprKind::Overflow(e) => write!(f, "overflow({e})"),
            ExprKind::OverflowCast { operand, bits } => write!(f, "overflow_cast<{bits}>({operand})"),
            ExprKind::OverflowNeg(e) => write!(f, "overflow_neg({e})"),
            ExprKind::ZeroString(e) => write!(f, "zero_string({e})"),
            ExprKind::ZeroStringLength(e) => write!(f, "zero_string_length({e})"),
            ExprKind::IsNan(e) => write!(f, "isnan({e})"),
            ExprKind::InvalidObject => write!(f, "INVALID"),
        }
    }
}
