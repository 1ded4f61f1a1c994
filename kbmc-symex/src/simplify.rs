#![forbid(unsafe_code)]

//! Expression simplification: constant folding plus a handful of local
//! rewrites. Folding follows the operand type: bit-vectors wrap at their
//! width and honour signedness.

use kbmc_irep::{BinaryOp, Designator, Expr, ExprKind, IrepError, Type, TypeKind, UnaryOp, bv_range};
use rustc_hash::FxHashMap;

/// Memoizing simplifier. Results are cached per structurally equal input, so
/// shared sub-expressions are only simplified once.
#[derive(Default)]
pub struct Simplifier {
    cache: FxHashMap<Expr, Expr>,
}

impl Simplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn simplify(&mut self, e: &Expr) -> Result<Expr, IrepError> {
        if let Some(done) = self.cache.get(e) {
            return Ok(done.clone());
        }
        let with_ops = e.map_operands(|op| self.simplify(op))?;
        let out = simplify_node(&with_ops)?;
        self.cache.insert(e.clone(), out.clone());
        Ok(out)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

pub fn simplify(e: &Expr) -> Result<Expr, IrepError> {
    Simplifier::new().simplify(e)
}

/// Reduces `v` into the range of `ty`; `None` when `ty` is not a bit-vector
/// narrow enough to fold in `i128`.
pub fn wrap(v: i128, ty: &Type) -> Option<i128> {
    match ty.kind() {
        TypeKind::SignedBv { width } if *width <= 126 => {
            let w = *width;
            let bits = (v as u128) & ((1u128 << w) - 1);
            if bits & (1u128 << (w - 1)) != 0 {
                Some(bits as i128 - (1i128 << w))
            } else {
                Some(bits as i128)
            }
        }
        TypeKind::UnsignedBv { width } if *width <= 126 => Some(((v as u128) & ((1u128 << width) - 1)) as i128),
        _ => None,
    }
}

fn int(v: i128, ty: &Type) -> Result<Option<Expr>, IrepError> {
    match wrap(v, ty) {
        Some(w) => Ok(Some(Expr::int(w, ty.clone())?)),
        None => Ok(None),
    }
}

fn boolean(b: bool) -> Expr {
    Expr::bool_const(b)
}

fn simplify_node(e: &Expr) -> Result<Expr, IrepError> {
    let folded = match e.kind() {
        ExprKind::Binary { op, lhs, rhs } => fold_binary(e.ty(), *op, lhs, rhs)?,
        ExprKind::Unary { op, operand } => fold_unary(e.ty(), *op, operand)?,
        ExprKind::If {
            cond,
            then_value,
            else_value,
        } => match cond.as_bool() {
            Some(true) => Some(then_value.clone()),
            Some(false) => Some(else_value.clone()),
            None if then_value == else_value => Some(then_value.clone()),
            None if e.ty().is_bool() && then_value.is_true() && else_value.is_false() => Some(cond.clone()),
            None => None,
        },
        ExprKind::Typecast(operand) => fold_typecast(e.ty(), operand)?,
        ExprKind::Member { source, member } => fold_member(source, member)?,
        ExprKind::Index { source, index } => fold_index(source, index)?,
        ExprKind::With {
            source,
            designator,
            update,
        } => fold_with(source, designator, update)?,
        ExprKind::Overflow(inner) => fold_overflow(inner),
        ExprKind::OverflowCast { operand, bits } => operand.as_int().map(|v| {
            let fits = if operand.ty().is_signed() {
                let half = 1i128 << (bits.min(&127) - 1);
                -half <= v && v < half
            } else {
                *bits >= 127 || (v >= 0 && v < (1i128 << bits))
            };
            boolean(!fits)
        }),
        ExprKind::OverflowNeg(operand) => match (operand.as_int(), bv_range(operand.ty())) {
            (Some(v), Some((lo, _))) if operand.ty().is_signed() => Some(boolean(v == lo)),
            (Some(v), Some(_)) => Some(boolean(v != 0)),
            _ => None,
        },
        ExprKind::SameObject(a, b) if a == b => Some(boolean(true)),
        _ => None,
    };

    match folded {
        // A fold may expose further folds on the rebuilt node.
        Some(out) if !out.ptr_eq(e) && out != *e => simplify_node(&out),
        Some(out) => Ok(out),
        None => Ok(e.clone()),
    }
}

fn fold_binary(ty: &Type, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Option<Expr>, IrepError> {
    use BinaryOp::*;

    if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
        return fold_int_binary(ty, op, lhs.ty(), a, b);
    }

    if let (Some(a), Some(b)) = (lhs.as_bool(), rhs.as_bool()) {
        let v = match op {
            And | BitAnd => a && b,
            Or | BitOr => a || b,
            Xor | BitXor | NotEq => a != b,
            Implies => !a || b,
            Eq | BitNxor => a == b,
            BitNand => !(a && b),
            BitNor => !(a || b),
            _ => return Ok(None),
        };
        return Ok(Some(boolean(v)));
    }

    let out = match op {
        And => match (lhs.as_bool(), rhs.as_bool()) {
            (Some(false), _) | (_, Some(false)) => Some(boolean(false)),
            (Some(true), _) => Some(rhs.clone()),
            (_, Some(true)) => Some(lhs.clone()),
            _ if lhs == rhs => Some(lhs.clone()),
            _ => None,
        },
        Or => match (lhs.as_bool(), rhs.as_bool()) {
            (Some(true), _) | (_, Some(true)) => Some(boolean(true)),
            (Some(false), _) => Some(rhs.clone()),
            (_, Some(false)) => Some(lhs.clone()),
            _ if lhs == rhs => Some(lhs.clone()),
            _ => None,
        },
        Implies => match (lhs.as_bool(), rhs.as_bool()) {
            (Some(false), _) | (_, Some(true)) => Some(boolean(true)),
            (Some(true), _) => Some(rhs.clone()),
            (_, Some(false)) => Some(Expr::not(lhs.clone())?),
            _ if lhs == rhs => Some(boolean(true)),
            _ => None,
        },
        Eq | Le | Ge if lhs == rhs => Some(boolean(true)),
        NotEq | Lt | Gt if lhs == rhs => Some(boolean(false)),
        Eq | NotEq if lhs.is_constant() && rhs.is_constant() => Some(boolean((lhs == rhs) == (op == Eq))),
        Add | Sub | BitOr | BitXor | Shl | Ashr | Lshr if rhs.as_int() == Some(0) && lhs.ty() == ty => {
            Some(lhs.clone())
        }
        Add | BitOr | BitXor if lhs.as_int() == Some(0) && rhs.ty() == ty => Some(rhs.clone()),
        Mul if rhs.as_int() == Some(1) && lhs.ty() == ty => Some(lhs.clone()),
        Mul if lhs.as_int() == Some(1) && rhs.ty() == ty => Some(rhs.clone()),
        Mul | BitAnd if (lhs.as_int() == Some(0) || rhs.as_int() == Some(0)) && ty.is_bv() => int(0, ty)?,
        _ => None,
    };
    Ok(out)
}

fn fold_int_binary(ty: &Type, op: BinaryOp, operand_ty: &Type, a: i128, b: i128) -> Result<Option<Expr>, IrepError> {
    use BinaryOp::*;

    let width = operand_ty.width().unwrap_or(0);
    let v = match op {
        Eq => return Ok(Some(boolean(a == b))),
        NotEq => return Ok(Some(boolean(a != b))),
        Lt => return Ok(Some(boolean(a < b))),
        Gt => return Ok(Some(boolean(a > b))),
        Le => return Ok(Some(boolean(a <= b))),
        Ge => return Ok(Some(boolean(a >= b))),

        Add => a.checked_add(b),
        Sub => a.checked_sub(b),
        Mul => a.checked_mul(b),
        Div => a.checked_div(b),
        Mod => a.checked_rem(b),
        Shl if (0..i128::from(width)).contains(&b) => a.checked_shl(b as u32),
        Ashr if (0..i128::from(width)).contains(&b) => Some(a >> b),
        Lshr if (0..i128::from(width)).contains(&b) && width <= 126 => {
            let bits = (a as u128) & ((1u128 << width) - 1);
            Some((bits >> b) as i128)
        }
        BitAnd => Some(a & b),
        BitOr => Some(a | b),
        BitXor => Some(a ^ b),
        BitNand => Some(!(a & b)),
        BitNor => Some(!(a | b)),
        BitNxor => Some(!(a ^ b)),
        _ => None,
    };
    match v {
        Some(v) if ty.is_bv() => int(v, ty),
        _ => Ok(None),
    }
}

fn fold_unary(ty: &Type, op: UnaryOp, operand: &Expr) -> Result<Option<Expr>, IrepError> {
    let out = match (op, operand.kind()) {
        (UnaryOp::Not, ExprKind::ConstantBool(b)) => Some(boolean(!b)),
        (UnaryOp::BitNot, ExprKind::ConstantBool(b)) => Some(boolean(!b)),
        (
            UnaryOp::Not,
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: inner,
            },
        ) => Some(inner.clone()),
        (UnaryOp::Neg, ExprKind::ConstantInt(v)) => match v.checked_neg() {
            Some(n) => int(n, ty)?,
            None => None,
        },
        (UnaryOp::Abs, ExprKind::ConstantInt(v)) => match v.checked_abs() {
            Some(n) => int(n, ty)?,
            None => None,
        },
        (UnaryOp::BitNot, ExprKind::ConstantInt(v)) => int(!v, ty)?,
        _ => None,
    };
    Ok(out)
}

fn fold_typecast(ty: &Type, operand: &Expr) -> Result<Option<Expr>, IrepError> {
    if operand.ty() == ty {
        return Ok(Some(operand.clone()));
    }
    let out = match operand.kind() {
        ExprKind::ConstantInt(v) if ty.is_bool() => Some(boolean(*v != 0)),
        ExprKind::ConstantInt(v) if ty.is_bv() => int(*v, ty)?,
        ExprKind::ConstantBool(b) if ty.is_bv() => int(i128::from(*b), ty)?,
        _ => None,
    };
    Ok(out)
}

fn fold_member(source: &Expr, member: &str) -> Result<Option<Expr>, IrepError> {
    let out = match source.kind() {
        ExprKind::ConstantStruct(elems) => source
            .ty()
            .struct_like()
            .and_then(|s| s.member_index(member))
            .and_then(|i| elems.get(i).cloned()),
        ExprKind::With {
            source: inner,
            designator: Designator::Member(m),
            update,
        } => {
            if m == member {
                Some(update.clone())
            } else {
                let ty = update_type(source, member);
                match ty {
                    Some(ty) => Some(Expr::new(
                        ty,
                        ExprKind::Member {
                            source: inner.clone(),
                            member: member.to_string(),
                        },
                    )?),
                    None => None,
                }
            }
        }
        _ => None,
    };
    Ok(out)
}

fn update_type(source: &Expr, member: &str) -> Option<Type> {
    source.ty().struct_like()?.member(member).map(|m| m.ty.clone())
}

fn fold_index(source: &Expr, index: &Expr) -> Result<Option<Expr>, IrepError> {
    let out = match source.kind() {
        ExprKind::ArrayOf(v) => Some(v.clone()),
        ExprKind::ConstantArray(elems) => index
            .as_int()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| elems.get(i).cloned()),
        ExprKind::With {
            source: inner,
            designator: Designator::Index(j),
            update,
        } => match (index.as_int(), j.as_int()) {
            (Some(a), Some(b)) if a == b => Some(update.clone()),
            (Some(_), Some(_)) => Some(Expr::new(
                update.ty().clone(),
                ExprKind::Index {
                    source: inner.clone(),
                    index: index.clone(),
                },
            )?),
            _ if index == j => Some(update.clone()),
            _ => None,
        },
        _ => None,
    };
    Ok(out)
}

fn fold_with(source: &Expr, designator: &Designator, update: &Expr) -> Result<Option<Expr>, IrepError> {
    let out = match (source.kind(), designator) {
        (ExprKind::ConstantStruct(elems), Designator::Member(m)) if update.is_constant() => {
            match source.ty().struct_like().and_then(|s| s.member_index(m)) {
                Some(i) if i < elems.len() => {
                    let mut elems = elems.clone();
                    elems[i] = update.clone();
                    Some(Expr::new(source.ty().clone(), ExprKind::ConstantStruct(elems))?)
                }
                _ => None,
            }
        }
        (ExprKind::ConstantArray(elems), Designator::Index(i)) if update.is_constant() => {
            match i.as_int().and_then(|i| usize::try_from(i).ok()) {
                Some(i) if i < elems.len() => {
                    let mut elems = elems.clone();
                    elems[i] = update.clone();
                    Some(Expr::new(source.ty().clone(), ExprKind::ConstantArray(elems))?)
                }
                _ => None,
            }
        }
        _ => None,
    };
    Ok(out)
}

fn fold_overflow(inner: &Expr) -> Option<Expr> {
    let ExprKind::Binary { op, lhs, rhs } = inner.kind() else {
        return None;
    };
    let (a, b) = (lhs.as_int()?, rhs.as_int()?);
    let (lo, hi) = bv_range(lhs.ty())?;
    let exact = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        _ => return None,
    };
    Some(boolean(match exact {
        Some(v) => v < lo || v > hi,
        None => true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s8() -> Type {
        Type::signed_bv(8).unwrap()
    }

    fn u8t() -> Type {
        Type::unsigned_bv(8).unwrap()
    }

    fn k(v: i128, ty: &Type) -> Expr {
        Expr::int(v, ty.clone()).unwrap()
    }

    fn bin(op: BinaryOp, ty: &Type, a: Expr, b: Expr) -> Expr {
        Expr::binary(op, ty.clone(), a, b).unwrap()
    }

    #[test]
    fn arithmetic_wraps_at_width() {
        let e = bin(BinaryOp::Add, &s8(), k(127, &s8()), k(1, &s8()));
        assert_eq!(simplify(&e).unwrap().as_int(), Some(-128));

        let e = bin(BinaryOp::Sub, &u8t(), k(0, &u8t()), k(1, &u8t()));
        assert_eq!(simplify(&e).unwrap().as_int(), Some(255));

        let e = bin(BinaryOp::Lshr, &s8(), k(-1, &s8()), k(4, &s8()));
        assert_eq!(simplify(&e).unwrap().as_int(), Some(15));
    }

    #[test]
    fn division_by_zero_is_left_alone() {
        let e = bin(BinaryOp::Div, &s8(), k(4, &s8()), k(0, &s8()));
        assert_eq!(simplify(&e).unwrap(), e);
    }

    #[test]
    fn boolean_identities() {
        let p = Expr::symbol("p", Type::bool()).unwrap();
        let and_true = Expr::and(p.clone(), Expr::true_expr()).unwrap();
        assert_eq!(simplify(&and_true).unwrap(), p);

        let not_not = Expr::not(Expr::not(p.clone()).unwrap()).unwrap();
        assert_eq!(simplify(&not_not).unwrap(), p);

        let x = Expr::symbol("x", s8()).unwrap();
        assert!(simplify(&Expr::eq(x.clone(), x).unwrap()).unwrap().is_true());
    }

    #[test]
    fn overflow_is_decided_on_constants() {
        let add = bin(BinaryOp::Add, &s8(), k(100, &s8()), k(100, &s8()));
        let ov = Expr::new(Type::bool(), ExprKind::Overflow(add)).unwrap();
        assert!(simplify(&ov).unwrap().is_true());

        let add = bin(BinaryOp::Add, &s8(), k(1, &s8()), k(2, &s8()));
        let ov = Expr::new(Type::bool(), ExprKind::Overflow(add)).unwrap();
        assert!(simplify(&ov).unwrap().is_false());
    }

    #[test]
    fn with_then_index_reads_back() {
        let arr = Type::array(s8(), kbmc_irep::ArraySize::Fixed(k(3, &u8t()))).unwrap();
        let a = Expr::symbol("a", arr.clone()).unwrap();
        let updated = Expr::new(
            arr,
            ExprKind::With {
                source: a,
                designator: Designator::Index(k(1, &u8t())),
                update: k(7, &s8()),
            },
        )
        .unwrap();
        let read = Expr::new(
            s8(),
            ExprKind::Index {
                source: updated,
                index: k(1, &u8t()),
            },
        )
        .unwrap();
        assert_eq!(simplify(&read).unwrap().as_int(), Some(7));
    }

    #[test]
    fn if_and_typecast_fold() {
        let c = Expr::if_then_else(Expr::false_expr(), k(1, &s8()), k(2, &s8())).unwrap();
        assert_eq!(simplify(&c).unwrap().as_int(), Some(2));

        let cast = Expr::new(u8t(), ExprKind::Typecast(k(-1, &s8()))).unwrap();
        assert_eq!(simplify(&cast).unwrap().as_int(), Some(255));
    }
}
