#![forbid(unsafe_code)]

//! Conversion boundary from the front end's legacy tree into typed IR.
//!
//! `Migrator::migrate_type` and `Migrator::migrate_expr` are total over the
//! ids listed below and fail with [`IrepError::Unsupported`] on anything else.

use crate::irep::{is_associative, peel_last};
use crate::{
    ArraySize, BinaryOp, Designator, Endianness, Expr, ExprKind, Irep, IrepError, IrepPool, Member, Type, TypeKind,
    UnaryOp,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrateConfig {
    /// Width of `int`; enums are signed bit-vectors of this width.
    pub int_width: u32,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self { int_width: 32 }
    }
}

pub struct Migrator<'a> {
    pool: &'a IrepPool,
    config: MigrateConfig,
}

fn malformed(node: &Irep, message: impl Into<String>) -> IrepError {
    IrepError::Malformed {
        id: node.id.clone(),
        message: message.into(),
        node: format!("{node:?}"),
    }
}

fn unsupported(what: &'static str, node: &Irep) -> IrepError {
    tracing::debug!(what, id = %node.id, "legacy node has no typed counterpart");
    IrepError::Unsupported {
        what,
        id: node.id.clone(),
        node: format!("{node:?}"),
    }
}

fn named<'n>(node: &'n Irep, key: &str) -> Result<&'n Irep, IrepError> {
    node.find(key).ok_or_else(|| malformed(node, format!("missing `{key}`")))
}

fn parse_u32(node: &Irep, key: &str) -> Result<u32, IrepError> {
    let raw = named(node, key)?.id.as_str();
    raw.parse::<u32>()
        .map_err(|_| malformed(node, format!("`{key}` is not a number: {raw:?}")))
}

fn operands(node: &Irep, n: usize) -> Result<&[Irep], IrepError> {
    if node.sub.len() != n {
        return Err(malformed(
            node,
            format!("expected {n} operands, found {}", node.sub.len()),
        ));
    }
    Ok(&node.sub)
}

/// Two's-complement (when `signed`) or plain binary digits to an integer.
fn binary_to_int(node: &Irep, digits: &str, signed: bool) -> Result<i128, IrepError> {
    if digits.is_empty() || digits.len() > 127 || !digits.bytes().all(|b| b == b'0' || b == b'1') {
        return Err(malformed(node, format!("bad binary constant {digits:?}")));
    }
    let mut v: i128 = 0;
    for b in digits.bytes() {
        v = (v << 1) | i128::from(b - b'0');
    }
    if signed && digits.starts_with('1') {
        v -= 1i128 << digits.len();
    }
    Ok(v)
}

impl<'a> Migrator<'a> {
    pub fn new(pool: &'a IrepPool, config: MigrateConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    pub fn migrate_type(&self, node: &Irep) -> Result<Type, IrepError> {
        let ty = match node.id.as_str() {
            "bool" => Type::bool(),
            "signedbv" => Type::signed_bv(parse_u32(node, "width")?)?,
            "unsignedbv" => Type::unsigned_bv(parse_u32(node, "width")?)?,
            "c_enum" | "incomplete_c_enum" => Type::signed_bv(self.config.int_width)?,
            "fixedbv" => Type::fixed_bv(parse_u32(node, "width")?, parse_u32(node, "integer_bits")?)?,
            "empty" => Type::empty(),
            "pointer" => Type::pointer(self.migrate_type(named(node, "subtype")?)?),
            "symbol" => Type::symbol(named(node, "identifier")?.id.clone())?,
            "string" => {
                let raw = named(node, "length")?.id.as_str();
                let length = raw
                    .parse::<u64>()
                    .map_err(|_| malformed(node, format!("bad string length {raw:?}")))?;
                Type::string(length)
            }
            "array" => {
                let subtype = self.migrate_type(named(node, "subtype")?)?;
                let size_node = named(node, "size")?;
                let size = if size_node.id == "infinity" {
                    ArraySize::Infinite
                } else {
                    ArraySize::Fixed(self.migrate_expr(size_node)?)
                };
                Type::array(subtype, size)?
            }
            "struct" | "union" => {
                let tag = node.get_str("tag").unwrap_or_default().to_string();
                let mut members = Vec::new();
                if let Some(comps) = node.find("components") {
                    for c in comps.operands() {
                        let name = named(c, "name")?.id.clone();
                        let ty = self.migrate_type(named(c, "type")?)?;
                        members.push(Member::new(name, ty));
                    }
                }
                if node.id == "struct" {
                    Type::struct_type(tag, members)?
                } else {
                    Type::union_type(tag, members)?
                }
            }
            "code" => {
                let mut params = Vec::new();
                if let Some(args) = node.find("arguments") {
                    for a in args.operands() {
                        params.push(self.migrate_type(named(a, "type")?)?);
                    }
                }
                let ret = match node.find("return_type") {
                    Some(r) => self.migrate_type(r)?,
                    None => Type::empty(),
                };
                Type::code(params, ret)
            }
            _ => return Err(unsupported("type", node)),
        };
        Ok(self.pool.intern_type(ty))
    }

    fn expr_type(&self, node: &Irep) -> Result<Type, IrepError> {
        self.migrate_type(named(node, "type")?)
    }

    fn pair(&self, node: &Irep) -> Result<(Expr, Expr), IrepError> {
        let ops = operands(node, 2)?;
        Ok((self.migrate_expr(&ops[0])?, self.migrate_expr(&ops[1])?))
    }

    fn single(&self, node: &Irep) -> Result<Expr, IrepError> {
        let ops = operands(node, 1)?;
        self.migrate_expr(&ops[0])
    }

    fn typed_binary(&self, node: &Irep, op: BinaryOp) -> Result<Expr, IrepError> {
        let ty = self.expr_type(node)?;
        let (lhs, rhs) = self.pair(node)?;
        Expr::binary(op, ty, lhs, rhs)
    }

    fn predicate(&self, node: &Irep, op: BinaryOp) -> Result<Expr, IrepError> {
        let (lhs, rhs) = self.pair(node)?;
        Expr::predicate(op, lhs, rhs)
    }

    fn unary(&self, node: &Irep, op: UnaryOp) -> Result<Expr, IrepError> {
        let ty = self.expr_type(node)?;
        let operand = self.single(node)?;
        Expr::new(ty, ExprKind::Unary { op, operand })
    }

    fn overflow_of(&self, node: &Irep, op: BinaryOp) -> Result<Expr, IrepError> {
        let (lhs, rhs) = self.pair(node)?;
        let arith = Expr::binary(op, lhs.ty().clone(), lhs, rhs)?;
        Expr::new(Type::bool(), ExprKind::Overflow(arith))
    }

    fn constant(&self, node: &Irep) -> Result<Expr, IrepError> {
        let ty_node = named(node, "type")?;
        let value = node.get_str("value").unwrap_or_default();
        match ty_node.id.as_str() {
            "bool" => match value {
                "true" => Ok(Expr::true_expr()),
                "false" => Ok(Expr::false_expr()),
                other => Err(malformed(node, format!("bool constant {other:?}"))),
            },
            "c_enum" | "incomplete_c_enum" => {
                let ty = self.migrate_type(ty_node)?;
                let v = value
                    .parse::<i128>()
                    .map_err(|_| malformed(node, format!("enum constant {value:?}")))?;
                Expr::int(v, ty)
            }
            "pointer" if value == "NULL" => Expr::symbol("NULL", self.migrate_type(ty_node)?),
            "pointer" => Err(malformed(node, "only NULL pointer constants are supported")),
            "fixedbv" => {
                let ty = self.migrate_type(ty_node)?;
                let bits = binary_to_int(node, value, true)?;
                Expr::new(ty, ExprKind::ConstantFixedBv { bits })
            }
            "array" => {
                let ty = self.migrate_type(ty_node)?;
                let elems = node
                    .operands()
                    .iter()
                    .map(|o| self.migrate_expr(o))
                    .collect::<Result<Vec<_>, _>>()?;
                Expr::new(ty, ExprKind::ConstantArray(elems))
            }
            _ => {
                let ty = self.migrate_type(ty_node)?;
                let v = binary_to_int(node, value, matches!(ty.kind(), TypeKind::SignedBv { .. }))?;
                Expr::int(v, ty)
            }
        }
    }

    pub fn migrate_expr(&self, node: &Irep) -> Result<Expr, IrepError> {
        if is_associative(&node.id) && node.sub.len() > 2 {
            return self.migrate_expr(&peel_last(node));
        }

        let id = node.id.as_str();
        let expr = match id {
            "symbol" => Expr::symbol(named(node, "identifier")?.id.clone(), self.expr_type(node)?)?,
            "nondet_symbol" => Expr::symbol(
                format!("nondet${}", named(node, "identifier")?.id),
                self.expr_type(node)?,
            )?,
            "constant" => self.constant(node)?,
            "typecast" => Expr::new(self.expr_type(node)?, ExprKind::Typecast(self.single(node)?))?,
            "struct" | "union" => {
                let ty = self.expr_type(node)?;
                let elems = node
                    .operands()
                    .iter()
                    .map(|o| self.migrate_expr(o))
                    .collect::<Result<Vec<_>, _>>()?;
                let kind = if id == "struct" {
                    ExprKind::ConstantStruct(elems)
                } else {
                    ExprKind::ConstantUnion(elems)
                };
                Expr::new(ty, kind)?
            }
            "string-constant" => {
                let size = named(named(node, "type")?, "size")?;
                let length = binary_to_int(size, size.get_str("value").unwrap_or_default(), false)?;
                let text = node.get_str("value").unwrap_or_default().to_string();
                Expr::new(Type::string(length as u64), ExprKind::ConstantString(text))?
            }
            "array_of" => Expr::new(self.expr_type(node)?, ExprKind::ArrayOf(self.single(node)?))?,
            "if" => {
                let ty = self.expr_type(node)?;
                let ops = operands(node, 3)?;
                Expr::new(
                    ty,
                    ExprKind::If {
                        cond: self.migrate_expr(&ops[0])?,
                        then_value: self.migrate_expr(&ops[1])?,
                        else_value: self.migrate_expr(&ops[2])?,
                    },
                )?
            }

            "=" => self.predicate(node, BinaryOp::Eq)?,
            "!=" | "notequal" => self.predicate(node, BinaryOp::NotEq)?,
            "<" => self.predicate(node, BinaryOp::Lt)?,
            ">" => self.predicate(node, BinaryOp::Gt)?,
            "<=" => self.predicate(node, BinaryOp::Le)?,
            ">=" => self.predicate(node, BinaryOp::Ge)?,
            "and" => self.predicate(node, BinaryOp::And)?,
            "or" => self.predicate(node, BinaryOp::Or)?,
            "xor" => self.predicate(node, BinaryOp::Xor)?,
            "=>" => self.predicate(node, BinaryOp::Implies)?,
            "not" => Expr::not(self.single(node)?)?,

            "bitand" => self.typed_binary(node, BinaryOp::BitAnd)?,
            "bitor" => self.typed_binary(node, BinaryOp::BitOr)?,
            "bitxor" => self.typed_binary(node, BinaryOp::BitXor)?,
            "bitnand" => self.typed_binary(node, BinaryOp::BitNand)?,
            "bitnor" => self.typed_binary(node, BinaryOp::BitNor)?,
            "bitnxor" => self.typed_binary(node, BinaryOp::BitNxor)?,
            "bitnot" => self.unary(node, UnaryOp::BitNot)?,
            "lshr" => self.typed_binary(node, BinaryOp::Lshr)?,
            "shl" => self.typed_binary(node, BinaryOp::Shl)?,
            "ashr" => self.typed_binary(node, BinaryOp::Ashr)?,
            "+" => self.typed_binary(node, BinaryOp::Add)?,
            "-" => self.typed_binary(node, BinaryOp::Sub)?,
            "*" => self.typed_binary(node, BinaryOp::Mul)?,
            "/" => self.typed_binary(node, BinaryOp::Div)?,
            "mod" => self.typed_binary(node, BinaryOp::Mod)?,
            "unary-" => self.unary(node, UnaryOp::Neg)?,
            "abs" => self.unary(node, UnaryOp::Abs)?,
            "unary+" => self.single(node)?,

            "pointer_offset" => Expr::new(self.expr_type(node)?, ExprKind::PointerOffset(self.single(node)?))?,
            "pointer_object" => Expr::new(self.expr_type(node)?, ExprKind::PointerObject(self.single(node)?))?,
            "address_of" => {
                if named(node, "type")?.id != "pointer" {
                    return Err(malformed(node, "address_of must have pointer type"));
                }
                Expr::address_of(self.single(node)?)?
            }
            "same-object" => {
                let (a, b) = self.pair(node)?;
                Expr::new(Type::bool(), ExprKind::SameObject(a, b))?
            }
            "invalid-object" => Expr::new(Type::pointer(Type::empty()), ExprKind::InvalidObject)?,

            "byte_extract_little_endian" | "byte_extract_big_endian" => {
                let ty = self.expr_type(node)?;
                let (source, offset) = self.pair(node)?;
                let endian = if id.ends_with("big_endian") {
                    Endianness::Big
                } else {
                    Endianness::Little
                };
                Expr::new(ty, ExprKind::ByteExtract { endian, source, offset })?
            }
            "byte_update_little_endian" | "byte_update_big_endian" => {
                let ty = self.expr_type(node)?;
                let ops = operands(node, 3)?;
                let endian = if id.ends_with("big_endian") {
                    Endianness::Big
                } else {
                    Endianness::Little
                };
                Expr::new(
                    ty,
                    ExprKind::ByteUpdate {
                        endian,
                        source: self.migrate_expr(&ops[0])?,
                        offset: self.migrate_expr(&ops[1])?,
                        update: self.migrate_expr(&ops[2])?,
                    },
                )?
            }

            "with" => {
                let ty = self.expr_type(node)?;
                let ops = operands(node, 3)?;
                let designator = if ops[1].id == "member_name" {
                    Designator::Member(named(&ops[1], "component_name")?.id.clone())
                } else {
                    Designator::Index(self.migrate_expr(&ops[1])?)
                };
                Expr::new(
                    ty,
                    ExprKind::With {
                        source: self.migrate_expr(&ops[0])?,
                        designator,
                        update: self.migrate_expr(&ops[2])?,
                    },
                )?
            }
            "member" => Expr::new(
                self.expr_type(node)?,
                ExprKind::Member {
                    source: self.single(node)?,
                    member: named(node, "component_name")?.id.clone(),
                },
            )?,
            // Memory-leak checks are selects over the allocation map.
            "index" | "memory-leak" => {
                let ty = self.expr_type(node)?;
                let (source, index) = self.pair(node)?;
                Expr::new(ty, ExprKind::Index { source, index })?
            }

            "zero_string" => Expr::new(Type::bool(), ExprKind::ZeroString(self.single(node)?))?,
            "zero_string_length" => Expr::new(
                Type::unsigned_bv(self.config.int_width)?,
                ExprKind::ZeroStringLength(self.single(node)?),
            )?,
            "isnan" => Expr::new(Type::bool(), ExprKind::IsNan(self.single(node)?))?,
            "width" => {
                operands(node, 1)?;
                let ty = self.expr_type(node)?;
                let width = ty
                    .width()
                    .ok_or_else(|| malformed(node, format!("{ty} has no width")))?;
                Expr::int(i128::from(width), Type::unsigned_bv(self.config.int_width)?)?
            }

            "overflow-+" => self.overflow_of(node, BinaryOp::Add)?,
            "overflow--" => self.overflow_of(node, BinaryOp::Sub)?,
            "overflow-*" => self.overflow_of(node, BinaryOp::Mul)?,
            "overflow-unary-" => Expr::new(Type::bool(), ExprKind::OverflowNeg(self.single(node)?))?,
            _ if id.starts_with("overflow-typecast-") => {
                let raw = &id["overflow-typecast-".len()..];
                let bits = raw
                    .parse::<u32>()
                    .map_err(|_| malformed(node, format!("bad overflow cast width {raw:?}")))?;
                Expr::new(
                    Type::bool(),
                    ExprKind::OverflowCast {
                        operand: self.single(node)?,
                        bits,
                    },
                )?
            }

            _ => return Err(unsupported("expression", node)),
        };

        Ok(self.pool.intern_expr(expr))
    }
}
