#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use kbmc_irep::{BinaryOp, Expr, ExprKind, Type, TypeKind};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::trace;

use crate::simplify::wrap;
use crate::{Simplifier, SymexError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SolverResult {
    Sat,
    Unsat,
    Unknown,
}

/// Satisfying assignment from the last `Sat` answer, by symbol name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Model {
    values: BTreeMap<String, Expr>,
}

impl Model {
    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.values.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Expr) {
        self.values.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Expr)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Constraint solver seam. Implementations keep the assumed constraints and
/// answer satisfiability of them together with per-query assumptions.
pub trait Solver: Send {
    fn assume(&mut self, constraint: &Expr) -> Result<(), SymexError>;

    fn check(&mut self, assumptions: &[Expr]) -> Result<SolverResult, SymexError>;

    fn model(&self) -> Option<Model>;
}

/// Creates independent solvers; each k-induction worker owns its own.
pub trait SolverFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self) -> Box<dyn Solver>;
}

/// Built-in backend: substitutes SSA definitions, simplifies, and decides
/// ground queries. Queries over few enough free bits are decided by
/// enumerating every assignment; anything larger is `Unknown`.
pub struct SimplifyingSolver {
    definitions: FxHashMap<String, Expr>,
    constraints: Vec<Expr>,
    max_enumeration_bits: u32,
    substituted: FxHashMap<Expr, Expr>,
    model: Option<Model>,
}

impl SimplifyingSolver {
    pub const DEFAULT_ENUMERATION_BITS: u32 = 16;

    pub fn new(max_enumeration_bits: u32) -> Self {
        Self {
            definitions: FxHashMap::default(),
            constraints: Vec::new(),
            max_enumeration_bits,
            substituted: FxHashMap::default(),
            model: None,
        }
    }

    /// Replaces every defined symbol by its definition, transitively.
    fn substitute(&mut self, e: &Expr) -> Result<Expr, SymexError> {
        if let Some(done) = self.substituted.get(e) {
            return Ok(done.clone());
        }
        let out = match e.kind() {
            ExprKind::Symbol(name) => match self.definitions.get(name).cloned() {
                Some(def) => self.substitute(&def)?,
                None => e.clone(),
            },
            _ => e.map_operands(|op| self.substitute(op))?,
        };
        self.substituted.insert(e.clone(), out.clone());
        Ok(out)
    }

    fn model_for(&mut self, free: &BTreeMap<String, Expr>) -> Result<Model, SymexError> {
        let mut model = Model::default();
        for (name, value) in free {
            model.insert(name.clone(), value.clone());
        }
        let names: Vec<String> = self.definitions.keys().cloned().collect();
        let mut simplifier = Simplifier::new();
        for name in names {
            let Some(def) = self.definitions.get(&name).cloned() else { continue };
            let value = simplifier.simplify(&assign_free(&self.substitute(&def)?, free)?)?;
            if value.is_constant() {
                model.insert(name, value);
            }
        }
        Ok(model)
    }
}

impl Default for SimplifyingSolver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ENUMERATION_BITS)
    }
}

fn free_symbols(e: &Expr) -> BTreeMap<String, Type> {
    let mut out = BTreeMap::new();
    let mut seen = FxHashSet::default();
    let mut stack = vec![e.clone()];
    while let Some(e) = stack.pop() {
        if !seen.insert(e.clone()) {
            continue;
        }
        if let ExprKind::Symbol(name) = e.kind() {
            out.insert(name.clone(), e.ty().clone());
        }
        stack.extend(e.operands().into_iter().cloned());
    }
    out
}

fn enumeration_width(ty: &Type) -> Option<u32> {
    match ty.kind() {
        TypeKind::Bool => Some(1),
        TypeKind::SignedBv { width } | TypeKind::UnsignedBv { width } => Some(*width),
        _ => None,
    }
}

fn value_from_bits(bits: u64, ty: &Type) -> Result<Expr, SymexError> {
    if ty.is_bool() {
        return Ok(Expr::bool_const(bits & 1 == 1));
    }
    let v = wrap(i128::from(bits), ty).unwrap_or(0);
    Ok(Expr::int(v, ty.clone())?)
}

fn assign_free(e: &Expr, free: &BTreeMap<String, Expr>) -> Result<Expr, SymexError> {
    match e.kind() {
        ExprKind::Symbol(name) => Ok(free.get(name).cloned().unwrap_or_else(|| e.clone())),
        _ => e.map_operands(|op| assign_free(op, free)),
    }
}

impl Solver for SimplifyingSolver {
    fn assume(&mut self, constraint: &Expr) -> Result<(), SymexError> {
        if let ExprKind::Binary {
            op: BinaryOp::Eq,
            lhs,
            rhs,
        } = constraint.kind()
        {
            if let Some(name) = lhs.as_symbol() {
                if !self.definitions.contains_key(name) && !rhs.as_symbol().is_some_and(|r| r == name) {
                    self.definitions.insert(name.to_string(), rhs.clone());
                    self.substituted.clear();
                    return Ok(());
                }
            }
        }
        self.constraints.push(constraint.clone());
        Ok(())
    }

    fn check(&mut self, assumptions: &[Expr]) -> Result<SolverResult, SymexError> {
        self.model = None;

        let mut query = Expr::true_expr();
        let goals: Vec<Expr> = self.constraints.iter().chain(assumptions).cloned().collect();
        for goal in &goals {
            query = Expr::and(query, self.substitute(goal)?)?;
        }
        let query = Simplifier::new().simplify(&query)?;

        if query.is_false() {
            return Ok(SolverResult::Unsat);
        }
        if query.is_true() {
            self.model = Some(self.model_for(&BTreeMap::new())?);
            return Ok(SolverResult::Sat);
        }

        let free = free_symbols(&query);
        let mut widths = Vec::with_capacity(free.len());
        let mut total = 0u32;
        for ty in free.values() {
            match enumeration_width(ty) {
                Some(w) => {
                    total = total.saturating_add(w);
                    widths.push(w);
                }
                None => return Ok(SolverResult::Unknown),
            }
        }
        if total > self.max_enumeration_bits || total >= 64 {
            trace!(free = free.len(), bits = total, "query too wide to enumerate");
            return Ok(SolverResult::Unknown);
        }

        let mut undecided = false;
        for n in 0..(1u64 << total) {
            let mut shift = 0;
            let mut assignment = BTreeMap::new();
            for ((name, ty), w) in free.iter().zip(&widths) {
                let bits = (n >> shift) & ((1u64 << w) - 1);
                shift += w;
                assignment.insert(name.clone(), value_from_bits(bits, ty)?);
            }
            let value = Simplifier::new().simplify(&assign_free(&query, &assignment)?)?;
            match value.as_bool() {
                Some(true) => {
                    self.model = Some(self.model_for(&assignment)?);
                    return Ok(SolverResult::Sat);
                }
                Some(false) => {}
                None => undecided = true,
            }
        }
        Ok(if undecided {
            SolverResult::Unknown
        } else {
            SolverResult::Unsat
        })
    }

    fn model(&self) -> Option<Model> {
        self.model.clone()
    }
}

pub struct SimplifyingSolverFactory {
    pub max_enumeration_bits: u32,
}

impl Default for SimplifyingSolverFactory {
    fn default() -> Self {
        Self {
            max_enumeration_bits: SimplifyingSolver::DEFAULT_ENUMERATION_BITS,
        }
    }
}

impl SolverFactory for SimplifyingSolverFactory {
    fn name(&self) -> &str {
        "simplifier"
    }

    fn create(&self) -> Box<dyn Solver> {
        Box::new(SimplifyingSolver::new(self.max_enumeration_bits))
    }
}
