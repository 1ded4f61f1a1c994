#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::{Expr, IrepError, Type};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub types: usize,
    pub exprs: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Hash-consing cache for types and expressions.
///
/// Construct one per run and pass it around as `Arc<IrepPool>`; it is safe to
/// share between threads. Interning only improves sharing: two structurally
/// equal handles compare equal whether or not they went through a pool.
#[derive(Default)]
pub struct IrepPool {
    types: Mutex<FxHashSet<Type>>,
    exprs: Mutex<FxHashSet<Expr>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl IrepPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_type(&self, ty: Type) -> Type {
        let mut types = self.types.lock();
        if let Some(found) = types.get(&ty) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return found.clone();
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        types.insert(ty.clone());
        ty
    }

    /// Interns `expr` bottom-up, so its operands become canonical too.
    pub fn intern_expr(&self, expr: Expr) -> Expr {
        if let Some(found) = self.exprs.lock().get(&expr) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return found.clone();
        }

        // Operands first; the rebuilt node is structurally the same as `expr`,
        // so re-validation cannot fail.
        let rebuilt = expr
            .map_operands(|op| Ok::<_, IrepError>(self.intern_expr(op.clone())))
            .unwrap_or(expr);

        let mut exprs = self.exprs.lock();
        if let Some(found) = exprs.get(&rebuilt) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return found.clone();
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        exprs.insert(rebuilt.clone());
        rebuilt
    }

    pub fn bool_type(&self) -> Type {
        self.intern_type(Type::bool())
    }

    pub fn empty_type(&self) -> Type {
        self.intern_type(Type::empty())
    }

    pub fn signed_bv(&self, width: u32) -> Result<Type, IrepError> {
        Ok(self.intern_type(Type::signed_bv(width)?))
    }

    pub fn unsigned_bv(&self, width: u32) -> Result<Type, IrepError> {
        Ok(self.intern_type(Type::unsigned_bv(width)?))
    }

    pub fn pointer(&self, subtype: Type) -> Type {
        self.intern_type(Type::pointer(subtype))
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            types: self.types.lock().len(),
            exprs: self.exprs.lock().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for IrepPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrepPool").field("stats", &self.stats()).finish()
    }
}
