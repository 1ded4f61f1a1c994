#![forbid(unsafe_code)]

//! Depth-first symbolic execution of an unwound goto-program.
//!
//! Every path owns a [`SymexState`]. Case splits push the alternative state on
//! a worklist and continue with the other one. Assignments are recorded in SSA
//! form with globally unique versions, so the steps of all paths can live in
//! one [`Equation`].

use std::sync::Arc;

use kbmc_goto::{GotoProgram, InstrId, InstrKind, Property, PropertyClass, PropertySet};
use kbmc_irep::{Designator, Expr, ExprKind, IrepPool, SourceLocation, Type, TypeKind};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{
    Equation, Frame, FrameKind, Simplifier, SsaStep, SsaStepKind, SymexError, SymexState, ThrowResolution, ThrowTarget,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymexOptions {
    /// Emit a VC for each reached unwinding assertion.
    pub unwinding_assertions: bool,
    /// Skip every user assertion (forward condition).
    pub skip_user_assertions: bool,
    pub properties: PropertySet,
    pub max_call_depth: u32,
}

impl Default for SymexOptions {
    fn default() -> Self {
        Self {
            unwinding_assertions: true,
            skip_user_assertions: false,
            properties: PropertySet::All,
            max_call_depth: 64,
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

pub struct SymexEngine<'a> {
    program: &'a GotoProgram,
    options: SymexOptions,
    pool: Arc<IrepPool>,
    positions: FxHashMap<String, FxHashMap<InstrId, usize>>,
    simplifier: Simplifier,
    /// Latest SSA version handed out per level-1 name, across all paths.
    versions: FxHashMap<String, u32>,
    activations: u32,
    nondets: u32,
    equation: Equation,
}

impl<'a> SymexEngine<'a> {
    pub fn new(program: &'a GotoProgram, options: SymexOptions, pool: Arc<IrepPool>) -> Self {
        let positions = program
            .functions
            .iter()
            .map(|(name, f)| {
                let map = f.body.iter().enumerate().map(|(p, i)| (i.id, p)).collect();
                (name.clone(), map)
            })
            .collect();
        Self {
            program,
            options,
            pool,
            positions,
            simplifier: Simplifier::new(),
            versions: FxHashMap::default(),
            activations: 0,
            nondets: 0,
            equation: Equation::new(),
        }
    }

    pub fn run(mut self) -> Result<Equation, SymexError> {
        for f in self.program.functions.values() {
            if let Some(l) = f.loops().first() {
                return Err(SymexError::NotUnwound {
                    function: f.name.clone(),
                    head: l.head,
                });
            }
        }
        let entry = self.program.entry_function()?;

        let path = self.equation.new_path(None);
        let activation = self.next_activation();
        let mut worklist = vec![SymexState::new(path, &entry.name, activation)];
        while let Some(state) = worklist.pop() {
            self.run_path(state, &mut worklist)?;
        }

        debug!(
            steps = self.equation.len(),
            paths = self.equation.paths.len(),
            pruned = self.equation.pruned,
            "symbolic execution finished"
        );
        Ok(self.equation)
    }

    fn run_path(&mut self, mut state: SymexState, worklist: &mut Vec<SymexState>) -> Result<(), SymexError> {
        while let Flow::Continue = self.step(&mut state, worklist)? {}
        Ok(())
    }

    fn step(&mut self, state: &mut SymexState, worklist: &mut Vec<SymexState>) -> Result<Flow, SymexError> {
        let program = self.program;
        let Some(function) = state.function().and_then(|name| program.function(name)) else {
            return Ok(Flow::Stop);
        };
        let Some(instr) = function.body.get(state.pc) else {
            return self.end_function(state, &SourceLocation::default());
        };
        let loc = &instr.location;

        match &instr.kind {
            InstrKind::Assign { lhs, rhs } => {
                let rhs = self.rename(state, rhs)?;
                self.assign(state, lhs, rhs, loc)?;
                state.pc += 1;
            }
            InstrKind::Goto { target } => {
                state.pc = self.position(&function.name, *target)?;
            }
            InstrKind::CondGoto { cond, target } => {
                let c = self.rename_simplify(state, cond)?;
                let taken = self.conjoin(&state.guard, c.clone())?;
                let fallthrough = self.conjoin(&state.guard, Expr::not(c)?)?;
                let target = self.position(&function.name, *target)?;

                match (taken.is_false(), fallthrough.is_false()) {
                    (true, true) => return Ok(self.prune(state, "infeasible branch")),
                    (true, false) => {
                        state.guard = fallthrough;
                        state.pc += 1;
                    }
                    (false, true) => {
                        state.guard = taken;
                        state.pc = target;
                    }
                    (false, false) => {
                        let mut other = state.clone();
                        other.path = self.equation.new_path(Some(state.path));
                        other.guard = taken;
                        other.pc = target;
                        debug!(path = state.path, forked = other.path, at = %loc, "fork");
                        worklist.push(other);

                        state.guard = fallthrough;
                        state.pc += 1;
                    }
                }
            }
            InstrKind::FunctionCall { lhs, function: callee, args } => {
                return self.call(state, lhs.as_ref(), callee, args, loc);
            }
            InstrKind::Return { value } => {
                state.pending_return = match value {
                    Some(v) => Some(self.rename_simplify(state, v)?),
                    None => None,
                };
                state.pc = function
                    .body
                    .iter()
                    .rposition(|i| matches!(i.kind, InstrKind::EndFunction))
                    .unwrap_or(function.body.len());
            }
            InstrKind::Assume { cond } => {
                let c = self.rename_simplify(state, cond)?;
                self.record(state, SsaStepKind::Assumption { cond: c.clone() }, loc);
                state.guard = self.conjoin(&state.guard, c)?;
                if state.guard.is_false() {
                    return Ok(self.prune(state, "assumption"));
                }
                state.pc += 1;
            }
            InstrKind::Assert { cond, property } => {
                if property.is_unwinding() {
                    return Ok(self.unwinding_assertion(state, property, loc));
                }
                if !self.options.skip_user_assertions && self.options.properties.contains(property) {
                    let c = self.rename_simplify(state, cond)?;
                    self.record(
                        state,
                        SsaStepKind::Assertion {
                            cond: c,
                            property: property.clone(),
                        },
                        loc,
                    );
                }
                state.pc += 1;
            }
            InstrKind::CatchPush { exceptions, targets } => {
                state.push_catch(exceptions, targets, loc)?;
                state.pc += 1;
            }
            InstrKind::CatchPop => {
                state.pop_catch(loc)?;
                state.pc += 1;
            }
            InstrKind::Throw { exceptions } => match state.resolve_throw(exceptions) {
                ThrowResolution::NoExceptions => state.pc += 1,
                ThrowResolution::Unhandled(tag) => {
                    debug!(path = state.path, tag = %tag, at = %loc, "unhandled exception");
                    self.record(state, SsaStepKind::Assumption { cond: Expr::false_expr() }, loc);
                    return Ok(self.prune(state, "unhandled exception"));
                }
                ThrowResolution::Handlers(handlers) => {
                    for handler in handlers[1..].iter().rev() {
                        let mut alt = state.clone();
                        alt.path = self.equation.new_path(Some(state.path));
                        self.jump_to_handler(&mut alt, handler)?;
                        debug!(path = state.path, forked = alt.path, at = %loc, "throw alternative");
                        worklist.push(alt);
                    }
                    self.jump_to_handler(state, &handlers[0])?;
                }
            },
            InstrKind::Skip => state.pc += 1,
            InstrKind::EndFunction => return self.end_function(state, loc),
        }
        Ok(Flow::Continue)
    }

    fn unwinding_assertion(&mut self, state: &mut SymexState, property: &Property, loc: &SourceLocation) -> Flow {
        if self.options.unwinding_assertions {
            self.record(
                state,
                SsaStepKind::Assertion {
                    cond: Expr::false_expr(),
                    property: property.clone(),
                },
                loc,
            );
        } else {
            self.record(state, SsaStepKind::Assumption { cond: Expr::false_expr() }, loc);
        }
        state.guard = Expr::false_expr();
        self.prune(state, "unwinding bound")
    }

    fn call(
        &mut self,
        state: &mut SymexState,
        lhs: Option<&Expr>,
        callee: &str,
        args: &[Expr],
        loc: &SourceLocation,
    ) -> Result<Flow, SymexError> {
        let args = args
            .iter()
            .map(|a| self.rename_simplify(state, a))
            .collect::<Result<Vec<_>, _>>()?;

        let program = self.program;
        let Some(f) = program.function(callee).filter(|f| f.has_body()) else {
            if let Some(lhs) = lhs {
                let value = self.nondet(lhs.ty(), callee)?;
                self.assign(state, lhs, value, loc)?;
            }
            state.pc += 1;
            return Ok(Flow::Continue);
        };

        if f.params.len() != args.len() {
            return Err(SymexError::ArgumentCount {
                function: f.name.clone(),
                expected: f.params.len(),
                found: args.len(),
            });
        }
        if state.call_depth() as u32 >= self.options.max_call_depth {
            // Cutting recursion is a bound like a loop's unwinding bound.
            let property = Property {
                id: format!("{callee}.recursion"),
                class: PropertyClass::UnwindingAssertion,
                comment: format!("recursion depth {}", self.options.max_call_depth),
            };
            return Ok(self.unwinding_assertion(state, &property, loc));
        }

        let activation = self.next_activation();
        state
            .call_stack
            .push(Frame::function(&f.name, activation, Some(state.pc + 1), lhs.cloned()));
        for (param, arg) in f.params.iter().zip(args) {
            self.assign(state, param, arg, loc)?;
        }
        state.pc = 0;
        Ok(Flow::Continue)
    }

    fn end_function(&mut self, state: &mut SymexState, loc: &SourceLocation) -> Result<Flow, SymexError> {
        // Catch frames left open by the callee go with it.
        while let Some(frame) = state.call_stack.pop() {
            let FrameKind::Function { return_to, lhs, .. } = frame.kind else {
                continue;
            };
            let Some(resume) = return_to else {
                return Ok(Flow::Stop);
            };
            let value = state.pending_return.take();
            if let Some(lhs) = lhs {
                let rhs = match value {
                    Some(v) => v,
                    None => self.nondet(lhs.ty(), &frame.function)?,
                };
                self.assign(state, &lhs, rhs, loc)?;
            }
            state.pc = resume;
            return Ok(Flow::Continue);
        }
        Ok(Flow::Stop)
    }

    fn jump_to_handler(&mut self, state: &mut SymexState, handler: &ThrowTarget) -> Result<(), SymexError> {
        state.transfer(handler);
        state.pc = self.position(&handler.function, handler.target)?;
        Ok(())
    }

    fn prune(&mut self, state: &SymexState, why: &'static str) -> Flow {
        self.equation.pruned += 1;
        debug!(path = state.path, reason = why, "path pruned");
        Flow::Stop
    }

    fn record(&mut self, state: &SymexState, kind: SsaStepKind, loc: &SourceLocation) {
        self.equation.push(SsaStep {
            kind,
            guard: state.guard.clone(),
            location: loc.clone(),
            path: state.path,
        });
    }

    fn position(&self, function: &str, target: InstrId) -> Result<usize, SymexError> {
        self.positions
            .get(function)
            .and_then(|m| m.get(&target))
            .copied()
            .ok_or_else(|| SymexError::BadTarget {
                function: function.to_string(),
                target,
            })
    }

    fn next_activation(&mut self) -> u32 {
        self.activations += 1;
        self.activations
    }

    fn nondet(&mut self, ty: &Type, origin: &str) -> Result<Expr, SymexError> {
        self.nondets += 1;
        Ok(self
            .pool
            .intern_expr(Expr::symbol(format!("nondet$symex.{origin}!{}", self.nondets), ty.clone())?))
    }

    fn conjoin(&mut self, guard: &Expr, cond: Expr) -> Result<Expr, SymexError> {
        Ok(self.simplifier.simplify(&Expr::and(guard.clone(), cond)?)?)
    }

    fn rename_simplify(&mut self, state: &SymexState, e: &Expr) -> Result<Expr, SymexError> {
        let renamed = self.rename(state, e)?;
        Ok(self.simplifier.simplify(&renamed)?)
    }

    /// Level-2 renaming of every read in `e`, with known constants substituted.
    fn rename(&mut self, state: &SymexState, e: &Expr) -> Result<Expr, SymexError> {
        match e.kind() {
            ExprKind::Symbol(name) => self.rename_symbol(state, e, name),
            ExprKind::AddressOf(_) => e.map_operands(|op| self.rename_object(state, op)),
            _ => e.map_operands(|op| self.rename(state, op)),
        }
    }

    /// Inside an address-of only indices are values; objects keep their
    /// level-1 name.
    fn rename_object(&mut self, state: &SymexState, e: &Expr) -> Result<Expr, SymexError> {
        match e.kind() {
            ExprKind::Symbol(name) if !is_special(name) => Ok(Expr::symbol(state.l1_name(name), e.ty().clone())?),
            ExprKind::Index { source, index } => Ok(Expr::new(
                e.ty().clone(),
                ExprKind::Index {
                    source: self.rename_object(state, source)?,
                    index: self.rename(state, index)?,
                },
            )?),
            _ => e.map_operands(|op| self.rename_object(state, op)),
        }
    }

    fn rename_symbol(&mut self, state: &SymexState, e: &Expr, name: &str) -> Result<Expr, SymexError> {
        if name.starts_with("nondet$") {
            self.nondets += 1;
            return Ok(Expr::symbol(format!("{name}!{}", self.nondets), e.ty().clone())?);
        }
        if is_special(name) {
            return Ok(e.clone());
        }
        let l1 = state.l1_name(name);
        let version = state.renaming.get(&l1).copied().unwrap_or(0);
        let ssa = format!("{l1}#{version}");
        if let Some(c) = state.constants.get(&ssa) {
            return Ok(c.clone());
        }
        Ok(self.pool.intern_expr(Expr::symbol(ssa, e.ty().clone())?))
    }

    /// Records `lhs := rhs`, where `rhs` is already renamed.
    fn assign(&mut self, state: &mut SymexState, lhs: &Expr, rhs: Expr, loc: &SourceLocation) -> Result<(), SymexError> {
        let (root, value) = self.split_lhs(state, lhs, rhs, loc)?;
        let Some(name) = root.as_symbol() else {
            return Err(SymexError::UnsupportedLhs {
                lhs: lhs.to_string(),
                location: loc.clone(),
            });
        };
        let value = self.simplifier.simplify(&value)?;

        let l1 = state.l1_name(name);
        let version = self.versions.entry(l1.clone()).or_insert(0);
        *version += 1;
        let version = *version;
        state.renaming.insert(l1.clone(), version);

        let ssa = format!("{l1}#{version}");
        if value.is_constant() {
            state.constants.insert(ssa.clone(), value.clone());
        }
        let lhs = self.pool.intern_expr(Expr::symbol(ssa, root.ty().clone())?);
        let rhs = self.pool.intern_expr(value);
        self.record(state, SsaStepKind::Assignment { lhs, rhs }, loc);
        Ok(())
    }

    /// Moves selectors from the left-hand side into the value:
    /// `a.f := v` becomes `a := a with .f := v`, and so on down to a symbol.
    fn split_lhs(
        &mut self,
        state: &SymexState,
        lhs: &Expr,
        value: Expr,
        loc: &SourceLocation,
    ) -> Result<(Expr, Expr), SymexError> {
        let value = if value.ty() != lhs.ty() {
            Expr::new(lhs.ty().clone(), ExprKind::Typecast(value))?
        } else {
            value
        };

        match lhs.kind() {
            ExprKind::Symbol(name) if !is_special(name) => Ok((lhs.clone(), value)),
            ExprKind::Member { source, member } => {
                let whole = Expr::new(
                    source.ty().clone(),
                    ExprKind::With {
                        source: self.rename(state, source)?,
                        designator: Designator::Member(member.clone()),
                        update: value,
                    },
                )?;
                self.split_lhs(state, source, whole, loc)
            }
            ExprKind::Index { source, index }
                if matches!(source.ty().kind(), TypeKind::Array { .. } | TypeKind::String { .. }) =>
            {
                let whole = Expr::new(
                    source.ty().clone(),
                    ExprKind::With {
                        source: self.rename(state, source)?,
                        designator: Designator::Index(self.rename(state, index)?),
                        update: value,
                    },
                )?;
                self.split_lhs(state, source, whole, loc)
            }
            ExprKind::ByteExtract { endian, source, offset } => {
                let whole = Expr::new(
                    source.ty().clone(),
                    ExprKind::ByteUpdate {
                        endian: *endian,
                        source: self.rename(state, source)?,
                        offset: self.rename(state, offset)?,
                        update: value,
                    },
                )?;
                self.split_lhs(state, source, whole, loc)
            }
            ExprKind::Typecast(inner) => {
                let value = Expr::new(inner.ty().clone(), ExprKind::Typecast(value))?;
                self.split_lhs(state, inner, value, loc)
            }
            _ => Err(SymexError::UnsupportedLhs {
                lhs: lhs.to_string(),
                location: loc.clone(),
            }),
        }
    }
}

fn is_special(name: &str) -> bool {
    name == "NULL" || name == "INVALID"
}

/// Convenience wrapper: symbolically executes `program` from its entry.
pub fn symex(program: &GotoProgram, options: SymexOptions, pool: Arc<IrepPool>) -> Result<Equation, SymexError> {
    SymexEngine::new(program, options, pool).run()
}
