#![forbid(unsafe_code)]

//! Bounded loop unwinding and loop havocking.
//!
//! Loops are processed outermost first. Each pass replaces one loop with
//! `bound` straight-line copies followed by an unwinding assertion, so inner
//! loops are duplicated together with their enclosing copy and unwound by a
//! later pass. Copy 1 keeps the original instruction ids, which keeps every
//! jump from outside the loop valid without rewriting it.

use std::collections::{BTreeMap, BTreeSet};

use kbmc_irep::{Expr, ExprKind, IrepPool};
use rayon::prelude::*;
use tracing::debug;

use crate::{GotoError, GotoFunction, GotoProgram, InstrId, InstrKind, Instruction, Loop, Property, PropertyClass};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnwindOptions {
    pub bound: u32,
    /// User assertions in the first `hypothesis_copies` copies of each
    /// outermost loop become assumptions.
    pub hypothesis_copies: u32,
    /// End each outermost loop with `assume(false)` instead of an unwinding
    /// assertion. Nested loops keep their assertion.
    pub assume_outer_bound: bool,
}

impl UnwindOptions {
    pub fn new(bound: u32) -> Self {
        Self {
            bound,
            hypothesis_copies: 0,
            assume_outer_bound: false,
        }
    }

    pub fn with_hypotheses(mut self, copies: u32) -> Self {
        self.hypothesis_copies = copies;
        self
    }

    pub fn with_outer_bound_assumed(mut self) -> Self {
        self.assume_outer_bound = true;
        self
    }
}

pub fn unwind(function: &GotoFunction, bound: u32) -> Result<GotoFunction, GotoError> {
    unwind_with(function, &UnwindOptions::new(bound))
}

pub fn unwind_with(function: &GotoFunction, opts: &UnwindOptions) -> Result<GotoFunction, GotoError> {
    if function.unwound {
        return Err(GotoError::AlreadyUnwound {
            function: function.name.clone(),
        });
    }
    if opts.bound == 0 {
        return Err(GotoError::ZeroBound);
    }

    let top: BTreeSet<InstrId> = function.outermost_loops()?.iter().map(|l| l.head).collect();
    if top.is_empty() {
        return Ok(function.clone());
    }

    let mut out = function.clone();
    let mut counter = 0u32;
    while let Some(l) = out.outermost_loops()?.into_iter().next() {
        let outer = top.contains(&l.head);
        let hypotheses = if outer { opts.hypothesis_copies } else { 0 };
        let cut = if outer && opts.assume_outer_bound {
            Cut::Assume
        } else {
            Cut::Assert
        };
        unwind_loop(&mut out, &l, opts.bound, hypotheses, cut, counter);
        counter += 1;
    }
    out.unwound = true;

    debug!(
        function = %out.name,
        loops = counter,
        bound = opts.bound,
        instructions = out.body.len(),
        "unwound"
    );
    Ok(out)
}

/// What sits behind the last copy of a loop.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Cut {
    Assert,
    Assume,
}

fn unwind_loop(f: &mut GotoFunction, l: &Loop, bound: u32, hypotheses: u32, cut: Cut, counter: u32) {
    let segment: Vec<Instruction> = f.body[l.start..=l.end].to_vec();
    let head_location = segment[0].location.clone();

    let (post, exit_skip) = match f.body.get(l.end + 1) {
        Some(next) => (next.id, None),
        None => {
            let id = f.fresh_id();
            (id, Some(id))
        }
    };

    let maps: Vec<BTreeMap<InstrId, InstrId>> = (0..bound)
        .map(|copy| {
            segment
                .iter()
                .map(|i| {
                    let id = if copy == 0 { i.id } else { f.fresh_id() };
                    (i.id, id)
                })
                .collect()
        })
        .collect();
    let assert_id = f.fresh_id();

    let mut unrolled = Vec::with_capacity(segment.len() * bound as usize + 2);
    for (copy, map) in maps.iter().enumerate() {
        let next_head = match maps.get(copy + 1) {
            Some(next) => next[&l.head],
            None => assert_id,
        };
        for instr in &segment {
            let mut i = instr.clone();
            i.id = map[&instr.id];
            i.kind.map_targets(|t| {
                if t == l.head {
                    next_head
                } else {
                    map.get(&t).copied().unwrap_or(t)
                }
            });
            if (copy as u32) < hypotheses {
                if let InstrKind::Assert { cond, property } = &i.kind {
                    if property.class == PropertyClass::User {
                        i.kind = InstrKind::Assume { cond: cond.clone() };
                    }
                }
            }
            unrolled.push(i);
        }
        if let Some(last) = segment.last().filter(|i| i.kind.falls_through()) {
            unrolled.push(Instruction {
                id: f.fresh_id(),
                kind: InstrKind::Goto { target: post },
                location: last.location.clone(),
            });
        }
    }

    let kind = match cut {
        Cut::Assert => InstrKind::Assert {
            cond: Expr::false_expr(),
            property: Property {
                id: format!("{}.unwind.{counter}", f.name),
                class: PropertyClass::UnwindingAssertion,
                comment: format!("unwinding assertion loop {counter}"),
            },
        },
        Cut::Assume => InstrKind::Assume {
            cond: Expr::false_expr(),
        },
    };
    unrolled.push(Instruction {
        id: assert_id,
        kind,
        location: head_location.clone(),
    });
    if let Some(id) = exit_skip {
        unrolled.push(Instruction {
            id,
            kind: InstrKind::Skip,
            location: head_location,
        });
    }

    f.body.splice(l.start..=l.end, unrolled);
}

/// The variable an assignment ultimately writes to.
fn root_symbol(lhs: &Expr) -> Option<&Expr> {
    match lhs.kind() {
        ExprKind::Symbol(_) => Some(lhs),
        ExprKind::Member { source, .. }
        | ExprKind::Index { source, .. }
        | ExprKind::ByteExtract { source, .. }
        | ExprKind::Typecast(source) => root_symbol(source),
        _ => None,
    }
}

/// Inserts, before every outermost loop, a block assigning a fresh
/// nondeterministic value to each variable the loop writes. Jumps entering the
/// loop are redirected through the block; back-edges are not.
pub fn havoc_loops(function: &GotoFunction, pool: &IrepPool) -> Result<GotoFunction, GotoError> {
    let loops = function.outermost_loops()?;
    let mut out = function.clone();

    for (n, l) in loops.iter().enumerate() {
        let Some(start) = out.position(l.head) else { continue };
        let end = start + (l.end - l.start);

        let mut written: BTreeMap<String, Expr> = BTreeMap::new();
        for instr in &out.body[start..=end] {
            let lhs = match &instr.kind {
                InstrKind::Assign { lhs, .. } => Some(lhs),
                InstrKind::FunctionCall { lhs: Some(lhs), .. } => Some(lhs),
                _ => None,
            };
            if let Some(sym) = lhs.and_then(root_symbol) {
                if let Some(name) = sym.as_symbol() {
                    written.entry(name.to_string()).or_insert_with(|| sym.clone());
                }
            }
        }
        if written.is_empty() {
            continue;
        }

        let location = out.body[start].location.clone();
        let mut block = Vec::with_capacity(written.len());
        for (i, sym) in written.values().enumerate() {
            let fresh = Expr::symbol(format!("nondet$havoc.{}.{n}.{i}", out.name), sym.ty().clone())?;
            block.push(Instruction {
                id: out.fresh_id(),
                kind: InstrKind::Assign {
                    lhs: sym.clone(),
                    rhs: pool.intern_expr(fresh),
                },
                location: location.clone(),
            });
        }

        let first = block[0].id;
        for (p, instr) in out.body.iter_mut().enumerate() {
            if p < start || p > end {
                instr.kind.map_targets(|t| if t == l.head { first } else { t });
            }
        }
        debug!(function = %out.name, head = ?l.head, havocked = block.len(), "havoc loop");
        out.body.splice(start..start, block);
    }

    Ok(out)
}

pub fn unwind_program(program: &GotoProgram, opts: &UnwindOptions) -> Result<GotoProgram, GotoError> {
    unwind_program_by(program, |_| opts.clone())
}

/// Unwinds every function with the options `opts_for` picks for it.
pub fn unwind_program_by<F>(program: &GotoProgram, opts_for: F) -> Result<GotoProgram, GotoError>
where
    F: Fn(&GotoFunction) -> UnwindOptions + Sync,
{
    let functions = program
        .functions
        .par_iter()
        .map(|(name, f)| unwind_with(f, &opts_for(f)).map(|u| (name.clone(), u)))
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(GotoProgram {
        functions,
        entry: program.entry.clone(),
    })
}
