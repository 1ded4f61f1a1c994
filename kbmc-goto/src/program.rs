#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use kbmc_irep::{Expr, SourceLocation};
use serde::{Deserialize, Serialize};

use crate::GotoError;

/// Stable instruction identity inside one function. Jump targets refer to
/// these, never to positions, so inserting instructions never breaks a jump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyClass {
    User,
    UnwindingAssertion,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub class: PropertyClass,
    pub comment: String,
}

impl Property {
    pub fn user(id: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class: PropertyClass::User,
            comment: comment.into(),
        }
    }

    pub fn is_unwinding(&self) -> bool {
        self.class == PropertyClass::UnwindingAssertion
    }
}

/// Which user properties a run checks. Unwinding assertions are not subject
/// to selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PropertySet {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl PropertySet {
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PropertySet::Only(ids.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, property: &Property) -> bool {
        match self {
            PropertySet::All => true,
            PropertySet::Only(ids) => property.is_unwinding() || ids.contains(&property.id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrKind {
    Assign {
        lhs: Expr,
        rhs: Expr,
    },
    Goto {
        target: InstrId,
    },
    CondGoto {
        cond: Expr,
        target: InstrId,
    },
    FunctionCall {
        lhs: Option<Expr>,
        function: String,
        args: Vec<Expr>,
    },
    Return {
        value: Option<Expr>,
    },
    Assume {
        cond: Expr,
    },
    Assert {
        cond: Expr,
        property: Property,
    },
    /// Tag `exceptions[i]` is handled at `targets[i]`.
    CatchPush {
        exceptions: Vec<String>,
        targets: Vec<InstrId>,
    },
    CatchPop,
    Throw {
        exceptions: Vec<String>,
    },
    Skip,
    EndFunction,
}

impl InstrKind {
    /// Explicit jump targets, in order.
    pub fn targets(&self) -> Vec<InstrId> {
        match self {
            InstrKind::Goto { target } | InstrKind::CondGoto { target, .. } => vec![*target],
            InstrKind::CatchPush { targets, .. } => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// The target of a goto. Catch handlers are not jumps and never close a loop.
    pub fn jump_target(&self) -> Option<InstrId> {
        match self {
            InstrKind::Goto { target } | InstrKind::CondGoto { target, .. } => Some(*target),
            _ => None,
        }
    }

    pub fn map_targets(&mut self, mut f: impl FnMut(InstrId) -> InstrId) {
        match self {
            InstrKind::Goto { target } | InstrKind::CondGoto { target, .. } => *target = f(*target),
            InstrKind::CatchPush { targets, .. } => {
                for t in targets.iter_mut() {
                    *t = f(*t);
                }
            }
            _ => {}
        }
    }

    /// Whether control can reach the next instruction in layout order.
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            InstrKind::Goto { .. } | InstrKind::Return { .. } | InstrKind::Throw { .. } | InstrKind::EndFunction
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InstrId,
    pub kind: InstrKind,
    pub location: SourceLocation,
}

/// A natural loop: the contiguous range from `head` to its last back-edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loop {
    pub head: InstrId,
    pub back_edges: Vec<InstrId>,
    /// Positions `start..=end` in the body the loop was computed from.
    pub start: usize,
    pub end: usize,
}

impl Loop {
    pub fn contains_pos(&self, pos: usize) -> bool {
        self.start <= pos && pos <= self.end
    }

    pub fn nests(&self, inner: &Loop) -> bool {
        self.start <= inner.start && inner.end <= self.end && self != inner
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GotoFunction {
    pub name: String,
    /// Parameter symbols, bound positionally at calls.
    pub params: Vec<Expr>,
    pub body: Vec<Instruction>,
    pub next_id: u32,
    pub unwound: bool,
}

impl GotoFunction {
    pub fn new(name: impl Into<String>, params: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            params,
            body: Vec::new(),
            next_id: 0,
            unwound: false,
        }
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    pub fn fresh_id(&mut self) -> InstrId {
        let id = InstrId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn push(&mut self, kind: InstrKind, location: SourceLocation) -> InstrId {
        let id = self.fresh_id();
        self.body.push(Instruction { id, kind, location });
        id
    }

    /// Reserves an id for an instruction whose target is only known later.
    pub fn push_with_id(&mut self, id: InstrId, kind: InstrKind, location: SourceLocation) {
        self.next_id = self.next_id.max(id.0 + 1);
        self.body.push(Instruction { id, kind, location });
    }

    pub fn position(&self, id: InstrId) -> Option<usize> {
        self.body.iter().position(|i| i.id == id)
    }

    pub fn get(&self, id: InstrId) -> Option<&Instruction> {
        self.body.iter().find(|i| i.id == id)
    }

    pub fn positions(&self) -> BTreeMap<InstrId, usize> {
        self.body.iter().enumerate().map(|(p, i)| (i.id, p)).collect()
    }

    pub fn successors(&self, id: InstrId) -> Vec<InstrId> {
        let Some(pos) = self.position(id) else {
            return Vec::new();
        };
        let instr = &self.body[pos];
        let mut out = Vec::new();
        if let InstrKind::Return { .. } = instr.kind {
            if let Some(end) = self.body.iter().rev().find(|i| i.kind == InstrKind::EndFunction) {
                out.push(end.id);
            }
            return out;
        }
        if instr.kind.falls_through() {
            if let Some(next) = self.body.get(pos + 1) {
                out.push(next.id);
            }
        }
        for t in instr.kind.targets() {
            if !out.contains(&t) {
                out.push(t);
            }
        }
        out
    }

    pub fn is_loop_head(&self, id: InstrId) -> bool {
        let Some(head) = self.position(id) else {
            return false;
        };
        self.body[head..].iter().any(|i| i.kind.jump_target() == Some(id))
    }

    /// Loops in order of their head position; back-edges sharing a head form
    /// one loop.
    pub fn loops(&self) -> Vec<Loop> {
        let pos = self.positions();
        let mut by_head: BTreeMap<usize, Loop> = BTreeMap::new();
        for (p, instr) in self.body.iter().enumerate() {
            if let Some(t) = instr.kind.jump_target() {
                let Some(&h) = pos.get(&t) else { continue };
                if h > p {
                    continue;
                }
                let l = by_head.entry(h).or_insert_with(|| Loop {
                    head: t,
                    back_edges: Vec::new(),
                    start: h,
                    end: p,
                });
                if !l.back_edges.contains(&instr.id) {
                    l.back_edges.push(instr.id);
                }
                l.end = l.end.max(p);
            }
        }
        by_head.into_values().collect()
    }

    /// Loops not nested in any other loop.
    pub fn outermost_loops(&self) -> Result<Vec<Loop>, GotoError> {
        let loops = self.loops();
        for (i, a) in loops.iter().enumerate() {
            for b in &loops[i + 1..] {
                let overlap = a.contains_pos(b.start) || b.contains_pos(a.start);
                if overlap && !a.nests(b) && !b.nests(a) {
                    return Err(GotoError::IrreducibleLoops {
                        function: self.name.clone(),
                        first: a.head,
                        second: b.head,
                    });
                }
            }
        }
        Ok(loops
            .iter()
            .filter(|l| !loops.iter().any(|o| o.nests(l)))
            .cloned()
            .collect())
    }

    pub fn validate(&self) -> Result<(), GotoError> {
        let mut seen = BTreeSet::new();
        for instr in &self.body {
            if !seen.insert(instr.id) || instr.id.0 >= self.next_id {
                return Err(GotoError::DuplicateId {
                    function: self.name.clone(),
                    instr: instr.id,
                });
            }
        }
        for instr in &self.body {
            if let InstrKind::CatchPush { exceptions, targets } = &instr.kind {
                if exceptions.len() != targets.len() {
                    return Err(GotoError::CatchArity {
                        function: self.name.clone(),
                        instr: instr.id,
                        exceptions: exceptions.len(),
                        targets: targets.len(),
                    });
                }
            }
            if let Some(target) = instr.kind.targets().into_iter().find(|t| !seen.contains(t)) {
                return Err(GotoError::UnresolvedTarget {
                    function: self.name.clone(),
                    instr: instr.id,
                    target,
                });
            }
        }
        Ok(())
    }

    pub fn assertions(&self) -> impl Iterator<Item = (&Instruction, &Property)> {
        self.body.iter().filter_map(|i| match &i.kind {
            InstrKind::Assert { property, .. } => Some((i, property)),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GotoProgram {
    pub functions: BTreeMap<String, GotoFunction>,
    pub entry: String,
}

impl GotoProgram {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            functions: BTreeMap::new(),
            entry: entry.into(),
        }
    }

    pub fn insert(&mut self, function: GotoFunction) {
        self.functions.insert(function.name.clone(), function);
    }

    pub fn function(&self, name: &str) -> Option<&GotoFunction> {
        self.functions.get(name)
    }

    pub fn entry_function(&self) -> Result<&GotoFunction, GotoError> {
        self.functions.get(&self.entry).ok_or_else(|| GotoError::MissingEntry {
            entry: self.entry.clone(),
        })
    }

    pub fn validate(&self) -> Result<(), GotoError> {
        self.entry_function()?;
        for f in self.functions.values() {
            f.validate()?;
        }
        Ok(())
    }

    /// User properties, in function then layout order.
    pub fn properties(&self) -> Vec<&Property> {
        self.functions
            .values()
            .flat_map(|f| f.assertions().map(|(_, p)| p))
            .filter(|p| !p.is_unwinding())
            .collect()
    }

    pub fn has_loops(&self) -> bool {
        self.functions.values().any(|f| !f.loops().is_empty())
    }
}
