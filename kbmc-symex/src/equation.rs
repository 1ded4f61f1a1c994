#![forbid(unsafe_code)]

use kbmc_goto::Property;
use kbmc_irep::{Expr, SourceLocation};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SsaStepKind {
    /// `lhs` is always a fresh SSA symbol; each is defined exactly once.
    Assignment { lhs: Expr, rhs: Expr },
    Assumption { cond: Expr },
    Assertion { cond: Expr, property: Property },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SsaStep {
    pub kind: SsaStepKind,
    pub guard: Expr,
    pub location: SourceLocation,
    pub path: u32,
}

/// Where a path branched off: its parent and how many equation steps
/// existed at that moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathOrigin {
    pub parent: Option<u32>,
    pub fork_step: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationCondition {
    pub guard: Expr,
    pub condition: Expr,
    pub location: SourceLocation,
    pub property: Property,
    pub path: u32,
    pub step: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Equation {
    pub steps: Vec<SsaStep>,
    /// Indexed by path id.
    pub paths: Vec<PathOrigin>,
    pub pruned: u32,
}

impl Equation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: SsaStep) {
        self.steps.push(step);
    }

    pub fn new_path(&mut self, parent: Option<u32>) -> u32 {
        let id = self.paths.len() as u32;
        self.paths.push(PathOrigin {
            parent,
            fork_step: self.steps.len(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn assignments(&self) -> impl Iterator<Item = (&Expr, &Expr)> {
        self.steps.iter().filter_map(|s| match &s.kind {
            SsaStepKind::Assignment { lhs, rhs } => Some((lhs, rhs)),
            _ => None,
        })
    }

    pub fn verification_conditions(&self) -> Vec<VerificationCondition> {
        self.steps
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match &s.kind {
                SsaStepKind::Assertion { cond, property } => Some(VerificationCondition {
                    guard: s.guard.clone(),
                    condition: cond.clone(),
                    location: s.location.clone(),
                    property: property.clone(),
                    path: s.path,
                    step: i,
                }),
                _ => None,
            })
            .collect()
    }

    /// Steps executed by `path` up to (excluding) step `until`, including the
    /// prefix it inherited from its ancestors.
    pub fn path_steps(&self, path: u32, until: usize) -> Vec<&SsaStep> {
        let mut spans: Vec<(u32, usize)> = Vec::new();
        let mut current = Some(path);
        let mut limit = until;
        while let Some(p) = current {
            spans.push((p, limit));
            let Some(origin) = self.paths.get(p as usize) else { break };
            limit = limit.min(origin.fork_step);
            current = origin.parent;
        }
        self.steps
            .iter()
            .enumerate()
            .filter(|(i, s)| spans.iter().any(|(p, lim)| s.path == *p && i < lim))
            .map(|(_, s)| s)
            .collect()
    }
}
