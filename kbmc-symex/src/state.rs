#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use kbmc_goto::InstrId;
use kbmc_irep::{Expr, SourceLocation};

use crate::SymexError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Function {
        /// Suffix that keeps this call's locals apart from other calls'.
        activation: u32,
        /// Caller position to resume at; `None` for the entry frame.
        return_to: Option<usize>,
        /// Caller-side destination of the return value.
        lhs: Option<Expr>,
    },
    Catch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub kind: FrameKind,
    /// Exception tag to handler, only populated for catch frames.
    pub catch_map: BTreeMap<String, InstrId>,
}

impl Frame {
    pub fn function(function: impl Into<String>, activation: u32, return_to: Option<usize>, lhs: Option<Expr>) -> Self {
        Self {
            function: function.into(),
            kind: FrameKind::Function {
                activation,
                return_to,
                lhs,
            },
            catch_map: BTreeMap::new(),
        }
    }

    pub fn catch(function: impl Into<String>, handlers: impl IntoIterator<Item = (String, InstrId)>) -> Self {
        Self {
            function: function.into(),
            kind: FrameKind::Catch,
            catch_map: handlers.into_iter().collect(),
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, FrameKind::Function { .. })
    }
}

/// Where a thrown tag lands: the catching frame's index and its handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThrowTarget {
    pub depth: usize,
    pub function: String,
    pub target: InstrId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ThrowResolution {
    /// A throw with no tags; execution continues after it.
    NoExceptions,
    /// First tag without a handler.
    Unhandled(String),
    /// One entry per distinct handler, in tag order.
    Handlers(Vec<ThrowTarget>),
}

/// Everything one symbolic path knows.
#[derive(Clone, Debug)]
pub struct SymexState {
    pub path: u32,
    pub guard: Expr,
    /// Position in the body of the top frame's function.
    pub pc: usize,
    pub call_stack: Vec<Frame>,
    /// Current SSA version of every level-1 name assigned on this path.
    pub renaming: BTreeMap<String, u32>,
    /// SSA names whose value is a known constant.
    pub constants: BTreeMap<String, Expr>,
    pub pending_return: Option<Expr>,
}

impl SymexState {
    pub fn new(path: u32, entry: &str, activation: u32) -> Self {
        Self {
            path,
            guard: Expr::true_expr(),
            pc: 0,
            call_stack: vec![Frame::function(entry, activation, None, None)],
            renaming: BTreeMap::new(),
            constants: BTreeMap::new(),
            pending_return: None,
        }
    }

    pub fn function(&self) -> Option<&str> {
        self.call_stack.last().map(|f| f.function.as_str())
    }

    pub fn activation(&self) -> Option<u32> {
        self.call_stack.iter().rev().find_map(|f| match f.kind {
            FrameKind::Function { activation, .. } => Some(activation),
            FrameKind::Catch => None,
        })
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.iter().filter(|f| f.is_function()).count()
    }

    /// Level-1 name: locals (`f::x` while executing `f`) carry the activation.
    pub fn l1_name(&self, name: &str) -> String {
        match (self.function(), self.activation()) {
            (Some(f), Some(act)) if name.len() > f.len() + 2 && name.starts_with(f) && name[f.len()..].starts_with("::") => {
                format!("{name}!{act}")
            }
            _ => name.to_string(),
        }
    }

    pub fn push_catch(
        &mut self,
        exceptions: &[String],
        targets: &[InstrId],
        location: &SourceLocation,
    ) -> Result<(), SymexError> {
        if exceptions.len() != targets.len() {
            return Err(SymexError::CatchArity {
                location: location.clone(),
                exceptions: exceptions.len(),
                targets: targets.len(),
            });
        }
        let function = self.function().unwrap_or_default().to_string();
        self.call_stack
            .push(Frame::catch(function, exceptions.iter().cloned().zip(targets.iter().copied())));
        Ok(())
    }

    pub fn pop_catch(&mut self, location: &SourceLocation) -> Result<Frame, SymexError> {
        match self.call_stack.pop() {
            None => Err(SymexError::CatchPopEmptyStack {
                location: location.clone(),
            }),
            Some(top) if top.is_function() => {
                let function = top.function.clone();
                self.call_stack.push(top);
                Err(SymexError::CatchPopFunctionFrame {
                    function,
                    location: location.clone(),
                })
            }
            Some(top) => Ok(top),
        }
    }

    /// Resolves every tag against the current stack, innermost frame first.
    pub fn resolve_throw(&self, exceptions: &[String]) -> ThrowResolution {
        if exceptions.is_empty() {
            return ThrowResolution::NoExceptions;
        }
        let mut handlers: Vec<ThrowTarget> = Vec::new();
        for tag in exceptions {
            let found = self
                .call_stack
                .iter()
                .enumerate()
                .rev()
                .find_map(|(depth, frame)| match frame.kind {
                    FrameKind::Catch => frame.catch_map.get(tag).map(|target| ThrowTarget {
                        depth,
                        function: frame.function.clone(),
                        target: *target,
                    }),
                    FrameKind::Function { .. } => None,
                });
            match found {
                Some(t) if !handlers.contains(&t) => handlers.push(t),
                Some(_) => {}
                None => return ThrowResolution::Unhandled(tag.clone()),
            }
        }
        ThrowResolution::Handlers(handlers)
    }

    /// Unwinds the stack to just below the catching frame.
    pub fn transfer(&mut self, target: &ThrowTarget) {
        self.call_stack.truncate(target.depth);
        self.pending_return = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(ts: &[&str]) -> Vec<String> {
        ts.iter().map(|t| t.to_string()).collect()
    }

    /// main, then F1 { A -> L1 }, then F2 { B -> L2 } on top.
    fn two_handlers() -> SymexState {
        let mut s = SymexState::new(0, "main", 1);
        let loc = SourceLocation::default();
        s.push_catch(&tags(&["A"]), &[InstrId(1)], &loc).unwrap();
        s.push_catch(&tags(&["B"]), &[InstrId(2)], &loc).unwrap();
        s
    }

    #[test]
    fn throw_reaches_enclosing_handler() {
        let s = two_handlers();
        let r = s.resolve_throw(&tags(&["A"]));
        assert_eq!(
            r,
            ThrowResolution::Handlers(vec![ThrowTarget {
                depth: 1,
                function: "main".into(),
                target: InstrId(1),
            }])
        );
    }

    #[test]
    fn unknown_tag_is_unhandled() {
        let s = two_handlers();
        assert_eq!(s.resolve_throw(&tags(&["C"])), ThrowResolution::Unhandled("C".into()));
        assert_eq!(s.resolve_throw(&tags(&["A", "C"])), ThrowResolution::Unhandled("C".into()));
    }

    #[test]
    fn throw_without_tags_resolves_to_nothing() {
        assert_eq!(two_handlers().resolve_throw(&[]), ThrowResolution::NoExceptions);
        assert_eq!(SymexState::new(0, "main", 1).resolve_throw(&[]), ThrowResolution::NoExceptions);
    }

    #[test]
    fn multi_tag_throw_has_one_continuation_per_handler() {
        let s = two_handlers();
        let ThrowResolution::Handlers(hs) = s.resolve_throw(&tags(&["A", "B"])) else {
            panic!("expected handlers");
        };
        assert_eq!(hs.len(), 2);
        assert_eq!((hs[0].depth, hs[0].target), (1, InstrId(1)));
        assert_eq!((hs[1].depth, hs[1].target), (2, InstrId(2)));
    }

    #[test]
    fn innermost_handler_wins() {
        let mut s = two_handlers();
        s.push_catch(&tags(&["A"]), &[InstrId(9)], &SourceLocation::default()).unwrap();
        let ThrowResolution::Handlers(hs) = s.resolve_throw(&tags(&["A"])) else {
            panic!("expected handlers");
        };
        assert_eq!(hs[0].target, InstrId(9));
    }

    #[test]
    fn transfer_cuts_catching_frame() {
        let mut s = two_handlers();
        let ThrowResolution::Handlers(hs) = s.resolve_throw(&tags(&["A"])) else {
            panic!("expected handlers");
        };
        s.transfer(&hs[0]);
        assert_eq!(s.call_stack.len(), 1);
        assert!(s.call_stack[0].is_function());
    }

    #[test]
    fn catch_pop_errors() {
        let loc = SourceLocation::default();
        let mut s = SymexState::new(0, "main", 1);
        assert!(matches!(s.pop_catch(&loc), Err(SymexError::CatchPopFunctionFrame { .. })));
        s.call_stack.clear();
        assert!(matches!(s.pop_catch(&loc), Err(SymexError::CatchPopEmptyStack { .. })));

        let mut s = two_handlers();
        assert!(s.pop_catch(&loc).is_ok());
        assert!(s.pop_catch(&loc).is_ok());
        assert!(s.pop_catch(&loc).is_err());
    }

    #[test]
    fn catch_push_arity_checked() {
        let mut s = SymexState::new(0, "main", 1);
        let err = s
            .push_catch(&tags(&["A", "B"]), &[InstrId(1)], &SourceLocation::default())
            .unwrap_err();
        assert!(matches!(err, SymexError::CatchArity { exceptions: 2, targets: 1, .. }));
    }

    #[test]
    fn locals_get_activation_suffix() {
        let s = SymexState::new(0, "main", 3);
        assert_eq!(s.l1_name("main::x"), "main::x!3");
        assert_eq!(s.l1_name("g"), "g");
        assert_eq!(s.l1_name("mainly::x"), "mainly::x");
    }
}
