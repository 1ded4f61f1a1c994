#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use kbmc_goto::{GotoError, InstrId};
use kbmc_irep::{IrepError, SourceLocation};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SymexError {
    #[error("catch-push at {location} has {exceptions} exception tags but {targets} targets")]
    #[diagnostic(code(kbmc::symex::catch_arity))]
    CatchArity {
        location: SourceLocation,
        exceptions: usize,
        targets: usize,
    },

    #[error("catch-pop on empty call stack")]
    #[diagnostic(code(kbmc::symex::catch_pop_empty))]
    CatchPopEmptyStack { location: SourceLocation },

    #[error("catch-pop on function frame `{function}`")]
    #[diagnostic(
        code(kbmc::symex::catch_pop_function),
        help("every catch-pop must match a catch-push in the same function")
    )]
    CatchPopFunctionFrame { function: String, location: SourceLocation },

    #[error("call to `{function}` passes {found} arguments, expected {expected}")]
    #[diagnostic(code(kbmc::symex::argument_count))]
    ArgumentCount {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("cannot assign to `{lhs}` at {location}")]
    #[diagnostic(code(kbmc::symex::unsupported_lhs))]
    UnsupportedLhs { lhs: String, location: SourceLocation },

    #[error("`{function}` still contains a loop at {head}; unwind the program first")]
    #[diagnostic(code(kbmc::symex::not_unwound))]
    NotUnwound { function: String, head: InstrId },

    #[error("`{function}` has no instruction {target}")]
    #[diagnostic(code(kbmc::symex::bad_target))]
    BadTarget { function: String, target: InstrId },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Irep(#[from] IrepError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Goto(#[from] GotoError),
}
