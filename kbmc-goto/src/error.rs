#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use kbmc_irep::IrepError;
use miette::Diagnostic;
use thiserror::Error;

use crate::InstrId;

#[derive(Debug, Error, Diagnostic)]
pub enum GotoError {
    #[error("{function}: {instr} jumps to {target}, which is not in the function")]
    #[diagnostic(code(kbmc::goto::unresolved_target))]
    UnresolvedTarget {
        function: String,
        instr: InstrId,
        target: InstrId,
    },

    #[error("{function}: instruction id {instr} is used twice")]
    #[diagnostic(code(kbmc::goto::duplicate_id))]
    DuplicateId { function: String, instr: InstrId },

    #[error("{function}: catch-push {instr} has {exceptions} exception tags but {targets} targets")]
    #[diagnostic(code(kbmc::goto::catch_arity))]
    CatchArity {
        function: String,
        instr: InstrId,
        exceptions: usize,
        targets: usize,
    },

    #[error("{function}: loops overlapping at {first} and {second} are not nested")]
    #[diagnostic(code(kbmc::goto::irreducible))]
    IrreducibleLoops {
        function: String,
        first: InstrId,
        second: InstrId,
    },

    #[error("{function} has already been unwound")]
    #[diagnostic(
        code(kbmc::goto::already_unwound),
        help("unwind a fresh copy of the original program instead")
    )]
    AlreadyUnwound { function: String },

    #[error("unwinding bound must be at least 1")]
    #[diagnostic(code(kbmc::goto::zero_bound))]
    ZeroBound,

    #[error("entry function `{entry}` is not defined")]
    #[diagnostic(code(kbmc::goto::missing_entry))]
    MissingEntry { entry: String },

    #[error("not a goto binary (bad magic {found:02x?})")]
    #[diagnostic(code(kbmc::goto::bad_magic))]
    BadMagic { found: [u8; 4] },

    #[error("goto binary could not be encoded or decoded: {message}")]
    #[diagnostic(code(kbmc::goto::codec))]
    Codec { message: String },

    #[error(transparent)]
    #[diagnostic(code(kbmc::goto::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Irep(#[from] IrepError),
}

impl From<bincode::Error> for GotoError {
    fn from(err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(io) => GotoError::Io(io),
            other => GotoError::Codec {
                message: other.to_string(),
            },
        }
    }
}
