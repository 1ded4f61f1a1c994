#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use kbmc_goto::GotoError;
use kbmc_symex::SymexError;
use miette::Diagnostic;
use thiserror::Error;

use crate::Step;

#[derive(Debug, Error, Diagnostic)]
pub enum KInductionError {
    #[error("{step} worker stopped without reporting")]
    #[diagnostic(code(kbmc::kinduction::worker_lost))]
    WorkerLost { step: Step },

    #[error("{step} at k = {k} failed")]
    #[diagnostic(code(kbmc::kinduction::step_failed))]
    StepFailed {
        step: Step,
        k: u32,
        #[source]
        #[diagnostic_source]
        source: SymexError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Goto(#[from] GotoError),
}
