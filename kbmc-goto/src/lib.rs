#![forbid(unsafe_code)]

pub mod binary;
pub mod error;
pub mod program;
pub mod show;
pub mod unwind;

pub use binary::*;
pub use error::GotoError;
pub use program::*;
pub use unwind::{UnwindOptions, havoc_loops, unwind, unwind_program, unwind_program_by, unwind_with};
