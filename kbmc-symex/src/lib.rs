#![forbid(unsafe_code)]

pub mod check;
pub mod engine;
pub mod equation;
pub mod error;
pub mod simplify;
pub mod solver;
pub mod state;

pub use check::{CheckOutcome, Counterexample, TraceStep, check_equation, check_properties};
pub use engine::{SymexEngine, SymexOptions, symex};
pub use equation::*;
pub use error::SymexError;
pub use simplify::{Simplifier, simplify, wrap};
pub use solver::{Model, SimplifyingSolver, SimplifyingSolverFactory, Solver, SolverFactory, SolverResult};
pub use state::*;
