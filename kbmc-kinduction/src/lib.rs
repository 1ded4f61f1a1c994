#![forbid(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod orchestrator;
pub mod step;

pub use config::*;
pub use coordinator::{Coordinator, Verdict};
pub use error::KInductionError;
pub use orchestrator::KInduction;
pub use step::*;
