#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use kbmc_goto::{GotoProgram, Property, PropertySet, UnwindOptions, havoc_loops, unwind_program, unwind_program_by};
use kbmc_irep::IrepPool;
use kbmc_symex::{CheckOutcome, Counterexample, SolverFactory, SymexOptions, check_equation, check_properties, symex};
use serde::Serialize;
use tracing::debug;

use crate::KInductionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Step {
    BaseCase,
    ForwardCondition,
    InductiveStep,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::BaseCase, Step::ForwardCondition, Step::InductiveStep];
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::BaseCase => "base case",
            Step::ForwardCondition => "forward condition",
            Step::InductiveStep => "inductive step",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Every verification condition of the step is unsatisfiable.
    Success,
    Failure(Counterexample),
    Unknown,
    /// Base case only: no violation, but a bound other than the induction
    /// loop's was reached, so some executions of the first `k` iterations were
    /// not explored.
    Incomplete,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub step: Step,
    pub k: u32,
    pub outcome: StepOutcome,
}

/// Runs one step at one bound. Shared read-only between workers; each run
/// builds its own program copy, engine and solver.
pub struct StepRunner {
    program: Arc<GotoProgram>,
    pool: Arc<IrepPool>,
    factory: Arc<dyn SolverFactory>,
    properties: PropertySet,
    max_call_depth: u32,
}

impl StepRunner {
    pub fn new(
        program: Arc<GotoProgram>,
        pool: Arc<IrepPool>,
        factory: Arc<dyn SolverFactory>,
        properties: PropertySet,
        max_call_depth: u32,
    ) -> Self {
        Self {
            program,
            pool,
            factory,
            properties,
            max_call_depth,
        }
    }

    /// The function holding the induction loop: the entry function, when it
    /// has exactly one outermost loop. Only that loop is havocked and has its
    /// bound assumed; every other loop and the recursion bound stay unwinding
    /// assertions in all three steps.
    fn induction_loop(&self) -> Result<Option<&str>, KInductionError> {
        let Some(entry) = self.program.function(&self.program.entry) else {
            return Ok(None);
        };
        Ok((entry.outermost_loops()?.len() == 1).then_some(entry.name.as_str()))
    }

    fn unwound(&self, program: &GotoProgram, bound: u32, hypotheses: u32) -> Result<GotoProgram, KInductionError> {
        let Some(target) = self.induction_loop()? else {
            return Ok(unwind_program(program, &UnwindOptions::new(bound))?);
        };
        Ok(unwind_program_by(program, |f| {
            if f.name == target {
                UnwindOptions::new(bound)
                    .with_hypotheses(hypotheses)
                    .with_outer_bound_assumed()
            } else {
                UnwindOptions::new(bound)
            }
        })?)
    }

    pub fn run(&self, step: Step, k: u32) -> Result<StepOutcome, KInductionError> {
        let mut options = SymexOptions {
            unwinding_assertions: true,
            skip_user_assertions: false,
            properties: self.properties.clone(),
            max_call_depth: self.max_call_depth,
        };
        let program = match step {
            Step::BaseCase => self.unwound(&self.program, k, 0)?,
            Step::ForwardCondition => {
                options.skip_user_assertions = true;
                unwind_program(&self.program, &UnwindOptions::new(k))?
            }
            Step::InductiveStep => match self.induction_loop()? {
                Some(target) => {
                    let mut havocked = (*self.program).clone();
                    if let Some(f) = self.program.function(target) {
                        havocked.insert(havoc_loops(f, &self.pool)?);
                    }
                    self.unwound(&havocked, k + 1, k)?
                }
                None => self.unwound(&self.program, k + 1, 0)?,
            },
        };

        let failed = |source| KInductionError::StepFailed { step, k, source };
        let equation = symex(&program, options, self.pool.clone()).map_err(failed)?;
        let outcome = if step == Step::BaseCase {
            // A user violation is a real counterexample even when other paths
            // were cut, so user properties are checked first.
            let mut solver = self.factory.create();
            match check_properties(&equation, solver.as_mut(), |p| !p.is_unwinding()).map_err(failed)? {
                CheckOutcome::Holds => {
                    let mut solver = self.factory.create();
                    match check_properties(&equation, solver.as_mut(), Property::is_unwinding).map_err(failed)? {
                        CheckOutcome::Holds => StepOutcome::Success,
                        CheckOutcome::Violated(_) | CheckOutcome::Unknown => StepOutcome::Incomplete,
                    }
                }
                other => other.into(),
            }
        } else {
            let mut solver = self.factory.create();
            check_equation(&equation, solver.as_mut()).map_err(failed)?.into()
        };
        debug!(%step, k, steps = equation.len(), solver = self.factory.name(), "step checked");
        Ok(outcome)
    }
}

impl From<CheckOutcome> for StepOutcome {
    fn from(outcome: CheckOutcome) -> Self {
        match outcome {
            CheckOutcome::Holds => StepOutcome::Success,
            CheckOutcome::Violated(cex) => StepOutcome::Failure(cex),
            CheckOutcome::Unknown => StepOutcome::Unknown,
        }
    }
}
