#![forbid(unsafe_code)]

use kbmc_goto::Property;
use kbmc_irep::{Expr, SourceLocation};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{Equation, Solver, SolverResult, SsaStepKind, SymexError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TraceStep {
    pub location: SourceLocation,
    pub lhs: String,
    pub value: String,
}

/// A violated property and the assignments leading to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Counterexample {
    pub property: Property,
    pub location: SourceLocation,
    pub trace: Vec<TraceStep>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Holds,
    Violated(Counterexample),
    Unknown,
}

/// Loads the equation's definitions into `solver` and checks each
/// verification condition in step order. The first satisfiable violation
/// wins; otherwise any undecided VC makes the whole check `Unknown`.
pub fn check_equation(equation: &Equation, solver: &mut dyn Solver) -> Result<CheckOutcome, SymexError> {
    check_properties(equation, solver, |_| true)
}

/// [`check_equation`] restricted to the VCs whose property `select` accepts.
pub fn check_properties(
    equation: &Equation,
    solver: &mut dyn Solver,
    select: impl Fn(&Property) -> bool,
) -> Result<CheckOutcome, SymexError> {
    for (lhs, rhs) in equation.assignments() {
        solver.assume(&Expr::eq(lhs.clone(), rhs.clone())?)?;
    }

    let vcs: Vec<_> = equation
        .verification_conditions()
        .into_iter()
        .filter(|vc| select(&vc.property))
        .collect();
    debug!(vcs = vcs.len(), steps = equation.len(), "checking equation");

    let mut undecided = false;
    for vc in vcs {
        let violation = Expr::and(vc.guard.clone(), Expr::not(vc.condition.clone())?)?;
        if violation.is_false() {
            continue;
        }
        match solver.check(&[violation])? {
            SolverResult::Unsat => {}
            SolverResult::Unknown => {
                warn!(property = %vc.property.id, at = %vc.location, "solver could not decide property");
                undecided = true;
            }
            SolverResult::Sat => {
                let model = solver.model().unwrap_or_default();
                let trace = equation
                    .path_steps(vc.path, vc.step)
                    .into_iter()
                    .filter_map(|s| match &s.kind {
                        SsaStepKind::Assignment { lhs, rhs } => {
                            let name = lhs.to_string();
                            let value = model.get(&name).unwrap_or(rhs).to_string();
                            Some(TraceStep {
                                location: s.location.clone(),
                                lhs: name,
                                value,
                            })
                        }
                        _ => None,
                    })
                    .collect();
                return Ok(CheckOutcome::Violated(Counterexample {
                    property: vc.property,
                    location: vc.location,
                    trace,
                }));
            }
        }
    }
    Ok(if undecided {
        CheckOutcome::Unknown
    } else {
        CheckOutcome::Holds
    })
}
