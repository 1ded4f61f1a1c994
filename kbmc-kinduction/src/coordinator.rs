#![forbid(unsafe_code)]

//! Combines step reports into one verdict.
//!
//! Levels are decided strictly in increasing `k`, and a level is only decided
//! once everything that could change its answer is known. The verdict is
//! therefore the same whatever order the workers report in.

use std::collections::{BTreeMap, BTreeSet};

use kbmc_symex::Counterexample;
use serde::Serialize;

use crate::{Step, StepOutcome, StepReport};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Proved { k: u32, step: Step },
    Refuted { k: u32, counterexample: Counterexample },
    /// `max_k` is the last bound examined.
    Unknown { max_k: u32 },
}

#[derive(Debug)]
pub struct Coordinator {
    max_k: u32,
    next: u32,
    results: BTreeMap<(Step, u32), StepOutcome>,
    /// Steps whose worker will not report again.
    exhausted: BTreeSet<Step>,
}

enum Known<'a> {
    Yes(&'a StepOutcome),
    Never,
    Pending,
}

impl Coordinator {
    pub fn new(max_k: u32) -> Self {
        Self {
            max_k,
            next: 1,
            results: BTreeMap::new(),
            exhausted: BTreeSet::new(),
        }
    }

    /// Lowest bound not yet decided.
    pub fn level(&self) -> u32 {
        self.next
    }

    pub fn is_exhausted(&self, step: Step) -> bool {
        self.exhausted.contains(&step)
    }

    pub fn record(&mut self, report: StepReport) -> Option<Verdict> {
        self.results.insert((report.step, report.k), report.outcome);
        self.decide()
    }

    pub fn exhaust(&mut self, step: Step) -> Option<Verdict> {
        self.exhausted.insert(step);
        self.decide()
    }

    /// Verdict once no more reports will arrive.
    pub fn finish(mut self) -> Verdict {
        self.exhausted.extend(Step::ALL);
        self.decide().unwrap_or(Verdict::Unknown { max_k: self.max_k })
    }

    fn known(&self, step: Step, k: u32) -> Known<'_> {
        match self.results.get(&(step, k)) {
            Some(outcome) => Known::Yes(outcome),
            None if self.exhausted.contains(&step) => Known::Never,
            None => Known::Pending,
        }
    }

    /// Whether `step` succeeded at some bound up to `k`; `None` while a
    /// report that could decide it is outstanding. A success at a smaller
    /// bound carries over: more unwinding only strengthens a step.
    fn succeeded_by(&self, step: Step, k: u32) -> Option<bool> {
        let mut pending = false;
        for j in 1..=k {
            match self.known(step, j) {
                Known::Yes(StepOutcome::Success) => return Some(true),
                Known::Pending => pending = true,
                Known::Yes(_) | Known::Never => {}
            }
        }
        if pending { None } else { Some(false) }
    }

    fn decide(&mut self) -> Option<Verdict> {
        loop {
            let k = self.next;
            if k > self.max_k {
                return Some(Verdict::Unknown { max_k: self.max_k });
            }
            match self.known(Step::BaseCase, k) {
                Known::Pending => return None,
                Known::Never | Known::Yes(StepOutcome::Unknown) => return Some(Verdict::Unknown { max_k: k }),
                Known::Yes(StepOutcome::Failure(cex)) => {
                    return Some(Verdict::Refuted {
                        k,
                        counterexample: cex.clone(),
                    });
                }
                Known::Yes(StepOutcome::Incomplete) => {
                    self.next += 1;
                    continue;
                }
                Known::Yes(StepOutcome::Success) => {}
            }

            // The forward condition wins ties so the verdict does not depend
            // on which worker finished first.
            for step in [Step::ForwardCondition, Step::InductiveStep] {
                match self.succeeded_by(step, k) {
                    Some(true) => return Some(Verdict::Proved { k, step }),
                    Some(false) => {}
                    None => return None,
                }
            }
            self.next += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use kbmc_goto::Property;
    use kbmc_irep::SourceLocation;

    use super::*;

    fn cex() -> Counterexample {
        Counterexample {
            property: Property::user("main.1", "x > 0"),
            location: SourceLocation::new("t.c", 3, 1, "main"),
            trace: Vec::new(),
        }
    }

    fn report(step: Step, k: u32, outcome: StepOutcome) -> StepReport {
        StepReport { step, k, outcome }
    }

    fn fail() -> StepOutcome {
        StepOutcome::Failure(cex())
    }

    #[test]
    fn base_failure_beats_a_later_inductive_proof() {
        let mut c = Coordinator::new(10);
        assert_eq!(c.record(report(Step::InductiveStep, 5, StepOutcome::Success)), None);
        for k in 1..=4 {
            assert_eq!(c.record(report(Step::InductiveStep, k, fail())), None);
            assert_eq!(c.record(report(Step::ForwardCondition, k, fail())), None);
        }
        assert_eq!(c.record(report(Step::BaseCase, 3, fail())), None);
        assert_eq!(c.record(report(Step::BaseCase, 2, StepOutcome::Success)), None);
        let v = c.record(report(Step::BaseCase, 1, StepOutcome::Success));
        assert_eq!(
            v,
            Some(Verdict::Refuted {
                k: 3,
                counterexample: cex(),
            })
        );
    }

    #[test]
    fn forward_condition_proves_once_base_case_caught_up() {
        let mut c = Coordinator::new(50);
        assert_eq!(c.record(report(Step::ForwardCondition, 4, StepOutcome::Success)), None);
        for k in 1..=3 {
            assert_eq!(c.record(report(Step::ForwardCondition, k, fail())), None);
        }
        assert_eq!(c.exhaust(Step::InductiveStep), None);
        let mut verdict = None;
        for k in 1..=10 {
            verdict = verdict.or(c.record(report(Step::BaseCase, k, StepOutcome::Success)));
        }
        assert_eq!(
            verdict,
            Some(Verdict::Proved {
                k: 4,
                step: Step::ForwardCondition,
            })
        );
    }

    #[test]
    fn completion_order_does_not_matter() {
        let reports = vec![
            report(Step::BaseCase, 1, StepOutcome::Success),
            report(Step::ForwardCondition, 1, fail()),
            report(Step::InductiveStep, 1, fail()),
            report(Step::BaseCase, 2, StepOutcome::Success),
            report(Step::ForwardCondition, 2, fail()),
            report(Step::InductiveStep, 2, StepOutcome::Success),
            report(Step::BaseCase, 3, fail()),
        ];
        let run = |order: Vec<StepReport>| {
            let mut c = Coordinator::new(10);
            order.into_iter().find_map(|r| c.record(r))
        };
        let expected = Some(Verdict::Proved {
            k: 2,
            step: Step::InductiveStep,
        });
        assert_eq!(run(reports.clone()), expected);
        assert_eq!(run(reports.into_iter().rev().collect()), expected);
    }

    #[test]
    fn unknown_base_case_or_exhaustion_is_unknown() {
        let mut c = Coordinator::new(10);
        assert_eq!(
            c.record(report(Step::BaseCase, 1, StepOutcome::Unknown)),
            Some(Verdict::Unknown { max_k: 1 })
        );

        let mut c = Coordinator::new(2);
        for k in 1..=2 {
            c.record(report(Step::BaseCase, k, StepOutcome::Success));
            c.record(report(Step::ForwardCondition, k, fail()));
            c.record(report(Step::InductiveStep, k, StepOutcome::Unknown));
        }
        assert_eq!(c.finish(), Verdict::Unknown { max_k: 2 });
    }

    #[test]
    fn incomplete_base_case_defers_to_a_larger_bound() {
        let mut c = Coordinator::new(10);
        for k in 1..=3 {
            assert_eq!(c.record(report(Step::ForwardCondition, k, fail())), None);
        }
        assert_eq!(c.record(report(Step::InductiveStep, 1, fail())), None);
        assert_eq!(c.record(report(Step::InductiveStep, 2, StepOutcome::Success)), None);
        assert_eq!(c.exhaust(Step::InductiveStep), None);
        assert_eq!(c.record(report(Step::BaseCase, 1, StepOutcome::Incomplete)), None);
        // The inductive step holds at 2, but the base case has not covered it.
        assert_eq!(c.record(report(Step::BaseCase, 2, StepOutcome::Incomplete)), None);
        assert_eq!(c.level(), 3);
        assert_eq!(
            c.record(report(Step::BaseCase, 3, StepOutcome::Success)),
            Some(Verdict::Proved {
                k: 3,
                step: Step::InductiveStep,
            })
        );
    }

    #[test]
    fn incomplete_base_case_never_proves() {
        let mut c = Coordinator::new(2);
        for k in 1..=2 {
            c.record(report(Step::BaseCase, k, StepOutcome::Incomplete));
            c.record(report(Step::InductiveStep, k, StepOutcome::Success));
        }
        c.exhaust(Step::ForwardCondition);
        assert_eq!(c.finish(), Verdict::Unknown { max_k: 2 });
    }
}
