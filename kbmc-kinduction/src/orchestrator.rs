#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use kbmc_goto::{GotoProgram, PropertySet};
use kbmc_irep::IrepPool;
use kbmc_symex::SolverFactory;
use tracing::{info, warn};

use crate::{Coordinator, KInductionConfig, KInductionError, Step, StepOutcome, StepReport, StepRunner, Verdict};

enum WorkerMessage {
    Report(StepReport),
    Done(Step),
    Failed(KInductionError),
}

pub struct KInduction {
    program: Arc<GotoProgram>,
    pool: Arc<IrepPool>,
    factory: Arc<dyn SolverFactory>,
    config: KInductionConfig,
}

impl KInduction {
    pub fn new(
        program: Arc<GotoProgram>,
        pool: Arc<IrepPool>,
        factory: Arc<dyn SolverFactory>,
        config: KInductionConfig,
    ) -> Self {
        Self {
            program,
            pool,
            factory,
            config,
        }
    }

    pub fn config(&self) -> &KInductionConfig {
        &self.config
    }

    /// Tries bounds `1..=max_k` until the properties are proved or refuted.
    pub fn run(&self, properties: &PropertySet, max_k: u32) -> Result<Verdict, KInductionError> {
        let runner = Arc::new(StepRunner::new(
            self.program.clone(),
            self.pool.clone(),
            self.factory.clone(),
            properties.clone(),
            self.config.max_call_depth,
        ));
        let verdict = if self.config.parallel {
            run_parallel(runner, max_k)?
        } else {
            run_sequential(&runner, max_k)?
        };
        match &verdict {
            Verdict::Proved { k, step } => info!(k, %step, "verification successful"),
            Verdict::Refuted { k, counterexample } => {
                info!(k, property = %counterexample.property.id, "verification failed")
            }
            Verdict::Unknown { max_k } => info!(max_k, "verification inconclusive"),
        }
        Ok(verdict)
    }
}

fn log_report(report: &StepReport) {
    let result = match &report.outcome {
        StepOutcome::Success => "success",
        StepOutcome::Failure(_) => "failure",
        StepOutcome::Unknown => "unknown",
        StepOutcome::Incomplete => "incomplete",
    };
    info!(step = %report.step, k = report.k, result, "step finished");
}

/// A worker stops after this outcome; later bounds cannot change the verdict.
fn is_final(step: Step, outcome: &StepOutcome) -> bool {
    match step {
        Step::BaseCase => matches!(outcome, StepOutcome::Failure(_) | StepOutcome::Unknown),
        Step::ForwardCondition | Step::InductiveStep => outcome.is_success(),
    }
}

fn run_sequential(runner: &StepRunner, max_k: u32) -> Result<Verdict, KInductionError> {
    let mut coordinator = Coordinator::new(max_k);
    for k in 1..=max_k {
        for step in Step::ALL {
            if coordinator.is_exhausted(step) {
                continue;
            }
            let outcome = runner.run(step, k)?;
            let report = StepReport { step, k, outcome };
            log_report(&report);
            let done = is_final(step, &report.outcome);
            if let Some(verdict) = coordinator.record(report) {
                return Ok(verdict);
            }
            if done {
                if let Some(verdict) = coordinator.exhaust(step) {
                    return Ok(verdict);
                }
            }
        }
    }
    Ok(coordinator.finish())
}

fn run_parallel(runner: Arc<StepRunner>, max_k: u32) -> Result<Verdict, KInductionError> {
    let (tx, rx) = mpsc::channel();
    let stop = Arc::new(AtomicBool::new(false));

    for step in Step::ALL {
        let tx = tx.clone();
        let stop = stop.clone();
        let runner = runner.clone();
        rayon::spawn(move || {
            for k in 1..=max_k {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                match runner.run(step, k) {
                    Ok(outcome) => {
                        let done = is_final(step, &outcome);
                        if tx.send(WorkerMessage::Report(StepReport { step, k, outcome })).is_err() || done {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(WorkerMessage::Failed(e));
                        return;
                    }
                }
            }
            let _ = tx.send(WorkerMessage::Done(step));
        });
    }
    drop(tx);

    let mut coordinator = Coordinator::new(max_k);
    let result = loop {
        let Ok(message) = rx.recv() else {
            // Every sender is gone; a worker that never said Done died.
            if let Some(step) = Step::ALL.into_iter().find(|s| !coordinator.is_exhausted(*s)) {
                warn!(%step, "worker disappeared");
                break Err(KInductionError::WorkerLost { step });
            }
            break Ok(coordinator.finish());
        };
        let verdict = match message {
            WorkerMessage::Report(report) => {
                log_report(&report);
                coordinator.record(report)
            }
            WorkerMessage::Done(step) => coordinator.exhaust(step),
            WorkerMessage::Failed(e) => break Err(e),
        };
        if let Some(verdict) = verdict {
            break Ok(verdict);
        }
    };
    stop.store(true, Ordering::Release);
    result
}
