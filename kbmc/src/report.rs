#![forbid(unsafe_code)]

use std::fmt::Write as _;

use kbmc_goto::{GotoProgram, Property, PropertySet};
use kbmc_kinduction::{KInductionConfig, Verdict};
use serde::Serialize;

pub const REPORT_SCHEMA: &str = "kbmc.verify/1";

#[derive(Debug, Clone, Serialize)]
pub struct PropertyEntry {
    pub id: String,
    pub comment: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub schema: &'static str,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    pub solver: String,
    pub max_k: u32,
    pub parallel: bool,
    pub properties: Vec<PropertyEntry>,
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl VerifyReport {
    pub fn new(
        input: String,
        config: Option<String>,
        solver: &str,
        program: &GotoProgram,
        selected: &PropertySet,
        settings: &KInductionConfig,
        verdict: Verdict,
    ) -> Self {
        let properties = program
            .functions
            .values()
            .flat_map(|f| f.assertions())
            .filter(|(_, p)| !p.is_unwinding() && selected.contains(p))
            .map(|(instr, p)| PropertyEntry {
                id: p.id.clone(),
                comment: p.comment.clone(),
                location: instr.location.to_string(),
            })
            .collect();
        Self {
            schema: REPORT_SCHEMA,
            input,
            config,
            solver: solver.to_string(),
            max_k: settings.max_k,
            parallel: settings.parallel,
            properties,
            verdict,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}: {} properties checked", self.input, self.properties.len());
        match &self.verdict {
            Verdict::Proved { k, step } => {
                let _ = writeln!(out, "VERIFICATION SUCCESSFUL ({step}, k = {k})");
            }
            Verdict::Refuted { k, counterexample } => {
                let _ = writeln!(out, "Counterexample (k = {k}):");
                for step in &counterexample.trace {
                    let _ = writeln!(out, "  {}: {} = {}", step.location, step.lhs, step.value);
                }
                let _ = writeln!(
                    out,
                    "Violated property {} at {}",
                    describe(&counterexample.property),
                    counterexample.location
                );
                let _ = writeln!(out, "VERIFICATION FAILED");
            }
            Verdict::Unknown { max_k } => {
                let _ = writeln!(out, "VERIFICATION UNKNOWN (no verdict up to k = {max_k})");
            }
        }
        out
    }
}

fn describe(p: &Property) -> String {
    if p.comment.is_empty() {
        p.id.clone()
    } else {
        format!("{} ({})", p.id, p.comment)
    }
}
