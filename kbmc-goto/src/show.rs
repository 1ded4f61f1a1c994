#![forbid(unsafe_code)]

use std::fmt;

use crate::{GotoFunction, GotoProgram, InstrId, InstrKind, Instruction, PropertyClass};

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for InstrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrKind::Assign { lhs, rhs } => write!(f, "ASSIGN {lhs} := {rhs}"),
            InstrKind::Goto { target } => write!(f, "GOTO {target}"),
            InstrKind::CondGoto { cond, target } => write!(f, "IF {cond} GOTO {target}"),
            InstrKind::FunctionCall { lhs, function, args } => match lhs {
                Some(lhs) => write!(f, "CALL {lhs} := {function}({})", join(args)),
                None => write!(f, "CALL {function}({})", join(args)),
            },
            InstrKind::Return { value: Some(v) } => write!(f, "RETURN {v}"),
            InstrKind::Return { value: None } => write!(f, "RETURN"),
            InstrKind::Assume { cond } => write!(f, "ASSUME {cond}"),
            InstrKind::Assert { cond, property } => {
                let tag = match property.class {
                    PropertyClass::User => "ASSERT",
                    PropertyClass::UnwindingAssertion => "UNWIND-ASSERT",
                };
                write!(f, "{tag} {cond} // {}", property.id)?;
                if !property.comment.is_empty() {
                    write!(f, ": {}", property.comment)?;
                }
                Ok(())
            }
            InstrKind::CatchPush { exceptions, targets } => {
                let pairs = exceptions
                    .iter()
                    .zip(targets)
                    .map(|(e, t)| format!("{e}->{t}"))
                    .collect::<Vec<_>>();
                write!(f, "CATCH-PUSH [{}]", pairs.join(", "))
            }
            InstrKind::CatchPop => write!(f, "CATCH-POP"),
            InstrKind::Throw { exceptions } => write!(f, "THROW [{}]", exceptions.join(", ")),
            InstrKind::Skip => write!(f, "SKIP"),
            InstrKind::EndFunction => write!(f, "END-FUNCTION"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6}: {}", self.id.to_string(), self.kind)
    }
}

impl fmt::Display for GotoFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}({}){}", self.name, join(&self.params), if self.unwound { " [unwound]" } else { "" })?;
        if !self.has_body() {
            return writeln!(f, "  <no body>");
        }
        for instr in &self.body {
            if self.is_loop_head(instr.id) {
                writeln!(f, "  // loop head")?;
            }
            writeln!(f, "  {instr}")?;
        }
        Ok(())
    }
}

impl fmt::Display for GotoProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// entry: {}", self.entry)?;
        for function in self.functions.values() {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}
