#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Largest bound tried when nothing else is configured.
pub const MAX_STEPS: u32 = 50;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KInductionConfig {
    pub max_k: u32,
    /// Run the three steps as concurrent workers.
    pub parallel: bool,
    pub max_call_depth: u32,
}

impl Default for KInductionConfig {
    fn default() -> Self {
        Self {
            max_k: MAX_STEPS,
            parallel: true,
            max_call_depth: 64,
        }
    }
}
