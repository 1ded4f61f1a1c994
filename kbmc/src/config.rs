#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use kbmc_kinduction::KInductionConfig;
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE: &str = "kbmc.toml";

#[derive(Debug, Error, Diagnostic)]
#[error("config error: {message}")]
#[diagnostic(code(kbmc::config))]
pub struct ConfigError {
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub kinduction: KInductionSection,
    pub symex: SymexSection,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KInductionSection {
    pub max_k: Option<u32>,
    pub parallel: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SymexSection {
    pub max_call_depth: Option<u32>,
}

/// Command-line values; each one set here wins over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub max_k: Option<u32>,
    pub sequential: bool,
}

impl FileConfig {
    pub fn parse(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError {
            message: format!("failed to parse {}: {e}", origin.display()),
        })
    }

    pub fn resolve(&self, cli: &Overrides) -> KInductionConfig {
        let defaults = KInductionConfig::default();
        KInductionConfig {
            max_k: cli.max_k.or(self.kinduction.max_k).unwrap_or(defaults.max_k),
            parallel: !cli.sequential && self.kinduction.parallel.unwrap_or(defaults.parallel),
            max_call_depth: self.symex.max_call_depth.unwrap_or(defaults.max_call_depth),
        }
    }
}

pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut cur = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };
    loop {
        let candidate = cur.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        cur = cur.parent()?.to_path_buf();
    }
}

/// Reads `explicit` if given, else the nearest `kbmc.toml` above `input`.
/// No file at all means defaults.
pub fn load_config(input: &Path, explicit: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(&input.canonicalize().unwrap_or_else(|_| input.to_path_buf())),
    };
    let Some(path) = path else {
        return Ok((FileConfig::default(), None));
    };
    let raw = fs::read_to_string(&path).map_err(|e| ConfigError {
        message: format!("failed to read {}: {e}", path.display()),
    })?;
    let parsed = FileConfig::parse(&raw, &path)?;
    Ok((parsed, Some(path)))
}
