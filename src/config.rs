// src/config.rs

use serde::Deserialize;
use std::path::PathBuf;

use crate::payroll::RetirementPolicy;

/// Runtime configuration, read from `PAIE_*` environment variables (a local
/// `.env` file is honored). Everything has a sensible default so the CLI
/// works with flags alone.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_retirement_age")]
    pub retirement_age: u32,
    #[serde(default = "default_retirement_lookahead_days")]
    pub retirement_lookahead_days: i64,
    /// Default roster to load when `--employees` is not given.
    #[serde(default)]
    pub employees_file: Option<PathBuf>,
    /// Default advance book to load when `--advances` is not given.
    #[serde(default)]
    pub advances_file: Option<PathBuf>,
}

fn default_retirement_age() -> u32 {
    60
}

fn default_retirement_lookahead_days() -> i64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retirement_age: default_retirement_age(),
            retirement_lookahead_days: default_retirement_lookahead_days(),
            employees_file: None,
            advances_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        envy::prefixed("PAIE_").from_env::<Config>()
    }

    pub fn retirement_policy(&self) -> RetirementPolicy {
        RetirementPolicy {
            age_years: self.retirement_age,
            lookahead_days: self.retirement_lookahead_days,
        }
    }
}
