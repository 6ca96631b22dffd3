use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which walker drives a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Walk the whole paginated index.
    Full,
    /// Only shows changed since the stored watermark.
    Incremental,
}

impl RunMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::Incremental => "incremental",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(RunMode::Full),
            "incremental" => Ok(RunMode::Incremental),
            other => Err(format!("unknown run mode \"{other}\"")),
        }
    }
}

/// What started a run. Recorded on the ingest-run ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Cli,
    Api,
    Schedule,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Cli => "cli",
            TriggerSource::Api => "api",
            TriggerSource::Schedule => "schedule",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_mode_parses_its_own_display() {
        for mode in [RunMode::Full, RunMode::Incremental] {
            assert_eq!(mode.to_string().parse::<RunMode>().unwrap(), mode);
        }
    }

    #[test]
    fn run_mode_rejects_unknown() {
        assert!("weekly".parse::<RunMode>().is_err());
    }

    #[test]
    fn run_mode_serializes_lowercase() {
        let json = serde_json::to_string(&RunMode::Incremental).unwrap();
        assert_eq!(json, "\"incremental\"");
    }
}
