//! Per-resolution diagnostics.

use std::fmt;

use crate::models::PriceSource;

/// A step of the resolution state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    CacheCheck,
    SessionEnsure,
    Warm,
    Tier(PriceSource),
    Backup,
    StaleCheck,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::CacheCheck => f.write_str("CACHE"),
            Stage::SessionEnsure => f.write_str("SESSION"),
            Stage::Warm => f.write_str("WARM"),
            Stage::Tier(source) => write!(f, "{}", source),
            Stage::Backup => f.write_str("BACKUP"),
            Stage::StaleCheck => f.write_str("STALE"),
        }
    }
}

/// Outcome of a single stage.
#[derive(Clone, Debug, PartialEq)]
pub enum StageOutcome {
    Success,
    /// The stage did not apply (fresh miss, tier not valid for the offset,
    /// no backup configured).
    Skipped(String),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

/// Ordered record of every stage one resolution went through.
#[derive(Clone, Debug, Default)]
pub struct ResolutionTrace {
    pub records: Vec<StageRecord>,
}

impl ResolutionTrace {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn record_success(&mut self, stage: Stage) {
        self.push(stage, StageOutcome::Success);
    }

    pub fn record_skip(&mut self, stage: Stage, reason: impl Into<String>) {
        self.push(stage, StageOutcome::Skipped(reason.into()));
    }

    pub fn record_error(&mut self, stage: Stage, error: impl fmt::Display) {
        self.push(stage, StageOutcome::Failed(error.to_string()));
    }

    fn push(&mut self, stage: Stage, outcome: StageOutcome) {
        self.records.push(StageRecord { stage, outcome });
    }

    /// Stages in the order they ran.
    pub fn stages(&self) -> Vec<Stage> {
        self.records.iter().map(|r| r.stage).collect()
    }

    pub fn attempted(&self, stage: Stage) -> bool {
        self.records
            .iter()
            .any(|r| r.stage == stage && !matches!(r.outcome, StageOutcome::Skipped(_)))
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.records
            .iter()
            .map(|r| match &r.outcome {
                StageOutcome::Success => format!("{}: SUCCESS", r.stage),
                StageOutcome::Skipped(reason) => format!("{}: SKIPPED ({})", r.stage, reason),
                StageOutcome::Failed(err) => format!("{}: ERROR ({})", r.stage, err),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
