//! Bookkeeping for multi-step operations that span independent backends.
//! Each step either completes or fails; completed steps with a compensation
//! are undone in reverse order when a later step fails.

use serde::Serialize;
use std::fmt;
use tracing::{error, info, warn};

/// Final state of a saga
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaOutcome {
    /// Every step completed
    Completed,
    /// A step failed and every completed step was compensated
    RolledBack,
    /// A step failed and the systems no longer agree
    Inconsistent,
}

impl SagaOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaOutcome::Completed => "completed",
            SagaOutcome::RolledBack => "rolled_back",
            SagaOutcome::Inconsistent => "inconsistent",
        }
    }
}

impl fmt::Display for SagaOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step that failed and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedStep {
    pub step: &'static str,
    pub error: String,
}

/// Consistency report of one saga run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SagaReport {
    pub saga: &'static str,
    pub subject: String,
    pub completed: Vec<&'static str>,
    pub failed: Option<FailedStep>,
    pub compensated: Vec<&'static str>,
    /// Resources left behind that an operator must clean up
    pub leftovers: Vec<String>,
    pub outcome: SagaOutcome,
}

impl SagaReport {
    pub fn new(saga: &'static str, subject: impl Into<String>) -> Self {
        Self {
            saga,
            subject: subject.into(),
            completed: Vec::new(),
            failed: None,
            compensated: Vec::new(),
            leftovers: Vec::new(),
            outcome: SagaOutcome::Completed,
        }
    }

    pub fn step_completed(&mut self, step: &'static str) {
        info!(saga = self.saga, subject = %self.subject, step, "Saga step completed");
        self.completed.push(step);
    }

    /// Record the failing step; the outcome is decided by what follows
    pub fn step_failed(&mut self, step: &'static str, error: impl fmt::Display) {
        warn!(saga = self.saga, subject = %self.subject, step, error = %error, "Saga step failed");
        self.failed = Some(FailedStep {
            step,
            error: error.to_string(),
        });
    }

    pub fn compensated(&mut self, step: &'static str) {
        info!(saga = self.saga, subject = %self.subject, step, "Saga step compensated");
        self.compensated.push(step);
        if self.outcome != SagaOutcome::Inconsistent {
            self.outcome = SagaOutcome::RolledBack;
        }
    }

    /// Mark the run inconsistent, naming the resource left behind
    pub fn inconsistent(&mut self, leftover: impl Into<String>) {
        self.leftovers.push(leftover.into());
        self.outcome = SagaOutcome::Inconsistent;
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == SagaOutcome::Completed
    }

    /// Emit the final log line. Inconsistent runs are logged at ERROR so they
    /// reach the error tracker with every detail an operator needs.
    pub fn finish(self) -> Self {
        let failed_step = self.failed.as_ref().map(|f| f.step).unwrap_or("");
        let failure = self.failed.as_ref().map(|f| f.error.as_str()).unwrap_or("");

        match self.outcome {
            SagaOutcome::Completed => info!(
                saga = self.saga,
                subject = %self.subject,
                steps = ?self.completed,
                "Saga completed"
            ),
            SagaOutcome::RolledBack => warn!(
                saga = self.saga,
                subject = %self.subject,
                failed_step,
                failure,
                compensated = ?self.compensated,
                "Saga rolled back"
            ),
            SagaOutcome::Inconsistent => error!(
                saga = self.saga,
                subject = %self.subject,
                failed_step,
                failure,
                completed = ?self.completed,
                compensated = ?self.compensated,
                leftovers = ?self.leftovers,
                "Saga left cross-system state inconsistent"
            ),
        }

        self
    }
}
