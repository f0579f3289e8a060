//! Outcome model: what a worker records for a finished job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// Result classification of one job execution.
///
/// Serialized as `{"status": "succeeded", "output": ...}` /
/// `{"status": "failed", "reason": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded { output: String },
    Failed { reason: String },
}

impl JobOutcome {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self::Succeeded {
            output: output.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// What ends up in the `ResultStore` and in the job's completion channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub worker_id: usize,
    pub outcome: JobOutcome,
    pub elapsed: Duration,
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    pub fn new(job_id: JobId, worker_id: usize, outcome: JobOutcome, elapsed: Duration) -> Self {
        Self {
            job_id,
            worker_id,
            outcome,
            elapsed,
            finished_at: Utc::now(),
        }
    }

    /// Handler output, or `None` if the job failed.
    pub fn output(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Succeeded { output } => Some(output),
            JobOutcome::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(JobOutcome::failed("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "reason": "boom"}));
    }

    #[test]
    fn output_is_none_for_failures() {
        let ok = JobResult::new(JobId::new(1), 0, JobOutcome::succeeded("done"), Duration::ZERO);
        let ng = JobResult::new(JobId::new(2), 0, JobOutcome::failed("x"), Duration::ZERO);
        assert_eq!(ok.output(), Some("done"));
        assert_eq!(ng.output(), None);
        assert!(ok.outcome.is_success());
        assert!(!ng.outcome.is_success());
    }
}
