use std::time::Duration;

use crate::JobId;

/// Activity string reported once the worker has drained its queue.
pub const IDLE_ACTIVITY: &str = "Idle";

/// Result document of a single-word trace.
pub type TraceDocument = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Started,
    Running,
    Finished,
}

/// One unit of scheduler activity, raised on the worker thread.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    /// Job this report belongs to; `None` for the idle report.
    pub job_id: Option<JobId>,
    pub description: String,
    pub phase: TaskPhase,
    /// Elapsed time, set on `Finished`.
    pub duration: Option<Duration>,
    /// Message to show the user once.
    pub notification: Option<String>,
    /// Trace result, only on the `Finished` report of a trace job that
    /// produced one.
    pub details: Option<TraceDocument>,
}

impl TaskReport {
    pub fn started(job_id: JobId, description: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id),
            description: description.into(),
            phase: TaskPhase::Started,
            duration: None,
            notification: None,
            details: None,
        }
    }

    pub fn running(
        job_id: JobId,
        description: impl Into<String>,
        notification: impl Into<String>,
    ) -> Self {
        Self {
            phase: TaskPhase::Running,
            notification: Some(notification.into()),
            ..Self::started(job_id, description)
        }
    }

    pub fn finished(job_id: JobId, description: impl Into<String>, duration: Duration) -> Self {
        Self {
            phase: TaskPhase::Finished,
            duration: Some(duration),
            ..Self::started(job_id, description)
        }
    }

    pub fn with_details(mut self, details: Option<TraceDocument>) -> Self {
        self.details = details;
        self
    }

    pub fn idle() -> Self {
        Self {
            job_id: None,
            description: IDLE_ACTIVITY.to_string(),
            phase: TaskPhase::Finished,
            duration: None,
            notification: None,
            details: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.job_id.is_none() && self.description == IDLE_ACTIVITY
    }
}
