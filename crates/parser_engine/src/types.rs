use parser_core::{AnalysisId, JobId, TaskReport, WordformId};

use crate::EngineFault;

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    Report(TaskReport),
    /// A wordform update job finished and its analyses are current.
    WordformUpdated(WordformUpdate),
    /// The engine failed; the worker has stopped taking jobs.
    Faulted(EngineFault),
}

/// Completion of one wordform update job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordformUpdate {
    pub wordform: WordformId,
    pub job_id: JobId,
}

/// "Try a Word" request for a single surface form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRequest {
    pub form: String,
    pub do_trace: bool,
    /// Restrict tracing to these analyses.
    pub restrict_to: Option<Vec<AnalysisId>>,
}

impl TraceRequest {
    pub fn new(form: impl Into<String>, do_trace: bool) -> Self {
        Self {
            form: form.into(),
            do_trace,
            restrict_to: None,
        }
    }

    pub fn restricted_to(mut self, analyses: Vec<AnalysisId>) -> Self {
        self.restrict_to = Some(analyses);
        self
    }
}
