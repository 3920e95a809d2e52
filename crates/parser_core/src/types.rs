use std::fmt;

/// Identifier handed out by the scheduler for every queued job.
pub type JobId = u64;

/// Scheduling weight. Only controls the order in which queued jobs are
/// picked; a job already running is never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// All priorities, highest first, in the order the worker services them.
    pub const DESCENDING: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Dense index, `Low` = 0, for per-priority arrays.
    pub fn index(self) -> usize {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WordformId(pub u64);

impl fmt::Display for WordformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wf#{}", self.0)
    }
}

/// Morpheme-analysis identifier used to restrict a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnalysisId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextId(pub String);

impl fmt::Display for TextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A surface word form tracked by the linguistic database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Wordform {
    pub id: WordformId,
    pub form: String,
}

impl Wordform {
    pub fn new(id: u64, form: impl Into<String>) -> Self {
        Self {
            id: WordformId(id),
            form: form.into(),
        }
    }
}
