//! Parser core: shared data types and pure session helpers.
mod event;
mod report;
mod tracker;
mod types;
mod view_model;

pub use event::SessionEvent;
pub use report::{TaskPhase, TaskReport, TraceDocument, IDLE_ACTIVITY};
pub use tracker::WordformTracker;
pub use types::{AnalysisId, JobId, Priority, TextId, Wordform, WordformId};
pub use view_model::{QueueCounts, SessionPhase, SessionView, NO_PARSER_STATUS};
