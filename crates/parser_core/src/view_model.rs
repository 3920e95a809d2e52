use crate::{Priority, IDLE_ACTIVITY};

/// Status text shown while no connection exists.
pub const NO_PARSER_STATUS: &str = "No parser loaded";

/// Number of queued jobs per priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueCounts {
    counts: [usize; 3],
}

impl QueueCounts {
    pub fn new(low: usize, medium: usize, high: usize) -> Self {
        Self {
            counts: [low, medium, high],
        }
    }

    pub fn get(&self, priority: Priority) -> usize {
        self.counts[priority.index()]
    }

    pub fn set(&mut self, priority: Priority, count: usize) {
        self.counts[priority.index()] = count;
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Disconnected,
    Idle,
    Busy,
}

/// Snapshot of what the status bar shows for a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub activity: Option<String>,
    pub queue: QueueCounts,
}

impl SessionView {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connected(activity: impl Into<String>, queue: QueueCounts) -> Self {
        let activity = activity.into();
        let phase = if activity == IDLE_ACTIVITY && queue.is_empty() {
            SessionPhase::Idle
        } else {
            SessionPhase::Busy
        };
        Self {
            phase,
            activity: Some(activity),
            queue,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == SessionPhase::Idle
    }

    /// Single-line status combining activity and queue sizes.
    pub fn status_line(&self) -> String {
        match &self.activity {
            None => NO_PARSER_STATUS.to_string(),
            Some(activity) => format!(
                "{activity} [queue L:{} M:{} H:{}]",
                self.queue.get(Priority::Low),
                self.queue.get(Priority::Medium),
                self.queue.get(Priority::High)
            ),
        }
    }
}
