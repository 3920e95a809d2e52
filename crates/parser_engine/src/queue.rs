use std::collections::VecDeque;

use parser_core::{JobId, Priority, Wordform, WordformId};
use parser_logging::parser_trace;

use crate::TraceRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JobKind {
    Trace(TraceRequest),
    UpdateWordform(Wordform),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) kind: JobKind,
}

impl Job {
    fn wordform_id(&self) -> Option<WordformId> {
        match &self.kind {
            JobKind::UpdateWordform(wordform) => Some(wordform.id),
            JobKind::Trace(_) => None,
        }
    }

    pub(crate) fn description(&self) -> String {
        match &self.kind {
            JobKind::Trace(request) if request.do_trace => format!("Tracing '{}'", request.form),
            JobKind::Trace(request) => format!("Trying '{}'", request.form),
            JobKind::UpdateWordform(wordform) => format!("Updating '{}'", wordform.form),
        }
    }
}

/// What happened to a wordform update submission. In every case the job
/// with the returned id has not started yet and will parse the submitted
/// form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued(JobId),
    /// Already waiting at the same or a higher priority; its form was
    /// replaced.
    AlreadyQueued(JobId),
    /// Moved up from a lower priority queue.
    Promoted { job_id: JobId, from: Priority },
}

impl Enqueued {
    pub fn job_id(&self) -> JobId {
        match *self {
            Enqueued::Queued(job_id) | Enqueued::AlreadyQueued(job_id) => job_id,
            Enqueued::Promoted { job_id, .. } => job_id,
        }
    }
}

/// One FIFO lane per priority. Wordform updates are unique across lanes.
#[derive(Debug, Default)]
pub(crate) struct JobQueue {
    lanes: [VecDeque<Job>; 3],
    next_id: JobId,
}

impl JobQueue {
    pub(crate) fn allocate_id(&mut self) -> JobId {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn push_trace(&mut self, request: TraceRequest) -> JobId {
        let id = self.allocate_id();
        self.lanes[Priority::High.index()].push_back(Job {
            id,
            kind: JobKind::Trace(request),
        });
        id
    }

    pub(crate) fn push_wordform(&mut self, wordform: Wordform, priority: Priority) -> Enqueued {
        if let Some((queued_at, position)) = self.find_wordform(wordform.id) {
            if queued_at >= priority {
                let job = &mut self.lanes[queued_at.index()][position];
                parser_trace!("Wordform {} already queued as job {}", wordform.id, job.id);
                job.kind = JobKind::UpdateWordform(wordform);
                return Enqueued::AlreadyQueued(job.id);
            }
            if let Some(mut job) = self.lanes[queued_at.index()].remove(position) {
                parser_trace!("Promoting job {} from {} to {}", job.id, queued_at, priority);
                job.kind = JobKind::UpdateWordform(wordform);
                let job_id = job.id;
                self.lanes[priority.index()].push_back(job);
                return Enqueued::Promoted {
                    job_id,
                    from: queued_at,
                };
            }
        }

        let id = self.allocate_id();
        self.lanes[priority.index()].push_back(Job {
            id,
            kind: JobKind::UpdateWordform(wordform),
        });
        Enqueued::Queued(id)
    }

    /// Next job from the highest non-empty lane.
    pub(crate) fn pop(&mut self) -> Option<Job> {
        Priority::DESCENDING
            .iter()
            .find_map(|priority| self.lanes[priority.index()].pop_front())
    }

    pub(crate) fn len(&self, priority: Priority) -> usize {
        self.lanes[priority.index()].len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lanes.iter().all(VecDeque::is_empty)
    }

    pub(crate) fn clear(&mut self) {
        self.lanes.iter_mut().for_each(VecDeque::clear);
    }

    fn find_wordform(&self, id: WordformId) -> Option<(Priority, usize)> {
        Priority::DESCENDING.iter().find_map(|&priority| {
            self.lanes[priority.index()]
                .iter()
                .position(|job| job.wordform_id() == Some(id))
                .map(|position| (priority, position))
        })
    }
}
