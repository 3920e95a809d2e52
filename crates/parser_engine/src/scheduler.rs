use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parser_core::{JobId, Priority, TaskReport, Wordform};
use parser_logging::{parser_debug, parser_error, parser_info};

use crate::queue::{Enqueued, Job, JobKind, JobQueue};
use crate::{
    EngineFault, ParseEngine, SchedulerError, SchedulerEvent, SchedulerSink, SinkId, TraceRequest,
    WordformUpdate,
};

const RELOAD_DESCRIPTION: &str = "Loading grammar and lexicon";

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub worker_name: String,
    /// Load grammar and lexicon before the first job.
    pub load_on_start: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            worker_name: "parser-worker".to_string(),
            load_on_start: true,
        }
    }
}

#[derive(Debug, Default)]
struct WorkerState {
    queue: JobQueue,
    reload_requested: bool,
    /// Worker is executing a job or announcing idle.
    busy: bool,
    idle_pending: bool,
    shutdown: bool,
    fault: Option<EngineFault>,
}

impl WorkerState {
    fn ensure_accepting(&self) -> Result<(), SchedulerError> {
        if self.shutdown {
            return Err(SchedulerError::Disposed);
        }
        if let Some(fault) = &self.fault {
            return Err(SchedulerError::Faulted(fault.clone()));
        }
        Ok(())
    }

    fn is_settled(&self) -> bool {
        if self.busy || self.idle_pending {
            return false;
        }
        self.shutdown
            || self.fault.is_some()
            || (self.queue.is_empty() && !self.reload_requested)
    }
}

struct Shared {
    state: Mutex<WorkerState>,
    /// Signals the worker that work arrived or shutdown was requested.
    work_available: Condvar,
    /// Signals `wait_idle` callers.
    settled: Condvar,
    sinks: Mutex<Vec<(SinkId, Arc<dyn SchedulerSink>)>>,
    next_sink_id: AtomicU64,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SchedulerEvent) {
        let sinks: Vec<Arc<dyn SchedulerSink>> = self
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, sink)| Arc::clone(sink))
            .collect();
        for sink in sinks {
            sink.emit(event.clone());
        }
    }
}

enum Work {
    Reload(JobId),
    Run(Job),
    AnnounceIdle,
    Stop,
}

/// Priority job queue drained by a single dedicated worker thread.
pub struct ParserScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ParserScheduler {
    pub fn start(
        engine: Box<dyn ParseEngine>,
        settings: SchedulerSettings,
    ) -> Result<Self, SchedulerError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(WorkerState {
                reload_requested: settings.load_on_start,
                idle_pending: true,
                ..WorkerState::default()
            }),
            work_available: Condvar::new(),
            settled: Condvar::new(),
            sinks: Mutex::new(Vec::new()),
            next_sink_id: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(settings.worker_name.clone())
            .spawn(move || run_worker(worker_shared, engine))?;
        parser_info!("Started parser worker '{}'", settings.worker_name);

        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    pub fn subscribe(&self, sink: Arc<dyn SchedulerSink>) -> SinkId {
        let id = SinkId(self.shared.next_sink_id.fetch_add(1, Ordering::Relaxed));
        self.shared
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, sink));
        id
    }

    pub fn unsubscribe(&self, id: SinkId) {
        self.shared
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(sink_id, _)| *sink_id != id);
    }

    /// Queue a single-word trace at `High` priority. Exactly one `Finished`
    /// report carries the returned job id.
    pub fn schedule_single_word_trace(
        &self,
        request: TraceRequest,
    ) -> Result<JobId, SchedulerError> {
        let mut state = self.shared.lock_state();
        state.ensure_accepting()?;
        let id = state.queue.push_trace(request);
        self.shared.work_available.notify_one();
        Ok(id)
    }

    pub fn schedule_wordform_update(
        &self,
        wordform: Wordform,
        priority: Priority,
    ) -> Result<Enqueued, SchedulerError> {
        let mut state = self.shared.lock_state();
        state.ensure_accepting()?;
        let outcome = state.queue.push_wordform(wordform, priority);
        self.shared.work_available.notify_one();
        Ok(outcome)
    }

    pub fn schedule_wordforms_update(
        &self,
        wordforms: impl IntoIterator<Item = Wordform>,
        priority: Priority,
    ) -> Result<Vec<Enqueued>, SchedulerError> {
        let mut state = self.shared.lock_state();
        state.ensure_accepting()?;
        let outcomes = wordforms
            .into_iter()
            .map(|wordform| state.queue.push_wordform(wordform, priority))
            .collect();
        self.shared.work_available.notify_one();
        Ok(outcomes)
    }

    /// Ask the engine to reload before it takes the next job. Queued jobs
    /// are kept.
    pub fn reload_grammar_and_lexicon(&self) -> Result<(), SchedulerError> {
        let mut state = self.shared.lock_state();
        state.ensure_accepting()?;
        state.reload_requested = true;
        self.shared.work_available.notify_one();
        Ok(())
    }

    pub fn queue_size(&self, priority: Priority) -> usize {
        self.shared.lock_state().queue.len(priority)
    }

    /// The failure that halted the worker, if any. Stays set for the
    /// lifetime of the scheduler.
    pub fn unhandled_exception(&self) -> Option<EngineFault> {
        self.shared.lock_state().fault.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock_state().shutdown
    }

    /// Blocks until nothing is running and no further progress is possible
    /// without new submissions. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let state = self.shared.lock_state();
        let (state, _) = self
            .shared
            .settled
            .wait_timeout_while(state, timeout, |state| !state.is_settled())
            .unwrap_or_else(PoisonError::into_inner);
        state.is_settled()
    }

    /// Stop the worker and drop queued jobs. A job already running finishes
    /// first. Safe to call more than once.
    pub fn dispose(&self) {
        {
            let mut state = self.shared.lock_state();
            if !state.shutdown {
                state.shutdown = true;
                state.queue.clear();
                state.reload_requested = false;
            }
            self.shared.work_available.notify_all();
            self.shared.settled.notify_all();
        }

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                // Disposed from inside a sink; the worker exits on its own.
                return;
            }
            if handle.join().is_err() {
                parser_error!("Parser worker terminated abnormally");
            }
            parser_info!("Parser worker stopped");
        }
    }
}

impl Drop for ParserScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn run_worker(shared: Arc<Shared>, mut engine: Box<dyn ParseEngine>) {
    loop {
        let outcome = match next_work(&shared) {
            Work::Stop => return,
            Work::AnnounceIdle => {
                shared.emit(SchedulerEvent::Report(TaskReport::idle()));
                Ok(())
            }
            Work::Reload(job_id) => reload(&shared, engine.as_mut(), job_id),
            Work::Run(job) => execute(&shared, engine.as_mut(), job),
        };

        if let Err(fault) = outcome {
            halt(&shared, fault);
            return;
        }
        shared.lock_state().busy = false;
        shared.settled.notify_all();
    }
}

/// Latches the fault. Sinks see it before the worker counts as settled.
fn halt(shared: &Shared, fault: EngineFault) {
    parser_error!("Parser worker halted: {}", fault);
    {
        let mut state = shared.lock_state();
        state.fault = Some(fault.clone());
        state.idle_pending = false;
    }
    shared.emit(SchedulerEvent::Faulted(fault));
    shared.lock_state().busy = false;
    shared.settled.notify_all();
}

fn next_work(shared: &Shared) -> Work {
    let mut state = shared.lock_state();
    loop {
        if state.shutdown {
            return Work::Stop;
        }
        if state.reload_requested {
            state.reload_requested = false;
            state.busy = true;
            state.idle_pending = true;
            return Work::Reload(state.queue.allocate_id());
        }
        if let Some(job) = state.queue.pop() {
            state.busy = true;
            state.idle_pending = true;
            return Work::Run(job);
        }
        if state.idle_pending {
            state.idle_pending = false;
            state.busy = true;
            return Work::AnnounceIdle;
        }
        state = shared
            .work_available
            .wait(state)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Runs an engine call, turning a panic into a fault.
fn guarded<T>(call: impl FnOnce() -> Result<T, EngineFault>) -> Result<T, EngineFault> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(EngineFault::from_panic(payload)),
    }
}

fn reload(
    shared: &Shared,
    engine: &mut dyn ParseEngine,
    job_id: JobId,
) -> Result<(), EngineFault> {
    let started = Instant::now();
    parser_info!("Reloading grammar and lexicon (job {})", job_id);
    shared.emit(SchedulerEvent::Report(TaskReport::started(
        job_id,
        RELOAD_DESCRIPTION,
    )));

    let notification = guarded(|| engine.reload_grammar_and_lexicon())?;
    if let Some(notification) = notification {
        shared.emit(SchedulerEvent::Report(TaskReport::running(
            job_id,
            RELOAD_DESCRIPTION,
            notification,
        )));
    }

    shared.emit(SchedulerEvent::Report(TaskReport::finished(
        job_id,
        RELOAD_DESCRIPTION,
        started.elapsed(),
    )));
    Ok(())
}

fn execute(
    shared: &Shared,
    engine: &mut dyn ParseEngine,
    job: Job,
) -> Result<(), EngineFault> {
    let started = Instant::now();
    let description = job.description();
    parser_debug!("Job {} started: {}", job.id, description);
    shared.emit(SchedulerEvent::Report(TaskReport::started(
        job.id,
        description.clone(),
    )));

    match &job.kind {
        JobKind::Trace(request) => {
            let details = guarded(|| engine.trace_word(request))?;
            if details.is_none() {
                parser_debug!("Job {}: no parse for '{}'", job.id, request.form);
            }
            shared.emit(SchedulerEvent::Report(
                TaskReport::finished(job.id, description, started.elapsed()).with_details(details),
            ));
        }
        JobKind::UpdateWordform(wordform) => {
            guarded(|| engine.update_wordform(wordform))?;
            shared.emit(SchedulerEvent::Report(TaskReport::finished(
                job.id,
                description,
                started.elapsed(),
            )));
            shared.emit(SchedulerEvent::WordformUpdated(WordformUpdate {
                wordform: wordform.id,
                job_id: job.id,
            }));
        }
    }

    parser_debug!("Job {} finished in {:?}", job.id, started.elapsed());
    Ok(())
}
