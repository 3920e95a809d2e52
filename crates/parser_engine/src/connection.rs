use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use parser_core::{
    AnalysisId, JobId, Priority, TaskPhase, TaskReport, TraceDocument, Wordform,
};
use parser_logging::{parser_debug, parser_info};

use crate::{
    ConnectionError, EngineFault, Enqueued, ParseEngine, ParserScheduler, SchedulerEvent,
    SchedulerSettings, SchedulerSink, SinkId, TraceRequest, WordformUpdate,
};

const STARTING_ACTIVITY: &str = "Starting parser";

/// Trace-result bookkeeping. `result` is a single slot: written by the
/// worker, emptied by the first read.
#[derive(Debug, Default)]
struct TraceSlot {
    pending: Option<JobId>,
    completed: Option<JobId>,
    result: Option<(JobId, TraceDocument)>,
}

#[derive(Debug)]
struct ConnectionState {
    activity: String,
    notification: Option<String>,
    trace: TraceSlot,
    wordform_listeners: Vec<mpsc::Sender<WordformUpdate>>,
    fault: Option<EngineFault>,
    disposed: bool,
}

/// State written by the worker thread and read by the UI thread.
struct ConnectionShared {
    state: Mutex<ConnectionState>,
    result_ready: Condvar,
}

impl ConnectionShared {
    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_report(&self, report: TaskReport) {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        state.activity = report.description;
        // Finished-phase notifications are noise.
        if report.phase != TaskPhase::Finished {
            if let Some(notification) = report.notification {
                state.notification = Some(notification);
            }
        }
        if report.phase == TaskPhase::Finished
            && report.job_id.is_some()
            && report.job_id == state.trace.pending
        {
            let job_id = state.trace.pending.take();
            state.trace.completed = job_id;
            state.trace.result = job_id.zip(report.details);
            self.result_ready.notify_all();
        }
    }

    fn forward_wordform(&self, update: WordformUpdate) {
        let mut state = self.lock();
        state.wordform_listeners.retain(|tx| tx.send(update).is_ok());
    }

    /// No trace will complete after this; waiters are released.
    fn record_fault(&self, fault: EngineFault) {
        let mut state = self.lock();
        state.trace.pending = None;
        state.fault = Some(fault);
        self.result_ready.notify_all();
    }
}

impl SchedulerSink for ConnectionShared {
    fn emit(&self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::Report(report) => self.apply_report(report),
            SchedulerEvent::WordformUpdated(update) => self.forward_wordform(update),
            SchedulerEvent::Faulted(fault) => self.record_fault(fault),
        }
    }
}

/// Owns one scheduler and turns UI requests into scheduler jobs.
pub struct ParserConnection {
    scheduler: ParserScheduler,
    shared: Arc<ConnectionShared>,
    sink_id: SinkId,
}

impl ParserConnection {
    pub fn connect(
        engine: Box<dyn ParseEngine>,
        settings: SchedulerSettings,
    ) -> Result<Self, ConnectionError> {
        let scheduler = ParserScheduler::start(engine, settings)?;
        Ok(Self::with_scheduler(scheduler))
    }

    pub fn with_scheduler(scheduler: ParserScheduler) -> Self {
        let shared = Arc::new(ConnectionShared {
            state: Mutex::new(ConnectionState {
                activity: STARTING_ACTIVITY.to_string(),
                notification: None,
                trace: TraceSlot::default(),
                wordform_listeners: Vec::new(),
                fault: None,
                disposed: false,
            }),
            result_ready: Condvar::new(),
        });
        let sink_id = scheduler.subscribe(Arc::clone(&shared) as Arc<dyn SchedulerSink>);
        Self {
            scheduler,
            shared,
            sink_id,
        }
    }

    fn live_state(&self) -> Result<MutexGuard<'_, ConnectionState>, ConnectionError> {
        let state = self.shared.lock();
        if state.disposed {
            return Err(ConnectionError::Disposed);
        }
        Ok(state)
    }

    /// Submit a High priority single-word parse, dropping any buffered trace
    /// result from an earlier call.
    pub fn begin_try_a_word(
        &self,
        form: &str,
        do_trace: bool,
        restrict_to: Option<Vec<AnalysisId>>,
    ) -> Result<TryAWordHandle, ConnectionError> {
        let form = form.trim();
        if form.is_empty() {
            return Err(ConnectionError::EmptyForm);
        }

        // Held across submission so the result cannot arrive before
        // `pending` is set.
        let mut state = self.live_state()?;
        state.trace.pending = None;
        state.trace.result = None;

        let mut request = TraceRequest::new(form, do_trace);
        request.restrict_to = restrict_to;
        let job_id = self.scheduler.schedule_single_word_trace(request)?;
        state.trace.pending = Some(job_id);
        parser_debug!("Try a word '{}' queued as job {}", form, job_id);

        Ok(TryAWordHandle {
            job_id,
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn update_wordform(
        &self,
        wordform: Wordform,
        priority: Priority,
    ) -> Result<(), ConnectionError> {
        drop(self.live_state()?);
        self.scheduler.schedule_wordform_update(wordform, priority)?;
        Ok(())
    }

    /// One outcome per submitted wordform, in order. Each names the job
    /// whose completion reflects that submission.
    pub fn update_wordforms(
        &self,
        wordforms: impl IntoIterator<Item = Wordform>,
        priority: Priority,
    ) -> Result<Vec<Enqueued>, ConnectionError> {
        drop(self.live_state()?);
        let outcomes = self.scheduler.schedule_wordforms_update(wordforms, priority)?;
        parser_debug!("Queued {} wordform updates at {}", outcomes.len(), priority);
        Ok(outcomes)
    }

    pub fn queue_size(&self, priority: Priority) -> Result<usize, ConnectionError> {
        drop(self.live_state()?);
        Ok(self.scheduler.queue_size(priority))
    }

    pub fn reload_grammar_and_lexicon(&self) -> Result<(), ConnectionError> {
        drop(self.live_state()?);
        self.scheduler.reload_grammar_and_lexicon()?;
        parser_info!("Grammar and lexicon reload requested");
        Ok(())
    }

    /// Description of the most recent scheduler report.
    pub fn activity(&self) -> Result<String, ConnectionError> {
        Ok(self.live_state()?.activity.clone())
    }

    /// Pending notification, cleared so it is delivered once.
    pub fn get_and_clear_notification(&self) -> Result<Option<String>, ConnectionError> {
        Ok(self.live_state()?.notification.take())
    }

    /// The failure that halted the worker. Not cleared by reading.
    pub fn unhandled_exception(&self) -> Result<Option<EngineFault>, ConnectionError> {
        drop(self.live_state()?);
        Ok(self.scheduler.unhandled_exception())
    }

    /// Channel receiving every wordform update job the worker finishes.
    pub fn subscribe_wordform_updates(
        &self,
    ) -> Result<mpsc::Receiver<WordformUpdate>, ConnectionError> {
        let (tx, rx) = mpsc::channel();
        self.live_state()?.wordform_listeners.push(tx);
        Ok(rx)
    }

    pub fn wait_until_idle(&self, timeout: Duration) -> Result<bool, ConnectionError> {
        drop(self.live_state()?);
        Ok(self.scheduler.wait_idle(timeout))
    }

    /// True when the worker holds no job, including one it has taken but
    /// not yet reported.
    pub fn is_settled(&self) -> Result<bool, ConnectionError> {
        self.wait_until_idle(Duration::ZERO)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock().disposed
    }

    /// Unsubscribe from the scheduler and stop it. Pending `TryAWordHandle`
    /// waits return early.
    pub fn dispose(&self) {
        {
            let mut state = self.shared.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.wordform_listeners.clear();
            self.shared.result_ready.notify_all();
        }
        self.scheduler.unsubscribe(self.sink_id);
        self.scheduler.dispose();
    }
}

impl Drop for ParserConnection {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Async-result handle for one `begin_try_a_word` call.
pub struct TryAWordHandle {
    job_id: JobId,
    shared: Arc<ConnectionShared>,
}

impl TryAWordHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// True once the worker finished this request, whether or not the word
    /// parsed.
    pub fn is_completed(&self) -> bool {
        Self::completed(&self.shared.lock(), self.job_id)
    }

    fn completed(state: &ConnectionState, job_id: JobId) -> bool {
        state
            .trace
            .completed
            .is_some_and(|completed| completed >= job_id)
    }

    /// Blocks until the request completes, the engine faults, the
    /// connection is disposed, or the timeout passes. Returns
    /// `is_completed()`.
    pub fn wait(&self, timeout: Duration) -> bool {
        let state = self.shared.lock();
        let (state, _) = self
            .shared
            .result_ready
            .wait_timeout_while(state, timeout, |state| {
                !state.disposed && state.fault.is_none() && !Self::completed(state, self.job_id)
            })
            .unwrap_or_else(PoisonError::into_inner);
        Self::completed(&state, self.job_id)
    }

    /// The failure that stopped the worker before this request completed.
    pub fn fault(&self) -> Option<EngineFault> {
        let state = self.shared.lock();
        if Self::completed(&state, self.job_id) {
            return None;
        }
        state.fault.clone()
    }

    /// The trace document, handed out at most once. `None` when the word did
    /// not parse, the result was already taken, or a newer request replaced
    /// it.
    pub fn take_result(&self) -> Option<TraceDocument> {
        let mut state = self.shared.lock();
        match &state.trace.result {
            Some((job_id, _)) if *job_id == self.job_id => {
                state.trace.result.take().map(|(_, document)| document)
            }
            _ => None,
        }
    }
}
