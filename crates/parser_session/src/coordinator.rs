use std::collections::HashSet;
use std::sync::mpsc;

use parser_core::{
    AnalysisId, JobId, Priority, QueueCounts, SessionEvent, SessionPhase, SessionView, TextId,
    TraceDocument, Wordform, WordformTracker, NO_PARSER_STATUS,
};
use parser_engine::{
    ConnectionError, ParseEngine, ParserConnection, TryAWordHandle, WordformUpdate,
};
use parser_logging::{parser_debug, parser_error, parser_info, parser_warn};

use crate::{LinguisticModel, ModelChange, RefreshTimer, SessionError, SessionSettings};

/// Builds a fresh engine for every connection.
pub type EngineFactory = Box<dyn FnMut() -> Box<dyn ParseEngine>>;

/// "Reparse this text, then show conflicts" in progress.
struct VerifyWorkflow {
    text: TextId,
    tracker: WordformTracker,
    /// Jobs queued for this workflow. Completions of other jobs, such as
    /// one already running when the workflow started, do not count.
    jobs: HashSet<JobId>,
    updates: mpsc::Receiver<WordformUpdate>,
}

/// Owns the parser connection on behalf of the UI thread.
///
/// Everything here runs on the thread that owns the session. The worker
/// only reaches it through channels drained by `on_tick`.
pub struct ParserSession<M: LinguisticModel> {
    model: M,
    engine_factory: EngineFactory,
    settings: SessionSettings,
    connection: Option<ParserConnection>,
    timer: RefreshTimer,
    model_changes: mpsc::Receiver<ModelChange>,
    verify: Option<VerifyWorkflow>,
    event_tx: mpsc::Sender<SessionEvent>,
    event_rx: mpsc::Receiver<SessionEvent>,
    last_status: String,
}

impl<M: LinguisticModel> ParserSession<M> {
    pub fn new(mut model: M, engine_factory: EngineFactory, settings: SessionSettings) -> Self {
        let model_changes = model.subscribe_changes();
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            model,
            engine_factory,
            timer: RefreshTimer::new(settings.refresh_interval()),
            settings,
            connection: None,
            model_changes,
            verify: None,
            event_tx,
            event_rx,
            last_status: NO_PARSER_STATUS.to_string(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn connection(&self) -> Option<&ParserConnection> {
        self.connection.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn is_refreshing(&self) -> bool {
        self.timer.is_running()
    }

    /// Next event for the UI, if any.
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Start the parser unless it is already running. Refuses when the
    /// lexicon is empty.
    pub fn connect_to_parser(&mut self) -> bool {
        if self.connection.is_some() {
            return true;
        }
        if self.model.lexicon_is_empty() {
            parser_warn!("Not starting parser: lexicon is empty");
            return false;
        }

        let engine = (self.engine_factory)();
        match ParserConnection::connect(engine, self.settings.scheduler_settings()) {
            Ok(connection) => {
                parser_info!("Connected to parser");
                self.connection = Some(connection);
                self.timer.start();
                true
            }
            Err(err) => {
                parser_error!("Failed to start parser: {}", err);
                false
            }
        }
    }

    /// Tear down the connection and its worker. No-op when not connected.
    pub fn disconnect_from_parser(&mut self) {
        self.timer.stop();
        if let Some(verify) = self.verify.take() {
            parser_debug!(
                "Abandoning verification of {} with {} wordforms outstanding",
                verify.text,
                verify.tracker.remaining()
            );
        }
        if let Some(connection) = self.connection.take() {
            connection.dispose();
            parser_info!("Disconnected from parser");
        }
        self.publish_status(NO_PARSER_STATUS.to_string());
    }

    pub fn view(&self) -> SessionView {
        match &self.connection {
            Some(connection) => view_of(connection),
            None => SessionView::disconnected(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.view().phase
    }

    /// Runs the tick handler if the refresh timer fired since the last call.
    /// Model changes are handled on every call.
    pub fn pump(&mut self) {
        self.drain_model_changes();
        if self.timer.take_fired() {
            self.on_tick();
        }
    }

    pub fn on_idle(&mut self) {
        self.on_tick();
    }

    /// Periodic refresh: status line, fatal failures, notifications and
    /// verify-workflow progress.
    pub fn on_tick(&mut self) {
        self.drain_model_changes();

        let Some(connection) = &self.connection else {
            self.publish_status(NO_PARSER_STATUS.to_string());
            return;
        };
        let view = view_of(connection);
        // A job can be taken before its first report reaches the view.
        let settled = connection.is_settled().unwrap_or(true);
        let fault = connection.unhandled_exception().ok().flatten();
        let notification = match fault {
            Some(_) => None,
            None => connection.get_and_clear_notification().ok().flatten(),
        };

        if let Some(fault) = fault {
            parser_error!("Parser session ended: {}", fault);
            self.disconnect_from_parser();
            self.send(SessionEvent::FatalError(fault.to_string()));
            return;
        }
        if let Some(notification) = notification {
            self.send(SessionEvent::Notification(notification));
        }
        // After the view snapshot: an idle view implies every update event
        // is already in the channel.
        self.drain_wordform_updates();
        self.publish_status(view.status_line());
        if view.is_idle() && settled {
            self.timer.stop();
        }
    }

    /// Queue a High priority "Try a Word" and keep the status refreshing.
    pub fn try_a_word(
        &mut self,
        form: &str,
        do_trace: bool,
        restrict_to: Option<Vec<AnalysisId>>,
    ) -> Result<TryAWordHandle, SessionError> {
        let handle = self
            .ensure_connected()?
            .begin_try_a_word(form, do_trace, restrict_to)?;
        self.timer.start();
        Ok(handle)
    }

    /// "Try a Word" that blocks the calling thread for at most the configured
    /// trace timeout. `Ok(None)` when the word did not parse in time; an
    /// engine failure while waiting is returned as an error.
    pub fn trace_and_wait(
        &mut self,
        form: &str,
        do_trace: bool,
    ) -> Result<Option<TraceDocument>, SessionError> {
        let handle = self.try_a_word(form, do_trace, None)?;
        if handle.wait(self.settings.trace_wait_timeout()) {
            return Ok(handle.take_result());
        }
        if let Some(fault) = handle.fault() {
            return Err(ConnectionError::Faulted(fault).into());
        }
        parser_warn!("Timed out waiting for a parse of '{}'", form);
        Ok(None)
    }

    pub fn parse_current_word(&mut self, wordform: Wordform) -> Result<(), SessionError> {
        self.ensure_connected()?
            .update_wordform(wordform, Priority::High)?;
        self.timer.start();
        Ok(())
    }

    pub fn parse_current_text(&mut self, text: &TextId) -> Result<(), SessionError> {
        let wordforms = self.model.text_wordforms(text);
        self.ensure_connected()?
            .update_wordforms(wordforms, Priority::Medium)?;
        self.timer.start();
        Ok(())
    }

    /// Queue every wordform at Low priority. Returns false without queueing
    /// anything while an earlier bulk pass is still pending.
    pub fn parse_all_wordforms(&mut self) -> Result<bool, SessionError> {
        let wordforms = self.model.all_wordforms();
        let connection = self.ensure_connected()?;
        if connection.queue_size(Priority::Low)? > 0 {
            parser_info!("Bulk reparse already pending; not queueing another");
            return Ok(false);
        }
        connection.update_wordforms(wordforms, Priority::Low)?;
        self.timer.start();
        Ok(true)
    }

    /// Forwarded to the running parser; a later connect loads fresh data
    /// anyway.
    pub fn reload_grammar_and_lexicon(&mut self) -> Result<(), SessionError> {
        if let Some(connection) = &self.connection {
            connection.reload_grammar_and_lexicon()?;
            self.timer.start();
        }
        Ok(())
    }

    /// Reparse every wordform of `text` at Medium priority and send
    /// `ShowConflicts` once all of them are processed. Disconnecting first
    /// abandons the workflow silently.
    pub fn reparse_text_and_verify(&mut self, text: &TextId) -> Result<(), SessionError> {
        let wordforms = self.model.text_wordforms(text);
        let tracker = WordformTracker::new(wordforms.iter().map(|wordform| wordform.id));
        let connection = self.ensure_connected()?;

        if tracker.is_complete() {
            self.verify = None;
            self.send(SessionEvent::ShowConflicts(text.clone()));
            return Ok(());
        }

        let updates = connection.subscribe_wordform_updates()?;
        let jobs = connection
            .update_wordforms(wordforms, Priority::Medium)?
            .iter()
            .map(|outcome| outcome.job_id())
            .collect();
        parser_info!("Verifying text {} ({} wordforms)", text, tracker.len());
        self.verify = Some(VerifyWorkflow {
            text: text.clone(),
            tracker,
            jobs,
            updates,
        });
        self.timer.start();
        Ok(())
    }

    /// React to a database change. Interactive edits jump ahead of bulk work.
    pub fn handle_model_change(&mut self, change: ModelChange) {
        let Some(connection) = &self.connection else {
            return;
        };
        let result = match change {
            ModelChange::WordformFormEdited(wordform) => {
                parser_debug!("Wordform {} edited; reparsing", wordform.id);
                connection.update_wordform(wordform, Priority::High)
            }
            ModelChange::LexiconEdited => connection.reload_grammar_and_lexicon(),
            ModelChange::WordformDeleted(_) => return,
        };
        match result {
            Ok(()) => self.timer.start(),
            Err(err) => parser_warn!("Could not schedule work for model change: {}", err),
        }
    }

    fn ensure_connected(&mut self) -> Result<&ParserConnection, SessionError> {
        if !self.connect_to_parser() {
            return Err(SessionError::NotConnected);
        }
        self.connection.as_ref().ok_or(SessionError::NotConnected)
    }

    fn drain_model_changes(&mut self) {
        let changes: Vec<_> = self.model_changes.try_iter().collect();
        for change in changes {
            self.handle_model_change(change);
        }
    }

    fn drain_wordform_updates(&mut self) {
        let Some(verify) = &mut self.verify else {
            return;
        };
        for update in verify.updates.try_iter() {
            if verify.jobs.contains(&update.job_id) {
                verify.tracker.mark_processed(update.wordform);
            }
        }
        if verify.tracker.is_complete() {
            let text = verify.text.clone();
            self.verify = None;
            parser_info!("All wordforms of {} reparsed", text);
            self.send(SessionEvent::ShowConflicts(text));
        }
    }

    fn publish_status(&mut self, status: String) {
        if status != self.last_status {
            self.last_status = status.clone();
            self.send(SessionEvent::StatusChanged(status));
        }
    }

    fn send(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl<M: LinguisticModel> Drop for ParserSession<M> {
    fn drop(&mut self) {
        self.timer.stop();
        if let Some(connection) = self.connection.take() {
            connection.dispose();
        }
    }
}

fn view_of(connection: &ParserConnection) -> SessionView {
    let Ok(activity) = connection.activity() else {
        return SessionView::disconnected();
    };
    let mut queue = QueueCounts::default();
    for priority in Priority::DESCENDING {
        queue.set(priority, connection.queue_size(priority).unwrap_or(0));
    }
    SessionView::connected(activity, queue)
}
