use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use parser_core::{TraceDocument, Wordform};
use serde_json::json;

use crate::{EngineFault, ParseEngine, TraceRequest};

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    permits: usize,
    entered: usize,
}

/// Blocks engine calls until opened. Lets callers hold the worker inside a
/// job while they fill the queue.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

impl Gate {
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.inner;
        lock.lock().unwrap_or_else(PoisonError::into_inner).open = true;
        cvar.notify_all();
    }

    /// Lets `count` more calls through, then blocks again.
    pub fn allow(&self, count: usize) {
        let (lock, cvar) = &*self.inner;
        lock.lock().unwrap_or_else(PoisonError::into_inner).permits += count;
        cvar.notify_all();
    }

    /// Waits until at least `count` engine calls have reached the gate.
    pub fn wait_entered(&self, count: usize, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |state| state.entered < count)
            .unwrap_or_else(PoisonError::into_inner);
        guard.entered >= count
    }

    fn pass(&self) {
        let (lock, cvar) = &*self.inner;
        let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        guard.entered += 1;
        cvar.notify_all();
        let mut guard = cvar
            .wait_while(guard, |state| !state.open && state.permits == 0)
            .unwrap_or_else(PoisonError::into_inner);
        if !guard.open {
            guard.permits -= 1;
        }
    }
}

/// Ordered record of the calls an engine received.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, entry: String) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// Lexicon-lookup engine: a form parses if the lexicon lists analyses for
/// it. Configurable failures make it usable for exercising the scheduler.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    lexicon: HashMap<String, Vec<String>>,
    faults: HashSet<String>,
    panics: HashSet<String>,
    reload_notification: Option<String>,
    gate: Option<Gate>,
    journal: Journal,
    reloads: usize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, form: impl Into<String>, analyses: &[&str]) -> Self {
        self.lexicon.insert(
            form.into(),
            analyses.iter().map(|a| (*a).to_string()).collect(),
        );
        self
    }

    /// Return an `EngineFault` when this form is processed.
    pub fn with_fault_on(mut self, form: impl Into<String>) -> Self {
        self.faults.insert(form.into());
        self
    }

    /// Panic when this form is processed.
    pub fn with_panic_on(mut self, form: impl Into<String>) -> Self {
        self.panics.insert(form.into());
        self
    }

    pub fn with_reload_notification(mut self, message: impl Into<String>) -> Self {
        self.reload_notification = Some(message.into());
        self
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Record calls into an existing journal, e.g. one shared by every
    /// engine a factory builds.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn enter(&self, entry: String) {
        if let Some(gate) = &self.gate {
            gate.pass();
        }
        self.journal.record(entry);
    }

    fn check_failures(&self, form: &str) -> Result<(), EngineFault> {
        if self.panics.contains(form) {
            panic!("scripted panic on '{form}'");
        }
        if self.faults.contains(form) {
            return Err(EngineFault::new(format!("scripted fault on '{form}'")));
        }
        Ok(())
    }
}

impl ParseEngine for ScriptedEngine {
    fn reload_grammar_and_lexicon(&mut self) -> Result<Option<String>, EngineFault> {
        self.enter("reload".to_string());
        self.reloads += 1;
        Ok(self.reload_notification.clone())
    }

    fn trace_word(&mut self, request: &TraceRequest) -> Result<Option<TraceDocument>, EngineFault> {
        self.enter(format!("trace:{}", request.form));
        self.check_failures(&request.form)?;

        let Some(analyses) = self.lexicon.get(&request.form) else {
            return Ok(None);
        };
        let steps: Vec<_> = if request.do_trace {
            analyses
                .iter()
                .map(|analysis| json!({ "rule": "lexicon-lookup", "matched": analysis }))
                .collect()
        } else {
            Vec::new()
        };
        let restrict: Vec<u64> = request
            .restrict_to
            .iter()
            .flatten()
            .map(|analysis| analysis.0)
            .collect();

        Ok(Some(json!({
            "form": request.form,
            "analyses": analyses,
            "trace": steps,
            "restrictTo": restrict,
            "grammarGeneration": self.reloads,
        })))
    }

    fn update_wordform(&mut self, wordform: &Wordform) -> Result<(), EngineFault> {
        self.enter(format!("update:{}", wordform.form));
        self.check_failures(&wordform.form)
    }
}
