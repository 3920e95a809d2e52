use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use parser_core::{AnalysisId, Priority, TaskPhase, Wordform, WordformId, IDLE_ACTIVITY};
use parser_engine::{
    ConnectionError, Enqueued, Gate, ParserConnection, ParserScheduler, SchedulerEvent,
    SchedulerSettings, SchedulerSink, ScriptedEngine, WordformUpdate,
};
use pretty_assertions::assert_eq;

const TIMEOUT: Duration = Duration::from_secs(5);

fn connect(engine: ScriptedEngine) -> ParserConnection {
    parser_logging::initialize_for_tests();
    let settings = SchedulerSettings {
        load_on_start: false,
        ..SchedulerSettings::default()
    };
    ParserConnection::connect(Box::new(engine), settings).expect("connect")
}

fn lexicon() -> ScriptedEngine {
    ScriptedEngine::new()
        .with_entry("cat", &["cat.N"])
        .with_entry("dog", &["dog.N", "dog.V"])
}

#[test]
fn try_a_word_result_is_consumed_once() {
    let connection = connect(lexicon());

    let handle = connection
        .begin_try_a_word("cat", true, Some(vec![AnalysisId(7)]))
        .unwrap();
    assert!(handle.wait(TIMEOUT));
    assert!(handle.is_completed());

    let document = handle.take_result().expect("trace document");
    assert_eq!(document["form"], "cat");
    assert_eq!(document["restrictTo"][0], 7);
    assert_eq!(handle.take_result(), None);
    // Completion does not reset after the result is consumed.
    assert!(handle.is_completed());
}

#[test]
fn unparsable_word_completes_without_result() {
    let connection = connect(lexicon());

    let handle = connection.begin_try_a_word("xyzzy", false, None).unwrap();
    assert!(handle.wait(TIMEOUT));
    assert_eq!(handle.take_result(), None);
    assert_eq!(connection.unhandled_exception().unwrap(), None);
}

#[test]
fn new_request_discards_unread_result() {
    let connection = connect(lexicon());

    let first = connection.begin_try_a_word("cat", false, None).unwrap();
    assert!(first.wait(TIMEOUT));
    let second = connection.begin_try_a_word("dog", false, None).unwrap();

    assert_eq!(first.take_result(), None);
    assert!(second.wait(TIMEOUT));
    let document = second.take_result().expect("second result");
    assert_eq!(document["analyses"].as_array().map(Vec::len), Some(2));
}

#[test]
fn empty_form_is_rejected() {
    let connection = connect(lexicon());
    assert!(matches!(
        connection.begin_try_a_word("   ", true, None),
        Err(ConnectionError::EmptyForm)
    ));
}

#[test]
fn reload_notification_is_delivered_once() {
    parser_logging::initialize_for_tests();
    let engine = lexicon().with_reload_notification("Grammar has 2 warnings");
    let connection = ParserConnection::connect(Box::new(engine), SchedulerSettings::default())
        .expect("connect");

    assert!(connection.wait_until_idle(TIMEOUT).unwrap());
    assert_eq!(
        connection.get_and_clear_notification().unwrap().as_deref(),
        Some("Grammar has 2 warnings")
    );
    assert_eq!(connection.get_and_clear_notification().unwrap(), None);
    assert_eq!(connection.activity().unwrap(), IDLE_ACTIVITY);
}

#[test]
fn wordform_updates_are_forwarded_to_subscribers() {
    let connection = connect(lexicon());
    let updates = connection.subscribe_wordform_updates().unwrap();

    let outcomes = connection
        .update_wordforms([Wordform::new(1, "cat"), Wordform::new(2, "dog")], Priority::Medium)
        .unwrap();
    assert!(matches!(outcomes[..], [Enqueued::Queued(_), Enqueued::Queued(_)]));
    connection
        .update_wordform(Wordform::new(3, "bird"), Priority::Low)
        .unwrap();
    assert!(connection.wait_until_idle(TIMEOUT).unwrap());

    let received: Vec<_> = updates.try_iter().collect();
    assert_eq!(
        received.iter().map(|update| update.wordform).collect::<Vec<_>>(),
        vec![WordformId(1), WordformId(2), WordformId(3)]
    );
    assert_eq!(
        received[..2],
        [
            WordformUpdate {
                wordform: WordformId(1),
                job_id: outcomes[0].job_id()
            },
            WordformUpdate {
                wordform: WordformId(2),
                job_id: outcomes[1].job_id()
            },
        ]
    );
    assert_eq!(connection.queue_size(Priority::Medium).unwrap(), 0);
}

#[test]
fn fault_blocks_further_submissions() {
    let connection = connect(lexicon().with_fault_on("bad"));

    connection
        .update_wordform(Wordform::new(1, "bad"), Priority::High)
        .unwrap();
    assert!(connection.wait_until_idle(TIMEOUT).unwrap());

    let fault = connection.unhandled_exception().unwrap().expect("fault");
    assert!(fault.message.contains("bad"));
    assert!(matches!(
        connection.update_wordform(Wordform::new(2, "cat"), Priority::High),
        Err(ConnectionError::Faulted(_))
    ));
    assert!(matches!(
        connection.begin_try_a_word("cat", false, None),
        Err(ConnectionError::Faulted(_))
    ));
}

#[test]
fn disposed_connection_fails_fast() {
    let connection = connect(lexicon());
    connection.dispose();

    assert!(connection.is_disposed());
    assert!(matches!(connection.activity(), Err(ConnectionError::Disposed)));
    assert!(matches!(
        connection.queue_size(Priority::Low),
        Err(ConnectionError::Disposed)
    ));
    assert!(matches!(
        connection.reload_grammar_and_lexicon(),
        Err(ConnectionError::Disposed)
    ));
    assert!(matches!(
        connection.begin_try_a_word("cat", true, None),
        Err(ConnectionError::Disposed)
    ));
    connection.dispose();
}

#[test]
fn dispose_releases_waiting_caller() {
    parser_logging::initialize_for_tests();
    let gate = Gate::closed();
    let connection = connect(lexicon().with_gate(gate.clone()));

    let handle = connection.begin_try_a_word("cat", true, None).unwrap();
    assert!(gate.wait_entered(1, TIMEOUT));
    let waiter = thread::spawn(move || handle.wait(TIMEOUT));

    let opener = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        gate.open();
    });
    connection.dispose();
    opener.join().unwrap();

    assert!(!waiter.join().unwrap());
}

#[test]
fn engine_failure_releases_a_waiting_trace() {
    let connection = connect(lexicon().with_panic_on("boom"));

    let handle = connection.begin_try_a_word("boom", false, None).unwrap();
    let started = Instant::now();
    assert!(!handle.wait(TIMEOUT));
    assert!(started.elapsed() < TIMEOUT);

    assert!(!handle.is_completed());
    assert_eq!(handle.take_result(), None);
    let fault = handle.fault().expect("fault on handle");
    assert_eq!(fault.message, "scripted panic on 'boom'");
    assert_eq!(connection.unhandled_exception().unwrap(), Some(fault));
}

/// Parks the worker inside its first `Started` report once armed.
#[derive(Default)]
struct HoldOnStart {
    armed: AtomicBool,
    held: Mutex<bool>,
    release: Condvar,
}

impl HoldOnStart {
    fn wait_held(&self) -> bool {
        let held = self.held.lock().unwrap();
        let (held, _) = self
            .release
            .wait_timeout_while(held, TIMEOUT, |held| !*held)
            .unwrap();
        *held
    }

    fn release(&self) {
        self.armed.store(false, Ordering::SeqCst);
        *self.held.lock().unwrap() = false;
        self.release.notify_all();
    }
}

impl SchedulerSink for HoldOnStart {
    fn emit(&self, event: SchedulerEvent) {
        let SchedulerEvent::Report(report) = event else {
            return;
        };
        if report.phase != TaskPhase::Started || !self.armed.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut held = self.held.lock().unwrap();
        *held = true;
        self.release.notify_all();
        let _released = self.release.wait_while(held, |held| *held).unwrap();
    }
}

#[test]
fn job_taken_but_not_yet_reported_is_not_settled() {
    parser_logging::initialize_for_tests();
    let settings = SchedulerSettings {
        load_on_start: false,
        ..SchedulerSettings::default()
    };
    let scheduler = ParserScheduler::start(Box::new(lexicon()), settings).unwrap();
    // Subscribed ahead of the connection, so it runs first.
    let hold = Arc::new(HoldOnStart::default());
    scheduler.subscribe(hold.clone());
    let connection = ParserConnection::with_scheduler(scheduler);

    connection
        .update_wordform(Wordform::new(1, "cat"), Priority::Low)
        .unwrap();
    assert!(connection.wait_until_idle(TIMEOUT).unwrap());
    assert_eq!(connection.activity().unwrap(), IDLE_ACTIVITY);

    hold.armed.store(true, Ordering::SeqCst);
    connection
        .update_wordform(Wordform::new(2, "dog"), Priority::Low)
        .unwrap();
    assert!(hold.wait_held());

    // The connection has not heard of the job yet.
    assert_eq!(connection.activity().unwrap(), IDLE_ACTIVITY);
    assert_eq!(connection.queue_size(Priority::Low).unwrap(), 0);
    assert!(!connection.is_settled().unwrap());

    hold.release();
    assert!(connection.wait_until_idle(TIMEOUT).unwrap());
    assert!(connection.is_settled().unwrap());
}
