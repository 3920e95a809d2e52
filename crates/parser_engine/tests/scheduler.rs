use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parser_core::{Priority, TaskPhase, Wordform, WordformId};
use parser_engine::{
    ChannelSink, Enqueued, Gate, ParserScheduler, SchedulerError, SchedulerEvent,
    SchedulerSettings, ScriptedEngine, TraceRequest, WordformUpdate,
};
use pretty_assertions::assert_eq;

const TIMEOUT: Duration = Duration::from_secs(5);

fn subscribe(scheduler: &ParserScheduler) -> mpsc::Receiver<SchedulerEvent> {
    let (tx, rx) = mpsc::channel();
    scheduler.subscribe(Arc::new(ChannelSink::new(tx)));
    rx
}

fn no_initial_load() -> SchedulerSettings {
    SchedulerSettings {
        load_on_start: false,
        ..SchedulerSettings::default()
    }
}

fn updated_ids(events: &[SchedulerEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            SchedulerEvent::WordformUpdated(WordformUpdate {
                wordform: WordformId(id),
                ..
            }) => Some(*id),
            _ => None,
        })
        .collect()
}

/// Starts a scheduler whose worker is parked inside the initial reload.
fn parked_scheduler(engine: ScriptedEngine) -> (ParserScheduler, Gate) {
    parser_logging::initialize_for_tests();
    let gate = Gate::closed();
    let scheduler = ParserScheduler::start(
        Box::new(engine.with_gate(gate.clone())),
        SchedulerSettings::default(),
    )
    .expect("start scheduler");
    assert!(gate.wait_entered(1, TIMEOUT), "worker never reached the engine");
    (scheduler, gate)
}

#[test]
fn jobs_within_a_priority_run_in_submission_order() {
    let engine = ScriptedEngine::new();
    let journal = engine.journal();
    let (scheduler, gate) = parked_scheduler(engine);

    scheduler
        .schedule_wordforms_update(
            [Wordform::new(1, "a"), Wordform::new(2, "b"), Wordform::new(3, "c")],
            Priority::Low,
        )
        .unwrap();
    scheduler
        .schedule_wordforms_update([Wordform::new(4, "d"), Wordform::new(5, "e")], Priority::Medium)
        .unwrap();
    assert_eq!(scheduler.queue_size(Priority::Low), 3);
    assert_eq!(scheduler.queue_size(Priority::Medium), 2);
    assert_eq!(scheduler.queue_size(Priority::High), 0);

    gate.open();
    assert!(scheduler.wait_idle(TIMEOUT));
    assert_eq!(
        journal.entries(),
        vec!["reload", "update:d", "update:e", "update:a", "update:b", "update:c"]
    );
}

#[test]
fn interactive_update_overtakes_queued_batch() {
    let engine = ScriptedEngine::new();
    let journal = engine.journal();
    let (scheduler, gate) = parked_scheduler(engine);
    let events = subscribe(&scheduler);

    scheduler
        .schedule_wordforms_update(
            [
                Wordform::new(1, "cat"),
                Wordform::new(2, "cats"),
                Wordform::new(3, "dog"),
            ],
            Priority::Medium,
        )
        .unwrap();
    let outcome = scheduler
        .schedule_wordform_update(Wordform::new(1, "cat"), Priority::High)
        .unwrap();
    assert!(matches!(
        outcome,
        Enqueued::Promoted {
            from: Priority::Medium,
            ..
        }
    ));
    assert_eq!(scheduler.queue_size(Priority::High), 1);
    assert_eq!(scheduler.queue_size(Priority::Medium), 2);

    gate.open();
    assert!(scheduler.wait_idle(TIMEOUT));
    assert_eq!(updated_ids(&events.try_iter().collect::<Vec<_>>()), vec![1, 2, 3]);
    assert_eq!(
        journal.entries(),
        vec!["reload", "update:cat", "update:cats", "update:dog"]
    );
}

#[test]
fn duplicate_update_at_lower_priority_is_ignored() {
    let (scheduler, gate) = parked_scheduler(ScriptedEngine::new());

    scheduler
        .schedule_wordform_update(Wordform::new(1, "cat"), Priority::High)
        .unwrap();
    let outcome = scheduler
        .schedule_wordform_update(Wordform::new(1, "cat"), Priority::Low)
        .unwrap();
    assert!(matches!(outcome, Enqueued::AlreadyQueued(_)));
    assert_eq!(scheduler.queue_size(Priority::Low), 0);
    assert_eq!(scheduler.queue_size(Priority::High), 1);
    gate.open();
    assert!(scheduler.wait_idle(TIMEOUT));
}

#[test]
fn reload_keeps_queued_jobs() {
    let engine = ScriptedEngine::new();
    let journal = engine.journal();
    let (scheduler, gate) = parked_scheduler(engine);
    let events = subscribe(&scheduler);

    scheduler
        .schedule_wordforms_update(
            [Wordform::new(1, "a"), Wordform::new(2, "b"), Wordform::new(3, "c")],
            Priority::Low,
        )
        .unwrap();
    scheduler.reload_grammar_and_lexicon().unwrap();
    assert_eq!(scheduler.queue_size(Priority::Low), 3);

    gate.open();
    assert!(scheduler.wait_idle(TIMEOUT));
    assert_eq!(
        journal.entries(),
        vec!["reload", "reload", "update:a", "update:b", "update:c"]
    );
    assert_eq!(updated_ids(&events.try_iter().collect::<Vec<_>>()), vec![1, 2, 3]);
}

#[test]
fn trace_job_reports_details_on_finish_and_then_idles() {
    parser_logging::initialize_for_tests();
    let engine = ScriptedEngine::new().with_entry("cat", &["cat.N"]);
    let scheduler = ParserScheduler::start(Box::new(engine), no_initial_load()).unwrap();
    assert!(scheduler.wait_idle(TIMEOUT));
    let events = subscribe(&scheduler);

    let parsed = scheduler
        .schedule_single_word_trace(TraceRequest::new("cat", true))
        .unwrap();
    let unparsed = scheduler
        .schedule_single_word_trace(TraceRequest::new("zzz", true))
        .unwrap();
    assert!(scheduler.wait_idle(TIMEOUT));

    let reports: Vec<_> = events
        .try_iter()
        .filter_map(|event| match event {
            SchedulerEvent::Report(report) => Some(report),
            _ => None,
        })
        .collect();

    let finished_for = |job_id| {
        reports
            .iter()
            .find(|r| r.job_id == Some(job_id) && r.phase == TaskPhase::Finished)
            .expect("finished report")
    };
    let details = finished_for(parsed).details.as_ref().expect("details");
    assert_eq!(details["form"], "cat");
    assert!(finished_for(parsed).duration.is_some());
    assert!(finished_for(unparsed).details.is_none());
    assert!(reports
        .iter()
        .filter(|r| r.phase != TaskPhase::Finished)
        .all(|r| r.details.is_none()));
    assert!(reports.last().expect("reports").is_idle());
}

#[test]
fn engine_fault_is_latched_and_halts_submissions() {
    parser_logging::initialize_for_tests();
    let engine = ScriptedEngine::new().with_fault_on("bad");
    let journal = engine.journal();
    let scheduler = ParserScheduler::start(Box::new(engine), no_initial_load()).unwrap();
    let events = subscribe(&scheduler);

    scheduler
        .schedule_wordforms_update([Wordform::new(1, "bad"), Wordform::new(2, "good")], Priority::Low)
        .unwrap();
    assert!(scheduler.wait_idle(TIMEOUT));

    let fault = scheduler.unhandled_exception().expect("latched fault");
    assert!(fault.message.contains("bad"));
    // Subscribers hear about it by the time the worker is settled.
    let last = events.try_iter().last().expect("events");
    assert_eq!(last, SchedulerEvent::Faulted(fault.clone()));
    // Still latched after reading.
    assert_eq!(scheduler.unhandled_exception(), Some(fault));
    assert_eq!(journal.entries(), vec!["update:bad"]);
    assert!(matches!(
        scheduler.schedule_wordform_update(Wordform::new(3, "more"), Priority::High),
        Err(SchedulerError::Faulted(_))
    ));
}

#[test]
fn engine_panic_becomes_a_fault() {
    parser_logging::initialize_for_tests();
    let engine = ScriptedEngine::new().with_panic_on("boom");
    let scheduler = ParserScheduler::start(Box::new(engine), no_initial_load()).unwrap();

    scheduler
        .schedule_single_word_trace(TraceRequest::new("boom", false))
        .unwrap();
    assert!(scheduler.wait_idle(TIMEOUT));

    let fault = scheduler.unhandled_exception().expect("latched fault");
    assert_eq!(fault.message, "scripted panic on 'boom'");
}

#[test]
fn dispose_abandons_queue_and_rejects_work() {
    let engine = ScriptedEngine::new();
    let journal = engine.journal();
    let (scheduler, gate) = parked_scheduler(engine);

    scheduler
        .schedule_wordforms_update([Wordform::new(1, "a"), Wordform::new(2, "b")], Priority::Low)
        .unwrap();

    let opener = {
        let gate = gate.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate.open();
        })
    };
    scheduler.dispose();
    opener.join().unwrap();

    assert!(scheduler.is_disposed());
    assert_eq!(journal.entries(), vec!["reload"]);
    assert_eq!(scheduler.queue_size(Priority::Low), 0);
    assert!(matches!(
        scheduler.reload_grammar_and_lexicon(),
        Err(SchedulerError::Disposed)
    ));
    scheduler.dispose();
}
