use parser_core::{
    Priority, QueueCounts, SessionPhase, SessionView, TaskReport, NO_PARSER_STATUS,
};
use pretty_assertions::assert_eq;

#[test]
fn disconnected_view_shows_no_parser() {
    let view = SessionView::disconnected();
    assert_eq!(view.phase, SessionPhase::Disconnected);
    assert_eq!(view.status_line(), NO_PARSER_STATUS);
}

#[test]
fn status_line_lists_queue_sizes_low_to_high() {
    let view = SessionView::connected("Parsing 'cat'", QueueCounts::new(7, 2, 1));
    assert_eq!(view.status_line(), "Parsing 'cat' [queue L:7 M:2 H:1]");
    assert_eq!(view.phase, SessionPhase::Busy);
}

#[test]
fn idle_requires_idle_activity_and_empty_queues() {
    let idle = TaskReport::idle().description;
    assert!(SessionView::connected(idle.clone(), QueueCounts::default()).is_idle());

    let mut queue = QueueCounts::default();
    queue.set(Priority::Low, 1);
    assert_eq!(
        SessionView::connected(idle, queue).phase,
        SessionPhase::Busy
    );
}

#[test]
fn queue_counts_total() {
    let queue = QueueCounts::new(1, 2, 3);
    assert_eq!(queue.total(), 6);
    assert_eq!(queue.get(Priority::Medium), 2);
    assert!(!queue.is_empty());
}
