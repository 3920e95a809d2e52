use std::sync::mpsc;

use crate::SchedulerEvent;

/// Receiver of scheduler events. Called on the worker thread.
pub trait SchedulerSink: Send + Sync {
    fn emit(&self, event: SchedulerEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(pub(crate) u64);

/// Forwards every event onto a channel.
pub struct ChannelSink {
    tx: mpsc::Sender<SchedulerEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SchedulerEvent>) -> Self {
        Self { tx }
    }
}

impl SchedulerSink for ChannelSink {
    fn emit(&self, event: SchedulerEvent) {
        let _ = self.tx.send(event);
    }
}
