use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// Background ticker feeding a channel the coordinator drains on its own
/// thread. Stopping only flags the ticker thread, which exits after its
/// current sleep.
pub struct RefreshTimer {
    interval: Duration,
    tick_tx: mpsc::Sender<()>,
    tick_rx: mpsc::Receiver<()>,
    stop: Option<Arc<AtomicBool>>,
}

impl RefreshTimer {
    pub fn new(interval: Duration) -> Self {
        let (tick_tx, tick_rx) = mpsc::channel();
        Self {
            interval,
            tick_tx,
            tick_rx,
            stop: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_some()
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let tick_tx = self.tick_tx.clone();
        let interval = self.interval;
        thread::spawn(move || {
            thread::sleep(interval);
            while !thread_stop.load(Ordering::Relaxed) && tick_tx.send(()).is_ok() {
                thread::sleep(interval);
            }
        });
        self.stop = Some(stop);
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
    }

    /// True if at least one tick arrived since the last call. Ticks that
    /// piled up are coalesced.
    pub fn take_fired(&self) -> bool {
        self.tick_rx.try_iter().count() > 0
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
