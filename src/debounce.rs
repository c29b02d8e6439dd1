use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use tracing::{debug, error, warn};

enum Signal {
    Schedule(Duration),
    Cancel,
    Stop,
}

/// Single outstanding timer. Each schedule replaces the previous deadline, so
/// the task runs once after the last call of a burst. The task runs on the
/// debouncer's own thread; a panicking task is logged and the timer keeps
/// serving later schedules.
pub struct Debouncer {
    delay: Duration,
    signals: Sender<Signal>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Debouncer {
    pub fn new<F>(delay: Duration, task: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let handle = thread::spawn(move || {
            let mut deadline: Option<Instant> = None;
            loop {
                let signal = match deadline {
                    None => match rx.recv() {
                        Ok(signal) => signal,
                        Err(_) => break,
                    },
                    Some(at) => {
                        let wait = at.saturating_duration_since(Instant::now());
                        match rx.recv_timeout(wait) {
                            Ok(signal) => signal,
                            Err(RecvTimeoutError::Timeout) => {
                                deadline = None;
                                if panic::catch_unwind(AssertUnwindSafe(&task)).is_err() {
                                    error!("debounced task panicked");
                                }
                                continue;
                            }
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                };
                match signal {
                    Signal::Schedule(delay) => deadline = Instant::now().checked_add(delay),
                    Signal::Cancel => deadline = None,
                    Signal::Stop => break,
                }
            }
        });

        Self {
            delay,
            signals: tx,
            handle: Some(handle),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&self) {
        self.schedule_in(self.delay);
    }

    /// Cancels any outstanding deadline and arms a new one `delay` from now.
    pub fn schedule_in(&self, delay: Duration) {
        if self.signals.send(Signal::Schedule(delay)).is_err() {
            warn!("debounce worker is gone, schedule dropped");
        }
    }

    pub fn cancel(&self) {
        if self.signals.send(Signal::Cancel).is_err() {
            warn!("debounce worker is gone, cancel dropped");
        }
    }

    fn shutdown(&mut self) {
        if self.signals.send(Signal::Stop).is_err() {
            debug!("debounce worker already stopped");
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("debounce worker panicked");
            }
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();
        (count, move || {
            task_count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn burst_runs_task_once() {
        let (count, task) = counter();
        let debouncer = Debouncer::new(Duration::from_millis(150), task);
        for _ in 0..5 {
            debouncer.schedule();
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        thread::sleep(Duration::from_millis(500));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn separate_bursts_run_separately() {
        let (count, task) = counter();
        let debouncer = Debouncer::new(Duration::from_millis(50), task);
        debouncer.schedule();
        thread::sleep(Duration::from_millis(300));
        debouncer.schedule();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancel_drops_pending_run() {
        let (count, task) = counter();
        let debouncer = Debouncer::new(Duration::from_millis(100), task);
        debouncer.schedule();
        debouncer.cancel();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_task_does_not_stop_the_timer() {
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();
        let debouncer = Debouncer::new(Duration::from_millis(30), move || {
            if task_count.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first run fails");
            }
        });
        debouncer.schedule();
        thread::sleep(Duration::from_millis(250));
        debouncer.schedule();
        thread::sleep(Duration::from_millis(250));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn drop_stops_without_running() {
        let (count, task) = counter();
        let debouncer = Debouncer::new(Duration::from_millis(100), task);
        debouncer.schedule();
        drop(debouncer);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
