//! A single-slot, auto-reset signaling primitive (spec.md §4.6, §9).
//!
//! This is *not* a mutual-exclusion lock: it's a one-shot barrier. A signal
//! delivered while nobody is waiting is buffered for exactly one subsequent
//! `wait()`; a second signal before that `wait()` is a no-op (the slot holds
//! at most one pending notification). Built on `Mutex`+`Condvar` rather than
//! a platform semaphore, in keeping with the plain-`std` concurrency style
//! the corpus uses for worker hand-off (no extra crate pulled in for two
//! primitives).
use std::sync::{Condvar, Mutex};

#[derive(Default)]
pub struct Rendezvous {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver the signal. If a waiter is parked, it wakes; otherwise the
    /// signal is buffered for the next `wait()`.
    pub fn signal(&self) {
        let mut guard = self.signaled.lock().unwrap();
        *guard = true;
        self.condvar.notify_one();
    }

    /// Block until signaled, then reset (auto-reset semantics).
    pub fn wait(&self) {
        let mut guard = self.signaled.lock().unwrap();
        while !*guard {
            guard = self.condvar.wait(guard).unwrap();
        }
        *guard = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn buffers_a_signal_sent_before_the_wait() {
        let r = Rendezvous::new();
        r.signal();
        r.wait(); // must not block
    }

    #[test]
    fn second_signal_without_a_wait_is_not_double_buffered() {
        let r = Arc::new(Rendezvous::new());
        r.signal();
        r.signal();
        r.wait();
        // only one pending notification should have existed; a second wait
        // must block until explicitly signaled again.
        let r2 = r.clone();
        let handle = std::thread::spawn(move || {
            r2.wait();
        });
        std::thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());
        r.signal();
        handle.join().unwrap();
    }

    #[test]
    fn wakes_a_waiter_parked_before_the_signal() {
        let r = Arc::new(Rendezvous::new());
        let r2 = r.clone();
        let handle = std::thread::spawn(move || r2.wait());
        std::thread::sleep(Duration::from_millis(20));
        r.signal();
        handle.join().unwrap();
    }
}
