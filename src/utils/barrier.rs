use std::sync::{Condvar, Mutex, PoisonError};

/// Counted acknowledgement barrier for one pipeline phase.
///
/// Created with the number of tasks expected in the phase. Every task calls
/// [`CompletionBarrier::ack`] exactly once when it is finished and
/// [`CompletionBarrier::wait`] blocks until all of them have done so.
#[derive(Debug)]
pub struct CompletionBarrier {
    remaining: Mutex<usize>,
    all_done: Condvar,
}

impl CompletionBarrier {
    pub fn new(expected: usize) -> Self {
        Self {
            remaining: Mutex::new(expected),
            all_done: Condvar::new(),
        }
    }

    pub fn ack(&self) {
        let mut remaining = self
            .remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *remaining == 0 {
            log::warn!("Completion acknowledged more times than expected");
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.all_done.notify_all();
        }
    }

    pub fn remaining(&self) -> usize {
        *self
            .remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wait(&self) {
        let mut remaining = self
            .remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *remaining > 0 {
            remaining = self
                .all_done
                .wait(remaining)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
