//! Execution context identity.
//!
//! The controller records the thread it was created on and compares later
//! callers against it, instead of relying on a process-wide global.

use std::thread::{self, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionContext {
    thread: ThreadId,
}

impl ExecutionContext {
    /// Context of the calling thread
    pub fn current() -> Self {
        Self {
            thread: thread::current().id(),
        }
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }
}
