//! Mock terminator for testing.

use crate::application::ports::Terminator;
use std::sync::Mutex;

/// Records exit codes instead of ending the process.
#[derive(Debug, Default)]
pub struct MockTerminator {
    codes: Mutex<Vec<i32>>,
}

impl MockTerminator {
    /// Create a terminator that has not been called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit codes passed so far.
    pub fn codes(&self) -> Vec<i32> {
        self.codes
            .lock()
            .expect("MockTerminator mutex poisoned")
            .clone()
    }
}

impl Terminator for MockTerminator {
    fn terminate(&self, code: i32) {
        self.codes
            .lock()
            .expect("MockTerminator mutex poisoned")
            .push(code);
    }
}
