//! Operating system glue: error texts, the last OS error, process exit.

use crate::application::ports::Terminator;
use std::io;

/// Text of an OS error number, e.g. `"No such file or directory"` for 2.
pub fn strerror(errno: i32) -> String {
    let text = io::Error::from_raw_os_error(errno).to_string();
    match text.rfind(" (os error ") {
        Some(pos) => text[..pos].to_string(),
        None => text,
    }
}

/// Error number of the most recent failed system call on this thread.
pub fn last_errno() -> Option<i32> {
    io::Error::last_os_error().raw_os_error().filter(|e| *e != 0)
}

/// Process exit status for a failure code. Codes outside `1..=255` would
/// be truncated by the OS, possibly to 0, so they become 1.
pub(crate) fn failure_status(code: i32) -> u8 {
    u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
}

/// Ends the process with `std::process::exit`.
///
/// The code goes through the same mapping as [`run_main`](crate::run_main).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self, code: i32) {
        let status = failure_status(code);
        tracing::debug!(code, status, "terminating after fatal report");
        std::process::exit(i32::from(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strerror_has_no_suffix() {
        let text = strerror(2);
        assert!(!text.is_empty());
        assert!(!text.contains("os error"));
    }

    #[test]
    fn test_failure_status_stays_nonzero() {
        assert_eq!(failure_status(2), 2);
        assert_eq!(failure_status(255), 255);
        assert_eq!(failure_status(256), 1);
        assert_eq!(failure_status(300), 1);
        assert_eq!(failure_status(0), 1);
        assert_eq!(failure_status(-5), 1);
    }
}
