//! Source locations and call stacks.

use regex::Regex;
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::OnceLock;

/// Where a report was made.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// Source file
    pub file: String,
    /// Line number, starting at 1
    pub line: u32,
}

impl Location {
    /// Create a location.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Location of the caller, following `#[track_caller]` chains.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(std::panic::Location::caller())
    }
}

impl From<&std::panic::Location<'_>> for Location {
    fn from(loc: &std::panic::Location<'_>) -> Self {
        Self::new(loc.file(), loc.line())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One frame of a captured call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Called function
    pub call: String,
    /// Source file
    pub file: String,
    /// Line number
    pub line: u32,
}

/// Frames from these paths are runtime plumbing, not the caller's code.
const SKIPPED_PREFIXES: &[&str] = &[
    "report_dispatch::",
    "<report_dispatch::",
    "std::",
    "<std::",
    "core::",
    "<core::",
    "alloc::",
    "<alloc::",
    "__rust",
    "rust_begin_unwind",
    "_start",
    "__libc",
];

fn frame_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let call = Regex::new(r"^\s*\d+:\s+(.+?)(?:::h[0-9a-f]{16})?$");
        let at = Regex::new(r"^\s*at\s+(.+?):(\d+)(?::\d+)?$");
        match (call, at) {
            (Ok(call), Ok(at)) => (call, at),
            (Err(e), _) | (_, Err(e)) => panic!("stack frame pattern does not compile: {}", e),
        }
    })
}

/// Capture the current call stack, without frames of this crate and of the
/// standard library.
///
/// Frames without file information are dropped. The result is empty when
/// the binary has no debug info.
pub fn capture_stack() -> Vec<StackFrame> {
    parse_backtrace(&Backtrace::force_capture().to_string())
}

/// Parse the text form of a [`Backtrace`].
pub fn parse_backtrace(text: &str) -> Vec<StackFrame> {
    let (call_re, at_re) = frame_patterns();
    let mut frames = Vec::new();
    let mut pending: Option<String> = None;

    for line in text.lines() {
        if let Some(caps) = call_re.captures(line) {
            pending = Some(caps[1].to_string());
        } else if let Some(caps) = at_re.captures(line) {
            let Some(call) = pending.take() else {
                continue;
            };
            if SKIPPED_PREFIXES.iter().any(|p| call.starts_with(p)) {
                continue;
            }
            frames.push(StackFrame {
                call,
                file: caps[1].to_string(),
                line: caps[2].parse().unwrap_or(0),
            });
        }
    }
    frames
}
