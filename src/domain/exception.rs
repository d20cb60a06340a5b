//! Exceptions: reports that were collected or that stopped the program.

use crate::domain::location::Location;
use crate::domain::message::Message;
use crate::domain::options::ReportOptions;
use crate::domain::reason::Reason;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A report captured as a value.
///
/// Fatal reports return one of these as `Err`, and try scopes collect one
/// per report made inside them. Each exception has a process-unique id, so
/// the same report is recognised when it comes back from a try body.
#[derive(Debug, Clone)]
pub struct Exception {
    id: u64,
    reason: Reason,
    message: Message,
    options: ReportOptions,
}

/// Overrides applied when an exception is reported again.
///
/// # Example
/// ```
/// use report_dispatch::{Reason, Rethrow};
///
/// let demote = Rethrow::new().reason(Reason::Warning).to("logfile");
/// assert_eq!(demote.reason, Some(Reason::Warning));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Rethrow {
    /// Replace the reason
    pub reason: Option<Reason>,
    /// Options laid over the captured ones
    pub options: ReportOptions,
}

impl Rethrow {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report with another reason.
    pub fn reason(mut self, reason: Reason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Send only to this dispatcher (may be repeated).
    pub fn to(mut self, dispatcher: impl Into<String>) -> Self {
        self.options = self.options.to(dispatcher);
        self
    }

    /// Override fatality.
    pub fn fatal(mut self, is_fatal: bool) -> Self {
        self.options.is_fatal = Some(is_fatal);
        self
    }
}

impl Exception {
    /// Create an exception with a fresh id.
    pub fn new(reason: Reason, message: impl Into<Message>, options: ReportOptions) -> Self {
        Self::from_parts(Self::next_id(), reason, message.into(), options)
    }

    pub(crate) fn next_id() -> u64 {
        NEXT_ID.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn from_parts(
        id: u64,
        reason: Reason,
        message: Message,
        options: ReportOptions,
    ) -> Self {
        Self {
            id,
            reason,
            message,
            options,
        }
    }

    /// Process-unique id of the report.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The reason.
    pub fn reason(&self) -> Reason {
        self.reason
    }

    /// The message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Options captured with the report.
    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// The OS error number, if one was recorded.
    pub fn errno(&self) -> Option<i32> {
        self.options.os_error()
    }

    /// Where the report was made.
    pub fn location(&self) -> Option<&Location> {
        self.options.recorded_location()
    }

    /// Whether this exception stops the program.
    pub fn is_fatal(&self) -> bool {
        self.options
            .is_fatal
            .unwrap_or_else(|| self.reason.is_fatal())
    }

    /// Check the message tags.
    pub fn in_class(&self, tag: &str) -> bool {
        self.message.in_class(tag)
    }

    /// Process exit code: the errno when there is one, otherwise 1.
    pub fn exit_code(&self) -> i32 {
        self.errno().unwrap_or(1)
    }

    /// Reason and options for reporting this exception again.
    ///
    /// A new reason without an explicit fatality override takes the new
    /// reason's default. The recorded location is kept and no new stack is
    /// captured.
    pub fn rethrow_parts(&self, overrides: Option<&Rethrow>) -> (Reason, ReportOptions) {
        let mut options = self.options.clone();
        let mut reason = self.reason;

        if let Some(overrides) = overrides {
            if let Some(new_reason) = overrides.reason {
                reason = new_reason;
                options.is_fatal = None;
            }
            options = options.merge(&overrides.options);
        }
        if options.stack.is_none() {
            options.stack = Some(Vec::new());
        }
        (reason, options)
    }
}

impl std::error::Error for Exception {}

impl From<Exception> for Message {
    fn from(exception: Exception) -> Self {
        exception.message
    }
}

impl From<io::Error> for Exception {
    /// A FAULT carrying the OS error number.
    fn from(err: io::Error) -> Self {
        let errno = err.raw_os_error();
        let text = match errno {
            Some(_) => err.kind().to_string(),
            None => err.to_string(),
        };
        let mut options = ReportOptions::new().suppress_location();
        options.errno = errno;
        Exception::new(Reason::Fault, Message::literal(text), options)
    }
}
