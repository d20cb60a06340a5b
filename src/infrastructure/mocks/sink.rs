//! Mock sink for testing.

use crate::application::dispatcher::Record;
use crate::application::ports::{Sink, SinkError};
use crate::domain::reason::Reason;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A report as seen by a [`MockSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct LoggedRecord {
    pub dispatcher: String,
    pub reason: Reason,
    /// Fully rendered text
    pub text: String,
    /// Only the message
    pub message: String,
    pub report_id: u64,
}

enum Behavior {
    Record,
    Fail(String),
    Panic(&'static str),
}

type LogHook = Box<dyn Fn(&Record<'_>) + Send + Sync>;
type CloseHook = Box<dyn Fn() + Send + Sync>;

/// Sink that remembers what it was given.
///
/// # Examples
///
/// ```
/// use report_dispatch::infrastructure::mocks::MockSink;
/// use report_dispatch::{DispatcherOptions, Reason, ReportOptions, ReportingContext, SinkKind};
/// use std::sync::Arc;
///
/// let sink = Arc::new(MockSink::new());
/// let ctx = ReportingContext::builder().without_default_dispatcher().build();
/// ctx.register(SinkKind::Custom(sink.clone()), "mock", DispatcherOptions::new())
///     .unwrap();
///
/// ctx.report(ReportOptions::new(), Reason::Warning, "low on memory").unwrap();
/// assert_eq!(sink.texts(), vec!["warning: low on memory\n".to_string()]);
/// ```
pub struct MockSink {
    records: Mutex<Vec<LoggedRecord>>,
    closes: AtomicUsize,
    terminal: bool,
    behavior: Behavior,
    on_log: Option<LogHook>,
    on_close: Option<CloseHook>,
}

impl MockSink {
    /// A sink that records everything.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            terminal: false,
            behavior: Behavior::Record,
            on_log: None,
            on_close: None,
        }
    }

    /// A recording sink that claims to be the terminal one.
    pub fn terminal() -> Self {
        Self {
            terminal: true,
            ..Self::new()
        }
    }

    /// A sink whose every `log` fails with `error`'s text.
    pub fn failing(error: SinkError) -> Self {
        Self {
            behavior: Behavior::Fail(error.to_string()),
            ..Self::new()
        }
    }

    /// A sink whose every `log` panics with `message`.
    pub fn panicking(message: &'static str) -> Self {
        Self {
            behavior: Behavior::Panic(message),
            ..Self::new()
        }
    }

    /// Run `hook` on every record, before recording it.
    pub fn on_log<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Record<'_>) + Send + Sync + 'static,
    {
        self.on_log = Some(Box::new(hook));
        self
    }

    /// Run `hook` when the sink is closed.
    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Records received so far.
    pub fn records(&self) -> Vec<LoggedRecord> {
        self.records
            .lock()
            .expect("MockSink mutex poisoned")
            .clone()
    }

    /// Rendered texts received so far.
    pub fn texts(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.text).collect()
    }

    /// Number of records received.
    pub fn count(&self) -> usize {
        self.records.lock().expect("MockSink mutex poisoned").len()
    }

    /// How often `close` reached this sink.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Forget all records.
    pub fn clear(&self) {
        self.records.lock().expect("MockSink mutex poisoned").clear();
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockSink")
            .field("count", &self.count())
            .field("closes", &self.close_count())
            .field("terminal", &self.terminal)
            .finish_non_exhaustive()
    }
}

impl Sink for MockSink {
    fn log(&self, record: &Record<'_>) -> Result<(), SinkError> {
        match &self.behavior {
            Behavior::Record => {}
            Behavior::Fail(text) => return Err(SinkError::Other(text.clone())),
            Behavior::Panic(message) => panic!("{}", message),
        }
        if let Some(hook) = &self.on_log {
            hook(record);
        }
        self.records
            .lock()
            .expect("MockSink mutex poisoned")
            .push(LoggedRecord {
                dispatcher: record.dispatcher.name().to_string(),
                reason: record.reason,
                text: record.render(),
                message: record.message_text(),
                report_id: record.report_id,
            });
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_close {
            hook();
        }
        Ok(())
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }
}
