//! Built-in sinks.
//!
//! - [`TerminalSink`]: the host-native stderr sink, always run last
//! - [`FileSink`]: appends to a log file
//! - [`CallbackSink`]: hands every record to a closure
//! - [`TracingSink`]: forwards reports as `tracing` events
//!
//! [`SinkKind`] names what to build when a dispatcher is registered.

use crate::application::dispatcher::{DispatcherOptions, Record};
use crate::application::ports::{Sink, SinkError};
use crate::domain::config::ConfigError;
use crate::domain::reason::Reason;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::Level;

/// Target of the events emitted by [`TracingSink`].
pub const SINK_TARGET: &str = "report_dispatch::sink";

/// Closure receiving every record of a callback dispatcher.
pub type RecordCallback = Arc<dyn Fn(&Record<'_>) -> Result<(), SinkError> + Send + Sync>;

/// Builds the sink of a plugin kind from the dispatcher name and options.
pub type SinkConstructor =
    Arc<dyn Fn(&str, &DispatcherOptions) -> Result<Arc<dyn Sink>, String> + Send + Sync>;

/// What kind of sink a dispatcher gets.
#[derive(Clone)]
pub enum SinkKind {
    /// Standard error; the one terminal sink
    Terminal,
    /// Append to a file
    File(PathBuf),
    /// Call a closure
    Callback(RecordCallback),
    /// Emit `tracing` events
    Tracing(ReasonLevels),
    /// A ready-made sink
    Custom(Arc<dyn Sink>),
    /// A kind registered with `ReportingContext::register_sink_kind`
    Plugin(String),
}

impl SinkKind {
    /// Shortcut for a callback kind.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Record<'_>) -> Result<(), SinkError> + Send + Sync + 'static,
    {
        SinkKind::Callback(Arc::new(f))
    }

    /// Label shown in dispatcher listings.
    pub fn label(&self) -> String {
        match self {
            SinkKind::Terminal => "TERMINAL".to_string(),
            SinkKind::File(_) => "FILE".to_string(),
            SinkKind::Callback(_) => "CALLBACK".to_string(),
            SinkKind::Tracing(_) => "TRACING".to_string(),
            SinkKind::Custom(_) => "CUSTOM".to_string(),
            SinkKind::Plugin(kind) => kind.to_uppercase(),
        }
    }
}

impl fmt::Debug for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::File(path) => f.debug_tuple("File").field(path).finish(),
            SinkKind::Tracing(levels) => f.debug_tuple("Tracing").field(levels).finish(),
            SinkKind::Custom(sink) => f.debug_tuple("Custom").field(sink).finish(),
            SinkKind::Plugin(kind) => f.debug_tuple("Plugin").field(kind).finish(),
            other => f.write_str(&other.label()),
        }
    }
}

/// Build the sink for `kind`.
///
/// `plugin` looks up constructors of plugin kinds.
pub(crate) fn build_sink(
    kind: SinkKind,
    name: &str,
    options: &DispatcherOptions,
    plugin: impl Fn(&str) -> Option<SinkConstructor>,
) -> Result<Arc<dyn Sink>, ConfigError> {
    Ok(match kind {
        SinkKind::Terminal => Arc::new(TerminalSink::new()),
        SinkKind::File(path) => Arc::new(FileSink::open(&path).map_err(|e| ConfigError::Open {
            path: path.clone(),
            error: e.to_string(),
        })?),
        SinkKind::Callback(callback) => Arc::new(CallbackSink::new(callback)),
        SinkKind::Tracing(levels) => Arc::new(TracingSink::new(levels)?),
        SinkKind::Custom(sink) => sink,
        SinkKind::Plugin(kind) => {
            let constructor =
                plugin(&kind).ok_or_else(|| ConfigError::UnknownSinkKind(kind.clone()))?;
            constructor(name, options).map_err(|error| ConfigError::Plugin { kind, error })?
        }
    })
}

/// Writes rendered reports to standard error, or to an injected writer.
pub struct TerminalSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalSink {
    /// Write to standard error.
    pub fn new() -> Self {
        Self::with_writer(io::stderr())
    }

    /// Write somewhere else, e.g. a buffer in tests.
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TerminalSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalSink").finish_non_exhaustive()
    }
}

impl Sink for TerminalSink {
    fn log(&self, record: &Record<'_>) -> Result<(), SinkError> {
        let bytes = record.encoded();
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(&bytes)?;
        out.flush()?;
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        self.out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

/// Appends rendered reports to a file.
///
/// Every report is written with one `write_all` on a file opened in append
/// mode. There is no locking between processes.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileSink {
    /// Open `path` for appending, creating it when missing.
    ///
    /// # Errors
    /// Returns the I/O error of opening the file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    /// The file written to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn log(&self, record: &Record<'_>) -> Result<(), SinkError> {
        let bytes = record.encoded();
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let file = guard.as_mut().ok_or(SinkError::Closed)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        let file = self
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut file) = file {
            file.flush()?;
        }
        Ok(())
    }
}

/// Hands every record to a closure.
pub struct CallbackSink {
    callback: RecordCallback,
}

impl CallbackSink {
    /// Wrap a callback.
    pub fn new(callback: RecordCallback) -> Self {
        Self { callback }
    }
}

impl fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink").finish_non_exhaustive()
    }
}

impl Sink for CallbackSink {
    fn log(&self, record: &Record<'_>) -> Result<(), SinkError> {
        (self.callback)(record)
    }
}

/// Maps every reason to a `tracing` level.
///
/// # Example
/// ```
/// use report_dispatch::{Reason, ReasonLevels};
/// use tracing::Level;
///
/// let levels = ReasonLevels::default().set(Reason::Notice, Level::WARN);
/// assert_eq!(levels.level(Reason::Notice), Some(Level::WARN));
/// assert!(levels.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonLevels {
    levels: [Option<Level>; 11],
}

impl ReasonLevels {
    /// A table without any mapping.
    pub fn empty() -> Self {
        Self {
            levels: [None; 11],
        }
    }

    /// Map `reason` to `level`.
    pub fn set(mut self, reason: Reason, level: Level) -> Self {
        self.levels[reason.index()] = Some(level);
        self
    }

    /// Level for `reason`.
    pub fn level(&self, reason: Reason) -> Option<Level> {
        self.levels[reason.index()]
    }

    /// Check that every reason is mapped.
    ///
    /// # Errors
    /// [`ConfigError::MissingLevel`] naming the first unmapped reason.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match Reason::ALL.iter().find(|r| self.level(**r).is_none()) {
            Some(reason) => Err(ConfigError::MissingLevel { reason: *reason }),
            None => Ok(()),
        }
    }
}

impl Default for ReasonLevels {
    fn default() -> Self {
        use Reason::*;
        Self::empty()
            .set(Trace, Level::TRACE)
            .set(Assert, Level::DEBUG)
            .set(Info, Level::INFO)
            .set(Notice, Level::INFO)
            .set(Warning, Level::WARN)
            .set(Mistake, Level::WARN)
            .set(Error, Level::ERROR)
            .set(Fault, Level::ERROR)
            .set(Alert, Level::ERROR)
            .set(Failure, Level::ERROR)
            .set(Panic, Level::ERROR)
    }
}

/// Forwards reports to `tracing`.
///
/// Events use the target [`SINK_TARGET`] and carry the dispatcher name and
/// the reason as fields.
#[derive(Debug, Clone)]
pub struct TracingSink {
    levels: ReasonLevels,
}

impl TracingSink {
    /// Create a sink with a complete level table.
    ///
    /// # Errors
    /// [`ConfigError::MissingLevel`] when a reason is not mapped.
    pub fn new(levels: ReasonLevels) -> Result<Self, ConfigError> {
        levels.validate()?;
        Ok(Self { levels })
    }
}

impl Sink for TracingSink {
    fn log(&self, record: &Record<'_>) -> Result<(), SinkError> {
        let text = record.message_text();
        let dispatcher = record.dispatcher.name();
        let reason = record.reason.as_str();

        match self.levels.level(record.reason).unwrap_or(Level::ERROR) {
            Level::TRACE => {
                tracing::trace!(target: SINK_TARGET, dispatcher, reason, "{}", text)
            }
            Level::DEBUG => {
                tracing::debug!(target: SINK_TARGET, dispatcher, reason, "{}", text)
            }
            Level::INFO => tracing::info!(target: SINK_TARGET, dispatcher, reason, "{}", text),
            Level::WARN => tracing::warn!(target: SINK_TARGET, dispatcher, reason, "{}", text),
            _ => tracing::error!(target: SINK_TARGET, dispatcher, reason, "{}", text),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::Dispatcher;
    use crate::application::domains::Domains;
    use crate::domain::message::Message;
    use crate::domain::mode::Mode;
    use crate::domain::options::ReportOptions;
    use crate::infrastructure::mocks::{MockCaptureLayer, MockSink};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn log_once(sink: Arc<dyn Sink>, reason: Reason, text: &str) -> Result<(), SinkError> {
        let dispatcher = Dispatcher::new(
            "test",
            "TEST",
            Arc::new(MockSink::new()),
            &DispatcherOptions::new(),
            Mode::Normal,
        )
        .unwrap();
        let domains = Domains::new();
        let options = ReportOptions::new().suppress_location();
        let message = Message::literal(text);
        let record = Record {
            dispatcher: &dispatcher,
            options: &options,
            reason,
            message: &message,
            domains: &domains,
            report_id: 1,
        };
        sink.log(&record)
    }

    #[test]
    fn test_terminal_sink_writes_rendered_text() {
        let buffer = Buffer::default();
        let sink = Arc::new(TerminalSink::with_writer(buffer.clone()));
        assert!(sink.is_terminal());

        log_once(sink, Reason::Warning, "low on space").unwrap();
        let written = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "warning: low on space\n");
    }

    #[test]
    fn test_file_sink_appends() {
        let path = std::env::temp_dir().join(format!(
            "report-dispatch-file-sink-{}.log",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let sink = Arc::new(FileSink::open(&path).unwrap());
        log_once(sink.clone(), Reason::Notice, "first").unwrap();
        log_once(sink.clone(), Reason::Notice, "second").unwrap();
        sink.close().unwrap();
        assert!(matches!(
            log_once(sink.clone(), Reason::Notice, "late"),
            Err(SinkError::Closed)
        ));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "notice: first\nnotice: second\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_callback_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_callback = Arc::clone(&seen);
        let sink = Arc::new(CallbackSink::new(Arc::new(move |record: &Record<'_>| {
            seen_in_callback
                .lock()
                .unwrap()
                .push((record.reason, record.message_text()));
            Ok::<(), SinkError>(())
        })));

        log_once(sink, Reason::Info, "hello").unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(Reason::Info, "hello".to_string())]
        );
    }

    #[test]
    fn test_incomplete_level_table() {
        let levels = ReasonLevels::empty().set(Reason::Error, Level::ERROR);
        assert_eq!(
            TracingSink::new(levels).unwrap_err(),
            ConfigError::MissingLevel {
                reason: Reason::Trace
            }
        );
    }

    #[test]
    fn test_tracing_sink_emits_events() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            let sink = Arc::new(TracingSink::new(ReasonLevels::default()).unwrap());
            log_once(sink, Reason::Mistake, "typo in config").unwrap();
        });

        let events = capture.get_captured();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::WARN);
        assert_eq!(events[0].target, SINK_TARGET);
        assert_eq!(events[0].message, "typo in config");
    }

    #[test]
    fn test_plugin_lookup() {
        let none = |_: &str| -> Option<SinkConstructor> { None };
        let err = build_sink(
            SinkKind::Plugin("syslog".to_string()),
            "sys",
            &DispatcherOptions::new(),
            none,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::UnknownSinkKind("syslog".to_string()));
        assert_eq!(SinkKind::Plugin("syslog".to_string()).label(), "SYSLOG");
    }
}
