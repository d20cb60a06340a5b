//! Dispatchers: configured, named destinations for reports.
//!
//! A [`Dispatcher`] wraps a [`Sink`] with everything the reporting context
//! needs to decide whether a report goes there and how it is rendered: the
//! mode, the accepted reasons, the locale, the reason label style and the
//! output charset.

use crate::application::domains::{Domains, INTERNAL_DOMAIN};
use crate::application::ports::{Sink, SinkError};
use crate::domain::config::ConfigError;
use crate::domain::message::Message;
use crate::domain::mode::{Mode, ReasonFormat};
use crate::domain::options::ReportOptions;
use crate::domain::reason::{expand_reasons, Reason, ReasonSet};
use crate::infrastructure::os::strerror;
use encoding_rs::Encoding;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};
use std::sync::Arc;

/// Options for a new dispatcher.
///
/// # Example
/// ```
/// use report_dispatch::{DispatcherOptions, Mode, ReasonFormat};
///
/// let opts = DispatcherOptions::new()
///     .mode(Mode::Verbose)
///     .accept("INFO-")
///     .locale("nl_NL")
///     .format_reason(ReasonFormat::Uppercase);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DispatcherOptions {
    /// Mode; the context default when unset
    pub mode: Option<Mode>,
    /// Reason expression; derived from the mode when unset
    pub accept: Option<String>,
    /// Locale reports are rendered in
    pub locale: Option<String>,
    /// Reason label style
    pub format_reason: ReasonFormat,
    /// Output charset for byte-oriented sinks
    pub charset: Option<String>,
}

impl DispatcherOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Accept exactly the reasons of this expression.
    pub fn accept(mut self, reasons: impl Into<String>) -> Self {
        self.accept = Some(reasons.into());
        self
    }

    /// Render in this locale.
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Style of the reason label.
    pub fn format_reason(mut self, format: ReasonFormat) -> Self {
        self.format_reason = format;
        self
    }

    /// Encode output in this charset.
    pub fn charset(mut self, label: impl Into<String>) -> Self {
        self.charset = Some(label.into());
        self
    }
}

/// A configured destination.
#[derive(Debug)]
pub struct Dispatcher {
    name: String,
    kind: String,
    sink: Arc<dyn Sink>,
    mode: AtomicU8,
    accept: AtomicU16,
    explicit_accept: bool,
    enabled: AtomicBool,
    closed: AtomicBool,
    locale: Option<String>,
    format_reason: ReasonFormat,
    charset: Option<&'static Encoding>,
}

impl Dispatcher {
    /// Wrap `sink` under `name`.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for an unparsable accept expression or an
    /// unknown charset label.
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        sink: Arc<dyn Sink>,
        options: &DispatcherOptions,
        default_mode: Mode,
    ) -> Result<Self, ConfigError> {
        let mode = options.mode.unwrap_or(default_mode);
        let accept = match &options.accept {
            Some(expr) => expand_reasons(expr)?,
            None => mode.default_accept(),
        };
        let charset = match &options.charset {
            Some(label) => Some(
                Encoding::for_label(label.as_bytes())
                    .ok_or_else(|| ConfigError::UnknownCharset(label.clone()))?,
            ),
            None => None,
        };

        let mut dispatcher = Self::with_accept(name, kind, sink, mode, accept);
        dispatcher.explicit_accept = options.accept.is_some();
        dispatcher.locale = options.locale.clone();
        dispatcher.format_reason = options.format_reason;
        dispatcher.charset = charset;
        Ok(dispatcher)
    }

    /// Wrap `sink` with an already expanded reason set.
    pub(crate) fn with_accept(
        name: impl Into<String>,
        kind: impl Into<String>,
        sink: Arc<dyn Sink>,
        mode: Mode,
        accept: ReasonSet,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            sink,
            mode: AtomicU8::new(mode.level()),
            accept: AtomicU16::new(accept.bits()),
            explicit_accept: true,
            enabled: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            locale: None,
            format_reason: ReasonFormat::default(),
            charset: None,
        }
    }

    /// Unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label of the sink kind, e.g. `"FILE"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        Mode::from_level(self.mode.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Switch mode. Without an explicit accept expression the accepted
    /// reasons follow the mode.
    pub(crate) fn set_mode(&self, mode: Mode) {
        self.mode.store(mode.level(), Ordering::Release);
        if !self.explicit_accept {
            self.accept
                .store(mode.default_accept().bits(), Ordering::Release);
        }
        tracing::trace!(dispatcher = %self.name, mode = %mode, "dispatcher mode changed");
    }

    /// Configured accepted reasons, regardless of state.
    pub fn accepts(&self) -> ReasonSet {
        ReasonSet::from_bits(self.accept.load(Ordering::Acquire))
    }

    /// Reasons this dispatcher wants right now: nothing when it is disabled
    /// or closed.
    pub fn needs(&self) -> ReasonSet {
        if self.is_enabled() && !self.is_closed() {
            self.accepts()
        } else {
            ReasonSet::empty()
        }
    }

    /// Check whether a report for `reason` goes here.
    pub fn needs_reason(&self, reason: Reason) -> bool {
        self.needs().contains(reason)
    }

    /// Check if enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Resume delivery.
    pub(crate) fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Pause delivery.
    pub(crate) fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Check if closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the sink. Only the first call reaches it.
    ///
    /// # Errors
    /// Returns the sink's error from that first call.
    pub fn close(&self) -> Result<(), SinkError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(dispatcher = %self.name, kind = %self.kind, "closing dispatcher");
        self.sink.close()
    }

    /// Whether this is the terminal dispatcher.
    pub fn is_terminal(&self) -> bool {
        self.sink.is_terminal()
    }

    /// Locale override.
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Reason label style.
    pub fn format_reason(&self) -> ReasonFormat {
        self.format_reason
    }

    /// Output encoding, if any.
    pub fn charset(&self) -> Option<&'static Encoding> {
        self.charset
    }

    /// The wrapped sink.
    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.sink
    }

    /// Whether reports for `reason` get their location appended here.
    pub fn wants_location(&self, reason: Reason) -> bool {
        self.mode().shows_location(reason)
    }

    /// Whether reports for `reason` get the call stack appended here.
    pub fn wants_stack(&self, reason: Reason) -> bool {
        self.mode().shows_stack(reason)
    }

    /// Hand a record to the sink.
    ///
    /// # Errors
    /// [`SinkError::Closed`] after [`Dispatcher::close`], otherwise whatever
    /// the sink returns.
    pub fn log(&self, record: &Record<'_>) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        self.sink.log(record)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(dispatcher = %self.name, error = %e, "dispatcher failed to close");
        }
    }
}

/// One report on its way to one dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// Receiving dispatcher
    pub dispatcher: &'a Dispatcher,
    /// Options of the report
    pub options: &'a ReportOptions,
    /// Reason, possibly rewritten by a filter
    pub reason: Reason,
    /// Message, possibly rewritten by a filter
    pub message: &'a Message,
    /// Text domains used for rendering
    pub domains: &'a Domains,
    /// Id shared by every record of the same report
    pub report_id: u64,
}

impl Record<'_> {
    /// Locale this record renders in: the report's, else the dispatcher's.
    pub fn locale(&self) -> Option<&str> {
        self.options
            .locale
            .as_deref()
            .or_else(|| self.dispatcher.locale())
    }

    /// Only the message text.
    pub fn message_text(&self) -> String {
        self.message.render_in(self.domains, self.locale())
    }

    /// Full text of the report, newline terminated.
    ///
    /// Layout: `[reason: ]message[; system error]`, then the location and
    /// stack lines when the dispatcher's mode asks for them.
    pub fn render(&self) -> String {
        let locale = self.locale();
        let reason = self.reason;

        let label = self.dispatcher.format_reason().apply(
            &Message::new(reason.as_str())
                .domain(INTERNAL_DOMAIN)
                .render_in(self.domains, locale),
        );
        let error = if reason.uses_errno() {
            self.options.os_error().map(strerror)
        } else {
            None
        };

        let layout = match (&label, &error) {
            (Some(_), Some(_)) => "{reason}: {message}; {error}",
            (Some(_), None) => "{reason}: {message}",
            (None, Some(_)) => "{message}; {error}",
            (None, None) => "{message}",
        };
        let mut text = Message::formatted(layout)
            .domain(INTERNAL_DOMAIN)
            .arg("reason", label)
            .arg("message", self.message.render_in(self.domains, locale))
            .arg("error", error)
            .render_in(self.domains, locale);

        let trimmed = text.trim_end_matches('\n').len();
        text.truncate(trimmed);
        text.push('\n');

        if self.dispatcher.wants_location(reason) {
            if let Some(location) = self.options.recorded_location() {
                let line = Message::formatted(" at {filename} line {line}")
                    .domain(INTERNAL_DOMAIN)
                    .arg("filename", location.file.as_str())
                    .arg("line", location.line)
                    .render_in(self.domains, locale);
                text.push_str(&line);
                text.push('\n');
            }
        }

        if self.dispatcher.wants_stack(reason) {
            for frame in self.options.stack.iter().flatten() {
                let line = Message::formatted("{call} at {filename} line {line}")
                    .domain(INTERNAL_DOMAIN)
                    .arg("call", frame.call.as_str())
                    .arg("filename", frame.file.as_str())
                    .arg("line", frame.line)
                    .render_in(self.domains, locale);
                text.push_str(&line);
                text.push('\n');
            }
        }

        text
    }

    /// Rendered text in the dispatcher's charset.
    pub fn encoded(&self) -> Vec<u8> {
        let text = self.render();
        match self.dispatcher.charset() {
            Some(encoding) => encoding.encode(&text).0.into_owned(),
            None => text.into_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::location::{Location, StackFrame};
    use crate::domain::message::__x;
    use crate::infrastructure::mocks::{MockSink, MockTranslator};

    fn dispatcher(options: DispatcherOptions) -> Dispatcher {
        Dispatcher::new("test", "MOCK", Arc::new(MockSink::new()), &options, Mode::Normal)
            .unwrap()
    }

    fn render(d: &Dispatcher, options: &ReportOptions, reason: Reason, msg: &Message) -> String {
        let domains = Domains::new();
        Record {
            dispatcher: d,
            options,
            reason,
            message: msg,
            domains: &domains,
            report_id: 1,
        }
        .render()
    }

    #[test]
    fn test_accept_follows_mode() {
        let d = dispatcher(DispatcherOptions::new());
        assert!(!d.needs_reason(Reason::Info));
        d.set_mode(Mode::Verbose);
        assert!(d.needs_reason(Reason::Info));
        assert_eq!(d.mode(), Mode::Verbose);
    }

    #[test]
    fn test_explicit_accept_survives_mode_change() {
        let d = dispatcher(DispatcherOptions::new().accept("ERROR"));
        d.set_mode(Mode::Debug);
        assert_eq!(d.accepts(), ReasonSet::from(Reason::Error));
    }

    #[test]
    fn test_bad_options_are_config_errors() {
        let sink: Arc<dyn Sink> = Arc::new(MockSink::new());
        let bad_accept = DispatcherOptions::new().accept("ERROR-INFO");
        assert!(matches!(
            Dispatcher::new("x", "MOCK", Arc::clone(&sink), &bad_accept, Mode::Normal),
            Err(ConfigError::Reasons(_))
        ));

        let bad_charset = DispatcherOptions::new().charset("no-such-charset");
        assert!(matches!(
            Dispatcher::new("x", "MOCK", sink, &bad_charset, Mode::Normal),
            Err(ConfigError::UnknownCharset(_))
        ));
    }

    #[test]
    fn test_disabled_and_closed_need_nothing() {
        let d = dispatcher(DispatcherOptions::new());
        d.disable();
        assert!(d.needs().is_empty());
        d.enable();
        assert!(!d.needs().is_empty());
        d.close().unwrap();
        d.close().unwrap();
        assert!(d.needs().is_empty());
    }

    #[test]
    fn test_close_reaches_sink_once() {
        let sink = Arc::new(MockSink::new());
        let d = Dispatcher::new(
            "x",
            "MOCK",
            sink.clone(),
            &DispatcherOptions::new(),
            Mode::Normal,
        )
        .unwrap();
        d.close().unwrap();
        d.close().unwrap();
        drop(d);
        assert_eq!(sink.close_count(), 1);
    }

    #[test]
    fn test_render_label_and_newline() {
        let d = dispatcher(DispatcherOptions::new());
        let opts = ReportOptions::new();
        let msg = Message::literal("disk full\n\n");
        assert_eq!(render(&d, &opts, Reason::Error, &msg), "error: disk full\n");

        let upper = dispatcher(DispatcherOptions::new().format_reason(ReasonFormat::Uppercase));
        assert_eq!(
            render(&upper, &opts, Reason::Notice, &Message::literal("x")),
            "NOTICE: x\n"
        );

        let bare = dispatcher(DispatcherOptions::new().format_reason(ReasonFormat::Ignore));
        assert_eq!(render(&bare, &opts, Reason::Notice, &Message::literal("x")), "x\n");
    }

    #[test]
    fn test_render_errno_only_for_system_reasons() {
        let d = dispatcher(DispatcherOptions::new());
        let opts = ReportOptions::new().errno(2).suppress_location();
        let msg = Message::literal("open");
        let fault = render(&d, &opts, Reason::Fault, &msg);
        assert!(fault.starts_with("fault: open; "));
        assert!(fault.ends_with('\n'));
        assert_eq!(render(&d, &opts, Reason::Error, &msg), "error: open\n");
    }

    #[test]
    fn test_render_location_and_stack() {
        let opts = ReportOptions::new()
            .at(Location::new("src/main.rs", 12))
            .stack(vec![StackFrame {
                call: "app::run".to_string(),
                file: "src/run.rs".to_string(),
                line: 3,
            }]);
        let msg = Message::literal("boom");

        let normal = dispatcher(DispatcherOptions::new());
        assert_eq!(render(&normal, &opts, Reason::Error, &msg), "error: boom\n");
        assert_eq!(
            render(&normal, &opts, Reason::Panic, &msg),
            "panic: boom\n at src/main.rs line 12\napp::run at src/run.rs line 3\n"
        );

        let debug = dispatcher(DispatcherOptions::new().mode(Mode::Debug));
        assert_eq!(
            render(&debug, &opts, Reason::Mistake, &msg),
            "mistake: boom\n at src/main.rs line 12\n"
        );
    }

    #[test]
    fn test_render_in_dispatcher_locale() {
        let domains = Domains::new();
        domains.set_default_translator(Some(Arc::new(
            MockTranslator::new()
                .with("nl", "ERROR", "FOUT")
                .with("nl", "{n} files", "{n} bestanden"),
        )));
        let d = dispatcher(DispatcherOptions::new().locale("nl"));
        let opts = ReportOptions::new();
        let msg = __x("{n} files").arg("n", 3);
        let record = Record {
            dispatcher: &d,
            options: &opts,
            reason: Reason::Error,
            message: &msg,
            domains: &domains,
            report_id: 7,
        };
        assert_eq!(record.render(), "fout: 3 bestanden\n");

        let english = ReportOptions::new().locale("en");
        let record = Record {
            options: &english,
            ..record
        };
        assert_eq!(record.render(), "error: 3 files\n");
    }

    #[test]
    fn test_encoded_uses_charset() {
        let d = dispatcher(DispatcherOptions::new().charset("latin1"));
        let domains = Domains::new();
        let opts = ReportOptions::new();
        let msg = Message::literal("café");
        let record = Record {
            dispatcher: &d,
            options: &opts,
            reason: Reason::Notice,
            message: &msg,
            domains: &domains,
            report_id: 1,
        };
        let bytes = record.encoded();
        assert_eq!(bytes, b"notice: caf\xe9\n".to_vec());
    }
}
