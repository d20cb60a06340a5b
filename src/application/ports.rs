//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::application::dispatcher::Record;
use crate::domain::message::Message;
use crate::domain::options::ReportOptions;
use crate::domain::reason::Reason;
use std::fmt::{self, Debug};
use std::io;

/// Error returned by a sink that could not deliver a report.
#[derive(Debug)]
pub enum SinkError {
    /// Writing failed
    Io(io::Error),
    /// The sink was already closed
    Closed,
    /// Any other failure, described in text
    Other(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "{}", e),
            SinkError::Closed => write!(f, "dispatcher is closed"),
            SinkError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        SinkError::Io(e)
    }
}

/// Port for report destinations.
///
/// The dispatcher wrapping a sink decides which reports reach it; the sink
/// only writes. Infrastructure provides the built-in sinks (terminal, file,
/// callback, tracing) and tests use `MockSink`.
pub trait Sink: Send + Sync + Debug {
    /// Deliver one report.
    ///
    /// # Errors
    /// A failing sink does not stop delivery to the other sinks; the failure
    /// is reported separately.
    fn log(&self, record: &Record<'_>) -> Result<(), SinkError>;

    /// Flush and release resources. Called at most once.
    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// The terminal sink always runs after every other sink of a report.
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Everything a translation lookup is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationKey<'a> {
    /// Text domain
    pub domain: &'a str,
    /// Singular msgid
    pub msgid: &'a str,
    /// Plural msgid
    pub plural: Option<&'a str>,
    /// Count selecting the plural form
    pub count: Option<i64>,
    /// Translation context
    pub msgctxt: Option<&'a str>,
    /// Requested locale
    pub locale: &'a str,
}

/// Port for message catalogs.
///
/// Plural rules and catalog file formats belong to the implementation.
pub trait Translator: Send + Sync + Debug {
    /// The translated template, or `None` to fall back to the msgid.
    fn translate(&self, key: &TranslationKey<'_>) -> Option<String>;
}

/// Port for report filters.
///
/// A filter runs once per report for every dispatcher it applies to, before
/// that dispatcher's sink sees the report. It may rewrite reason and message
/// or return `None` to keep the report from that one dispatcher.
pub trait Filter: Send + Sync {
    /// Inspect or rewrite a report on its way to `dispatcher`.
    fn apply(
        &self,
        dispatcher: &str,
        options: &ReportOptions,
        reason: Reason,
        message: Message,
    ) -> Option<(Reason, Message)>;
}

impl<F> Filter for F
where
    F: Fn(&str, &ReportOptions, Reason, Message) -> Option<(Reason, Message)> + Send + Sync,
{
    fn apply(
        &self,
        dispatcher: &str,
        options: &ReportOptions,
        reason: Reason,
        message: Message,
    ) -> Option<(Reason, Message)> {
        self(dispatcher, options, reason, message)
    }
}

/// Port for ending the process after an uncaught fatal report.
pub trait Terminator: Send + Sync + Debug {
    /// Stop with `code`. Test doubles record the code and return.
    fn terminate(&self, code: i32);
}
