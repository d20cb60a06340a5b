//! Try scopes.
//!
//! A try scope runs a closure against a child context whose only dispatcher
//! collects every report as an [`Exception`]. Reports made inside never
//! reach the real sinks; afterwards the caller inspects the collected
//! exceptions and decides whether to report them through the enclosing
//! context.
//!
//! # Example
//! ```
//! use report_dispatch::{error, notice, ReportingContext};
//!
//! let ctx = ReportingContext::builder().without_default_dispatcher().build();
//! let result = ctx.try_scope(|_| {
//!     notice("starting");
//!     error::<()>("cannot continue")
//! });
//!
//! assert!(result.failed());
//! assert_eq!(result.exceptions().len(), 2);
//! assert_eq!(
//!     result.show_status().as_deref(),
//!     Some("try-block stopped with error: cannot continue")
//! );
//! ```

use crate::application::context::ReportingContext;
use crate::application::dispatcher::Record;
use crate::application::domains::INTERNAL_DOMAIN;
use crate::application::ports::{Sink, SinkError};
use crate::domain::decode::{decode_panic, DecodedPanic};
use crate::domain::exception::{Exception, Rethrow};
use crate::domain::message::Message;
use crate::domain::mode::Mode;
use crate::domain::options::ReportOptions;
use crate::domain::reason::{Reason, ReasonSet};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

/// Configuration of a try scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryOptions {
    /// Non-fatal reasons passed on to the enclosing context
    pub hide: ReasonSet,
    /// Reasons collected
    pub accept: ReasonSet,
    /// Mode of the collecting dispatcher
    pub mode: Mode,
}

impl Default for TryOptions {
    fn default() -> Self {
        Self {
            hide: ReasonSet::empty(),
            accept: ReasonSet::all(),
            mode: Mode::Normal,
        }
    }
}

impl TryOptions {
    /// Collect everything, hide nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass these non-fatal reasons on instead of collecting them.
    pub fn hide(mut self, reasons: impl Into<ReasonSet>) -> Self {
        self.hide = reasons.into();
        self
    }

    /// Collect only these reasons.
    pub fn accept(mut self, reasons: impl Into<ReasonSet>) -> Self {
        self.accept = reasons.into();
        self
    }

    /// Mode of the collecting dispatcher.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

/// Sink of the `try` dispatcher.
#[derive(Debug, Default)]
pub struct CollectingSink {
    collected: Mutex<Vec<Exception>>,
}

impl CollectingSink {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether the report with this id was collected.
    pub fn contains(&self, id: u64) -> bool {
        self.lock().iter().any(|e| e.id() == id)
    }

    /// Number of collected exceptions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn push(&self, exception: Exception) {
        self.lock().push(exception);
    }

    pub(crate) fn take(&self) -> Vec<Exception> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Exception>> {
        self.collected.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sink for CollectingSink {
    fn log(&self, record: &Record<'_>) -> Result<(), SinkError> {
        self.push(Exception::from_parts(
            record.report_id,
            record.reason,
            record.message.clone(),
            record.options.clone(),
        ));
        Ok(())
    }
}

/// Outcome of a try scope.
#[derive(Debug)]
pub struct TryResult<T> {
    value: Option<T>,
    exceptions: Vec<Exception>,
    parent: ReportingContext,
}

impl<T> TryResult<T> {
    /// The body returned a value and nothing fatal was reported.
    pub fn success(&self) -> bool {
        !self.failed()
    }

    /// The body failed or something fatal was reported.
    pub fn failed(&self) -> bool {
        self.value.is_none() || self.exceptions.iter().any(Exception::is_fatal)
    }

    /// Collected exceptions in report order.
    pub fn exceptions(&self) -> &[Exception] {
        &self.exceptions
    }

    /// The fatal exception, if any; with `class`, only when its message
    /// carries that tag.
    pub fn was_fatal(&self, class: Option<&str>) -> Option<&Exception> {
        let fatal = self.exceptions.iter().rev().find(|e| e.is_fatal())?;
        match class {
            Some(tag) if !fatal.in_class(tag) => None,
            _ => Some(fatal),
        }
    }

    /// Report every collected exception through the enclosing context.
    ///
    /// # Errors
    /// Returns the last exception that was fatal again.
    pub fn report_all(&self, overrides: Option<&Rethrow>) -> Result<(), Exception> {
        let mut result = Ok(());
        for exception in &self.exceptions {
            if let Err(e) = exception.throw_in(&self.parent, overrides) {
                result = Err(e);
            }
        }
        result
    }

    /// Report only the fatal exception through the enclosing context.
    ///
    /// # Errors
    /// Returns the exception when it is still fatal after `overrides`.
    pub fn report_fatal(&self, overrides: Option<&Rethrow>) -> Result<(), Exception> {
        match self.was_fatal(None) {
            Some(exception) => exception.throw_in(&self.parent, overrides).map(|_| ()),
            None => Ok(()),
        }
    }

    /// The body's value, if it returned one.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Take the body's value.
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// The value on success, otherwise the fatal exception.
    ///
    /// # Errors
    /// The fatal exception, or the last one collected when the body failed
    /// without a fatal report.
    pub fn into_result(mut self) -> Result<T, Exception> {
        let fatal = self
            .exceptions
            .iter()
            .rposition(Exception::is_fatal)
            .map(|pos| self.exceptions.remove(pos));
        match (self.value.take(), fatal) {
            (Some(value), None) => Ok(value),
            (_, Some(exception)) => Err(exception),
            (None, None) => Err(self.exceptions.pop().unwrap_or_else(|| {
                Exception::new(
                    Reason::Error,
                    Message::new("try-block failed").domain(INTERNAL_DOMAIN),
                    ReportOptions::new().suppress_location().fatal(true),
                )
            })),
        }
    }

    /// One line describing why the scope stopped, if it did.
    pub fn show_status(&self) -> Option<String> {
        let fatal = self.was_fatal(None)?;
        let domains = self.parent.domains();
        Some(
            Message::formatted("try-block stopped with {reason}: {text}")
                .domain(INTERNAL_DOMAIN)
                .arg("reason", fatal.reason().as_str().to_lowercase())
                .arg("text", fatal.message().render_in(domains, None))
                .render_in(domains, None),
        )
    }
}

impl ReportingContext {
    /// Run `work` in a try scope collecting everything.
    pub fn try_scope<T, F>(&self, work: F) -> TryResult<T>
    where
        F: FnOnce(&ReportingContext) -> Result<T, Exception>,
    {
        self.try_scope_with(TryOptions::default(), work)
    }

    /// Run `work` in a try scope.
    ///
    /// Panics inside `work` are caught and reported as fatal through the
    /// scope. An `Err` that was not reported inside is added to the
    /// collected exceptions.
    pub fn try_scope_with<T, F>(&self, options: TryOptions, work: F) -> TryResult<T>
    where
        F: FnOnce(&ReportingContext) -> Result<T, Exception>,
    {
        let (child, collector) = self.try_child(options.hide, options.accept, options.mode);

        let outcome = {
            let _guard = child.enter();
            panic::catch_unwind(AssertUnwindSafe(|| work(&child)))
        };

        let value = match outcome {
            Ok(Ok(value)) => Some(value),
            Ok(Err(exception)) => {
                if !collector.contains(exception.id()) {
                    collector.push(exception);
                }
                None
            }
            Err(payload) => {
                child.report_panic(payload);
                None
            }
        };

        tracing::trace!(
            collected = collector.len(),
            failed = value.is_none(),
            "try scope finished"
        );
        TryResult {
            value,
            exceptions: collector.take(),
            parent: self.clone(),
        }
    }

    fn report_panic(&self, payload: Box<dyn Any + Send>) {
        match decode_panic(payload) {
            DecodedPanic::Exception(exception) => {
                if let Some(frame) = self.try_frame() {
                    if frame.collector.contains(exception.id()) {
                        return;
                    }
                }
                let _ = exception.throw_in(self, Some(&Rethrow::new().fatal(true)));
            }
            DecodedPanic::Report {
                reason,
                message,
                errno,
            } => {
                let mut options = ReportOptions::new()
                    .suppress_location()
                    .fatal(true)
                    .stack(Vec::new());
                options.errno = errno;
                let _ = self.dispatch(options, reason, message, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::DispatcherOptions;
    use crate::infrastructure::mocks::MockSink;
    use crate::infrastructure::sinks::SinkKind;
    use std::sync::Arc;

    fn context_with(sink: &Arc<MockSink>) -> ReportingContext {
        let ctx = ReportingContext::builder()
            .without_default_dispatcher()
            .build();
        ctx.register(
            SinkKind::Custom(sink.clone()),
            "log",
            DispatcherOptions::new().accept("ALL"),
        )
        .unwrap();
        ctx
    }

    #[test]
    fn test_error_inside_try_is_collected() {
        let sink = Arc::new(MockSink::new());
        let ctx = context_with(&sink);

        let result: TryResult<()> = ctx.try_scope(|scope| {
            scope.report(ReportOptions::new(), Reason::Error, "broken")?;
            Ok(())
        });

        assert!(result.failed());
        assert_eq!(result.exceptions().len(), 1);
        assert_eq!(result.was_fatal(None).unwrap().reason(), Reason::Error);
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_success_keeps_value_and_non_fatal_reports() {
        let sink = Arc::new(MockSink::new());
        let ctx = context_with(&sink);

        let result = ctx.try_scope(|scope| {
            scope.report(ReportOptions::new(), Reason::Warning, "careful")?;
            Ok(42)
        });

        assert!(result.success());
        assert_eq!(result.value(), Some(&42));
        assert_eq!(result.exceptions().len(), 1);
        assert!(result.was_fatal(None).is_none());
        assert!(result.show_status().is_none());

        result.report_all(None).unwrap();
        assert_eq!(sink.texts(), vec!["warning: careful\n".to_string()]);
        assert_eq!(result.into_result().unwrap(), 42);
    }

    #[test]
    fn test_unreported_err_is_appended() {
        let ctx = context_with(&Arc::new(MockSink::new()));
        let result: TryResult<()> = ctx.try_scope(|_| {
            Err(Exception::new(Reason::Failure, "direct", ReportOptions::new()))
        });
        assert_eq!(result.exceptions().len(), 1);
        assert_eq!(result.into_result().unwrap_err().reason(), Reason::Failure);
    }

    #[test]
    fn test_panic_is_decoded() {
        let ctx = context_with(&Arc::new(MockSink::new()));
        let result: TryResult<()> = ctx.try_scope(|_| panic!("config missing (os error 2)"));

        assert!(result.failed());
        let fatal = result.was_fatal(None).unwrap();
        assert_eq!(fatal.reason(), Reason::Fault);
        assert_eq!(fatal.errno(), Some(2));
    }

    #[test]
    fn test_hidden_reasons_pass_through() {
        let sink = Arc::new(MockSink::new());
        let ctx = context_with(&sink);

        let result = ctx.try_scope_with(
            TryOptions::new().hide(ReasonSet::range(Reason::Trace, Reason::Info)),
            |scope| {
                scope.report(ReportOptions::new(), Reason::Info, "progress")?;
                scope.report(ReportOptions::new(), Reason::Warning, "odd")?;
                Ok(())
            },
        );

        assert_eq!(result.exceptions().len(), 1);
        assert_eq!(sink.texts(), vec!["info: progress\n".to_string()]);
    }

    #[test]
    fn test_reports_through_outer_handle_are_collected() {
        let sink = Arc::new(MockSink::new());
        let ctx = context_with(&sink);

        let result: TryResult<()> = ctx.try_scope_with(
            TryOptions::new().hide(Reason::Info),
            |_| {
                ctx.report(ReportOptions::new(), Reason::Warning, "inside try")?;
                ctx.report(ReportOptions::new(), Reason::Info, "shown")?;
                assert!(ctx.needs(Reason::Warning));
                ctx.report(ReportOptions::new(), Reason::Error, "stop")?;
                Ok(())
            },
        );

        assert_eq!(result.exceptions().len(), 2);
        assert_eq!(result.was_fatal(None).unwrap().reason(), Reason::Error);
        assert_eq!(sink.texts(), vec!["info: shown\n".to_string()]);

        ctx.report(ReportOptions::new(), Reason::Warning, "after").unwrap();
        assert_eq!(sink.count(), 2);
    }

    #[test]
    fn test_outer_handle_reaches_innermost_scope() {
        let sink = Arc::new(MockSink::new());
        let ctx = context_with(&sink);

        let outer: TryResult<()> = ctx.try_scope(|_| {
            let inner: TryResult<()> = ctx.try_scope(|_| {
                ctx.report(ReportOptions::new(), Reason::Notice, "deep")?;
                Ok(())
            });
            assert_eq!(inner.exceptions().len(), 1);
            inner.report_all(None)
        });

        assert_eq!(outer.exceptions().len(), 1);
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_was_fatal_by_class() {
        let ctx = context_with(&Arc::new(MockSink::new()));
        let result: TryResult<()> = ctx.try_scope(|scope| {
            scope.report(
                ReportOptions::new(),
                Reason::Error,
                Message::new("no disk").tag("io"),
            )?;
            Ok(())
        });
        assert!(result.was_fatal(Some("io")).is_some());
        assert!(result.was_fatal(Some("net")).is_none());
    }

    #[test]
    fn test_report_fatal_with_demotion() {
        let sink = Arc::new(MockSink::new());
        let ctx = context_with(&sink);
        let result: TryResult<()> = ctx.try_scope(|scope| {
            scope.report(ReportOptions::new(), Reason::Notice, "a")?;
            scope.report(ReportOptions::new(), Reason::Error, "b")?;
            Ok(())
        });

        result
            .report_fatal(Some(&Rethrow::new().reason(Reason::Warning)))
            .unwrap();
        assert_eq!(sink.texts(), vec!["warning: b\n".to_string()]);
        assert!(result.report_fatal(None).is_err());
    }
}
