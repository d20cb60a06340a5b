//! Shorthand report functions.
//!
//! Each function reports into [`ReportingContext::current`]: the innermost
//! try scope or entered context of this thread, else the global context.
//! Non-fatal reasons return what was delivered; fatal ones return `Err` so
//! the caller can propagate with `?`.
//!
//! # Example
//! ```
//! use report_dispatch::{fault, info, Exception, __x};
//!
//! fn load(path: &str) -> Result<String, Exception> {
//!     info(__x("loading {path}").arg("path", path));
//!     std::fs::read_to_string(path)
//!         .or_else(|e| fault(__x("cannot read {path}: {e}").arg("path", path).arg("e", e.to_string())))
//! }
//! ```

use crate::application::context::ReportingContext;
use crate::application::engine::Delivered;
use crate::application::try_scope::{TryOptions, TryResult};
use crate::domain::exception::Exception;
use crate::domain::location::Location;
use crate::domain::message::Message;
use crate::domain::options::ReportOptions;
use crate::domain::reason::Reason;
use crate::infrastructure::os::failure_status;
use std::process::ExitCode;

macro_rules! non_fatal {
    ($($(#[$doc:meta])* $name:ident => $reason:ident;)*) => {$(
        $(#[$doc])*
        #[track_caller]
        pub fn $name(message: impl Into<Message>) -> Delivered {
            ReportingContext::current()
                .dispatch(
                    ReportOptions::new(),
                    Reason::$reason,
                    message.into(),
                    Some(Location::caller()),
                )
                .unwrap_or_default()
        }
    )*};
}

macro_rules! fatal {
    ($($(#[$doc:meta])* $name:ident => $reason:ident;)*) => {$(
        $(#[$doc])*
        ///
        /// # Errors
        /// Always; the exception describes this report.
        #[track_caller]
        pub fn $name<T>(message: impl Into<Message>) -> Result<T, Exception> {
            Err(ReportingContext::current().raise(
                ReportOptions::new(),
                Reason::$reason,
                message.into(),
                Some(Location::caller()),
            ))
        }
    )*};
}

non_fatal! {
    /// Report a TRACE: debugging output.
    trace => Trace;
    /// Report an ASSERT: a check that should hold failed, carry on.
    assert => Assert;
    /// Report INFO: progress for the user.
    info => Info;
    /// Report a NOTICE: something the user should see.
    notice => Notice;
    /// Report a WARNING: something looks wrong.
    warning => Warning;
    /// Report a MISTAKE: the user did something wrong, carry on.
    mistake => Mistake;
    /// Report an ALERT: the system misbehaves, carry on. Records the OS error.
    alert => Alert;
}

fatal! {
    /// Report an ERROR: the user did something wrong, stop.
    error => Error;
    /// Report a FAULT: a system call failed, stop. Records the OS error.
    fault => Fault;
    /// Report a FAILURE: the system cannot continue. Records the OS error.
    failure => Failure;
    /// Report a PANIC: a bug in the program.
    panic => Panic;
}

/// Report through the current context.
///
/// # Errors
/// Fatal reports return their exception.
#[track_caller]
pub fn report(reason: Reason, message: impl Into<Message>) -> Result<Delivered, Exception> {
    report_with(ReportOptions::new(), reason, message)
}

/// [`report`] with options.
///
/// # Errors
/// Fatal reports return their exception.
#[track_caller]
pub fn report_with(
    options: ReportOptions,
    reason: Reason,
    message: impl Into<Message>,
) -> Result<Delivered, Exception> {
    ReportingContext::current().dispatch(options, reason, message.into(), Some(Location::caller()))
}

/// Run `work` in a try scope of the current context.
pub fn try_scope<T, F>(work: F) -> TryResult<T>
where
    F: FnOnce(&ReportingContext) -> Result<T, Exception>,
{
    ReportingContext::current().try_scope(work)
}

/// [`try_scope`] with options.
pub fn try_scope_with<T, F>(options: TryOptions, work: F) -> TryResult<T>
where
    F: FnOnce(&ReportingContext) -> Result<T, Exception>,
{
    ReportingContext::current().try_scope_with(options, work)
}

/// Top-level handler: run `main` and turn its outcome into an exit code.
///
/// The exception was reported when it was raised; only its exit code is
/// used here.
///
/// # Example
/// ```no_run
/// use report_dispatch::{failure, run_main};
/// use std::process::ExitCode;
///
/// fn main() -> ExitCode {
///     run_main(|| failure("out of disk space"))
/// }
/// ```
pub fn run_main<F>(main: F) -> ExitCode
where
    F: FnOnce() -> Result<(), Exception>,
{
    ExitCode::from(exit_status(main()))
}

fn exit_status(outcome: Result<(), Exception>) -> u8 {
    match outcome {
        Ok(()) => 0,
        Err(exception) => {
            let code = exception.exit_code();
            tracing::debug!(code, reason = %exception.reason(), "main returned an exception");
            failure_status(code)
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

    fn entered(sink: &Arc<MockSink>) -> ReportingContext {
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
    fn test_shorthands_report_into_current() {
        let sink = Arc::new(MockSink::new());
        let ctx = entered(&sink);
        let _guard = ctx.enter();

        assert_eq!(info("hello").names(), ["log"]);
        assert!(warning("careful").len() == 1);
        let err = error::<()>("stop").unwrap_err();
        assert_eq!(err.reason(), Reason::Error);

        assert_eq!(
            sink.texts(),
            vec![
                "info: hello\n".to_string(),
                "warning: careful\n".to_string(),
                "error: stop\n".to_string(),
            ]
        );
    }

    #[test]
    fn test_shorthand_records_caller() {
        let sink = Arc::new(MockSink::new());
        let ctx = entered(&sink);
        let _guard = ctx.enter();

        let line = line!() + 1;
        let err = panic::<()>("bug").unwrap_err();
        assert_eq!(err.location(), Some(&Location::new(file!(), line)));
    }

    #[test]
    fn test_try_scope_uses_current() {
        let sink = Arc::new(MockSink::new());
        let ctx = entered(&sink);
        let _guard = ctx.enter();

        let result = try_scope(|_| {
            mistake("typo");
            error::<u32>("bad input")
        });
        assert!(result.failed());
        assert_eq!(result.exceptions().len(), 2);
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(Ok(())), 0);
        let fault = Exception::new(Reason::Fault, "x", ReportOptions::new().errno(3));
        assert_eq!(exit_status(Err(fault)), 3);
        let error = Exception::new(Reason::Error, "x", ReportOptions::new());
        assert_eq!(exit_status(Err(error)), 1);
        let huge = Exception::new(Reason::Fault, "x", ReportOptions::new().errno(300));
        assert_eq!(exit_status(Err(huge)), 1);
        let wrapping = Exception::new(Reason::Fault, "x", ReportOptions::new().errno(256));
        assert_eq!(exit_status(Err(wrapping)), 1);
    }
}
