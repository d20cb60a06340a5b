//! # report-dispatch
//!
//! Severity-classified reporting with multi-destination dispatch, try scopes
//! and lazily translated messages.
//!
//! Application code reports a *reason* (how bad is it, whose fault is it)
//! and a *message*. The reporting context sends the report to every
//! *dispatcher* that wants that reason: the terminal, a log file, a
//! callback, `tracing`, or anything implementing [`Sink`]. Fatal reasons
//! come back as `Err(Exception)` so they propagate with `?`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use report_dispatch::{
//!     fault, info, run_main, DispatcherOptions, Exception, Mode, ReportingContext, SinkKind, __x,
//! };
//! use std::process::ExitCode;
//!
//! fn load(path: &str) -> Result<String, Exception> {
//!     info(__x("reading {file}").arg("file", path));
//!     std::fs::read_to_string(path).or_else(|_| fault(__x("cannot read {file}").arg("file", path)))
//! }
//!
//! fn main() -> ExitCode {
//!     let ctx = ReportingContext::global();
//!     ctx.register(
//!         SinkKind::File("app.log".into()),
//!         "logfile",
//!         DispatcherOptions::new().mode(Mode::Verbose),
//!     )
//!     .ok();
//!
//!     run_main(|| {
//!         let config = load("app.toml")?;
//!         info(__x("{n} bytes of configuration").arg("n", config.len()));
//!         Ok(())
//!     })
//! }
//! ```
//!
//! ## Reasons
//!
//! | Reason    | Fatal | Whose problem | OS error |
//! |-----------|-------|---------------|----------|
//! | `TRACE`   | no    | program       | no       |
//! | `ASSERT`  | no    | program       | no       |
//! | `INFO`    | no    | program       | no       |
//! | `NOTICE`  | no    | program       | no       |
//! | `WARNING` | no    | program       | no       |
//! | `MISTAKE` | no    | user          | no       |
//! | `ERROR`   | yes   | user          | no       |
//! | `FAULT`   | yes   | system        | yes      |
//! | `ALERT`   | no    | system        | yes      |
//! | `FAILURE` | yes   | system        | yes      |
//! | `PANIC`   | yes   | program       | no       |
//!
//! Dispatchers select reasons with expressions such as `"NOTICE-"`,
//! `"INFO-ERROR"`, `"USER,PANIC"` (see [`expand_reasons`]), or follow
//! their [`Mode`]: NORMAL shows `NOTICE-`, VERBOSE `INFO-`, ASSERT
//! `ASSERT-` and DEBUG everything.
//!
//! ## Messages
//!
//! [`Message`] values stay unrendered until a dispatcher needs text, so
//! every dispatcher can render in its own locale. Placeholders look like
//! `{name}` or `{name%05.1f}`:
//!
//! ```
//! use report_dispatch::__x;
//!
//! let found = __x("found {n} files").arg("n", 5);
//! let fewer = found.clone().arg("n", 3);
//! assert_eq!(found.render(None), "found 5 files");
//! assert_eq!(fewer.render(None), "found 3 files");
//!
//! let framed = "[" + found + "]";
//! assert_eq!(framed.render(None), "[found 5 files]");
//! ```
//!
//! ## Try Scopes
//!
//! A try scope collects the reports made inside it instead of sending
//! them out, then lets the caller decide:
//!
//! ```
//! use report_dispatch::{error, warning, ReportingContext};
//!
//! let ctx = ReportingContext::builder().without_default_dispatcher().build();
//! let result = ctx.try_scope(|_| {
//!     warning("disk almost full");
//!     error::<()>("cannot write")
//! });
//!
//! assert!(result.failed());
//! assert_eq!(result.exceptions().len(), 2);
//! result.report_all(None).ok();
//! ```
//!
//! ## Translation
//!
//! Each message belongs to a text domain; a domain's [`Translator`] turns
//! msgids into templates for a locale. [`CatalogTranslator`] keeps
//! translations in memory with pluggable plural rules.
//!
//! ## Tracing Integration
//!
//! [`TracingSink`] forwards reports as `tracing` events and [`ReportLayer`]
//! turns `tracing` events into (never fatal) reports.
//!
//! ## Fail-Safe Operation
//!
//! A sink that returns an error or panics never stops delivery to the
//! other dispatchers; the failure is logged through `tracing::warn!` and
//! reported as a non-fatal ERROR to the remaining dispatchers.

#![warn(missing_docs)]

// Domain layer - pure reporting concepts
pub mod domain;

// Application layer - dispatch orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Shorthand report functions
pub mod api;

// Re-export commonly used types for convenience
pub use domain::{
    config::ConfigError,
    exception::{Exception, Rethrow},
    location::{Location, StackFrame},
    message::{
        Fragment, Message, DEFAULT_DOMAIN, __, __n, __np, __npx, __nx, __p, __px, __x, n__, n__n,
        n__w,
    },
    mode::{Mode, ReasonFormat, UnknownMode, UnknownReasonFormat},
    options::{LocationMode, ReportOptions},
    reason::{expand_reasons, Reason, ReasonError, ReasonGroup, ReasonSet},
    value::{IntoCount, Value},
};

pub use application::{
    context::{
        ContextBuilder, ContextGuard, ReportingContext, DEFAULT_DISPATCHER, TRY_DISPATCHER,
    },
    dispatcher::{Dispatcher, DispatcherOptions, Record},
    domains::{Domains, TextDomain, INTERNAL_DOMAIN},
    engine::Delivered,
    ports::{Filter, Sink, SinkError, Terminator, TranslationKey, Translator},
    registry::Targets,
    try_scope::{CollectingSink, TryOptions, TryResult},
};

pub use infrastructure::{
    catalog::{CatalogTranslator, PluralRule},
    layer::{ReportLayer, ReportLayerBuilder},
    os::{strerror, ProcessTerminator},
    sinks::{
        CallbackSink, FileSink, ReasonLevels, RecordCallback, SinkConstructor, SinkKind,
        TerminalSink, TracingSink, SINK_TARGET,
    },
};

pub use api::{
    alert, assert, error, failure, fault, info, mistake, notice, panic, report, report_with,
    run_main, trace, try_scope, try_scope_with, warning,
};
