//! The report engine.
//!
//! Turns one `(options, reason, message)` report into calls on the matching
//! dispatchers:
//!
//! 1. Look up the needs index; nobody listening and not fatal is a no-op.
//! 2. Narrow by the report's and the message's destinations.
//! 3. Record the caller location and, when a dispatcher shows one, a stack.
//! 4. Run the filters of each dispatcher, then log; the terminal dispatcher
//!    always comes last.
//! 5. Fatal reports come back as `Err(Exception)`.
//!
//! A failing sink never stops delivery to the others. Its failure is logged
//! and reported as a non-fatal ERROR to the remaining dispatchers.

use crate::application::context::ReportingContext;
use crate::application::dispatcher::{Dispatcher, Record};
use crate::application::domains::INTERNAL_DOMAIN;
use crate::domain::decode::panic_text;
use crate::domain::exception::{Exception, Rethrow};
use crate::domain::location::{capture_stack, Location};
use crate::domain::message::Message;
use crate::domain::options::{LocationMode, ReportOptions};
use crate::domain::reason::Reason;
use crate::infrastructure::os::last_errno;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Nesting limit for reports about failing dispatchers.
const MAX_FAILURE_DEPTH: usize = 2;

thread_local! {
    static FAILURE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Dispatchers that accepted a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivered {
    dispatchers: Vec<String>,
}

impl Delivered {
    /// Names of the receiving dispatchers, in delivery order.
    pub fn names(&self) -> &[String] {
        &self.dispatchers
    }

    /// Whether nobody received the report.
    pub fn is_lost(&self) -> bool {
        self.dispatchers.is_empty()
    }

    /// Number of receiving dispatchers.
    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    /// Same as [`is_lost`](Self::is_lost).
    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }
}

struct Report {
    delivered: Delivered,
    exception: Exception,
}

impl ReportingContext {
    /// Report `message` for `reason`.
    ///
    /// # Errors
    /// Fatal reports (by reason, or by `options.is_fatal`) return the
    /// exception. With fatal exit enabled and outside any try scope the
    /// process terminates first.
    #[track_caller]
    pub fn report(
        &self,
        options: ReportOptions,
        reason: Reason,
        message: impl Into<Message>,
    ) -> Result<Delivered, Exception> {
        self.dispatch(options, reason, message.into(), Some(Location::caller()))
    }

    /// [`report`](Self::report) with the reason given by name.
    ///
    /// # Errors
    /// An unknown reason is itself reported as ERROR and returned.
    #[track_caller]
    pub fn report_named(
        &self,
        options: ReportOptions,
        reason: &str,
        message: impl Into<Message>,
    ) -> Result<Delivered, Exception> {
        let caller = Location::caller();
        match reason.parse::<Reason>() {
            Ok(reason) => self.dispatch(options, reason, message.into(), Some(caller)),
            Err(e) => Err(self.raise(
                ReportOptions::new(),
                Reason::Error,
                Message::literal(e.to_string()),
                Some(caller),
            )),
        }
    }

    /// Run a report through the engine.
    pub(crate) fn dispatch(
        &self,
        options: ReportOptions,
        reason: Reason,
        message: Message,
        caller: Option<Location>,
    ) -> Result<Delivered, Exception> {
        let is_fatal = options.is_fatal.unwrap_or_else(|| reason.is_fatal());
        let report = self.deliver(options, reason, message, caller, is_fatal);
        if !is_fatal {
            return Ok(report.delivered);
        }

        Err(self.finish_fatal(report.exception))
    }

    /// Report as fatal, whatever the reason.
    pub(crate) fn raise(
        &self,
        mut options: ReportOptions,
        reason: Reason,
        message: Message,
        caller: Option<Location>,
    ) -> Exception {
        options.is_fatal = Some(true);
        let report = self.deliver(options, reason, message, caller, true);
        self.finish_fatal(report.exception)
    }

    fn finish_fatal(&self, exception: Exception) -> Exception {
        if self.fatal_exit() && !self.is_try_scope() && !ReportingContext::within_try() {
            self.terminator().terminate(exception.exit_code());
        }
        exception
    }

    fn deliver(
        &self,
        options: ReportOptions,
        reason: Reason,
        message: Message,
        caller: Option<Location>,
        is_fatal: bool,
    ) -> Report {
        self.route(None)
            .deliver_here(options, reason, message, caller, is_fatal)
    }

    fn deliver_here(
        &self,
        mut options: ReportOptions,
        reason: Reason,
        message: Message,
        caller: Option<Location>,
        is_fatal: bool,
    ) -> Report {
        if let Some(frame) = self.try_frame() {
            if !is_fatal && frame.hide.contains(reason) {
                return frame
                    .parent
                    .route(Some(self))
                    .deliver_here(options, reason, message, caller, is_fatal);
            }
        }

        let (candidates, filters) = {
            let registry = self.read_registry();
            (registry.needs(reason).to_vec(), registry.filters().to_vec())
        };

        if candidates.is_empty() && !is_fatal {
            return Report {
                delivered: Delivered::default(),
                exception: Exception::new(reason, message, options),
            };
        }

        if reason.uses_errno() && options.errno.is_none() {
            options.errno = last_errno();
        }

        // The index may lag behind a state change made between snapshots
        let mut matched = candidates;
        matched.retain(|d| d.needs_reason(reason));
        if let Some(to) = &options.to {
            matched.retain(|d| to.iter().any(|name| name == d.name()));
        }
        let destinations = message.destinations();
        if !destinations.is_empty() {
            matched.retain(|d| destinations.iter().any(|name| name == d.name()));
        }

        if options.location == LocationMode::Capture {
            options.location = match caller {
                Some(location) => LocationMode::At(location),
                None => LocationMode::Suppress,
            };
        }
        if options.stack.is_none() && matched.iter().any(|d| d.wants_stack(reason)) {
            options.stack = Some(capture_stack());
        }
        options.is_fatal = Some(is_fatal);

        let report_id = Exception::next_id();
        matched.sort_by_key(|d| d.is_terminal());

        let mut delivered = Vec::with_capacity(matched.len());
        let mut failures = Vec::new();

        for dispatcher in &matched {
            let mut routed = Some((reason, message.clone()));
            for entry in filters.iter().filter(|f| f.applies_to(dispatcher.name())) {
                let Some((r, m)) = routed.take() else { break };
                routed = entry.filter.apply(dispatcher.name(), &options, r, m);
            }
            let Some((routed_reason, routed_message)) = routed else {
                tracing::trace!(dispatcher = dispatcher.name(), reason = %reason, "report vetoed by filter");
                continue;
            };

            let record = Record {
                dispatcher,
                options: &options,
                reason: routed_reason,
                message: &routed_message,
                domains: self.domains(),
                report_id,
            };

            // A sink that errors or panics must not take the others down
            let result = panic::catch_unwind(AssertUnwindSafe(|| dispatcher.log(&record)));
            match result {
                Ok(Ok(())) => delivered.push(dispatcher.name().to_string()),
                Ok(Err(e)) => failures.push((Arc::clone(dispatcher), e.to_string())),
                Err(payload) => failures.push((Arc::clone(dispatcher), panic_text(&*payload))),
            }
        }

        for (failed, error) in &failures {
            self.report_sink_failure(failed, error, &matched);
        }

        Report {
            delivered: Delivered {
                dispatchers: delivered,
            },
            exception: Exception::from_parts(report_id, reason, message, options),
        }
    }

    fn report_sink_failure(&self, failed: &Dispatcher, error: &str, matched: &[Arc<Dispatcher>]) {
        tracing::warn!(dispatcher = failed.name(), error, "dispatcher failed to log report");

        let others: Vec<String> = matched
            .iter()
            .filter(|d| d.name() != failed.name())
            .map(|d| d.name().to_string())
            .collect();
        if others.is_empty() {
            return;
        }

        let depth = FAILURE_DEPTH.with(Cell::get);
        if depth >= MAX_FAILURE_DEPTH {
            return;
        }
        FAILURE_DEPTH.with(|d| d.set(depth + 1));

        let mut options = ReportOptions::new().suppress_location().fatal(false);
        options.to = Some(others);
        let message = Message::formatted("dispatcher {name} failed: {error}")
            .domain(INTERNAL_DOMAIN)
            .arg("name", failed.name())
            .arg("error", error);
        let _ = self.dispatch(options, Reason::Error, message, None);

        FAILURE_DEPTH.with(|d| d.set(depth));
    }
}

impl Exception {
    /// Report this exception again through the current context.
    ///
    /// # Errors
    /// Returns the exception when it is (still) fatal.
    pub fn throw(&self, overrides: Option<&Rethrow>) -> Result<Delivered, Exception> {
        self.throw_in(&ReportingContext::current(), overrides)
    }

    /// Report this exception again through `ctx`.
    ///
    /// # Errors
    /// Returns the exception when it is (still) fatal.
    pub fn throw_in(
        &self,
        ctx: &ReportingContext,
        overrides: Option<&Rethrow>,
    ) -> Result<Delivered, Exception> {
        let (reason, options) = self.rethrow_parts(overrides);
        ctx.dispatch(options, reason, self.message().clone(), None)
    }
}
