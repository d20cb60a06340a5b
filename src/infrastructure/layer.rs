//! Tracing integration layer.
//!
//! Provides a `tracing_subscriber::Layer` that turns `tracing` events into
//! reports, so libraries that log through `tracing` end up on the same
//! dispatchers as the application's own reports.
//!
//! Events never become fatal: an `error!` event is a non-fatal ERROR. Events
//! emitted by this crate itself (its diagnostics and the
//! [`TracingSink`](crate::infrastructure::sinks::TracingSink) output) are
//! ignored, so a context with a tracing sink does not feed on itself.
//!
//! ```rust,no_run
//! use report_dispatch::ReportLayer;
//! use tracing_subscriber::prelude::*;
//!
//! tracing_subscriber::registry()
//!     .with(ReportLayer::new())
//!     .init();
//!
//! tracing::warn!(disk = "sda1", "disk almost full");
//! ```

use crate::application::context::ReportingContext;
use crate::domain::location::Location;
use crate::domain::message::Message;
use crate::domain::options::{LocationMode, ReportOptions};
use crate::domain::reason::Reason;
use crate::infrastructure::visitor::FieldVisitor;

use std::cell::Cell;
use std::collections::BTreeSet;
use tracing::{Level, Subscriber};
use tracing_subscriber::{layer::Context, Layer};

/// Targets starting with this are never reported.
const OWN_TARGET_PREFIX: &str = "report_dispatch";

thread_local! {
    static IN_LAYER: Cell<bool> = const { Cell::new(false) };
}

/// Reason an event of `level` is reported with.
pub fn reason_for(level: &Level) -> Reason {
    match *level {
        Level::ERROR => Reason::Error,
        Level::WARN => Reason::Warning,
        Level::INFO => Reason::Info,
        _ => Reason::Trace,
    }
}

/// Builder for constructing a [`ReportLayer`].
#[derive(Debug, Default)]
pub struct ReportLayerBuilder {
    context: Option<ReportingContext>,
    max_level: Option<Level>,
    exempt_targets: BTreeSet<String>,
    include_fields: bool,
}

impl ReportLayerBuilder {
    /// Report into this context instead of the current one.
    pub fn with_context(mut self, context: ReportingContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Ignore events more verbose than `level`.
    pub fn with_level(mut self, level: Level) -> Self {
        self.max_level = Some(level);
        self
    }

    /// Ignore events with these exact targets.
    pub fn with_exempt_targets(mut self, targets: Vec<String>) -> Self {
        self.exempt_targets = targets.into_iter().filter(|t| !t.is_empty()).collect();
        self
    }

    /// Append the event's other fields as `key=value` to the message.
    pub fn with_fields(mut self, include: bool) -> Self {
        self.include_fields = include;
        self
    }

    /// Build the layer.
    pub fn build(self) -> ReportLayer {
        ReportLayer {
            context: self.context,
            max_level: self.max_level.unwrap_or(Level::TRACE),
            exempt_targets: self.exempt_targets,
            include_fields: self.include_fields,
        }
    }
}

/// Layer reporting `tracing` events.
#[derive(Debug, Clone)]
pub struct ReportLayer {
    context: Option<ReportingContext>,
    max_level: Level,
    exempt_targets: BTreeSet<String>,
    include_fields: bool,
}

impl ReportLayer {
    /// Start configuring a layer.
    pub fn builder() -> ReportLayerBuilder {
        ReportLayerBuilder::default()
    }

    /// A layer reporting every event into the current context.
    pub fn new() -> Self {
        Self::builder().build()
    }

    fn skips(&self, target: &str, level: &Level) -> bool {
        target.starts_with(OWN_TARGET_PREFIX)
            || *level > self.max_level
            || (!self.exempt_targets.is_empty() && self.exempt_targets.contains(target))
    }

    fn report(&self, event: &tracing::Event<'_>) {
        let metadata = event.metadata();
        let reason = reason_for(metadata.level());
        let context = self
            .context
            .clone()
            .unwrap_or_else(ReportingContext::current);
        if !context.needs(reason) {
            return;
        }

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);
        let mut fields = visitor.into_fields();
        let mut text = fields
            .remove("message")
            .unwrap_or_else(|| metadata.name().to_string());
        if self.include_fields {
            for (key, value) in &fields {
                text.push(' ');
                text.push_str(key);
                text.push('=');
                text.push_str(value);
            }
        }

        let mut options = ReportOptions::new().fatal(false);
        options.location = match (metadata.file(), metadata.line()) {
            (Some(file), Some(line)) => LocationMode::At(Location::new(file, line)),
            _ => LocationMode::Suppress,
        };
        let _ = context.dispatch(options, reason, Message::literal(text), None);
    }
}

impl Default for ReportLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for ReportLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if self.skips(metadata.target(), metadata.level()) {
            return;
        }
        // Sinks that log through tracing would otherwise come back here
        if IN_LAYER.with(|busy| busy.replace(true)) {
            return;
        }
        self.report(event);
        IN_LAYER.with(|busy| busy.set(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::DispatcherOptions;
    use crate::infrastructure::mocks::MockSink;
    use crate::infrastructure::sinks::SinkKind;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    fn context(sink: &Arc<MockSink>) -> ReportingContext {
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
    fn test_level_mapping() {
        assert_eq!(reason_for(&Level::ERROR), Reason::Error);
        assert_eq!(reason_for(&Level::WARN), Reason::Warning);
        assert_eq!(reason_for(&Level::INFO), Reason::Info);
        assert_eq!(reason_for(&Level::DEBUG), Reason::Trace);
        assert_eq!(reason_for(&Level::TRACE), Reason::Trace);
    }

    #[test]
    fn test_events_become_reports() {
        let sink = Arc::new(MockSink::new());
        let layer = ReportLayer::builder()
            .with_context(context(&sink))
            .with_fields(true)
            .build();
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "app::disk", disk = "sda1", "almost full");
            tracing::error!(target: "app::net", "connection lost");
        });

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].reason, Reason::Warning);
        assert_eq!(records[0].message, "almost full disk=sda1");
        assert_eq!(records[1].text, "error: connection lost\n");
    }

    #[test]
    fn test_error_events_are_not_fatal() {
        let sink = Arc::new(MockSink::new());
        let ctx = context(&sink);
        let subscriber =
            tracing_subscriber::registry().with(ReportLayer::builder().with_context(ctx).build());

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "app", "bad");
        });
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn test_own_targets_and_levels_are_skipped() {
        let sink = Arc::new(MockSink::new());
        let layer = ReportLayer::builder()
            .with_context(context(&sink))
            .with_level(Level::INFO)
            .with_exempt_targets(vec!["app::noisy".to_string()])
            .build();
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "report_dispatch::sink", "own output");
            tracing::debug!(target: "app", "too verbose");
            tracing::info!(target: "app::noisy", "exempt");
            tracing::info!(target: "app", "kept");
        });

        assert_eq!(sink.texts(), vec!["info: kept\n".to_string()]);
    }

    #[test]
    fn test_reports_into_current_context() {
        let sink = Arc::new(MockSink::new());
        let ctx = context(&sink);
        let subscriber = tracing_subscriber::registry().with(ReportLayer::new());

        tracing::subscriber::with_default(subscriber, || {
            let _guard = ctx.enter();
            tracing::info!(target: "app", "via current");
        });
        assert_eq!(sink.count(), 1);
    }
}
