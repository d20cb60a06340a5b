//! Reporting contexts.
//!
//! A [`ReportingContext`] owns a dispatcher registry, the text domains and
//! the plugin table. Handles are cheap to clone; dispatchers are closed,
//! newest first, when the last handle goes away or on
//! [`ReportingContext::shutdown`].
//!
//! Every thread has a stack of entered contexts. Shorthand functions report
//! into the top of that stack, or into the process-global context when
//! nothing was entered. Try scopes push a child context for the duration of
//! their body.

use crate::application::dispatcher::{Dispatcher, DispatcherOptions};
use crate::application::domains::Domains;
use crate::application::ports::{Filter, Sink, Terminator, Translator};
use crate::application::registry::{DispatcherRegistry, FilterEntry, Targets};
use crate::application::try_scope::CollectingSink;
use crate::domain::config::ConfigError;
use crate::domain::exception::Exception;
use crate::domain::message::Message;
use crate::domain::mode::Mode;
use crate::domain::options::ReportOptions;
use crate::domain::reason::{Reason, ReasonSet};
use crate::infrastructure::os::ProcessTerminator;
use crate::infrastructure::sinks::{build_sink, SinkConstructor, SinkKind, TerminalSink};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Name of the terminal dispatcher every context starts with.
pub const DEFAULT_DISPATCHER: &str = "default";

/// Name of the collecting dispatcher inside a try scope.
pub const TRY_DISPATCHER: &str = "try";

type PluginTable = RwLock<HashMap<String, SinkConstructor>>;

thread_local! {
    static CURRENT: RefCell<Vec<ReportingContext>> = const { RefCell::new(Vec::new()) };
}

static GLOBAL: OnceLock<ReportingContext> = OnceLock::new();

/// Link from a try scope's context to the context around it.
pub(crate) struct TryFrame {
    pub(crate) parent: ReportingContext,
    pub(crate) hide: ReasonSet,
    pub(crate) collector: Arc<CollectingSink>,
}

struct ContextInner {
    registry: RwLock<DispatcherRegistry>,
    domains: Arc<Domains>,
    plugins: Arc<PluginTable>,
    terminator: Arc<dyn Terminator>,
    fatal_exit: bool,
    scope: Option<TryFrame>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        let registry = self
            .registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for dispatcher in registry.drain_newest_first() {
            if let Err(e) = dispatcher.close() {
                tracing::warn!(dispatcher = dispatcher.name(), error = %e, "dispatcher failed to close");
            }
        }
    }
}

/// Handle to a set of dispatchers and the text domains they render with.
///
/// # Example
/// ```
/// use report_dispatch::{DispatcherOptions, Message, Reason, ReportOptions, ReportingContext, SinkKind};
///
/// let ctx = ReportingContext::builder().without_default_dispatcher().build();
/// ctx.register(
///     SinkKind::callback(|record| {
///         assert_eq!(record.message_text(), "cache warmed");
///         Ok(())
///     }),
///     "audit",
///     DispatcherOptions::new().accept("INFO-"),
/// )
/// .unwrap();
///
/// let delivered = ctx
///     .report(ReportOptions::new(), Reason::Info, "cache warmed")
///     .unwrap();
/// assert_eq!(delivered.names(), ["audit"]);
/// ```
#[derive(Clone)]
pub struct ReportingContext {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for ReportingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .read_registry()
            .list()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        f.debug_struct("ReportingContext")
            .field("dispatchers", &names)
            .field("fatal_exit", &self.inner.fatal_exit)
            .field("try_scope", &self.inner.scope.is_some())
            .finish()
    }
}

/// Builder for [`ReportingContext`].
pub struct ContextBuilder {
    default_mode: Mode,
    translator: Option<Arc<dyn Translator>>,
    fatal_exit: bool,
    terminator: Option<Arc<dyn Terminator>>,
    default_dispatcher: bool,
}

impl ContextBuilder {
    /// Mode for dispatchers registered without one.
    pub fn with_default_mode(mut self, mode: Mode) -> Self {
        self.default_mode = mode;
        self
    }

    /// Translator for every text domain without one of its own.
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Terminate the process on fatal reports outside try scopes.
    pub fn with_fatal_exit(mut self, fatal_exit: bool) -> Self {
        self.fatal_exit = fatal_exit;
        self
    }

    /// Replace the process exit used by fatal reports.
    pub fn with_terminator(mut self, terminator: Arc<dyn Terminator>) -> Self {
        self.terminator = Some(terminator);
        self
    }

    /// Start without the terminal dispatcher.
    pub fn without_default_dispatcher(mut self) -> Self {
        self.default_dispatcher = false;
        self
    }

    /// Build the context.
    pub fn build(self) -> ReportingContext {
        let domains = Arc::new(Domains::new());
        domains.set_default_translator(self.translator);

        let mut registry = DispatcherRegistry::new(self.default_mode);
        if self.default_dispatcher {
            registry.insert(Arc::new(Dispatcher::with_accept(
                DEFAULT_DISPATCHER,
                "TERMINAL",
                Arc::new(TerminalSink::new()),
                self.default_mode,
                self.default_mode.default_accept(),
            )));
        }

        ReportingContext {
            inner: Arc::new(ContextInner {
                registry: RwLock::new(registry),
                domains,
                plugins: Arc::new(RwLock::new(HashMap::new())),
                terminator: self
                    .terminator
                    .unwrap_or_else(|| Arc::new(ProcessTerminator)),
                fatal_exit: self.fatal_exit,
                scope: None,
            }),
        }
    }
}

/// Keeps a context current on this thread until dropped.
#[must_use = "the context is only current while the guard lives"]
pub struct ContextGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let _ = CURRENT.try_with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl Default for ReportingContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ReportingContext {
    /// Start configuring a context.
    pub fn builder() -> ContextBuilder {
        ContextBuilder {
            default_mode: Mode::Normal,
            translator: None,
            fatal_exit: false,
            terminator: None,
            default_dispatcher: true,
        }
    }

    /// A context with one terminal dispatcher in NORMAL mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-global context.
    pub fn global() -> &'static ReportingContext {
        GLOBAL.get_or_init(ReportingContext::new)
    }

    /// The innermost entered context of this thread, else the global one.
    pub fn current() -> ReportingContext {
        CURRENT
            .try_with(|stack| stack.borrow().last().cloned())
            .ok()
            .flatten()
            .unwrap_or_else(|| Self::global().clone())
    }

    /// Make this context current on this thread until the guard drops.
    pub fn enter(&self) -> ContextGuard {
        CURRENT.with(|stack| stack.borrow_mut().push(self.clone()));
        ContextGuard {
            _not_send: PhantomData,
        }
    }

    /// Run `f` with this context current.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.enter();
        f()
    }

    /// Check whether this thread is inside a try scope.
    pub fn within_try() -> bool {
        CURRENT
            .try_with(|stack| stack.borrow().iter().any(|c| c.is_try_scope()))
            .unwrap_or(false)
    }

    /// Check whether this is the context of a try scope.
    pub fn is_try_scope(&self) -> bool {
        self.inner.scope.is_some()
    }

    pub(crate) fn try_frame(&self) -> Option<&TryFrame> {
        self.inner.scope.as_ref()
    }

    fn same(&self, other: &ReportingContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn descends_from(&self, ancestor: &ReportingContext) -> bool {
        let mut frame = self.try_frame();
        while let Some(f) = frame {
            if f.parent.same(ancestor) {
                return true;
            }
            frame = f.parent.try_frame();
        }
        false
    }

    /// Context a report made through this handle lands in: the innermost
    /// active try scope opened on this context, or the context itself.
    ///
    /// With `below`, only scopes entered before `below` count.
    pub(crate) fn route(&self, below: Option<&ReportingContext>) -> ReportingContext {
        CURRENT
            .try_with(|stack| {
                let stack = stack.borrow();
                let end = below
                    .and_then(|b| stack.iter().rposition(|c| c.same(b)))
                    .unwrap_or(stack.len());
                stack[..end]
                    .iter()
                    .rev()
                    .find(|c| c.descends_from(self))
                    .cloned()
            })
            .ok()
            .flatten()
            .unwrap_or_else(|| self.clone())
    }

    pub(crate) fn fatal_exit(&self) -> bool {
        self.inner.fatal_exit
    }

    pub(crate) fn terminator(&self) -> &Arc<dyn Terminator> {
        &self.inner.terminator
    }

    /// Context for a try scope nested in this one.
    pub(crate) fn try_child(
        &self,
        hide: ReasonSet,
        accept: ReasonSet,
        mode: Mode,
    ) -> (ReportingContext, Arc<CollectingSink>) {
        let collector = Arc::new(CollectingSink::new());
        let mut registry = DispatcherRegistry::new(mode);
        registry.insert(Arc::new(Dispatcher::with_accept(
            TRY_DISPATCHER,
            "TRY",
            Arc::clone(&collector) as Arc<dyn Sink>,
            mode,
            accept,
        )));

        let child = ReportingContext {
            inner: Arc::new(ContextInner {
                registry: RwLock::new(registry),
                domains: Arc::clone(&self.inner.domains),
                plugins: Arc::clone(&self.inner.plugins),
                terminator: Arc::clone(&self.inner.terminator),
                fatal_exit: self.inner.fatal_exit,
                scope: Some(TryFrame {
                    parent: self.clone(),
                    hide,
                    collector: Arc::clone(&collector),
                }),
            }),
        };
        (child, collector)
    }

    pub(crate) fn read_registry(&self) -> RwLockReadGuard<'_, DispatcherRegistry> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, DispatcherRegistry> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Text domains of this context.
    pub fn domains(&self) -> &Arc<Domains> {
        &self.inner.domains
    }

    /// Give a text domain its own translator and native language.
    pub fn configure_domain(
        &self,
        name: &str,
        translator: Option<Arc<dyn Translator>>,
        native_language: impl Into<String>,
    ) {
        self.inner
            .domains
            .configure(name, translator, native_language);
    }

    /// Make a plugin sink kind available to [`SinkKind::Plugin`].
    pub fn register_sink_kind<F>(&self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(&str, &DispatcherOptions) -> Result<Arc<dyn Sink>, String> + Send + Sync + 'static,
    {
        let kind = kind.into();
        tracing::debug!(kind = %kind, "sink kind registered");
        self.inner
            .plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, Arc::new(constructor));
    }

    fn plugin(&self, kind: &str) -> Option<SinkConstructor> {
        self.inner
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .cloned()
    }

    /// Report a configuration problem as ERROR and hand back the exception.
    fn config_error(&self, error: ConfigError) -> Exception {
        tracing::debug!(error = %error, "configuration rejected");
        self.raise(
            ReportOptions::new().suppress_location(),
            Reason::Error,
            Message::literal(error.to_string()),
            None,
        )
    }

    /// Register a dispatcher, replacing and closing one with the same name.
    ///
    /// At most one dispatcher writes to the terminal; a second one under
    /// another name is refused.
    ///
    /// # Errors
    /// Configuration problems are reported as ERROR through this context
    /// and returned.
    pub fn register(
        &self,
        kind: SinkKind,
        name: &str,
        options: DispatcherOptions,
    ) -> Result<Arc<Dispatcher>, Exception> {
        let label = kind.label();
        let default_mode = self.read_registry().default_mode();

        let sink = build_sink(kind, name, &options, |k| self.plugin(k))
            .map_err(|e| self.config_error(e))?;
        let dispatcher = Dispatcher::new(name, label.as_str(), sink, &options, default_mode)
            .map_err(|e| self.config_error(e))?;
        let dispatcher = Arc::new(dispatcher);

        let replaced = {
            let mut registry = self.write_registry();
            if dispatcher.is_terminal() {
                let other = registry
                    .list()
                    .iter()
                    .find(|d| d.is_terminal() && d.name() != name)
                    .map(|d| d.name().to_string());
                if let Some(existing) = other {
                    drop(registry);
                    return Err(self.config_error(ConfigError::SecondTerminal { existing }));
                }
            }
            registry.insert(Arc::clone(&dispatcher))
        };
        tracing::debug!(dispatcher = name, kind = %label, "dispatcher registered");

        if let Some(old) = replaced {
            if let Err(e) = old.close() {
                tracing::warn!(dispatcher = name, error = %e, "replaced dispatcher failed to close");
            }
        }
        Ok(dispatcher)
    }

    /// Remove and close the targeted dispatchers.
    ///
    /// Returns how many were closed.
    pub fn close(&self, targets: impl Into<Targets>) -> usize {
        let removed = self.write_registry().remove(&targets.into());
        for dispatcher in &removed {
            if let Err(e) = dispatcher.close() {
                tracing::warn!(dispatcher = dispatcher.name(), error = %e, "dispatcher failed to close");
            }
        }
        removed.len()
    }

    /// Close every dispatcher, newest first.
    pub fn shutdown(&self) {
        let drained = self.write_registry().drain_newest_first();
        tracing::debug!(count = drained.len(), "shutting down reporting context");
        for dispatcher in drained {
            if let Err(e) = dispatcher.close() {
                tracing::warn!(dispatcher = dispatcher.name(), error = %e, "dispatcher failed to close");
            }
        }
    }

    fn update(&self, targets: &Targets, f: impl Fn(&Dispatcher)) -> usize {
        let mut registry = self.write_registry();
        let selected = registry.select(targets);
        for dispatcher in &selected {
            f(dispatcher);
        }
        registry.rebuild_needs();
        selected.len()
    }

    /// Resume delivery to the targeted dispatchers.
    pub fn enable(&self, targets: impl Into<Targets>) -> usize {
        self.update(&targets.into(), Dispatcher::enable)
    }

    /// Pause delivery to the targeted dispatchers.
    pub fn disable(&self, targets: impl Into<Targets>) -> usize {
        self.update(&targets.into(), Dispatcher::disable)
    }

    /// Switch the mode of the targeted dispatchers.
    ///
    /// [`Targets::All`] also changes the mode of later registrations.
    pub fn set_mode(&self, mode: Mode, targets: impl Into<Targets>) -> usize {
        let targets = targets.into();
        if targets == Targets::All {
            self.write_registry().set_default_mode(mode);
        }
        let changed = self.update(&targets, |d| d.set_mode(mode));
        tracing::trace!(mode = %mode, changed, "mode switched");
        changed
    }

    /// [`set_mode`](Self::set_mode) with a mode name or level.
    ///
    /// # Errors
    /// An unknown mode is reported as ERROR and returned.
    pub fn set_mode_named(&self, mode: &str, targets: impl Into<Targets>) -> Result<usize, Exception> {
        let mode: Mode = mode
            .parse()
            .map_err(|e| self.config_error(ConfigError::from(e)))?;
        Ok(self.set_mode(mode, targets))
    }

    /// Add a filter after the existing ones.
    ///
    /// `dispatchers` limits it to those names; `None` applies it everywhere.
    pub fn register_filter(&self, filter: Arc<dyn Filter>, dispatchers: Option<Vec<String>>) {
        self.write_registry().add_filter(FilterEntry {
            filter,
            dispatchers: dispatchers.map(|names| names.into_iter().collect()),
        });
    }

    /// [`register_filter`](Self::register_filter) for a closure.
    pub fn register_filter_fn<F>(&self, filter: F, dispatchers: Option<Vec<String>>)
    where
        F: Fn(&str, &ReportOptions, Reason, Message) -> Option<(Reason, Message)>
            + Send
            + Sync
            + 'static,
    {
        self.register_filter(Arc::new(filter), dispatchers);
    }

    /// Check whether any dispatcher wants `reason` right now.
    ///
    /// While a try scope opened on this context is active, the scope
    /// answers; hidden reasons are answered by the context around it.
    pub fn needs(&self, reason: Reason) -> bool {
        self.route(None).needs_here(reason)
    }

    fn needs_here(&self, reason: Reason) -> bool {
        if let Some(frame) = self.try_frame() {
            if frame.hide.contains(reason) && !reason.is_fatal() {
                return frame.parent.route(Some(self)).needs_here(reason);
            }
        }
        !self.read_registry().needs(reason).is_empty()
    }

    /// Names of the dispatchers wanting `reason`, in creation order.
    pub fn needs_list(&self, reason: Reason) -> Vec<String> {
        self.read_registry()
            .needs(reason)
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    /// Look up a dispatcher.
    pub fn find(&self, name: &str) -> Option<Arc<Dispatcher>> {
        self.read_registry().find(name)
    }

    /// Dispatchers in creation order.
    pub fn list(&self) -> Vec<Arc<Dispatcher>> {
        self.read_registry().list().to_vec()
    }
}
