//! Central registry of dispatchers.
//!
//! The registry keeps dispatchers in creation order together with a needs
//! index: for every reason, the dispatchers that currently want it. The
//! index is rebuilt after every change so the report path only does one
//! lookup to learn whether anybody listens.

use crate::application::dispatcher::Dispatcher;
use crate::application::ports::Filter;
use crate::domain::mode::Mode;
use crate::domain::reason::Reason;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Which dispatchers a command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Every dispatcher
    All,
    /// Dispatchers with these names
    Names(Vec<String>),
}

impl Targets {
    /// A single dispatcher.
    pub fn name(name: impl Into<String>) -> Self {
        Targets::Names(vec![name.into()])
    }

    /// Several dispatchers.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Targets::Names(names.into_iter().map(Into::into).collect())
    }

    /// Check whether `name` is targeted.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Targets::All => true,
            Targets::Names(names) => names.iter().any(|n| n == name),
        }
    }
}

impl From<&str> for Targets {
    fn from(name: &str) -> Self {
        Targets::name(name)
    }
}

/// A filter and the dispatchers it applies to (`None` means all).
#[derive(Clone)]
pub struct FilterEntry {
    /// The filter
    pub filter: Arc<dyn Filter>,
    /// Dispatcher names, or `None` for every dispatcher
    pub dispatchers: Option<BTreeSet<String>>,
}

impl FilterEntry {
    /// Check whether this filter runs for `dispatcher`.
    pub fn applies_to(&self, dispatcher: &str) -> bool {
        self.dispatchers
            .as_ref()
            .map_or(true, |names| names.contains(dispatcher))
    }
}

impl fmt::Debug for FilterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterEntry")
            .field("dispatchers", &self.dispatchers)
            .finish_non_exhaustive()
    }
}

/// Registry managing all dispatchers of one reporting context.
#[derive(Debug, Default)]
pub struct DispatcherRegistry {
    dispatchers: Vec<Arc<Dispatcher>>,
    needs: [Vec<Arc<Dispatcher>>; 11],
    filters: Vec<FilterEntry>,
    default_mode: Mode,
}

impl DispatcherRegistry {
    /// Create an empty registry.
    pub fn new(default_mode: Mode) -> Self {
        Self {
            default_mode,
            ..Self::default()
        }
    }

    /// Mode given to dispatchers registered without one.
    pub fn default_mode(&self) -> Mode {
        self.default_mode
    }

    /// Change the mode for later registrations.
    pub fn set_default_mode(&mut self, mode: Mode) {
        self.default_mode = mode;
    }

    /// Add a dispatcher, replacing one with the same name.
    ///
    /// Returns the replaced dispatcher; the caller closes it.
    pub fn insert(&mut self, dispatcher: Arc<Dispatcher>) -> Option<Arc<Dispatcher>> {
        let replaced = self.take(dispatcher.name());
        self.dispatchers.push(dispatcher);
        self.rebuild_needs();
        replaced
    }

    fn take(&mut self, name: &str) -> Option<Arc<Dispatcher>> {
        let pos = self.dispatchers.iter().position(|d| d.name() == name)?;
        Some(self.dispatchers.remove(pos))
    }

    /// Remove the targeted dispatchers, returning them in creation order.
    pub fn remove(&mut self, targets: &Targets) -> Vec<Arc<Dispatcher>> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.dispatchers)
            .into_iter()
            .partition(|d| targets.matches(d.name()));
        self.dispatchers = kept;
        self.rebuild_needs();
        removed
    }

    /// Remove every dispatcher, newest first.
    pub fn drain_newest_first(&mut self) -> Vec<Arc<Dispatcher>> {
        let mut all = std::mem::take(&mut self.dispatchers);
        all.reverse();
        self.rebuild_needs();
        all
    }

    /// Look up a dispatcher by name.
    pub fn find(&self, name: &str) -> Option<Arc<Dispatcher>> {
        self.dispatchers.iter().find(|d| d.name() == name).cloned()
    }

    /// Dispatchers in creation order.
    pub fn list(&self) -> &[Arc<Dispatcher>] {
        &self.dispatchers
    }

    /// Dispatchers matching `targets`.
    pub fn select(&self, targets: &Targets) -> Vec<Arc<Dispatcher>> {
        self.dispatchers
            .iter()
            .filter(|d| targets.matches(d.name()))
            .cloned()
            .collect()
    }

    /// Recompute the needs index from the dispatchers' current state.
    pub fn rebuild_needs(&mut self) {
        for list in self.needs.iter_mut() {
            list.clear();
        }
        for dispatcher in &self.dispatchers {
            for reason in dispatcher.needs().iter() {
                self.needs[reason.index()].push(Arc::clone(dispatcher));
            }
        }
    }

    /// Dispatchers wanting `reason`, in creation order.
    pub fn needs(&self, reason: Reason) -> &[Arc<Dispatcher>] {
        &self.needs[reason.index()]
    }

    /// Add a filter after the existing ones.
    pub fn add_filter(&mut self, entry: FilterEntry) {
        self.filters.push(entry);
    }

    /// Filters in registration order.
    pub fn filters(&self) -> &[FilterEntry] {
        &self.filters
    }

    /// Number of dispatchers.
    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    /// Check if there are no dispatchers.
    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }
}
