//! Per-report options.

use crate::domain::location::{Location, StackFrame};

/// Source location handling for one report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LocationMode {
    /// Record the caller's location
    #[default]
    Capture,
    /// Record no location
    Suppress,
    /// Use this location
    At(Location),
}

/// Options that travel with a single report.
///
/// Every field is optional; unset fields fall back to the reason's defaults
/// or to the context.
///
/// # Example
/// ```
/// use report_dispatch::ReportOptions;
///
/// let opts = ReportOptions::new().to("logfile").errno(2).fatal(false);
/// assert_eq!(opts.errno, Some(2));
/// assert_eq!(opts.is_fatal, Some(false));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Only these dispatchers receive the report
    pub to: Option<Vec<String>>,
    /// OS error number to include
    pub errno: Option<i32>,
    /// Override whether the report is fatal
    pub is_fatal: Option<bool>,
    /// Source location handling
    pub location: LocationMode,
    /// Call stack, captured when a dispatcher wants one
    pub stack: Option<Vec<StackFrame>>,
    /// Locale for this report only
    pub locale: Option<String>,
}

impl ReportOptions {
    /// Options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a destination dispatcher.
    pub fn to(mut self, dispatcher: impl Into<String>) -> Self {
        let name = dispatcher.into();
        let to = self.to.get_or_insert_with(Vec::new);
        if !to.contains(&name) {
            to.push(name);
        }
        self
    }

    /// Set the OS error number.
    pub fn errno(mut self, errno: i32) -> Self {
        self.errno = Some(errno);
        self
    }

    /// Override fatality.
    pub fn fatal(mut self, is_fatal: bool) -> Self {
        self.is_fatal = Some(is_fatal);
        self
    }

    /// Do not record a source location.
    pub fn suppress_location(mut self) -> Self {
        self.location = LocationMode::Suppress;
        self
    }

    /// Record this location instead of the caller's.
    pub fn at(mut self, location: Location) -> Self {
        self.location = LocationMode::At(location);
        self
    }

    /// Use this stack instead of capturing one.
    pub fn stack(mut self, frames: Vec<StackFrame>) -> Self {
        self.stack = Some(frames);
        self
    }

    /// Render this report in `locale`.
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// The recorded location, if any.
    pub fn recorded_location(&self) -> Option<&Location> {
        match &self.location {
            LocationMode::At(location) => Some(location),
            _ => None,
        }
    }

    /// The OS error number, ignoring zero.
    pub fn os_error(&self) -> Option<i32> {
        self.errno.filter(|e| *e != 0)
    }

    /// Overlay `overrides` on these options; set fields in `overrides` win.
    pub fn merge(mut self, overrides: &ReportOptions) -> Self {
        if overrides.to.is_some() {
            self.to = overrides.to.clone();
        }
        if overrides.errno.is_some() {
            self.errno = overrides.errno;
        }
        if overrides.is_fatal.is_some() {
            self.is_fatal = overrides.is_fatal;
        }
        if overrides.location != LocationMode::Capture {
            self.location = overrides.location.clone();
        }
        if overrides.stack.is_some() {
            self.stack = overrides.stack.clone();
        }
        if overrides.locale.is_some() {
            self.locale = overrides.locale.clone();
        }
        self
    }
}
