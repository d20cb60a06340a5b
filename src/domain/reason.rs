//! Reason taxonomy for reports.
//!
//! A reason classifies a report by severity and by cause. The eleven reasons
//! are totally ordered (TRACE is the least severe, PANIC the most) and carry
//! two derived predicates: whether a report with this reason is fatal by
//! default, and whether it incorporates the operating system's error text.
//!
//! Filters and dispatchers select reasons with a small expression language
//! parsed by [`expand_reasons`]:
//!
//! - a single name: `WARNING`
//! - an inclusive range, either end optional: `NOTICE-`, `-ERROR`, `INFO-FAULT`
//! - a group: `USER`, `PROGRAM`, `SYSTEM`, `FATAL`, `ALL`, `NONE`
//! - a comma separated list of the above: `TRACE,ERROR-`

use std::fmt;
use std::str::FromStr;

/// Severity and cause classification of a report.
///
/// The discriminant is the severity code (1..=11); ordering follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Reason {
    /// Program flow details, for the developer
    Trace = 1,
    /// Internal consistency check that did not hold
    Assert = 2,
    /// Informational progress
    Info = 3,
    /// Something the user should notice
    Notice = 4,
    /// Something looks wrong, processing continues
    Warning = 5,
    /// The user made a mistake, processing continues
    Mistake = 6,
    /// The user made a mistake the program cannot continue from
    Error = 7,
    /// A system call failed, the program cannot continue
    Fault = 8,
    /// A system call failed, processing continues
    Alert = 9,
    /// The system failed in a way the program cannot continue from
    Failure = 10,
    /// The program itself is broken
    Panic = 11,
}

impl Reason {
    /// All reasons, least severe first.
    pub const ALL: [Reason; 11] = [
        Reason::Trace,
        Reason::Assert,
        Reason::Info,
        Reason::Notice,
        Reason::Warning,
        Reason::Mistake,
        Reason::Error,
        Reason::Fault,
        Reason::Alert,
        Reason::Failure,
        Reason::Panic,
    ];

    /// Severity code, 1 (TRACE) to 11 (PANIC).
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a reason by its severity code.
    pub fn from_code(code: u8) -> Option<Reason> {
        match code {
            1..=11 => Some(Self::ALL[usize::from(code) - 1]),
            _ => None,
        }
    }

    /// Zero-based position, used to index per-reason tables.
    pub(crate) fn index(self) -> usize {
        usize::from(self.code()) - 1
    }

    /// Upper-case name, e.g. `"WARNING"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::Trace => "TRACE",
            Reason::Assert => "ASSERT",
            Reason::Info => "INFO",
            Reason::Notice => "NOTICE",
            Reason::Warning => "WARNING",
            Reason::Mistake => "MISTAKE",
            Reason::Error => "ERROR",
            Reason::Fault => "FAULT",
            Reason::Alert => "ALERT",
            Reason::Failure => "FAILURE",
            Reason::Panic => "PANIC",
        }
    }

    /// Whether a report with this reason stops the program by default.
    ///
    /// ```
    /// use report_dispatch::Reason;
    ///
    /// assert!(Reason::Error.is_fatal());
    /// assert!(!Reason::Alert.is_fatal());
    /// ```
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            Reason::Error | Reason::Fault | Reason::Failure | Reason::Panic
        )
    }

    /// Whether the OS error text of the last failed system call belongs in
    /// the report.
    pub fn uses_errno(self) -> bool {
        matches!(self, Reason::Fault | Reason::Alert | Reason::Failure)
    }

    /// Caused by the user of the program.
    pub fn is_user(self) -> bool {
        ReasonGroup::User.reasons().contains(self)
    }

    /// Caused by the program itself.
    pub fn is_program(self) -> bool {
        ReasonGroup::Program.reasons().contains(self)
    }

    /// Caused by the system the program runs on.
    pub fn is_system(self) -> bool {
        ReasonGroup::System.reasons().contains(self)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reason {
    type Err = ReasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Reason::ALL
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ReasonError::Unknown {
                token: name.to_string(),
                spec: s.to_string(),
            })
    }
}

/// Named groups of reasons usable in reason expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonGroup {
    /// Every reason
    All,
    /// ERROR, FAULT, FAILURE, PANIC
    Fatal,
    /// No reason at all
    None,
    /// TRACE, ASSERT, INFO, NOTICE, WARNING, PANIC
    Program,
    /// FAULT, ALERT, FAILURE
    System,
    /// MISTAKE, ERROR
    User,
}

impl ReasonGroup {
    /// Parse a group keyword (case-insensitive).
    pub fn parse(name: &str) -> Option<ReasonGroup> {
        let name = name.trim();
        [
            ("ALL", ReasonGroup::All),
            ("FATAL", ReasonGroup::Fatal),
            ("NONE", ReasonGroup::None),
            ("PROGRAM", ReasonGroup::Program),
            ("SYSTEM", ReasonGroup::System),
            ("USER", ReasonGroup::User),
        ]
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, group)| group)
    }

    /// The reasons in this group.
    pub fn reasons(self) -> ReasonSet {
        use Reason::*;
        match self {
            ReasonGroup::All => ReasonSet::all(),
            ReasonGroup::Fatal => ReasonSet::from_iter([Error, Fault, Failure, Panic]),
            ReasonGroup::None => ReasonSet::empty(),
            ReasonGroup::Program => {
                ReasonSet::from_iter([Trace, Assert, Info, Notice, Warning, Panic])
            }
            ReasonGroup::System => ReasonSet::from_iter([Fault, Alert, Failure]),
            ReasonGroup::User => ReasonSet::from_iter([Mistake, Error]),
        }
    }
}

/// A set of reasons, iterated in severity order.
///
/// Stored as a bit set, so it is `Copy` and cheap to compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ReasonSet(u16);

impl ReasonSet {
    const MASK: u16 = 0b0000_1111_1111_1110;

    /// The empty set.
    pub const fn empty() -> Self {
        ReasonSet(0)
    }

    /// Every reason.
    pub const fn all() -> Self {
        ReasonSet(Self::MASK)
    }

    /// All reasons from `begin` to `end`, inclusive.
    pub fn range(begin: Reason, end: Reason) -> Self {
        Reason::ALL
            .iter()
            .copied()
            .filter(|r| *r >= begin && *r <= end)
            .collect()
    }

    /// `reason` and everything more severe.
    pub fn at_least(reason: Reason) -> Self {
        Self::range(reason, Reason::Panic)
    }

    /// Parse a reason expression, see [`expand_reasons`].
    pub fn parse(spec: &str) -> Result<Self, ReasonError> {
        expand_reasons(spec)
    }

    pub(crate) fn from_bits(bits: u16) -> Self {
        ReasonSet(bits & Self::MASK)
    }

    pub(crate) fn bits(self) -> u16 {
        self.0
    }

    /// Add a reason.
    pub fn insert(&mut self, reason: Reason) {
        self.0 |= 1 << reason.code();
    }

    /// Remove a reason.
    pub fn remove(&mut self, reason: Reason) {
        self.0 &= !(1 << reason.code());
    }

    /// Check membership.
    pub fn contains(self, reason: Reason) -> bool {
        self.0 & (1 << reason.code()) != 0
    }

    /// Check if the set is empty.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of reasons in the set.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Union of two sets.
    pub fn union(self, other: ReasonSet) -> ReasonSet {
        ReasonSet(self.0 | other.0)
    }

    /// Intersection of two sets.
    pub fn intersection(self, other: ReasonSet) -> ReasonSet {
        ReasonSet(self.0 & other.0)
    }

    /// Iterate over the reasons, least severe first.
    pub fn iter(self) -> impl Iterator<Item = Reason> {
        Reason::ALL.into_iter().filter(move |r| self.contains(*r))
    }

    /// Least severe member.
    pub fn min(self) -> Option<Reason> {
        self.iter().next()
    }
}

impl FromIterator<Reason> for ReasonSet {
    fn from_iter<I: IntoIterator<Item = Reason>>(iter: I) -> Self {
        let mut set = ReasonSet::empty();
        for reason in iter {
            set.insert(reason);
        }
        set
    }
}

impl Extend<Reason> for ReasonSet {
    fn extend<I: IntoIterator<Item = Reason>>(&mut self, iter: I) {
        for reason in iter {
            self.insert(reason);
        }
    }
}

impl From<Reason> for ReasonSet {
    fn from(reason: Reason) -> Self {
        ReasonSet::from_iter([reason])
    }
}

impl FromStr for ReasonSet {
    type Err = ReasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        expand_reasons(s)
    }
}

impl fmt::Debug for ReasonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for ReasonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Reason::as_str).collect();
        f.write_str(&names.join(","))
    }
}

/// Error returned when a reason expression cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonError {
    /// A token is neither a reason, a range nor a group
    Unknown {
        /// The offending token
        token: String,
        /// The complete expression
        spec: String,
    },
    /// A range whose start is not strictly less severe than its end
    InvalidRange {
        /// Start of the range
        begin: Reason,
        /// End of the range
        end: Reason,
        /// The complete expression
        spec: String,
    },
}

impl fmt::Display for ReasonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonError::Unknown { token, spec } => {
                write!(f, "unknown reason {} in '{}'", token, spec)
            }
            ReasonError::InvalidRange { begin, end, spec } => {
                write!(
                    f,
                    "reason '{}' more serious than '{}' in '{}'",
                    begin, end, spec
                )
            }
        }
    }
}

impl std::error::Error for ReasonError {}

/// Expand a reason expression into the set of reasons it selects.
///
/// # Errors
/// Returns [`ReasonError::Unknown`] for unrecognized tokens and
/// [`ReasonError::InvalidRange`] when a range start is not strictly less
/// severe than its end.
///
/// # Example
/// ```
/// use report_dispatch::{expand_reasons, Reason};
///
/// let set = expand_reasons("NOTICE-WARNING,PANIC").unwrap();
/// let reasons: Vec<Reason> = set.iter().collect();
/// assert_eq!(reasons, vec![Reason::Notice, Reason::Warning, Reason::Panic]);
///
/// assert!(expand_reasons("ERROR-INFO").is_err());
/// ```
pub fn expand_reasons(spec: &str) -> Result<ReasonSet, ReasonError> {
    let mut set = ReasonSet::empty();

    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some((from, to)) = token.split_once('-') {
            let parse_end = |name: &str, default: Reason| -> Result<Reason, ReasonError> {
                let name = name.trim();
                if name.is_empty() {
                    return Ok(default);
                }
                name.parse::<Reason>().map_err(|_| ReasonError::Unknown {
                    token: name.to_string(),
                    spec: spec.to_string(),
                })
            };
            let begin = parse_end(from, Reason::Trace)?;
            let end = parse_end(to, Reason::Panic)?;

            if begin >= end {
                return Err(ReasonError::InvalidRange {
                    begin,
                    end,
                    spec: spec.to_string(),
                });
            }
            set = set.union(ReasonSet::range(begin, end));
        } else if let Ok(reason) = token.parse::<Reason>() {
            set.insert(reason);
        } else if let Some(group) = ReasonGroup::parse(token) {
            set = set.union(group.reasons());
        } else {
            return Err(ReasonError::Unknown {
                token: token.to_string(),
                spec: spec.to_string(),
            });
        }
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_ordered() {
        for (i, reason) in Reason::ALL.iter().enumerate() {
            assert_eq!(reason.code() as usize, i + 1);
            assert_eq!(Reason::from_code(reason.code()), Some(*reason));
        }
        assert!(Reason::Trace < Reason::Panic);
        assert_eq!(Reason::from_code(0), None);
        assert_eq!(Reason::from_code(12), None);
    }

    #[test]
    fn test_fatal_and_errno_flags() {
        let fatal: Vec<Reason> = Reason::ALL.iter().copied().filter(|r| r.is_fatal()).collect();
        assert_eq!(
            fatal,
            vec![Reason::Error, Reason::Fault, Reason::Failure, Reason::Panic]
        );

        let errno: Vec<Reason> = Reason::ALL
            .iter()
            .copied()
            .filter(|r| r.uses_errno())
            .collect();
        assert_eq!(errno, vec![Reason::Fault, Reason::Alert, Reason::Failure]);
    }

    #[test]
    fn test_single_reason_expands_to_itself() {
        for reason in Reason::ALL {
            let set = expand_reasons(reason.as_str()).unwrap();
            assert_eq!(set.len(), 1);
            assert!(set.contains(reason));
        }
    }

    #[test]
    fn test_ranges() {
        let set = expand_reasons("INFO-MISTAKE").unwrap();
        let reasons: Vec<Reason> = set.iter().collect();
        assert_eq!(
            reasons,
            vec![Reason::Info, Reason::Notice, Reason::Warning, Reason::Mistake]
        );

        assert_eq!(
            expand_reasons("NOTICE-").unwrap(),
            ReasonSet::at_least(Reason::Notice)
        );
        assert_eq!(
            expand_reasons("-ASSERT").unwrap(),
            ReasonSet::from_iter([Reason::Trace, Reason::Assert])
        );
        assert_eq!(expand_reasons("-").unwrap(), ReasonSet::all());
    }

    #[test]
    fn test_invalid_ranges() {
        let err = expand_reasons("ERROR-INFO").unwrap_err();
        assert_eq!(
            err,
            ReasonError::InvalidRange {
                begin: Reason::Error,
                end: Reason::Info,
                spec: "ERROR-INFO".to_string()
            }
        );

        // start must be strictly less severe
        assert!(expand_reasons("WARNING-WARNING").is_err());
        assert!(expand_reasons("PANIC-").is_err());
    }

    #[test]
    fn test_groups_and_lists() {
        assert_eq!(expand_reasons("ALL").unwrap(), ReasonSet::all());
        assert!(expand_reasons("NONE").unwrap().is_empty());
        assert_eq!(
            expand_reasons("USER").unwrap(),
            ReasonSet::from_iter([Reason::Mistake, Reason::Error])
        );
        assert_eq!(
            expand_reasons("system").unwrap(),
            ReasonSet::from_iter([Reason::Fault, Reason::Alert, Reason::Failure])
        );

        let set = expand_reasons("TRACE, FATAL").unwrap();
        assert_eq!(set.len(), 5);
        assert!(set.contains(Reason::Trace));
        assert!(!set.contains(Reason::Alert));
    }

    #[test]
    fn test_unknown_token() {
        let err = expand_reasons("INFO,BOGUS").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown reason BOGUS in 'INFO,BOGUS'"
        );
        assert!(expand_reasons("INFO-NOPE").is_err());
    }

    #[test]
    fn test_empty_expression() {
        assert!(expand_reasons("").unwrap().is_empty());
        assert!(expand_reasons(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_reason_set_operations() {
        let mut set = ReasonSet::empty();
        set.insert(Reason::Panic);
        set.insert(Reason::Trace);
        assert_eq!(set.len(), 2);
        assert_eq!(set.min(), Some(Reason::Trace));
        assert_eq!(set.to_string(), "TRACE,PANIC");

        set.remove(Reason::Trace);
        assert_eq!(set, ReasonSet::from(Reason::Panic));
        assert_eq!(ReasonSet::from_bits(ReasonSet::all().bits()), ReasonSet::all());
        assert_eq!(ReasonSet::all().len(), 11);
    }

    #[test]
    fn test_group_predicates() {
        assert!(Reason::Mistake.is_user());
        assert!(Reason::Panic.is_program());
        assert!(Reason::Alert.is_system());
        assert!(!Reason::Error.is_system());
    }
}
