//! Mock translator for testing.

use crate::application::ports::{TranslationKey, Translator};
use ahash::AHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Translator backed by a fixed `(locale, msgid) -> text` table.
///
/// # Examples
///
/// ```
/// use report_dispatch::infrastructure::mocks::MockTranslator;
/// use report_dispatch::application::domains::Domains;
/// use report_dispatch::__;
/// use std::sync::Arc;
///
/// let domains = Domains::new();
/// domains.set_default_translator(Some(Arc::new(
///     MockTranslator::new().with("de", "goodbye", "auf Wiedersehen"),
/// )));
/// assert_eq!(__("goodbye").render_in(&domains, Some("de")), "auf Wiedersehen");
/// ```
#[derive(Debug, Default)]
pub struct MockTranslator {
    table: AHashMap<(String, String), String>,
    lookups: AtomicUsize,
}

impl MockTranslator {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a translation.
    pub fn with(
        mut self,
        locale: impl Into<String>,
        msgid: impl Into<String>,
        translation: impl Into<String>,
    ) -> Self {
        self.table
            .insert((locale.into(), msgid.into()), translation.into());
        self
    }

    /// How often `translate` was called.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Translator for MockTranslator {
    fn translate(&self, key: &TranslationKey<'_>) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.table
            .get(&(key.locale.to_string(), key.msgid.to_string()))
            .cloned()
    }
}
