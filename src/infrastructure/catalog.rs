//! In-memory message catalogs.
//!
//! [`CatalogTranslator`] is the built-in [`Translator`]: translations are
//! added in code (or by a loader for some file format) and looked up by
//! locale, message context and msgid. Lookups fall back from the full
//! locale to the language, so `nl_NL.UTF-8` finds entries stored for
//! `nl_NL` or `nl`.
//!
//! # Example
//! ```
//! use report_dispatch::infrastructure::catalog::{CatalogTranslator, PluralRule};
//! use report_dispatch::application::domains::Domains;
//! use report_dispatch::__nx;
//! use std::sync::Arc;
//!
//! let catalog = CatalogTranslator::new()
//!     .with_plural("nl", "one file", ["één bestand", "{_count} bestanden"])
//!     .with_rule("fr", PluralRule::OneUpToTwo);
//!
//! let domains = Domains::new();
//! domains.set_default_translator(Some(Arc::new(catalog)));
//! let msg = __nx("one file", "{_count} files", 4);
//! assert_eq!(msg.render_in(&domains, Some("nl_NL.UTF-8")), "4 bestanden");
//! ```

use crate::application::ports::{TranslationKey, Translator};
use ahash::AHashMap;
use std::fmt;

/// Picks the plural form for a count.
#[derive(Clone, Copy, Default)]
pub enum PluralRule {
    /// One form for every count
    Single,
    /// `n == 1` gets form 0, everything else form 1
    #[default]
    OneOther,
    /// `n <= 1` gets form 0, everything else form 1
    OneUpToTwo,
    /// Three forms, Slavic style: 1, 21, 31.. / 2-4, 22-24.. / rest
    Slavic,
    /// Anything else
    Custom(fn(u64) -> usize),
}

impl PluralRule {
    /// Index of the form to use for `count`.
    pub fn index(self, count: i64) -> usize {
        let n = count.unsigned_abs();
        match self {
            PluralRule::Single => 0,
            PluralRule::OneOther => usize::from(n != 1),
            PluralRule::OneUpToTwo => usize::from(n > 1),
            PluralRule::Slavic => {
                if n % 10 == 1 && n % 100 != 11 {
                    0
                } else if (2..=4).contains(&(n % 10)) && !(12..=14).contains(&(n % 100)) {
                    1
                } else {
                    2
                }
            }
            PluralRule::Custom(rule) => rule(n),
        }
    }
}

impl fmt::Debug for PluralRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluralRule::Single => f.write_str("Single"),
            PluralRule::OneOther => f.write_str("OneOther"),
            PluralRule::OneUpToTwo => f.write_str("OneUpToTwo"),
            PluralRule::Slavic => f.write_str("Slavic"),
            PluralRule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    msgctxt: Option<String>,
    msgid: String,
}

#[derive(Debug, Default)]
struct Catalog {
    rule: PluralRule,
    entries: AHashMap<EntryKey, Vec<String>>,
}

impl Catalog {
    fn lookup(&self, key: &TranslationKey<'_>) -> Option<String> {
        let forms = self.entries.get(&EntryKey {
            msgctxt: key.msgctxt.map(str::to_string),
            msgid: key.msgid.to_string(),
        })?;
        let index = match (key.plural, key.count) {
            (Some(_), Some(count)) => self.rule.index(count),
            _ => 0,
        };
        forms.get(index).or_else(|| forms.last()).cloned()
    }
}

/// Translator over in-memory catalogs, one per locale.
#[derive(Debug, Default)]
pub struct CatalogTranslator {
    catalogs: AHashMap<String, Catalog>,
}

impl CatalogTranslator {
    /// No catalogs yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&mut self, locale: impl Into<String>) -> &mut Catalog {
        self.catalogs.entry(locale.into()).or_default()
    }

    /// Add a translation for `msgid`.
    pub fn with_entry(
        mut self,
        locale: impl Into<String>,
        msgid: impl Into<String>,
        translation: impl Into<String>,
    ) -> Self {
        self.insert(locale, None, msgid, vec![translation.into()]);
        self
    }

    /// Add a translation for `msgid` within a message context.
    pub fn with_context(
        mut self,
        locale: impl Into<String>,
        msgctxt: impl Into<String>,
        msgid: impl Into<String>,
        translation: impl Into<String>,
    ) -> Self {
        self.insert(locale, Some(msgctxt.into()), msgid, vec![translation.into()]);
        self
    }

    /// Add the plural forms for the singular `msgid`.
    pub fn with_plural<I, S>(mut self, locale: impl Into<String>, msgid: impl Into<String>, forms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let forms = forms.into_iter().map(Into::into).collect();
        self.insert(locale, None, msgid, forms);
        self
    }

    /// Set the plural rule of a locale.
    pub fn with_rule(mut self, locale: impl Into<String>, rule: PluralRule) -> Self {
        self.catalog(locale).rule = rule;
        self
    }

    /// Add or replace an entry.
    pub fn insert(
        &mut self,
        locale: impl Into<String>,
        msgctxt: Option<String>,
        msgid: impl Into<String>,
        forms: Vec<String>,
    ) {
        if forms.is_empty() {
            return;
        }
        let key = EntryKey {
            msgctxt,
            msgid: msgid.into(),
        };
        self.catalog(locale).entries.insert(key, forms);
    }

    /// Locales with a catalog, sorted.
    pub fn locales(&self) -> Vec<&str> {
        let mut locales: Vec<&str> = self.catalogs.keys().map(String::as_str).collect();
        locales.sort_unstable();
        locales
    }
}

/// `ll_CC.charset@modifier`, then `ll_CC`, then `ll`.
fn locale_chain(locale: &str) -> Vec<&str> {
    let mut chain = vec![locale];
    let base = locale
        .split(|c| c == '.' || c == '@')
        .next()
        .unwrap_or(locale);
    if base != locale && !base.is_empty() {
        chain.push(base);
    }
    let language = base.split(|c| c == '_' || c == '-').next().unwrap_or(base);
    if language != base && !language.is_empty() {
        chain.push(language);
    }
    chain
}

impl Translator for CatalogTranslator {
    fn translate(&self, key: &TranslationKey<'_>) -> Option<String> {
        locale_chain(key.locale)
            .into_iter()
            .filter_map(|locale| self.catalogs.get(locale))
            .find_map(|catalog| catalog.lookup(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key<'a>(locale: &'a str, msgid: &'a str) -> TranslationKey<'a> {
        TranslationKey {
            domain: "default",
            msgid,
            plural: None,
            count: None,
            msgctxt: None,
            locale,
        }
    }

    #[test]
    fn test_locale_chain() {
        assert_eq!(locale_chain("nl_NL.UTF-8"), vec!["nl_NL.UTF-8", "nl_NL", "nl"]);
        assert_eq!(locale_chain("de-AT"), vec!["de-AT", "de"]);
        assert_eq!(locale_chain("en"), vec!["en"]);
    }

    #[test]
    fn test_fallback_to_language() {
        let catalog = CatalogTranslator::new().with_entry("nl", "yes", "ja");
        assert_eq!(catalog.translate(&key("nl_BE", "yes")), Some("ja".to_string()));
        assert_eq!(catalog.translate(&key("de", "yes")), None);
    }

    #[test]
    fn test_specific_locale_wins() {
        let catalog = CatalogTranslator::new()
            .with_entry("pt", "bus", "autocarro")
            .with_entry("pt_BR", "bus", "ônibus");
        assert_eq!(catalog.translate(&key("pt_BR", "bus")).unwrap(), "ônibus");
        assert_eq!(catalog.translate(&key("pt_PT", "bus")).unwrap(), "autocarro");
    }

    #[test]
    fn test_plural_forms() {
        let catalog = CatalogTranslator::new()
            .with_plural("ru", "{_count} file", ["{_count} файл", "{_count} файла", "{_count} файлов"])
            .with_rule("ru", PluralRule::Slavic);

        let mut k = key("ru", "{_count} file");
        k.plural = Some("{_count} files");
        for (count, expected) in [(1, "{_count} файл"), (3, "{_count} файла"), (11, "{_count} файлов"), (22, "{_count} файла")] {
            k.count = Some(count);
            assert_eq!(catalog.translate(&k).unwrap(), expected);
        }
    }

    #[test]
    fn test_message_context() {
        let catalog = CatalogTranslator::new()
            .with_entry("de", "open", "offen")
            .with_context("de", "menu", "open", "öffnen");
        let mut k = key("de", "open");
        assert_eq!(catalog.translate(&k).unwrap(), "offen");
        k.msgctxt = Some("menu");
        assert_eq!(catalog.translate(&k).unwrap(), "öffnen");
    }

    #[test]
    fn test_plural_rules() {
        assert_eq!(PluralRule::OneOther.index(0), 1);
        assert_eq!(PluralRule::OneOther.index(1), 0);
        assert_eq!(PluralRule::OneUpToTwo.index(0), 0);
        assert_eq!(PluralRule::OneUpToTwo.index(2), 1);
        assert_eq!(PluralRule::Single.index(5), 0);
        assert_eq!(PluralRule::Custom(|n| (n % 3) as usize).index(4), 1);
    }
}
