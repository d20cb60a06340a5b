//! Text domains.
//!
//! Every message belongs to a text domain, which decides which translator
//! turns its msgid into a template. Domains are created lazily the first
//! time a message names them and live for as long as the context that owns
//! the registry.

use crate::application::context::ReportingContext;
use crate::application::ports::{TranslationKey, Translator};
use crate::domain::exception::Exception;
use crate::domain::message::{Message, Templates};
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Domain of the labels and layouts this crate renders itself.
pub const INTERNAL_DOMAIN: &str = "report-dispatch";

/// Language msgids are written in unless configured otherwise.
pub const DEFAULT_NATIVE_LANGUAGE: &str = "en";

/// A named text domain.
#[derive(Debug)]
pub struct TextDomain {
    name: String,
    translator: Option<Arc<dyn Translator>>,
    native_language: String,
}

impl TextDomain {
    /// Domain name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Translator configured for this domain.
    pub fn translator(&self) -> Option<&Arc<dyn Translator>> {
        self.translator.as_ref()
    }

    /// Language the msgids of this domain are written in.
    pub fn native_language(&self) -> &str {
        &self.native_language
    }

    /// Check whether `locale` asks for the language the msgids are
    /// already in. `"en_US.UTF-8"` is native to an `"en"` domain.
    pub fn is_native(&self, locale: &str) -> bool {
        let language = locale.split(['_', '-', '.', '@']).next().unwrap_or(locale);
        language.eq_ignore_ascii_case(&self.native_language)
    }
}

/// Registry of text domains.
///
/// Uses a concurrent map so rendering on many threads never blocks on a
/// single lock.
#[derive(Debug, Default)]
pub struct Domains {
    domains: DashMap<String, Arc<TextDomain>>,
    default_translator: RwLock<Option<Arc<dyn Translator>>>,
}

impl Domains {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a domain, creating it on first use.
    pub fn get(&self, name: &str) -> Arc<TextDomain> {
        if let Some(domain) = self.domains.get(name) {
            return Arc::clone(&domain);
        }
        let domain = self
            .domains
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(TextDomain {
                    name: name.to_string(),
                    translator: None,
                    native_language: DEFAULT_NATIVE_LANGUAGE.to_string(),
                })
            });
        Arc::clone(&domain)
    }

    /// Configure a domain, replacing any earlier configuration.
    pub fn configure(
        &self,
        name: &str,
        translator: Option<Arc<dyn Translator>>,
        native_language: impl Into<String>,
    ) -> Arc<TextDomain> {
        let domain = Arc::new(TextDomain {
            name: name.to_string(),
            translator,
            native_language: native_language.into(),
        });
        self.domains.insert(name.to_string(), Arc::clone(&domain));
        tracing::debug!(domain = name, "text domain configured");
        domain
    }

    /// Translator used by domains without one of their own.
    pub fn set_default_translator(&self, translator: Option<Arc<dyn Translator>>) {
        *self
            .default_translator
            .write()
            .unwrap_or_else(PoisonError::into_inner) = translator;
    }

    fn default_translator(&self) -> Option<Arc<dyn Translator>> {
        self.default_translator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of the domains seen so far.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.domains.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of known domains.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Check if no domain was used yet.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl Templates for Domains {
    fn template(&self, message: &Message, locale: Option<&str>) -> Option<String> {
        let msgid = message.msgid()?;
        let locale = locale?;
        let domain = self.get(message.domain_name());
        if domain.is_native(locale) {
            return None;
        }
        let translator = domain
            .translator()
            .cloned()
            .or_else(|| self.default_translator())?;

        translator.translate(&TranslationKey {
            domain: domain.name(),
            msgid,
            plural: message.plural_msgid(),
            count: message.count_value(),
            msgctxt: message.msgctxt(),
            locale,
        })
    }
}

impl Message {
    /// Render through the text domains of the current context.
    ///
    /// `None` renders untranslated unless the message forces a locale.
    pub fn render(&self, locale: Option<&str>) -> String {
        self.render_in(ReportingContext::current().domains(), locale)
    }

    /// Render through a specific domain registry.
    pub fn render_in(&self, domains: &Domains, locale: Option<&str>) -> String {
        self.render_with(locale, domains)
    }
}

impl fmt::Display for Exception {
    /// `"<reason>: <message>"`, rendered without dispatching anything.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.reason().as_str().to_lowercase(),
            self.message().render(None)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::__;
    use crate::domain::options::ReportOptions;
    use crate::domain::reason::Reason;
    use crate::infrastructure::mocks::MockTranslator;

    #[test]
    fn test_domains_are_created_lazily() {
        let domains = Domains::new();
        assert!(domains.is_empty());

        let first = domains.get("app");
        let again = domains.get("app");
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.native_language(), "en");
        assert_eq!(domains.names(), vec!["app".to_string()]);
    }

    #[test]
    fn test_domain_translator_wins_over_default() {
        let domains = Domains::new();
        domains.set_default_translator(Some(Arc::new(
            MockTranslator::new().with("nl", "hello", "hallo (default)"),
        )));
        domains.configure(
            "app",
            Some(Arc::new(MockTranslator::new().with("nl", "hello", "hallo"))),
            "en",
        );

        assert_eq!(__("hello").domain("app").render_in(&domains, Some("nl")), "hallo");
        assert_eq!(
            __("hello").domain("other").render_in(&domains, Some("nl")),
            "hallo (default)"
        );
        assert_eq!(__("hello").domain("app").render_in(&domains, None), "hello");
    }

    #[test]
    fn test_native_language_is_not_translated() {
        let translator = Arc::new(
            MockTranslator::new()
                .with("en", "kleur", "colour")
                .with("nl", "color", "kleur"),
        );
        let domains = Domains::new();
        domains.set_default_translator(Some(translator.clone() as Arc<dyn Translator>));
        domains.configure("dutch", None, "nl");

        assert_eq!(__("color").render_in(&domains, Some("en_GB.UTF-8")), "color");
        assert_eq!(__("color").render_in(&domains, Some("nl")), "kleur");
        assert_eq!(__("kleur").domain("dutch").render_in(&domains, Some("nl-BE")), "kleur");
        assert_eq!(__("kleur").domain("dutch").render_in(&domains, Some("en")), "colour");
        assert_eq!(translator.lookups(), 2);
    }

    #[test]
    fn test_exception_display() {
        let e = Exception::new(Reason::Error, "disk full", ReportOptions::new());
        assert_eq!(e.to_string(), "error: disk full");
    }
}
