//! Lazily translated messages.
//!
//! A [`Message`] records everything needed to produce text later: the msgid
//! to look up, plural form and count, text domain, translation context,
//! interpolation variables and literal fragments around it. Nothing is
//! translated or formatted until [`Message::render_with`] is called with a
//! locale, so one message can be rendered for several audiences.
//!
//! Messages are immutable values. Builder methods consume `self` and return
//! the modified message; [`Message::with_arg`] clones first for the cases
//! where the original must stay around.

use crate::domain::interpolate::{interpolate, render_value};
use crate::domain::value::{IntoCount, Value};
use std::collections::BTreeMap;
use std::ops::Add;
use std::sync::Arc;

/// Text domain used when none is set.
pub const DEFAULT_DOMAIN: &str = "default";

/// Source of translated templates.
///
/// Implemented by the text-domain registry; the domain layer only needs to
/// ask for a template and fall back to the msgid when there is none.
pub trait Templates {
    /// Translated template for `message` in `locale`, if any.
    fn template(&self, message: &Message, locale: Option<&str>) -> Option<String>;
}

/// Templates source that never translates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Untranslated;

impl Templates for Untranslated {
    fn template(&self, _message: &Message, _locale: Option<&str>) -> Option<String> {
        None
    }
}

/// Text around the translated part of a message.
#[derive(Debug, Clone)]
pub enum Fragment {
    /// Literal text
    Text(Arc<str>),
    /// Another message, rendered in the same locale
    Message(Box<Message>),
}

impl From<&str> for Fragment {
    fn from(s: &str) -> Self {
        Fragment::Text(Arc::from(s))
    }
}

impl From<String> for Fragment {
    fn from(s: String) -> Self {
        Fragment::Text(Arc::from(s))
    }
}

impl From<Message> for Fragment {
    fn from(m: Message) -> Self {
        Fragment::Message(Box::new(m))
    }
}

/// A message whose translation and formatting are delayed until rendering.
#[derive(Debug, Clone)]
pub struct Message {
    msgid: Option<Arc<str>>,
    plural: Option<Arc<str>>,
    count: Option<i64>,
    domain: Arc<str>,
    msgctxt: Option<Arc<str>>,
    prepend: Vec<Fragment>,
    append: Vec<Fragment>,
    tags: Vec<String>,
    to: Vec<String>,
    join: Arc<str>,
    lang: Option<Arc<str>>,
    expand: bool,
    vars: BTreeMap<String, Value>,
}

impl Message {
    fn empty() -> Self {
        Self {
            msgid: None,
            plural: None,
            count: None,
            domain: Arc::from(DEFAULT_DOMAIN),
            msgctxt: None,
            prepend: Vec::new(),
            append: Vec::new(),
            tags: Vec::new(),
            to: Vec::new(),
            join: Arc::from(" "),
            lang: None,
            expand: false,
            vars: BTreeMap::new(),
        }
    }

    /// A message that is never translated.
    pub fn literal(text: impl Into<String>) -> Self {
        let mut msg = Self::empty();
        let text = text.into();
        if !text.is_empty() {
            msg.prepend.push(Fragment::from(text));
        }
        msg
    }

    /// A translatable message without interpolation.
    ///
    /// Whitespace around `msgid` is moved into literal fragments, so the
    /// translation tables only see the bare text.
    pub fn new(msgid: impl AsRef<str>) -> Self {
        let raw = msgid.as_ref();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::literal(raw);
        }

        let mut msg = Self::empty();
        let start = raw.len() - raw.trim_start().len();
        let end = start + trimmed.len();
        if start > 0 {
            msg.prepend.push(Fragment::from(&raw[..start]));
        }
        if end < raw.len() {
            msg.append.push(Fragment::from(&raw[end..]));
        }
        msg.msgid = Some(Arc::from(trimmed));
        msg
    }

    /// A translatable message with `{name}` placeholders.
    pub fn formatted(msgid: impl AsRef<str>) -> Self {
        let mut msg = Self::new(msgid);
        msg.expand = true;
        msg
    }

    /// A translatable message with singular and plural forms.
    pub fn plural(msgid: impl AsRef<str>, plural: impl AsRef<str>, count: impl IntoCount) -> Self {
        let mut msg = Self::new(msgid);
        msg.plural = Some(Arc::from(plural.as_ref().trim()));
        msg.count = Some(count.into_count());
        msg
    }

    /// Plural message with placeholders.
    pub fn formatted_plural(
        msgid: impl AsRef<str>,
        plural: impl AsRef<str>,
        count: impl IntoCount,
    ) -> Self {
        let mut msg = Self::plural(msgid, plural, count);
        msg.expand = true;
        msg
    }

    /// Set an interpolation variable.
    ///
    /// Reserved attribute names are routed to the attribute: `_count`,
    /// `_domain`, `_msgctxt`, `_join`, `_lang`, `_to` and `_tags`.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        if !self.set_attribute(&name, &value) {
            self.vars.insert(name, value);
        }
        self
    }

    fn set_attribute(&mut self, name: &str, value: &Value) -> bool {
        let text = || match value.resolve() {
            Value::Str(s) => Some(s),
            Value::Undef => None,
            other => Some(Arc::from(crate::domain::format::plain_text(&other))),
        };
        match name {
            "_count" => self.count = (!value.is_undef()).then(|| value.as_i64()),
            "_domain" => self.domain = text().unwrap_or_else(|| Arc::from(DEFAULT_DOMAIN)),
            "_msgctxt" => self.msgctxt = text(),
            "_join" => self.join = text().unwrap_or_else(|| Arc::from(" ")),
            "_lang" => self.lang = text(),
            "_to" => {
                if let Some(to) = text() {
                    self.push_destination(&to);
                }
            }
            "_tags" => {
                if let Some(tags) = text() {
                    self.push_tags(&tags);
                }
            }
            _ => return false,
        }
        true
    }

    fn push_tags(&mut self, tags: &str) {
        for tag in tags
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            if !self.tags.iter().any(|t| t == tag) {
                self.tags.push(tag.to_string());
            }
        }
    }

    fn push_destination(&mut self, name: &str) {
        if !self.to.iter().any(|t| t == name) {
            self.to.push(name.to_string());
        }
    }

    /// Set several interpolation variables.
    pub fn args<I, K, V>(self, args: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        args.into_iter().fold(self, |msg, (k, v)| msg.arg(k, v))
    }

    /// Copy of this message with one variable changed.
    ///
    /// # Example
    /// ```
    /// use report_dispatch::__x;
    ///
    /// let five = __x("found {n} files").arg("n", 5);
    /// let three = five.with_arg("n", 3);
    /// assert_eq!(five.render(None), "found 5 files");
    /// assert_eq!(three.render(None), "found 3 files");
    /// ```
    pub fn with_arg(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clone().arg(name, value)
    }

    /// Set the plural count.
    pub fn count(mut self, count: impl IntoCount) -> Self {
        self.count = Some(count.into_count());
        self
    }

    /// Set the text domain.
    pub fn domain(mut self, domain: impl AsRef<str>) -> Self {
        self.domain = Arc::from(domain.as_ref());
        self
    }

    /// Set the translation context.
    pub fn context(mut self, msgctxt: impl AsRef<str>) -> Self {
        self.msgctxt = Some(Arc::from(msgctxt.as_ref()));
        self
    }

    /// Add classification tags; `tags` may hold several separated by commas
    /// or whitespace.
    pub fn tag(mut self, tags: impl AsRef<str>) -> Self {
        self.push_tags(tags.as_ref());
        self
    }

    /// Add an explicit destination dispatcher.
    pub fn to(mut self, dispatcher: impl AsRef<str>) -> Self {
        self.push_destination(dispatcher.as_ref());
        self
    }

    /// Separator used to join sequence values.
    pub fn join_with(mut self, separator: impl AsRef<str>) -> Self {
        self.join = Arc::from(separator.as_ref());
        self
    }

    /// Force the locale this message renders in.
    pub fn lang(mut self, locale: impl AsRef<str>) -> Self {
        self.lang = Some(Arc::from(locale.as_ref()));
        self
    }

    /// Put a fragment in front of the message.
    pub fn prepend(self, fragment: impl Into<Fragment>) -> Self {
        self.concat(fragment, true)
    }

    /// Put a fragment after the message.
    pub fn append(self, fragment: impl Into<Fragment>) -> Self {
        self.concat(fragment, false)
    }

    /// Concatenate without translating anything.
    ///
    /// With `prepend` the fragment goes before everything already in front
    /// of the message, otherwise after everything already behind it.
    pub fn concat(mut self, fragment: impl Into<Fragment>, prepend: bool) -> Self {
        if prepend {
            self.prepend.insert(0, fragment.into());
        } else {
            self.append.push(fragment.into());
        }
        self
    }

    /// The msgid, absent for literal messages.
    pub fn msgid(&self) -> Option<&str> {
        self.msgid.as_deref()
    }

    /// The plural msgid.
    pub fn plural_msgid(&self) -> Option<&str> {
        self.plural.as_deref()
    }

    /// The plural count.
    pub fn count_value(&self) -> Option<i64> {
        self.count
    }

    /// Name of the text domain.
    pub fn domain_name(&self) -> &str {
        &self.domain
    }

    /// The translation context.
    pub fn msgctxt(&self) -> Option<&str> {
        self.msgctxt.as_deref()
    }

    /// Classification tags.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Check whether the message carries `tag`.
    pub fn in_class(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Explicit destination dispatchers.
    pub fn destinations(&self) -> &[String] {
        &self.to
    }

    /// The forced locale.
    pub fn forced_lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    /// Join separator for sequences.
    pub fn separator(&self) -> &str {
        &self.join
    }

    /// Whether placeholders are expanded.
    pub fn is_formatted(&self) -> bool {
        self.expand
    }

    /// A literal message has no msgid and is never translated.
    pub fn is_literal(&self) -> bool {
        self.msgid.is_none()
    }

    /// Value of an interpolation variable or reserved attribute.
    pub fn value_of(&self, name: &str) -> Option<Value> {
        if name.starts_with('_') {
            if let Some(value) = self.attribute(name) {
                return Some(value);
            }
        }
        self.vars.get(name).cloned()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        let text = |s: &Option<Arc<str>>| s.clone().map(Value::Str).unwrap_or(Value::Undef);
        let list = |items: &[String]| {
            if items.is_empty() {
                Value::Undef
            } else {
                Value::Str(Arc::from(items.join(",")))
            }
        };
        Some(match name {
            "_count" => self.count.map(Value::Int).unwrap_or(Value::Undef),
            "_msgid" => text(&self.msgid),
            "_plural" => text(&self.plural),
            "_domain" => Value::Str(self.domain.clone()),
            "_msgctxt" => text(&self.msgctxt),
            "_to" => list(&self.to),
            "_tags" => list(&self.tags),
            "_join" => Value::Str(self.join.clone()),
            "_lang" => text(&self.lang),
            _ => return None,
        })
    }

    /// Untranslated template: the plural form when a plural exists and the
    /// count is not exactly one, otherwise the msgid.
    pub fn fallback_template(&self) -> Option<&str> {
        match (&self.plural, self.count) {
            (Some(plural), count) if count != Some(1) => Some(plural.as_ref()),
            _ => self.msgid.as_deref(),
        }
    }

    /// Render the message.
    ///
    /// `locale` is used unless the message forces its own. Fragments and
    /// nested messages render in the same locale.
    pub fn render_with(&self, locale: Option<&str>, templates: &dyn Templates) -> String {
        let locale = self.lang.as_deref().or(locale);
        let mut out = String::new();

        for fragment in &self.prepend {
            render_fragment(fragment, locale, templates, &mut out);
        }

        if let Some(fallback) = self.fallback_template() {
            let template = templates
                .template(self, locale)
                .unwrap_or_else(|| fallback.to_string());
            if self.expand {
                out.push_str(&self.expand_template(&template, locale, templates));
            } else {
                out.push_str(&template);
            }
        }

        for fragment in &self.append {
            render_fragment(fragment, locale, templates, &mut out);
        }
        out
    }

    fn expand_template(
        &self,
        template: &str,
        locale: Option<&str>,
        templates: &dyn Templates,
    ) -> String {
        interpolate(template, |name, spec| {
            let value = self.value_of(name)?;
            Some(render_value(&value, spec, &self.join, &mut |nested: &Message| {
                nested.render_with(locale, templates)
            }))
        })
    }
}

fn render_fragment(
    fragment: &Fragment,
    locale: Option<&str>,
    templates: &dyn Templates,
    out: &mut String,
) {
    match fragment {
        Fragment::Text(text) => out.push_str(text),
        Fragment::Message(m) => out.push_str(&m.render_with(locale, templates)),
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::literal(s)
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::literal(s)
    }
}

impl From<&String> for Message {
    fn from(s: &String) -> Self {
        Message::literal(s.as_str())
    }
}

impl Add<&str> for Message {
    type Output = Message;

    fn add(self, rhs: &str) -> Message {
        self.concat(rhs, false)
    }
}

impl Add<String> for Message {
    type Output = Message;

    fn add(self, rhs: String) -> Message {
        self.concat(rhs, false)
    }
}

impl Add<Message> for &str {
    type Output = Message;

    fn add(self, rhs: Message) -> Message {
        rhs.concat(self, true)
    }
}

impl Add<Message> for Message {
    type Output = Message;

    fn add(self, rhs: Message) -> Message {
        self.concat(rhs, false)
    }
}

/// Translatable message.
pub fn __(msgid: impl AsRef<str>) -> Message {
    Message::new(msgid)
}

/// Translatable message with placeholders.
pub fn __x(msgid: impl AsRef<str>) -> Message {
    Message::formatted(msgid)
}

/// Translatable message with plural forms.
pub fn __n(msgid: impl AsRef<str>, plural: impl AsRef<str>, count: impl IntoCount) -> Message {
    Message::plural(msgid, plural, count)
}

/// Plural message with placeholders.
///
/// ```
/// use report_dispatch::__nx;
///
/// assert_eq!(__nx("one file", "{_count} files", 1).render(None), "one file");
/// assert_eq!(__nx("one file", "{_count} files", 0).render(None), "0 files");
/// ```
pub fn __nx(msgid: impl AsRef<str>, plural: impl AsRef<str>, count: impl IntoCount) -> Message {
    Message::formatted_plural(msgid, plural, count)
}

/// Translatable message with a translation context.
pub fn __p(msgctxt: impl AsRef<str>, msgid: impl AsRef<str>) -> Message {
    Message::new(msgid).context(msgctxt)
}

/// Message with a context and placeholders.
pub fn __px(msgctxt: impl AsRef<str>, msgid: impl AsRef<str>) -> Message {
    Message::formatted(msgid).context(msgctxt)
}

/// Plural message with a context.
pub fn __np(
    msgctxt: impl AsRef<str>,
    msgid: impl AsRef<str>,
    plural: impl AsRef<str>,
    count: impl IntoCount,
) -> Message {
    Message::plural(msgid, plural, count).context(msgctxt)
}

/// Plural message with a context and placeholders.
pub fn __npx(
    msgctxt: impl AsRef<str>,
    msgid: impl AsRef<str>,
    plural: impl AsRef<str>,
    count: impl IntoCount,
) -> Message {
    Message::formatted_plural(msgid, plural, count).context(msgctxt)
}

/// Marks a msgid for extraction; returns it unchanged.
pub fn n__(msgid: &str) -> &str {
    msgid
}

/// Marks a singular/plural pair for extraction; returns it unchanged.
pub fn n__n<'a>(msgid: &'a str, plural: &'a str) -> (&'a str, &'a str) {
    (msgid, plural)
}

/// Marks each whitespace separated word for extraction.
pub fn n__w(words: &str) -> Vec<&str> {
    words.split_whitespace().collect()
}
