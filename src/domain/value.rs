//! Interpolation values.
//!
//! Values attached to a message are kept unevaluated until the message is
//! rendered. Lazy values are closures run at render time, nested messages
//! are rendered in the locale of the enclosing one.

use crate::domain::message::Message;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Closure producing a value when a message is rendered.
pub type LazyValue = Arc<dyn Fn() -> Value + Send + Sync>;

/// A value that can be interpolated into a message.
#[derive(Clone, Default)]
pub enum Value {
    /// No value; renders as `undef`
    #[default]
    Undef,
    /// Text
    Str(Arc<str>),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// Boolean
    Bool(bool),
    /// List of values, joined with the message's join separator
    Seq(Vec<Value>),
    /// Computed when the message is rendered
    Lazy(LazyValue),
    /// Nested message, rendered in the same locale
    Message(Box<Message>),
}

impl Value {
    /// Wrap a closure evaluated at render time.
    ///
    /// # Example
    /// ```
    /// use report_dispatch::{Message, Value};
    ///
    /// let msg = Message::formatted("pid {pid}").arg("pid", Value::lazy(|| 42));
    /// assert_eq!(msg.render(None), "pid 42");
    /// ```
    pub fn lazy<F, V>(f: F) -> Value
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Value::Lazy(Arc::new(move || f().into()))
    }

    /// Check for [`Value::Undef`].
    pub fn is_undef(&self) -> bool {
        matches!(self, Value::Undef)
    }

    /// Run lazy values until a concrete value remains.
    pub fn resolve(&self) -> Value {
        match self {
            Value::Lazy(f) => f().resolve(),
            other => other.clone(),
        }
    }

    /// Integer view used by numeric conversions.
    pub(crate) fn as_i64(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            Value::UInt(u) => *u as i64,
            Value::Float(f) => *f as i64,
            Value::Bool(b) => i64::from(*b),
            Value::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                    .unwrap_or(0)
            }
            Value::Seq(items) => items.len() as i64,
            Value::Lazy(_) => self.resolve().as_i64(),
            Value::Undef | Value::Message(_) => 0,
        }
    }

    /// Float view used by floating point conversions.
    pub(crate) fn as_f64(&self) -> f64 {
        match self {
            Value::Int(i) => *i as f64,
            Value::UInt(u) => *u as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Str(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            Value::Seq(items) => items.len() as f64,
            Value::Lazy(_) => self.resolve().as_f64(),
            Value::Undef | Value::Message(_) => 0.0,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undef => f.write_str("Undef"),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::UInt(u) => f.debug_tuple("UInt").field(u).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
            Value::Lazy(_) => f.write_str("Lazy(..)"),
            Value::Message(m) => f.debug_tuple("Message").field(m).finish(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Str(Arc::from(s.as_str()))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Str(Arc::from(c.to_string()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

macro_rules! signed_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(i: $t) -> Self {
                Value::Int(i as i64)
            }
        })*
    };
}

macro_rules! unsigned_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(u: $t) -> Self {
                Value::UInt(u as u64)
            }
        })*
    };
}

signed_value!(i8, i16, i32, i64, isize);
unsigned_value!(u8, u16, u32, u64, usize);

impl From<Message> for Value {
    fn from(m: Message) -> Self {
        Value::Message(Box::new(m))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Undef)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(items: &[T]) -> Self {
        Value::Seq(items.iter().cloned().map(Into::into).collect())
    }
}

/// Anything a plural count can be derived from.
///
/// Integers are used as is; collections contribute their length.
pub trait IntoCount {
    /// The count.
    fn into_count(self) -> i64;
}

macro_rules! int_count {
    ($($t:ty),*) => {
        $(impl IntoCount for $t {
            fn into_count(self) -> i64 {
                self as i64
            }
        })*
    };
}

int_count!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<T> IntoCount for &[T] {
    fn into_count(self) -> i64 {
        self.len() as i64
    }
}

impl<T, const N: usize> IntoCount for &[T; N] {
    fn into_count(self) -> i64 {
        N as i64
    }
}

impl<T> IntoCount for &Vec<T> {
    fn into_count(self) -> i64 {
        self.len() as i64
    }
}

impl<T> IntoCount for Vec<T> {
    fn into_count(self) -> i64 {
        self.len() as i64
    }
}

impl<K, V, S> IntoCount for &HashMap<K, V, S> {
    fn into_count(self) -> i64 {
        self.len() as i64
    }
}

impl<K, V> IntoCount for &BTreeMap<K, V> {
    fn into_count(self) -> i64 {
        self.len() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert!(matches!(Value::from(3u8), Value::UInt(3)));
        assert!(matches!(Value::from(-3i32), Value::Int(-3)));
        assert!(matches!(Value::from(None::<i32>), Value::Undef));
        assert!(matches!(Value::from(vec![1, 2]), Value::Seq(ref v) if v.len() == 2));
    }

    #[test]
    fn test_lazy_resolves_at_call() {
        let v = Value::lazy(|| "late");
        assert!(matches!(v.resolve(), Value::Str(ref s) if &**s == "late"));
        assert_eq!(format!("{:?}", v), "Lazy(..)");
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::from(" 12 ").as_i64(), 12);
        assert_eq!(Value::from("2.5").as_f64(), 2.5);
        assert_eq!(Value::from("abc").as_i64(), 0);
        assert_eq!(Value::from(true).as_i64(), 1);
    }

    #[test]
    fn test_counts() {
        let files = vec!["a", "b", "c"];
        assert_eq!((&files).into_count(), 3);
        assert_eq!(files.as_slice().into_count(), 3);
        assert_eq!(7u32.into_count(), 7);

        let mut map = HashMap::new();
        map.insert("k", 1);
        assert_eq!((&map).into_count(), 1);
    }
}
