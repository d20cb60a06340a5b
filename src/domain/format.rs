//! Printf-style format specifiers for placeholders.
//!
//! Supports `%s %d %i %u %f %F %e %E %g %G %x %X %o %b %c %%` with the flags
//! `-`, `+`, space, `0` and `#`, a field width and a precision. A `*` width
//! is not supported; such a specifier does not parse.

use crate::domain::value::Value;

/// A parsed `%[flags][width][.precision]conversion` specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: char,
}

impl FormatSpec {
    /// Parse a specifier such as `%-8.3f`.
    ///
    /// Returns `None` unless the whole string is a single valid specifier.
    pub fn parse(spec: &str) -> Option<FormatSpec> {
        let mut chars = spec.strip_prefix('%')?.chars().peekable();
        let mut parsed = FormatSpec {
            left: false,
            plus: false,
            space: false,
            zero: false,
            alt: false,
            width: None,
            precision: None,
            conversion: 's',
        };

        while let Some(&c) = chars.peek() {
            match c {
                '-' => parsed.left = true,
                '+' => parsed.plus = true,
                ' ' => parsed.space = true,
                '0' => parsed.zero = true,
                '#' => parsed.alt = true,
                _ => break,
            }
            chars.next();
        }

        let mut digits = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(c);
            chars.next();
        }
        if !digits.is_empty() {
            parsed.width = Some(digits.parse().ok()?);
        }

        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(c);
                chars.next();
            }
            parsed.precision = Some(if digits.is_empty() {
                0
            } else {
                digits.parse().ok()?
            });
        }

        parsed.conversion = chars.next()?;
        if chars.next().is_some() || !"sdiufFeEgGxXobc%".contains(parsed.conversion) {
            return None;
        }
        Some(parsed)
    }

    /// Conversion character.
    pub fn conversion(&self) -> char {
        self.conversion
    }

    /// Format a concrete value.
    ///
    /// Lazy values are resolved first. Sequences and nested messages must be
    /// turned into strings by the caller.
    pub fn apply(&self, value: &Value) -> String {
        let value = value.resolve();
        match self.conversion {
            '%' => "%".to_string(),
            's' => {
                let text = plain_text(&value);
                let text = match self.precision {
                    Some(p) => text.chars().take(p).collect(),
                    None => text,
                };
                self.pad("", text, false)
            }
            'c' => {
                let c = match &value {
                    Value::Str(s) => s.chars().next().unwrap_or('\0'),
                    other => u32::try_from(other.as_i64())
                        .ok()
                        .and_then(char::from_u32)
                        .unwrap_or('\u{FFFD}'),
                };
                self.pad("", c.to_string(), false)
            }
            'd' | 'i' => {
                let n = value.as_i64();
                let digits = self.min_digits(n.unsigned_abs().to_string());
                self.pad(self.sign(n < 0), digits, true)
            }
            'u' => {
                let n = value.as_i64() as u64;
                let digits = self.min_digits(n.to_string());
                self.pad("", digits, true)
            }
            'x' | 'X' | 'o' | 'b' => self.radix(value.as_i64() as u64),
            _ => self.float(value.as_f64()),
        }
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }

    fn min_digits(&self, digits: String) -> String {
        match self.precision {
            Some(p) if digits.len() < p => format!("{}{}", "0".repeat(p - digits.len()), digits),
            _ => digits,
        }
    }

    fn radix(&self, n: u64) -> String {
        let (digits, prefix) = match self.conversion {
            'x' => (format!("{:x}", n), "0x"),
            'X' => (format!("{:X}", n), "0X"),
            'o' => (format!("{:o}", n), "0"),
            _ => (format!("{:b}", n), "0b"),
        };
        let digits = self.min_digits(digits);
        let prefix = if self.alt && n != 0 && !(prefix == "0" && digits.starts_with('0')) {
            prefix
        } else {
            ""
        };
        self.pad(prefix, digits, true)
    }

    fn float(&self, f: f64) -> String {
        let upper = self.conversion.is_ascii_uppercase();
        if !f.is_finite() {
            let text = if f.is_nan() { "nan" } else { "inf" };
            let text = if upper {
                text.to_uppercase()
            } else {
                text.to_string()
            };
            let spec = FormatSpec { zero: false, ..*self };
            return spec.pad(self.sign(f.is_sign_negative() && !f.is_nan()), text, false);
        }

        let precision = self.precision.unwrap_or(6);
        let magnitude = f.abs();
        let body = match self.conversion.to_ascii_lowercase() {
            'f' => format!("{:.*}", precision, magnitude),
            'e' => exponent_form(magnitude, precision, upper),
            _ => self.general(magnitude, precision, upper),
        };
        let body = if self.alt && !body.contains('.') && !body.contains(&['e', 'E'][..]) {
            format!("{}.", body)
        } else {
            body
        };
        self.pad(self.sign(f.is_sign_negative() && f != 0.0), body, true)
    }

    fn general(&self, magnitude: f64, precision: usize, upper: bool) -> String {
        let precision = precision.max(1);
        let exponent = if magnitude == 0.0 {
            0
        } else {
            let probe = format!("{:.*e}", precision - 1, magnitude);
            probe
                .rsplit_once('e')
                .and_then(|(_, exp)| exp.parse::<i32>().ok())
                .unwrap_or(0)
        };

        let body = if exponent < -4 || exponent >= precision as i32 {
            exponent_form(magnitude, precision - 1, upper)
        } else {
            let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
            format!("{:.*}", decimals, magnitude)
        };

        if self.alt {
            return body;
        }
        match body.find(&['e', 'E'][..]) {
            Some(pos) => {
                let (mantissa, exp) = body.split_at(pos);
                format!("{}{}", trim_fraction(mantissa), exp)
            }
            None => trim_fraction(&body).to_string(),
        }
    }

    fn pad(&self, prefix: &str, body: String, numeric: bool) -> String {
        let len = prefix.chars().count() + body.chars().count();
        let width = match self.width {
            Some(w) if w > len => w,
            _ => return format!("{}{}", prefix, body),
        };
        let fill = width - len;

        if self.left {
            format!("{}{}{}", prefix, body, " ".repeat(fill))
        } else if self.zero && numeric && (self.precision.is_none() || "fFeEgG".contains(self.conversion)) {
            format!("{}{}{}", prefix, "0".repeat(fill), body)
        } else {
            format!("{}{}{}", " ".repeat(fill), prefix, body)
        }
    }
}

/// C-style exponent notation: `1.500000e+03`.
fn exponent_form(magnitude: f64, precision: usize, upper: bool) -> String {
    let raw = format!("{:.*e}", precision, magnitude);
    let (mantissa, exp) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:02}", mantissa, e, sign, exp.abs())
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Text of a value without any specifier applied.
pub fn plain_text(value: &Value) -> String {
    match value {
        Value::Undef => "undef".to_string(),
        Value::Str(s) => s.to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Seq(items) => items.iter().map(plain_text).collect::<Vec<_>>().join(" "),
        Value::Lazy(_) => plain_text(&value.resolve()),
        Value::Message(m) => m.msgid().unwrap_or_default().to_string(),
    }
}

/// Apply `spec` to `value`, falling back to plain text when the specifier
/// does not parse.
pub fn format_value(spec: &str, value: &Value) -> String {
    match FormatSpec::parse(spec) {
        Some(parsed) => parsed.apply(value),
        None => plain_text(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(spec: &str, value: impl Into<Value>) -> String {
        format_value(spec, &value.into())
    }

    #[test]
    fn test_parse() {
        let spec = FormatSpec::parse("%-08.3f").unwrap();
        assert!(spec.left && spec.zero);
        assert_eq!(spec.width, Some(8));
        assert_eq!(spec.precision, Some(3));
        assert_eq!(spec.conversion(), 'f');

        assert!(FormatSpec::parse("%*d").is_none());
        assert!(FormatSpec::parse("%q").is_none());
        assert!(FormatSpec::parse("%dx").is_none());
        assert!(FormatSpec::parse("d").is_none());
    }

    #[test]
    fn test_strings() {
        assert_eq!(fmt("%s", "abc"), "abc");
        assert_eq!(fmt("%5s", "abc"), "  abc");
        assert_eq!(fmt("%-5s", "abc"), "abc  ");
        assert_eq!(fmt("%.2s", "abc"), "ab");
        assert_eq!(fmt("%c", 65), "A");
        assert_eq!(fmt("%%", 1), "%");
    }

    #[test]
    fn test_integers() {
        assert_eq!(fmt("%d", 42), "42");
        assert_eq!(fmt("%05d", -42), "-0042");
        assert_eq!(fmt("%+d", 42), "+42");
        assert_eq!(fmt("% d", 42), " 42");
        assert_eq!(fmt("%.4d", 7), "0007");
        assert_eq!(fmt("%i", "12"), "12");
        assert_eq!(fmt("%u", 3), "3");
        assert_eq!(fmt("%d", 3.9), "3");
    }

    #[test]
    fn test_radix() {
        assert_eq!(fmt("%x", 255), "ff");
        assert_eq!(fmt("%X", 255), "FF");
        assert_eq!(fmt("%#x", 255), "0xff");
        assert_eq!(fmt("%#o", 8), "010");
        assert_eq!(fmt("%b", 5), "101");
        assert_eq!(fmt("%#b", 5), "0b101");
        assert_eq!(fmt("%04x", 10), "000a");
        assert_eq!(fmt("%#x", 0), "0");
    }

    #[test]
    fn test_floats() {
        assert_eq!(fmt("%f", 1.5), "1.500000");
        assert_eq!(fmt("%.2f", 3.14159), "3.14");
        assert_eq!(fmt("%08.2f", -3.14159), "-0003.14");
        assert_eq!(fmt("%e", 1500.0), "1.500000e+03");
        assert_eq!(fmt("%.1E", 0.00012), "1.2E-04");
        assert_eq!(fmt("%g", 100000.0), "100000");
        assert_eq!(fmt("%g", 1000000.0), "1e+06");
        assert_eq!(fmt("%g", 0.0001), "0.0001");
        assert_eq!(fmt("%g", 0.00001), "1e-05");
        assert_eq!(fmt("%.3g", 3.14159), "3.14");
        assert_eq!(fmt("%g", 0.0), "0");
        assert_eq!(fmt("%f", f64::INFINITY), "inf");
        assert_eq!(fmt("%F", f64::NAN), "NAN");
    }

    #[test]
    fn test_malformed_spec_falls_back() {
        assert_eq!(fmt("%y", 12), "12");
        assert_eq!(fmt("%", "x"), "x");
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(plain_text(&Value::Undef), "undef");
        assert_eq!(plain_text(&Value::from(2.5)), "2.5");
        assert_eq!(plain_text(&Value::from(vec!["a", "b"])), "a b");
    }
}
