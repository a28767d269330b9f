//! Custom Jinja2 filters for Open3E command and value templates
//!
//! These mirror the filters the hub provides, so templates that pass here
//! behave the same once published.

use minijinja::value::{Rest, Value};
use minijinja::{Error, ErrorKind};
use regex::Regex;
use std::convert::TryFrom;

/// Helper to convert Value to f64
fn value_to_f64(value: &Value) -> Option<f64> {
    f64::try_from(value.clone())
        .ok()
        .or_else(|| value.as_i64().map(|i| i as f64))
}

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

// ==================== String Filters ====================

/// Replace matches of a regex pattern with a replacement string
pub fn regex_replace(value: &str, find: &str, replace: &str) -> Result<String, Error> {
    let re = Regex::new(find).map_err(|e| invalid(format!("invalid regex: {}", e)))?;
    Ok(re.replace_all(value, replace).to_string())
}

/// printf-style formatting, `'%02x' | format(value)`
///
/// Supports the `d i u x X o f F s %` conversions with the `- 0 + space`
/// flags, a field width and a precision.
pub fn format(fmt: &str, args: Rest<Value>) -> Result<String, Error> {
    let mut out = String::with_capacity(fmt.len());
    let mut args = args.iter();
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                _ => break,
            }
            chars.next();
        }

        let mut width = String::new();
        while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            width.push(d);
            chars.next();
        }
        spec.width = width.parse().unwrap_or(0);

        if chars.peek() == Some(&'.') {
            chars.next();
            let mut precision = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                precision.push(d);
                chars.next();
            }
            spec.precision = Some(precision.parse().unwrap_or(0));
        }

        let conv = chars
            .next()
            .ok_or_else(|| invalid("incomplete format specifier"))?;
        if conv == '%' {
            out.push('%');
            continue;
        }

        let arg = args
            .next()
            .ok_or_else(|| invalid("not enough arguments for format string"))?;

        let formatted = match conv {
            'd' | 'i' | 'u' => {
                let i = integer_arg(arg, conv)?;
                spec.pad_number(i < 0, &i.unsigned_abs().to_string())
            }
            'x' => {
                let i = integer_arg(arg, conv)?;
                spec.pad_number(i < 0, &format!("{:x}", i.unsigned_abs()))
            }
            'X' => {
                let i = integer_arg(arg, conv)?;
                spec.pad_number(i < 0, &format!("{:X}", i.unsigned_abs()))
            }
            'o' => {
                let i = integer_arg(arg, conv)?;
                spec.pad_number(i < 0, &format!("{:o}", i.unsigned_abs()))
            }
            'f' | 'F' => {
                let f = value_to_f64(arg)
                    .ok_or_else(|| invalid(format!("%{} format: a number is required", conv)))?;
                let digits = format!("{:.*}", spec.precision.unwrap_or(6), f.abs());
                spec.pad_number(f.is_sign_negative() && f != 0.0, &digits)
            }
            's' => {
                let s = match arg.as_str() {
                    Some(s) => s.to_string(),
                    None => arg.to_string(),
                };
                spec.pad_text(&s)
            }
            other => {
                return Err(invalid(format!(
                    "unsupported format character '{}'",
                    other
                )))
            }
        };
        out.push_str(&formatted);
    }

    if args.next().is_some() {
        return Err(invalid("not all arguments converted during string formatting"));
    }

    Ok(out)
}

#[derive(Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    width: usize,
    precision: Option<usize>,
}

impl Spec {
    fn pad_number(&self, negative: bool, digits: &str) -> String {
        let sign = if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        };
        let len = sign.len() + digits.len();
        if len >= self.width {
            return format!("{}{}", sign, digits);
        }
        let fill = self.width - len;
        if self.left {
            format!("{}{}{}", sign, digits, " ".repeat(fill))
        } else if self.zero {
            format!("{}{}{}", sign, "0".repeat(fill), digits)
        } else {
            format!("{}{}{}", " ".repeat(fill), sign, digits)
        }
    }

    fn pad_text(&self, text: &str) -> String {
        let len = text.chars().count();
        if len >= self.width {
            return text.to_string();
        }
        let fill = " ".repeat(self.width - len);
        if self.left {
            format!("{}{}", text, fill)
        } else {
            format!("{}{}", fill, text)
        }
    }
}

/// Integer argument for `%d`/`%x`; integral floats are accepted
fn integer_arg(value: &Value, conv: char) -> Result<i64, Error> {
    if let Some(i) = value.as_i64() {
        return Ok(i);
    }
    match value_to_f64(value) {
        Some(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
        Some(f) if conv == 'd' || conv == 'i' || conv == 'u' => Ok(f.trunc() as i64),
        _ => Err(invalid(format!(
            "%{} format: an integer is required, not {}",
            conv,
            value.kind()
        ))),
    }
}

// ==================== Type Conversion Filters ====================

/// Convert value to float with optional default
pub fn to_float(value: Value, default: Option<Value>) -> Result<Value, Error> {
    let fallback = || match default.as_ref().and_then(value_to_f64) {
        Some(f) => Value::from(f),
        None => Value::from(0.0),
    };

    if value.is_undefined() || value.is_none() || value.as_str() == Some("") {
        return Ok(fallback());
    }

    let result = if let Some(f) = value_to_f64(&value) {
        Some(f)
    } else if let Some(s) = value.as_str() {
        s.trim().parse::<f64>().ok()
    } else {
        None
    };

    match result {
        Some(f) => Ok(Value::from(f)),
        None if default.is_some() => Ok(fallback()),
        None => Err(invalid("cannot convert to float")),
    }
}

/// Convert value to integer with optional default
pub fn to_int(value: Value, default: Option<Value>) -> Result<Value, Error> {
    let fallback = || match &default {
        Some(d) => match d.as_i64() {
            Some(i) => Value::from(i),
            None => Value::from(value_to_f64(d).map(|f| f as i64).unwrap_or(0)),
        },
        None => Value::from(0),
    };

    if value.is_undefined() || value.is_none() || value.as_str() == Some("") {
        return Ok(fallback());
    }

    let result = if let Some(i) = value.as_i64() {
        Some(i)
    } else if let Some(f) = value_to_f64(&value) {
        Some(f as i64)
    } else if let Some(s) = value.as_str() {
        // Try parsing as integer first, then truncate a float
        s.trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64))
    } else {
        None
    };

    match result {
        Some(i) => Ok(Value::from(i)),
        None if default.is_some() => Ok(fallback()),
        None => Err(invalid("cannot convert to int")),
    }
}

// ==================== JSON Filters ====================

/// Convert value to JSON string
pub fn to_json(value: Value) -> Result<String, Error> {
    serde_json::to_string(&value).map_err(|e| invalid(format!("JSON error: {}", e)))
}
