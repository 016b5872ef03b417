//! Text rendering helpers for alert reporting
//!
//! Two small languages live here:
//! - `{{config-type/config-key}}` placeholders, resolved against a cluster's
//!   configuration map before a URI or script path is used.
//! - positional reporting templates such as `TCP OK - {0:.4f} response on port {1}`,
//!   rendered with the arguments an alert check produced.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::{Error, Result};

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{(\S+?)\}\}").expect("placeholder pattern is valid");
}

/// Substitute every `{{type/key}}` token in `value`.
///
/// A value without placeholders is returned unchanged. If any referenced key is
/// missing from `configurations` the value is unresolved and `None` is returned.
pub fn resolve_placeholders(value: &str, configurations: &HashMap<String, String>) -> Option<String> {
    let mut missing = false;
    let resolved = PLACEHOLDER.replace_all(value, |caps: &Captures<'_>| {
        match configurations.get(&caps[1]) {
            Some(v) => v.clone(),
            None => {
                missing = true;
                String::new()
            }
        }
    });

    if missing {
        None
    } else {
        Some(resolved.into_owned())
    }
}

/// One positional argument of a reporting template.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatArg {
    Text(String),
    Int(i64),
    Number(f64),
    Bool(bool),
    None,
}

impl FormatArg {
    fn as_f64(&self) -> Option<f64> {
        match self {
            FormatArg::Int(i) => Some(*i as f64),
            FormatArg::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, FormatArg::Int(_) | FormatArg::Number(_))
    }
}

impl fmt::Display for FormatArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatArg::Text(s) => write!(f, "{}", s),
            FormatArg::Int(i) => write!(f, "{}", i),
            FormatArg::Number(n) => write!(f, "{}", n),
            FormatArg::Bool(true) => write!(f, "True"),
            FormatArg::Bool(false) => write!(f, "False"),
            FormatArg::None => write!(f, "None"),
        }
    }
}

impl From<&str> for FormatArg {
    fn from(s: &str) -> Self {
        FormatArg::Text(s.to_string())
    }
}

impl From<String> for FormatArg {
    fn from(s: String) -> Self {
        FormatArg::Text(s)
    }
}

impl From<f64> for FormatArg {
    fn from(n: f64) -> Self {
        FormatArg::Number(n)
    }
}

impl From<i64> for FormatArg {
    fn from(i: i64) -> Self {
        FormatArg::Int(i)
    }
}

impl From<u16> for FormatArg {
    fn from(i: u16) -> Self {
        FormatArg::Int(i64::from(i))
    }
}

impl<T: Into<FormatArg>> From<Option<T>> for FormatArg {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FormatArg::None)
    }
}

impl From<&Value> for FormatArg {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => FormatArg::None,
            Value::Bool(b) => FormatArg::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FormatArg::Int(i),
                None => FormatArg::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FormatArg::Text(s.clone()),
            other => FormatArg::Text(other.to_string()),
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    width: Option<usize>,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> Result<Self> {
        let chars: Vec<char> = spec.chars().collect();
        let mut parsed = FormatSpec::default();
        let mut i = 0;

        if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^') {
            parsed.fill = Some(chars[0]);
            parsed.align = Some(chars[1]);
            i = 2;
        } else if !chars.is_empty() && matches!(chars[0], '<' | '>' | '^') {
            parsed.align = Some(chars[0]);
            i = 1;
        }

        let width_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i > width_start {
            let digits: String = chars[width_start..i].iter().collect();
            parsed.width = digits.parse().ok();
        }

        if i < chars.len() && chars[i] == '.' {
            i += 1;
            let precision_start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i == precision_start {
                return Err(Error::Template(format!("format specifier '{}' is missing a precision", spec)));
            }
            let digits: String = chars[precision_start..i].iter().collect();
            parsed.precision = digits.parse().ok();
        }

        match chars.len() - i {
            0 => {}
            1 if matches!(chars[i], 'f' | 'F' | 'd' | 's' | '%') => parsed.kind = Some(chars[i]),
            _ => {
                return Err(Error::Template(format!("unsupported format specifier '{}'", spec)));
            }
        }

        Ok(parsed)
    }

    fn apply(&self, arg: &FormatArg) -> Result<String> {
        let body = match self.kind {
            Some('f') | Some('F') => {
                let value = arg.as_f64().ok_or_else(|| {
                    Error::Template(format!("cannot format '{}' as a fixed point number", arg))
                })?;
                format!("{:.*}", self.precision.unwrap_or(6), value)
            }
            Some('%') => {
                let value = arg.as_f64().ok_or_else(|| {
                    Error::Template(format!("cannot format '{}' as a percentage", arg))
                })?;
                format!("{:.*}%", self.precision.unwrap_or(6), value * 100.0)
            }
            Some('d') => match arg {
                FormatArg::Int(i) => i.to_string(),
                FormatArg::Number(n) if n.fract() == 0.0 => format!("{:.0}", n),
                other => {
                    return Err(Error::Template(format!("cannot format '{}' as an integer", other)));
                }
            },
            _ => match (self.precision, arg) {
                (Some(p), FormatArg::Number(n)) => format!("{:.*}", p, n),
                (Some(p), FormatArg::Text(s)) => s.chars().take(p).collect(),
                _ => arg.to_string(),
            },
        };

        let width = match self.width {
            Some(w) => w,
            None => return Ok(body),
        };
        let len = body.chars().count();
        if len >= width {
            return Ok(body);
        }

        let fill = self.fill.unwrap_or(' ');
        let pad = width - len;
        let default_align = if arg.is_numeric() { '>' } else { '<' };
        let (left, right) = match self.align.unwrap_or(default_align) {
            '>' => (pad, 0),
            '^' => (pad / 2, pad - pad / 2),
            _ => (0, pad),
        };

        let mut out = String::with_capacity(width);
        out.extend(std::iter::repeat(fill).take(left));
        out.push_str(&body);
        out.extend(std::iter::repeat(fill).take(right));
        Ok(out)
    }
}

/// Render a positional reporting template.
///
/// Supports `{N}`, `{}` (automatic numbering), `{N:spec}` with
/// `[[fill]align][width][.precision][type]` and `{{` / `}}` escapes.
pub fn format_reporting_text(template: &str, args: &[FormatArg]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_auto = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for f in chars.by_ref() {
                    if f == '}' {
                        closed = true;
                        break;
                    }
                    field.push(f);
                }
                if !closed {
                    return Err(Error::Template(format!("unterminated field in '{}'", template)));
                }

                let (index, spec) = match field.split_once(':') {
                    Some((index, spec)) => (index, Some(spec)),
                    None => (field.as_str(), None),
                };

                let index = if index.is_empty() {
                    next_auto += 1;
                    next_auto - 1
                } else {
                    index.parse::<usize>().map_err(|_| {
                        Error::Template(format!("field '{}' is not a positional index", index))
                    })?
                };

                let arg = args.get(index).ok_or_else(|| {
                    Error::Template(format!(
                        "template references {{{}}} but only {} argument(s) were produced",
                        index,
                        args.len()
                    ))
                })?;

                match spec {
                    Some(spec) => out.push_str(&FormatSpec::parse(spec)?.apply(arg)?),
                    None => out.push_str(&arg.to_string()),
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(Error::Template(format!("single '}}' encountered in '{}'", template)));
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_resolve_placeholders() {
        let c = configs(&[("hdfs-site/my-key", "c6401:50070")]);
        assert_eq!(resolve_placeholders("{{hdfs-site/my-key}}", &c).as_deref(), Some("c6401:50070"));
        assert_eq!(
            resolve_placeholders("http://{{hdfs-site/my-key}}/jmx", &c).as_deref(),
            Some("http://c6401:50070/jmx")
        );
        assert_eq!(resolve_placeholders("http://c6401.ambari.apache.org", &c).as_deref(), Some("http://c6401.ambari.apache.org"));
        assert_eq!(resolve_placeholders("{{hdfs-site/missing}}", &c), None);
        assert_eq!(resolve_placeholders("{{hdfs-site/my-key}}:{{core-site/other}}", &c), None);
    }

    #[test]
    fn test_fixed_point_and_positional() {
        let text = format_reporting_text(
            "TCP OK - {0:.4f} response on port {1}",
            &[FormatArg::Number(0.9), FormatArg::Int(2181)],
        )
        .unwrap();
        assert_eq!(text, "TCP OK - 0.9000 response on port 2181");
    }

    #[test]
    fn test_plain_rendering_of_values() {
        let args = vec![FormatArg::Int(1), FormatArg::Int(3), FormatArg::None];
        assert_eq!(format_reporting_text("{0} {1} {2}", &args).unwrap(), "1 3 None");

        let args = vec![FormatArg::Number(223.0), FormatArg::Bool(true)];
        assert_eq!(format_reporting_text("{0} {1}", &args).unwrap(), "223 True");
    }

    #[test]
    fn test_escapes_and_auto_numbering() {
        let args = vec![FormatArg::from("a"), FormatArg::from("b")];
        assert_eq!(format_reporting_text("{{{}}} {}", &args).unwrap(), "{a} b");
    }

    #[test]
    fn test_width_alignment_and_percent() {
        assert_eq!(format_reporting_text("[{0:>6}]", &[FormatArg::from("ab")]).unwrap(), "[    ab]");
        assert_eq!(format_reporting_text("[{0:*^6}]", &[FormatArg::from("ab")]).unwrap(), "[**ab**]");
        assert_eq!(format_reporting_text("[{0:5}]", &[FormatArg::Int(42)]).unwrap(), "[   42]");
        assert_eq!(format_reporting_text("{0:.1%}", &[FormatArg::Number(0.256)]).unwrap(), "25.6%");
        assert_eq!(format_reporting_text("{0:d}", &[FormatArg::Number(7.0)]).unwrap(), "7");
    }

    #[test]
    fn test_format_errors() {
        assert!(format_reporting_text("{1}", &[FormatArg::Int(1)]).is_err());
        assert!(format_reporting_text("{0:.4f}", &[FormatArg::from("refused")]).is_err());
        assert!(format_reporting_text("{0", &[FormatArg::Int(1)]).is_err());
        assert!(format_reporting_text("oops }", &[]).is_err());
        assert!(format_reporting_text("{0:q}", &[FormatArg::Int(1)]).is_err());
        assert!(format_reporting_text("{x}", &[FormatArg::Int(1)]).is_err());
    }

    #[test]
    fn test_from_json_value() {
        assert_eq!(FormatArg::from(&serde_json::json!(3)), FormatArg::Int(3));
        assert_eq!(FormatArg::from(&serde_json::json!(1.5)), FormatArg::Number(1.5));
        assert_eq!(FormatArg::from(&serde_json::json!(null)), FormatArg::None);
        assert_eq!(FormatArg::from(&serde_json::json!("x")), FormatArg::from("x"));
    }
}
