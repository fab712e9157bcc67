//! Canonical byte form of a certificate document.
//!
//! The canonical form is compact JSON with object keys sorted by code point.
//! It is the exact input to signing and verification, so it must be stable
//! across processes and machines: numbers and strings are rendered the way
//! ECMAScript `JSON.stringify()` renders them.
//!
//! Two modes exist. [`CanonicalMode::Recursive`] sorts keys at every depth and
//! is the default. [`CanonicalMode::TopLevel`] sorts only the outermost object
//! and leaves nested objects in their source order; certificates issued by the
//! legacy registry were signed over this form and can only be re-verified
//! with it.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Separator placed between the canonical form and the signature text
/// when building the signed blob.
pub const SEPARATOR: &[u8] = b"||";

/// Key ordering policy for nested objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanonicalMode {
    /// Sort object keys at every depth
    #[default]
    Recursive,
    /// Sort only top-level keys; nested objects keep source order
    TopLevel,
}

impl CanonicalMode {
    /// Stable name used in configuration and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recursive => "recursive",
            Self::TopLevel => "top-level",
        }
    }
}

impl fmt::Display for CanonicalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CanonicalMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recursive" => Ok(Self::Recursive),
            "top-level" => Ok(Self::TopLevel),
            other => Err(CoreError::Encoding {
                reason: format!("unknown canonical mode '{}'", other),
            }),
        }
    }
}

/// Canonical bytes of a certificate document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalForm(String);

impl CanonicalForm {
    /// Get the canonical bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Get the canonical form as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying string
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalForm {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for CanonicalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonicalize a certificate document.
///
/// # Errors
///
/// Returns [`CoreError::InvalidDocument`] if `doc` is not an object, is an
/// empty object, or contains a number that cannot be rendered.
pub fn canonicalize(doc: &Value, mode: CanonicalMode) -> CoreResult<CanonicalForm> {
    let map = match doc {
        Value::Object(map) => map,
        other => {
            return Err(CoreError::InvalidDocument {
                reason: format!("expected a mapping, got {}", kind_of(other)),
            });
        }
    };
    if map.is_empty() {
        return Err(CoreError::InvalidDocument {
            reason: "mapping has no fields".to_string(),
        });
    }

    let mut out = String::new();
    write_object(&mut out, map, true, mode)?;
    Ok(CanonicalForm(out))
}

fn write_value(out: &mut String, value: &Value, mode: CanonicalMode) -> CoreResult<()> {
    match value {
        Value::Object(map) => write_object(out, map, mode == CanonicalMode::Recursive, mode),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_value(out, item, mode)?;
            }
            out.push(']');
            Ok(())
        }
        Value::String(s) => write_string(out, s),
        Value::Number(n) => {
            out.push_str(&render_number(n)?);
            Ok(())
        }
        Value::Bool(b) => {
            out.push_str(if *b { "true" } else { "false" });
            Ok(())
        }
        Value::Null => {
            out.push_str("null");
            Ok(())
        }
    }
}

fn write_object(
    out: &mut String,
    map: &Map<String, Value>,
    sorted: bool,
    mode: CanonicalMode,
) -> CoreResult<()> {
    let mut pairs: Vec<(&String, &Value)> = map.iter().collect();
    if sorted {
        pairs.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
    }

    out.push('{');
    for (idx, (key, value)) in pairs.into_iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        write_string(out, key)?;
        out.push(':');
        write_value(out, value, mode)?;
    }
    out.push('}');
    Ok(())
}

fn write_string(out: &mut String, s: &str) -> CoreResult<()> {
    // serde_json escapes the same set as JSON.stringify for well-formed strings
    out.push_str(&serde_json::to_string(s)?);
    Ok(())
}

fn render_number(n: &Number) -> CoreResult<String> {
    if let Some(i) = n.as_i64() {
        return Ok(i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.to_string());
    }
    let f = n.as_f64().ok_or_else(|| CoreError::InvalidDocument {
        reason: format!("unrepresentable number {}", n),
    })?;
    render_f64(f)
}

/// Render a double as `Number.prototype.toString` does.
///
/// ryu supplies the shortest round-tripping digits; the layout (plain
/// decimal for magnitudes in `[1e-6, 1e21)`, exponent form otherwise) is
/// applied here because ryu switches notation at different thresholds.
fn render_f64(f: f64) -> CoreResult<String> {
    if !f.is_finite() {
        return Err(CoreError::InvalidDocument {
            reason: "non-finite number".to_string(),
        });
    }
    if f == 0.0 {
        // -0 prints as 0
        return Ok("0".to_string());
    }

    let mut buf = ryu::Buffer::new();
    let (digits, point) = decimal_digits(buf.format_finite(f.abs()))?;
    let sign = if f.is_sign_negative() { "-" } else { "" };
    let len = digits.len() as i32;

    // value = 0.<digits> * 10^point
    let body = if (-5..=21).contains(&point) {
        if point >= len {
            format!("{digits}{}", "0".repeat((point - len) as usize))
        } else if point > 0 {
            let (int, frac) = digits.split_at(point as usize);
            format!("{int}.{frac}")
        } else {
            format!("0.{}{digits}", "0".repeat((-point) as usize))
        }
    } else {
        let exp = point - 1;
        let exp_sign = if exp >= 0 { "+" } else { "-" };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{exp_sign}{}", exp.abs())
        } else {
            format!("{first}.{rest}e{exp_sign}{}", exp.abs())
        }
    };
    Ok(format!("{sign}{body}"))
}

/// Split a positive ryu rendering into significant digits and the position
/// of the decimal point relative to the first of them.
fn decimal_digits(rendered: &str) -> CoreResult<(String, i32)> {
    let (mantissa, exp) = match rendered.split_once(['e', 'E']) {
        Some((m, e)) => {
            let exp = e.parse::<i32>().map_err(|_| CoreError::InvalidDocument {
                reason: format!("unrepresentable number {}", rendered),
            })?;
            (m, exp)
        }
        None => (rendered, 0),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let all = format!("{int}{frac}");
    let leading = all.len() - all.trim_start_matches('0').len();
    let digits = all.trim_matches('0');
    if digits.is_empty() {
        return Err(CoreError::InvalidDocument {
            reason: format!("unrepresentable number {}", rendered),
        });
    }
    let point = int.len() as i32 - leading as i32 + exp;
    Ok((digits.to_string(), point))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}
