//! Sensor value types and string coercion

use std::fmt;

use serde::{Deserialize, Serialize};

/// Strings accepted as `true` when no explicit payload matches
const TRUE_STRINGS: [&str; 5] = ["true", "enabled", "on", "active", "1"];

/// Strings accepted as `false` when no explicit payload matches
const FALSE_STRINGS: [&str; 5] = ["false", "disabled", "off", "inactive", "0"];

/// The declared type of a sensor's value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Free-form text
    #[default]
    String,
    /// Signed integer
    Int,
    /// Floating point number
    Float,
    /// Boolean flag
    Bool,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
        }
    }
}

/// A typed sensor value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
}

impl SensorValue {
    /// Returns the type tag of this value
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Bool(_) => ValueType::Bool,
        }
    }

    /// Returns the string payload, if this is a string value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a float for int and float values
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a bool value
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Renders the value as it is substituted into command templates.
///
/// Floats always carry a fractional part, so `45.0` renders as `45.0` and
/// never collapses to an integer. Bools render as lowercase `true`/`false`,
/// which [`ValueType::Bool`] coerces back to the same value.
impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => {
                let rendered = v.to_string();
                if v.is_finite() && !rendered.contains('.') {
                    write!(f, "{rendered}.0")
                } else {
                    write!(f, "{rendered}")
                }
            }
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for SensorValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SensorValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for SensorValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for SensorValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for SensorValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Boolean payload overrides checked before the generic true/false strings
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolPayloads<'a> {
    /// String mapped to `true`
    pub on: Option<&'a str>,
    /// String mapped to `false`
    pub off: Option<&'a str>,
}

impl ValueType {
    /// Converts a raw string into a value of this type.
    ///
    /// Integers are parsed through `f64` so `"3.0"` is accepted; the
    /// fractional part is truncated. Booleans check the explicit payloads
    /// first, then the generic true/false strings. When only one payload is
    /// configured, anything else maps to the opposite state.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the string cannot be converted.
    pub fn coerce(self, raw: &str, payloads: BoolPayloads<'_>) -> Result<SensorValue, String> {
        match self {
            Self::String => Ok(SensorValue::String(raw.to_string())),
            Self::Int => {
                let parsed: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|e| format!("not a number: {e}"))?;
                if !parsed.is_finite() {
                    return Err("not a finite number".to_string());
                }
                Ok(SensorValue::Int(parsed.trunc() as i64))
            }
            Self::Float => raw
                .trim()
                .parse()
                .map(SensorValue::Float)
                .map_err(|e| format!("not a number: {e}")),
            Self::Bool => coerce_bool(raw.trim(), payloads).map(SensorValue::Bool),
        }
    }
}

fn coerce_bool(raw: &str, payloads: BoolPayloads<'_>) -> Result<bool, String> {
    if payloads.on.is_some_and(|on| on.eq_ignore_ascii_case(raw)) {
        return Ok(true);
    }
    if payloads.off.is_some_and(|off| off.eq_ignore_ascii_case(raw)) {
        return Ok(false);
    }
    let lowered = raw.to_lowercase();
    if TRUE_STRINGS.contains(&lowered.as_str()) {
        return Ok(true);
    }
    if FALSE_STRINGS.contains(&lowered.as_str()) {
        return Ok(false);
    }
    match (payloads.on, payloads.off) {
        (Some(_), None) => Ok(false),
        (None, Some(_)) => Ok(true),
        _ => Err(format!("'{raw}' is not a recognised boolean")),
    }
}
