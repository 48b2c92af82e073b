use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::units::Length;

/// Logical property value as stored on a view node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    Length(Length),
    Color(Color),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Number,
    Text,
    Length,
    Color,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::Length(_) => ValueKind::Length,
            Value::Color(_) => ValueKind::Color,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|n| n as f32)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_length(&self) -> Option<Length> {
        match self {
            Value::Length(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Value::Color(c) => Some(*c),
            _ => None,
        }
    }

    /// JSON form used in event payloads.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::json!(n),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            other => serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Length> for Value {
    fn from(v: Length) -> Self {
        Value::Length(v)
    }
}

impl From<Color> for Value {
    fn from(v: Color) -> Self {
        Value::Color(v)
    }
}

/// Converts a string (markup attribute or style declaration) into a typed value.
pub type ValueConverter = fn(&str) -> Option<Value>;

pub mod converters {
    use super::Value;
    use crate::color::Color;
    use crate::units::Length;

    pub fn boolean(s: &str) -> Option<Value> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        }
    }

    pub fn number(s: &str) -> Option<Value> {
        s.trim().parse::<f64>().ok().map(Value::Number)
    }

    pub fn text(s: &str) -> Option<Value> {
        Some(Value::Text(s.to_string()))
    }

    /// `auto`, `dip` and `px`; percentages are rejected.
    pub fn length(s: &str) -> Option<Value> {
        Length::parse(s, false).map(Value::Length)
    }

    pub fn percent_length(s: &str) -> Option<Value> {
        Length::parse(s, true).map(Value::Length)
    }

    pub fn color(s: &str) -> Option<Value> {
        Color::parse(s).map(Value::Color)
    }
}
