//! Enumerated property values and their string forms.
//!
//! Converters for these properties accept any string; the translation to a
//! native constant happens in the setter, which is where an unknown value
//! becomes an error.

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Visible,
    Hidden,
    Collapse,
}

impl Visibility {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "visible" => Ok(Visibility::Visible),
            "hidden" => Ok(Visibility::Hidden),
            "collapse" | "collapsed" => Ok(Visibility::Collapse),
            other => Err(Error::UnresolvedEnumValue {
                property: "visibility",
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::Hidden => "hidden",
            Visibility::Collapse => "collapse",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
    Stretch,
}

impl HorizontalAlignment {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(HorizontalAlignment::Left),
            "center" => Ok(HorizontalAlignment::Center),
            "right" => Ok(HorizontalAlignment::Right),
            "stretch" => Ok(HorizontalAlignment::Stretch),
            other => Err(Error::UnresolvedAlignment(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HorizontalAlignment::Left => "left",
            HorizontalAlignment::Center => "center",
            HorizontalAlignment::Right => "right",
            HorizontalAlignment::Stretch => "stretch",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerticalAlignment {
    Top,
    Center,
    Bottom,
    Stretch,
}

impl VerticalAlignment {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "top" => Ok(VerticalAlignment::Top),
            "center" | "middle" => Ok(VerticalAlignment::Center),
            "bottom" => Ok(VerticalAlignment::Bottom),
            "stretch" => Ok(VerticalAlignment::Stretch),
            other => Err(Error::UnresolvedAlignment(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VerticalAlignment::Top => "top",
            VerticalAlignment::Center => "center",
            VerticalAlignment::Bottom => "bottom",
            VerticalAlignment::Stretch => "stretch",
        }
    }
}
