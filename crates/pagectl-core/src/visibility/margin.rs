//! Root margin in CSS shorthand form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Pixel margin grown (positive) or shrunk (negative) around the viewport
/// before visibility is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RootMargin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl RootMargin {
    pub const ZERO: RootMargin = RootMargin {
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
        left: 0.0,
    };

    /// Expand a viewport band `[top, bottom)` by this margin
    pub fn expand(&self, top: f64, bottom: f64) -> (f64, f64) {
        (top - self.top, bottom + self.bottom)
    }
}

fn parse_length(token: &str) -> Option<f64> {
    let number = token.strip_suffix("px").unwrap_or(token);
    number.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl FromStr for RootMargin {
    type Err = crate::Error;

    /// Accepts 1 to 4 whitespace separated lengths, `px` suffix optional,
    /// with the usual CSS shorthand expansion.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(|token| {
                parse_length(token).ok_or_else(|| crate::Error::InvalidRootMargin(s.to_string()))
            })
            .collect::<crate::Result<Vec<f64>>>()?;

        let (top, right, bottom, left) = match values.as_slice() {
            [all] => (*all, *all, *all, *all),
            [vertical, horizontal] => (*vertical, *horizontal, *vertical, *horizontal),
            [top, horizontal, bottom] => (*top, *horizontal, *bottom, *horizontal),
            [top, right, bottom, left] => (*top, *right, *bottom, *left),
            _ => return Err(crate::Error::InvalidRootMargin(s.to_string())),
        };

        Ok(RootMargin {
            top,
            right,
            bottom,
            left,
        })
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}px {}px {}px {}px",
            self.top, self.right, self.bottom, self.left
        )
    }
}

impl Serialize for RootMargin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RootMargin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
