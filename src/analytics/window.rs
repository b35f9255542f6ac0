use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed look-back periods used to bound analytics queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "180d")]
    HalfYear,
    #[serde(rename = "365d")]
    Year,
}

impl Window {
    pub const ALL: [Window; 4] = [Window::Week, Window::Month, Window::HalfYear, Window::Year];

    pub fn days(self) -> u32 {
        match self {
            Window::Week => 7,
            Window::Month => 30,
            Window::HalfYear => 180,
            Window::Year => 365,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Window::Week => "7d",
            Window::Month => "30d",
            Window::HalfYear => "180d",
            Window::Year => "365d",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|w| *w == self).unwrap_or(0)
    }

    /// Next larger window, wrapping around
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7d" | "7" | "week" => Ok(Window::Week),
            "30d" | "30" | "month" => Ok(Window::Month),
            "180d" | "180" | "6m" | "halfyear" => Ok(Window::HalfYear),
            "365d" | "365" | "year" => Ok(Window::Year),
            other => Err(format!("Unknown window '{}' (expected 7d, 30d, 180d or 365d)", other)),
        }
    }
}
