//! Trailing window expressions such as `24h`, `7d` or `1h30m`.

use chrono::Duration;
use std::fmt;
use std::str::FromStr;

/// A trailing duration parsed from text.
///
/// The input text is kept so responses can echo exactly what the caller
/// asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureWindow {
    label: String,
    duration: Duration,
}

impl ExposureWindow {
    /// Build a window directly from a duration.
    pub fn from_duration(duration: Duration) -> Result<Self, WindowParseError> {
        if duration <= Duration::zero() {
            return Err(WindowParseError::NonPositive);
        }
        Ok(Self {
            label: format!("{}s", duration.num_seconds()),
            duration,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for ExposureWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl FromStr for ExposureWindow {
    type Err = WindowParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(WindowParseError::Empty);
        }

        let mut total_secs = 0.0;
        let mut rest = text;

        while !rest.is_empty() {
            let number_len = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(rest.len());
            if number_len == 0 {
                return Err(WindowParseError::MissingNumber(rest.to_string()));
            }
            let number: f64 = rest[..number_len]
                .parse()
                .map_err(|_| WindowParseError::MissingNumber(rest[..number_len].to_string()))?;
            rest = rest[number_len..].trim_start();

            let unit_len = rest
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(rest.len());
            if unit_len == 0 {
                return Err(WindowParseError::MissingUnit);
            }
            let unit = &rest[..unit_len];
            total_secs += number * unit_seconds(unit)?;
            rest = rest[unit_len..].trim_start();
        }

        let millis = (total_secs * 1000.0).round();
        if millis <= 0.0 {
            return Err(WindowParseError::NonPositive);
        }

        Ok(Self {
            label: text.to_string(),
            duration: Duration::milliseconds(millis as i64),
        })
    }
}

fn unit_seconds(unit: &str) -> Result<f64, WindowParseError> {
    let secs = match unit.to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
        "d" | "day" | "days" => 86_400.0,
        "w" | "week" | "weeks" => 604_800.0,
        _ => return Err(WindowParseError::UnknownUnit(unit.to_string())),
    };
    Ok(secs)
}

/// Window parsing errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowParseError {
    Empty,
    MissingNumber(String),
    MissingUnit,
    UnknownUnit(String),
    NonPositive,
}

impl fmt::Display for WindowParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowParseError::Empty => write!(f, "window is empty"),
            WindowParseError::MissingNumber(s) => write!(f, "expected a number at '{s}'"),
            WindowParseError::MissingUnit => write!(f, "number without a unit"),
            WindowParseError::UnknownUnit(u) => write!(f, "unknown time unit '{u}'"),
            WindowParseError::NonPositive => write!(f, "window must be longer than zero"),
        }
    }
}

impl std::error::Error for WindowParseError {}
