//! Breakpoint tables mapping pollutant concentrations to index bands.
//!
//! The default table is the CPCB National Air Quality Index table for PM2.5
//! (24-hour average, µg/m³). A table is always built and validated as a whole;
//! switching to a different standard means constructing a new table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Air quality category, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Satisfactory")]
    Satisfactory,
    #[serde(rename = "Moderately Polluted")]
    ModeratelyPolluted,
    #[serde(rename = "Poor")]
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
    #[serde(rename = "Severe")]
    Severe,
}

impl Category {
    /// All categories in severity order.
    pub const ALL: [Category; 6] = [
        Category::Good,
        Category::Satisfactory,
        Category::ModeratelyPolluted,
        Category::Poor,
        Category::VeryPoor,
        Category::Severe,
    ];

    /// Human-readable label, also used as the stored representation.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Good => "Good",
            Category::Satisfactory => "Satisfactory",
            Category::ModeratelyPolluted => "Moderately Polluted",
            Category::Poor => "Poor",
            Category::VeryPoor => "Very Poor",
            Category::Severe => "Severe",
        }
    }

    /// Parse a stored label. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    /// Position in severity order (0 = Good).
    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    /// Alert severity raised when a reading lands in this category.
    pub fn alert_severity(&self) -> Option<Severity> {
        match self {
            Category::Good | Category::Satisfactory | Category::ModeratelyPolluted => None,
            Category::Poor => Some(Severity::Warning),
            Category::VeryPoor | Category::Severe => Some(Severity::Critical),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity attached to an alert event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One segment of the piecewise-linear concentration → index mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    /// Lowest concentration in the band (inclusive)
    pub low: f64,
    /// Highest concentration in the band (inclusive)
    pub high: f64,
    /// Index at `low`
    pub index_low: u32,
    /// Index at `high`
    pub index_high: u32,
    pub category: Category,
    /// Display colour as a hex string
    pub color: String,
}

impl Band {
    pub fn new(
        low: f64,
        high: f64,
        index_low: u32,
        index_high: u32,
        category: Category,
        color: impl Into<String>,
    ) -> Self {
        Self {
            low,
            high,
            index_low,
            index_high,
            category,
            color: color.into(),
        }
    }

    /// Index units per concentration unit.
    pub fn slope(&self) -> f64 {
        f64::from(self.index_high - self.index_low) / (self.high - self.low)
    }

    /// Unrounded linear interpolation of `value` within this band.
    pub fn interpolate(&self, value: f64) -> f64 {
        self.slope() * (value - self.low) + f64::from(self.index_low)
    }

    /// Closed-interval membership test.
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

/// Errors raised while validating a breakpoint table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    Empty,
    /// Band at `position` has `low >= high`
    InvertedRange { position: usize },
    /// Band at `position` has `index_low > index_high`
    InvertedIndex { position: usize },
    /// Band at `position` starts below the previous band's upper bound
    Overlap { position: usize },
    /// A concentration bound is NaN or infinite
    NonFinite { position: usize },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Empty => write!(f, "breakpoint table has no bands"),
            TableError::InvertedRange { position } => {
                write!(f, "band {position}: concentration low must be below high")
            }
            TableError::InvertedIndex { position } => {
                write!(f, "band {position}: index low must not exceed index high")
            }
            TableError::Overlap { position } => {
                write!(f, "band {position}: overlaps the previous band")
            }
            TableError::NonFinite { position } => {
                write!(f, "band {position}: concentration bounds must be finite")
            }
        }
    }
}

impl std::error::Error for TableError {}

/// An ordered, validated list of bands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakpointTable {
    bands: Vec<Band>,
}

impl BreakpointTable {
    /// Validate and build a table. Bands must be ascending and non-overlapping;
    /// a band may start exactly where the previous one ends.
    pub fn new(bands: Vec<Band>) -> Result<Self, TableError> {
        if bands.is_empty() {
            return Err(TableError::Empty);
        }

        for (position, band) in bands.iter().enumerate() {
            if !band.low.is_finite() || !band.high.is_finite() {
                return Err(TableError::NonFinite { position });
            }
            if band.low >= band.high {
                return Err(TableError::InvertedRange { position });
            }
            if band.index_low > band.index_high {
                return Err(TableError::InvertedIndex { position });
            }
            if position > 0 && band.low < bands[position - 1].high {
                return Err(TableError::Overlap { position });
            }
        }

        Ok(Self { bands })
    }

    /// CPCB NAQI PM2.5 table.
    pub fn cpcb_pm25() -> Self {
        Self {
            bands: vec![
                Band::new(0.0, 30.0, 0, 50, Category::Good, "#009865"),
                Band::new(31.0, 60.0, 51, 100, Category::Satisfactory, "#98CE00"),
                Band::new(61.0, 90.0, 101, 200, Category::ModeratelyPolluted, "#FFFF00"),
                Band::new(91.0, 120.0, 201, 300, Category::Poor, "#FF7E00"),
                Band::new(121.0, 250.0, 301, 400, Category::VeryPoor, "#FF0000"),
                Band::new(251.0, 350.0, 401, 500, Category::Severe, "#7E0023"),
            ],
        }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// The most severe band.
    pub fn top(&self) -> &Band {
        // Non-empty by construction.
        &self.bands[self.bands.len() - 1]
    }

    /// First band carrying `category`, if any.
    pub fn band_for(&self, category: Category) -> Option<&Band> {
        self.bands.iter().find(|b| b.category == category)
    }
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self::cpcb_pm25()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpcb_table_is_valid() {
        let table = BreakpointTable::cpcb_pm25();
        let rebuilt = BreakpointTable::new(table.bands().to_vec()).unwrap();
        assert_eq!(rebuilt, table);
        assert_eq!(table.bands().len(), 6);
        assert_eq!(table.top().category, Category::Severe);
    }

    #[test]
    fn test_table_order_matches_severity_order() {
        let table = BreakpointTable::cpcb_pm25();
        let categories: Vec<Category> = table.bands().iter().map(|b| b.category).collect();
        assert_eq!(categories, Category::ALL.to_vec());
    }

    #[test]
    fn test_rejects_overlapping_bands() {
        let bands = vec![
            Band::new(0.0, 30.0, 0, 50, Category::Good, "#000000"),
            Band::new(25.0, 60.0, 51, 100, Category::Satisfactory, "#000000"),
        ];
        assert_eq!(
            BreakpointTable::new(bands),
            Err(TableError::Overlap { position: 1 })
        );
    }

    #[test]
    fn test_rejects_malformed_bands() {
        assert_eq!(BreakpointTable::new(Vec::new()), Err(TableError::Empty));

        let inverted = vec![Band::new(10.0, 5.0, 0, 50, Category::Good, "#000000")];
        assert_eq!(
            BreakpointTable::new(inverted),
            Err(TableError::InvertedRange { position: 0 })
        );

        let bad_index = vec![Band::new(0.0, 5.0, 60, 50, Category::Good, "#000000")];
        assert_eq!(
            BreakpointTable::new(bad_index),
            Err(TableError::InvertedIndex { position: 0 })
        );
    }

    #[test]
    fn test_category_labels_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
        assert_eq!(Category::from_label("Hazardous"), None);
    }

    #[test]
    fn test_alert_severity_mapping() {
        assert_eq!(Category::ModeratelyPolluted.alert_severity(), None);
        assert_eq!(Category::Poor.alert_severity(), Some(Severity::Warning));
        assert_eq!(Category::VeryPoor.alert_severity(), Some(Severity::Critical));
        assert_eq!(Category::Severe.alert_severity(), Some(Severity::Critical));
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&Category::ModeratelyPolluted).unwrap();
        assert_eq!(json, "\"Moderately Polluted\"");
        let parsed: Category = serde_json::from_str("\"Very Poor\"").unwrap();
        assert_eq!(parsed, Category::VeryPoor);
    }
}
