//! Concentration → (index, category) classification.

use crate::core::breakpoints::{BreakpointTable, Category};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of classifying one concentration.
///
/// Both fields are `None` when no concentration was supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub index: Option<u32>,
    pub category: Option<Category>,
}

/// Piecewise-linear classifier over a shared breakpoint table.
///
/// Cloning is cheap; all clones read the same table.
#[derive(Debug, Clone)]
pub struct Classifier {
    table: Arc<BreakpointTable>,
}

impl Classifier {
    pub fn new(table: BreakpointTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// Classifier over the CPCB PM2.5 table.
    pub fn cpcb_pm25() -> Self {
        Self::new(BreakpointTable::cpcb_pm25())
    }

    pub fn table(&self) -> &BreakpointTable {
        &self.table
    }

    /// Classify a concentration.
    ///
    /// Bands are scanned in ascending order and the first band whose upper
    /// bound is at or above the value wins, so a value shared by two bands
    /// belongs to the lower one. A value between two bands (e.g. 30.5 in the
    /// CPCB table) belongs to the next band up, with its index clamped into
    /// that band's range. Values past the top band continue the top band's
    /// slope measured from its lower concentration bound, shifted up to
    /// start at `index_high`, and never drop below `index_high`. Non-finite input is treated as missing.
    pub fn classify(&self, concentration: Option<f64>) -> Classification {
        let Some(value) = concentration.filter(|v| v.is_finite()) else {
            return Classification::default();
        };

        for band in self.table.bands() {
            if value <= band.high {
                let index = band
                    .interpolate(value)
                    .round()
                    .clamp(f64::from(band.index_low), f64::from(band.index_high));
                return Classification {
                    index: Some(index as u32),
                    category: Some(band.category),
                };
            }
        }

        let top = self.table.top();
        let extrapolated = top.slope() * (value - top.low) + f64::from(top.index_high);
        let index = extrapolated.round().max(f64::from(top.index_high));

        Classification {
            index: Some(index as u32),
            category: Some(top.category),
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::cpcb_pm25()
    }
}
