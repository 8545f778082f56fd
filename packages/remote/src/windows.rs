//! Latency-tolerant date windows per indicator family.
//!
//! Upstream products publish with a delay, so the trailing policy first
//! moves the reference instant back by an embargo and then looks back a
//! fixed number of days per family. The previous-month policy instead
//! runs from the first to the last day of the calendar month before the
//! reference date; like every window its end is exclusive, so the last
//! day itself is not sampled.

use chrono::{DateTime, Datelike as _, Duration, Months, NaiveDate, Utc};
use geoalert_remote_models::{DateWindow, IndicatorFamily};
use serde::{Deserialize, Serialize};

/// Window selection policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// `[embargoed_end - lookback, embargoed_end)` per family.
    #[default]
    Trailing,
    /// `[first_of_previous_month, last_of_previous_month)` for every family.
    PreviousMonth,
}

/// Computes the date window for each indicator family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRangeSelector {
    pub policy: WindowPolicy,
    /// Days subtracted from the reference date before any window is built.
    pub embargo_days: u32,
    /// Lookback for reflectance and temperature.
    pub reflectance_days: u32,
    /// Lookback for precipitation.
    pub precipitation_days: u32,
}

impl Default for DateRangeSelector {
    fn default() -> Self {
        Self {
            policy: WindowPolicy::Trailing,
            embargo_days: 2,
            reflectance_days: 30,
            precipitation_days: 60,
        }
    }
}

/// One window per family, resolved against a single reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindows {
    pub reflectance: DateWindow,
    pub temperature: DateWindow,
    pub precipitation: DateWindow,
}

impl DateRangeSelector {
    /// Window for `family` relative to `reference`.
    #[must_use]
    pub fn window_for(&self, family: IndicatorFamily, reference: DateTime<Utc>) -> DateWindow {
        let today = reference.date_naive();

        match self.policy {
            WindowPolicy::Trailing => {
                let end = today - Duration::days(i64::from(self.embargo_days));
                let lookback = match family {
                    IndicatorFamily::Reflectance | IndicatorFamily::Temperature => {
                        self.reflectance_days
                    }
                    IndicatorFamily::Precipitation => self.precipitation_days,
                };
                DateWindow {
                    start: end - Duration::days(i64::from(lookback)),
                    end,
                }
            }
            WindowPolicy::PreviousMonth => previous_month(today),
        }
    }

    /// Resolves every family against the same `reference`.
    #[must_use]
    pub fn windows(&self, reference: DateTime<Utc>) -> ResolvedWindows {
        ResolvedWindows {
            reflectance: self.window_for(IndicatorFamily::Reflectance, reference),
            temperature: self.window_for(IndicatorFamily::Temperature, reference),
            precipitation: self.window_for(IndicatorFamily::Precipitation, reference),
        }
    }
}

fn previous_month(today: NaiveDate) -> DateWindow {
    let first_of_this = today.with_day(1).unwrap_or(today);
    let first_of_prev = first_of_this
        .checked_sub_months(Months::new(1))
        .unwrap_or(first_of_this);

    let last_of_prev = first_of_this.pred_opt().unwrap_or(first_of_this);

    DateWindow {
        start: first_of_prev,
        end: last_of_prev,
    }
}
