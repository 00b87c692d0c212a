use crate::error::{PmaError, Result};
use chrono::{NaiveDate, TimeDelta};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Schedule/budget delta written as `±Nd ±Mc`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impact {
    pub days: i64,
    pub cost: i64,
}

/// Project end date and budget that an [`Impact`] is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub end_date: NaiveDate,
    pub budget: i64,
}

static DAYS_RE: OnceLock<Regex> = OnceLock::new();
static COST_RE: OnceLock<Regex> = OnceLock::new();

fn days_re() -> &'static Regex {
    DAYS_RE.get_or_init(|| Regex::new(r"(?i)([+-]?\d+)\s*d\b").unwrap())
}

fn cost_re() -> &'static Regex {
    COST_RE.get_or_init(|| Regex::new(r"(?i)([+-]?\d[\d,]*)\s*c\b").unwrap())
}

fn capture_int(re: &Regex, s: &str) -> i64 {
    re.captures(s)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
        .unwrap_or(0)
}

/// `"+15d +5000c"` -> `Impact { days: 15, cost: 5000 }`. Missing parts are 0.
pub fn parse_impact(s: &str) -> Impact {
    Impact {
        days: capture_int(days_re(), s),
        cost: capture_int(cost_re(), s),
    }
}

/// `date` moved by `days` calendar days, or `None` past chrono's range.
pub fn shift_date(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(TimeDelta::try_days(days)?)
}

/// Shift the end date by calendar days and add the cost to the budget.
/// Any sign is accepted; only a result outside the date or i64 range fails.
pub fn apply_impact(baseline: Baseline, impact: Impact) -> Result<Baseline> {
    let end_date = shift_date(baseline.end_date, impact.days);
    let budget = baseline.budget.checked_add(impact.cost);
    match (end_date, budget) {
        (Some(end_date), Some(budget)) => Ok(Baseline { end_date, budget }),
        _ => Err(PmaError::ImpactOutOfRange(impact.to_string())),
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}d {:+}c", self.days, self.cost)
    }
}
