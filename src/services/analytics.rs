// src/services/analytics.rs
use crate::models::analytics::UsagePoint;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsPeriod {
    Day,
    Week,
    Month,
    Quarter,
}

impl AnalyticsPeriod {
    /// Unknown or missing values fall back to seven days.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("24h") => AnalyticsPeriod::Day,
            Some("30d") => AnalyticsPeriod::Month,
            Some("90d") => AnalyticsPeriod::Quarter,
            _ => AnalyticsPeriod::Week,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnalyticsPeriod::Day => "24h",
            AnalyticsPeriod::Week => "7d",
            AnalyticsPeriod::Month => "30d",
            AnalyticsPeriod::Quarter => "90d",
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            AnalyticsPeriod::Day => Duration::hours(24),
            AnalyticsPeriod::Week => Duration::days(7),
            AnalyticsPeriod::Month => Duration::days(30),
            AnalyticsPeriod::Quarter => Duration::days(90),
        }
    }

    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

/// One point per calendar day from `start` through `end` inclusive; days
/// without activity are reported as zero.
pub fn daily_series(start: NaiveDate, end: NaiveDate, counts: &[(NaiveDate, i64)]) -> Vec<UsagePoint> {
    let by_day: HashMap<NaiveDate, i64> = counts.iter().copied().collect();
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| UsagePoint {
            name: day.format("%Y-%m-%d").to_string(),
            total: by_day.get(&day).copied().unwrap_or(0),
        })
        .collect()
}
