//! Stability feed rows.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    feed::{parse_json, FeedError, FeedOptions, PollingFeed},
    format::{format_number, FeedValue},
};

pub const DEFAULT_STABILITY_PATH: &str = "/api/stability/stability_feed_v2.json";

/// One entry as published by the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StabilityItem {
    /// Symbol or `BASE/QUOTE` pair.
    pub n: String,
    /// Price.
    #[serde(default)]
    pub p: Option<FeedValue>,
    /// Spread in basis points.
    #[serde(default)]
    pub spr: Option<FeedValue>,
    /// Day metric; shown multiplied by four.
    #[serde(default)]
    pub md: Option<FeedValue>,
    /// Colour flag such as `green`, `yellow` or `red`.
    #[serde(default)]
    pub st: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilityFeed {
    #[serde(default)]
    pub items: Vec<StabilityItem>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityStatus {
    Stable,
    Warning,
    Unstable,
}

impl StabilityStatus {
    /// Case-insensitive: "green" → stable, "yellow" → warning, else unstable.
    pub fn from_flag(flag: Option<&str>) -> Self {
        let normalized = flag.unwrap_or_default().to_lowercase();
        if normalized.contains("green") {
            StabilityStatus::Stable
        } else if normalized.contains("yellow") {
            StabilityStatus::Warning
        } else {
            StabilityStatus::Unstable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StabilityStatus::Stable => "stable",
            StabilityStatus::Warning => "warning",
            StabilityStatus::Unstable => "unstable",
        }
    }
}

impl fmt::Display for StabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Display-ready row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StabilityRow {
    pub base: String,
    pub quote: String,
    pub price: String,
    pub spread: String,
    pub quadruple_days: String,
    pub status: StabilityStatus,
}

impl From<&StabilityItem> for StabilityRow {
    fn from(item: &StabilityItem) -> Self {
        let (base, quote) = split_pair(&item.n);

        let price = match item.p.as_ref().and_then(FeedValue::as_number) {
            Some(price) => format_number(price, 6, 6),
            None => raw_or_dash(item.p.as_ref()),
        };
        let spread = item
            .spr
            .as_ref()
            .and_then(FeedValue::as_number)
            .map(|spread| format_number(spread, 4, 4))
            .unwrap_or_else(|| "-".to_string());
        let quadruple_days = match item.md.as_ref().and_then(FeedValue::as_number) {
            Some(days) => format_number(days * 4.0, 0, 0),
            None => raw_or_dash(item.md.as_ref()),
        };

        Self {
            base,
            quote,
            price,
            spread,
            quadruple_days,
            status: StabilityStatus::from_flag(item.st.as_deref()),
        }
    }
}

fn split_pair(name: &str) -> (String, String) {
    let parts: Vec<&str> = name.split('/').collect();
    match parts.as_slice() {
        [base, quote] => (base.to_string(), quote.to_string()),
        _ => (name.to_string(), String::new()),
    }
}

fn raw_or_dash(value: Option<&FeedValue>) -> String {
    value.map(FeedValue::raw).unwrap_or_else(|| "-".to_string())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StabilitySummary {
    pub stable: usize,
    pub warning: usize,
    pub unstable: usize,
}

impl StabilitySummary {
    pub fn of(items: &[StabilityItem]) -> Self {
        items.iter().fold(Self::default(), |mut summary, item| {
            match StabilityStatus::from_flag(item.st.as_deref()) {
                StabilityStatus::Stable => summary.stable += 1,
                StabilityStatus::Warning => summary.warning += 1,
                StabilityStatus::Unstable => summary.unstable += 1,
            }
            summary
        })
    }
}

impl StabilityFeed {
    pub fn rows(&self) -> Vec<StabilityRow> {
        self.items.iter().map(StabilityRow::from).collect()
    }

    pub fn summary(&self) -> StabilitySummary {
        StabilitySummary::of(&self.items)
    }
}

pub fn parse_stability_feed(body: &[u8]) -> Result<StabilityFeed, FeedError> {
    parse_json(body)
}

/// Poll the stability feed at `url` every `interval`.
pub fn stability_feed(
    http: reqwest::Client,
    url: impl Into<String>,
    interval: Duration,
) -> PollingFeed<StabilityFeed> {
    PollingFeed::spawn(
        http,
        FeedOptions::polling(url, interval),
        parse_stability_feed,
    )
}
