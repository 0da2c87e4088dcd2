//! Airdrop feed.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{
    feed::{FeedError, FeedOptions, PollingFeed},
    format::{format_number, FeedValue},
};

pub const DEFAULT_AIRDROP_PATH: &str = "/api/data?fresh=1";

/// One airdrop entry. Fields of an unexpected JSON type read as absent
/// rather than failing the whole feed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AirdropItem {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub token: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient_value")]
    pub points: Option<FeedValue>,
    #[serde(default, rename = "type", deserialize_with = "lenient_text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_value")]
    pub phase: Option<FeedValue>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_value")]
    pub amount: Option<FeedValue>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    /// Seconds.
    #[serde(default, deserialize_with = "lenient_number")]
    pub created_timestamp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub updated_timestamp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub system_timestamp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_homonym: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub futures_listed: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub spot_listed: Option<bool>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub contract_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub chain_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub utc: Option<String>,
    #[serde(default, deserialize_with = "lenient_value")]
    pub market_cap: Option<FeedValue>,
    #[serde(default, deserialize_with = "lenient_value")]
    pub fdv: Option<FeedValue>,
}

impl AirdropItem {
    /// Recency key: updated, then system, then created timestamp.
    pub fn recency(&self) -> f64 {
        self.updated_timestamp
            .or(self.system_timestamp)
            .or(self.created_timestamp)
            .unwrap_or(0.0)
    }

    pub fn status(&self) -> AirdropStatus {
        AirdropStatus::normalize(self.status.as_deref())
    }
}

// ============================================================================
// Lenient field readers
// ============================================================================

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

/// Strings as-is; numbers and booleans in their JSON spelling.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    })
}

/// Numbers, or strings holding a finite number.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Some(flag),
        _ => None,
    })
}

fn lenient_value<'de, D>(deserializer: D) -> Result<Option<FeedValue>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64().map(FeedValue::Number),
        Value::String(text) => Some(FeedValue::Text(text)),
        _ => None,
    })
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AirdropFeed {
    pub airdrops: Vec<AirdropItem>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AirdropStatus {
    Ongoing,
    Announced,
    Completed,
}

impl AirdropStatus {
    pub fn normalize(raw: Option<&str>) -> Self {
        let key = raw.unwrap_or_default().to_lowercase();
        if key.contains("ongoing") || key.contains("live") {
            AirdropStatus::Ongoing
        } else if key.contains("complete") || key.contains("finish") {
            AirdropStatus::Completed
        } else {
            AirdropStatus::Announced
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AirdropStatus::Ongoing => "ongoing",
            AirdropStatus::Announced => "announced",
            AirdropStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AirdropStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Format a points or amount cell: up to two decimals, thousands grouped.
/// Numeric strings may carry commas; other strings pass through unchanged.
pub fn format_quantity(value: Option<&FeedValue>) -> String {
    match value {
        None => "-".to_string(),
        Some(FeedValue::Number(number)) if number.is_finite() => format_number(*number, 0, 2),
        Some(FeedValue::Number(_)) => "-".to_string(),
        Some(FeedValue::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return "-".to_string();
            }
            let sanitized = trimmed.replace(',', "");
            if !is_decimal(&sanitized) {
                return text.clone();
            }
            match sanitized.parse::<f64>() {
                Ok(number) if number.is_finite() => format_number(number, 0, 2),
                _ => text.clone(),
            }
        }
    }
}

/// `[-+]?digits(.digits)?`
fn is_decimal(value: &str) -> bool {
    let unsigned = value.strip_prefix(['-', '+']).unwrap_or(value);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int_part) && frac_part.map_or(true, all_digits)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AirdropSummary {
    pub ongoing: usize,
    pub announced: usize,
    pub completed: usize,
    pub total: usize,
}

impl AirdropFeed {
    pub fn summary(&self) -> AirdropSummary {
        let mut summary = AirdropSummary {
            total: self.airdrops.len(),
            ..AirdropSummary::default()
        };
        for item in &self.airdrops {
            match item.status() {
                AirdropStatus::Ongoing => summary.ongoing += 1,
                AirdropStatus::Announced => summary.announced += 1,
                AirdropStatus::Completed => summary.completed += 1,
            }
        }
        summary
    }
}

/// Parse the feed body and order it newest first. A missing or non-array
/// `airdrops` field reads as an empty feed; entries that are not objects are
/// skipped.
pub fn parse_airdrop_feed(body: &[u8]) -> Result<AirdropFeed, FeedError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|err| FeedError::Decode(err.to_string()))?;
    let entries = match value.get("airdrops") {
        Some(Value::Array(entries)) => entries.as_slice(),
        _ => &[],
    };
    let mut airdrops: Vec<AirdropItem> = entries
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| match AirdropItem::deserialize(entry) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(index = idx, error = %err, "skipping malformed airdrop entry");
                None
            }
        })
        .collect();
    airdrops.sort_by(|a, b| {
        b.recency()
            .partial_cmp(&a.recency())
            .unwrap_or(Ordering::Equal)
    });
    Ok(AirdropFeed { airdrops })
}

/// Fetch the airdrop feed once; further fetches only on reload.
pub fn airdrop_feed(
    http: reqwest::Client,
    url: impl Into<String>,
    enabled: bool,
) -> PollingFeed<AirdropFeed> {
    let options = FeedOptions {
        enabled,
        ..FeedOptions::one_shot(url)
    };
    PollingFeed::spawn(http, options, parse_airdrop_feed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_newest_first_with_fallbacks() {
        let feed = parse_airdrop_feed(
            br#"{"airdrops":[
                {"token":"OLD","created_timestamp":100},
                {"token":"NONE"},
                {"token":"SYS","system_timestamp":300,"created_timestamp":50},
                {"token":"UPD","updated_timestamp":200,"system_timestamp":900}
            ]}"#,
        )
        .unwrap();
        let order: Vec<&str> = feed.airdrops.iter().map(|a| a.token.as_str()).collect();
        assert_eq!(order, ["SYS", "UPD", "OLD", "NONE"]);
    }

    #[test]
    fn missing_list_is_empty() {
        assert!(parse_airdrop_feed(br#"{}"#).unwrap().airdrops.is_empty());
        assert!(parse_airdrop_feed(br#"{"airdrops":"soon"}"#)
            .unwrap()
            .airdrops
            .is_empty());
        assert!(parse_airdrop_feed(b"not json").is_err());
    }

    #[test]
    fn mistyped_fields_keep_the_row() {
        let feed = parse_airdrop_feed(
            br#"{"airdrops":[
                {"token":null,"status":"live","updated_timestamp":"500"},
                {"token":"NUM","chain_id":56,"points":{"min":1},"completed":"yes"},
                "garbage",
                {"token":"OK","created_timestamp":100,"amount":"1,000"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(feed.airdrops.len(), 3);

        let first = &feed.airdrops[0];
        assert_eq!(first.token, "");
        assert_eq!(first.recency(), 500.0);
        assert_eq!(first.status(), AirdropStatus::Ongoing);

        assert_eq!(feed.airdrops[1].token, "OK");
        assert_eq!(format_quantity(feed.airdrops[1].amount.as_ref()), "1,000");

        let numeric = &feed.airdrops[2];
        assert_eq!(numeric.token, "NUM");
        assert_eq!(numeric.chain_id.as_deref(), Some("56"));
        assert_eq!(numeric.points, None);
        assert_eq!(numeric.completed, None);
    }

    #[test]
    fn status_normalization() {
        assert_eq!(AirdropStatus::normalize(Some("Ongoing")), AirdropStatus::Ongoing);
        assert_eq!(AirdropStatus::normalize(Some("LIVE now")), AirdropStatus::Ongoing);
        assert_eq!(AirdropStatus::normalize(Some("completed")), AirdropStatus::Completed);
        assert_eq!(AirdropStatus::normalize(Some("finished")), AirdropStatus::Completed);
        assert_eq!(AirdropStatus::normalize(Some("announced")), AirdropStatus::Announced);
        assert_eq!(AirdropStatus::normalize(Some("tbd")), AirdropStatus::Announced);
        assert_eq!(AirdropStatus::normalize(None), AirdropStatus::Announced);
    }

    #[test]
    fn quantity_formatting() {
        let text = |s: &str| FeedValue::Text(s.into());
        assert_eq!(format_quantity(None), "-");
        assert_eq!(format_quantity(Some(&FeedValue::Number(1500.456))), "1,500.46");
        assert_eq!(format_quantity(Some(&text("1,234,567"))), "1,234,567");
        assert_eq!(format_quantity(Some(&text(" 2500.5 "))), "2,500.5");
        assert_eq!(format_quantity(Some(&text("   "))), "-");
        assert_eq!(format_quantity(Some(&text("TBA"))), "TBA");
        assert_eq!(format_quantity(Some(&text("1.2.3"))), "1.2.3");
        assert_eq!(format_quantity(Some(&text("-40"))), "-40");
    }

    #[test]
    fn summary_counts() {
        let feed = parse_airdrop_feed(
            br#"{"airdrops":[
                {"token":"A","status":"ongoing"},
                {"token":"B","status":"completed"},
                {"token":"C"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            feed.summary(),
            AirdropSummary {
                ongoing: 1,
                announced: 1,
                completed: 1,
                total: 3
            }
        );
    }
}
