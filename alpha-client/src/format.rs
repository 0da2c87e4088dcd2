//! en-US number formatting for feed values.

use serde::{Deserialize, Serialize};

/// A feed field that may arrive as a JSON number or as a string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedValue {
    Number(f64),
    Text(String),
}

impl FeedValue {
    /// Numeric reading of the value. Blank text reads as zero; text that is
    /// not a finite number reads as `None`.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            FeedValue::Number(value) => *value,
            FeedValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().ok()?
                }
            }
        };
        value.is_finite().then_some(value)
    }

    /// The value as it appeared in the feed.
    pub fn raw(&self) -> String {
        match self {
            FeedValue::Number(value) => value.to_string(),
            FeedValue::Text(text) => text.clone(),
        }
    }
}

/// Format `value` with comma thousands separators and between
/// `min_fraction` and `max_fraction` decimals. Ties round away from zero.
pub fn format_number(value: f64, min_fraction: usize, max_fraction: usize) -> String {
    let (int_part, frac_part) = round_decimal(&value.abs().to_string(), max_fraction);

    let mut fraction = frac_part.trim_end_matches('0').to_string();
    while fraction.len() < min_fraction {
        fraction.push('0');
    }

    let nonzero = |digits: &str| digits.bytes().any(|b| matches!(b, b'1'..=b'9'));
    let negative = value.is_sign_negative() && (nonzero(&int_part) || nonzero(&fraction));
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3 + fraction.len() + 2);
    if negative {
        out.push('-');
    }
    out.push_str(&group_thousands(&int_part));
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(&fraction);
    }
    out
}

/// Round the shortest decimal form of a non-negative float to `places`
/// fraction digits, half away from zero.
fn round_decimal(shortest: &str, places: usize) -> (String, String) {
    let (int_part, frac_part) = shortest.split_once('.').unwrap_or((shortest, ""));
    if frac_part.len() <= places {
        return (int_part.to_string(), frac_part.to_string());
    }

    let mut digits: Vec<u8> = int_part.bytes().chain(frac_part.bytes().take(places)).collect();
    if frac_part.as_bytes()[places] >= b'5' {
        let mut idx = digits.len();
        loop {
            if idx == 0 {
                digits.insert(0, b'1');
                break;
            }
            idx -= 1;
            if digits[idx] == b'9' {
                digits[idx] = b'0';
            } else {
                digits[idx] += 1;
                break;
            }
        }
    }

    let split = digits.len() - places;
    let int_digits = String::from_utf8_lossy(&digits[..split]).into_owned();
    let frac_digits = String::from_utf8_lossy(&digits[split..]).into_owned();
    (int_digits, frac_digits)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_and_pads() {
        assert_eq!(format_number(65000.123456, 6, 6), "65,000.123456");
        assert_eq!(format_number(2.0, 4, 4), "2.0000");
        assert_eq!(format_number(120.0, 0, 0), "120");
        assert_eq!(format_number(1234567.0, 0, 0), "1,234,567");
        assert_eq!(format_number(999.0, 0, 2), "999");
    }

    #[test]
    fn trims_optional_decimals() {
        assert_eq!(format_number(1500.5, 0, 2), "1,500.5");
        assert_eq!(format_number(0.129, 0, 2), "0.13");
        assert_eq!(format_number(10.0, 0, 2), "10");
    }

    #[test]
    fn ties_round_away_from_zero() {
        assert_eq!(format_number(2.5, 0, 0), "3");
        assert_eq!(format_number(0.125, 0, 2), "0.13");
        assert_eq!(format_number(1234.5, 0, 0), "1,235");
        assert_eq!(format_number(999.5, 0, 0), "1,000");
        assert_eq!(format_number(1.005, 0, 2), "1.01");
        assert_eq!(format_number(-2.5, 0, 0), "-3");
        assert_eq!(format_number(0.0000005, 6, 6), "0.000001");
        assert_eq!(format_number(0.0000123, 6, 6), "0.000012");
    }

    #[test]
    fn negative_values() {
        assert_eq!(format_number(-1234.5, 2, 2), "-1,234.50");
        assert_eq!(format_number(-0.001, 0, 2), "0");
    }

    #[test]
    fn feed_value_reads_numbers_and_text() {
        assert_eq!(FeedValue::Number(3.5).as_number(), Some(3.5));
        assert_eq!(FeedValue::Text(" 42 ".into()).as_number(), Some(42.0));
        assert_eq!(FeedValue::Text("".into()).as_number(), Some(0.0));
        assert_eq!(FeedValue::Text("n/a".into()).as_number(), None);
        assert_eq!(FeedValue::Text("inf".into()).as_number(), None);
    }

    #[test]
    fn feed_value_deserializes_untagged() {
        let values: Vec<FeedValue> = serde_json::from_str(r#"[1.25, "abc"]"#).unwrap();
        assert_eq!(values[0], FeedValue::Number(1.25));
        assert_eq!(values[1], FeedValue::Text("abc".into()));
    }
}
