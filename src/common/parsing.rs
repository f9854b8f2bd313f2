// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn parse_boolish(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Integer from a JSON number or numeric string. Fractions truncate toward zero.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|v| i64::try_from(v).ok()))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// Daemon REST payloads encode 64-bit integers as strings; accept both forms.
pub fn de_u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<u64>().ok()))
            .or_else(|| value_as_i64(&v).and_then(|n| u64::try_from(n).ok()))
            .ok_or_else(|| serde::de::Error::custom(format!("expected unsigned integer, got {v}"))),
    }
}

pub fn de_u32_lenient<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = de_u64_lenient(deserializer)?;
    u32::try_from(raw).map_err(serde::de::Error::custom)
}

pub fn de_vec_u64_lenient<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    values
        .iter()
        .map(|v| {
            v.as_u64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<u64>().ok()))
                .ok_or_else(|| serde::de::Error::custom(format!("expected channel id, got {v}")))
        })
        .collect()
}

/// Char-boundary safe preview for log lines.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_boolish_rejects_invalid_values() {
        assert_eq!(parse_boolish("true"), Some(true));
        assert_eq!(parse_boolish(" Y "), Some(true));
        assert_eq!(parse_boolish("OFF"), Some(false));
        assert_eq!(parse_boolish("tru"), None);
    }

    #[test]
    fn value_as_i64_accepts_numbers_and_numeric_strings() {
        assert_eq!(value_as_i64(&json!(3.0)), Some(3));
        assert_eq!(value_as_i64(&json!(2.9)), Some(2));
        assert_eq!(value_as_i64(&json!(-2.9)), Some(-2));
        assert_eq!(value_as_i64(&json!("42")), Some(42));
        assert_eq!(value_as_i64(&json!(" 7.5 ")), Some(7));
        assert_eq!(value_as_i64(&json!("abc")), None);
        assert_eq!(value_as_i64(&json!(true)), None);
    }

    #[test]
    fn lenient_u64_deserializer_handles_string_encoding() {
        #[derive(Deserialize)]
        struct Wire {
            #[serde(default, deserialize_with = "de_u64_lenient")]
            amount: u64,
            #[serde(default, deserialize_with = "de_vec_u64_lenient")]
            chans: Vec<u64>,
        }
        let wire: Wire =
            serde_json::from_value(json!({"amount": "18446744073709551615", "chans": ["1", 2]}))
                .unwrap();
        assert_eq!(wire.amount, u64::MAX);
        assert_eq!(wire.chans, vec![1, 2]);

        let empty: Wire = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.amount, 0);
        assert!(empty.chans.is_empty());
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé...");
        assert_eq!(preview("hi", 5), "hi");
    }
}
