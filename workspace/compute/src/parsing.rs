//! Reading the JSON the AI parser answers with.
//!
//! The model is asked for a flat JSON object but it is not always obedient:
//! answers come wrapped in markdown fences, amounts arrive as numbers or as
//! strings with currency signs, and times come in more than one format.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use model::entities::category::TransactionType;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::error::{ComputeError, Result};

/// Transaction details extracted from an SMS. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    /// `INCOME` or `EXPENSE`
    #[serde(rename = "type", default)]
    pub transaction_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    #[schema(value_type = Option<String>, example = "35.50")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub card_last_four: Option<String>,
    #[serde(default)]
    pub transaction_time: Option<String>,
    /// Free text such as "餐饮" or "交通", matched against category names.
    #[serde(default)]
    pub category_hint: Option<String>,
}

impl ParsedTransaction {
    /// The transaction direction; the comparison ignores case and padding.
    pub fn resolved_type(&self) -> Result<TransactionType> {
        let raw = self.transaction_type.as_deref().unwrap_or_default();
        match raw.trim().to_ascii_uppercase().as_str() {
            "INCOME" => Ok(TransactionType::Income),
            "EXPENSE" => Ok(TransactionType::Expense),
            _ => Err(ComputeError::InvalidField {
                field: "type",
                value: raw.to_string(),
            }),
        }
    }
}

/// Accepts `12.5`, `"12.5"`, `"¥1,234.50"` or `"35元"`; `null` and blank
/// strings become `None`.
fn lenient_amount<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(serde_json::Number),
        Text(String),
    }

    let raw = match Option::<RawAmount>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(RawAmount::Number(n)) => n.to_string(),
        Some(RawAmount::Text(s)) => s,
    };

    parse_amount(&raw).map_err(serde::de::Error::custom)
}

/// Parses a money amount written the way Chinese bank SMS write it.
pub fn parse_amount(raw: &str) -> Result<Option<Decimal>> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '¥' | '￥' | '元' | ',' | '，') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Ok(None);
    }

    let amount = Decimal::from_str(&cleaned).or_else(|_| Decimal::from_scientific(&cleaned))?;
    Ok(Some(amount))
}

/// Strips markdown code fences and surrounding whitespace from an AI answer.
pub fn clean_ai_response(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Cleans and deserializes an AI answer.
pub fn parse_ai_response(raw: &str) -> Result<ParsedTransaction> {
    let cleaned = clean_ai_response(raw);
    let parsed: ParsedTransaction = serde_json::from_str(&cleaned)?;
    debug!(?parsed, "Parsed AI response");
    Ok(parsed)
}

const LOCAL_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

/// Interprets the time reported by the parser, falling back to `fallback`.
///
/// Times with an offset keep their wall-clock reading; the offset itself is
/// dropped.
pub fn parse_transaction_time(raw: Option<&str>, fallback: NaiveDateTime) -> NaiveDateTime {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return fallback;
    };

    for format in LOCAL_FORMATS {
        if let Ok(time) = NaiveDateTime::parse_from_str(raw, format) {
            return time;
        }
    }

    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return time.naive_local();
    }

    warn!(raw, "Unrecognized transaction time, using fallback");
    fallback
}
