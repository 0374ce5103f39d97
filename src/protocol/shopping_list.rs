use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

const DEFAULT_CATEGORY: &str = "Ogólne";
const DEFAULT_CONFIDENCE: f32 = 0.8;

/// Timestamps below this are taken to be epoch seconds
const EPOCH_MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

/// A single item extracted from the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingListItem {
    #[serde(default = "default_name")]
    pub name: String,

    /// Always at least 1; fractional values from the backend are rounded
    #[serde(default = "default_quantity", deserialize_with = "deserialize_quantity")]
    pub quantity: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default = "default_category")]
    pub category: String,
}

impl ShoppingListItem {
    pub fn new(name: impl Into<String>, quantity: u32, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.max(1),
            unit: None,
            category: category.into(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Full list state pushed by the server.
///
/// Every update replaces the previous snapshot wholesale; snapshots are
/// never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingListSnapshot {
    #[serde(default)]
    pub items: Vec<ShoppingListItem>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub conversation_context: String,

    /// Epoch milliseconds of the last server-side update
    #[serde(
        rename = "last_update",
        default,
        deserialize_with = "deserialize_epoch_millis"
    )]
    pub last_update_ms: i64,

    /// Model confidence in `[0, 1]`
    #[serde(default = "default_confidence", deserialize_with = "deserialize_confidence")]
    pub confidence: f32,
}

impl ShoppingListSnapshot {
    pub fn new(items: Vec<ShoppingListItem>) -> Self {
        Self {
            items,
            conversation_context: String::new(),
            last_update_ms: chrono::Utc::now().timestamp_millis(),
            confidence: DEFAULT_CONFIDENCE,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn item_names(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.name.as_str()).collect()
    }
}

/// Whether a detected product should be added or removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductAction {
    Add,
    Remove,
}

/// Single-product detection event (legacy per-item protocol)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetection {
    pub id: String,
    pub name: String,
    pub action: ProductAction,
    #[serde(default = "default_quantity", deserialize_with = "deserialize_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_confidence", deserialize_with = "deserialize_confidence")]
    pub confidence: f32,
    #[serde(default, deserialize_with = "deserialize_epoch_millis")]
    pub timestamp: i64,
}

fn default_name() -> String {
    "unknown".to_string()
}

fn default_quantity() -> u32 {
    1
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_confidence() -> f32 {
    DEFAULT_CONFIDENCE
}

fn deserialize_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() || raw < 1.0 {
        return Ok(1);
    }
    Ok(raw.round().min(u32::MAX as f64) as u32)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Number(f64),
    Text(String),
}

/// Epoch seconds or millis as a number, or an ISO-8601 string; anything
/// unreadable becomes 0.
fn deserialize_epoch_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Number(raw) => raw,
        RawTimestamp::Text(text) => return Ok(parse_iso_millis(&text).unwrap_or(0)),
    };
    if !raw.is_finite() || raw <= 0.0 {
        return Ok(0);
    }
    let millis = if raw < EPOCH_MILLIS_THRESHOLD {
        raw * 1000.0
    } else {
        raw
    };
    Ok(millis.round() as i64)
}

fn parse_iso_millis(text: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }
    // Naive timestamps are taken as UTC
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_nan() {
        return Ok(DEFAULT_CONFIDENCE);
    }
    Ok(raw.clamp(0.0, 1.0) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_quantity_rounds() {
        let item: ShoppingListItem =
            serde_json::from_str(r#"{"name":"mleko","quantity":2.0,"category":"Nabiał"}"#).unwrap();
        assert_eq!(item.quantity, 2);

        let item: ShoppingListItem =
            serde_json::from_str(r#"{"name":"jajka","quantity":0.4}"#).unwrap();
        assert_eq!(item.quantity, 1, "quantity is never below one");
        assert_eq!(item.category, "Ogólne");
        assert_eq!(item.unit, None);
    }

    #[test]
    fn test_last_update_seconds_become_millis() {
        let snapshot: ShoppingListSnapshot =
            serde_json::from_str(r#"{"items":[],"last_update":1700000000.5,"confidence":0.95}"#)
                .unwrap();
        assert_eq!(snapshot.last_update_ms, 1_700_000_000_500);
        assert!((snapshot.confidence - 0.95).abs() < f32::EPSILON);
    }

    #[test]
    fn test_last_update_millis_pass_through() {
        let snapshot: ShoppingListSnapshot =
            serde_json::from_str(r#"{"items":[],"last_update":1700000000500}"#).unwrap();
        assert_eq!(snapshot.last_update_ms, 1_700_000_000_500);
        assert!((snapshot.confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_product_timestamp_accepts_iso_string() {
        let product: ProductDetection = serde_json::from_str(
            r#"{"id":"p-1","name":"chleb","action":"add","quantity":1,"category":"Pieczywo","confidence":0.9,"timestamp":"2024-01-01T10:00:00.250"}"#,
        )
        .unwrap();
        assert_eq!(product.timestamp, 1_704_103_200_250);
        assert_eq!(product.action, ProductAction::Add);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let snapshot: ShoppingListSnapshot =
            serde_json::from_str(r#"{"items":[],"last_update":0,"confidence":1.7}"#).unwrap();
        assert_eq!(snapshot.confidence, 1.0);
    }
}
