//! Typed records decoded from Piwigo web-service responses.
//!
//! Piwigo is loose about its JSON: ids arrive as numbers or strings, optional
//! fields are missing or `null`, and dates may be unparsable. Decoding here never
//! fails on an optional field; only a missing id drops a record.

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// An image as listed by `pwg.categories.getImages`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteImage {
    pub id: i64,
    pub name: String,
    pub file: String,
    pub element_url: String,
    pub comment: String,
    /// `None` when the service sent no date or one that did not parse
    pub date_creation: Option<NaiveDateTime>,
    pub width: u32,
    pub height: u32,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

impl RemoteImage {
    /// Name to show in status messages.
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            self.name.clone()
        } else if !self.file.is_empty() {
            self.file.clone()
        } else {
            format!("image {}", self.id)
        }
    }

    /// Whether the image can be downloaded at all.
    pub fn has_download_url(&self) -> bool {
        !self.element_url.trim().is_empty()
    }
}

/// A category (album) as listed by `pwg.categories.getList`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCategory {
    pub id: i64,
    pub name: String,
    /// Hierarchical display path, e.g. `Holidays / 2023 / Rome`
    pub full_path: String,
    pub parent_id: Option<i64>,
}

/// Common response envelope: `{"stat": "ok" | "fail", "result": ..., ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    #[serde(default, deserialize_with = "lenient_text")]
    pub stat: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub err: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.stat.as_deref() == Some("ok")
    }

    pub fn is_fail(&self) -> bool {
        self.stat.as_deref() == Some("fail")
    }

    pub fn error_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    #[serde(default, deserialize_with = "lenient_int")]
    id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    name_display: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    id_uppercat: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(default, deserialize_with = "lenient_int")]
    id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    file: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    element_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    comment: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    width: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    height: Option<i64>,
    #[serde(default, deserialize_with = "lenient_date")]
    date_creation: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient_names")]
    categories: Vec<String>,
    #[serde(default, deserialize_with = "lenient_names")]
    tags: Vec<String>,
}

impl RawCategory {
    fn into_category(self) -> Option<RemoteCategory> {
        let id = self.id?;
        let name = self.name?;
        let full_path = self
            .name_display
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| name.clone());
        Some(RemoteCategory {
            id,
            name,
            full_path,
            parent_id: self.id_uppercat,
        })
    }
}

impl RawImage {
    fn into_image(self) -> Option<RemoteImage> {
        Some(RemoteImage {
            id: self.id?,
            name: self.name.unwrap_or_default(),
            file: self.file.unwrap_or_default(),
            element_url: self.element_url.unwrap_or_default(),
            comment: self.comment.unwrap_or_default(),
            date_creation: self.date_creation,
            width: dimension(self.width),
            height: dimension(self.height),
            categories: self.categories,
            tags: self.tags,
        })
    }
}

fn dimension(value: Option<i64>) -> u32 {
    value.and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
}

/// Decode `result.categories`, dropping entries without an id or name.
pub(crate) fn decode_categories(result: Option<&Value>) -> Vec<RemoteCategory> {
    decode_entries::<RawCategory>(result, "categories")
        .into_iter()
        .filter_map(RawCategory::into_category)
        .collect()
}

/// Decode `result.images`, dropping entries without an id.
pub(crate) fn decode_images(result: Option<&Value>) -> Vec<RemoteImage> {
    decode_entries::<RawImage>(result, "images")
        .into_iter()
        .filter_map(RawImage::into_image)
        .collect()
}

fn decode_entries<T: DeserializeOwned>(result: Option<&Value>, key: &str) -> Vec<T> {
    let Some(entries) = result.and_then(|r| r.get(key)).and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match T::deserialize(entry) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Skipping malformed {} entry: {}", key, e);
                None
            }
        })
        .collect()
}

/// Parse the date formats Piwigo emits. Unknown formats and zero dates give `None`.
pub fn parse_piwigo_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn int_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(int_from_value))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(text_from_value))
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = lenient_text(deserializer)?;
    Ok(text.as_deref().and_then(parse_piwigo_date))
}

/// `[{"name": ...}, ...]` into names; a missing name becomes an empty string.
fn lenient_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = value else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .filter(|item| !item.is_null())
        .map(|mut item| {
            item.get_mut("name")
                .map(Value::take)
                .and_then(text_from_value)
                .unwrap_or_default()
        })
        .collect())
}
