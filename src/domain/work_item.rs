//! Work item records as returned by the listing endpoint.
//!
//! Only `id` is required. Everything else is optional on the wire and unknown
//! JSON fields are ignored, so the record survives schema additions upstream.
//! Timestamps arrive as epoch milliseconds and are exposed as UTC values.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// One work item from a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    #[serde(default)]
    pub author: Option<ListingUser>,
    #[serde(default)]
    pub creator: Option<ListingUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<WorkItemType>,
    #[serde(default)]
    pub duration: WorkItemDuration,
    #[serde(default, rename = "date")]
    pub date_millis: Option<i64>,
    #[serde(default, rename = "created")]
    pub created_millis: Option<i64>,
    #[serde(default, rename = "updated")]
    pub updated_millis: Option<i64>,
    #[serde(default)]
    pub issue: Option<Issue>,
}

impl WorkItem {
    /// Minimal item carrying the attributes the sampler reports on
    pub fn new(id: impl Into<String>, created_millis: i64, date_millis: i64, minutes: i64) -> Self {
        Self {
            id: id.into(),
            author: None,
            creator: None,
            text: None,
            item_type: None,
            duration: WorkItemDuration {
                minutes,
                presentation: None,
            },
            date_millis: Some(date_millis),
            created_millis: Some(created_millis),
            updated_millis: None,
            issue: None,
        }
    }

    #[must_use]
    pub const fn with_updated(mut self, updated_millis: i64) -> Self {
        self.updated_millis = Some(updated_millis);
        self
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_millis.and_then(from_epoch_millis)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_millis.and_then(from_epoch_millis)
    }

    /// The day the work was done on
    pub fn date(&self) -> Option<NaiveDate> {
        self.date_millis
            .and_then(from_epoch_millis)
            .map(|ts| ts.date_naive())
    }
}

fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingUser {
    pub id: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default, rename = "fullName")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemType {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemDuration {
    #[serde(default)]
    pub minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default, rename = "idReadable")]
    pub id: String,
    #[serde(default)]
    pub project: Option<Project>,
    #[serde(default)]
    pub resolved: Option<i64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, rename = "wikifiedDescription")]
    pub description: Option<String>,
    #[serde(default, rename = "customFields")]
    pub custom_fields: Vec<CustomField>,
}

impl Issue {
    pub fn custom_field(&self, name: &str) -> Option<&CustomField> {
        self.custom_fields
            .iter()
            .find(|field| field.name.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "shortName")]
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: CustomFieldValue,
}

/// Value of an issue custom field.
///
/// The wire shape depends on the field type: enum fields send an object with a
/// `name`, multi-value fields an array of such objects, simple fields a bare
/// scalar, and unset fields `null` or nothing at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CustomFieldValue {
    #[default]
    Absent,
    Single(Option<String>),
    Many(Vec<Option<String>>),
}

impl CustomFieldValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Array(values) => Self::Many(values.iter().map(named_value).collect()),
            Value::Object(_) | Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                Self::Single(named_value(value))
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Absent => Value::Null,
            Self::Single(value) => named_object(value.as_deref()),
            Self::Many(values) => Value::Array(
                values
                    .iter()
                    .map(|value| named_object(value.as_deref()))
                    .collect(),
            ),
        }
    }

    pub fn values(&self) -> &[Option<String>] {
        match self {
            Self::Absent => &[],
            Self::Single(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }

    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

fn named_value(value: &Value) -> Option<String> {
    match value {
        Value::Object(fields) => fields.get("name").and_then(Value::as_str).map(str::to_owned),
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) => None,
    }
}

fn named_object(name: Option<&str>) -> Value {
    serde_json::json!({ "name": name })
}

impl<'de> Deserialize<'de> for CustomFieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.map_or(Self::Absent, |value| Self::from_json(&value)))
    }
}

impl Serialize for CustomFieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}
