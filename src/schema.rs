use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid tree JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tree document must be a JSON object")]
    NotAnObject,
    #[error("stored tree has no data payload")]
    MissingData,
}

/// Which stored schema a document uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaKind {
    Legacy,
    Couple,
}

/// A stored tree document, kept close to the JSON the editor writes so that
/// unknown keys survive a load, edit and save cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeDocument {
    Legacy(LegacyRoot),
    Couple(RawPerson),
    Empty(Map<String, Value>),
}

impl TreeDocument {
    pub fn parse(input: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        let Value::Object(map) = value else {
            return Err(DocumentError::NotAnObject);
        };
        if is_truthy(map.get("Grandparent")) || is_truthy(map.get("Parent")) {
            return Ok(Self::Legacy(LegacyRoot::from_map(map)?));
        }
        let has_children = map.get("children").is_some_and(Value::is_array);
        if is_truthy(map.get("name")) || is_truthy(map.get("spouse")) || has_children {
            let root: RawPerson = serde_json::from_value(Value::Object(map))?;
            return Ok(Self::Couple(root));
        }
        Ok(Self::Empty(map))
    }

    pub fn to_value(&self) -> Result<Value, DocumentError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn kind(&self) -> Option<SchemaKind> {
        match self {
            Self::Legacy(_) => Some(SchemaKind::Legacy),
            Self::Couple(_) => Some(SchemaKind::Couple),
            Self::Empty(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty(_))
    }

    pub fn setup_context(&self) -> Option<SetupContext> {
        match self {
            Self::Legacy(root) => root.setup_context.clone(),
            Self::Couple(root) => root
                .extra
                .get("setupContext")
                .filter(|value| value.is_object())
                .and_then(|value| serde_json::from_value(value.clone()).ok()),
            Self::Empty(_) => None,
        }
    }

    /// Trimmed, lowercased `setupContext.centerName`, when present.
    pub fn center_name_hint(&self) -> Option<String> {
        let name = self.setup_context()?.center_name?;
        let name = name.trim().to_lowercase();
        (!name.is_empty()).then_some(name)
    }
}

impl Serialize for TreeDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Legacy(root) => root
                .to_map()
                .map_err(ser::Error::custom)?
                .serialize(serializer),
            Self::Couple(root) => root.serialize(serializer),
            Self::Empty(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TreeDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(de::Error::custom)
    }
}

/// Generation-keyed document: `Grandparent` names the root person and
/// `Parent` holds the next generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyRoot {
    pub root: RawPerson,
    pub parent: Option<Vec<RawPerson>>,
    pub setup_context: Option<SetupContext>,
    shadowed_name: Option<Value>,
}

impl LegacyRoot {
    pub fn new(root: RawPerson, parent: Vec<RawPerson>) -> Self {
        Self {
            root,
            parent: Some(parent),
            setup_context: None,
            shadowed_name: None,
        }
    }

    fn from_map(mut map: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let shadowed_name = map.remove("name");
        let parent = match map.remove("Parent") {
            Some(value) => lenient::people_from_value(value),
            None => None,
        };
        let setup_context = match map.remove("setupContext") {
            Some(value @ Value::Object(_)) => Some(serde_json::from_value(value)?),
            _ => None,
        };
        if let Some(grandparent) = map.remove("Grandparent") {
            map.insert("name".to_string(), grandparent);
        }
        let root: RawPerson = serde_json::from_value(Value::Object(map))?;
        Ok(Self {
            root,
            parent,
            setup_context,
            shadowed_name,
        })
    }

    fn to_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let Value::Object(mut map) = serde_json::to_value(&self.root)? else {
            return Ok(Map::new());
        };
        if let Some(name) = map.remove("name") {
            map.insert("Grandparent".to_string(), name);
        }
        if let Some(name) = &self.shadowed_name {
            map.insert("name".to_string(), name.clone());
        }
        if let Some(parent) = &self.parent {
            map.insert("Parent".to_string(), serde_json::to_value(parent)?);
        }
        if let Some(context) = &self.setup_context {
            map.insert("setupContext".to_string(), serde_json::to_value(context)?);
        }
        Ok(map)
    }

    pub fn parent_list(&self) -> &[RawPerson] {
        self.parent.as_deref().unwrap_or_default()
    }
}

/// One stored person record. The same shape is used for couple-schema
/// nodes, legacy `Parent`/child/grandchild entries, spouse records and
/// `parents` ancestor records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPerson {
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visited: Option<Value>,
    #[serde(default, deserialize_with = "lenient::flag", skip_serializing_if = "Option::is_none")]
    pub is_origin: Option<bool>,
    #[serde(default, deserialize_with = "lenient::index", skip_serializing_if = "Option::is_none")]
    pub from_spouse_index: Option<i64>,
    #[serde(default, deserialize_with = "lenient::flag", skip_serializing_if = "Option::is_none")]
    pub from_prev_spouse: Option<bool>,
    #[serde(default, skip_serializing_if = "SpouseField::is_absent")]
    pub spouse: SpouseField,
    #[serde(default, deserialize_with = "lenient::spouse_item", skip_serializing_if = "Option::is_none")]
    pub prev_spouse: Option<SpouseItem>,
    #[serde(default, deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    pub parents: Option<Box<RawPerson>>,
    #[serde(default, deserialize_with = "lenient::people", skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<RawPerson>>,
    #[serde(default, deserialize_with = "lenient::people", skip_serializing_if = "Option::is_none")]
    pub grandchildren: Option<Vec<RawPerson>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawPerson {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn trimmed_name(&self) -> &str {
        self.name.as_deref().map(str::trim).unwrap_or_default()
    }

    /// Stored union index: `fromSpouseIndex` when numeric, else the legacy
    /// `fromPrevSpouse` flag.
    pub fn stored_spouse_index(&self) -> usize {
        match self.from_spouse_index {
            Some(index) => index.max(0) as usize,
            None if self.from_prev_spouse.unwrap_or(false) => 1,
            None => 0,
        }
    }

    pub fn set_stored_spouse_index(&mut self, index: usize) {
        if index == 0 {
            self.from_spouse_index = self.from_spouse_index.map(|_| 0);
            if self.from_prev_spouse.is_some() {
                self.from_prev_spouse = Some(false);
            }
        } else {
            self.from_spouse_index = Some(index as i64);
            self.from_prev_spouse = Some(true);
        }
    }
}

/// The `spouse` key accepts a bare name, a record or a list of either.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SpouseField {
    #[default]
    Absent,
    Single(SpouseItem),
    Multiple(Vec<SpouseItem>),
}

impl SpouseField {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn items(&self) -> &[SpouseItem] {
        match self {
            Self::Absent => &[],
            Self::Single(item) => std::slice::from_ref(item),
            Self::Multiple(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SpouseItem> {
        match self {
            Self::Absent => None,
            Self::Single(item) => (index == 0).then_some(item),
            Self::Multiple(items) => items.get_mut(index),
        }
    }

    pub fn push(&mut self, item: SpouseItem) {
        match std::mem::take(self) {
            Self::Absent => *self = Self::Multiple(vec![item]),
            Self::Single(existing) => *self = Self::Multiple(vec![existing, item]),
            Self::Multiple(mut items) => {
                items.push(item);
                *self = Self::Multiple(items);
            }
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<SpouseItem> {
        match std::mem::take(self) {
            Self::Absent => None,
            Self::Single(item) if index == 0 => Some(item),
            Self::Single(item) => {
                *self = Self::Single(item);
                None
            }
            Self::Multiple(mut items) => {
                let removed = (index < items.len()).then(|| items.remove(index));
                *self = Self::Multiple(items);
                removed
            }
        }
    }

    pub fn into_items(self) -> Vec<SpouseItem> {
        match self {
            Self::Absent => Vec::new(),
            Self::Single(item) => vec![item],
            Self::Multiple(items) => items,
        }
    }

    /// Storage form used after a root promotion: nothing, one entry, or a list.
    pub fn from_items(mut items: Vec<SpouseItem>) -> Self {
        match items.len() {
            0 => Self::Absent,
            1 => Self::Single(items.remove(0)),
            _ => Self::Multiple(items),
        }
    }
}

impl Serialize for SpouseField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent => serializer.serialize_none(),
            Self::Single(item) => item.serialize(serializer),
            Self::Multiple(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SpouseField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Null => Self::Absent,
            Value::Array(items) => Self::Multiple(
                items
                    .into_iter()
                    .map(SpouseItem::from_value)
                    .collect::<Result<_, _>>()
                    .map_err(de::Error::custom)?,
            ),
            other => Self::Single(SpouseItem::from_value(other).map_err(de::Error::custom)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SpouseItem {
    Name(String),
    Record(Box<RawPerson>),
    /// Entries that carry no person data (numbers, booleans, null). They keep
    /// their slot so stored union indices stay stable.
    Opaque(Value),
}

impl SpouseItem {
    fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        Ok(match value {
            Value::String(name) => Self::Name(name),
            value @ Value::Object(_) => Self::Record(Box::new(serde_json::from_value(value)?)),
            other => Self::Opaque(other),
        })
    }

    pub fn record(&self) -> Option<&RawPerson> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name.trim(),
            Self::Record(record) => record.trimmed_name(),
            Self::Opaque(_) => "",
        }
    }

    /// Converts a bare name into a record in place and returns it.
    pub fn record_mut(&mut self) -> Option<&mut RawPerson> {
        if let Self::Name(name) = self {
            *self = Self::Record(Box::new(RawPerson::named(name.trim())));
        }
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for SpouseItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupContext {
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub center_mode: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub center_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag", skip_serializing_if = "Option::is_none")]
    pub enable_birthdays: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag", skip_serializing_if = "Option::is_none")]
    pub enable_globe_countries: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub relationship_to_center: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Persistence envelope: one record per tree with the document under `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTree {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag", skip_serializing_if = "Option::is_none")]
    pub enable_calendar_dates: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag", skip_serializing_if = "Option::is_none")]
    pub enable_globe_countries: Option<bool>,
    #[serde(default)]
    pub data: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoredTree {
    /// `data` may be stored inline or as an encoded JSON string.
    pub fn document(&self) -> Result<TreeDocument, DocumentError> {
        match &self.data {
            Value::Null => Err(DocumentError::MissingData),
            Value::String(encoded) => TreeDocument::parse(encoded),
            value => TreeDocument::from_value(value.clone()),
        }
    }

    pub fn set_document(&mut self, document: &TreeDocument) -> Result<(), DocumentError> {
        self.data = document.to_value()?;
        Ok(())
    }
}

pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

mod lenient {
    use super::*;

    pub(super) fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(text) => Some(text),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        })
    }

    pub(super) fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Null => None,
            other => Some(is_truthy(Some(&other))),
        })
    }

    pub(super) fn index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let number = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) if text.trim().is_empty() => Some(0.0),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            Value::Bool(flag) => Some(if flag { 1.0 } else { 0.0 }),
            _ => None,
        };
        Ok(number.filter(|n| n.is_finite()).map(|n| n.trunc() as i64))
    }

    pub(super) fn spouse_item<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SpouseItem>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(None),
            other => SpouseItem::from_value(other).map(Some).map_err(de::Error::custom),
        }
    }

    pub(super) fn object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            value @ Value::Object(_) => serde_json::from_value(value)
                .map(Some)
                .map_err(de::Error::custom),
            _ => Ok(None),
        }
    }

    pub(super) fn people<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<RawPerson>>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(people_from_value(value))
    }

    /// Lists keep object entries, promote bare strings to named records and
    /// drop anything else. A lone object counts as a one-entry list.
    pub(super) fn people_from_value(value: Value) -> Option<Vec<RawPerson>> {
        let items = match value {
            Value::Array(items) => items,
            value @ Value::Object(_) => vec![value],
            _ => return None,
        };
        Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(name) => Some(RawPerson::named(name)),
                    value @ Value::Object(_) => serde_json::from_value(value).ok(),
                    _ => None,
                })
                .collect(),
        )
    }
}
