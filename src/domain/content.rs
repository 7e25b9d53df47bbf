//! Published content records and immutable content nodes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content_types::ContentTypeAlias;
use super::culture::Culture;
use super::error::DomainError;
use super::slug::alias_path;

/// Property holding an explicit URL segment.
pub const URL_NAME_PROPERTY: &str = "urlName";
/// Property holding comma-separated alternative paths.
pub const URL_ALIAS_PROPERTY: &str = "urlAlias";

/// Stable integer identity of a content item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContentId(pub i32);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentId {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<i32>()
            .map(ContentId)
            .map_err(|err| DomainError::parse("content id", value, err))
    }
}

/// Typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A published content item as delivered by the content source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: ContentId,
    #[serde(default)]
    pub key: Option<Uuid>,
    #[serde(default)]
    pub parent_id: Option<ContentId>,
    pub name: String,
    pub content_type: ContentTypeAlias,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub culture: Option<Culture>,
    #[serde(default = "default_published")]
    pub published: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

fn default_published() -> bool {
    true
}

impl ContentRecord {
    pub fn new(
        id: i32,
        parent_id: Option<i32>,
        name: impl Into<String>,
        content_type: impl AsRef<str>,
    ) -> Self {
        Self {
            id: ContentId(id),
            key: None,
            parent_id: parent_id.map(ContentId),
            name: name.into(),
            content_type: ContentTypeAlias::new(content_type),
            sort_order: 0,
            template: None,
            culture: None,
            published: true,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_key(mut self, key: Uuid) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_culture(mut self, culture: impl AsRef<str>) -> Self {
        self.culture = Some(Culture::new(culture));
        self
    }

    pub fn with_property(mut self, alias: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(alias.into(), value);
        self
    }

    pub fn unpublished(mut self) -> Self {
        self.published = false;
        self
    }
}

/// One published content item inside a snapshot.
///
/// Nodes are never mutated once built. The parent is a back-reference by id;
/// the snapshot owns every node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentNode {
    pub id: ContentId,
    pub key: Option<Uuid>,
    pub parent_id: Option<ContentId>,
    pub name: String,
    pub content_type: ContentTypeAlias,
    pub sort_order: i32,
    pub level: u16,
    pub url_segment: String,
    pub template: Option<String>,
    pub culture: Option<Culture>,
    pub children: Vec<ContentId>,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl ContentNode {
    pub fn property(&self, alias: &str) -> Option<&PropertyValue> {
        self.properties.get(alias)
    }

    /// Alternative paths from the `urlAlias` property, slugged per segment,
    /// starting with `/` and without a trailing slash.
    pub fn url_aliases(&self) -> Vec<String> {
        let Some(raw) = self.property(URL_ALIAS_PROPERTY).and_then(PropertyValue::as_text) else {
            return Vec::new();
        };

        raw.split(',').filter_map(alias_path).collect()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
