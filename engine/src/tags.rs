//! Provenance tag keys and conversions between provider tag lists and maps.

use crate::EngineError;
use std::collections::HashMap;

pub type TagMap = HashMap<String, String>;

pub const BACKUP_MARKER_TAG: &str = "backup-marker";
pub const TAG_NAME_TAG: &str = "tag_name";
pub const NAME_TAG: &str = "name";
pub const ENTITY_ID_TAG: &str = "entity_id";
pub const REGION_TAG: &str = "region";
pub const DATE_CREATED_TAG: &str = "date_created";

/// A single provider-side tag. Either half may be absent in API responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: Option<String>,
    pub value: Option<String>,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
        }
    }
}

pub fn prefixed(prefix: &str, key: &str) -> String {
    format!("{prefix}:{key}")
}

pub fn marker_key(prefix: &str) -> String {
    prefixed(prefix, BACKUP_MARKER_TAG)
}

pub fn tag_name_key(prefix: &str) -> String {
    prefixed(prefix, TAG_NAME_TAG)
}

/// Converts provider tags into a map. Later duplicates overwrite earlier ones.
pub fn to_tag_map(tags: impl IntoIterator<Item = Tag>) -> TagMap {
    tags.into_iter()
        .filter_map(|tag| tag.key.map(|key| (key, tag.value.unwrap_or_default())))
        .collect()
}

pub fn to_tag_list(tags: &TagMap) -> Vec<Tag> {
    let mut list: Vec<Tag> = tags.iter().map(|(k, v)| Tag::new(k, v)).collect();
    list.sort_by(|a, b| a.key.cmp(&b.key));
    list
}

/// Checks a tag set before it is written onto a backup.
pub fn validate_provenance(prefix: &str, backup_id: &str, tags: &TagMap) -> Result<(), EngineError> {
    for required in [tag_name_key(prefix), marker_key(prefix)] {
        if !tags.contains_key(&required) {
            return Err(EngineError::MissingProvenance {
                backup_id: backup_id.to_string(),
                tag: required,
            });
        }
    }

    let namespace = format!("{prefix}:");
    if let Some(foreign) = tags.keys().find(|k| !k.starts_with(&namespace)) {
        return Err(EngineError::InvalidTags(format!(
            "tag {foreign} on {backup_id} is outside the {prefix} namespace"
        )));
    }
    Ok(())
}
