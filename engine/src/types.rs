use crate::tags::{self, TagMap};
use crate::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A live source resource discovered through its marker tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityResource {
    pub entity_id: String,
    pub region: String,
    pub date_created: Option<DateTime<Utc>>,
    pub tags: TagMap,
}

impl EntityResource {
    pub fn new(
        entity_id: impl Into<String>,
        region: impl Into<String>,
        date_created: Option<DateTime<Utc>>,
        tags: TagMap,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            region: region.into(),
            date_created,
            tags,
        }
    }
}

/// A snapshot artifact together with the provenance recorded in its tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupResource {
    /// Deterministic name, used as the provider identifier for new snapshots.
    pub name: String,
    /// Provider identifier; `None` until a create or copy call succeeds.
    pub backup_id: Option<String>,
    pub entity_id: Option<String>,
    pub region: String,
    /// `None` when the artifact carries no parseable `date_created` tag.
    pub date_created: Option<DateTime<Utc>>,
    pub tag_prefix: String,
    pub tags: TagMap,
}

impl BackupResource {
    /// Describes a backup about to be taken of `entity`, with its full provenance tag set.
    pub fn for_entity(tag_prefix: &str, entity: &EntityResource, now: DateTime<Utc>) -> Self {
        let name = backup_name(&entity.entity_id, now);

        let mut tags = TagMap::new();
        tags.insert(tags::tag_name_key(tag_prefix), tag_prefix.to_string());
        tags.insert(tags::marker_key(tag_prefix), "true".to_string());
        tags.insert(tags::prefixed(tag_prefix, tags::NAME_TAG), name.clone());
        tags.insert(
            tags::prefixed(tag_prefix, tags::ENTITY_ID_TAG),
            entity.entity_id.clone(),
        );
        tags.insert(
            tags::prefixed(tag_prefix, tags::REGION_TAG),
            entity.region.clone(),
        );
        tags.insert(
            tags::prefixed(tag_prefix, tags::DATE_CREATED_TAG),
            now.to_rfc3339(),
        );

        Self {
            name,
            backup_id: None,
            entity_id: Some(entity.entity_id.clone()),
            region: entity.region.clone(),
            date_created: Some(now),
            tag_prefix: tag_prefix.to_string(),
            tags,
        }
    }

    /// Rebuilds a descriptor from the tags found on an existing artifact.
    ///
    /// `region` is where the artifact was found and wins over any region tag.
    pub fn construct(
        tag_prefix: &str,
        backup_id: &str,
        region: &str,
        tags: TagMap,
    ) -> Result<Self, EngineError> {
        let tag_name_key = tags::tag_name_key(tag_prefix);
        if !tags.contains_key(&tag_name_key) {
            return Err(EngineError::MissingProvenance {
                backup_id: backup_id.to_string(),
                tag: tag_name_key,
            });
        }

        let lookup = |key: &str| tags.get(&tags::prefixed(tag_prefix, key)).cloned();

        let name = lookup(tags::NAME_TAG).unwrap_or_else(|| backup_id.to_string());
        let entity_id = lookup(tags::ENTITY_ID_TAG);
        let date_created = lookup(tags::DATE_CREATED_TAG)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Self {
            name,
            backup_id: Some(backup_id.to_string()),
            entity_id,
            region: region.to_string(),
            date_created,
            tag_prefix: tag_prefix.to_string(),
            tags,
        })
    }

    /// Only the tags under this backup's prefix.
    pub fn provenance_tags(&self) -> TagMap {
        let namespace = format!("{}:", self.tag_prefix);
        self.tags
            .iter()
            .filter(|(key, _)| key.starts_with(&namespace))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Returns the same backup as it exists in `region`, carrying only its
    /// provenance tags with the region tag rewritten.
    pub fn with_region(&self, region: &str) -> Self {
        let mut copy = self.clone();
        copy.region = region.to_string();
        copy.tags = self.provenance_tags();
        let region_key = tags::prefixed(&self.tag_prefix, tags::REGION_TAG);
        if copy.tags.contains_key(&region_key) {
            copy.tags.insert(region_key, region.to_string());
        }
        copy
    }

    /// The identifier the provider knows this backup by.
    pub fn identifier(&self) -> &str {
        self.backup_id.as_deref().unwrap_or(&self.name)
    }
}

/// `{entity_id}-{YYYYMMDDHHMM}` in UTC.
pub fn backup_name(entity_id: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}", entity_id, at.format("%Y%m%d%H%M"))
}
