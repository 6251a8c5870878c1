use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::TagColor;

/// Full exported registry state: the unit of persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSnapshot {
    /// Tagged paths in registry insertion order.
    pub tags: Vec<(String, TagColor)>,
    /// Effective display name of every color.
    pub tag_names: BTreeMap<TagColor, String>,
}

impl TagSnapshot {
    /// Path lookup view, ignoring insertion order.
    pub fn tag_map(&self) -> HashMap<&str, TagColor> {
        self.tags
            .iter()
            .map(|(path, color)| (path.as_str(), *color))
            .collect()
    }

    pub fn to_stored(&self) -> StoredTags {
        StoredTags {
            tags: self
                .tags
                .iter()
                .map(|(path, color)| (path.clone(), color.as_str().to_string()))
                .collect(),
            tag_names: self
                .tag_names
                .iter()
                .map(|(color, name)| (color.as_str().to_string(), name.clone()))
                .collect(),
        }
    }

    /// Converts a persisted record, skipping entries whose color identifier
    /// is not part of the palette.
    pub fn from_stored(stored: StoredTags) -> Self {
        let mut tags = Vec::with_capacity(stored.tags.len());
        for (path, color) in stored.tags {
            match color.parse::<TagColor>() {
                Ok(color) => tags.push((path, color)),
                Err(_) => tracing::warn!(%path, %color, "skipping tag with unknown color"),
            }
        }

        let mut tag_names = BTreeMap::new();
        for (color, name) in stored.tag_names {
            match color.parse::<TagColor>() {
                Ok(parsed) => {
                    tag_names.insert(parsed, name);
                }
                Err(_) => tracing::warn!(%color, "skipping name for unknown color"),
            }
        }

        Self { tags, tag_names }
    }
}

/// Persisted record layout: `{"tags": {path: color}, "tagNames": {color: name}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTags {
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, rename = "tagNames")]
    pub tag_names: BTreeMap<String, String>,
}

impl StoredTags {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse stored tags")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize tags")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_layout_field_names() {
        let snapshot = TagSnapshot {
            tags: vec![("/proj/a.rs".to_string(), TagColor::Red)],
            tag_names: BTreeMap::from([(TagColor::Red, "Urgent".to_string())]),
        };

        let json = snapshot.to_stored().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["tags"]["/proj/a.rs"], "Red");
        assert_eq!(value["tagNames"]["Red"], "Urgent");
    }

    #[test]
    fn test_unknown_colors_are_skipped() {
        let stored = StoredTags::from_json(
            r#"{"tags": {"/a": "Red", "/b": "Magenta"}, "tagNames": {"Teal": "x", "Blue": "Sky"}}"#,
        )
        .unwrap();

        let snapshot = TagSnapshot::from_stored(stored);

        assert_eq!(snapshot.tags, vec![("/a".to_string(), TagColor::Red)]);
        assert_eq!(snapshot.tag_names.len(), 1);
        assert_eq!(snapshot.tag_names[&TagColor::Blue], "Sky");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let stored = StoredTags::from_json("{}").unwrap();
        assert!(stored.tags.is_empty());
        assert!(stored.tag_names.is_empty());
    }
}
