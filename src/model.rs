//! Owned OSM entities as they travel between readers, visitors and writers.
//!
//! Entities are transient: a reader builds one, a visitor inspects or
//! rewrites it, and a writer consumes it. Nothing here is retained across a
//! whole dataset.

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::metadata::Metadata;

/// OSM element identifier. Kept signed so that editor-generated negative ids
/// pass through untouched.
pub type ElementId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Way,
    Relation,
}

/// Ordered tag list. Keys are expected to be unique; insertion order is the
/// order the tags were read in and the order they are written back out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tags(Vec<(String, String)>);

impl Tags {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn extend(&mut self, other: Tags) {
        self.0.extend(other.0);
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Tags {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl FromIterator<(String, String)> for Tags {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// Serialized as a JSON object; serde_json writes entries in call order, so
// tag order survives without a preserve-order map.
impl Serialize for Tags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    pub id: ElementId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Metadata>,
    pub tags: Tags,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Way {
    pub id: ElementId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Metadata>,
    pub tags: Tags,
    pub refs: Vec<ElementId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

impl From<osmpbf::RelMemberType> for MemberKind {
    fn from(member_type: osmpbf::RelMemberType) -> Self {
        match member_type {
            osmpbf::RelMemberType::Node => MemberKind::Node,
            osmpbf::RelMemberType::Way => MemberKind::Way,
            osmpbf::RelMemberType::Relation => MemberKind::Relation,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Member {
    #[serde(rename = "type")]
    pub kind: MemberKind,
    #[serde(rename = "ref")]
    pub id: ElementId,
    pub role: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub id: ElementId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Metadata>,
    pub tags: Tags,
    pub members: Vec<Member>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entity {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Node(_) => EntityKind::Node,
            Entity::Way(_) => EntityKind::Way,
            Entity::Relation(_) => EntityKind::Relation,
        }
    }

    pub fn id(&self) -> ElementId {
        match self {
            Entity::Node(node) => node.id,
            Entity::Way(way) => way.id,
            Entity::Relation(relation) => relation.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_keep_insertion_order() {
        let mut tags = Tags::new();
        tags.push("highway", "cycleway");
        tags.push("surface", "asphalt");
        tags.push("bicycle", "designated");
        let keys: Vec<&str> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["highway", "surface", "bicycle"]);
        assert_eq!(tags.get("surface"), Some("asphalt"));
        assert!(!tags.contains_key("icn"));
    }

    #[test]
    fn entity_json_keeps_tag_order() {
        let way = Entity::Way(Way {
            id: 7,
            meta: None,
            tags: [("zeta", "1"), ("alpha", "2")].into_iter().collect(),
            refs: vec![1, 2],
        });
        let json = serde_json::to_string(&way).unwrap();
        assert_eq!(
            json,
            r#"{"type":"way","id":7,"tags":{"zeta":"1","alpha":"2"},"refs":[1,2]}"#
        );
    }
}
