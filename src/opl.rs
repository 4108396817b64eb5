//! Codec for osmium's OPL ("object per line") text format.
//!
//! One entity per line, space separated fields, each introduced by a single
//! letter:
//!
//! ```text
//! n1 v3 dV c7 t2020-01-01T00:00:00Z i9 umapper Tamenity=bench x13.1 y52.5
//! w10 Thighway=cycleway Nn1,n2
//! r20 Ttype=route,network=ncn Mw10@,w11@forward
//! ```
//!
//! Characters that would break the field structure are written as
//! `%<hex codepoint>%`.

use std::fmt::Write;

use thiserror::Error;

use crate::metadata::{Metadata, format_timestamp, parse_timestamp};
use crate::model::{ElementId, Entity, Member, MemberKind, Node, Relation, Tags, Way};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OplError {
    #[error("unknown entity type '{0}'")]
    UnknownEntity(char),
    #[error("empty line")]
    Empty,
    #[error("invalid id '{0}'")]
    BadId(String),
    #[error("invalid value '{value}' for field '{field}'")]
    BadField { field: char, value: String },
    #[error("unknown field '{0}'")]
    UnknownField(char),
    #[error("invalid escape sequence in '{0}'")]
    BadEscape(String),
    #[error("invalid tag '{0}'")]
    BadTag(String),
    #[error("invalid member '{0}'")]
    BadMember(String),
    #[error("invalid node reference '{0}'")]
    BadNodeRef(String),
}

fn is_safe(c: char) -> bool {
    !(c.is_control() || c.is_whitespace() || matches!(c, ',' | '=' | '@' | '%'))
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        if is_safe(c) {
            out.push(c);
        } else {
            let _ = write!(out, "%{:x}%", c as u32);
        }
    }
}

fn unescape(value: &str) -> Result<String, OplError> {
    if !value.contains('%') {
        return Ok(value.to_string());
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let hex: String = chars.by_ref().take_while(|&h| h != '%').collect();
        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| OplError::BadEscape(value.to_string()))?;
        out.push(decoded);
    }
    Ok(out)
}

fn write_meta(out: &mut String, meta: &Metadata) {
    out.push_str(" v");
    if let Some(version) = meta.version {
        let _ = write!(out, "{}", version);
    }
    out.push_str(if meta.visible { " dV" } else { " dD" });
    out.push_str(" c");
    if let Some(changeset) = meta.changeset {
        let _ = write!(out, "{}", changeset);
    }
    out.push_str(" t");
    if let Some(ts) = meta.timestamp.as_ref().and_then(format_timestamp) {
        out.push_str(&ts);
    }
    out.push_str(" i");
    if let Some(uid) = meta.uid {
        let _ = write!(out, "{}", uid);
    }
    out.push_str(" u");
    if let Some(user) = &meta.user {
        escape_into(out, user);
    }
}

fn write_tags(out: &mut String, tags: &Tags) {
    out.push_str(" T");
    for (i, (key, value)) in tags.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        escape_into(out, key);
        out.push('=');
        escape_into(out, value);
    }
}

/// Coordinates are written at OSM's 100-nanodegree resolution with trailing
/// zeros removed, so decoder float noise never reaches the output.
fn write_coordinate(out: &mut String, field: char, value: f64) {
    out.push(' ');
    out.push(field);
    if value.is_finite() {
        let fixed = format!("{:.7}", value);
        let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
        out.push_str(if trimmed == "-0" { "0" } else { trimmed });
    }
}

fn member_letter(kind: MemberKind) -> char {
    match kind {
        MemberKind::Node => 'n',
        MemberKind::Way => 'w',
        MemberKind::Relation => 'r',
    }
}

/// Renders an entity as a single OPL line without the trailing newline.
pub fn format_entity(entity: &Entity) -> String {
    let mut out = String::with_capacity(128);
    match entity {
        Entity::Node(node) => {
            let _ = write!(out, "n{}", node.id);
            if let Some(meta) = &node.meta {
                write_meta(&mut out, meta);
            }
            write_tags(&mut out, &node.tags);
            write_coordinate(&mut out, 'x', node.lon);
            write_coordinate(&mut out, 'y', node.lat);
        }
        Entity::Way(way) => {
            let _ = write!(out, "w{}", way.id);
            if let Some(meta) = &way.meta {
                write_meta(&mut out, meta);
            }
            write_tags(&mut out, &way.tags);
            out.push_str(" N");
            for (i, node_ref) in way.refs.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "n{}", node_ref);
            }
        }
        Entity::Relation(relation) => {
            let _ = write!(out, "r{}", relation.id);
            if let Some(meta) = &relation.meta {
                write_meta(&mut out, meta);
            }
            write_tags(&mut out, &relation.tags);
            out.push_str(" M");
            for (i, member) in relation.members.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}{}@", member_letter(member.kind), member.id);
                escape_into(&mut out, &member.role);
            }
        }
    }
    out
}

fn parse_id(value: &str) -> Result<ElementId, OplError> {
    value
        .parse()
        .map_err(|_| OplError::BadId(value.to_string()))
}

fn parse_optional<T: std::str::FromStr>(field: char, value: &str) -> Result<Option<T>, OplError> {
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| OplError::BadField {
        field,
        value: value.to_string(),
    })
}

fn parse_tags(value: &str) -> Result<Tags, OplError> {
    if value.is_empty() {
        return Ok(Tags::new());
    }
    value
        .split(',')
        .map(|pair| {
            let (key, val) = pair
                .split_once('=')
                .ok_or_else(|| OplError::BadTag(pair.to_string()))?;
            Ok((unescape(key)?, unescape(val)?))
        })
        .collect()
}

fn parse_refs(value: &str) -> Result<Vec<ElementId>, OplError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|node_ref| {
            node_ref
                .strip_prefix('n')
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| OplError::BadNodeRef(node_ref.to_string()))
        })
        .collect()
}

fn parse_members(value: &str) -> Result<Vec<Member>, OplError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|raw| {
            let bad = || OplError::BadMember(raw.to_string());
            let mut chars = raw.chars();
            let kind = match chars.next() {
                Some('n') => MemberKind::Node,
                Some('w') => MemberKind::Way,
                Some('r') => MemberKind::Relation,
                _ => return Err(bad()),
            };
            let (id, role) = chars.as_str().split_once('@').ok_or_else(bad)?;
            Ok(Member {
                kind,
                id: id.parse().map_err(|_| bad())?,
                role: unescape(role)?,
            })
        })
        .collect()
}

fn parse_coordinate(field: char, value: &str) -> Result<f64, OplError> {
    Ok(parse_optional(field, value)?.unwrap_or(f64::NAN))
}

/// Parses a single OPL line. Leading and trailing whitespace is ignored.
pub fn parse_entity(line: &str) -> Result<Entity, OplError> {
    let mut fields = line.split_ascii_whitespace();
    let head = fields.next().ok_or(OplError::Empty)?;
    let mut head_chars = head.chars();
    let kind = head_chars.next().ok_or(OplError::Empty)?;
    if !matches!(kind, 'n' | 'w' | 'r') {
        return Err(OplError::UnknownEntity(kind));
    }
    let id = parse_id(head_chars.as_str())?;

    let mut meta: Option<Metadata> = None;
    let mut tags = Tags::new();
    let mut refs = Vec::new();
    let mut members = Vec::new();
    let (mut lat, mut lon) = (f64::NAN, f64::NAN);

    for field in fields {
        let mut chars = field.chars();
        let Some(letter) = chars.next() else {
            continue;
        };
        let value = chars.as_str();
        match letter {
            'v' | 'd' | 'c' | 't' | 'i' | 'u' => {
                let meta = meta.get_or_insert_with(Metadata::default);
                match letter {
                    'v' => meta.version = parse_optional(letter, value)?,
                    'd' => meta.visible = value != "D",
                    'c' => meta.changeset = parse_optional(letter, value)?,
                    't' => {
                        meta.timestamp = if value.is_empty() {
                            None
                        } else {
                            Some(parse_timestamp(value).ok_or_else(|| OplError::BadField {
                                field: letter,
                                value: value.to_string(),
                            })?)
                        }
                    }
                    'i' => meta.uid = parse_optional(letter, value)?,
                    _ => meta.user = (!value.is_empty()).then(|| unescape(value)).transpose()?,
                }
            }
            'T' => tags = parse_tags(value)?,
            'x' if kind == 'n' => lon = parse_coordinate(letter, value)?,
            'y' if kind == 'n' => lat = parse_coordinate(letter, value)?,
            'N' if kind == 'w' => refs = parse_refs(value)?,
            'M' if kind == 'r' => members = parse_members(value)?,
            other => return Err(OplError::UnknownField(other)),
        }
    }

    Ok(match kind {
        'n' => Entity::Node(Node {
            id,
            meta,
            tags,
            lat,
            lon,
        }),
        'w' => Entity::Way(Way {
            id,
            meta,
            tags,
            refs,
        }),
        _ => Entity::Relation(Relation {
            id,
            meta,
            tags,
            members,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_line_parses_members_in_order() {
        let entity = parse_entity("r20 Ttype=route,network=ncn Mw10@,n5@stop,w11@forward").unwrap();
        let Entity::Relation(relation) = entity else {
            panic!("expected relation");
        };
        assert_eq!(relation.id, 20);
        assert_eq!(relation.tags.get("network"), Some("ncn"));
        let ids: Vec<_> = relation.members.iter().map(|m| (m.kind, m.id)).collect();
        assert_eq!(
            ids,
            vec![(MemberKind::Way, 10), (MemberKind::Node, 5), (MemberKind::Way, 11)]
        );
        assert_eq!(relation.members[2].role, "forward");
    }

    #[test]
    fn escaped_values_survive_a_rewrite() {
        let line = "w3 v2 dV c11 t2021-03-04T05:06:07Z i8 uSome%20%User Tname=Rue%20%de%2c%Paris,highway=residential Nn1,n2,n3";
        let entity = parse_entity(line).unwrap();
        let Entity::Way(way) = &entity else {
            panic!("expected way");
        };
        assert_eq!(way.tags.get("name"), Some("Rue de,Paris"));
        assert_eq!(way.meta.as_ref().unwrap().user.as_deref(), Some("Some User"));
        assert_eq!(way.refs, vec![1, 2, 3]);
        assert_eq!(format_entity(&entity), line);
    }

    #[test]
    fn node_without_metadata_formats_compactly() {
        let line = "n1 Tamenity=bench x13.3888599 y52.5170365";
        let entity = parse_entity(line).unwrap();
        assert!(matches!(&entity, Entity::Node(node) if node.meta.is_none()));
        assert_eq!(format_entity(&entity), line);
    }

    #[test]
    fn coordinates_are_rounded_to_osm_precision() {
        let node = |lon: f64, lat: f64| {
            Entity::Node(Node {
                id: 1,
                meta: None,
                tags: Tags::new(),
                lat,
                lon,
            })
        };
        assert_eq!(
            format_entity(&node(13.388859900000002, 52.516200000000005)),
            "n1 T x13.3888599 y52.5162"
        );
        assert_eq!(format_entity(&node(1.0, -0.00000001)), "n1 T x1 y0");
        assert_eq!(format_entity(&node(-180.0, 89.9999999)), "n1 T x-180 y89.9999999");
    }

    #[test]
    fn empty_lists_are_allowed() {
        let entity = parse_entity("r4 T M").unwrap();
        assert_eq!(format_entity(&entity), "r4 T M");
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert_eq!(parse_entity("q1 T"), Err(OplError::UnknownEntity('q')));
        assert_eq!(parse_entity("wabc T"), Err(OplError::BadId("abc".into())));
        assert_eq!(parse_entity("r1 Mx1@"), Err(OplError::BadMember("x1@".into())));
        assert!(matches!(parse_entity("n1 Tk=%zz%"), Err(OplError::BadEscape(_))));
        assert_eq!(parse_entity("w1 Q"), Err(OplError::UnknownField('Q')));
    }
}
