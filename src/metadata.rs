use osmpbf::{DenseNodeInfo, Info};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Editing metadata attached to an entity. Every field is optional because
/// extracts are frequently stripped of some or all of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changeset: Option<i64>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            version: None,
            // An absent visible flag means the element is current.
            visible: true,
            changeset: None,
            timestamp: None,
            uid: None,
            user: None,
        }
    }
}

impl Metadata {
    /// `None` when the block carries no metadata for the element.
    pub fn from_info(info: &Info) -> Option<Self> {
        let meta = Self {
            version: info.version().map(i64::from),
            visible: info.visible(),
            changeset: info.changeset(),
            timestamp: info.milli_timestamp().and_then(timestamp_from_millis),
            uid: info.uid().map(i64::from),
            user: info
                .user()
                .and_then(|user| user.ok())
                .map(|s| s.to_string()),
        };
        (meta != Self::default()).then_some(meta)
    }

    pub fn from_dense_info(info: &DenseNodeInfo) -> Self {
        Self {
            version: Some(i64::from(info.version())),
            visible: info.visible(),
            changeset: Some(info.changeset()),
            timestamp: timestamp_from_millis(info.milli_timestamp()),
            uid: Some(i64::from(info.uid())),
            user: info.user().ok().map(|s| s.to_string()),
        }
    }
}

pub fn timestamp_from_millis(millis: i64) -> Option<OffsetDateTime> {
    let nanos = i128::from(millis) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
}

pub fn format_timestamp(timestamp: &OffsetDateTime) -> Option<String> {
    timestamp.format(&Rfc3339).ok()
}

pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_render_as_rfc3339() {
        let ts = timestamp_from_millis(1_704_067_200_000).unwrap();
        assert_eq!(format_timestamp(&ts).unwrap(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn parsed_timestamp_formats_back_unchanged() {
        let ts = parse_timestamp("2019-06-30T12:34:56Z").unwrap();
        assert_eq!(format_timestamp(&ts).unwrap(), "2019-06-30T12:34:56Z");
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        assert!(parse_timestamp("yesterday").is_none());
    }
}
