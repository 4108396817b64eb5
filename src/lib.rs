//! Cycle route network tagging for OpenStreetMap extracts.
//!
//! A first pass collects the members of `type=route` relations whose
//! `network` is `icn`, `ncn`, `rcn` or `lcn`. A second pass rewrites the
//! dataset, prefixing each member way's tags with `<network>=yes`. A separate
//! pass counts ways that already carry those tags.

pub mod app;
pub mod config;
pub mod metadata;
pub mod model;
pub mod network;
pub mod opl;
pub mod pipeline;
pub mod sinks;
pub mod source;
pub mod utils;

pub use model::{ElementId, Entity, EntityKind, Member, MemberKind, Node, Relation, Tags, Way};
pub use network::{MembershipSets, NetworkClass, NetworkCounts};
pub use pipeline::{
    EntityVisitor, NetworkCounter, RelationNetworkScanner, WayTagger, count_dataset, run_pass,
    scan_relations, tag_dataset,
};
