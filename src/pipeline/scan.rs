use anyhow::Result;

use super::{EntityVisitor, run_pass};
use crate::config::RunSettings;
use crate::model::{EntityKind, MemberKind, Relation};
use crate::network::{MembershipSets, NetworkClass};
use crate::source::DatasetReader;

/// First pass: collects the members of cycle route relations into one
/// membership set per network class.
///
/// Relations need `type=route` and a `network` of `icn`, `ncn`, `rcn` or
/// `lcn`; anything else is skipped without complaint. By default every member
/// id is recorded whatever its type, since the data, not the scanner, decides
/// whether a referenced id is a way.
#[derive(Debug, Default)]
pub struct RelationNetworkScanner {
    sets: MembershipSets,
    way_members_only: bool,
    routes: u64,
}

impl RelationNetworkScanner {
    pub fn new(way_members_only: bool) -> Self {
        Self {
            way_members_only,
            ..Self::default()
        }
    }

    pub fn scan_relation(&mut self, relation: &Relation) {
        if relation.tags.get("type") != Some("route") {
            return;
        }
        let Some(network) = relation.tags.get("network") else {
            return;
        };
        let Some(class) = NetworkClass::from_tag_value(network) else {
            tracing::debug!("Relation {}: ignoring network '{}'", relation.id, network);
            return;
        };

        self.routes += 1;
        let way_members_only = self.way_members_only;
        self.sets.extend(
            class,
            relation
                .members
                .iter()
                .filter(|member| !way_members_only || member.kind == MemberKind::Way)
                .map(|member| member.id),
        );
    }

    /// Number of relations that contributed members.
    pub fn route_count(&self) -> u64 {
        self.routes
    }

    pub fn into_sets(self) -> MembershipSets {
        self.sets
    }
}

impl EntityVisitor for RelationNetworkScanner {
    fn accepts(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Relation
    }

    fn relation(&mut self, relation: Relation) -> Result<()> {
        self.scan_relation(&relation);
        Ok(())
    }
}

/// Runs the scan pass over a whole dataset.
pub fn scan_relations(reader: &dyn DatasetReader, settings: &RunSettings) -> Result<MembershipSets> {
    let mut scanner = RelationNetworkScanner::new(settings.way_members_only);
    run_pass(reader, &mut scanner, "Pass 1/2: route relations")?;

    tracing::info!("Found {} cycle route relations", scanner.route_count());
    let sets = scanner.into_sets();
    for class in NetworkClass::ALL {
        tracing::info!("{} members: {}", class, sets.len(class));
    }
    Ok(sets)
}
