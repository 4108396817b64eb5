use anyhow::{Context, Result};
use osmpbf::{Blob, BlobDecode, BlobReader, Element, PrimitiveBlock};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use super::{DatasetReader, Interest};
use crate::metadata::Metadata;
use crate::model::{Entity, EntityKind, Member, Node, Relation, Way};
use crate::pipeline::{EntityVisitor, PassStats};
use crate::utils::ProgressCounter;

/// Reads `*.osm.pbf` files. Blobs are decoded on the rayon pool a chunk at a
/// time and delivered to the visitor in file order, one batch per block.
pub struct PbfReader {
    path: PathBuf,
    progress: bool,
}

impl PbfReader {
    pub fn new<P: AsRef<Path>>(path: P, progress: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            progress,
        }
    }
}

impl DatasetReader for PbfReader {
    fn read(&self, visitor: &mut dyn EntityVisitor, label: &'static str) -> Result<PassStats> {
        let reader = BlobReader::from_path(&self.path)
            .with_context(|| format!("Reader: Failed to open {:?}", self.path))?;
        let interest = Interest::of(visitor);
        let chunk_size = rayon::current_num_threads().max(1) * 2;
        let progress = ProgressCounter::new(label, 100, self.progress);
        let mut stats = PassStats::default();
        let mut pending: Vec<Blob> = Vec::with_capacity(chunk_size);

        for blob_result in reader {
            pending.push(blob_result.context("Reader: Failed to read blob")?);
            if pending.len() == chunk_size {
                deliver_chunk(std::mem::take(&mut pending), interest, visitor, &mut stats)?;
                progress.inc(chunk_size as u64);
            }
        }
        let remaining = pending.len() as u64;
        deliver_chunk(pending, interest, visitor, &mut stats)?;
        progress.inc(remaining);

        progress.finish();
        Ok(stats)
    }
}

fn deliver_chunk(
    blobs: Vec<Blob>,
    interest: Interest,
    visitor: &mut dyn EntityVisitor,
    stats: &mut PassStats,
) -> Result<()> {
    // Indexed collect keeps the blobs in file order.
    let decoded = blobs
        .into_par_iter()
        .map(|blob| decode_blob(&blob, interest))
        .collect::<Result<Vec<_>>>()?;

    for (batch, block_stats) in decoded {
        stats.nodes += block_stats.nodes;
        stats.ways += block_stats.ways;
        stats.relations += block_stats.relations;
        if !batch.is_empty() {
            visitor.visit_batch(batch)?;
        }
    }
    Ok(())
}

fn decode_blob(blob: &Blob, interest: Interest) -> Result<(Vec<Entity>, PassStats)> {
    match blob.decode() {
        Ok(BlobDecode::OsmHeader(_)) => Ok((Vec::new(), PassStats::default())),
        Ok(BlobDecode::OsmData(block)) => Ok(convert_block(&block, interest)),
        Ok(BlobDecode::Unknown(unknown)) => {
            tracing::warn!("Unknown blob: {}", unknown);
            Ok((Vec::new(), PassStats::default()))
        }
        Err(error) => Err(error).context("Reader: Failed to decode blob"),
    }
}

fn convert_block(block: &PrimitiveBlock, interest: Interest) -> (Vec<Entity>, PassStats) {
    let mut batch = Vec::new();
    let mut stats = PassStats::default();

    for element in block.elements() {
        match element {
            Element::Node(node) => {
                stats.record(EntityKind::Node);
                if interest.wants(EntityKind::Node) {
                    batch.push(Entity::Node(Node {
                        id: node.id(),
                        meta: Metadata::from_info(&node.info()),
                        tags: node.tags().collect(),
                        lat: node.lat(),
                        lon: node.lon(),
                    }));
                }
            }
            Element::DenseNode(node) => {
                stats.record(EntityKind::Node);
                if interest.wants(EntityKind::Node) {
                    batch.push(Entity::Node(Node {
                        id: node.id(),
                        meta: node.info().map(Metadata::from_dense_info),
                        tags: node.tags().collect(),
                        lat: node.lat(),
                        lon: node.lon(),
                    }));
                }
            }
            Element::Way(way) => {
                stats.record(EntityKind::Way);
                if interest.wants(EntityKind::Way) {
                    batch.push(Entity::Way(Way {
                        id: way.id(),
                        meta: Metadata::from_info(&way.info()),
                        tags: way.tags().collect(),
                        refs: way.refs().collect(),
                    }));
                }
            }
            Element::Relation(relation) => {
                stats.record(EntityKind::Relation);
                if interest.wants(EntityKind::Relation) {
                    batch.push(Entity::Relation(Relation {
                        id: relation.id(),
                        meta: Metadata::from_info(&relation.info()),
                        tags: relation.tags().collect(),
                        members: relation
                            .members()
                            .map(|member| Member {
                                role: member.role().unwrap_or_default().to_string(),
                                kind: member.member_type.clone().into(),
                                id: member.member_id,
                            })
                            .collect(),
                    }));
                }
            }
        }
    }

    (batch, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::parse_timestamp;
    use crate::model::MemberKind;

    fn fixture_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("fixture")
            .join("cycle_routes.osm.pbf")
    }

    #[derive(Default)]
    struct Collect {
        only: Option<EntityKind>,
        entities: Vec<Entity>,
    }

    impl EntityVisitor for Collect {
        fn accepts(&self, kind: EntityKind) -> bool {
            self.only.is_none_or(|only| only == kind)
        }

        fn visit_batch(&mut self, batch: Vec<Entity>) -> Result<()> {
            self.entities.extend(batch);
            Ok(())
        }
    }

    fn read_fixture(only: Option<EntityKind>) -> (Vec<Entity>, PassStats) {
        let mut visitor = Collect {
            only,
            ..Collect::default()
        };
        let stats = PbfReader::new(fixture_path(), false)
            .read(&mut visitor, "test")
            .unwrap();
        (visitor.entities, stats)
    }

    #[test]
    fn entities_arrive_in_file_order() {
        let (entities, stats) = read_fixture(None);
        assert_eq!(
            stats,
            PassStats {
                nodes: 4,
                ways: 4,
                relations: 4
            }
        );
        let ids: Vec<_> = entities.iter().map(|e| (e.kind(), e.id())).collect();
        assert_eq!(
            ids,
            vec![
                (EntityKind::Node, 1),
                (EntityKind::Node, 2),
                (EntityKind::Node, 3),
                (EntityKind::Node, 4),
                (EntityKind::Way, 5),
                (EntityKind::Way, 10),
                (EntityKind::Way, 20),
                (EntityKind::Way, 30),
                (EntityKind::Relation, 100),
                (EntityKind::Relation, 101),
                (EntityKind::Relation, 102),
                (EntityKind::Relation, 103),
            ]
        );
    }

    #[test]
    fn dense_node_metadata_is_decoded() {
        let (entities, _) = read_fixture(Some(EntityKind::Node));
        let Entity::Node(first) = &entities[0] else {
            panic!("expected node");
        };
        let meta = first.meta.as_ref().unwrap();
        assert_eq!(meta.version, Some(1));
        assert!(meta.visible);
        assert_eq!(meta.changeset, Some(100));
        assert_eq!(meta.timestamp, parse_timestamp("2020-05-01T10:00:00Z"));
        assert_eq!(meta.uid, Some(7));
        assert_eq!(meta.user.as_deref(), Some("mapper"));
        assert_eq!(first.tags.get("name"), Some("Start Point"));
        assert!((first.lat - 52.5162).abs() < 1e-9);

        // The second dense group carries no metadata at all.
        let Entity::Node(third) = &entities[2] else {
            panic!("expected node");
        };
        assert_eq!(third.id, 3);
        assert!(third.meta.is_none());
    }

    #[test]
    fn relation_members_keep_kind_and_role() {
        let (entities, stats) = read_fixture(Some(EntityKind::Relation));
        assert_eq!(stats.ways, 4);
        assert_eq!(entities.len(), 4);
        let Entity::Relation(last) = &entities[3] else {
            panic!("expected relation");
        };
        assert!(last.meta.is_none());
        let members: Vec<_> = last
            .members
            .iter()
            .map(|m| (m.kind, m.id, m.role.as_str()))
            .collect();
        assert_eq!(
            members,
            vec![(MemberKind::Way, 20, ""), (MemberKind::Node, 1, "guidepost")]
        );
    }
}
