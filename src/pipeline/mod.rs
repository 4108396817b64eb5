//! Dataset passes.
//!
//! Every pass is an [`EntityVisitor`] driven by a [`DatasetReader`]. The
//! scanner and the counter only look at single entities; the tagger works a
//! batch at a time so it can rewrite ways in parallel while keeping the
//! entity order intact for the writer.

use anyhow::Result;

use crate::model::{Entity, EntityKind, Node, Relation, Way};
use crate::source::DatasetReader;

pub mod count;
pub mod scan;
pub mod tag;

pub use count::{NetworkCounter, count_dataset};
pub use scan::{RelationNetworkScanner, scan_relations};
pub use tag::{TaggingVisitor, WayTagger, tag_dataset};

pub trait EntityVisitor {
    /// Readers skip building entities of kinds a visitor does not accept.
    fn accepts(&self, _kind: EntityKind) -> bool {
        true
    }

    fn node(&mut self, _node: Node) -> Result<()> {
        Ok(())
    }

    fn way(&mut self, _way: Way) -> Result<()> {
        Ok(())
    }

    fn relation(&mut self, _relation: Relation) -> Result<()> {
        Ok(())
    }

    /// Receives entities in file order. The default hands them one by one to
    /// the per-kind hooks.
    fn visit_batch(&mut self, batch: Vec<Entity>) -> Result<()> {
        for entity in batch {
            match entity {
                Entity::Node(node) => self.node(node)?,
                Entity::Way(way) => self.way(way)?,
                Entity::Relation(relation) => self.relation(relation)?,
            }
        }
        Ok(())
    }

    /// Called once after the last batch of a successful pass.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Entity totals seen by a reader during one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
}

impl PassStats {
    pub fn record(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Node => self.nodes += 1,
            EntityKind::Way => self.ways += 1,
            EntityKind::Relation => self.relations += 1,
        }
    }
}

/// Streams the whole dataset through `visitor`, then finalizes it.
pub fn run_pass(
    reader: &dyn DatasetReader,
    visitor: &mut dyn EntityVisitor,
    label: &'static str,
) -> Result<PassStats> {
    let start = std::time::Instant::now();
    let stats = reader.read(visitor, label)?;
    visitor.finish()?;
    tracing::info!(
        "{}: {} nodes, {} ways, {} relations in {:.2}s",
        label,
        stats.nodes,
        stats.ways,
        stats.relations,
        start.elapsed().as_secs_f64()
    );
    Ok(stats)
}

#[cfg(test)]
pub(crate) mod test_support {
    use anyhow::Result;

    use super::{EntityVisitor, PassStats};
    use crate::model::{ElementId, Entity, Member, MemberKind, Node, Relation, Tags, Way};
    use crate::source::DatasetReader;

    /// In-memory reader that hands out fixed batches.
    pub struct VecReader {
        pub batches: Vec<Vec<Entity>>,
    }

    impl VecReader {
        pub fn new(entities: Vec<Entity>) -> Self {
            Self {
                batches: vec![entities],
            }
        }
    }

    impl DatasetReader for VecReader {
        fn read(&self, visitor: &mut dyn EntityVisitor, _label: &'static str) -> Result<PassStats> {
            let mut stats = PassStats::default();
            for batch in &self.batches {
                let batch: Vec<Entity> = batch
                    .iter()
                    .inspect(|entity| stats.record(entity.kind()))
                    .filter(|entity| visitor.accepts(entity.kind()))
                    .cloned()
                    .collect();
                visitor.visit_batch(batch)?;
            }
            Ok(stats)
        }
    }

    pub fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs.iter().copied().collect()
    }

    pub fn node(id: ElementId) -> Entity {
        Entity::Node(Node {
            id,
            meta: None,
            tags: Tags::new(),
            lat: 52.5,
            lon: 13.4,
        })
    }

    pub fn way(id: ElementId, pairs: &[(&str, &str)]) -> Entity {
        Entity::Way(Way {
            id,
            meta: None,
            tags: tags(pairs),
            refs: vec![1, 2],
        })
    }

    pub fn route(id: ElementId, network: &str, way_ids: &[ElementId]) -> Entity {
        Entity::Relation(Relation {
            id,
            meta: None,
            tags: tags(&[("type", "route"), ("route", "bicycle"), ("network", network)]),
            members: way_ids
                .iter()
                .map(|&id| Member {
                    kind: MemberKind::Way,
                    id,
                    role: String::new(),
                })
                .collect(),
        })
    }
}
