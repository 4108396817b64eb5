use anyhow::Result;

use crate::model::EntityKind;
use crate::pipeline::{EntityVisitor, PassStats};

pub mod opl;
pub mod pbf;

pub use self::opl::OplReader;
pub use self::pbf::PbfReader;

/// A dataset that can be streamed any number of times.
///
/// Every call to `read` starts from the beginning of the source and hands
/// the visitor all entities in file order, batch by batch. Readers do not
/// call [`EntityVisitor::finish`]; that is left to the pass driver.
pub trait DatasetReader {
    fn read(&self, visitor: &mut dyn EntityVisitor, label: &'static str) -> Result<PassStats>;
}

/// Entity kinds a visitor wants built, captured once per pass so block
/// decoding can run on worker threads.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Interest {
    nodes: bool,
    ways: bool,
    relations: bool,
}

impl Interest {
    pub(crate) fn of(visitor: &dyn EntityVisitor) -> Self {
        Self {
            nodes: visitor.accepts(EntityKind::Node),
            ways: visitor.accepts(EntityKind::Way),
            relations: visitor.accepts(EntityKind::Relation),
        }
    }

    pub(crate) fn wants(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Node => self.nodes,
            EntityKind::Way => self.ways,
            EntityKind::Relation => self.relations,
        }
    }
}
