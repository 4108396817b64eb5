use anyhow::Result;

use super::{EntityVisitor, run_pass};
use crate::model::{EntityKind, Way};
use crate::network::{NetworkClass, NetworkCounts};
use crate::source::DatasetReader;

/// Counts ways that already carry each classification tag. Only the key is
/// checked; `icn=no` counts the same as `icn=yes`.
#[derive(Debug, Default)]
pub struct NetworkCounter {
    counts: NetworkCounts,
}

impl NetworkCounter {
    pub fn count_way(&mut self, way: &Way) {
        for class in NetworkClass::ALL {
            if way.tags.contains_key(class.tag_name()) {
                self.counts.increment(class);
            }
        }
    }

    pub fn counts(&self) -> NetworkCounts {
        self.counts
    }
}

impl EntityVisitor for NetworkCounter {
    fn accepts(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Way
    }

    fn way(&mut self, way: Way) -> Result<()> {
        self.count_way(&way);
        Ok(())
    }
}

pub fn count_dataset(reader: &dyn DatasetReader) -> Result<NetworkCounts> {
    let mut counter = NetworkCounter::default();
    run_pass(reader, &mut counter, "Counting tagged ways")?;
    Ok(counter.counts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{VecReader, node, route, way};

    #[test]
    fn presence_alone_counts() {
        let reader = VecReader::new(vec![
            node(1),
            way(1, &[("icn", "yes")]),
            way(2, &[("icn", "no"), ("lcn", "proposed")]),
            way(3, &[("highway", "primary")]),
            route(4, "icn", &[3]),
        ]);
        let counts = count_dataset(&reader).unwrap();
        assert_eq!(counts.get(NetworkClass::International), 2);
        assert_eq!(counts.get(NetworkClass::National), 0);
        assert_eq!(counts.get(NetworkClass::Regional), 0);
        assert_eq!(counts.get(NetworkClass::Local), 1);
    }

    #[test]
    fn relations_are_never_counted() {
        let mut counter = NetworkCounter::default();
        let reader = VecReader::new(vec![route(4, "ncn", &[3])]);
        run_pass(&reader, &mut counter, "test").unwrap();
        assert_eq!(counter.counts(), NetworkCounts::default());
    }
}
