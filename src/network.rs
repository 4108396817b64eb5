//! Cycle route network classes and the per-class membership sets built from
//! route relations.

use std::collections::HashSet;
use std::fmt;
use std::ops::{Add, AddAssign};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::ElementId;

/// The four cycle network levels, in the fixed order used for tagging and
/// reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NetworkClass {
    International,
    National,
    Regional,
    Local,
}

impl NetworkClass {
    pub const ALL: [NetworkClass; 4] = [
        NetworkClass::International,
        NetworkClass::National,
        NetworkClass::Regional,
        NetworkClass::Local,
    ];

    /// Maps a relation's `network` value. Anything outside the four cycle
    /// network values is `None`.
    pub fn from_tag_value(value: &str) -> Option<Self> {
        match value {
            "icn" => Some(NetworkClass::International),
            "ncn" => Some(NetworkClass::National),
            "rcn" => Some(NetworkClass::Regional),
            "lcn" => Some(NetworkClass::Local),
            _ => None,
        }
    }

    /// Key of the classification tag added to member ways. Identical to the
    /// relation's `network` value.
    pub fn tag_name(self) -> &'static str {
        match self {
            NetworkClass::International => "icn",
            NetworkClass::National => "ncn",
            NetworkClass::Regional => "rcn",
            NetworkClass::Local => "lcn",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

/// Way ids referenced by route relations, one set per network class.
///
/// Filled during the scan pass and only read afterwards, so it can be shared
/// across tagging threads by reference.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MembershipSets {
    sets: [HashSet<ElementId>; 4],
}

impl MembershipSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the id was already recorded for this class.
    pub fn insert(&mut self, class: NetworkClass, id: ElementId) -> bool {
        self.sets[class.index()].insert(id)
    }

    pub fn extend<I>(&mut self, class: NetworkClass, ids: I)
    where
        I: IntoIterator<Item = ElementId>,
    {
        self.sets[class.index()].extend(ids);
    }

    pub fn contains(&self, class: NetworkClass, id: ElementId) -> bool {
        self.sets[class.index()].contains(&id)
    }

    pub fn len(&self, class: NetworkClass) -> usize {
        self.sets[class.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.iter().all(HashSet::is_empty)
    }

    /// Classes whose set contains `id`, in [`NetworkClass::ALL`] order.
    pub fn classes_of(&self, id: ElementId) -> impl Iterator<Item = NetworkClass> + '_ {
        NetworkClass::ALL
            .into_iter()
            .filter(move |class| self.contains(*class, id))
    }
}

/// Per-class tallies reported at the end of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkCounts([u64; 4]);

impl NetworkCounts {
    pub fn get(&self, class: NetworkClass) -> u64 {
        self.0[class.index()]
    }

    pub fn increment(&mut self, class: NetworkClass) {
        self.0[class.index()] += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = (NetworkClass, u64)> + '_ {
        NetworkClass::ALL
            .into_iter()
            .map(|class| (class, self.get(class)))
    }

    /// Report lines of the tagging tool: `icn count= 12`.
    pub fn tagged_report(&self) -> Vec<String> {
        self.iter()
            .map(|(class, count)| format!("{} count= {}", class, count))
            .collect()
    }

    /// Report lines of the counting tool: `icn count = 12`.
    pub fn audit_report(&self) -> Vec<String> {
        self.iter()
            .map(|(class, count)| format!("{} count = {}", class, count))
            .collect()
    }
}

impl Add for NetworkCounts {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl AddAssign for NetworkCounts {
    fn add_assign(&mut self, other: Self) {
        for (mine, theirs) in self.0.iter_mut().zip(other.0) {
            *mine += theirs;
        }
    }
}

/// Lock-free counterpart of [`NetworkCounts`] for tagging batches in parallel.
#[derive(Debug, Default)]
pub struct NetworkCounters([AtomicU64; 4]);

impl NetworkCounters {
    pub fn increment(&self, class: NetworkClass) {
        self.0[class.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NetworkCounts {
        let mut counts = [0u64; 4];
        for (slot, counter) in counts.iter_mut().zip(&self.0) {
            *slot = counter.load(Ordering::Relaxed);
        }
        NetworkCounts(counts)
    }
}
