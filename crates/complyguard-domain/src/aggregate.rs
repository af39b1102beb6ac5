use crate::Finding;
use crate::finding::LocationKey;
use complyguard_types::FindingStatus;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Sorted, deduplicated findings.
///
/// Two findings with the same `(ruleId, location, status)` collapse to the smaller one under
/// the total finding order, so inserting in any order (or merging shards in any grouping)
/// yields the same set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FindingSet {
    items: BTreeMap<(String, LocationKey, FindingStatus), Finding>,
}

impl FindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, finding: Finding) {
        match self.items.entry(finding.dedup_key()) {
            Entry::Vacant(slot) => {
                slot.insert(finding);
            }
            Entry::Occupied(mut slot) => {
                if finding < *slot.get() {
                    slot.insert(finding);
                }
            }
        }
    }

    pub fn merge(mut self, other: FindingSet) -> FindingSet {
        self.extend(other.items.into_values());
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Findings in total order.
    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.items.values()
    }

    pub fn has_rule(&self, rule_id: &str) -> bool {
        self.items.values().any(|f| f.rule_id == rule_id)
    }

    pub fn into_vec(self) -> Vec<Finding> {
        self.items.into_values().collect()
    }
}

impl Extend<Finding> for FindingSet {
    fn extend<T: IntoIterator<Item = Finding>>(&mut self, iter: T) {
        for f in iter {
            self.insert(f);
        }
    }
}

impl FromIterator<Finding> for FindingSet {
    fn from_iter<T: IntoIterator<Item = Finding>>(iter: T) -> Self {
        let mut set = FindingSet::new();
        set.extend(iter);
        set
    }
}
