//! Flat `node -> next` index encoding one circular list per group.
//!
//! Each group id doubles as the sentinel of its own list: its entry points at
//! the first item (or back at itself when the group is empty) and the last
//! item points back at the group. Reordering never rewrites a whole list; the
//! patch builder below produces the handful of links that change.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use shared::{
    domain::{Group, NodeKey},
    error::OrderError,
    protocol::Patch,
};
use tracing::debug;

use crate::materialize::ItemSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderIndex(BTreeMap<NodeKey, NodeKey>);

impl OrderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn next_of(&self, key: &NodeKey) -> Option<&NodeKey> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: NodeKey, next: NodeKey) {
        self.0.insert(key, next);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &NodeKey)> {
        self.0.iter()
    }

    /// Linear scan for the entry whose `next` is `key`. Only `next` is
    /// stored, so this is O(n) in the number of tracked nodes.
    pub fn predecessor_of(&self, key: &NodeKey) -> Option<&NodeKey> {
        self.0
            .iter()
            .find(|(_, next)| *next == key)
            .map(|(node, _)| node)
    }

    /// Applies a patch in place. Tombstones drop the node's entry.
    pub fn merge(&mut self, patch: &Patch) {
        for (key, next) in patch.iter() {
            match next {
                Some(next) => {
                    self.0.insert(key.clone(), next.clone());
                }
                None => {
                    self.0.remove(key);
                }
            }
        }
    }

    /// Checks that every group owns exactly one closed chain and every item
    /// sits in exactly one of them.
    pub fn validate(&self, groups: &[Group], items: &ItemSet) -> Result<(), OrderError> {
        let group_keys: HashSet<NodeKey> = groups.iter().map(|g| NodeKey::from(&g.id)).collect();
        let cap = self.0.len();
        let mut seen = HashSet::new();

        for group in groups {
            let sentinel = NodeKey::from(&group.id);
            let mut cursor = self
                .next_of(&sentinel)
                .ok_or_else(|| OrderError::MissingHead {
                    group: group.id.clone(),
                })?;
            let mut steps = 0usize;
            while *cursor != sentinel {
                steps += 1;
                if steps > cap {
                    return Err(OrderError::Cycle {
                        group: group.id.clone(),
                        cap,
                    });
                }
                if group_keys.contains(cursor) {
                    return Err(OrderError::CrossedGroups {
                        group: group.id.clone(),
                        other: cursor.to_group_id(),
                    });
                }
                let item_id = cursor.to_item_id();
                if !items.contains_key(&item_id) {
                    return Err(OrderError::UnknownNode {
                        node: cursor.clone(),
                    });
                }
                if !seen.insert(item_id.clone()) {
                    return Err(OrderError::DuplicateMember { item: item_id });
                }
                cursor = self.next_of(cursor).ok_or_else(|| OrderError::DanglingLink {
                    node: cursor.clone(),
                })?;
            }
        }

        if let Some(orphan) = items.keys().find(|id| !seen.contains(*id)) {
            return Err(OrderError::OrphanItem {
                item: orphan.clone(),
            });
        }

        if let Some(stray) = self
            .0
            .keys()
            .find(|key| !group_keys.contains(*key) && !items.contains_key(&key.to_item_id()))
        {
            return Err(OrderError::UnknownNode {
                node: stray.clone(),
            });
        }

        Ok(())
    }
}

impl FromIterator<(NodeKey, NodeKey)> for OrderIndex {
    fn from_iter<T: IntoIterator<Item = (NodeKey, NodeKey)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Links that must change to move `subject` right after `after`, or to take
/// it out of its list when `after` is `None`.
///
/// The returned patch only holds entries whose value actually changes.
pub fn try_build_move_patch(
    order: &OrderIndex,
    subject: &NodeKey,
    after: Option<&NodeKey>,
) -> Result<Patch, OrderError> {
    if after == Some(subject) {
        return Ok(Patch::new());
    }

    let subject_next = order
        .next_of(subject)
        .ok_or_else(|| OrderError::UnknownNode {
            node: subject.clone(),
        })?
        .clone();
    let predecessor = order
        .predecessor_of(subject)
        .ok_or_else(|| OrderError::PredecessorNotFound {
            node: subject.clone(),
        })?
        .clone();

    if let Some(target) = after {
        if !order.contains(target) {
            return Err(OrderError::TargetNotTracked {
                node: target.clone(),
            });
        }
    }

    // Writes go to an overlay; reads see the overlay first so the relink
    // step observes the list with the subject already unlinked.
    let mut overlay: BTreeMap<NodeKey, NodeKey> = BTreeMap::new();
    overlay.insert(predecessor, subject_next);

    if let Some(target) = after {
        let target_next = overlay
            .get(target)
            .or_else(|| order.next_of(target))
            .cloned()
            .ok_or_else(|| OrderError::TargetNotTracked {
                node: target.clone(),
            })?;
        overlay.insert(subject.clone(), target_next);
        overlay.insert(target.clone(), subject.clone());
    }

    Ok(overlay
        .into_iter()
        .filter(|(key, next)| order.next_of(key) != Some(next))
        .map(|(key, next)| (key, Some(next)))
        .collect())
}

/// Lenient form of [`try_build_move_patch`]: anything it cannot resolve
/// yields an empty patch, which callers read as "nothing to reorder".
pub fn build_move_patch(order: &OrderIndex, subject: &NodeKey, after: Option<&NodeKey>) -> Patch {
    match try_build_move_patch(order, subject, after) {
        Ok(patch) => patch,
        Err(error) => {
            debug!(%subject, %error, "move patch resolved to nothing");
            Patch::new()
        }
    }
}

#[cfg(test)]
#[path = "tests/order_tests.rs"]
mod tests;
