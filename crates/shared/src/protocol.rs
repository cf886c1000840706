use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{GroupId, Item, ItemId, NodeKey};

/// Changed `next` links. `None` removes the node's entry from the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(BTreeMap<NodeKey, Option<NodeKey>>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Option<NodeKey>> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: NodeKey, next: NodeKey) {
        self.0.insert(key, Some(next));
    }

    pub fn remove_entry(&mut self, key: NodeKey) {
        self.0.insert(key, None);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &Option<NodeKey>)> {
        self.0.iter()
    }
}

impl FromIterator<(NodeKey, Option<NodeKey>)> for Patch {
    fn from_iter<T: IntoIterator<Item = (NodeKey, Option<NodeKey>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Patch {
    type Item = (NodeKey, Option<NodeKey>);
    type IntoIter = std::collections::btree_map::IntoIter<NodeKey, Option<NodeKey>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// What a committed transition asks the persistence sink to store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BoardChange {
    Reordered {
        item_id: ItemId,
        patch: Patch,
    },
    ItemAdded {
        item: Item,
        group_id: GroupId,
        patch: Patch,
    },
    ItemDeleted {
        item_id: ItemId,
        patch: Patch,
    },
}

impl BoardChange {
    pub fn patch(&self) -> &Patch {
        match self {
            BoardChange::Reordered { patch, .. }
            | BoardChange::ItemAdded { patch, .. }
            | BoardChange::ItemDeleted { patch, .. } => patch,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BoardChange::Reordered { .. } => "reordered",
            BoardChange::ItemAdded { .. } => "item_added",
            BoardChange::ItemDeleted { .. } => "item_deleted",
        }
    }
}
