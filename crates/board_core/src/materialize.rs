use std::collections::BTreeMap;

use shared::{
    domain::{GroupId, Item, ItemId, NodeKey},
    error::OrderError,
};

use crate::order::OrderIndex;

/// The unordered item set, keyed for lookup while walking a chain.
pub type ItemSet = BTreeMap<ItemId, Item>;

pub fn item_set(items: impl IntoIterator<Item = Item>) -> ItemSet {
    items.into_iter().map(|item| (item.id.clone(), item)).collect()
}

/// Walks `group`'s chain and returns its items in list order.
///
/// Ids on the chain that are missing from `items` are skipped. A group with no
/// head entry is treated as empty so groups can be loaded before their order.
/// The walk is capped at the number of tracked nodes; running past the cap
/// means the chain never returns to its sentinel.
pub fn materialize(
    items: &ItemSet,
    order: &OrderIndex,
    group: &GroupId,
) -> Result<Vec<Item>, OrderError> {
    let sentinel = NodeKey::from(group);
    let Some(mut cursor) = order.next_of(&sentinel) else {
        return Ok(Vec::new());
    };

    let cap = order.len();
    let mut steps = 0usize;
    let mut sequence = Vec::new();
    while *cursor != sentinel {
        steps += 1;
        if steps > cap {
            return Err(OrderError::Cycle {
                group: group.clone(),
                cap,
            });
        }
        if let Some(item) = items.get(&cursor.to_item_id()) {
            sequence.push(item.clone());
        }
        cursor = order
            .next_of(cursor)
            .ok_or_else(|| OrderError::DanglingLink {
                node: cursor.clone(),
            })?;
    }

    Ok(sequence)
}
