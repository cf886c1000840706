//! Board transitions as functions from one snapshot to the next.
//!
//! Events whose preconditions do not hold return the input snapshot
//! unchanged. Only a corrupt order index produces an error.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use shared::{
    domain::{Group, GroupId, Item, ItemId, NodeKey},
    error::OrderError,
    protocol::{BoardChange, Patch},
};
use tracing::debug;

use crate::{
    error::BoardError,
    ids::{IdSource, RandomIdSource},
    materialize::{item_set, materialize},
    order::{try_build_move_patch, OrderIndex},
    snapshot::BoardSnapshot,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BoardEvent {
    SetFilterText {
        text: String,
    },
    SetGroups {
        groups: Vec<Group>,
    },
    SetItemsAndOrder {
        items: Vec<Item>,
        order: OrderIndex,
    },
    StartDrag {
        item_id: ItemId,
    },
    EndDrag,
    Drop {
        target: NodeKey,
    },
    SetDraftText {
        group_id: GroupId,
        text: String,
    },
    ConfirmAdd {
        group_id: GroupId,
    },
    SetItemText {
        item_id: ItemId,
        text: String,
    },
    RequestDelete {
        item_id: ItemId,
    },
    ConfirmDelete,
    CancelDelete,
}

impl BoardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BoardEvent::SetFilterText { .. } => "set_filter_text",
            BoardEvent::SetGroups { .. } => "set_groups",
            BoardEvent::SetItemsAndOrder { .. } => "set_items_and_order",
            BoardEvent::StartDrag { .. } => "start_drag",
            BoardEvent::EndDrag => "end_drag",
            BoardEvent::Drop { .. } => "drop",
            BoardEvent::SetDraftText { .. } => "set_draft_text",
            BoardEvent::ConfirmAdd { .. } => "confirm_add",
            BoardEvent::SetItemText { .. } => "set_item_text",
            BoardEvent::RequestDelete { .. } => "request_delete",
            BoardEvent::ConfirmDelete => "confirm_delete",
            BoardEvent::CancelDelete => "cancel_delete",
        }
    }
}

/// Result of applying one event.
#[derive(Debug, Clone)]
pub struct Transition {
    pub snapshot: BoardSnapshot,
    /// What the persistence sink should store, for Drop, ConfirmAdd and
    /// ConfirmDelete when they actually changed something.
    pub change: Option<BoardChange>,
    pub changed: bool,
}

impl Transition {
    fn unchanged(snapshot: &BoardSnapshot) -> Self {
        Self {
            snapshot: snapshot.clone(),
            change: None,
            changed: false,
        }
    }

    fn local(snapshot: BoardSnapshot) -> Self {
        Self {
            snapshot,
            change: None,
            changed: true,
        }
    }

    fn committed(snapshot: BoardSnapshot, change: BoardChange) -> Self {
        Self {
            snapshot,
            change: Some(change),
            changed: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct BoardMachine<I = RandomIdSource> {
    ids: I,
}

impl<I: IdSource> BoardMachine<I> {
    pub fn new(ids: I) -> Self {
        Self { ids }
    }

    pub fn apply(
        &mut self,
        snapshot: &BoardSnapshot,
        event: BoardEvent,
    ) -> Result<Transition, BoardError> {
        match event {
            BoardEvent::SetFilterText { text } => {
                let mut next = snapshot.clone();
                next.filter_text = text;
                Ok(Transition::local(next))
            }
            BoardEvent::SetGroups { groups } => {
                let mut next = snapshot.clone();
                next.groups = Arc::new(groups);
                rematerialize_all(&mut next)?;
                Ok(Transition::local(next))
            }
            BoardEvent::SetItemsAndOrder { items, order } => {
                let mut next = snapshot.clone();
                next.items = Arc::new(item_set(items));
                next.order = Arc::new(order);
                forget_missing_items(&mut next);
                rematerialize_all(&mut next)?;
                Ok(Transition::local(next))
            }
            BoardEvent::StartDrag { item_id } => {
                if snapshot.item(&item_id).is_none() {
                    return Ok(Transition::unchanged(snapshot));
                }
                let mut next = snapshot.clone();
                next.dragging_item_id = Some(item_id);
                Ok(Transition::local(next))
            }
            BoardEvent::EndDrag => {
                if snapshot.dragging_item_id.is_none() {
                    return Ok(Transition::unchanged(snapshot));
                }
                let mut next = snapshot.clone();
                next.dragging_item_id = None;
                Ok(Transition::local(next))
            }
            BoardEvent::Drop { target } => drop_onto(snapshot, target),
            BoardEvent::SetDraftText { group_id, text } => {
                if snapshot.group(&group_id).is_none() {
                    return Ok(Transition::unchanged(snapshot));
                }
                let mut next = snapshot.clone();
                if let Some(group) = Arc::make_mut(&mut next.groups)
                    .iter_mut()
                    .find(|group| group.id == group_id)
                {
                    group.draft_text = text;
                }
                Ok(Transition::local(next))
            }
            BoardEvent::ConfirmAdd { group_id } => self.confirm_add(snapshot, group_id),
            BoardEvent::SetItemText { item_id, text } => {
                if snapshot.item(&item_id).is_none() {
                    return Ok(Transition::unchanged(snapshot));
                }
                let mut next = snapshot.clone();
                if let Some(item) = Arc::make_mut(&mut next.items).get_mut(&item_id) {
                    item.text = text;
                }
                match snapshot.group_of(&item_id).cloned() {
                    Some(group_id) => rematerialize(&mut next, &group_id)?,
                    None => rematerialize_all(&mut next)?,
                }
                Ok(Transition::local(next))
            }
            BoardEvent::RequestDelete { item_id } => {
                if snapshot.item(&item_id).is_none() {
                    return Ok(Transition::unchanged(snapshot));
                }
                let mut next = snapshot.clone();
                next.pending_delete_item_id = Some(item_id);
                Ok(Transition::local(next))
            }
            BoardEvent::ConfirmDelete => confirm_delete(snapshot),
            BoardEvent::CancelDelete => {
                if snapshot.pending_delete_item_id.is_none() {
                    return Ok(Transition::unchanged(snapshot));
                }
                let mut next = snapshot.clone();
                next.pending_delete_item_id = None;
                Ok(Transition::local(next))
            }
        }
    }

    fn confirm_add(
        &mut self,
        snapshot: &BoardSnapshot,
        group_id: GroupId,
    ) -> Result<Transition, BoardError> {
        let Some(group) = snapshot.group(&group_id) else {
            return Ok(Transition::unchanged(snapshot));
        };
        if group.draft_text.trim().is_empty() {
            return Ok(Transition::unchanged(snapshot));
        }

        let item = Item::new(self.ids.next_id(), group.draft_text.clone());
        let subject = NodeKey::from(&item.id);
        let sentinel = NodeKey::from(&group_id);

        // Register the new node as a self-loop, then move it to the front.
        let mut seeded = OrderIndex::clone(&snapshot.order);
        if !seeded.contains(&sentinel) {
            seeded.set(sentinel.clone(), sentinel.clone());
        }
        seeded.set(subject.clone(), subject.clone());
        let patch = try_build_move_patch(&seeded, &subject, Some(&sentinel))?;

        let mut next = snapshot.clone();
        Arc::make_mut(&mut next.order).merge(&patch);
        Arc::make_mut(&mut next.items).insert(item.id.clone(), item.clone());
        if let Some(group) = Arc::make_mut(&mut next.groups)
            .iter_mut()
            .find(|group| group.id == group_id)
        {
            group.draft_text.clear();
        }
        rematerialize(&mut next, &group_id)?;

        debug!(item_id = %item.id, %group_id, links = patch.len(), "added item");
        Ok(Transition::committed(
            next,
            BoardChange::ItemAdded {
                item,
                group_id,
                patch,
            },
        ))
    }
}

fn drop_onto(snapshot: &BoardSnapshot, target: NodeKey) -> Result<Transition, BoardError> {
    let Some(dragging) = snapshot.dragging_item_id.clone() else {
        return Ok(Transition::unchanged(snapshot));
    };

    let mut next = snapshot.clone();
    next.dragging_item_id = None;

    let subject = NodeKey::from(&dragging);
    if subject == target || snapshot.item(&dragging).is_none() {
        return Ok(Transition::local(next));
    }

    // Only displayed groups and known items are targets; other index
    // entries are left over from removed groups or deleted items.
    let on_board = snapshot.group(&target.to_group_id()).is_some()
        || snapshot.item(&target.to_item_id()).is_some();
    if !on_board {
        debug!(item_id = %dragging, %target, "dropped onto a node outside the board");
        return Ok(Transition::local(next));
    }

    let patch = match try_build_move_patch(&snapshot.order, &subject, Some(&target)) {
        Ok(patch) => patch,
        Err(error) if !error.is_corruption() => {
            debug!(item_id = %dragging, %target, %error, "dropped onto a stale target");
            return Ok(Transition::local(next));
        }
        Err(error) => return Err(error.into()),
    };
    if patch.is_empty() {
        return Ok(Transition::local(next));
    }

    Arc::make_mut(&mut next.order).merge(&patch);
    rematerialize_all(&mut next)?;

    debug!(item_id = %dragging, %target, links = patch.len(), "moved item");
    Ok(Transition::committed(
        next,
        BoardChange::Reordered {
            item_id: dragging,
            patch,
        },
    ))
}

fn confirm_delete(snapshot: &BoardSnapshot) -> Result<Transition, BoardError> {
    let Some(item_id) = snapshot.pending_delete_item_id.clone() else {
        return Ok(Transition::unchanged(snapshot));
    };

    let mut next = snapshot.clone();
    next.pending_delete_item_id = None;
    if snapshot.item(&item_id).is_none() {
        return Ok(Transition::local(next));
    }

    let subject = NodeKey::from(&item_id);
    let mut patch = match try_build_move_patch(&snapshot.order, &subject, None) {
        Ok(patch) => patch,
        Err(OrderError::UnknownNode { .. }) => Patch::new(),
        Err(error) => return Err(error.into()),
    };
    if snapshot.order.contains(&subject) {
        patch.remove_entry(subject);
    }

    let owner = snapshot.group_of(&item_id).cloned();
    Arc::make_mut(&mut next.order).merge(&patch);
    Arc::make_mut(&mut next.items).remove(&item_id);
    if next.dragging_item_id.as_ref() == Some(&item_id) {
        next.dragging_item_id = None;
    }
    match owner {
        Some(group_id) => rematerialize(&mut next, &group_id)?,
        None => rematerialize_all(&mut next)?,
    }

    debug!(%item_id, links = patch.len(), "deleted item");
    Ok(Transition::committed(
        next,
        BoardChange::ItemDeleted { item_id, patch },
    ))
}

fn forget_missing_items(snapshot: &mut BoardSnapshot) {
    if let Some(id) = &snapshot.dragging_item_id {
        if !snapshot.items.contains_key(id) {
            snapshot.dragging_item_id = None;
        }
    }
    if let Some(id) = &snapshot.pending_delete_item_id {
        if !snapshot.items.contains_key(id) {
            snapshot.pending_delete_item_id = None;
        }
    }
}

fn rematerialize(snapshot: &mut BoardSnapshot, group_id: &GroupId) -> Result<(), OrderError> {
    let lane = materialize(&snapshot.items, &snapshot.order, group_id)?;
    Arc::make_mut(&mut snapshot.lanes).insert(group_id.clone(), lane);
    Ok(())
}

fn rematerialize_all(snapshot: &mut BoardSnapshot) -> Result<(), OrderError> {
    let mut lanes = HashMap::with_capacity(snapshot.groups.len());
    for group in snapshot.groups.iter() {
        lanes.insert(
            group.id.clone(),
            materialize(&snapshot.items, &snapshot.order, &group.id)?,
        );
    }
    snapshot.lanes = Arc::new(lanes);
    Ok(())
}

#[cfg(test)]
#[path = "tests/machine_tests.rs"]
mod tests;
