use std::{collections::HashMap, sync::Arc};

use shared::domain::{Column, Group, GroupId, Item, ItemId};

use crate::{materialize::ItemSet, order::OrderIndex};

/// One frozen view of the board.
///
/// Transitions build a new snapshot and leave the old one untouched. The
/// bulky parts sit behind `Arc` so an unchanged part is shared between
/// consecutive snapshots and a changed part is copied on write.
#[derive(Debug, Clone, Default)]
pub struct BoardSnapshot {
    pub(crate) groups: Arc<Vec<Group>>,
    pub(crate) items: Arc<ItemSet>,
    pub(crate) order: Arc<OrderIndex>,
    pub(crate) lanes: Arc<HashMap<GroupId, Vec<Item>>>,
    pub(crate) filter_text: String,
    pub(crate) dragging_item_id: Option<ItemId>,
    pub(crate) pending_delete_item_id: Option<ItemId>,
}

impl BoardSnapshot {
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, group_id: &GroupId) -> Option<&Group> {
        self.groups.iter().find(|group| &group.id == group_id)
    }

    pub fn items(&self) -> &ItemSet {
        &self.items
    }

    pub fn item(&self, item_id: &ItemId) -> Option<&Item> {
        self.items.get(item_id)
    }

    pub fn order(&self) -> &OrderIndex {
        &self.order
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn dragging_item_id(&self) -> Option<&ItemId> {
        self.dragging_item_id.as_ref()
    }

    pub fn pending_delete_item_id(&self) -> Option<&ItemId> {
        self.pending_delete_item_id.as_ref()
    }

    /// Items of `group_id` in list order, as of the last transition.
    pub fn lane(&self, group_id: &GroupId) -> &[Item] {
        self.lanes.get(group_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The group currently holding `item_id`.
    pub fn group_of(&self, item_id: &ItemId) -> Option<&GroupId> {
        self.lanes
            .iter()
            .find(|(_, items)| items.iter().any(|item| &item.id == item_id))
            .map(|(group_id, _)| group_id)
    }

    pub fn column(&self, group_id: &GroupId) -> Option<Column> {
        self.group(group_id).map(|group| Column {
            group: group.clone(),
            items: self.lane(group_id).to_vec(),
        })
    }

    pub fn columns(&self) -> Vec<Column> {
        self.groups
            .iter()
            .map(|group| Column {
                group: group.clone(),
                items: self.lane(&group.id).to_vec(),
            })
            .collect()
    }

    /// Columns with only the items whose text contains every
    /// whitespace-separated keyword of the filter, ignoring case.
    pub fn filtered_columns(&self) -> Vec<Column> {
        let keywords: Vec<String> = self
            .filter_text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let mut columns = self.columns();
        if keywords.is_empty() {
            return columns;
        }
        for column in &mut columns {
            column.items.retain(|item| {
                let text = item.text.to_lowercase();
                keywords.iter().all(|keyword| text.contains(keyword.as_str()))
            });
        }
        columns
    }
}
