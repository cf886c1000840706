use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(ItemId);
id_newtype!(GroupId);
id_newtype!(NodeKey);

impl From<ItemId> for NodeKey {
    fn from(value: ItemId) -> Self {
        Self(value.0)
    }
}

impl From<&ItemId> for NodeKey {
    fn from(value: &ItemId) -> Self {
        Self(value.0.clone())
    }
}

impl From<GroupId> for NodeKey {
    fn from(value: GroupId) -> Self {
        Self(value.0)
    }
}

impl From<&GroupId> for NodeKey {
    fn from(value: &GroupId) -> Self {
        Self(value.0.clone())
    }
}

impl NodeKey {
    /// Reinterprets this key as an item id. The key namespace is shared, so
    /// callers decide which side of it they are looking at.
    pub fn to_item_id(&self) -> ItemId {
        ItemId(self.0.clone())
    }

    pub fn to_group_id(&self) -> GroupId {
        GroupId(self.0.clone())
    }
}

/// A card on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub text: String,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A column on the board. Membership and order of its items live in the
/// order index, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub title: String,
    #[serde(default)]
    pub draft_text: String,
}

impl Group {
    pub fn new(id: impl Into<GroupId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            draft_text: String::new(),
        }
    }
}

/// A group together with its items in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub group: Group,
    pub items: Vec<Item>,
}

impl Column {
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}
