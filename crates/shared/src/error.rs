use thiserror::Error;

use crate::domain::{GroupId, ItemId, NodeKey};

/// Structural problems found while reading or rewriting an order index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("chain of group {group} did not close within {cap} steps")]
    Cycle { group: GroupId, cap: usize },
    #[error("chain of group {group} runs into group {other}")]
    CrossedGroups { group: GroupId, other: GroupId },
    #[error("chain reaches {node}, which has no entry")]
    DanglingLink { node: NodeKey },
    #[error("no node links to {node}")]
    PredecessorNotFound { node: NodeKey },
    #[error("target {node} is not tracked by the order index")]
    TargetNotTracked { node: NodeKey },
    #[error("group {group} has no head entry")]
    MissingHead { group: GroupId },
    #[error("item {item} is reachable from more than one position")]
    DuplicateMember { item: ItemId },
    #[error("item {item} is not reachable from any group")]
    OrphanItem { item: ItemId },
    #[error("index entry {node} is neither a known group nor a known item")]
    UnknownNode { node: NodeKey },
}

impl OrderError {
    /// True when the index itself is broken, as opposed to a caller
    /// referring to a node that has since gone away.
    pub fn is_corruption(&self) -> bool {
        !matches!(
            self,
            OrderError::TargetNotTracked { .. } | OrderError::UnknownNode { .. }
        )
    }
}
