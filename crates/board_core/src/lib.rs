//! Ordering engine for a kanban board.
//!
//! Cards are kept in per-column circular lists encoded in a flat
//! `node -> next` map ([`OrderIndex`]). Moves, inserts and deletes are
//! expressed as small [`Patch`]es of changed links, and a pure state machine
//! turns UI and server events into new immutable [`BoardSnapshot`]s.

pub mod error;
pub mod ids;
pub mod machine;
pub mod materialize;
pub mod order;
pub mod session;
pub mod snapshot;

pub use error::BoardError;
pub use ids::{is_valid_item_id, random_id, IdSource, RandomIdSource, SequentialIdSource};
pub use machine::{BoardEvent, BoardMachine, Transition};
pub use materialize::{item_set, materialize, ItemSet};
pub use order::{build_move_patch, try_build_move_patch, OrderIndex};
pub use session::{BoardSession, ChangeSink, RecordingSink};
pub use shared::protocol::{BoardChange, Patch};
pub use snapshot::BoardSnapshot;
