mod config;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use board_core::{is_valid_item_id, BoardEvent, BoardMachine, BoardSession, BoardSnapshot};
use clap::{Parser, Subcommand};
use shared::domain::{GroupId, ItemId, NodeKey};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, prepare_database_url};

#[derive(Parser, Debug)]
#[command(name = "kanban", about = "Ordered kanban board backed by sqlite")]
struct Cli {
    /// Overrides the configured database url.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates the default groups when the board has none.
    Init,
    AddGroup {
        title: String,
    },
    /// Adds an item at the front of a group.
    Add {
        group: String,
        text: String,
    },
    /// Moves an item after a group title or another item id.
    Move {
        item_id: String,
        #[arg(long)]
        after: String,
    },
    Delete {
        item_id: String,
    },
    Show {
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Prints the most recent stored changes, oldest first.
    Log {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw_url = cli.database_url.as_deref().unwrap_or(&settings.database_url);
    let database_url = prepare_database_url(raw_url)?;
    let storage = Storage::new(&database_url).await?;
    storage.health_check().await?;
    info!(%database_url, "opened board database");

    match cli.command {
        Command::Init => {
            if !storage.list_groups().await?.is_empty() {
                println!("board already has groups");
                return Ok(());
            }
            for title in &settings.default_groups {
                let group = storage.create_group(title).await?;
                println!("created group {} ({})", group.title, group.id);
            }
        }
        Command::AddGroup { title } => {
            let group = storage.create_group(&title).await?;
            println!("created group {} ({})", group.title, group.id);
        }
        Command::Add { group, text } => {
            let group_id = resolve_group(&storage, &group).await?;
            let mut session = open_session(&storage).await?;
            let before = session.snapshot();
            session.dispatch(BoardEvent::SetDraftText {
                group_id: group_id.clone(),
                text,
            })?;
            let after = session.dispatch(BoardEvent::ConfirmAdd { group_id })?;
            session.shutdown().await;

            match after.items().keys().find(|id| before.item(id).is_none()) {
                Some(item_id) => println!("added item {item_id}"),
                None => bail!("item text must not be blank"),
            }
        }
        Command::Move { item_id, after } => {
            let item_id = parse_item_id(&item_id)?;
            let target = resolve_target(&storage, &after).await?;
            println!("{}", move_item(&storage, &item_id, target).await?);
        }
        Command::Delete { item_id } => {
            let item_id = parse_item_id(&item_id)?;
            let mut session = open_session(&storage).await?;
            ensure_item(&session.snapshot(), &item_id)?;
            session.dispatch(BoardEvent::RequestDelete {
                item_id: item_id.clone(),
            })?;
            session.dispatch(BoardEvent::ConfirmDelete)?;
            session.shutdown().await;
            println!("deleted item {item_id}");
        }
        Command::Show { filter, json } => {
            let mut session = open_session(&storage).await?;
            let snapshot = match filter {
                Some(text) => session.dispatch(BoardEvent::SetFilterText { text })?,
                None => session.snapshot(),
            };
            session.shutdown().await;
            print_board(&snapshot, json)?;
        }
        Command::Log { limit } => {
            for stored in storage.recent_changes(limit).await? {
                println!(
                    "{:>5} {} {:<12} {}",
                    stored.id,
                    stored.applied_at.format("%Y-%m-%d %H:%M:%S"),
                    stored.change.kind(),
                    serde_json::to_string(stored.change.patch())?
                );
            }
        }
    }

    Ok(())
}

/// Boots a session from what is stored: groups first, then items and order.
async fn open_session(storage: &Storage) -> Result<BoardSession> {
    let board = storage.load_board().await?;
    let mut session = BoardSession::new(BoardMachine::default(), Arc::new(storage.clone()));
    session.dispatch(BoardEvent::SetGroups {
        groups: board.groups,
    })?;
    session
        .dispatch(BoardEvent::SetItemsAndOrder {
            items: board.items,
            order: board.order,
        })
        .context("stored board could not be loaded")?;
    Ok(session)
}

/// Drags `item_id` onto `target` and reports where it landed. A drop that
/// leaves the order untouched reports "nothing moved".
async fn move_item(storage: &Storage, item_id: &ItemId, target: NodeKey) -> Result<String> {
    let mut session = open_session(storage).await?;
    let before = session.snapshot();
    ensure_item(&before, item_id)?;
    session.dispatch(BoardEvent::StartDrag {
        item_id: item_id.clone(),
    })?;
    let after = session.dispatch(BoardEvent::Drop { target })?;
    session.shutdown().await;

    if before.order() == after.order() {
        return Ok("nothing moved".to_string());
    }
    Ok(describe_position(&after, item_id))
}

async fn resolve_group(storage: &Storage, title: &str) -> Result<GroupId> {
    storage
        .find_group_by_title(title)
        .await?
        .with_context(|| format!("no group titled '{title}'"))
}

async fn resolve_target(storage: &Storage, target: &str) -> Result<NodeKey> {
    match storage.find_group_by_title(target).await? {
        Some(group_id) => Ok(NodeKey::from(group_id)),
        None => Ok(NodeKey::from(target)),
    }
}

fn parse_item_id(raw: &str) -> Result<ItemId> {
    if !is_valid_item_id(raw) {
        bail!("'{raw}' is not an item id");
    }
    Ok(ItemId::from(raw))
}

fn describe_position(snapshot: &BoardSnapshot, item_id: &ItemId) -> String {
    snapshot
        .columns()
        .into_iter()
        .find_map(|column| {
            let position = column.item_ids().iter().position(|id| id == item_id)?;
            Some(format!(
                "moved {item_id} to {} at position {}",
                column.group.title,
                position + 1
            ))
        })
        .unwrap_or_else(|| format!("moved {item_id}"))
}

fn ensure_item(snapshot: &BoardSnapshot, item_id: &ItemId) -> Result<()> {
    if snapshot.item(item_id).is_none() {
        bail!("no item with id {item_id}");
    }
    Ok(())
}

fn print_board(snapshot: &BoardSnapshot, json: bool) -> Result<()> {
    let columns = snapshot.filtered_columns();
    if json {
        println!("{}", serde_json::to_string_pretty(&columns)?);
        return Ok(());
    }
    for column in columns {
        println!("== {} ({}) ==", column.group.title, column.group.id);
        for item in column.items {
            println!("  {}  {}", item.id, item.text);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
