//! Optimistic local board with fire-and-forget persistence.
//!
//! `dispatch` applies a transition synchronously and publishes the new
//! snapshot. Any resulting [`BoardChange`] is queued for a background worker
//! that hands it to a [`ChangeSink`]; the transition never waits for it and a
//! failed write never rolls the local snapshot back.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::BoardChange;
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, warn};

use crate::{
    error::BoardError,
    ids::{IdSource, RandomIdSource},
    machine::{BoardEvent, BoardMachine},
    snapshot::BoardSnapshot,
};

const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// Durable home for committed board changes.
#[async_trait]
pub trait ChangeSink: Send + Sync {
    async fn persist(&self, change: &BoardChange) -> Result<()>;
}

/// Keeps every change in memory.
#[derive(Default)]
pub struct RecordingSink {
    changes: Mutex<Vec<BoardChange>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn changes(&self) -> Vec<BoardChange> {
        self.changes.lock().await.clone()
    }
}

#[async_trait]
impl ChangeSink for RecordingSink {
    async fn persist(&self, change: &BoardChange) -> Result<()> {
        self.changes.lock().await.push(change.clone());
        Ok(())
    }
}

pub struct BoardSession<I = RandomIdSource> {
    machine: BoardMachine<I>,
    current: Arc<BoardSnapshot>,
    updates: broadcast::Sender<Arc<BoardSnapshot>>,
    outbox: Option<mpsc::UnboundedSender<BoardChange>>,
    worker: Option<JoinHandle<()>>,
}

impl<I: IdSource> BoardSession<I> {
    /// Starts from an empty board. Must be called inside a tokio runtime;
    /// the persistence worker is spawned here.
    pub fn new(machine: BoardMachine<I>, sink: Arc<dyn ChangeSink>) -> Self {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            machine,
            current: Arc::new(BoardSnapshot::default()),
            updates,
            outbox: Some(outbox),
            worker: Some(spawn_persistence_worker(sink, inbox)),
        }
    }

    pub fn snapshot(&self) -> Arc<BoardSnapshot> {
        Arc::clone(&self.current)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BoardSnapshot>> {
        self.updates.subscribe()
    }

    pub fn dispatch(&mut self, event: BoardEvent) -> Result<Arc<BoardSnapshot>, BoardError> {
        let event_name = event.name();
        let reload = matches!(event, BoardEvent::SetItemsAndOrder { .. });

        let transition = self.machine.apply(&self.current, event).map_err(|err| {
            if err.is_corruption() {
                error!(event = event_name, error = %err, "board transition rejected");
            } else {
                warn!(event = event_name, error = %err, "board transition rejected");
            }
            err
        })?;

        if !transition.changed {
            debug!(event = event_name, "event ignored");
            return Ok(self.snapshot());
        }

        if reload {
            let snapshot = &transition.snapshot;
            if let Err(err) = snapshot.order().validate(snapshot.groups(), snapshot.items()) {
                warn!(error = %err, "loaded order index is inconsistent");
            }
        }

        self.current = Arc::new(transition.snapshot);
        let _ = self.updates.send(Arc::clone(&self.current));

        if let Some(change) = transition.change {
            match &self.outbox {
                Some(outbox) => {
                    if outbox.send(change).is_err() {
                        warn!(event = event_name, "persistence worker is gone; change kept locally only");
                    }
                }
                None => warn!(event = event_name, "session is shut down; change kept locally only"),
            }
        }

        Ok(self.snapshot())
    }

    /// Stops accepting changes and waits for queued ones to reach the sink.
    pub async fn shutdown(&mut self) {
        self.outbox.take();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                error!(error = %err, "persistence worker panicked");
            }
        }
    }
}

fn spawn_persistence_worker(
    sink: Arc<dyn ChangeSink>,
    mut inbox: mpsc::UnboundedReceiver<BoardChange>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(change) = inbox.recv().await {
            match sink.persist(&change).await {
                Ok(()) => debug!(
                    kind = change.kind(),
                    links = change.patch().len(),
                    "persisted board change"
                ),
                Err(err) => warn!(
                    kind = change.kind(),
                    error = %err,
                    "failed to persist board change"
                ),
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
