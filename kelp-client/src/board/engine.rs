//! Board engine - the single writer
//!
//! One task owns the order cache and the counters. UI commands and
//! feed events interleave on its loop; every read anywhere else is a
//! watch projection. No locks: there is exactly one logical writer.
//!
//! The optimistic contract lives here: a move is validated by the pure
//! transition table, applied locally, published, and only then sent to
//! the store. A store failure reverts the exact captured prior value
//! and the UI snaps back; the authoritative event echo of a success is
//! absorbed by idempotent overwrite.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use shared::feed::ChangeEvent;
use shared::models::order::{validate_transition, Order, OrderStatus};

use crate::board::bulk::{BulkAction, BulkOutcome};
use crate::board::counts::StatusCounts;
use crate::board::store::{OrderCache, ReconcileChange};
use crate::config::BoardConfig;
use crate::error::EngineError;
use crate::feed::supervisor::{
    ConnectionState, ConnectionStatus, ConnectionSupervisor, FeedConnector,
};
use crate::persist::{OrderFilters, OrderStore};

enum Command {
    MoveOrder {
        id: String,
        target: OrderStatus,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    BulkApply {
        ids: Vec<String>,
        action: BulkAction,
        reply: oneshot::Sender<Result<BulkOutcome, EngineError>>,
    },
    Refresh {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
}

/// Handle exposed to the surrounding UI
///
/// Cloneable; dropping every clone leaves the engine running until
/// `shutdown()` is called. Disposal is explicit, never implicit.
#[derive(Debug, Clone)]
pub struct BoardHandle {
    command_tx: mpsc::Sender<Command>,
    orders_rx: watch::Receiver<Vec<Order>>,
    counts_rx: watch::Receiver<StatusCounts>,
    event_tx: broadcast::Sender<ChangeEvent>,
    supervisor: ConnectionSupervisor,
    cancel: CancellationToken,
}

impl BoardHandle {
    /// Current order list (read-only projection)
    pub fn orders(&self) -> Vec<Order> {
        self.orders_rx.borrow().clone()
    }

    /// Subscribe to order list changes
    pub fn subscribe_orders(&self) -> watch::Receiver<Vec<Order>> {
        self.orders_rx.clone()
    }

    /// Current per-status counts (read-only projection)
    pub fn counts(&self) -> StatusCounts {
        *self.counts_rx.borrow()
    }

    /// Subscribe to counter changes
    pub fn subscribe_counts(&self) -> watch::Receiver<StatusCounts> {
        self.counts_rx.clone()
    }

    /// Current connection status ("live/offline" indicator)
    pub fn connection(&self) -> ConnectionStatus {
        self.supervisor.status()
    }

    /// Subscribe to connection status changes
    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.supervisor.subscribe_status()
    }

    /// Subscribe to the raw change feed
    ///
    /// Extra consumers (audit log, sound alerts) ride the same logical
    /// connection; a slow subscriber lags on its own receiver and never
    /// blocks the others or the engine. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ChangeEvent> {
        self.event_tx.subscribe()
    }

    /// Propose a kitchen-board move (drag, button or keyboard)
    pub async fn move_order(&self, id: &str, target: OrderStatus) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::MoveOrder {
                id: id.to_string(),
                target,
                reply,
            })
            .await
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)?
    }

    /// Apply one action to a selected set of orders
    pub async fn bulk_apply(
        &self,
        ids: Vec<String>,
        action: BulkAction,
    ) -> Result<BulkOutcome, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::BulkApply { ids, action, reply })
            .await
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)?
    }

    /// Force a full re-fetch and reseed of cache and counters
    ///
    /// The designated drift-correction mechanism; works through the
    /// store alone, independent of the feed connection.
    pub async fn refresh(&self) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Refresh { reply })
            .await
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)?
    }

    /// Manually re-arm the feed connection after retries were exhausted
    pub async fn reconnect(&self) {
        self.supervisor.reconnect().await;
    }

    /// Tear everything down: feed subscription, retry timers, engine task
    pub fn shutdown(&self) {
        self.supervisor.shutdown();
        self.cancel.cancel();
    }
}

/// The engine task owning all mutable board state
pub struct BoardEngine {
    config: BoardConfig,
    store: Arc<dyn OrderStore>,
    cache: OrderCache,
    counts: StatusCounts,
    events: broadcast::Receiver<ChangeEvent>,
    feed_open: bool,
    command_rx: mpsc::Receiver<Command>,
    status_rx: watch::Receiver<ConnectionStatus>,
    status_open: bool,
    /// `last_connected_at` of the most recent Connected status seen;
    /// a different value means a reconnect happened in between
    last_seen_connect: Option<i64>,
    orders_tx: watch::Sender<Vec<Order>>,
    counts_tx: watch::Sender<StatusCounts>,
    cancel: CancellationToken,
}

impl BoardEngine {
    /// Seed from the store, start the feed supervisor and the engine task
    ///
    /// Fails if the seeding fetch fails; nothing keeps running in that
    /// case.
    pub async fn start(
        config: BoardConfig,
        store: Arc<dyn OrderStore>,
        connector: Arc<dyn FeedConnector>,
    ) -> Result<BoardHandle, EngineError> {
        let (event_tx, events) = broadcast::channel(config.channel_capacity);
        let supervisor =
            ConnectionSupervisor::spawn(config.clone(), connector, event_tx.clone());
        let status_rx = supervisor.subscribe_status();

        let seed = match store
            .fetch_active_orders(&config.restaurant_id, &OrderFilters::all_active())
            .await
        {
            Ok(orders) => orders,
            Err(e) => {
                supervisor.shutdown();
                return Err(EngineError::Store(e));
            }
        };

        let counts = StatusCounts::seed(&seed);
        let mut cache = OrderCache::new(config.restaurant_id.clone());
        cache.seed(seed);

        let (command_tx, command_rx) = mpsc::channel(64);
        let (orders_tx, orders_rx) = watch::channel(cache.active_orders());
        let (counts_tx, counts_rx) = watch::channel(counts);
        let cancel = CancellationToken::new();

        let engine = Self {
            config,
            store,
            cache,
            counts,
            events,
            feed_open: true,
            command_rx,
            status_rx,
            status_open: true,
            last_seen_connect: None,
            orders_tx,
            counts_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(engine.run());

        Ok(BoardHandle {
            command_tx,
            orders_rx,
            counts_rx,
            event_tx,
            supervisor,
            cancel,
        })
    }

    async fn run(mut self) {
        tracing::info!(restaurant = %self.config.restaurant_id, "Board engine started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(cmd) = self.command_rx.recv() => self.handle_command(cmd).await,
                changed = self.status_rx.changed(), if self.status_open => match changed {
                    Ok(()) => self.handle_connection_change().await,
                    Err(_) => self.status_open = false,
                },
                event = self.events.recv(), if self.feed_open => self.handle_feed(event).await,
            }
        }

        tracing::debug!("Board engine stopped");
    }

    fn publish(&mut self) {
        self.orders_tx.send_replace(self.cache.active_orders());
        self.counts_tx.send_replace(self.counts);
    }

    // ========== Commands ==========

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::MoveOrder { id, target, reply } => {
                let result = self.move_order(&id, target).await;
                let _ = reply.send(result);
            }
            Command::BulkApply { ids, action, reply } => {
                let result = self.bulk_apply(ids, action).await;
                let _ = reply.send(result);
            }
            Command::Refresh { reply } => {
                let result = self.refresh().await;
                let _ = reply.send(result);
            }
        }
    }

    /// Validate, apply optimistically, persist, roll back on failure
    async fn move_order(&mut self, id: &str, target: OrderStatus) -> Result<(), EngineError> {
        let Some(current) = self.cache.status_of(id) else {
            return Err(EngineError::UnknownOrder(id.to_string()));
        };

        // Rejected moves touch nothing and issue no persistence call
        if !validate_transition(current, target) {
            tracing::debug!(order = %id, from = %current, to = %target, "Rejected board move");
            return Err(EngineError::IllegalMove {
                from: current,
                to: target,
            });
        }

        let Some(guard) = self.cache.apply_status(id, target) else {
            return Err(EngineError::UnknownOrder(id.to_string()));
        };
        self.counts.apply_update(current, target);
        self.publish();

        match self.store.set_order_status(id, target).await {
            Ok(()) => {
                // The optimistic value is authoritative now; the event
                // echo will overwrite it with itself
                drop(guard);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(order = %id, error = %e, "Status update failed; rolling back");
                self.cache.revert(guard);
                self.counts.apply_update(target, current);
                self.publish();
                Err(EngineError::Store(e))
            }
        }
    }

    /// Delete one order optimistically with rollback
    async fn delete_order(&mut self, id: &str) -> Result<(), EngineError> {
        let Some(guard) = self.cache.apply_remove(id) else {
            return Err(EngineError::UnknownOrder(id.to_string()));
        };
        let last = guard
            .prior()
            .map(|order| order.status)
            .unwrap_or_default();
        self.counts.apply_delete(last);
        self.publish();

        match self.store.delete_order(id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(order = %id, error = %e, "Delete failed; rolling back");
                self.cache.revert(guard);
                self.counts.apply_insert(last);
                self.publish();
                Err(EngineError::Store(e))
            }
        }
    }

    /// Per-item isolation: one failure never aborts the rest, and the
    /// cache ends consistent with exactly the succeeded subset
    async fn bulk_apply(
        &mut self,
        ids: Vec<String>,
        action: BulkAction,
    ) -> Result<BulkOutcome, EngineError> {
        let mut outcome = BulkOutcome::default();

        for id in ids {
            let result = match &action {
                BulkAction::SetStatus(target) => self.move_order(&id, *target).await,
                BulkAction::Delete => self.delete_order(&id).await,
                BulkAction::Export => match self.cache.get(&id) {
                    Some(order) => {
                        outcome.exported.push(order.clone());
                        Ok(())
                    }
                    None => Err(EngineError::UnknownOrder(id.clone())),
                },
            };
            match result {
                Ok(()) => outcome.push_ok(id),
                Err(e) => outcome.push_failed(id, e.to_string()),
            }
        }

        tracing::info!(summary = %outcome.summary(), "Bulk action finished");
        Ok(outcome)
    }

    /// Full re-fetch reseeding cache and counters
    async fn refresh(&mut self) -> Result<(), EngineError> {
        let orders = self
            .store
            .fetch_active_orders(&self.config.restaurant_id, &OrderFilters::all_active())
            .await?;

        self.counts = StatusCounts::seed(&orders);
        self.cache.seed(orders);
        self.publish();
        tracing::debug!(orders = self.cache.len(), "Reseeded from snapshot");
        Ok(())
    }

    /// Catch up after an outage
    ///
    /// Notifications emitted while the feed was down are gone for good,
    /// so every reconnect reseeds from a fresh snapshot. The first
    /// connect skips the fetch unless the seed already aged past the
    /// staleness limit (e.g. the feed took long to come up).
    async fn handle_connection_change(&mut self) {
        let status = *self.status_rx.borrow_and_update();
        if status.state != ConnectionState::Connected {
            return;
        }

        let reconnected = self.last_seen_connect.is_some()
            && self.last_seen_connect != status.last_connected_at;
        let stale_first_connect = self.last_seen_connect.is_none()
            && self.cache.is_stale(self.config.snapshot_max_age);
        self.last_seen_connect = status.last_connected_at;

        if reconnected || stale_first_connect {
            tracing::info!("Feed reconnected; catching up with a fresh snapshot");
            if let Err(e) = self.refresh().await {
                tracing::warn!(error = %e, "Catch-up refresh failed");
            }
        }
    }

    // ========== Feed reconciliation ==========

    async fn handle_feed(&mut self, event: Result<ChangeEvent, broadcast::error::RecvError>) {
        match event {
            Ok(event) => self.reconcile(event).await,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                // Missed deliveries: incremental state can no longer be
                // trusted, fall back to the drift-correction fetch
                tracing::warn!(missed, "Feed subscriber lagged; forcing refresh");
                if let Err(e) = self.refresh().await {
                    tracing::warn!(error = %e, "Refresh after lag failed");
                }
            }
            Err(broadcast::error::RecvError::Closed) => {
                self.feed_open = false;
            }
        }
    }

    async fn reconcile(&mut self, event: ChangeEvent) {
        match self.cache.reconcile(&event) {
            ReconcileChange::OrderInserted(new) => {
                self.counts.apply_insert(new.status);
            }
            ReconcileChange::OrderUpdated { old, new } => {
                self.counts.apply_update(old.status, new.status);
            }
            ReconcileChange::OrderRemoved(old) => {
                self.counts.apply_delete(old.status);
            }
            ReconcileChange::DetailChanged => {}
            ReconcileChange::DetailForUnknownOrder(order_id) => {
                // Cache miss, not an error: fetch-and-insert instead of
                // discarding the event
                match self.store.fetch_order(&order_id).await {
                    Ok(Some(order)) => match self.cache.insert_fetched(order) {
                        ReconcileChange::OrderInserted(new) => {
                            self.counts.apply_insert(new.status)
                        }
                        ReconcileChange::OrderUpdated { old, new } => {
                            self.counts.apply_update(old.status, new.status)
                        }
                        _ => {}
                    },
                    Ok(None) => {
                        tracing::debug!(order = %order_id, "Referenced order no longer exists");
                    }
                    Err(e) => {
                        // Best effort; refresh() remains the backstop
                        tracing::warn!(order = %order_id, error = %e, "Cache-miss fill failed");
                    }
                }
            }
            ReconcileChange::None => return,
        }
        self.publish();
    }
}
