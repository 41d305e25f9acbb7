//! # Market Kernel
//!
//! Facade wiring the transport, canonical store, arbitrator, settlement
//! engine, competitor book, and snapshot persistence into one simulation
//! kernel, and exposing the external query surface.
//!
//! Each kernel owns its own explicitly constructed transport, so several
//! isolated simulations can run in one process.

use crate::application::services::arbitration::{
    ArbitrationConfig, ArbitrationDecision, ArbitrationStats, CommandArbitrator,
};
use crate::application::services::demand::DemandModel;
use crate::application::services::settlement::{MarketSettlementEngine, SettlementConfig};
use crate::domain::entities::ProductState;
use crate::domain::errors::DomainResult;
use crate::domain::events::{
    EventKind, MarketEvent, PriceChangeRequest, SaleOutcome, TickSignal, INVENTORY_REASON_SALE,
};
use crate::domain::value_objects::{Currency, ItemId, Money, SnapshotId};
use crate::infrastructure::competitors::CompetitorPriceBook;
use crate::infrastructure::persistence::{PersistenceResult, SnapshotRecord, SnapshotStore};
use crate::infrastructure::state::CanonicalStateStore;
use crate::infrastructure::transport::{EventHandler, EventTransport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Kernel-level configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    /// Take a snapshot every N ticks; zero disables the cadence.
    pub snapshot_every_n_ticks: u64,
    /// Currency assumed for inventory stubs created before any price.
    pub base_currency: Currency,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            snapshot_every_n_ticks: 100,
            base_currency: Currency::Usd,
        }
    }
}

/// Read-only operational statistics summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelStats {
    /// Arbitration counters.
    pub arbitration: ArbitrationStats,
    /// Snapshots successfully persisted.
    pub snapshots_taken: u64,
}

/// The authoritative state kernel of one simulation.
pub struct MarketKernel {
    store: Arc<CanonicalStateStore>,
    transport: Arc<EventTransport>,
    arbitrator: Arc<CommandArbitrator>,
    settlement: Arc<MarketSettlementEngine>,
    snapshots: Arc<dyn SnapshotStore>,
    competitor_book: Arc<CompetitorPriceBook>,
    config: KernelConfig,
    snapshots_taken: Arc<AtomicU64>,
    pending_snapshots: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl MarketKernel {
    /// Constructs a kernel and registers all internal event handlers.
    pub async fn new(
        config: KernelConfig,
        arbitration_config: ArbitrationConfig,
        settlement_config: SettlementConfig,
        demand_model: Arc<dyn DemandModel>,
        snapshots: Arc<dyn SnapshotStore>,
        competitor_book: Arc<CompetitorPriceBook>,
    ) -> Self {
        let store = Arc::new(CanonicalStateStore::new());
        let transport = Arc::new(EventTransport::new());
        let arbitrator = Arc::new(CommandArbitrator::new(
            store.clone(),
            transport.clone(),
            arbitration_config,
        ));
        let settlement = Arc::new(MarketSettlementEngine::new(
            store.clone(),
            transport.clone(),
            demand_model,
            settlement_config,
        ));
        let snapshots_taken = Arc::new(AtomicU64::new(0));
        let pending_snapshots = Arc::new(Mutex::new(Vec::new()));

        transport
            .subscribe(
                EventKind::PriceChangeRequested,
                Arc::new(RequestDispatchHandler {
                    arbitrator: arbitrator.clone(),
                }),
            )
            .await;
        transport
            .subscribe(
                EventKind::InventoryChanged,
                Arc::new(InventoryUpdateHandler {
                    store: store.clone(),
                    base_currency: config.base_currency,
                }),
            )
            .await;
        transport
            .subscribe(
                EventKind::CompetitorPricesObserved,
                Arc::new(CompetitorObservationHandler {
                    book: competitor_book.clone(),
                }),
            )
            .await;
        transport
            .subscribe(
                EventKind::Tick,
                Arc::new(TickBoundaryHandler {
                    arbitrator: arbitrator.clone(),
                    store: store.clone(),
                    snapshots: snapshots.clone(),
                    cadence: config.snapshot_every_n_ticks,
                    snapshots_taken: snapshots_taken.clone(),
                    pending_snapshots: pending_snapshots.clone(),
                }),
            )
            .await;

        Self {
            store,
            transport,
            arbitrator,
            settlement,
            snapshots,
            competitor_book,
            config,
            snapshots_taken,
            pending_snapshots,
        }
    }

    /// Returns the shared transport, for external publishers and observers.
    #[must_use]
    pub fn transport(&self) -> Arc<EventTransport> {
        self.transport.clone()
    }

    /// Returns the competitor price book.
    #[must_use]
    pub fn competitor_book(&self) -> Arc<CompetitorPriceBook> {
        self.competitor_book.clone()
    }

    /// Creates canonical state for a new item.
    ///
    /// # Errors
    ///
    /// Fails if the item already exists or the currencies mismatch.
    pub async fn initialize_item(
        &self,
        item_id: ItemId,
        price: Money,
        inventory: u64,
        cost_basis: Money,
    ) -> DomainResult<()> {
        self.store
            .initialize(item_id, price, inventory, cost_basis)
            .await
    }

    /// Returns the item's canonical price.
    pub async fn price(&self, item_id: &ItemId) -> Option<Money> {
        self.store.price(item_id).await
    }

    /// Returns a defensive copy of the item's full state.
    pub async fn state(&self, item_id: &ItemId) -> Option<ProductState> {
        self.store.get(item_id).await
    }

    /// Returns the item's inventory quantity.
    pub async fn inventory(&self, item_id: &ItemId) -> Option<u64> {
        self.store.inventory(item_id).await
    }

    /// Returns the item's cost basis.
    pub async fn cost_basis(&self, item_id: &ItemId) -> Option<Money> {
        self.store.cost_basis(item_id).await
    }

    /// Returns a defensive copy of all canonical state.
    pub async fn list_states(&self) -> HashMap<ItemId, ProductState> {
        self.store.list_all().await
    }

    /// Publishes a price-change request for arbitration. The decision is
    /// delivered through the transport; agents observing
    /// [`EventKind::PriceChanged`] see accepted outcomes.
    pub async fn submit(&self, request: PriceChangeRequest) {
        self.transport
            .publish(&MarketEvent::PriceChangeRequested(request))
            .await;
    }

    /// Publishes the tick boundary: resets per-tick arbitration scope and
    /// fires the snapshot cadence.
    pub async fn advance_tick(&self, tick: u64) {
        self.transport
            .publish(&MarketEvent::Tick(TickSignal::now(tick)))
            .await;
    }

    /// Settles one item (see [`MarketSettlementEngine::settle`]).
    ///
    /// # Errors
    ///
    /// Propagates settlement faults for this item only.
    pub async fn settle(&self, item_id: &ItemId) -> DomainResult<Option<SaleOutcome>> {
        self.settlement.settle(item_id).await
    }

    /// Settles every known item for the current tick. A fault in one
    /// item's settlement is logged and does not stop the others.
    pub async fn settle_all(&self) -> Vec<SaleOutcome> {
        let mut item_ids: Vec<ItemId> = self.store.list_all().await.into_keys().collect();
        item_ids.sort();

        let mut outcomes = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            match self.settlement.settle(&item_id).await {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {}
                Err(error) => {
                    tracing::error!(item = %item_id, %error, "settlement fault, item skipped");
                }
            }
        }
        outcomes
    }

    /// Persists a snapshot immediately and returns its id.
    ///
    /// # Errors
    ///
    /// Returns a persistence error on backend failure.
    pub async fn take_snapshot(&self, tick: Option<u64>) -> PersistenceResult<SnapshotId> {
        let record = SnapshotRecord::new(self.store.list_all().await, tick);
        let id = self.snapshots.save(&record).await?;
        self.snapshots_taken.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Restores the most recent snapshot, if one exists.
    ///
    /// Returns true when state was restored. A load failure leaves the
    /// store empty and returns false; startup never crashes on a bad
    /// snapshot.
    pub async fn restore_latest(&self) -> bool {
        match self.snapshots.load_latest().await {
            Ok(Some(record)) => {
                let items = record.state.len();
                self.store.restore(record.state).await;
                tracing::info!(snapshot = %record.id, items, "canonical state restored");
                true
            }
            Ok(None) => false,
            Err(error) => {
                tracing::error!(%error, "snapshot load failed, starting empty");
                false
            }
        }
    }

    /// Returns the operational statistics summary.
    pub async fn stats(&self) -> KernelStats {
        KernelStats {
            arbitration: self.arbitrator.stats().await,
            snapshots_taken: self.snapshots_taken.load(Ordering::Relaxed),
        }
    }

    /// Clears all canonical state and competitor observations.
    pub async fn reset(&self) {
        self.store.reset().await;
        self.competitor_book.reset().await;
    }

    /// Awaits every in-flight snapshot write. Call during clean shutdown;
    /// mid-simulation snapshot writes never block tick progress.
    pub async fn close(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending_snapshots.lock().await;
            pending.drain(..).collect()
        };
        for handle in handles {
            if let Err(error) = handle.await {
                tracing::error!(%error, "pending snapshot task failed");
            }
        }
    }

    /// Returns the kernel configuration.
    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }
}

impl std::fmt::Debug for MarketKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketKernel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Routes delivered price-change requests into the arbitrator and logs
/// the decision; rejection is a warning, never a fault.
struct RequestDispatchHandler {
    arbitrator: Arc<CommandArbitrator>,
}

#[async_trait]
impl EventHandler for RequestDispatchHandler {
    async fn handle(&self, event: &MarketEvent) -> DomainResult<()> {
        let MarketEvent::PriceChangeRequested(request) = event else {
            return Ok(());
        };
        match self.arbitrator.handle_request(request).await? {
            ArbitrationDecision::Accepted(outcome) => {
                tracing::debug!(
                    item = %outcome.item_id,
                    agent = %outcome.agent_id,
                    price = %outcome.new_price,
                    "price change accepted"
                );
            }
            ArbitrationDecision::Rejected {
                request_id,
                item_id,
                reason,
            } => {
                tracing::warn!(
                    item = %item_id,
                    request = %request_id,
                    %reason,
                    "price change rejected"
                );
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "request-dispatch"
    }
}

/// Applies authoritative inventory deltas to the canonical store.
///
/// A sale against an unknown item is a tolerated no-op; any other reason
/// (e.g. restock) creates a version-0 stub so a later accepted price can
/// inherit the inventory.
struct InventoryUpdateHandler {
    store: Arc<CanonicalStateStore>,
    base_currency: Currency,
}

#[async_trait]
impl EventHandler for InventoryUpdateHandler {
    async fn handle(&self, event: &MarketEvent) -> DomainResult<()> {
        let MarketEvent::InventoryChanged(change) = event else {
            return Ok(());
        };
        match self.store.get(&change.item_id).await {
            Some(mut state) => {
                state.apply_inventory(change.new_quantity);
                self.store.set(state).await;
            }
            None if change.reason == INVENTORY_REASON_SALE => {
                tracing::debug!(
                    item = %change.item_id,
                    "inventory sale for unknown item ignored"
                );
            }
            None => {
                let mut stub = ProductState::stub(change.item_id.clone(), self.base_currency);
                stub.apply_inventory(change.new_quantity);
                self.store.set(stub).await;
                tracing::debug!(
                    item = %change.item_id,
                    quantity = change.new_quantity,
                    reason = %change.reason,
                    "inventory stub created ahead of price initialization"
                );
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "inventory-update"
    }
}

/// Feeds competitor broadcasts into the rolling price book.
struct CompetitorObservationHandler {
    book: Arc<CompetitorPriceBook>,
}

#[async_trait]
impl EventHandler for CompetitorObservationHandler {
    async fn handle(&self, event: &MarketEvent) -> DomainResult<()> {
        if let MarketEvent::CompetitorPricesObserved(sample) = event {
            self.book.record(&sample.item_id, &sample.prices).await;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "competitor-observation"
    }
}

/// Resets per-tick arbitration scope and fires the snapshot cadence.
///
/// The snapshot write is fire-and-forget: it runs on a spawned task so a
/// slow backend cannot block tick progress. Every in-flight handle is
/// kept so shutdown can await them all.
struct TickBoundaryHandler {
    arbitrator: Arc<CommandArbitrator>,
    store: Arc<CanonicalStateStore>,
    snapshots: Arc<dyn SnapshotStore>,
    cadence: u64,
    snapshots_taken: Arc<AtomicU64>,
    pending_snapshots: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

#[async_trait]
impl EventHandler for TickBoundaryHandler {
    async fn handle(&self, event: &MarketEvent) -> DomainResult<()> {
        let MarketEvent::Tick(signal) = event else {
            return Ok(());
        };
        self.arbitrator.begin_tick(signal.tick).await;

        if self.cadence > 0 && signal.tick > 0 && signal.tick % self.cadence == 0 {
            let store = self.store.clone();
            let snapshots = self.snapshots.clone();
            let counter = self.snapshots_taken.clone();
            let tick = signal.tick;
            let task = tokio::spawn(async move {
                let record = SnapshotRecord::new(store.list_all().await, Some(tick));
                match snapshots.save(&record).await {
                    Ok(id) => {
                        counter.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(snapshot = %id, tick, "periodic snapshot saved");
                    }
                    Err(error) => {
                        // Swallowed: a failed save must not stall the tick.
                        tracing::error!(%error, tick, "periodic snapshot failed");
                    }
                }
            });
            let mut pending = self.pending_snapshots.lock().await;
            pending.retain(|handle| !handle.is_finished());
            pending.push(task);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tick-boundary"
    }
}
