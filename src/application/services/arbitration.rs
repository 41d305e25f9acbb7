//! # Command Arbitration
//!
//! Accepts exactly one price-change request per item per tick and rejects
//! the rest with a traceable reason.
//!
//! The pipeline short-circuits on the first failure: duplicate id, price
//! bounds, change magnitude, then per-item-per-tick exclusivity. The first
//! request to clear all checks for an item wins the tick; the ordering key
//! is transport delivery order, never the request's audit timestamp. Under
//! concurrent fan-out by a caller this means "first handler to finish
//! wins", which is accepted as intentional.
//!
//! Rejections are decision values, not errors. An `Err` from
//! [`CommandArbitrator::handle_request`] is a programming fault (currency
//! mismatch, overflow) and stops only the offending request.

use crate::domain::entities::ProductState;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::{MarketEvent, PriceChangeOutcome, PriceChangeRequest};
use crate::domain::value_objects::{Currency, ItemId, Money, RequestId};
use crate::infrastructure::state::CanonicalStateStore;
use crate::infrastructure::transport::EventTransport;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Price policy for arbitration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationConfig {
    /// Lowest acceptable price, inclusive.
    pub min_price: Money,
    /// Highest acceptable price, inclusive.
    pub max_price: Money,
    /// Largest allowed fractional move from the previous price within one
    /// tick (e.g. `0.50` = ±50%).
    pub max_change_ratio: Decimal,
}

impl ArbitrationConfig {
    /// Creates a config with explicit bounds.
    #[must_use]
    pub const fn new(min_price: Money, max_price: Money, max_change_ratio: Decimal) -> Self {
        Self {
            min_price,
            max_price,
            max_change_ratio,
        }
    }

    /// Sets the maximum change ratio.
    #[must_use]
    pub const fn with_max_change_ratio(mut self, ratio: Decimal) -> Self {
        self.max_change_ratio = ratio;
        self
    }
}

impl Default for ArbitrationConfig {
    /// USD bounds of $1.00 to $10,000.00 with a ±50% per-tick cap.
    fn default() -> Self {
        Self {
            min_price: Money::from_minor_units(100, Currency::Usd),
            max_price: Money::from_minor_units(1_000_000, Currency::Usd),
            max_change_ratio: Decimal::new(50, 2),
        }
    }
}

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// The request id was already processed this tick.
    DuplicateRequest,
    /// The requested price falls outside the configured bounds.
    PriceOutOfBounds {
        /// The offending price.
        price: Money,
        /// Lower bound.
        min: Money,
        /// Upper bound.
        max: Money,
    },
    /// The move from the previous price exceeds the per-tick cap.
    ExcessiveChange {
        /// The requested fractional move.
        ratio: Decimal,
        /// The configured cap.
        max_ratio: Decimal,
    },
    /// Another request for this item was already accepted this tick.
    AlreadyAcceptedThisTick,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRequest => write!(f, "duplicate request"),
            Self::PriceOutOfBounds { price, min, max } => {
                write!(f, "price {price} outside bounds [{min}, {max}]")
            }
            Self::ExcessiveChange { ratio, max_ratio } => {
                write!(f, "change ratio {ratio} exceeds cap {max_ratio}")
            }
            Self::AlreadyAcceptedThisTick => {
                write!(f, "already accepted for this item this tick")
            }
        }
    }
}

/// Outcome of arbitrating one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ArbitrationDecision {
    /// The request won its item for this tick and was applied.
    Accepted(PriceChangeOutcome),
    /// The request lost; nothing was applied.
    Rejected {
        /// The rejected request.
        request_id: RequestId,
        /// The contested item.
        item_id: ItemId,
        /// Why it lost.
        reason: RejectionReason,
    },
}

impl ArbitrationDecision {
    /// Returns true for accepted decisions.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Counters maintained across ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationStats {
    /// Requests decided (accepted or rejected).
    pub commands_processed: u64,
    /// Requests rejected for any reason.
    pub commands_rejected: u64,
    /// Rejections caused specifically by per-item exclusivity.
    pub conflicts_arbitrated: u64,
}

#[derive(Debug, Default)]
struct TickScope {
    current_tick: u64,
    seen_requests: HashSet<RequestId>,
    claimed_items: HashSet<ItemId>,
    stats: ArbitrationStats,
}

/// Consumes price-change requests, arbitrates them against per-tick and
/// per-item policy, applies winners to the canonical store, and emits the
/// resulting outcome.
pub struct CommandArbitrator {
    store: Arc<CanonicalStateStore>,
    transport: Arc<EventTransport>,
    config: ArbitrationConfig,
    scope: Mutex<TickScope>,
}

impl CommandArbitrator {
    /// Creates an arbitrator over the given store and transport.
    #[must_use]
    pub fn new(
        store: Arc<CanonicalStateStore>,
        transport: Arc<EventTransport>,
        config: ArbitrationConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
            scope: Mutex::new(TickScope::default()),
        }
    }

    /// Clears the per-tick duplicate and claim sets at a tick boundary.
    pub async fn begin_tick(&self, tick: u64) {
        let mut scope = self.scope.lock().await;
        scope.current_tick = tick;
        scope.seen_requests.clear();
        scope.claimed_items.clear();
    }

    /// Returns a copy of the running counters.
    pub async fn stats(&self) -> ArbitrationStats {
        let scope = self.scope.lock().await;
        scope.stats
    }

    /// Returns the tick the arbitrator is currently scoped to.
    pub async fn current_tick(&self) -> u64 {
        let scope = self.scope.lock().await;
        scope.current_tick
    }

    /// Arbitrates one request.
    ///
    /// Checks run in order and short-circuit: duplicate id, price bounds,
    /// change magnitude (skipped when the item has no prior price), then
    /// per-item exclusivity. On acceptance the canonical state is mutated
    /// (version +1), the item is claimed for the rest of the tick, and a
    /// [`MarketEvent::PriceChanged`] outcome is published.
    ///
    /// # Errors
    ///
    /// Returns a fault on currency mismatch with the configured bounds or
    /// on arithmetic overflow. Faults stop only this request.
    pub async fn handle_request(
        &self,
        request: &PriceChangeRequest,
    ) -> DomainResult<ArbitrationDecision> {
        let mut scope = self.scope.lock().await;
        scope.stats.commands_processed += 1;

        // 1. Duplicate id — each request id is consumed once per tick,
        //    whatever the eventual decision.
        if !scope.seen_requests.insert(request.request_id.clone()) {
            scope.stats.commands_rejected += 1;
            return Ok(Self::rejected(request, RejectionReason::DuplicateRequest));
        }

        // 2. Bounds.
        request.new_price.ensure_same_currency(&self.config.min_price)?;
        if request.new_price.amount() < self.config.min_price.amount()
            || request.new_price.amount() > self.config.max_price.amount()
        {
            scope.stats.commands_rejected += 1;
            return Ok(Self::rejected(
                request,
                RejectionReason::PriceOutOfBounds {
                    price: request.new_price,
                    min: self.config.min_price,
                    max: self.config.max_price,
                },
            ));
        }

        let existing = self.store.get(&request.item_id).await;

        // 3. Magnitude — only when a prior accepted price exists.
        if let Some(state) = existing.as_ref().filter(|s| s.has_price()) {
            let ratio = request
                .new_price
                .checked_ratio(&state.price)?
                .checked_sub(Decimal::ONE)
                .map(|d| d.abs())
                .ok_or(DomainError::overflow("sub"))?;
            if ratio > self.config.max_change_ratio {
                scope.stats.commands_rejected += 1;
                return Ok(Self::rejected(
                    request,
                    RejectionReason::ExcessiveChange {
                        ratio,
                        max_ratio: self.config.max_change_ratio,
                    },
                ));
            }
        }

        // 4. Exclusivity — one winner per item per tick.
        if scope.claimed_items.contains(&request.item_id) {
            scope.stats.commands_rejected += 1;
            scope.stats.conflicts_arbitrated += 1;
            return Ok(Self::rejected(
                request,
                RejectionReason::AlreadyAcceptedThisTick,
            ));
        }

        // 5. Apply. New items start from an inventory stub when one was
        //    left by an inventory-only writer, otherwise from scratch.
        let previous_price = existing
            .as_ref()
            .filter(|s| s.has_price())
            .map(|s| s.price);
        let mut state = existing.unwrap_or_else(|| {
            ProductState::stub(request.item_id.clone(), request.new_price.currency())
        });
        state.apply_price_change(
            request.new_price,
            request.agent_id.clone(),
            request.request_id.clone(),
        );
        let version = state.version;
        self.store.set(state).await;
        scope.claimed_items.insert(request.item_id.clone());
        let tick = scope.current_tick;
        drop(scope);

        let outcome = PriceChangeOutcome {
            item_id: request.item_id.clone(),
            new_price: request.new_price,
            previous_price,
            agent_id: request.agent_id.clone(),
            request_id: request.request_id.clone(),
            notes: format!("accepted at tick {tick}, version {version}"),
        };
        self.transport
            .publish(&MarketEvent::PriceChanged(outcome.clone()))
            .await;

        Ok(ArbitrationDecision::Accepted(outcome))
    }

    fn rejected(request: &PriceChangeRequest, reason: RejectionReason) -> ArbitrationDecision {
        ArbitrationDecision::Rejected {
            request_id: request.request_id.clone(),
            item_id: request.item_id.clone(),
            reason,
        }
    }
}

impl fmt::Debug for CommandArbitrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandArbitrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::errors::{DomainError, DomainResult};
    use crate::domain::events::EventKind;
    use crate::domain::value_objects::AgentId;
    use crate::infrastructure::transport::EventHandler;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    fn usd(minor: i64) -> Money {
        Money::from_minor_units(minor, Currency::Usd)
    }

    fn request(id: &str, item: &str, price_minor: i64) -> PriceChangeRequest {
        PriceChangeRequest::new(
            RequestId::new(id),
            AgentId::new("agent-1"),
            ItemId::new(item),
            usd(price_minor),
            1,
        )
    }

    struct OutcomeRecorder {
        outcomes: StdMutex<Vec<PriceChangeOutcome>>,
    }

    impl OutcomeRecorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                outcomes: StdMutex::new(Vec::new()),
            })
        }

        fn outcomes(&self) -> Vec<PriceChangeOutcome> {
            self.outcomes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventHandler for OutcomeRecorder {
        async fn handle(&self, event: &MarketEvent) -> DomainResult<()> {
            if let MarketEvent::PriceChanged(outcome) = event {
                self.outcomes.lock().unwrap().push(outcome.clone());
            }
            Ok(())
        }
    }

    async fn setup() -> (
        Arc<CanonicalStateStore>,
        Arc<EventTransport>,
        CommandArbitrator,
        Arc<OutcomeRecorder>,
    ) {
        let store = Arc::new(CanonicalStateStore::new());
        let transport = Arc::new(EventTransport::new());
        let recorder = OutcomeRecorder::new();
        transport
            .subscribe(EventKind::PriceChanged, recorder.clone())
            .await;
        let arbitrator = CommandArbitrator::new(
            store.clone(),
            transport.clone(),
            ArbitrationConfig::default(),
        );
        arbitrator.begin_tick(1).await;
        (store, transport, arbitrator, recorder)
    }

    #[tokio::test]
    async fn first_request_wins_second_is_conflict_rejected() {
        let (store, _transport, arbitrator, recorder) = setup().await;
        store
            .initialize(ItemId::new("X"), usd(2000), 100, usd(1000))
            .await
            .unwrap();

        let first = arbitrator
            .handle_request(&request("r1", "X", 2200))
            .await
            .unwrap();
        assert!(first.is_accepted());

        let second = arbitrator
            .handle_request(&request("r2", "X", 1800))
            .await
            .unwrap();
        assert!(matches!(
            second,
            ArbitrationDecision::Rejected {
                reason: RejectionReason::AlreadyAcceptedThisTick,
                ..
            }
        ));

        let state = store.get(&ItemId::new("X")).await.unwrap();
        assert_eq!(state.price, usd(2200));
        assert_eq!(state.version, 2);
        assert_eq!(recorder.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn below_minimum_price_is_rejected_and_item_stays_absent() {
        let (store, _transport, arbitrator, _recorder) = setup().await;

        let decision = arbitrator
            .handle_request(&request("r1", "new-item", 50))
            .await
            .unwrap();
        assert!(matches!(
            decision,
            ArbitrationDecision::Rejected {
                reason: RejectionReason::PriceOutOfBounds { .. },
                ..
            }
        ));
        assert!(store.get(&ItemId::new("new-item")).await.is_none());
    }

    #[tokio::test]
    async fn excessive_magnitude_is_rejected() {
        let (store, _transport, arbitrator, _recorder) = setup().await;
        store
            .initialize(ItemId::new("Y"), usd(2000), 10, usd(1000))
            .await
            .unwrap();

        // $20.00 -> $35.00 is +75%, above the 50% cap.
        let decision = arbitrator
            .handle_request(&request("r1", "Y", 3500))
            .await
            .unwrap();
        assert!(matches!(
            decision,
            ArbitrationDecision::Rejected {
                reason: RejectionReason::ExcessiveChange { .. },
                ..
            }
        ));
        assert_eq!(store.price(&ItemId::new("Y")).await, Some(usd(2000)));
    }

    #[tokio::test]
    async fn duplicate_request_id_is_rejected_without_reapplying() {
        let (store, _transport, arbitrator, recorder) = setup().await;
        store
            .initialize(ItemId::new("W"), usd(2000), 10, usd(1000))
            .await
            .unwrap();

        let req = request("same-id", "W", 2100);
        let first = arbitrator.handle_request(&req).await.unwrap();
        assert!(first.is_accepted());

        let second = arbitrator.handle_request(&req).await.unwrap();
        assert!(matches!(
            second,
            ArbitrationDecision::Rejected {
                reason: RejectionReason::DuplicateRequest,
                ..
            }
        ));

        // Exactly one applied mutation: version went 1 -> 2.
        assert_eq!(store.get(&ItemId::new("W")).await.unwrap().version, 2);
        assert_eq!(recorder.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn new_item_skips_magnitude_check_and_is_created() {
        let (store, _transport, arbitrator, _recorder) = setup().await;

        let decision = arbitrator
            .handle_request(&request("r1", "fresh", 5000))
            .await
            .unwrap();
        assert!(decision.is_accepted());

        let state = store.get(&ItemId::new("fresh")).await.unwrap();
        assert_eq!(state.price, usd(5000));
        assert_eq!(state.version, 1);
        assert_eq!(state.inventory, 0);

        if let ArbitrationDecision::Accepted(outcome) = decision {
            assert!(outcome.previous_price.is_none());
        }
    }

    #[tokio::test]
    async fn accepted_request_inherits_inventory_stub() {
        let (store, _transport, arbitrator, _recorder) = setup().await;

        // An inventory-only writer left a stub.
        let mut stub = ProductState::stub(ItemId::new("stubbed"), Currency::Usd);
        stub.apply_inventory(40);
        store.set(stub).await;

        let decision = arbitrator
            .handle_request(&request("r1", "stubbed", 2500))
            .await
            .unwrap();
        assert!(decision.is_accepted());

        let state = store.get(&ItemId::new("stubbed")).await.unwrap();
        assert_eq!(state.inventory, 40);
        assert_eq!(state.version, 1);
        assert_eq!(state.price, usd(2500));
    }

    #[tokio::test]
    async fn tick_reset_releases_claims_and_request_ids() {
        let (_store, _transport, arbitrator, _recorder) = setup().await;

        let req = request("r1", "Z", 2000);
        assert!(arbitrator.handle_request(&req).await.unwrap().is_accepted());

        arbitrator.begin_tick(2).await;
        assert_eq!(arbitrator.current_tick().await, 2);

        // Same id and same item are both fresh in the new tick.
        let decision = arbitrator
            .handle_request(&request("r1", "Z", 2100))
            .await
            .unwrap();
        assert!(decision.is_accepted());
    }

    #[tokio::test]
    async fn stats_count_processed_rejected_and_conflicts() {
        let (store, _transport, arbitrator, _recorder) = setup().await;
        store
            .initialize(ItemId::new("X"), usd(2000), 10, usd(1000))
            .await
            .unwrap();

        arbitrator
            .handle_request(&request("r1", "X", 2100))
            .await
            .unwrap();
        arbitrator
            .handle_request(&request("r2", "X", 1900))
            .await
            .unwrap();
        arbitrator
            .handle_request(&request("r3", "X", 1))
            .await
            .unwrap();

        let stats = arbitrator.stats().await;
        assert_eq!(stats.commands_processed, 3);
        assert_eq!(stats.commands_rejected, 2);
        assert_eq!(stats.conflicts_arbitrated, 1);
    }

    #[tokio::test]
    async fn currency_mismatch_is_a_fault_not_a_rejection() {
        let (_store, _transport, arbitrator, _recorder) = setup().await;

        let mut req = request("r1", "X", 2000);
        req.new_price = Money::from_minor_units(2000, Currency::Eur);

        let result = arbitrator.handle_request(&req).await;
        assert!(matches!(
            result,
            Err(DomainError::CurrencyMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn boundary_prices_are_accepted() {
        let (_store, _transport, arbitrator, _recorder) = setup().await;

        // Exactly at min and max bounds (different items).
        let at_min = arbitrator
            .handle_request(&request("r1", "min-item", 100))
            .await
            .unwrap();
        assert!(at_min.is_accepted());

        let at_max = arbitrator
            .handle_request(&request("r2", "max-item", 1_000_000))
            .await
            .unwrap();
        assert!(at_max.is_accepted());
    }

    #[tokio::test]
    async fn magnitude_at_exact_cap_is_accepted() {
        let (store, _transport, arbitrator, _recorder) = setup().await;
        store
            .initialize(ItemId::new("cap"), usd(2000), 10, usd(1000))
            .await
            .unwrap();

        // Exactly +50%.
        let decision = arbitrator
            .handle_request(&request("r1", "cap", 3000))
            .await
            .unwrap();
        assert!(decision.is_accepted());
    }
}
