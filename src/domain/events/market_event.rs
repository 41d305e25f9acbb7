//! # Market Events
//!
//! The closed set of events routed by the transport.
//!
//! Event dispatch is by the [`EventKind`] discriminant of a tagged enum,
//! not by type name strings, so an unhandled kind is a compile error in an
//! exhaustive match rather than a silent no-op.

use crate::domain::value_objects::{AgentId, ItemId, Money, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason tag used on inventory changes produced by settlement.
pub const INVENTORY_REASON_SALE: &str = "sale";
/// Reason tag used on inventory changes produced by restocking.
pub const INVENTORY_REASON_RESTOCK: &str = "restock";

/// Discriminant for event routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Discrete time-step boundary.
    Tick,
    /// An agent asked for a price change.
    PriceChangeRequested,
    /// A price change was accepted and applied.
    PriceChanged,
    /// Authoritative inventory quantity changed.
    InventoryChanged,
    /// One item's demand was settled for one tick.
    SaleSettled,
    /// Competitor prices were observed for an item.
    CompetitorPricesObserved,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tick => write!(f, "TICK"),
            Self::PriceChangeRequested => write!(f, "PRICE_CHANGE_REQUESTED"),
            Self::PriceChanged => write!(f, "PRICE_CHANGED"),
            Self::InventoryChanged => write!(f, "INVENTORY_CHANGED"),
            Self::SaleSettled => write!(f, "SALE_SETTLED"),
            Self::CompetitorPricesObserved => write!(f, "COMPETITOR_PRICES_OBSERVED"),
        }
    }
}

/// Discrete time boundary published by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSignal {
    /// Tick number, strictly increasing.
    pub tick: u64,
    /// Wall-clock time the tick was issued.
    pub timestamp: Timestamp,
}

impl TickSignal {
    /// Creates a tick signal stamped with the current time.
    #[must_use]
    pub fn now(tick: u64) -> Self {
        Self {
            tick,
            timestamp: Timestamp::now(),
        }
    }
}

/// An agent's desire to move an item's price.
///
/// Consumed exactly once by the arbitrator. `submitted_at` is audit-only;
/// it is never the ordering key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeRequest {
    /// Globally unique request id.
    pub request_id: RequestId,
    /// The agent submitting the request.
    pub agent_id: AgentId,
    /// The item whose price should move.
    pub item_id: ItemId,
    /// The requested price.
    pub new_price: Money,
    /// The tick the agent submitted in.
    pub submission_tick: u64,
    /// Audit timestamp; not used for arbitration ordering.
    pub submitted_at: Timestamp,
}

impl PriceChangeRequest {
    /// Creates a request stamped with the current time.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        agent_id: AgentId,
        item_id: ItemId,
        new_price: Money,
        submission_tick: u64,
    ) -> Self {
        Self {
            request_id,
            agent_id,
            item_id,
            new_price,
            submission_tick,
            submitted_at: Timestamp::now(),
        }
    }
}

/// Result of an accepted arbitration, emitted exactly once per winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeOutcome {
    /// The item whose price moved.
    pub item_id: ItemId,
    /// The applied price.
    pub new_price: Money,
    /// The previous price, absent when the item was newly created.
    pub previous_price: Option<Money>,
    /// The winning agent.
    pub agent_id: AgentId,
    /// The winning request.
    pub request_id: RequestId,
    /// Human-readable arbitration notes.
    pub notes: String,
}

/// Authoritative inventory delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryChangeOutcome {
    /// The item whose inventory changed.
    pub item_id: ItemId,
    /// Quantity after the change; clamped to `>= 0` by construction.
    pub new_quantity: u64,
    /// Quantity before the change.
    pub previous_quantity: u64,
    /// Why the change happened (`"sale"`, `"restock"`, ...).
    pub reason: String,
    /// Acting agent, when one is responsible.
    pub agent_id: Option<AgentId>,
}

/// One settlement result for one item on one tick. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleOutcome {
    /// The settled item.
    pub item_id: ItemId,
    /// Units the demand model asked for.
    pub units_demanded: u64,
    /// Units actually sold, bounded by available inventory.
    pub units_sold: u64,
    /// Canonical unit price at settlement time.
    pub unit_price: Money,
    /// `unit_price * units_sold`.
    pub revenue: Money,
    /// Marketplace fees charged on the revenue.
    pub fees: Money,
    /// `revenue - fees - cost_basis * units_sold`.
    pub profit: Money,
    /// Derived trust score in `[0.0, 1.0]`.
    pub trust_score: f64,
    /// Best-seller-rank proxy (lower is better).
    pub rank_proxy: u32,
    /// `units_sold / units_demanded`, zero when nothing was demanded.
    pub conversion_rate: f64,
}

/// Competitor prices observed for one item, broadcast by an external
/// collaborator. Read-only to this kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorPriceSample {
    /// The observed item.
    pub item_id: ItemId,
    /// The observed competitor prices.
    pub prices: Vec<Money>,
    /// When the observation was taken.
    pub observed_at: Timestamp,
}

/// The closed tagged union of everything the transport routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum MarketEvent {
    /// Discrete time boundary.
    Tick(TickSignal),
    /// Price-change request awaiting arbitration.
    PriceChangeRequested(PriceChangeRequest),
    /// Accepted arbitration outcome.
    PriceChanged(PriceChangeOutcome),
    /// Authoritative inventory delta.
    InventoryChanged(InventoryChangeOutcome),
    /// Settlement result.
    SaleSettled(SaleOutcome),
    /// Competitor price observation.
    CompetitorPricesObserved(CompetitorPriceSample),
}

impl MarketEvent {
    /// Returns the routing discriminant of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Tick(_) => EventKind::Tick,
            Self::PriceChangeRequested(_) => EventKind::PriceChangeRequested,
            Self::PriceChanged(_) => EventKind::PriceChanged,
            Self::InventoryChanged(_) => EventKind::InventoryChanged,
            Self::SaleSettled(_) => EventKind::SaleSettled,
            Self::CompetitorPricesObserved(_) => EventKind::CompetitorPricesObserved,
        }
    }

    /// Returns the item this event concerns, when it concerns one.
    #[must_use]
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            Self::Tick(_) => None,
            Self::PriceChangeRequested(e) => Some(&e.item_id),
            Self::PriceChanged(e) => Some(&e.item_id),
            Self::InventoryChanged(e) => Some(&e.item_id),
            Self::SaleSettled(e) => Some(&e.item_id),
            Self::CompetitorPricesObserved(e) => Some(&e.item_id),
        }
    }
}
