//! # Product State
//!
//! The canonical record for one tradable item.
//!
//! A [`ProductState`] is the single source of truth for an item's price,
//! inventory, and cost basis. It is mutated only by the command arbitrator
//! (price fields) and the inventory-update handler (quantity); every other
//! component reads a defensive copy.

use crate::domain::value_objects::{AgentId, Currency, ItemId, Money, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lower clamp for marketing visibility.
pub const VISIBILITY_MIN: f64 = 0.1;
/// Upper clamp for marketing visibility.
pub const VISIBILITY_MAX: f64 = 5.0;
/// Lower clamp for reputation.
pub const REPUTATION_MIN: f64 = 0.0;
/// Upper clamp for reputation.
pub const REPUTATION_MAX: f64 = 1.0;

/// Canonical truth for one item.
///
/// The `version` counter increases by exactly one on every accepted price
/// mutation and never decreases. A state with `version == 0` is a *stub*
/// created by an inventory-only writer before any price was accepted; it
/// carries no meaningful price yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductState {
    /// The item this state belongs to.
    pub item_id: ItemId,
    /// Current canonical price.
    pub price: Money,
    /// Units on hand. Never negative by construction.
    pub inventory: u64,
    /// Per-unit acquisition cost.
    pub cost_basis: Money,
    /// Monotonic mutation counter; bumped on every accepted price change.
    pub version: u64,
    /// Agent whose request was last accepted, if any.
    pub last_writer: Option<AgentId>,
    /// Request id of the last accepted price change, if any.
    pub last_request: Option<RequestId>,
    /// Wall-clock time of the last mutation.
    pub updated_at: Timestamp,
    /// Marketing visibility multiplier, clamped to `[0.1, 5.0]`.
    pub visibility: f64,
    /// Reputation score, clamped to `[0.0, 1.0]`.
    pub reputation: f64,
    /// Free-form metadata (review scores, sales rank, shipping info...).
    pub metadata: HashMap<String, String>,
}

impl ProductState {
    /// Creates a fully initialized state at version 1.
    #[must_use]
    pub fn new(item_id: ItemId, price: Money, inventory: u64, cost_basis: Money) -> Self {
        Self {
            item_id,
            price,
            inventory,
            cost_basis,
            version: 1,
            last_writer: None,
            last_request: None,
            updated_at: Timestamp::now(),
            visibility: 1.0,
            reputation: 0.5,
            metadata: HashMap::new(),
        }
    }

    /// Creates a version-0 stub for an item that has inventory or cost data
    /// but no accepted price yet. The first accepted price change upgrades
    /// the stub to version 1.
    #[must_use]
    pub fn stub(item_id: ItemId, currency: Currency) -> Self {
        Self {
            item_id,
            price: Money::zero(currency),
            inventory: 0,
            cost_basis: Money::zero(currency),
            version: 0,
            last_writer: None,
            last_request: None,
            updated_at: Timestamp::now(),
            visibility: 1.0,
            reputation: 0.5,
            metadata: HashMap::new(),
        }
    }

    /// Returns true if this state carries an accepted price (not a stub).
    #[inline]
    #[must_use]
    pub const fn has_price(&self) -> bool {
        self.version > 0
    }

    /// Applies an accepted price change: sets the new price, bumps the
    /// version, and records the acting agent and request.
    pub fn apply_price_change(&mut self, new_price: Money, agent: AgentId, request: RequestId) {
        self.price = new_price;
        self.version += 1;
        self.last_writer = Some(agent);
        self.last_request = Some(request);
        self.updated_at = Timestamp::now();
    }

    /// Applies an authoritative inventory quantity.
    pub fn apply_inventory(&mut self, new_quantity: u64) {
        self.inventory = new_quantity;
        self.updated_at = Timestamp::now();
    }

    /// Sets visibility, clamped to its valid range. Returns the applied value.
    pub fn set_visibility(&mut self, visibility: f64) -> f64 {
        self.visibility = visibility.clamp(VISIBILITY_MIN, VISIBILITY_MAX);
        self.visibility
    }

    /// Sets reputation, clamped to its valid range. Returns the applied value.
    pub fn set_reputation(&mut self, reputation: f64) -> f64 {
        self.reputation = reputation.clamp(REPUTATION_MIN, REPUTATION_MAX);
        self.reputation
    }

    /// Reads a metadata value parsed as `f64`, if present and parseable.
    #[must_use]
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(|v| v.parse().ok())
    }
}
