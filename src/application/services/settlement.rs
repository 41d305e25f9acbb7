//! # Market Settlement
//!
//! Turns canonical price into realized sales and inventory depletion.
//!
//! On each tick, per item, the engine asks its [`DemandModel`] for demanded
//! units, bounds them by available inventory, prices the sale, and emits a
//! [`SaleOutcome`] followed by an [`InventoryChangeOutcome`] with reason
//! `"sale"`. The engine never mutates the canonical store itself — the
//! inventory event closes the loop through the dedicated inventory-update
//! handler, preserving the single-writer discipline.

use crate::application::services::demand::DemandModel;
use crate::domain::errors::DomainResult;
use crate::domain::events::{
    InventoryChangeOutcome, MarketEvent, SaleOutcome, INVENTORY_REASON_SALE,
};
use crate::domain::value_objects::ItemId;
use crate::infrastructure::state::CanonicalStateStore;
use crate::infrastructure::transport::EventTransport;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// Policy knobs for settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementConfig {
    /// Marketplace fee charged as a fraction of revenue.
    pub fee_rate: Decimal,
}

impl Default for SettlementConfig {
    /// 15% marketplace fee.
    fn default() -> Self {
        Self {
            fee_rate: Decimal::new(15, 2),
        }
    }
}

/// Per-tick demand/settlement pipeline for one store and transport.
pub struct MarketSettlementEngine {
    store: Arc<CanonicalStateStore>,
    transport: Arc<EventTransport>,
    demand_model: Arc<dyn DemandModel>,
    config: SettlementConfig,
}

impl MarketSettlementEngine {
    /// Creates an engine with the given demand model.
    #[must_use]
    pub fn new(
        store: Arc<CanonicalStateStore>,
        transport: Arc<EventTransport>,
        demand_model: Arc<dyn DemandModel>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            store,
            transport,
            demand_model,
            config,
        }
    }

    /// Returns the name of the demand model in use.
    #[must_use]
    pub fn demand_model_name(&self) -> &'static str {
        self.demand_model.name()
    }

    /// Settles one item for the current tick.
    ///
    /// Returns `Ok(None)` when the item has no canonical state (or only an
    /// inventory stub without an accepted price): upstream initialization
    /// may still be in flight, so this is a tolerated no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns a fault on arithmetic or currency violations. Faults stop
    /// only this item's settlement.
    pub async fn settle(&self, item_id: &ItemId) -> DomainResult<Option<SaleOutcome>> {
        let Some(state) = self.store.get(item_id).await else {
            tracing::debug!(item = %item_id, "settlement skipped, no canonical state");
            return Ok(None);
        };
        if !state.has_price() {
            tracing::debug!(item = %item_id, "settlement skipped, no accepted price yet");
            return Ok(None);
        }

        let units_demanded = self.demand_model.demand(&state).await?;
        let units_sold = units_demanded.min(state.inventory);

        let revenue = state.price.checked_mul_units(units_sold)?;
        let fees = revenue.checked_mul_fraction(self.config.fee_rate)?;
        let cost = state.cost_basis.checked_mul_units(units_sold)?;
        let profit = revenue.checked_sub(&fees)?.checked_sub(&cost)?;

        let trust_score = state
            .metadata_f64("trust_score")
            .map_or_else(|| estimate_trust(units_demanded), |v| v.clamp(0.0, 1.0));
        let rank_proxy = state
            .metadata_f64("sales_rank")
            .map_or_else(|| estimate_rank(units_demanded), |v| v.max(1.0) as u32);
        let conversion_rate = if units_demanded > 0 {
            units_sold as f64 / units_demanded as f64
        } else {
            0.0
        };

        let outcome = SaleOutcome {
            item_id: item_id.clone(),
            units_demanded,
            units_sold,
            unit_price: state.price,
            revenue,
            fees,
            profit,
            trust_score,
            rank_proxy,
            conversion_rate,
        };

        let inventory_change = InventoryChangeOutcome {
            item_id: item_id.clone(),
            new_quantity: state.inventory - units_sold,
            previous_quantity: state.inventory,
            reason: INVENTORY_REASON_SALE.to_string(),
            agent_id: None,
        };

        // Always sale outcome first, then the inventory delta.
        self.transport
            .publish(&MarketEvent::SaleSettled(outcome.clone()))
            .await;
        self.transport
            .publish(&MarketEvent::InventoryChanged(inventory_change))
            .await;

        Ok(Some(outcome))
    }
}

impl fmt::Debug for MarketSettlementEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketSettlementEngine")
            .field("config", &self.config)
            .field("demand_model", &self.demand_model.name())
            .finish_non_exhaustive()
    }
}

/// Trust heuristic used when the item carries no `trust_score` metadata:
/// demand saturating toward 1.0.
fn estimate_trust(demand: u64) -> f64 {
    let d = demand as f64;
    (d / (d + 25.0)).clamp(0.0, 1.0)
}

/// Rank heuristic used when the item carries no `sales_rank` metadata:
/// inverse of demand, 1 is best.
fn estimate_rank(demand: u64) -> u32 {
    let rank = 100_000 / (demand + 1);
    rank.max(1) as u32
}
