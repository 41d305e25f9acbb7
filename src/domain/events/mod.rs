//! # Events
//!
//! The closed event vocabulary of the kernel.

pub mod market_event;

pub use market_event::{
    CompetitorPriceSample, EventKind, InventoryChangeOutcome, MarketEvent, PriceChangeOutcome,
    PriceChangeRequest, SaleOutcome, TickSignal, INVENTORY_REASON_RESTOCK, INVENTORY_REASON_SALE,
};
