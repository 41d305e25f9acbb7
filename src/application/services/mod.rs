//! # Application Services
//!
//! Services that orchestrate domain logic over the infrastructure:
//! - [`CommandArbitrator`]: Per-tick price-change conflict resolution
//! - [`DemandModel`]: Pluggable demand estimation strategies
//! - [`MarketSettlementEngine`]: Per-tick sale settlement

pub mod arbitration;
pub mod demand;
pub mod settlement;

pub use arbitration::{
    ArbitrationConfig, ArbitrationDecision, ArbitrationStats, CommandArbitrator, RejectionReason,
};
pub use demand::{AgentBasedDemandModel, CustomerProfile, DemandModel, ElasticityDemandModel};
pub use settlement::{MarketSettlementEngine, SettlementConfig};
