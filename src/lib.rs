//! # Market Kernel
//!
//! Authoritative state kernel for a multi-agent market simulation.
//!
//! The kernel is the single writer of canonical market state. Agents never
//! mutate state directly: they publish commands and observations on the
//! event transport, and the kernel arbitrates, applies, and republishes
//! authoritative outcomes.
//!
//! ## Architecture
//!
//! - [`domain`]: Value objects (money, ids, timestamps), the canonical
//!   [`ProductState`](domain::entities::ProductState) entity, and the
//!   closed [`MarketEvent`](domain::events::MarketEvent) vocabulary
//! - [`infrastructure`]: The in-process event transport, the canonical
//!   state store, the competitor price book, and snapshot persistence
//! - [`application`]: Command arbitration, demand models, market
//!   settlement, and the [`MarketKernel`](application::MarketKernel)
//!   facade that wires everything together
//!
//! ## Example
//!
//! ```no_run
//! use market_kernel::application::services::{ElasticityDemandModel, SettlementConfig};
//! use market_kernel::application::services::arbitration::ArbitrationConfig;
//! use market_kernel::application::{KernelConfig, MarketKernel};
//! use market_kernel::domain::events::PriceChangeRequest;
//! use market_kernel::domain::value_objects::{AgentId, Currency, ItemId, Money, RequestId};
//! use market_kernel::infrastructure::competitors::CompetitorPriceBook;
//! use market_kernel::infrastructure::persistence::InMemorySnapshotStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let book = Arc::new(CompetitorPriceBook::default());
//! let demand = Arc::new(ElasticityDemandModel::new(100, 1.5, book.clone()));
//! let kernel = MarketKernel::new(
//!     KernelConfig::default(),
//!     ArbitrationConfig::default(),
//!     SettlementConfig::default(),
//!     demand,
//!     Arc::new(InMemorySnapshotStore::new()),
//!     book,
//! )
//! .await;
//!
//! let item = ItemId::new("B0EXAMPLE1");
//! kernel
//!     .initialize_item(
//!         item.clone(),
//!         Money::from_minor_units(2000, Currency::Usd),
//!         100,
//!         Money::from_minor_units(1200, Currency::Usd),
//!     )
//!     .await?;
//!
//! kernel.advance_tick(1).await;
//! kernel
//!     .submit(PriceChangeRequest::new(
//!         RequestId::new("req-1"),
//!         AgentId::new("pricer"),
//!         item.clone(),
//!         Money::from_minor_units(2150, Currency::Usd),
//!         1,
//!     ))
//!     .await;
//!
//! let outcomes = kernel.settle_all().await;
//! println!("settled {} items", outcomes.len());
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{KernelConfig, KernelStats, MarketKernel};
pub use domain::errors::{DomainError, DomainResult};
pub use domain::events::{EventKind, MarketEvent};
pub use infrastructure::transport::{EventHandler, EventTransport};
