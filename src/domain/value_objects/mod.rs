//! # Value Objects
//!
//! Immutable types with validation and domain semantics.
//!
//! ## Identity Types
//!
//! - [`ItemId`], [`AgentId`], [`RequestId`]: string-based identifiers
//! - [`EventId`], [`SnapshotId`]: generated identifiers
//!
//! ## Numeric Types
//!
//! - [`Money`]: currency-tagged decimal amount with checked arithmetic
//! - [`Currency`]: ISO-4217 currency code
//!
//! ## Time
//!
//! - [`Timestamp`]: UTC wall-clock time, ISO-8601 on the wire

pub mod ids;
pub mod money;
pub mod timestamp;

pub use ids::{AgentId, EventId, ItemId, RequestId, SnapshotId};
pub use money::{Currency, Money};
pub use timestamp::Timestamp;
