//! # Entities
//!
//! Mutable domain objects with identity.

pub mod product_state;

pub use product_state::ProductState;
