//! # Infrastructure Layer
//!
//! Event routing, canonical state storage, competitor observation cache,
//! and snapshot persistence.

pub mod competitors;
pub mod persistence;
pub mod state;
pub mod transport;
