//! # Domain Layer
//!
//! Value objects, entities, events, and domain errors. No I/O here.

pub mod entities;
pub mod errors;
pub mod events;
pub mod value_objects;
