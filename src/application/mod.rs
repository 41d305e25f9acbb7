//! # Application Layer
//!
//! Orchestration of the domain over the infrastructure:
//! - [`MarketKernel`]: The facade composing transport, store, arbitration,
//!   settlement, and persistence into one simulation kernel
//! - [`services`]: The individual services the kernel composes

pub mod kernel;
pub mod services;

pub use kernel::{KernelConfig, KernelStats, MarketKernel};
