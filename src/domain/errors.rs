//! # Domain Errors
//!
//! Error types for domain-level failures.
//!
//! These are the *fault* class of the kernel's error taxonomy: contract
//! violations such as currency mismatches or arithmetic overflow. They are
//! distinct from arbitration rejections, which are ordinary decision values
//! (see [`ArbitrationDecision`](crate::application::services::arbitration::ArbitrationDecision))
//! and never surface as errors.

use thiserror::Error;

/// Domain-level error.
///
/// Represents a programming or contract fault. Faults propagate to the
/// immediate caller of the offending operation only; they never abort
/// processing of unrelated items in the same tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Two money values with different currencies were combined.
    #[error("currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch {
        /// The currency expected by the operation.
        expected: String,
        /// The currency actually supplied.
        actual: String,
    },

    /// A checked arithmetic operation overflowed.
    #[error("arithmetic overflow during {operation}")]
    ArithmeticOverflow {
        /// The operation that overflowed.
        operation: &'static str,
    },

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// An item was initialized twice.
    #[error("item already exists: {0}")]
    ItemAlreadyExists(String),

    /// Generic validation failure on an input value.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Creates a currency mismatch error.
    #[must_use]
    pub fn currency_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::CurrencyMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an overflow error for the named operation.
    #[must_use]
    pub const fn overflow(operation: &'static str) -> Self {
        Self::ArithmeticOverflow { operation }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
