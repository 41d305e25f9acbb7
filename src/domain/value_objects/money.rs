//! # Money
//!
//! Currency-tagged decimal money with checked arithmetic.
//!
//! Money is never represented as a binary float. Amounts are
//! [`rust_decimal::Decimal`] values serialized as decimal strings, tagged
//! with an explicit [`Currency`] code. All arithmetic is checked; mixing
//! currencies or overflowing is a [`DomainError`] fault, not a silent wrap.
//!
//! # Examples
//!
//! ```
//! use market_kernel::domain::value_objects::money::{Currency, Money};
//!
//! let price = Money::from_minor_units(2000, Currency::Usd);
//! assert_eq!(price.to_string(), "20.00 USD");
//!
//! let revenue = price.checked_mul_units(3).unwrap();
//! assert_eq!(revenue, Money::from_minor_units(6000, Currency::Usd));
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// ISO-4217 currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// United States dollar.
    Usd,
    /// Euro.
    Eur,
    /// Pound sterling.
    Gbp,
}

impl Currency {
    /// Returns the ISO-4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// An immutable currency-tagged monetary amount.
///
/// Equality compares both amount and currency. Ordering is only defined
/// between amounts of the same currency; comparing across currencies
/// returns `None` from [`PartialOrd`], and the checked helpers return a
/// [`DomainError::CurrencyMismatch`] fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Decimal amount in major units (e.g. dollars), serialized as a string.
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
    /// The currency this amount is denominated in.
    currency: Currency,
}

impl Money {
    /// Creates money from a decimal amount in major units.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates money from integer minor units (cents for USD/EUR/GBP).
    #[must_use]
    pub fn from_minor_units(minor_units: i64, currency: Currency) -> Self {
        Self {
            amount: Decimal::new(minor_units, 2),
            currency,
        }
    }

    /// Returns a zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns the decimal amount in major units.
    #[inline]
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency.
    #[inline]
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is exactly zero.
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is negative.
    #[inline]
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Fails with a currency mismatch fault unless `other` uses the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::CurrencyMismatch`] if the currencies differ.
    pub fn ensure_same_currency(&self, other: &Self) -> DomainResult<()> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(DomainError::currency_mismatch(
                self.currency.code(),
                other.currency.code(),
            ))
        }
    }

    /// Checked addition.
    ///
    /// # Errors
    ///
    /// Returns a fault on currency mismatch or overflow.
    pub fn checked_add(&self, other: &Self) -> DomainResult<Self> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(DomainError::overflow("add"))?;
        Ok(Self::new(amount, self.currency))
    }

    /// Checked subtraction.
    ///
    /// # Errors
    ///
    /// Returns a fault on currency mismatch or overflow.
    pub fn checked_sub(&self, other: &Self) -> DomainResult<Self> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(DomainError::overflow("sub"))?;
        Ok(Self::new(amount, self.currency))
    }

    /// Checked multiplication by a unit count (e.g. units sold).
    ///
    /// # Errors
    ///
    /// Returns a fault on overflow.
    pub fn checked_mul_units(&self, units: u64) -> DomainResult<Self> {
        let amount = self
            .amount
            .checked_mul(Decimal::from(units))
            .ok_or(DomainError::overflow("mul"))?;
        Ok(Self::new(amount, self.currency))
    }

    /// Checked multiplication by a decimal fraction (e.g. a fee rate),
    /// rounded to two decimal places.
    ///
    /// # Errors
    ///
    /// Returns a fault on overflow.
    pub fn checked_mul_fraction(&self, fraction: Decimal) -> DomainResult<Self> {
        let amount = self
            .amount
            .checked_mul(fraction)
            .ok_or(DomainError::overflow("mul"))?;
        Ok(Self::new(amount.round_dp(2), self.currency))
    }

    /// Returns `self / other` as a bare decimal ratio.
    ///
    /// # Errors
    ///
    /// Returns a fault on currency mismatch, division by zero, or overflow.
    pub fn checked_ratio(&self, other: &Self) -> DomainResult<Decimal> {
        self.ensure_same_currency(other)?;
        if other.amount.is_zero() {
            return Err(DomainError::DivisionByZero);
        }
        self.amount
            .checked_div(other.amount)
            .ok_or(DomainError::overflow("div"))
    }

    /// Returns the smaller of two same-currency amounts.
    ///
    /// # Errors
    ///
    /// Returns a fault on currency mismatch.
    pub fn checked_min(&self, other: &Self) -> DomainResult<Self> {
        self.ensure_same_currency(other)?;
        Ok(if self.amount <= other.amount {
            *self
        } else {
            *other
        })
    }

    /// Lossy conversion to `f64` for model inputs (never for accounting).
    #[must_use]
    pub fn to_f64_lossy(&self) -> f64 {
        self.amount.to_f64().unwrap_or(0.0)
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency == other.currency {
            self.amount.partial_cmp(&other.amount)
        } else {
            None
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount.round_dp(2), self.currency)
    }
}
