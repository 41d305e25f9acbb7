//! # Competitor Price Book
//!
//! Bounded rolling windows of observed competitor prices per item.
//!
//! Updated from [`CompetitorPricesObserved`](crate::domain::events::MarketEvent)
//! broadcasts; read-only to the rest of the kernel. The rolling average
//! feeds the elasticity model's reference price.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{ItemId, Money};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Default number of recent observations retained per item.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Rolling cache of competitor price observations.
#[derive(Debug)]
pub struct CompetitorPriceBook {
    windows: RwLock<HashMap<ItemId, VecDeque<Money>>>,
    window_size: usize,
}

impl CompetitorPriceBook {
    /// Creates a book keeping at most `window_size` observations per item.
    /// A zero size falls back to the default.
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            window_size: if window_size == 0 {
                DEFAULT_WINDOW_SIZE
            } else {
                window_size
            },
        }
    }

    /// Records a batch of observed prices for one item, evicting the
    /// oldest observations beyond the window bound.
    pub async fn record(&self, item_id: &ItemId, prices: &[Money]) {
        if prices.is_empty() {
            return;
        }
        let mut windows = self.windows.write().await;
        let window = windows.entry(item_id.clone()).or_default();
        for price in prices {
            window.push_back(*price);
            if window.len() > self.window_size {
                window.pop_front();
            }
        }
    }

    /// Returns the rolling average of the window, or `None` if nothing has
    /// been observed for the item.
    ///
    /// # Errors
    ///
    /// Returns a fault if the window mixes currencies or the sum overflows.
    pub async fn rolling_average(&self, item_id: &ItemId) -> DomainResult<Option<Money>> {
        let windows = self.windows.read().await;
        let Some(window) = windows.get(item_id) else {
            return Ok(None);
        };
        let Some(first) = window.front() else {
            return Ok(None);
        };

        let mut sum = Money::zero(first.currency());
        for price in window {
            sum = sum.checked_add(price)?;
        }
        let count = Decimal::from(window.len() as u64);
        let average = sum
            .amount()
            .checked_div(count)
            .ok_or(DomainError::DivisionByZero)?;
        Ok(Some(Money::new(average.round_dp(2), first.currency())))
    }

    /// Returns the number of retained observations for an item.
    pub async fn observation_count(&self, item_id: &ItemId) -> usize {
        let windows = self.windows.read().await;
        windows.get(item_id).map_or(0, VecDeque::len)
    }

    /// Drops all observations. Test isolation and simulation restart only.
    pub async fn reset(&self) {
        let mut windows = self.windows.write().await;
        windows.clear();
    }
}

impl Default for CompetitorPriceBook {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}
