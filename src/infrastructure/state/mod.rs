//! # Canonical State Store
//!
//! The single source of truth for every item's price, inventory, and cost
//! basis.
//!
//! The store is a passive map guarded by its callers' single-writer
//! discipline: only the command arbitrator mutates price fields and only
//! the inventory-update handler mutates quantities. Every read hands out a
//! defensive copy. The store itself carries no arbitration policy.

use crate::domain::entities::ProductState;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{ItemId, Money};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Passive map from item id to [`ProductState`].
#[derive(Debug, Default)]
pub struct CanonicalStateStore {
    items: RwLock<HashMap<ItemId, ProductState>>,
}

impl CanonicalStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates state for a new item at version 1.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::ItemAlreadyExists`] if the item (including a
    /// stub) is already present; existing state is never silently
    /// overwritten.
    pub async fn initialize(
        &self,
        item_id: ItemId,
        price: Money,
        inventory: u64,
        cost_basis: Money,
    ) -> DomainResult<()> {
        price.ensure_same_currency(&cost_basis)?;
        let mut items = self.items.write().await;
        if items.contains_key(&item_id) {
            return Err(DomainError::ItemAlreadyExists(item_id.to_string()));
        }
        let state = ProductState::new(item_id.clone(), price, inventory, cost_basis);
        items.insert(item_id, state);
        Ok(())
    }

    /// Returns a defensive copy of one item's state.
    pub async fn get(&self, item_id: &ItemId) -> Option<ProductState> {
        let items = self.items.read().await;
        items.get(item_id).cloned()
    }

    /// Writes an item's state wholesale. Callers own the single-writer
    /// discipline.
    pub async fn set(&self, state: ProductState) {
        let mut items = self.items.write().await;
        items.insert(state.item_id.clone(), state);
    }

    /// Returns a defensive copy of the whole map.
    pub async fn list_all(&self) -> HashMap<ItemId, ProductState> {
        let items = self.items.read().await;
        items.clone()
    }

    /// Returns the item's current price, if the item exists.
    pub async fn price(&self, item_id: &ItemId) -> Option<Money> {
        let items = self.items.read().await;
        items.get(item_id).map(|s| s.price)
    }

    /// Returns the item's inventory quantity, if the item exists.
    pub async fn inventory(&self, item_id: &ItemId) -> Option<u64> {
        let items = self.items.read().await;
        items.get(item_id).map(|s| s.inventory)
    }

    /// Returns the item's cost basis, if the item exists.
    pub async fn cost_basis(&self, item_id: &ItemId) -> Option<Money> {
        let items = self.items.read().await;
        items.get(item_id).map(|s| s.cost_basis)
    }

    /// Sets marketing visibility, clamped to `[0.1, 5.0]`. Returns the
    /// applied value, or `None` if the item is unknown.
    pub async fn set_visibility(&self, item_id: &ItemId, visibility: f64) -> Option<f64> {
        let mut items = self.items.write().await;
        items.get_mut(item_id).map(|s| s.set_visibility(visibility))
    }

    /// Sets reputation, clamped to `[0.0, 1.0]`. Returns the applied
    /// value, or `None` if the item is unknown.
    pub async fn set_reputation(&self, item_id: &ItemId, reputation: f64) -> Option<f64> {
        let mut items = self.items.write().await;
        items.get_mut(item_id).map(|s| s.set_reputation(reputation))
    }

    /// Replaces the whole map, used when restoring a snapshot.
    pub async fn restore(&self, state: HashMap<ItemId, ProductState>) {
        let mut items = self.items.write().await;
        *items = state;
    }

    /// Clears all state. Test isolation and simulation restart only.
    pub async fn reset(&self) {
        let mut items = self.items.write().await;
        items.clear();
    }

    /// Returns the number of tracked items.
    pub async fn len(&self) -> usize {
        let items = self.items.read().await;
        items.len()
    }

    /// Returns true if no items are tracked.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::entities::product_state::{VISIBILITY_MAX, VISIBILITY_MIN};
    use crate::domain::value_objects::Currency;

    fn usd(minor: i64) -> Money {
        Money::from_minor_units(minor, Currency::Usd)
    }

    fn item(id: &str) -> ItemId {
        ItemId::new(id)
    }

    #[tokio::test]
    async fn initialize_and_read_back() {
        let store = CanonicalStateStore::new();
        store
            .initialize(item("B001"), usd(2000), 100, usd(1000))
            .await
            .unwrap();

        assert_eq!(store.price(&item("B001")).await, Some(usd(2000)));
        assert_eq!(store.inventory(&item("B001")).await, Some(100));
        assert_eq!(store.cost_basis(&item("B001")).await, Some(usd(1000)));
        assert_eq!(store.get(&item("B001")).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn initialize_twice_fails_and_preserves_state() {
        let store = CanonicalStateStore::new();
        store
            .initialize(item("B001"), usd(2000), 100, usd(1000))
            .await
            .unwrap();

        let result = store
            .initialize(item("B001"), usd(9999), 1, usd(1))
            .await;
        assert!(matches!(result, Err(DomainError::ItemAlreadyExists(_))));
        assert_eq!(store.price(&item("B001")).await, Some(usd(2000)));
    }

    #[tokio::test]
    async fn initialize_rejects_mixed_currencies() {
        let store = CanonicalStateStore::new();
        let result = store
            .initialize(
                item("B001"),
                usd(2000),
                100,
                Money::from_minor_units(1000, Currency::Eur),
            )
            .await;
        assert!(matches!(result, Err(DomainError::CurrencyMismatch { .. })));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn get_unknown_item_is_none() {
        let store = CanonicalStateStore::new();
        assert!(store.get(&item("missing")).await.is_none());
        assert!(store.price(&item("missing")).await.is_none());
    }

    #[tokio::test]
    async fn list_all_is_a_defensive_copy() {
        let store = CanonicalStateStore::new();
        store
            .initialize(item("B001"), usd(2000), 100, usd(1000))
            .await
            .unwrap();

        let mut copy = store.list_all().await;
        copy.get_mut(&item("B001")).unwrap().inventory = 0;

        // Mutating the copy must not touch canonical state.
        assert_eq!(store.inventory(&item("B001")).await, Some(100));
    }

    #[tokio::test]
    async fn visibility_clamps_to_range() {
        let store = CanonicalStateStore::new();
        store
            .initialize(item("B001"), usd(2000), 100, usd(1000))
            .await
            .unwrap();

        assert_eq!(
            store.set_visibility(&item("B001"), 99.0).await,
            Some(VISIBILITY_MAX)
        );
        assert_eq!(
            store.set_visibility(&item("B001"), -1.0).await,
            Some(VISIBILITY_MIN)
        );
        assert_eq!(store.set_visibility(&item("nope"), 1.0).await, None);
    }

    #[tokio::test]
    async fn reputation_clamps_to_unit_interval() {
        let store = CanonicalStateStore::new();
        store
            .initialize(item("B001"), usd(2000), 100, usd(1000))
            .await
            .unwrap();

        assert_eq!(store.set_reputation(&item("B001"), 2.0).await, Some(1.0));
        assert_eq!(store.set_reputation(&item("B001"), -2.0).await, Some(0.0));
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let store = CanonicalStateStore::new();
        store
            .initialize(item("B001"), usd(2000), 100, usd(1000))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);

        store.reset().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn restore_replaces_the_map() {
        let store = CanonicalStateStore::new();
        store
            .initialize(item("old"), usd(100), 1, usd(50))
            .await
            .unwrap();

        let mut replacement = HashMap::new();
        replacement.insert(
            item("new"),
            ProductState::new(item("new"), usd(2000), 7, usd(900)),
        );
        store.restore(replacement).await;

        assert!(store.get(&item("old")).await.is_none());
        assert_eq!(store.inventory(&item("new")).await, Some(7));
    }
}
