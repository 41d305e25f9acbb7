//! # Demand Models
//!
//! Two interchangeable ways to turn canonical price into demanded units.
//!
//! - [`ElasticityDemandModel`]: closed-form curve
//!   `demand = round(base * (price / reference) ^ -elasticity)`, with the
//!   reference price derived from competitor observations.
//! - [`AgentBasedDemandModel`]: a deterministic fixed-size sample drawn
//!   from a customer population, where each customer evaluates a utility
//!   function and buys if it clears their threshold and budget.
//!
//! Demand is a unit count, so the curves may use `f64` internally; money
//! itself never leaves `Decimal`.

use crate::domain::entities::ProductState;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{ItemId, Money};
use crate::infrastructure::competitors::CompetitorPriceBook;
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Computes demanded units for one item's canonical state.
#[async_trait]
pub trait DemandModel: Send + Sync {
    /// Returns the number of units demanded at the item's current state.
    ///
    /// # Errors
    ///
    /// Returns a fault on arithmetic or currency violations.
    async fn demand(&self, state: &ProductState) -> DomainResult<u64>;

    /// Model name for logs.
    fn name(&self) -> &'static str;
}

/// Closed-form price-elasticity demand curve.
///
/// The reference price starts at the item's own price on first sight. When
/// competitor observations exist, the reference becomes the *minimum* of
/// the rolling competitor average and the previous reference; otherwise
/// the previous reference carries forward. At `price == reference` the
/// demand equals `base_demand` exactly.
pub struct ElasticityDemandModel {
    base_demand: u64,
    elasticity: f64,
    competitor_book: Arc<CompetitorPriceBook>,
    references: Mutex<HashMap<ItemId, Money>>,
}

impl ElasticityDemandModel {
    /// Creates a model over the given competitor book.
    #[must_use]
    pub fn new(base_demand: u64, elasticity: f64, competitor_book: Arc<CompetitorPriceBook>) -> Self {
        Self {
            base_demand,
            elasticity,
            competitor_book,
            references: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the reference price currently held for an item, if any.
    pub async fn reference_price(&self, item_id: &ItemId) -> Option<Money> {
        let references = self.references.lock().await;
        references.get(item_id).copied()
    }

    async fn resolve_reference(&self, state: &ProductState) -> DomainResult<Money> {
        let mut references = self.references.lock().await;
        let previous = references
            .get(&state.item_id)
            .copied()
            .unwrap_or(state.price);

        let reference = match self.competitor_book.rolling_average(&state.item_id).await? {
            Some(average) => average.checked_min(&previous)?,
            None => previous,
        };
        references.insert(state.item_id.clone(), reference);
        Ok(reference)
    }
}

#[async_trait]
impl DemandModel for ElasticityDemandModel {
    async fn demand(&self, state: &ProductState) -> DomainResult<u64> {
        let reference = self.resolve_reference(state).await?;
        if reference.is_zero() {
            return Err(DomainError::DivisionByZero);
        }
        let ratio = state.price.checked_ratio(&reference)?;
        let ratio_f = ratio
            .to_f64()
            .ok_or(DomainError::overflow("ratio to f64"))?;
        let demand = demand_curve(self.base_demand, ratio_f, self.elasticity);
        Ok(demand)
    }

    fn name(&self) -> &'static str {
        "elasticity"
    }
}

/// `round(base * ratio ^ -elasticity)`, clamped to non-negative.
fn demand_curve(base: u64, price_ratio: f64, elasticity: f64) -> u64 {
    if price_ratio <= 0.0 {
        return 0;
    }
    // ratio == 1.0 must yield base exactly; powf(1, x) == 1 guarantees it.
    let scaled = base as f64 * price_ratio.powf(-elasticity);
    if scaled.is_finite() && scaled > 0.0 {
        scaled.round() as u64
    } else {
        0
    }
}

/// One simulated customer in the population.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerProfile {
    /// How strongly price weighs against the budget, in `[0, 1]`.
    pub price_sensitivity: f64,
    /// Maximum affordable unit price, in major currency units.
    pub budget: f64,
    /// Weight given to review quality, in `[0, 1]`.
    pub quality_preference: f64,
    /// Penalty weight for shipping delay, in `[0, 1]`.
    pub delay_aversion: f64,
    /// Utility level above which the customer purchases.
    pub purchase_threshold: f64,
}

impl CustomerProfile {
    /// Evaluates purchase utility for an item at the given price.
    ///
    /// Utility combines review quality and review-count confidence against
    /// price pressure (relative to budget) and shipping delay.
    #[must_use]
    pub fn utility(&self, price: f64, review_score: f64, shipping_days: f64, review_count: f64) -> f64 {
        let quality = self.quality_preference * (review_score / 5.0);
        let confidence = 0.1 * ((1.0 + review_count).ln() / (1.0 + 1000.0_f64).ln());
        let price_pressure = if self.budget > 0.0 {
            self.price_sensitivity * (price / self.budget)
        } else {
            f64::INFINITY
        };
        let delay_penalty = self.delay_aversion * (shipping_days / 30.0);
        quality + confidence - price_pressure - delay_penalty
    }

    /// Returns true if this customer buys at the given price.
    #[must_use]
    pub fn purchases(&self, price: f64, review_score: f64, shipping_days: f64, review_count: f64) -> bool {
        price <= self.budget
            && self.utility(price, review_score, shipping_days, review_count)
                >= self.purchase_threshold
    }
}

/// Agent-based demand: a deterministic sample of customers votes with
/// their utility functions.
///
/// Sampling uses a seeded [`ChaCha8Rng`], with the item id mixed into the
/// seed, so a given configuration always produces the same demand for the
/// same state. Demand scales with the item's marketing visibility.
pub struct AgentBasedDemandModel {
    population: Vec<CustomerProfile>,
    sample_size: usize,
    seed: u64,
}

impl AgentBasedDemandModel {
    /// Creates a model over an explicit population.
    #[must_use]
    pub fn new(population: Vec<CustomerProfile>, sample_size: usize, seed: u64) -> Self {
        Self {
            population,
            sample_size,
            seed,
        }
    }

    /// Generates a population of `population_size` customers from the seed.
    #[must_use]
    pub fn with_generated_population(population_size: usize, sample_size: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let population = (0..population_size)
            .map(|_| CustomerProfile {
                price_sensitivity: rng.gen_range(0.3..1.0),
                budget: rng.gen_range(5.0..200.0),
                quality_preference: rng.gen_range(0.2..1.0),
                delay_aversion: rng.gen_range(0.0..0.5),
                purchase_threshold: rng.gen_range(0.05..0.45),
            })
            .collect();
        Self::new(population, sample_size, seed)
    }

    /// Returns the population size.
    #[must_use]
    pub fn population_size(&self) -> usize {
        self.population.len()
    }

    fn item_seed(&self, item_id: &ItemId) -> u64 {
        let mut hasher = DefaultHasher::new();
        item_id.hash(&mut hasher);
        self.seed ^ hasher.finish()
    }
}

#[async_trait]
impl DemandModel for AgentBasedDemandModel {
    async fn demand(&self, state: &ProductState) -> DomainResult<u64> {
        if self.population.is_empty() || self.sample_size == 0 {
            return Ok(0);
        }

        let price = state.price.to_f64_lossy();
        let review_score = state.metadata_f64("review_score").unwrap_or(4.0);
        let shipping_days = state.metadata_f64("shipping_days").unwrap_or(3.0);
        let review_count = state.metadata_f64("review_count").unwrap_or(100.0);

        let mut rng = ChaCha8Rng::seed_from_u64(self.item_seed(&state.item_id));
        let mut buyers = 0u64;
        for _ in 0..self.sample_size {
            let index = rng.gen_range(0..self.population.len());
            let customer = self
                .population
                .get(index)
                .ok_or(DomainError::overflow("sample index"))?;
            if customer.purchases(price, review_score, shipping_days, review_count) {
                buyers += 1;
            }
        }

        let scaled = (buyers as f64 * state.visibility).round();
        Ok(if scaled > 0.0 { scaled as u64 } else { 0 })
    }

    fn name(&self) -> &'static str {
        "agent-based"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Currency;

    fn usd(minor: i64) -> Money {
        Money::from_minor_units(minor, Currency::Usd)
    }

    fn state_at(price_minor: i64) -> ProductState {
        ProductState::new(ItemId::new("B001"), usd(price_minor), 100, usd(1000))
    }

    mod curve {
        use super::*;

        #[test]
        fn base_demand_at_reference_price() {
            assert_eq!(demand_curve(100, 1.0, 1.5), 100);
        }

        #[test]
        fn higher_price_lowers_demand() {
            let at_reference = demand_curve(100, 1.0, 1.5);
            let above = demand_curve(100, 1.2, 1.5);
            assert!(above < at_reference);
        }

        #[test]
        fn lower_price_raises_demand() {
            assert!(demand_curve(100, 0.8, 1.5) > 100);
        }

        #[test]
        fn degenerate_ratio_is_zero_demand() {
            assert_eq!(demand_curve(100, 0.0, 1.5), 0);
            assert_eq!(demand_curve(100, -1.0, 1.5), 0);
        }
    }

    mod elasticity {
        use super::*;

        fn model(book: Arc<CompetitorPriceBook>) -> ElasticityDemandModel {
            ElasticityDemandModel::new(100, 1.5, book)
        }

        #[tokio::test]
        async fn first_sight_uses_own_price_as_reference() {
            let book = Arc::new(CompetitorPriceBook::default());
            let m = model(book);

            // price == reference, so demand == base exactly.
            let demand = m.demand(&state_at(2000)).await.unwrap();
            assert_eq!(demand, 100);
            assert_eq!(
                m.reference_price(&ItemId::new("B001")).await,
                Some(usd(2000))
            );
        }

        #[tokio::test]
        async fn competitor_average_lowers_reference() {
            let book = Arc::new(CompetitorPriceBook::default());
            book.record(&ItemId::new("B001"), &[usd(1500), usd(1700)]).await;
            let m = model(book);

            let demand = m.demand(&state_at(2000)).await.unwrap();
            // Reference is min(avg=16.00, own=20.00) = 16.00; price above
            // reference suppresses demand below base.
            assert_eq!(
                m.reference_price(&ItemId::new("B001")).await,
                Some(usd(1600))
            );
            assert!(demand < 100);
        }

        #[tokio::test]
        async fn reference_never_rises_above_previous() {
            let book = Arc::new(CompetitorPriceBook::default());
            let m = model(book.clone());

            m.demand(&state_at(2000)).await.unwrap();
            // Competitors later observed above the held reference.
            book.record(&ItemId::new("B001"), &[usd(5000)]).await;
            m.demand(&state_at(2000)).await.unwrap();

            assert_eq!(
                m.reference_price(&ItemId::new("B001")).await,
                Some(usd(2000))
            );
        }

        #[tokio::test]
        async fn stub_price_is_a_division_fault() {
            let book = Arc::new(CompetitorPriceBook::default());
            let m = model(book);
            let stub = ProductState::stub(ItemId::new("B001"), Currency::Usd);

            let result = m.demand(&stub).await;
            assert!(matches!(result, Err(DomainError::DivisionByZero)));
        }
    }

    mod agent_based {
        use super::*;

        fn eager_customer() -> CustomerProfile {
            CustomerProfile {
                price_sensitivity: 0.1,
                budget: 100.0,
                quality_preference: 1.0,
                delay_aversion: 0.0,
                purchase_threshold: 0.1,
            }
        }

        fn broke_customer() -> CustomerProfile {
            CustomerProfile {
                price_sensitivity: 1.0,
                budget: 1.0,
                quality_preference: 0.2,
                delay_aversion: 0.5,
                purchase_threshold: 0.4,
            }
        }

        #[tokio::test]
        async fn all_eager_customers_buy() {
            let m = AgentBasedDemandModel::new(vec![eager_customer()], 50, 7);
            let demand = m.demand(&state_at(2000)).await.unwrap();
            assert_eq!(demand, 50);
        }

        #[tokio::test]
        async fn unaffordable_price_yields_zero() {
            let m = AgentBasedDemandModel::new(vec![broke_customer()], 50, 7);
            let demand = m.demand(&state_at(2000)).await.unwrap();
            assert_eq!(demand, 0);
        }

        #[tokio::test]
        async fn deterministic_for_same_seed_and_state() {
            let m1 = AgentBasedDemandModel::with_generated_population(500, 100, 42);
            let m2 = AgentBasedDemandModel::with_generated_population(500, 100, 42);

            let d1 = m1.demand(&state_at(1500)).await.unwrap();
            let d2 = m2.demand(&state_at(1500)).await.unwrap();
            assert_eq!(d1, d2);
        }

        #[tokio::test]
        async fn visibility_scales_demand() {
            let mut state = state_at(2000);
            let m = AgentBasedDemandModel::new(vec![eager_customer()], 20, 7);

            state.set_visibility(2.0);
            let boosted = m.demand(&state).await.unwrap();
            assert_eq!(boosted, 40);
        }

        #[tokio::test]
        async fn empty_population_yields_zero() {
            let m = AgentBasedDemandModel::new(vec![], 50, 7);
            assert_eq!(m.demand(&state_at(2000)).await.unwrap(), 0);
        }

        #[test]
        fn budget_gate_blocks_purchase_regardless_of_utility() {
            let c = eager_customer();
            assert!(!c.purchases(150.0, 5.0, 1.0, 1000.0));
            assert!(c.purchases(50.0, 5.0, 1.0, 1000.0));
        }
    }
}
