//! Read-only view of the product catalog (the Inventory Oracle).
//!
//! The catalog is owned by another service. This module only defines what
//! the cart and checkout need from it, plus an in-memory implementation for
//! tests and catalog-less deployments. The HTTP client lives in the `saga`
//! crate next to the other outbound adapters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::value_objects::{Money, ProductId};

/// Catalog facts about one product at the time it was looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    #[serde(default)]
    pub image: Option<String>,
}

impl ProductSnapshot {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
            image: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog could not be reached or answered with an error.
    #[error("inventory service unavailable: {0}")]
    Unavailable(String),
}

/// Looks up current price and stock for a product.
#[async_trait]
pub trait InventoryOracle: Send + Sync {
    /// `Ok(None)` means the catalog has no such product.
    async fn get_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ProductSnapshot>, CatalogError>;
}

#[async_trait]
impl<T: InventoryOracle + ?Sized> InventoryOracle for Arc<T> {
    async fn get_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ProductSnapshot>, CatalogError> {
        (**self).get_product(product_id).await
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, ProductSnapshot>,
    fail_lookups: bool,
    lookups: usize,
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a product.
    pub async fn set_product(&self, product: ProductSnapshot) {
        let mut state = self.state.write().await;
        state.products.insert(product.id.clone(), product);
    }

    pub async fn set_stock(&self, product_id: &ProductId, stock: u32) {
        let mut state = self.state.write().await;
        if let Some(product) = state.products.get_mut(product_id) {
            product.stock = stock;
        }
    }

    pub async fn set_price(&self, product_id: &ProductId, price: Money) {
        let mut state = self.state.write().await;
        if let Some(product) = state.products.get_mut(product_id) {
            product.price = price;
        }
    }

    pub async fn remove_product(&self, product_id: &ProductId) {
        self.state.write().await.products.remove(product_id);
    }

    /// Makes every lookup fail as if the catalog were down.
    pub async fn set_fail_lookups(&self, fail: bool) {
        self.state.write().await.fail_lookups = fail;
    }

    pub async fn lookup_count(&self) -> usize {
        self.state.read().await.lookups
    }
}

#[async_trait]
impl InventoryOracle for InMemoryCatalog {
    async fn get_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ProductSnapshot>, CatalogError> {
        let mut state = self.state.write().await;
        state.lookups += 1;

        if state.fail_lookups {
            return Err(CatalogError::Unavailable(
                "simulated catalog outage".to_string(),
            ));
        }

        Ok(state.products.get(product_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_product_is_none_not_error() {
        let catalog = InMemoryCatalog::new();
        let found = catalog.get_product(&ProductId::new("ghost")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn stock_and_price_updates_are_visible() {
        let catalog = InMemoryCatalog::new();
        let p1 = ProductId::new("p1");
        catalog
            .set_product(ProductSnapshot::new("p1", "Mug", Money::from_cents(1000), 5))
            .await;
        catalog.set_stock(&p1, 2).await;
        catalog.set_price(&p1, Money::from_cents(1200)).await;

        let product = catalog.get_product(&p1).await.unwrap().unwrap();
        assert_eq!(product.stock, 2);
        assert_eq!(product.price, Money::from_cents(1200));
        assert_eq!(catalog.lookup_count().await, 1);
    }

    #[tokio::test]
    async fn outage_toggle_fails_lookups() {
        let catalog = InMemoryCatalog::new();
        catalog.set_fail_lookups(true).await;
        let result = catalog.get_product(&ProductId::new("p1")).await;
        assert!(matches!(result, Err(CatalogError::Unavailable(_))));
    }
}
