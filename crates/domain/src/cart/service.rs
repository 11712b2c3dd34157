//! Cart operations backed by the event store and the inventory oracle.

use std::sync::Arc;

use common::{AggregateId, UserId};
use event_store::EventStore;

use crate::catalog::{InventoryOracle, ProductSnapshot};
use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::value_objects::ProductId;

use super::{Cart, CartError, cart_id};

/// Service for managing carts.
///
/// Product facts (name, price, stock) are always read from the oracle at
/// the moment of the mutation, never trusted from the client.
pub struct CartService<S: EventStore> {
    handler: CommandHandler<S, Cart>,
    catalog: Arc<dyn InventoryOracle>,
}

impl<S: EventStore> CartService<S> {
    pub fn new(store: S, catalog: Arc<dyn InventoryOracle>) -> Self {
        Self {
            handler: CommandHandler::new(store),
            catalog,
        }
    }

    /// A user with no history has an empty cart.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart, DomainError> {
        self.handler.load(cart_id(user_id)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, DomainError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity { quantity }.into());
        }
        let product = self.lookup(&product_id).await?;

        let result = self
            .handler
            .execute(cart_id(user_id), |cart| {
                cart.add_item(user_id, &product, quantity)
            })
            .await?;

        tracing::info!(%user_id, %product_id, quantity, "item added to cart");
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, DomainError> {
        let product = self.lookup(&product_id).await?;

        let result = self
            .handler
            .execute(cart_id(user_id), |cart| {
                cart.update_quantity(&product, quantity)
            })
            .await?;
        Ok(result.aggregate)
    }

    /// Every id must exist in the catalog; the selection becomes exactly
    /// these products.
    #[tracing::instrument(skip(self))]
    pub async fn select_items(
        &self,
        user_id: UserId,
        product_ids: Vec<ProductId>,
    ) -> Result<Cart, DomainError> {
        for product_id in &product_ids {
            self.lookup(product_id).await?;
        }

        let result = self
            .handler
            .execute(cart_id(user_id), |cart| cart.select_items(product_ids))
            .await?;
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Cart, DomainError> {
        let result = self
            .handler
            .execute(cart_id(user_id), |cart| cart.remove_item(&product_id))
            .await?;
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: UserId) -> Result<(), DomainError> {
        self.handler
            .execute(cart_id(user_id), |cart| cart.clear())
            .await?;
        Ok(())
    }

    /// Removes lines that were checked out into `order_id`.
    #[tracing::instrument(skip(self))]
    pub async fn remove_purchased(
        &self,
        user_id: UserId,
        order_id: AggregateId,
        product_ids: Vec<ProductId>,
    ) -> Result<Cart, DomainError> {
        let result = self
            .handler
            .execute(cart_id(user_id), |cart| {
                cart.remove_purchased(order_id, &product_ids)
            })
            .await?;
        Ok(result.aggregate)
    }

    async fn lookup(&self, product_id: &ProductId) -> Result<ProductSnapshot, DomainError> {
        self.catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| {
                CartError::ProductNotFound {
                    product_id: product_id.clone(),
                }
                .into()
            })
    }
}
