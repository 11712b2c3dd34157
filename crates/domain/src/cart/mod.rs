//! Per-user shopping cart (the Cart Store).

mod aggregate;
mod events;
mod service;

pub use aggregate::{Cart, CartLine, CartSummary, cart_id};
pub use events::{
    CartClearedData, CartEvent, CartItemAddedData, CartItemQuantityChangedData,
    CartItemRemovedData, CartItemsPurchasedData, CartItemsSelectedData,
};
pub use service::CartService;

use thiserror::Error;

use crate::value_objects::ProductId;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i64 },

    /// Requested quantity is negative or above current stock.
    #[error("invalid stock quantity: requested {requested}, stock is {stock}")]
    InvalidStock { requested: i64, stock: u32 },

    #[error("item not in cart: {product_id}")]
    ItemNotFound { product_id: ProductId },

    #[error("product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },
}
