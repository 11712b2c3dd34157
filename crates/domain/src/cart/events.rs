//! Cart domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::catalog::ProductSnapshot;
use crate::value_objects::{Money, ProductId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// Units of a product were added; creates the line if absent.
    CartItemAdded(CartItemAddedData),

    /// A line's quantity was set to a new non-zero value.
    CartItemQuantityChanged(CartItemQuantityChangedData),

    CartItemRemoved(CartItemRemovedData),

    /// The selection became exactly the listed products.
    CartItemsSelected(CartItemsSelectedData),

    CartCleared(CartClearedData),

    /// Lines were checked out into an order and left the cart.
    CartItemsPurchased(CartItemsPurchasedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartItemAdded(_) => "CartItemAdded",
            CartEvent::CartItemQuantityChanged(_) => "CartItemQuantityChanged",
            CartEvent::CartItemRemoved(_) => "CartItemRemoved",
            CartEvent::CartItemsSelected(_) => "CartItemsSelected",
            CartEvent::CartCleared(_) => "CartCleared",
            CartEvent::CartItemsPurchased(_) => "CartItemsPurchased",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemAddedData {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    /// Catalog price when the item was added. Checkout re-reads it.
    pub unit_price: Money,
    pub stock: u32,
    /// Units added by this event, not the resulting line quantity.
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemQuantityChangedData {
    pub product_id: ProductId,
    pub quantity: u32,
    pub stock: u32,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRemovedData {
    pub product_id: ProductId,
    pub removed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemsSelectedData {
    pub product_ids: Vec<ProductId>,
    pub selected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartClearedData {
    pub cleared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemsPurchasedData {
    pub order_id: AggregateId,
    pub product_ids: Vec<ProductId>,
    pub purchased_at: DateTime<Utc>,
}

impl CartEvent {
    pub fn item_added(user_id: UserId, product: &ProductSnapshot, quantity: u32) -> Self {
        CartEvent::CartItemAdded(CartItemAddedData {
            user_id,
            product_id: product.id.clone(),
            name: product.name.clone(),
            image: product.image.clone(),
            unit_price: product.price,
            stock: product.stock,
            quantity,
            added_at: Utc::now(),
        })
    }

    pub fn quantity_changed(product_id: ProductId, quantity: u32, stock: u32) -> Self {
        CartEvent::CartItemQuantityChanged(CartItemQuantityChangedData {
            product_id,
            quantity,
            stock,
            changed_at: Utc::now(),
        })
    }

    pub fn item_removed(product_id: ProductId) -> Self {
        CartEvent::CartItemRemoved(CartItemRemovedData {
            product_id,
            removed_at: Utc::now(),
        })
    }

    pub fn items_selected(product_ids: Vec<ProductId>) -> Self {
        CartEvent::CartItemsSelected(CartItemsSelectedData {
            product_ids,
            selected_at: Utc::now(),
        })
    }

    pub fn cleared() -> Self {
        CartEvent::CartCleared(CartClearedData {
            cleared_at: Utc::now(),
        })
    }

    pub fn items_purchased(order_id: AggregateId, product_ids: Vec<ProductId>) -> Self {
        CartEvent::CartItemsPurchased(CartItemsPurchasedData {
            order_id,
            product_ids,
            purchased_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_tagged_with_event_name() {
        let product = ProductSnapshot::new("p1", "Mug", Money::from_cents(1000), 5);
        let event = CartEvent::item_added(UserId::new(), &product, 2);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CartItemAdded");
        assert_eq!(json["data"]["unit_price"], 1000);
        assert_eq!(event.event_type(), "CartItemAdded");
    }
}
