//! Cart aggregate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::catalog::ProductSnapshot;
use crate::value_objects::{Money, ProductId};

use super::CartError;
use super::events::{CartEvent, CartItemAddedData, CartItemQuantityChangedData};

/// One product in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Money,
    /// Catalog stock last seen for this product.
    pub stock_count: u32,
    pub quantity: u32,
    pub selected: bool,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    /// Saturates at [`Money::MAX`].
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity).unwrap_or(Money::MAX)
    }
}

/// Cart contents with totals over the selected lines.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub items: Vec<CartLine>,
    pub total_selected: u32,
    pub total_amount: Money,
    pub version: i64,
}

/// A user's cart. The stream id is the user's id, so each user has one.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    id: Option<AggregateId>,
    version: Version,
    user_id: Option<UserId>,
    lines: BTreeMap<ProductId, CartLine>,
}

/// Stream id of a user's cart.
pub fn cart_id(user_id: UserId) -> AggregateId {
    AggregateId::from_uuid(user_id.as_uuid())
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CartEvent::CartItemAdded(data) => self.apply_item_added(data),
            CartEvent::CartItemQuantityChanged(data) => self.apply_quantity_changed(data),
            CartEvent::CartItemRemoved(data) => {
                self.lines.remove(&data.product_id);
            }
            CartEvent::CartItemsSelected(data) => {
                for line in self.lines.values_mut() {
                    line.selected = data.product_ids.contains(&line.product_id);
                    line.updated_at = data.selected_at;
                }
            }
            CartEvent::CartCleared(_) => self.lines.clear(),
            CartEvent::CartItemsPurchased(data) => {
                for product_id in &data.product_ids {
                    self.lines.remove(product_id);
                }
            }
        }
    }
}

// Queries
impl Cart {
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.values()
    }

    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.get(product_id)
    }

    pub fn selected_lines(&self) -> Vec<&CartLine> {
        self.lines.values().filter(|l| l.selected).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn summary(&self) -> CartSummary {
        let selected = self.selected_lines();
        CartSummary {
            total_selected: selected
                .iter()
                .fold(0u32, |acc, l| acc.saturating_add(l.quantity)),
            total_amount: selected
                .iter()
                .fold(Money::zero(), |acc, l| acc.saturating_add(l.line_total())),
            items: self.lines.values().cloned().collect(),
            version: self.version.as_i64(),
        }
    }
}

// Commands
impl Cart {
    /// Adds `quantity` units. The cart may never hold more than the catalog
    /// currently has in stock.
    pub fn add_item(
        &self,
        user_id: UserId,
        product: &ProductSnapshot,
        quantity: i64,
    ) -> Result<Vec<CartEvent>, CartError> {
        let quantity = positive_quantity(quantity)?;

        let existing = self.lines.get(&product.id).map_or(0, |l| l.quantity);
        let total = existing.saturating_add(quantity);
        if product.stock < quantity || total > product.stock {
            return Err(CartError::InsufficientStock {
                product_id: product.id.clone(),
                requested: total,
                available: product.stock,
            });
        }

        Ok(vec![CartEvent::item_added(user_id, product, quantity)])
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(
        &self,
        product: &ProductSnapshot,
        quantity: i64,
    ) -> Result<Vec<CartEvent>, CartError> {
        if quantity < 0 || quantity > i64::from(product.stock) {
            return Err(CartError::InvalidStock {
                requested: quantity,
                stock: product.stock,
            });
        }

        let line = self
            .lines
            .get(&product.id)
            .ok_or_else(|| CartError::ItemNotFound {
                product_id: product.id.clone(),
            })?;

        // Bounded by product.stock above.
        let quantity = quantity as u32;
        if quantity == 0 {
            return Ok(vec![CartEvent::item_removed(product.id.clone())]);
        }
        if quantity == line.quantity && product.stock == line.stock_count {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::quantity_changed(
            product.id.clone(),
            quantity,
            product.stock,
        )])
    }

    /// Replaces the selection. Ids without a line are ignored.
    pub fn select_items(&self, product_ids: Vec<ProductId>) -> Result<Vec<CartEvent>, CartError> {
        if self.lines.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::items_selected(product_ids)])
    }

    pub fn remove_item(&self, product_id: &ProductId) -> Result<Vec<CartEvent>, CartError> {
        if !self.lines.contains_key(product_id) {
            return Err(CartError::ItemNotFound {
                product_id: product_id.clone(),
            });
        }
        Ok(vec![CartEvent::item_removed(product_id.clone())])
    }

    pub fn clear(&self) -> Result<Vec<CartEvent>, CartError> {
        if self.lines.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::cleared()])
    }

    /// Drops lines that went into `order_id`. Lines already gone are skipped.
    pub fn remove_purchased(
        &self,
        order_id: AggregateId,
        product_ids: &[ProductId],
    ) -> Result<Vec<CartEvent>, CartError> {
        let present: Vec<ProductId> = product_ids
            .iter()
            .filter(|id| self.lines.contains_key(*id))
            .cloned()
            .collect();

        if present.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::items_purchased(order_id, present)])
    }
}

fn positive_quantity(quantity: i64) -> Result<u32, CartError> {
    match u32::try_from(quantity) {
        Ok(q) if q > 0 => Ok(q),
        _ => Err(CartError::InvalidQuantity { quantity }),
    }
}

// Apply helpers
impl Cart {
    fn apply_item_added(&mut self, data: CartItemAddedData) {
        if self.id.is_none() {
            self.id = Some(cart_id(data.user_id));
            self.user_id = Some(data.user_id);
        }

        match self.lines.get_mut(&data.product_id) {
            Some(line) => {
                line.quantity += data.quantity;
                line.name = data.name;
                line.image = data.image;
                line.unit_price = data.unit_price;
                line.stock_count = data.stock;
                line.updated_at = data.added_at;
            }
            None => {
                self.lines.insert(
                    data.product_id.clone(),
                    CartLine {
                        product_id: data.product_id,
                        name: data.name,
                        image: data.image,
                        unit_price: data.unit_price,
                        stock_count: data.stock,
                        quantity: data.quantity,
                        selected: true,
                        updated_at: data.added_at,
                    },
                );
            }
        }
    }

    fn apply_quantity_changed(&mut self, data: CartItemQuantityChangedData) {
        if let Some(line) = self.lines.get_mut(&data.product_id) {
            line.quantity = data.quantity;
            line.stock_count = data.stock;
            line.updated_at = data.changed_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mug(stock: u32) -> ProductSnapshot {
        ProductSnapshot::new("p1", "Mug", Money::from_cents(1000), stock)
    }

    fn cart_with(lines: &[(ProductSnapshot, i64)]) -> Cart {
        let user = UserId::new();
        let mut cart = Cart::default();
        for (product, quantity) in lines {
            let events = cart.add_item(user, product, *quantity).unwrap();
            cart.apply_events(events);
        }
        cart
    }

    #[test]
    fn new_line_starts_selected() {
        let cart = cart_with(&[(mug(5), 3)]);
        let line = cart.line(&ProductId::new("p1")).unwrap();
        assert_eq!(line.quantity, 3);
        assert!(line.selected);
        assert!(cart.id().is_some());
    }

    #[test]
    fn adding_again_accumulates_and_refreshes_price() {
        let mut cart = cart_with(&[(mug(5), 1)]);
        let repriced = ProductSnapshot::new("p1", "Mug v2", Money::from_cents(1200), 5);
        let events = cart.add_item(UserId::new(), &repriced, 2).unwrap();
        cart.apply_events(events);

        let line = cart.line(&ProductId::new("p1")).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.unit_price, Money::from_cents(1200));
        assert_eq!(line.name, "Mug v2");
    }

    #[test]
    fn add_rejects_non_positive_quantity() {
        let cart = Cart::default();
        for quantity in [0, -2] {
            let err = cart.add_item(UserId::new(), &mug(5), quantity).unwrap_err();
            assert!(matches!(err, CartError::InvalidQuantity { .. }));
        }
    }

    #[test]
    fn add_rejects_when_cart_plus_request_exceeds_stock() {
        let cart = cart_with(&[(mug(5), 4)]);
        let err = cart.add_item(UserId::new(), &mug(5), 2).unwrap_err();
        assert!(matches!(
            err,
            CartError::InsufficientStock {
                requested: 6,
                available: 5,
                ..
            }
        ));
    }

    #[test]
    fn update_quantity_bounds_and_zero_removal() {
        let mut cart = cart_with(&[(mug(5), 2)]);

        assert!(matches!(
            cart.update_quantity(&mug(5), 6).unwrap_err(),
            CartError::InvalidStock { .. }
        ));
        assert!(matches!(
            cart.update_quantity(&mug(5), -1).unwrap_err(),
            CartError::InvalidStock { .. }
        ));

        let events = cart.update_quantity(&mug(5), 0).unwrap();
        cart.apply_events(events);
        assert!(cart.is_empty());
    }

    #[test]
    fn update_quantity_requires_existing_line() {
        let cart = Cart::default();
        let err = cart.update_quantity(&mug(5), 1).unwrap_err();
        assert!(matches!(err, CartError::ItemNotFound { .. }));
    }

    #[test]
    fn selection_is_replaced_not_merged() {
        let cup = ProductSnapshot::new("p2", "Cup", Money::from_cents(500), 10);
        let mut cart = cart_with(&[(mug(5), 1), (cup, 1)]);

        let events = cart.select_items(vec![ProductId::new("p2")]).unwrap();
        cart.apply_events(events);

        let selected: Vec<_> = cart
            .selected_lines()
            .iter()
            .map(|l| l.product_id.as_str().to_string())
            .collect();
        assert_eq!(selected, vec!["p2"]);
    }

    #[test]
    fn summary_totals_cover_selected_lines_only() {
        let cup = ProductSnapshot::new("p2", "Cup", Money::from_cents(500), 10);
        let mut cart = cart_with(&[(mug(5), 3), (cup, 4)]);
        let events = cart.select_items(vec![ProductId::new("p1")]).unwrap();
        cart.apply_events(events);

        let summary = cart.summary();
        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.total_selected, 3);
        assert_eq!(summary.total_amount, Money::from_cents(3000));
    }

    #[test]
    fn summary_saturates_instead_of_wrapping() {
        let pricey = ProductSnapshot::new("p1", "Yacht", Money::from_cents(i64::MAX / 2 + 1), 5);
        let also = ProductSnapshot::new("p2", "Jet", Money::from_cents(i64::MAX), 5);
        let cart = cart_with(&[(pricey, 2), (also, 1)]);

        let summary = cart.summary();
        assert_eq!(summary.total_selected, 3);
        assert_eq!(summary.total_amount, Money::MAX);
    }

    #[test]
    fn clearing_empty_cart_is_a_no_op() {
        assert!(Cart::default().clear().unwrap().is_empty());
    }

    #[test]
    fn remove_purchased_skips_missing_lines() {
        let mut cart = cart_with(&[(mug(5), 1)]);
        let events = cart
            .remove_purchased(
                AggregateId::new(),
                &[ProductId::new("p1"), ProductId::new("gone")],
            )
            .unwrap();
        assert_eq!(events.len(), 1);
        cart.apply_events(events);
        assert!(cart.is_empty());

        assert!(
            cart.remove_purchased(AggregateId::new(), &[ProductId::new("p1")])
                .unwrap()
                .is_empty()
        );
    }
}
