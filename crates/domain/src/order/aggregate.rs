//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::value_objects::{Address, Money, ProductId};

use super::{
    OrderError, OrderEvent, OrderStatus,
    commands::NewOrderItem,
    events::{OrderPlacedData, OrderStatusChangedData},
};

/// A line of a placed order. Immutable once the order exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: AggregateId,
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn new(
        order_id: AggregateId,
        product_id: ProductId,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// `None` when the line total does not fit in [`Money`].
    pub fn total_price(&self) -> Option<Money> {
        self.unit_price.multiply(self.quantity)
    }
}

/// Read shape of an order as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: AggregateId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub shipping_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order aggregate root.
#[derive(Debug, Clone, Default)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,
    user_id: Option<UserId>,
    status: OrderStatus,
    items: Vec<OrderItem>,
    total_amount: Money,
    shipping_address: Option<Address>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
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
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::OrderStatusChanged(data) => self.apply_status_changed(data),
            OrderEvent::OrderAddressChanged(data) => {
                self.shipping_address = Some(data.shipping_address);
                self.updated_at = data.changed_at;
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.cancel_reason = data.reason;
                self.updated_at = data.cancelled_at;
            }
        }
    }
}

// Query methods
impl Order {
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn shipping_address(&self) -> Option<&Address> {
        self.shipping_address.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// `None` for an order that was never placed.
    pub fn to_view(&self) -> Option<OrderView> {
        Some(OrderView {
            id: self.id?,
            user_id: self.user_id?,
            items: self.items.clone(),
            total_amount: self.total_amount,
            status: self.status,
            shipping_address: self.shipping_address.clone(),
            cancel_reason: self.cancel_reason.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// Command methods (return events)
impl Order {
    /// Places a new order. The total is always computed here from the
    /// supplied item prices.
    pub fn place(
        &self,
        order_id: AggregateId,
        user_id: UserId,
        items: Vec<NewOrderItem>,
        shipping_address: Option<Address>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyExists { order_id });
        }

        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let quantity = match u32::try_from(item.quantity) {
                Ok(q) if q > 0 => q,
                _ => {
                    return Err(OrderError::InvalidQuantity {
                        product_id: item.product_id,
                        quantity: item.quantity,
                    });
                }
            };
            if item.unit_price.is_negative() {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id,
                    price: item.unit_price.cents(),
                });
            }
            lines.push(OrderItem::new(
                order_id,
                item.product_id,
                item.name,
                quantity,
                item.unit_price,
            ));
        }

        Ok(vec![OrderEvent::order_placed(
            order_id,
            user_id,
            lines,
            shipping_address,
        )?])
    }

    /// Applies a status and/or address change.
    ///
    /// The address rule is checked against the status before the change.
    pub fn update(
        &self,
        status: Option<OrderStatus>,
        shipping_address: Option<Address>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if status.is_none() && shipping_address.is_none() {
            return Err(OrderError::NothingToUpdate);
        }

        let mut events = Vec::new();

        if let Some(address) = shipping_address {
            if !self.status.can_change_address() {
                return Err(OrderError::InvalidOrderState {
                    current: self.status,
                    action: "change the shipping address".to_string(),
                });
            }
            events.push(OrderEvent::address_changed(address));
        }

        if let Some(next) = status {
            if !self.status.can_transition_to(next) {
                return Err(OrderError::InvalidOrderState {
                    current: self.status,
                    action: format!("move to {next}"),
                });
            }
            events.push(if next == OrderStatus::Cancelled {
                OrderEvent::order_cancelled(None)
            } else {
                OrderEvent::status_changed(self.status, next)
            });
        }

        Ok(events)
    }

    /// Cancels a pending order.
    pub fn cancel(&self, reason: Option<String>) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidOrderState {
                current: self.status,
                action: "cancel".to_string(),
            });
        }

        Ok(vec![OrderEvent::order_cancelled(reason)])
    }
}

// Apply event helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.user_id = Some(data.user_id);
        self.status = OrderStatus::Pending;
        self.items = data.items;
        self.total_amount = data.total_amount;
        self.shipping_address = data.shipping_address;
        self.created_at = data.placed_at;
        self.updated_at = data.placed_at;
    }

    fn apply_status_changed(&mut self, data: OrderStatusChangedData) {
        self.status = data.to;
        self.updated_at = data.changed_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product: &str, quantity: i64, cents: i64) -> NewOrderItem {
        NewOrderItem {
            product_id: ProductId::new(product),
            name: product.to_uppercase(),
            quantity,
            unit_price: Money::from_cents(cents),
        }
    }

    fn placed() -> Order {
        let mut order = Order::default();
        let events = order
            .place(
                AggregateId::new(),
                UserId::new(),
                vec![item("p1", 3, 1000), item("p2", 2, 250)],
                None,
            )
            .unwrap();
        order.apply_events(events);
        order
    }

    fn with_status(status: OrderStatus) -> Order {
        let mut order = placed();
        let path: &[OrderStatus] = match status {
            OrderStatus::Pending => &[],
            OrderStatus::Paid => &[OrderStatus::Paid],
            OrderStatus::Shipped => &[OrderStatus::Paid, OrderStatus::Shipped],
            OrderStatus::Delivered => &[
                OrderStatus::Paid,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
            ],
            OrderStatus::Cancelled => &[OrderStatus::Cancelled],
        };
        for next in path {
            let events = order.update(Some(*next), None).unwrap();
            order.apply_events(events);
        }
        order
    }

    #[test]
    fn place_computes_total_and_starts_pending() {
        let order = placed();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total_amount(), Money::from_cents(3500));
        assert_eq!(order.items().len(), 2);
        assert!(order.items().iter().all(|i| Some(i.order_id) == order.id()));
    }

    #[test]
    fn place_validates_items() {
        let order = Order::default();
        let id = AggregateId::new();
        let user = UserId::new();

        assert!(matches!(
            order.place(id, user, vec![], None),
            Err(OrderError::NoItems)
        ));
        assert!(matches!(
            order.place(id, user, vec![item("p1", 0, 100)], None),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
        assert!(matches!(
            order.place(id, user, vec![item("p1", 1, -1)], None),
            Err(OrderError::InvalidPrice { .. })
        ));
        assert!(order.place(id, user, vec![item("p1", 1, 0)], None).is_ok());
    }

    #[test]
    fn placing_twice_is_rejected() {
        let order = placed();
        let err = order
            .place(
                order.id().unwrap(),
                UserId::new(),
                vec![item("p1", 1, 1)],
                None,
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::AlreadyExists { .. }));
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let huge = i64::MAX / 2 + 1;
        let err = Order::default()
            .place(AggregateId::new(), UserId::new(), vec![item("p1", 2, huge)], None)
            .unwrap_err();
        assert!(matches!(err, OrderError::AmountOverflow));

        let err = Order::default()
            .place(
                AggregateId::new(),
                UserId::new(),
                vec![item("p1", 1, i64::MAX), item("p2", 1, 1)],
                None,
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::AmountOverflow));
    }

    #[test]
    fn cancel_only_from_pending() {
        for status in OrderStatus::ALL {
            let order = with_status(status);
            let result = order.cancel(Some("changed my mind".into()));
            if status == OrderStatus::Pending {
                let mut order = order;
                order.apply_events(result.unwrap());
                assert_eq!(order.status(), OrderStatus::Cancelled);
            } else {
                assert!(matches!(result, Err(OrderError::InvalidOrderState { .. })));
            }
        }
    }

    #[test]
    fn illegal_transitions_leave_status_alone() {
        let order = with_status(OrderStatus::Paid);
        for next in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert!(order.update(Some(next), None).is_err(), "paid -> {next}");
        }
        assert_eq!(order.status(), OrderStatus::Paid);
    }

    #[test]
    fn address_changes_until_shipped() {
        let address = Address {
            street: "1 Main St".into(),
            city: "Taipei".into(),
            state: String::new(),
            country: "TW".into(),
            postal_code: "100".into(),
        };

        let mut paid = with_status(OrderStatus::Paid);
        let events = paid.update(None, Some(address.clone())).unwrap();
        paid.apply_events(events);
        assert_eq!(paid.shipping_address(), Some(&address));

        let shipped = with_status(OrderStatus::Shipped);
        assert!(matches!(
            shipped.update(None, Some(address)),
            Err(OrderError::InvalidOrderState { .. })
        ));
    }

    #[test]
    fn empty_update_is_rejected() {
        assert!(matches!(
            placed().update(None, None),
            Err(OrderError::NothingToUpdate)
        ));
    }

    #[test]
    fn view_of_unplaced_order_is_none() {
        assert!(Order::default().to_view().is_none());
        let view = placed().to_view().unwrap();
        assert_eq!(view.total_amount, Money::from_cents(3500));
    }
}
