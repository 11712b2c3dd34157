//! Order service providing the Order Ledger operations.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{Command, CommandHandler};
use crate::error::DomainError;

use super::{CancelOrder, Order, OrderEvent, PlaceOrder, UpdateOrder};

/// Service for managing orders.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    /// Places an order.
    ///
    /// Re-using an existing order id fails with `AlreadyExists`; a racing
    /// duplicate fails with a concurrency conflict. Neither writes anything.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, user_id = %cmd.user_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, DomainError> {
        let order_id = cmd.aggregate_id();
        let PlaceOrder {
            user_id,
            items,
            shipping_address,
            ..
        } = cmd;

        let result = self
            .handler
            .execute(order_id, |order| {
                order.place(order_id, user_id, items, shipping_address)
            })
            .await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            total = %result.aggregate.total_amount(),
            items = result.aggregate.items().len(),
            "order placed"
        );
        Ok(result.aggregate)
    }

    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_order(&self, cmd: UpdateOrder) -> Result<Order, DomainError> {
        let UpdateOrder {
            order_id,
            status,
            shipping_address,
        } = cmd;

        let result = self
            .handler
            .execute_existing(order_id, |order| order.update(status, shipping_address))
            .await?;

        record_transitions(order_id, &result.events);
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, cmd: CancelOrder) -> Result<Order, DomainError> {
        let order_id = cmd.order_id;
        let reason = cmd.reason;

        let result = self
            .handler
            .execute_existing(order_id, |order| order.cancel(reason))
            .await?;

        record_transitions(order_id, &result.events);
        Ok(result.aggregate)
    }
}

fn record_transitions(order_id: AggregateId, events: &[OrderEvent]) {
    for event in events {
        let to = match event {
            OrderEvent::OrderStatusChanged(data) => data.to.as_str(),
            OrderEvent::OrderCancelled(_) => "cancelled",
            _ => continue,
        };
        metrics::counter!("order_status_transitions_total", "to" => to).increment(1);
        tracing::info!(%order_id, status = to, "order status changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::order::{NewOrderItem, OrderError, OrderStatus};
    use crate::value_objects::{Money, ProductId};
    use common::UserId;
    use event_store::InMemoryEventStore;

    fn items() -> Vec<NewOrderItem> {
        vec![NewOrderItem {
            product_id: ProductId::new("p1"),
            name: "Mug".into(),
            quantity: 3,
            unit_price: Money::from_cents(1000),
        }]
    }

    #[tokio::test]
    async fn place_and_fetch_is_stable() {
        let service = OrderService::new(InMemoryEventStore::new());
        let placed = service
            .place_order(PlaceOrder::new(UserId::new(), items()))
            .await
            .unwrap();
        let id = placed.id().unwrap();

        let first = service.get_order(id).await.unwrap().unwrap().to_view();
        let second = service.get_order(id).await.unwrap().unwrap().to_view();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(first.unwrap().total_amount, Money::from_cents(3000));
    }

    #[tokio::test]
    async fn duplicate_order_id_is_rejected() {
        let store = InMemoryEventStore::new();
        let service = OrderService::new(store.clone());
        let order_id = AggregateId::new();

        service
            .place_order(PlaceOrder::new(UserId::new(), items()).with_id(order_id))
            .await
            .unwrap();
        let err = service
            .place_order(PlaceOrder::new(UserId::new(), items()).with_id(order_id))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::AlreadyExists { .. })
        ));
        assert!(err.is_conflict());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let service = OrderService::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        assert!(service.get_order(id).await.unwrap().is_none());
        let err = service
            .cancel_order(CancelOrder::new(id, None))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn walk_the_happy_path() {
        let service = OrderService::new(InMemoryEventStore::new());
        let order = service
            .place_order(PlaceOrder::new(UserId::new(), items()))
            .await
            .unwrap();
        let id = order.id().unwrap();

        for status in [
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let order = service
                .update_order(UpdateOrder::status(id, status))
                .await
                .unwrap();
            assert_eq!(order.status(), status);
        }
    }

    #[tokio::test]
    async fn cancel_after_payment_is_refused() {
        let service = OrderService::new(InMemoryEventStore::new());
        let order = service
            .place_order(PlaceOrder::new(UserId::new(), items()))
            .await
            .unwrap();
        let id = order.id().unwrap();
        service
            .update_order(UpdateOrder::status(id, OrderStatus::Paid))
            .await
            .unwrap();

        let err = service
            .cancel_order(CancelOrder::new(id, Some("too late".into())))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidOrderState { .. })
        ));
        let order = service.get_order(id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Paid);
    }
}
