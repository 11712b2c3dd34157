//! Shared application state and collaborator wiring.

use std::sync::Arc;

use domain::{
    CartService, InMemoryCatalog, InventoryOracle, OrderService, PaymentService,
    SettlementGateway, SimulatedGateway,
};
use event_store::EventStore;
use projections::{OrderSummaryView, PaymentLedgerView, ProjectionProcessor};
use saga::{
    CheckoutConfig, CheckoutCoordinator, HttpInventoryOracle, HttpOrderLedger,
    InMemoryStockReservations, LocalOrderLedger, OrderLedger, ProjectedPaymentLookup,
};

use crate::config::Config;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub carts: CartService<S>,
    pub orders: Arc<OrderService<S>>,
    pub payments: PaymentService<S>,
    pub checkout: CheckoutCoordinator<S>,
    pub processor: Arc<ProjectionProcessor<S>>,
    pub order_summaries: OrderSummaryView,
    pub payment_ledger: PaymentLedgerView,
}

/// Services the API talks to but does not own.
pub struct Collaborators {
    pub catalog: Arc<dyn InventoryOracle>,
    /// `None` means checkout uses the in-process order ledger.
    pub order_ledger: Option<Arc<dyn OrderLedger>>,
    pub gateway: Arc<dyn SettlementGateway>,
}

impl Collaborators {
    /// Everything in-process, priced from `catalog`.
    pub fn in_memory(catalog: InMemoryCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            order_ledger: None,
            gateway: Arc::new(SimulatedGateway::default()),
        }
    }

    /// Remote collaborators where a URL is configured, local ones otherwise.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let catalog: Arc<dyn InventoryOracle> = match &config.inventory_service_url {
            Some(url) => {
                tracing::info!(%url, "using remote inventory service");
                Arc::new(HttpInventoryOracle::new(url.as_str(), config.upstream_timeout)?)
            }
            None => {
                tracing::warn!("INVENTORY_SERVICE_URL not set, using an empty in-memory catalog");
                Arc::new(InMemoryCatalog::new())
            }
        };

        let order_ledger: Option<Arc<dyn OrderLedger>> = match &config.order_service_url {
            Some(url) => {
                tracing::info!(%url, "using remote order ledger");
                Some(Arc::new(HttpOrderLedger::new(
                    url.as_str(),
                    config.upstream_timeout,
                )?))
            }
            None => None,
        };

        Ok(Self {
            catalog,
            order_ledger,
            gateway: Arc::new(SimulatedGateway::new(config.gateway_limit_units)),
        })
    }
}

/// Wires services, projections and the checkout coordinator over one store.
pub fn create_state<S: EventStore + Clone + 'static>(
    store: S,
    collaborators: Collaborators,
    checkout_config: CheckoutConfig,
) -> Arc<AppState<S>> {
    let Collaborators {
        catalog,
        order_ledger,
        gateway,
    } = collaborators;

    let orders = Arc::new(OrderService::new(store.clone()));

    let order_summaries = OrderSummaryView::new();
    let payment_ledger = PaymentLedgerView::new();
    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(order_summaries.clone()));
    processor.register(Box::new(payment_ledger.clone()));
    let processor = Arc::new(processor);

    let ledger = order_ledger
        .unwrap_or_else(|| Arc::new(LocalOrderLedger::new(Arc::clone(&orders))));
    let payment_lookup = Arc::new(ProjectedPaymentLookup::new(
        Arc::clone(&processor),
        payment_ledger.clone(),
    ));

    let checkout = CheckoutCoordinator::new(
        store.clone(),
        Arc::clone(&catalog),
        Arc::new(InMemoryStockReservations::new()),
        ledger,
        payment_lookup,
    )
    .with_config(checkout_config);

    Arc::new(AppState {
        carts: CartService::new(store.clone(), catalog),
        orders,
        payments: PaymentService::new(store, gateway),
        checkout,
        processor,
        order_summaries,
        payment_ledger,
    })
}

impl<S: EventStore> AppState<S> {
    /// Brings the read models up to date before a query.
    pub async fn catch_up(&self) -> Result<(), ApiError> {
        self.processor.run_catch_up().await?;
        Ok(())
    }
}
