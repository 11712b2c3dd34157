//! HTTP client for the product catalog.

use std::time::Duration;

use async_trait::async_trait;
use domain::{CatalogError, InventoryOracle, Money, ProductId, ProductSnapshot};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::error::SagaError;

#[derive(Debug, Deserialize)]
struct ProductImage {
    url: String,
    #[serde(default)]
    sort: i32,
}

/// Catalog response body. Prices arrive in major units.
#[derive(Debug, Deserialize)]
struct ProductInfo {
    id: String,
    name: String,
    price: f64,
    stock: i64,
    #[serde(default)]
    images: Vec<ProductImage>,
}

impl From<ProductInfo> for ProductSnapshot {
    fn from(info: ProductInfo) -> Self {
        let image = info
            .images
            .into_iter()
            .min_by_key(|i| i.sort)
            .map(|i| i.url);
        Self {
            id: ProductId::new(info.id),
            name: info.name,
            price: Money::from_major_f64(info.price),
            stock: u32::try_from(info.stock.max(0)).unwrap_or(u32::MAX),
            image,
        }
    }
}

/// Inventory Oracle backed by `GET {base}/products/{id}`.
#[derive(Debug, Clone)]
pub struct HttpInventoryOracle {
    client: Client,
    base_url: Url,
}

impl HttpInventoryOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SagaError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SagaError::Upstream(e.to_string()))?;
        let base_url = Url::parse(&base_url.into())
            .map_err(|e| SagaError::Upstream(format!("invalid catalog url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SagaError::Upstream(format!(
                "invalid catalog url: {base_url}"
            )));
        }
        Ok(Self { client, base_url })
    }

    /// `{base}/products/{id}` with the id as a single encoded segment.
    fn product_url(&self, product_id: &ProductId) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("products")
                .push(product_id.as_str());
        }
        url
    }
}

#[async_trait]
impl InventoryOracle for HttpInventoryOracle {
    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ProductSnapshot>, CatalogError> {
        let response = self
            .client
            .get(self.product_url(product_id))
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let info: ProductInfo = response
                    .json()
                    .await
                    .map_err(|e| CatalogError::Unavailable(e.to_string()))?;
                Ok(Some(info.into()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                tracing::warn!(%status, "catalog lookup failed");
                Err(CatalogError::Unavailable(format!(
                    "unexpected status {status}"
                )))
            }
        }
    }
}
