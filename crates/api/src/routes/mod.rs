pub mod cart;
pub mod checkout;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;

use common::AggregateId;

use crate::error::ApiError;

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid id: {id}")))
}
