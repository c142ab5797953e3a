use async_trait::async_trait;
use tracing::instrument;

use super::{ApiClient, ApiError};
use crate::checkout::{CreateOrderRequest, CreateOrderResponse, OrderService};

#[async_trait]
impl OrderService for ApiClient {
    #[instrument(skip_all, fields(items = request.items.len()))]
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, ApiError> {
        self.send_enveloped("orders", request).await
    }
}
