//! Shipping controller endpoints.

use async_trait::async_trait;
use reqwest::Method;
use tracing::instrument;

use super::types::{
    OrderTotalsResponse, ShippingCalculationRequest, ShippingCalculationResponse, WireCartLine,
    WireShippingAddress,
};
use super::{ApiClient, ApiError};
use crate::checkout::{
    ShippingOption, ShippingQuoteRequest, ShippingService, TotalsQuote, TotalsQuoteRequest,
};

#[async_trait]
impl ShippingService for ApiClient {
    /// Enabled options for the address. Identical requests within the cache
    /// TTL are answered from memory.
    #[instrument(skip_all, fields(zip = %request.address.zip_code))]
    async fn calculate_options(
        &self,
        request: &ShippingQuoteRequest,
    ) -> Result<Vec<ShippingOption>, ApiError> {
        let body = ShippingCalculationRequest {
            items: request.items.iter().map(WireCartLine::from).collect(),
            subtotal: request.subtotal,
            shipping_address: WireShippingAddress::from(&request.address),
            selected_shipping_option_id: None,
        };
        let key = serde_json::to_string(&body).map_err(|e| ApiError::Parse(e.to_string()))?;

        if let Some(options) = self.options_cache().get(&key).await {
            tracing::debug!("Shipping options cache hit");
            return Ok(options);
        }

        let response: ShippingCalculationResponse = self
            .send(Method::POST, "Shipping/calculate", Some(&body))
            .await?;
        if !response.success {
            return Err(ApiError::Api {
                status: 200,
                message: response
                    .error_message
                    .unwrap_or_else(|| "shipping calculation failed".to_string()),
            });
        }

        let options: Vec<ShippingOption> = response
            .options
            .into_iter()
            .filter(|option| option.is_enabled)
            .map(ShippingOption::from)
            .collect();
        self.options_cache().insert(key, options.clone()).await;
        Ok(options)
    }

    #[instrument(skip_all, fields(option = ?request.selected_option_id))]
    async fn calculate_totals(&self, request: &TotalsQuoteRequest) -> Result<TotalsQuote, ApiError> {
        let body = ShippingCalculationRequest {
            items: request.items.iter().map(WireCartLine::from).collect(),
            subtotal: request.subtotal,
            shipping_address: WireShippingAddress::from(&request.address),
            selected_shipping_option_id: request.selected_option_id,
        };

        let response: OrderTotalsResponse = self
            .send(Method::POST, "Shipping/calculate-totals", Some(&body))
            .await?;
        match response {
            OrderTotalsResponse {
                success: true,
                totals: Some(totals),
                ..
            } => Ok(TotalsQuote::from(totals)),
            OrderTotalsResponse { error_message, .. } => Err(ApiError::Api {
                status: 200,
                message: error_message.unwrap_or_else(|| "totals calculation failed".to_string()),
            }),
        }
    }
}
