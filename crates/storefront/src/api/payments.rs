//! Payment intents.
//!
//! The API only creates the intent; card confirmation happens in the
//! browser. A created intent is therefore reported as pending.

use async_trait::async_trait;
use reqwest::Method;
use tracing::instrument;

use segishop_core::PaymentStatus;

use super::types::{PaymentIntentMetadata, PaymentIntentRequest, PaymentIntentResponse};
use super::{ApiClient, ApiError};
use crate::checkout::{PaymentGateway, PaymentRequest, PaymentResult};

#[async_trait]
impl PaymentGateway for ApiClient {
    #[instrument(skip_all, fields(method = %request.method, amount = %request.amount))]
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentResult, ApiError> {
        let body = PaymentIntentRequest {
            amount: request.amount,
            currency: request.currency.code(),
            metadata: PaymentIntentMetadata {
                payment_method: request.method.as_str(),
                customer_name: request.billing.name.clone(),
                customer_email: request.billing.email.clone(),
            },
        };

        let response: PaymentIntentResponse = self
            .send(Method::POST, "payments/stripe/create-intent", Some(&body))
            .await?;

        Ok(intent_result(request, response))
    }
}

fn intent_result(request: &PaymentRequest, response: PaymentIntentResponse) -> PaymentResult {
    if !response.success {
        return PaymentResult::failed(
            request.method,
            request.amount,
            response
                .error
                .unwrap_or_else(|| "Failed to create payment intent".to_string()),
        );
    }

    PaymentResult {
        status: PaymentStatus::Pending,
        transaction_id: None,
        payment_intent_id: response.payment_intent_id,
        payment_method: request.method,
        amount: request.amount,
        error: None,
    }
}
