//! Payment attempts.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use segishop_core::{CurrencyCode, PaymentMethodKind, PaymentStatus};

use crate::api::ApiError;

/// Outcome of a payment attempt, consumed once when the order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub payment_method: PaymentMethodKind,
    pub amount: Decimal,
    pub error: Option<String>,
}

impl PaymentResult {
    /// A failed attempt carrying `error`.
    #[must_use]
    pub fn failed(method: PaymentMethodKind, amount: Decimal, error: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Failed,
            transaction_id: None,
            payment_intent_id: None,
            payment_method: method,
            amount,
            error: Some(error.into()),
        }
    }

    /// Failed or unrecognised; either way no money is known to have moved.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.status, PaymentStatus::Failed | PaymentStatus::Unknown)
    }
}

/// Billing details entered on the payment step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BillingInfo {
    pub name: String,
    pub email: String,
    pub zip_code: Option<String>,
}

/// What to charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub method: PaymentMethodKind,
    pub billing: BillingInfo,
}

/// Payment gateway contract.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentResult, ApiError>;
}

/// Runs payment attempts, folding gateway errors into failed results.
#[derive(Clone)]
pub struct PaymentProcessor {
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentProcessor {
    #[must_use]
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }

    /// Attempt the payment. Always yields a result.
    #[instrument(skip_all, fields(method = %request.method, amount = %request.amount))]
    pub async fn execute(&self, request: &PaymentRequest) -> PaymentResult {
        match self.gateway.charge(request).await {
            Ok(result) => {
                if result.is_failure() {
                    tracing::warn!(error = ?result.error, "Payment declined");
                }
                result
            }
            Err(e) => {
                tracing::error!(error = %e, "Payment gateway error");
                PaymentResult::failed(
                    request.method,
                    request.amount,
                    "We could not reach the payment provider. Please try again.",
                )
            }
        }
    }
}
