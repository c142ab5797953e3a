//! Coupon validation boundary.
//!
//! The coupon service owns every coupon rule. The ledger only classifies its
//! answer into a [`RejectionReason`] and refuses to re-apply the coupon that
//! is already on the order. An applied coupon is locked: later cart changes
//! do not revalidate it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use segishop_core::CouponId;

use super::CheckoutError;
use super::pricing::OrderTotals;
use crate::api::ApiError;

/// A coupon that has been accepted for the current checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    pub code: String,
    pub description: Option<String>,
    /// Discount on the merchandise subtotal.
    pub discount_amount: Decimal,
    /// Free-shipping coupon: the shipping amount is discounted as well.
    pub waives_shipping: bool,
}

/// Why a coupon was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "message", rename_all = "snake_case")]
pub enum RejectionReason {
    NotFound,
    Expired,
    MinimumSpendNotMet,
    AlreadyApplied,
    LoginRequired,
    UsageLimitReached,
    Other(String),
}

impl RejectionReason {
    /// Classify a coupon service failure message.
    #[must_use]
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("invalid coupon") || lower.contains("not found") {
            Self::NotFound
        } else if lower.contains("expired") {
            Self::Expired
        } else if lower.contains("log in") || lower.contains("login") {
            Self::LoginRequired
        } else if lower.contains("usage limit") || lower.contains("already used") {
            Self::UsageLimitReached
        } else if lower.contains("minimum") {
            Self::MinimumSpendNotMet
        } else if lower.contains("already applied") {
            Self::AlreadyApplied
        } else {
            Self::Other(message.to_string())
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("Invalid coupon code"),
            Self::Expired => f.write_str("This coupon has expired"),
            Self::MinimumSpendNotMet => {
                f.write_str("Your order does not meet the minimum spend for this coupon")
            }
            Self::AlreadyApplied => f.write_str("This coupon is already applied"),
            Self::LoginRequired => f.write_str("Please log in to use this coupon"),
            Self::UsageLimitReached => f.write_str("This coupon has reached its usage limit"),
            Self::Other(message) => f.write_str(message),
        }
    }
}

/// Request body for the coupon service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRequest {
    pub code: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub order_subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_amount: Decimal,
}

/// Coupon as described by the coupon service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponDetails {
    pub id: CouponId,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `Percentage`, `FixedAmount` or `FreeShipping`.
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Totals the coupon service computed for the request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponOrderTotals {
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub shipping_discount: Option<Decimal>,
    #[serde(default)]
    pub free_shipping_applied: bool,
}

/// Coupon service answer, for both accepted and refused codes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub coupon: Option<CouponDetails>,
    #[serde(default)]
    pub order_totals: Option<CouponOrderTotals>,
}

/// Coupon validation contract.
#[async_trait]
pub trait CouponService: Send + Sync {
    async fn apply(&self, request: &CouponRequest) -> Result<CouponResponse, ApiError>;
}

/// Result of a successful coupon application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponApplication {
    pub coupon: AppliedCoupon,
    pub totals: OrderTotals,
}

/// Trim and upper-case a code as typed by the shopper.
#[must_use]
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Validates codes against the coupon service.
#[derive(Clone)]
pub struct CouponLedger {
    service: Arc<dyn CouponService>,
}

impl CouponLedger {
    #[must_use]
    pub fn new(service: Arc<dyn CouponService>) -> Self {
        Self { service }
    }

    /// Validate `code` against the current totals.
    ///
    /// `code` must already be normalized. On success the returned totals are
    /// `current` with the discount term replaced.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::CouponRejected`] when the service refuses the code or
    /// it is the coupon already applied, [`CheckoutError::Integration`] when
    /// the service cannot be reached.
    #[instrument(skip(self, applied, current), fields(code = %code))]
    pub async fn apply(
        &self,
        code: &str,
        applied: Option<&AppliedCoupon>,
        current: &OrderTotals,
    ) -> Result<CouponApplication, CheckoutError> {
        if applied.is_some_and(|coupon| coupon.code == code) {
            return Err(CheckoutError::CouponRejected(RejectionReason::AlreadyApplied));
        }

        let request = CouponRequest {
            code: code.to_string(),
            order_subtotal: current.subtotal,
            shipping_amount: current.shipping_amount,
            tax_amount: current.tax_amount,
        };

        let response = self
            .service
            .apply(&request)
            .await
            .map_err(|e| CheckoutError::integration("apply coupon", e))?;

        let coupon = classify(code, response).map_err(CheckoutError::CouponRejected)?;
        tracing::debug!(discount = %coupon.discount_amount, waives_shipping = coupon.waives_shipping, "Coupon accepted");

        // The current totals already carry the previous coupon's discount;
        // the new coupon replaces it rather than stacking on top.
        let waived = if coupon.waives_shipping {
            current.shipping_amount
        } else {
            Decimal::ZERO
        };
        let totals = current.with_discount(coupon.discount_amount + waived);

        Ok(CouponApplication { coupon, totals })
    }
}

/// Turn a service answer into an applied coupon or a rejection.
///
/// The service reports a code below its minimum order amount as a success
/// with no discount, so a zero-value acceptance is a minimum-spend rejection.
fn classify(code: &str, response: CouponResponse) -> Result<AppliedCoupon, RejectionReason> {
    if !response.success {
        let message = response.message.unwrap_or_default();
        return Err(RejectionReason::from_message(&message));
    }

    let totals = response
        .order_totals
        .ok_or_else(|| RejectionReason::Other("Coupon service returned no totals".to_string()))?;
    let waives_shipping = totals.free_shipping_applied;
    if totals.discount_amount <= Decimal::ZERO && !waives_shipping {
        return Err(RejectionReason::MinimumSpendNotMet);
    }

    let details = response.coupon;
    Ok(AppliedCoupon {
        code: details
            .as_ref()
            .map_or_else(|| code.to_string(), |c| c.code.to_uppercase()),
        description: details.and_then(|c| c.description),
        discount_amount: totals.discount_amount,
        waives_shipping,
    })
}
