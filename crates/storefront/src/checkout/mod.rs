//! Checkout orchestration and pricing reconciliation.
//!
//! The [`CheckoutOrchestrator`] drives a four-step wizard:
//!
//! ```text
//! Shipping -> Review -> Payment -> Confirmation
//!    ^          |  ^       |
//!    +-- back --+  +- back-+
//! ```
//!
//! It owns the [`OrderTotals`] for the checkout and rewrites them whole on
//! every input change. Collaborators are injected as trait objects through
//! [`CheckoutServices`]; the REST implementations live in [`crate::api`].

mod account;
mod address;
mod coupon;
mod order;
mod orchestrator;
mod payment;
mod pricing;
mod shipping;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use segishop_core::EmailError;

use crate::api::ApiError;
use crate::cart::{CartError, CartSource};

pub use account::{
    AccountRegistrar, RegistrationError, RegistrationRequest, RegistrationResponse,
    generate_password, register_guest,
};
pub use address::ShippingAddress;
pub use coupon::{
    AppliedCoupon, CouponApplication, CouponDetails, CouponLedger, CouponOrderTotals, CouponRequest,
    CouponResponse, CouponService, RejectionReason, normalize_code,
};
pub use orchestrator::{Calculating, CheckoutOrchestrator, CheckoutView, Notice};
pub use order::{
    CreateOrderRequest, CreateOrderResponse, Order, OrderAddress, OrderItemRequest, OrderService,
    OrderTotalsRequest, PaymentInfo, PlacedOrder, build_create_order_request,
};
pub use payment::{BillingInfo, PaymentGateway, PaymentProcessor, PaymentRequest, PaymentResult};
pub use pricing::{OrderTotals, PricingBasis, PricingRules, compute_totals};
pub use shipping::{
    ShippingOption, ShippingQuote, ShippingQuoteRequest, ShippingQuoter, ShippingService,
    TotalsQuote, TotalsQuoteRequest,
};

/// Wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Shipping,
    Review,
    Payment,
    Confirmation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shipping => "shipping",
            Self::Review => "review",
            Self::Payment => "payment",
            Self::Confirmation => "confirmation",
        })
    }
}

/// Checkbox the shopper must tick on the review step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agreement {
    TermsOfSale,
    PrivacyPolicy,
}

impl fmt::Display for Agreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TermsOfSale => "Terms of Sale",
            Self::PrivacyPolicy => "Privacy Policy",
        })
    }
}

/// Agreements submitted with `confirm_review`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreements {
    pub terms_of_sale: bool,
    pub privacy_policy: bool,
}

impl Agreements {
    /// Agreements not yet accepted, in display order.
    #[must_use]
    pub fn missing(&self) -> Vec<Agreement> {
        let mut missing = Vec::new();
        if !self.terms_of_sale {
            missing.push(Agreement::TermsOfSale);
        }
        if !self.privacy_policy {
            missing.push(Agreement::PrivacyPolicy);
        }
        missing
    }
}

/// Local, recoverable input problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required address fields: {}", .0.join(", "))]
    MissingAddressFields(Vec<&'static str>),

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("please accept the {}", join_agreements(.0))]
    MissingAgreements(Vec<Agreement>),

    #[error("enter a coupon code")]
    EmptyCouponCode,

    #[error("shipping option {0} is not available for this address")]
    UnknownShippingOption(segishop_core::ShippingOptionId),

    #[error("your cart is empty")]
    EmptyCart,

    #[error("totals are still being recalculated")]
    TotalsPending,
}

fn join_agreements(agreements: &[Agreement]) -> String {
    agreements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Errors surfaced by checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("coupon rejected: {0}")]
    CouponRejected(RejectionReason),

    /// A collaborator call failed.
    #[error("{operation} failed: {source}")]
    Integration {
        operation: &'static str,
        #[source]
        source: ApiError,
    },

    /// The order service refused the order.
    #[error("order was not placed: {0}")]
    Submission(String),

    #[error("payment failed: {0}")]
    PaymentDeclined(String),

    /// A newer request for the same input finished first.
    #[error("superseded by a newer request")]
    Superseded,

    #[error("cannot {action} during the {stage} step")]
    InvalidTransition { action: &'static str, stage: Stage },

    #[error("a payment is already being processed")]
    PaymentInFlight,

    #[error(transparent)]
    Cart(#[from] CartError),
}

impl CheckoutError {
    pub(crate) const fn integration(operation: &'static str, source: ApiError) -> Self {
        Self::Integration { operation, source }
    }
}

/// Collaborators the orchestrator talks to.
#[derive(Clone)]
pub struct CheckoutServices {
    pub cart: Arc<dyn CartSource>,
    pub shipping: Arc<dyn ShippingService>,
    pub coupons: Arc<dyn CouponService>,
    pub payments: Arc<dyn PaymentGateway>,
    pub orders: Arc<dyn OrderService>,
    pub accounts: Arc<dyn AccountRegistrar>,
}
