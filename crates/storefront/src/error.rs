//! Unified error handling with Sentry integration.
//!
//! Handlers return [`Result<T>`]. Failures of the API or of the server itself
//! are captured to Sentry before responding; shopper mistakes are not.
//! Responses carry `{ "error": message, "code": code }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::cart::CartError;
use crate::checkout::{CheckoutError, ValidationError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Cart(#[from] CartError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

struct Classified {
    status: StatusCode,
    code: &'static str,
    report: bool,
}

const fn classified(status: StatusCode, code: &'static str, report: bool) -> Classified {
    Classified {
        status,
        code,
        report,
    }
}

fn classify_cart(err: &CartError) -> Classified {
    match err {
        CartError::ItemNotFound(_) => classified(StatusCode::NOT_FOUND, "cart_item_not_found", false),
        CartError::InvalidQuantity => {
            classified(StatusCode::UNPROCESSABLE_ENTITY, "invalid_quantity", false)
        }
        CartError::InvalidPrice => classified(StatusCode::UNPROCESSABLE_ENTITY, "invalid_price", false),
        CartError::Rejected(_) => classified(StatusCode::UNPROCESSABLE_ENTITY, "cart_rejected", false),
        CartError::Api(_) => classified(StatusCode::BAD_GATEWAY, "upstream_error", true),
    }
}

fn classify_checkout(err: &CheckoutError) -> Classified {
    match err {
        CheckoutError::Validation(ValidationError::TotalsPending) => {
            classified(StatusCode::CONFLICT, "totals_pending", false)
        }
        CheckoutError::Validation(_) => {
            classified(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", false)
        }
        CheckoutError::CouponRejected(_) => {
            classified(StatusCode::UNPROCESSABLE_ENTITY, "coupon_rejected", false)
        }
        CheckoutError::Integration { .. } => {
            classified(StatusCode::BAD_GATEWAY, "upstream_error", true)
        }
        CheckoutError::Submission(_) => {
            classified(StatusCode::UNPROCESSABLE_ENTITY, "order_rejected", false)
        }
        CheckoutError::PaymentDeclined(_) => {
            classified(StatusCode::PAYMENT_REQUIRED, "payment_failed", false)
        }
        CheckoutError::Superseded => classified(StatusCode::CONFLICT, "superseded", false),
        CheckoutError::InvalidTransition { .. } => {
            classified(StatusCode::CONFLICT, "invalid_transition", false)
        }
        CheckoutError::PaymentInFlight => {
            classified(StatusCode::CONFLICT, "payment_in_flight", false)
        }
        CheckoutError::Cart(err) => classify_cart(err),
    }
}

impl AppError {
    fn classify(&self) -> Classified {
        match self {
            Self::Checkout(err) => classify_checkout(err),
            Self::Cart(err) => classify_cart(err),
            Self::Session(_) | Self::Internal(_) => {
                classified(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", true)
            }
            Self::NotFound(_) => classified(StatusCode::NOT_FOUND, "not_found", false),
            Self::BadRequest(_) => classified(StatusCode::BAD_REQUEST, "bad_request", false),
        }
    }

    /// Message safe to show the shopper.
    fn public_message(&self, classified: &Classified) -> String {
        match classified.status {
            StatusCode::BAD_GATEWAY => "External service error".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => match self {
                Self::Checkout(CheckoutError::CouponRejected(reason)) => reason.to_string(),
                Self::Checkout(
                    CheckoutError::Submission(message) | CheckoutError::PaymentDeclined(message),
                ) => message.clone(),
                _ => self.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let classified = self.classify();

        if classified.report {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, code = classified.code, "Request rejected");
        }

        let body = ErrorBody {
            error: self.public_message(&classified),
            code: classified.code,
        };
        (classified.status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Associate Sentry events on this hub with a signed-in customer.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for a shopper action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Shipping option selected", Some(&[("option_id", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
