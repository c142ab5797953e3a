//! Session-related types.
//!
//! The storefront does not sign customers in itself. An external login flow
//! writes [`CurrentCustomer`] under [`keys::CURRENT_CUSTOMER`]; the storefront
//! only reads it.

use serde::{Deserialize, Serialize};

use segishop_core::{Email, UserId};

/// Signed-in customer as recorded in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentCustomer {
    pub id: UserId,
    pub email: Email,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Session keys.
pub mod keys {
    /// Signed-in customer, if any.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Opaque key of the shopper's in-memory state (guest cart, checkout).
    pub const SHOPPER_ID: &str = "shopper_id";
}
