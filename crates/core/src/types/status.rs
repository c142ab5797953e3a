//! Status enums shared by the checkout and the order service.

use serde::{Deserialize, Serialize};

/// Outcome reported by a payment attempt.
///
/// Wire values are lowercase. Anything the gateway reports that is not one of
/// the known values deserializes to [`PaymentStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Success,
    Pending,
    Failed,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Wire representation, as sent in `paymentInfo.paymentStatus`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

/// Status of a placed order, as shown on the confirmation page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Failed,
}

impl From<PaymentStatus> for OrderStatus {
    /// Only a successful payment confirms an order. Unknown statuses fail.
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Success => Self::Confirmed,
            PaymentStatus::Pending => Self::Pending,
            PaymentStatus::Failed | PaymentStatus::Unknown => Self::Failed,
        }
    }
}

/// Whether a cart belongs to a guest session or a signed-in customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CartMode {
    #[default]
    Guest,
    Authenticated,
}

/// Payment method chosen on the payment step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    CreditCard,
    Paypal,
    ApplePay,
    GooglePay,
}

impl PaymentMethodKind {
    /// Wire representation, as sent in `paymentInfo.paymentMethod`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Paypal => "paypal",
            Self::ApplePay => "apple_pay",
            Self::GooglePay => "google_pay",
        }
    }
}

impl std::fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
