//! Shipping address captured on the first wizard step.

use serde::{Deserialize, Serialize};

use segishop_core::Email;

use super::ValidationError;

/// Contact and postal details for delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// Street address.
    pub address: String,
    pub apartment: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    /// Guest opted in to having an account created after the order.
    pub create_account: bool,
}

impl ShippingAddress {
    /// Check the fields checkout cannot proceed without and normalize the
    /// contact email.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingAddressFields`] naming every blank
    /// required field, or [`ValidationError::InvalidEmail`].
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        let missing: Vec<&'static str> = [
            ("city", &self.city),
            ("state", &self.state),
            ("zipCode", &self.zip_code),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingAddressFields(missing));
        }

        self.email = Email::parse(&self.email)?.into_inner();
        if self.country.trim().is_empty() {
            self.country = "US".to_string();
        }
        Ok(self)
    }

    /// Whether enough of the address is known to ask for shipping rates.
    #[must_use]
    pub fn is_quotable(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.address,
            &self.city,
            &self.state,
            &self.zip_code,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}
