//! Best-effort account creation for guests who opted in at checkout.
//!
//! The shopper never sees this password; they set their own through the
//! password reset flow. Registration failures are returned to the caller,
//! which logs and drops them.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use super::address::ShippingAddress;
use crate::api::ApiError;

const PASSWORD_LENGTH: usize = 20;
const PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";

/// Body of `POST /auth/register`.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl std::fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("registration refused: {0}")]
    Refused(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Account registration contract.
#[async_trait]
pub trait AccountRegistrar: Send + Sync {
    async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, ApiError>;
}

/// Random password from letters, digits and `!@#$%^&*`, drawn from the
/// thread-local CSPRNG.
#[must_use]
pub fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..PASSWORD_LENGTH)
        .map(|_| {
            let index = rng.random_range(0..PASSWORD_ALPHABET.len());
            PASSWORD_ALPHABET
                .get(index)
                .map_or('x', |&byte| char::from(byte))
        })
        .collect()
}

/// Register an account for a guest order's contact.
///
/// # Errors
///
/// [`RegistrationError`] when the service refuses or cannot be reached. The
/// order is already placed at this point; callers must not fail on this.
#[instrument(skip_all)]
pub async fn register_guest(
    registrar: &dyn AccountRegistrar,
    address: &ShippingAddress,
) -> Result<(), RegistrationError> {
    let non_blank = |value: &str, fallback: &str| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            fallback.to_string()
        } else {
            trimmed.to_string()
        }
    };

    let request = RegistrationRequest {
        email: address.email.clone(),
        first_name: non_blank(&address.first_name, "Customer"),
        last_name: non_blank(&address.last_name, "Account"),
        password: generate_password(),
    };

    let response = registrar.register(&request).await?;
    if response.success {
        tracing::info!("Guest account created");
        Ok(())
    } else {
        Err(RegistrationError::Refused(
            response
                .message
                .unwrap_or_else(|| "registration was not accepted".to_string()),
        ))
    }
}
