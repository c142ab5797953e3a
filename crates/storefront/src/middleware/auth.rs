//! Customer extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::set_sentry_user;
use crate::models::{CurrentCustomer, session_keys};

/// The signed-in customer, or `None` for a guest.
///
/// A session entry that no longer deserializes is treated as a guest.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(OptionalAuth(customer): OptionalAuth) -> impl IntoResponse {
///     match customer {
///         Some(c) => format!("Hello, {}!", c.email),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct OptionalAuth(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self(None));
        };

        let customer = match session
            .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
            .await
        {
            Ok(customer) => customer,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unreadable customer session entry");
                None
            }
        };

        if let Some(customer) = &customer {
            set_sentry_user(&customer.id, Some(customer.email.as_str()));
        }

        Ok(Self(customer))
    }
}
