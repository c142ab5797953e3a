//! Session middleware configuration.
//!
//! Sessions live in memory: they carry only the shopper key and the
//! customer identity written by the login flow.

use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};
use uuid::Uuid;

use crate::config::StorefrontConfig;
use crate::models::session_keys;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "segishop_session";

/// Create the session layer. Sessions expire after the checkout session TTL
/// of inactivity.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    let idle_seconds = i64::try_from(config.checkout_session_ttl.as_secs()).unwrap_or(i64::MAX);

    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(idle_seconds),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// The shopper key of this session, minted on first use.
///
/// # Errors
///
/// Returns an error if the session store cannot be read or written.
pub async fn shopper_key(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(key) = session.get::<String>(session_keys::SHOPPER_ID).await? {
        return Ok(key);
    }

    let key = Uuid::new_v4().to_string();
    session.insert(session_keys::SHOPPER_ID, &key).await?;
    tracing::debug!("New shopper session");
    Ok(key)
}
