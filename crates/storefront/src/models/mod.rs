//! Session-stored shopper identity.

pub mod session;

pub use session::{CurrentCustomer, keys as session_keys};
