//! Segishop Storefront library.
//!
//! Checkout orchestration and pricing reconciliation for the Segishop shop,
//! the REST client for the Segishop API, and the JSON surface that exposes
//! both. The binary in `main.rs` only wires these together.
//!
//! # Modules
//!
//! - [`cart`] - Guest and server-side carts, normalized into one snapshot
//! - [`checkout`] - Wizard state machine, pricing, coupons, shipping, payment, orders
//! - [`api`] - Segishop REST API client implementing the checkout contracts
//! - [`routes`] / [`middleware`] - axum handlers, sessions, request ids

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
