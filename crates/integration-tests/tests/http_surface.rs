//! JSON surface tests driving the router without a network listener.
//!
//! Only guest flows run here: they touch the session cart and nothing
//! upstream, so the API base URL points at a closed port.

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use segishop_storefront::config::StorefrontConfig;
use segishop_storefront::middleware::REQUEST_ID_HEADER;
use segishop_storefront::routes;
use segishop_storefront::state::AppState;

fn app() -> Router {
    let config = StorefrontConfig::from_lookup(|key| match key {
        "SEGISHOP_API_BASE_URL" => Some("http://127.0.0.1:9/api".to_string()),
        "STOREFRONT_BASE_URL" => Some("http://localhost:3000".to_string()),
        _ => None,
    })
    .unwrap();

    routes::app(AppState::new(config).unwrap())
}

/// Minimal client that keeps the session cookie between requests.
struct Client {
    app: Router,
    cookie: Option<String>,
}

impl Client {
    fn new() -> Self {
        Self {
            app: app(),
            cookie: None,
        }
    }

    async fn send(&mut self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn add_hamper(&mut self) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/cart/items",
            Some(json!({
                "productId": 11,
                "productName": "Gift Hamper",
                "unitPrice": "50.00",
                "quantity": 2
            })),
        )
        .await
    }
}

#[tokio::test]
async fn test_new_session_has_empty_guest_cart() {
    let mut client = Client::new();

    let (status, body) = client.send(Method::GET, "/cart", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "guest");
    assert_eq!(body["lines"], json!([]));
    assert_eq!(body["totalItems"], 0);
    assert!(client.cookie.as_deref().unwrap().starts_with("segishop_session="));
}

#[tokio::test]
async fn test_cart_persists_across_requests() {
    let mut client = Client::new();

    let (status, body) = client.add_hamper().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalItems"], 2);

    let (_, body) = client.send(Method::GET, "/cart", None).await;
    assert_eq!(body["lines"][0]["name"], "Gift Hamper");
    assert_eq!(body["lines"][0]["quantity"], 2);

    let line_id = body["lines"][0]["lineId"].as_str().unwrap().to_string();
    let (status, body) = client
        .send(
            Method::PUT,
            &format!("/cart/items/{line_id}"),
            Some(json!({ "quantity": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"], json!([]));
}

#[tokio::test]
async fn test_unknown_cart_line_is_not_found() {
    let mut client = Client::new();

    let (status, body) = client
        .send(Method::DELETE, "/cart/items/missing", None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "cart_item_not_found");
}

#[tokio::test]
async fn test_negative_price_is_rejected() {
    let mut client = Client::new();

    let (status, body) = client
        .send(
            Method::POST,
            "/cart/items",
            Some(json!({
                "productId": 12,
                "productName": "Store Credit",
                "unitPrice": "-45.01",
                "quantity": 1
            })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_price");

    let (_, body) = client.send(Method::GET, "/cart", None).await;
    assert_eq!(body["lines"], json!([]));
}

#[tokio::test]
async fn test_checkout_requires_items() {
    let mut client = Client::new();

    let (status, body) = client.send(Method::POST, "/checkout", None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");
    assert_eq!(body["error"], "your cart is empty");
}

#[tokio::test]
async fn test_checkout_starts_with_estimate() {
    let mut client = Client::new();
    client.add_hamper().await;

    let (status, body) = client.send(Method::POST, "/checkout", None).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["stage"], "shipping");
    assert_eq!(body["pricing"]["tier"], "estimate");
    assert_eq!(body["totals"]["totalAmount"], "116.99");
    assert_eq!(
        body["freeShippingMessage"],
        "Add $20.00 more for free shipping"
    );

    let (status, body) = client.send(Method::GET, "/checkout", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cart"]["subtotal"], "100.00");
}

#[tokio::test]
async fn test_review_before_address_is_invalid_transition() {
    let mut client = Client::new();
    client.add_hamper().await;
    client.send(Method::POST, "/checkout", None).await;

    let (status, body) = client
        .send(
            Method::POST,
            "/checkout/review",
            Some(json!({ "termsOfSale": true, "privacyPolicy": true })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");
}

#[tokio::test]
async fn test_blank_coupon_is_validation_error() {
    let mut client = Client::new();
    client.add_hamper().await;
    client.send(Method::POST, "/checkout", None).await;

    let (status, body) = client
        .send(Method::POST, "/checkout/coupon", Some(json!({ "code": "   " })))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");
    assert_eq!(body["error"], "enter a coupon code");
}

#[tokio::test]
async fn test_no_checkout_without_session() {
    let mut client = Client::new();

    let (status, body) = client.send(Method::GET, "/checkout", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_health_reports_version() {
    let mut client = Client::new();

    let (status, body) = client.send(Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "edge-42")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "edge-42");
}
