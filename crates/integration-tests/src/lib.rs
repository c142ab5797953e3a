//! Integration tests for Segishop checkout.
//!
//! The tests under `tests/` drive the real [`CheckoutOrchestrator`] against
//! the in-memory collaborators defined here. Each fake records how often it
//! was called and can be told to fail or to answer slowly; slow answers use
//! `tokio::time::sleep`, so tests that race requests run with a paused clock.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p segishop-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use segishop_core::{CouponId, OrderId, PaymentStatus, ProductId, ShippingOptionId, UserId};
use segishop_storefront::api::ApiError;
use segishop_storefront::cart::{CartSource, GuestCart, NewCartItem};
use segishop_storefront::checkout::{
    AccountRegistrar, Agreements, CheckoutError, CheckoutOrchestrator, CheckoutServices,
    CouponDetails, CouponOrderTotals, CouponRequest, CouponResponse, CouponService, CreateOrderRequest,
    CreateOrderResponse, OrderService, PaymentGateway, PaymentRequest, PaymentResult, PlacedOrder,
    PricingRules, RegistrationRequest, RegistrationResponse, ShippingAddress, ShippingOption,
    ShippingQuoteRequest, ShippingService, TotalsQuote, TotalsQuoteRequest,
};

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable(service: &str) -> ApiError {
    ApiError::Api {
        status: 503,
        message: format!("{service} unavailable"),
    }
}

// =============================================================================
// Shipping
// =============================================================================

/// Shipping and totals service with per-zip quotes and delays.
pub struct FakeShipping {
    options: Vec<ShippingOption>,
    offers: Mutex<HashMap<String, Vec<ShippingOption>>>,
    quotes: Mutex<HashMap<String, (Decimal, Decimal)>>,
    delays: Mutex<HashMap<String, Duration>>,
    fail_options: AtomicBool,
    fail_totals: AtomicBool,
    pub option_calls: AtomicUsize,
    pub totals_calls: AtomicUsize,
}

impl Default for FakeShipping {
    fn default() -> Self {
        Self {
            options: vec![
                shipping_option(1, "Standard", dec!(5.00)),
                shipping_option(2, "Express", dec!(14.50)),
            ],
            offers: Mutex::new(HashMap::new()),
            quotes: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            fail_options: AtomicBool::new(false),
            fail_totals: AtomicBool::new(false),
            option_calls: AtomicUsize::new(0),
            totals_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeShipping {
    /// Quote `shipping`/`tax` for `zip`. Unlisted zips quote $5.00 / $7.25.
    pub fn quote(&self, zip: &str, shipping: Decimal, tax: Decimal) {
        locked(&self.quotes).insert(zip.to_string(), (shipping, tax));
    }

    /// Offer `options` for `zip` instead of Standard and Express. Unless
    /// [`quote`](Self::quote) says otherwise, the zip's quotes charge the
    /// selected option's price with $7.25 tax.
    pub fn offer(&self, zip: &str, options: Vec<ShippingOption>) {
        locked(&self.offers).insert(zip.to_string(), options);
    }

    /// Answer requests for `zip` after `delay`.
    pub fn delay(&self, zip: &str, delay: Duration) {
        locked(&self.delays).insert(zip.to_string(), delay);
    }

    pub fn fail_options(&self, fail: bool) {
        self.fail_options.store(fail, Ordering::SeqCst);
    }

    pub fn fail_totals(&self, fail: bool) {
        self.fail_totals.store(fail, Ordering::SeqCst);
    }

    async fn wait_for(&self, zip: &str) {
        let delay = locked(&self.delays).get(zip).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[must_use]
pub fn shipping_option(id: i32, title: &str, price: Decimal) -> ShippingOption {
    ShippingOption {
        id: ShippingOptionId::new(id),
        title: title.to_string(),
        price,
        eta_description: "3-5 business days".to_string(),
        method_type: "FlatRate".to_string(),
        is_taxable: false,
    }
}

#[async_trait]
impl ShippingService for FakeShipping {
    async fn calculate_options(
        &self,
        request: &ShippingQuoteRequest,
    ) -> Result<Vec<ShippingOption>, ApiError> {
        self.option_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for(&request.address.zip_code).await;
        if self.fail_options.load(Ordering::SeqCst) {
            return Err(unavailable("shipping"));
        }
        let offered = locked(&self.offers).get(&request.address.zip_code).cloned();
        Ok(offered.unwrap_or_else(|| self.options.clone()))
    }

    async fn calculate_totals(&self, request: &TotalsQuoteRequest) -> Result<TotalsQuote, ApiError> {
        self.totals_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for(&request.address.zip_code).await;
        if self.fail_totals.load(Ordering::SeqCst) {
            return Err(unavailable("totals"));
        }
        let zip = &request.address.zip_code;
        let quoted = locked(&self.quotes).get(zip).copied();
        let (shipping_cost, tax_amount) = quoted.unwrap_or_else(|| {
            let selected_price = locked(&self.offers).get(zip).and_then(|options| {
                options
                    .iter()
                    .find(|option| Some(option.id) == request.selected_option_id)
                    .map(|option| option.price)
            });
            (selected_price.unwrap_or(dec!(5.00)), dec!(7.25))
        });
        Ok(TotalsQuote {
            subtotal: request.subtotal,
            shipping_cost,
            tax_amount,
        })
    }
}

// =============================================================================
// Coupons
// =============================================================================

/// How the fake coupon service treats a code.
#[derive(Debug, Clone)]
pub enum CouponRule {
    Fixed(Decimal),
    FreeShipping,
    /// Zero discount below this subtotal, otherwise `discount`.
    MinimumSpend { minimum: Decimal, discount: Decimal },
    Refused(String),
}

/// Coupon service keyed by upper-case code. Unknown codes are invalid.
#[derive(Default)]
pub struct FakeCoupons {
    rules: Mutex<HashMap<String, CouponRule>>,
    unreachable: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeCoupons {
    pub fn rule(&self, code: &str, rule: CouponRule) {
        locked(&self.rules).insert(code.to_string(), rule);
    }

    pub fn unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

fn accepted(code: &str, discount: Decimal, free_shipping: bool) -> CouponResponse {
    CouponResponse {
        success: true,
        message: None,
        coupon: Some(CouponDetails {
            id: CouponId::new(1),
            code: code.to_string(),
            description: None,
            kind: if free_shipping { "FreeShipping" } else { "FixedAmount" }.to_string(),
        }),
        order_totals: Some(CouponOrderTotals {
            discount_amount: discount,
            shipping_discount: None,
            free_shipping_applied: free_shipping,
        }),
    }
}

fn refused(message: &str) -> CouponResponse {
    CouponResponse {
        success: false,
        message: Some(message.to_string()),
        coupon: None,
        order_totals: None,
    }
}

#[async_trait]
impl CouponService for FakeCoupons {
    async fn apply(&self, request: &CouponRequest) -> Result<CouponResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(unavailable("coupons"));
        }

        let rule = locked(&self.rules).get(&request.code).cloned();
        Ok(match rule {
            None => refused("Invalid coupon code"),
            Some(CouponRule::Fixed(discount)) => accepted(&request.code, discount, false),
            Some(CouponRule::FreeShipping) => accepted(&request.code, Decimal::ZERO, true),
            Some(CouponRule::MinimumSpend { minimum, discount }) => {
                let discount = if request.order_subtotal < minimum {
                    Decimal::ZERO
                } else {
                    discount
                };
                accepted(&request.code, discount, false)
            }
            Some(CouponRule::Refused(message)) => refused(&message),
        })
    }
}

// =============================================================================
// Payments
// =============================================================================

/// Payment gateway answering with a fixed status.
pub struct FakePayments {
    status: Mutex<PaymentStatus>,
    pub calls: AtomicUsize,
}

impl Default for FakePayments {
    fn default() -> Self {
        Self {
            status: Mutex::new(PaymentStatus::Success),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakePayments {
    pub fn answer(&self, status: PaymentStatus) {
        *locked(&self.status) = status;
    }
}

#[async_trait]
impl PaymentGateway for FakePayments {
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentResult, ApiError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let status = *locked(&self.status);
        if status == PaymentStatus::Failed {
            return Ok(PaymentResult::failed(
                request.method,
                request.amount,
                "Your card was declined.",
            ));
        }
        Ok(PaymentResult {
            status,
            transaction_id: Some(format!("txn_{n}")),
            payment_intent_id: None,
            payment_method: request.method,
            amount: request.amount,
            error: None,
        })
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order service recording every request.
#[derive(Default)]
pub struct FakeOrders {
    refusal: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    requests: Mutex<Vec<CreateOrderRequest>>,
    pub calls: AtomicUsize,
}

impl FakeOrders {
    pub fn refuse_with(&self, message: Option<&str>) {
        *locked(&self.refusal) = message.map(String::from);
    }

    pub fn delay(&self, delay: Duration) {
        *locked(&self.delay) = Some(delay);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<CreateOrderRequest> {
        locked(&self.requests).clone()
    }
}

#[async_trait]
impl OrderService for FakeOrders {
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, ApiError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *locked(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        locked(&self.requests).push(request.clone());

        let refusal = locked(&self.refusal).clone();
        Ok(match refusal {
            Some(message) => CreateOrderResponse {
                success: false,
                message: Some(message),
                order: None,
            },
            None => CreateOrderResponse {
                success: true,
                message: Some("Order created successfully".to_string()),
                order: Some(PlacedOrder {
                    id: OrderId::new(1_000 + i32::try_from(n).unwrap_or(0)),
                    order_number: format!("SEG-{:06}", 1_000 + n),
                }),
            },
        })
    }
}

// =============================================================================
// Accounts
// =============================================================================

/// Account registrar answering with a fixed outcome.
pub struct FakeRegistrar {
    success: AtomicBool,
    unreachable: AtomicBool,
    pub calls: AtomicUsize,
}

impl Default for FakeRegistrar {
    fn default() -> Self {
        Self {
            success: AtomicBool::new(true),
            unreachable: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeRegistrar {
    pub fn succeed(&self, success: bool) {
        self.success.store(success, Ordering::SeqCst);
    }

    pub fn unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountRegistrar for FakeRegistrar {
    async fn register(
        &self,
        _request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(unavailable("auth"));
        }
        let success = self.success.load(Ordering::SeqCst);
        Ok(RegistrationResponse {
            success,
            message: (!success).then(|| "User with this email already exists".to_string()),
        })
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A guest cart plus one of each fake, wired into [`CheckoutServices`].
#[derive(Default)]
pub struct Harness {
    pub cart: Arc<GuestCart>,
    pub shipping: Arc<FakeShipping>,
    pub coupons: Arc<FakeCoupons>,
    pub payments: Arc<FakePayments>,
    pub orders: Arc<FakeOrders>,
    pub accounts: Arc<FakeRegistrar>,
    next_product: AtomicI32,
}

impl Harness {
    /// Harness whose cart holds one $100.00 line.
    pub async fn with_subtotal_100() -> Self {
        let harness = Self::default();
        harness.add("Gift Hamper", dec!(100.00), 1).await;
        harness
    }

    pub async fn add(&self, name: &str, unit_price: Decimal, quantity: u32) {
        let product_id = ProductId::new(self.next_product.fetch_add(1, Ordering::SeqCst) + 1);
        self.cart
            .add_item(NewCartItem {
                product_id,
                product_name: name.to_string(),
                product_image: None,
                unit_price,
                quantity,
                product_attributes: None,
            })
            .await
            .unwrap_or_else(|e| panic!("adding {name} to the cart failed: {e}"));
    }

    #[must_use]
    pub fn services(&self) -> CheckoutServices {
        CheckoutServices {
            cart: self.cart.clone(),
            shipping: self.shipping.clone(),
            coupons: self.coupons.clone(),
            payments: self.payments.clone(),
            orders: self.orders.clone(),
            accounts: self.accounts.clone(),
        }
    }

    /// Begin a guest checkout with default pricing rules.
    ///
    /// # Errors
    ///
    /// Whatever [`CheckoutOrchestrator::begin`] returns.
    pub async fn begin(&self) -> Result<Arc<CheckoutOrchestrator>, CheckoutError> {
        self.begin_as(None).await
    }

    /// Begin a checkout for `customer` (or a guest).
    ///
    /// # Errors
    ///
    /// Whatever [`CheckoutOrchestrator::begin`] returns.
    pub async fn begin_as(
        &self,
        customer: Option<UserId>,
    ) -> Result<Arc<CheckoutOrchestrator>, CheckoutError> {
        CheckoutOrchestrator::begin(self.services(), PricingRules::default(), customer)
            .await
            .map(Arc::new)
    }
}

/// A complete, quotable address in `zip`.
#[must_use]
pub fn address(zip: &str) -> ShippingAddress {
    ShippingAddress {
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: "grace@example.com".to_string(),
        phone: "555-0100".to_string(),
        address: "1 Compiler Court".to_string(),
        city: "Arlington".to_string(),
        state: "VA".to_string(),
        zip_code: zip.to_string(),
        country: "US".to_string(),
        ..ShippingAddress::default()
    }
}

/// Both agreements accepted.
#[must_use]
pub const fn agreements() -> Agreements {
    Agreements {
        terms_of_sale: true,
        privacy_policy: true,
    }
}
