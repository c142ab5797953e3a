//! The checkout wizard state machine.
//!
//! All wizard state sits behind one mutex that is only ever held between
//! awaits. Every async operation follows the same shape: take the lock,
//! validate, bump a generation counter and record what is in flight, release
//! the lock, call the collaborator, then take the lock again and drop the
//! result if a newer request bumped the counter meanwhile.
//!
//! Generation counters:
//!
//! | Counter | Bumped by |
//! |---------|-----------|
//! | `address` | `submit_shipping_address` |
//! | `quote` | `submit_shipping_address`, `select_shipping_option` |
//! | `coupon` | `apply_coupon`, `remove_coupon` |

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use segishop_core::{CurrencyCode, PaymentMethodKind, ShippingOptionId, UserId};

use super::account::register_guest;
use super::address::ShippingAddress;
use super::coupon::{AppliedCoupon, CouponApplication, CouponLedger, normalize_code};
use super::order::{CreateOrderResponse, Order, build_create_order_request};
use super::payment::{BillingInfo, PaymentProcessor, PaymentRequest, PaymentResult};
use super::pricing::{OrderTotals, PricingBasis, PricingRules, compute_totals};
use super::shipping::{ShippingOption, ShippingQuoter, TotalsQuote};
use super::{Agreements, CheckoutError, CheckoutServices, Stage, ValidationError};
use crate::cart::CartSnapshot;

const SHIPPING_UNAVAILABLE: &str =
    "We couldn't calculate shipping for this address. Estimated rates are shown.";
const PAYMENT_DECLINED: &str = "Your payment could not be processed. Please try again.";

/// Which inputs have a recalculation in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculating {
    pub shipping: bool,
    pub totals: bool,
    pub coupon: bool,
}

impl Calculating {
    #[must_use]
    pub const fn any(&self) -> bool {
        self.shipping || self.totals || self.coupon
    }
}

/// Banner shown above the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Notice {
    /// Last payment attempt failed; shown on the review step.
    PaymentFailed(String),
    /// Shipping or tax could not be quoted; current pricing kept.
    ShippingUnavailable(String),
}

/// Read-only view of the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub stage: Stage,
    pub cart: CartSnapshot,
    pub shipping_address: Option<ShippingAddress>,
    pub shipping_options: Vec<ShippingOption>,
    pub selected_shipping_option_id: Option<ShippingOptionId>,
    pub coupon: Option<AppliedCoupon>,
    pub pricing: PricingBasis,
    pub totals: OrderTotals,
    pub calculating: Calculating,
    pub notice: Option<Notice>,
    /// Estimate tier only.
    pub free_shipping_message: Option<String>,
    pub can_place_order: bool,
    pub order: Option<Order>,
}

/// What caused a totals recomputation.
#[derive(Debug, Clone, Copy)]
enum Trigger {
    CartRefreshed,
    AddressChanged,
    OptionSelected,
    CouponChanged,
    QuoteReceived(TotalsQuote),
}

#[derive(Debug)]
struct WizardState {
    stage: Stage,
    cart: CartSnapshot,
    address: Option<ShippingAddress>,
    options: Vec<ShippingOption>,
    selected_option: Option<ShippingOptionId>,
    coupon: Option<AppliedCoupon>,
    basis: PricingBasis,
    totals: OrderTotals,
    calculating: Calculating,
    notice: Option<Notice>,
    order: Option<Order>,
    address_generation: u64,
    quote_generation: u64,
    coupon_generation: u64,
    paying: bool,
}

impl WizardState {
    fn new(cart: CartSnapshot, rules: &PricingRules) -> Self {
        let mut state = Self {
            stage: Stage::Shipping,
            cart,
            address: None,
            options: Vec::new(),
            selected_option: None,
            coupon: None,
            basis: PricingBasis::Estimate,
            totals: OrderTotals::from_parts(
                rust_decimal::Decimal::ZERO,
                rust_decimal::Decimal::ZERO,
                rust_decimal::Decimal::ZERO,
                rust_decimal::Decimal::ZERO,
            ),
            calculating: Calculating::default(),
            notice: None,
            order: None,
            address_generation: 0,
            quote_generation: 0,
            coupon_generation: 0,
            paying: false,
        };
        state.recompute_totals(Trigger::CartRefreshed, rules);
        state
    }

    /// The only writer of `totals`.
    fn recompute_totals(&mut self, trigger: Trigger, rules: &PricingRules) {
        if let Trigger::QuoteReceived(quote) = trigger {
            self.basis = PricingBasis::Authoritative {
                shipping: quote.shipping_cost,
                tax: quote.tax_amount,
            };
        }
        self.totals = compute_totals(self.cart.subtotal, self.basis, rules, self.coupon.as_ref());
        tracing::debug!(
            ?trigger,
            authoritative = self.basis.is_authoritative(),
            total = %self.totals.total_amount,
            "Totals recomputed"
        );
    }

    fn ensure_stage(&self, action: &'static str, allowed: &[Stage]) -> Result<(), CheckoutError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(CheckoutError::InvalidTransition {
                action,
                stage: self.stage,
            })
        }
    }

    fn begin_payment(&mut self) -> Result<(), CheckoutError> {
        self.ensure_stage("pay", &[Stage::Payment])?;
        if self.paying {
            return Err(CheckoutError::PaymentInFlight);
        }
        self.paying = true;
        Ok(())
    }

    fn selected_option(&self) -> Option<&ShippingOption> {
        let id = self.selected_option?;
        self.options.iter().find(|option| option.id == id)
    }

    fn clear_shipping_notice(&mut self) {
        if matches!(self.notice, Some(Notice::ShippingUnavailable(_))) {
            self.notice = None;
        }
    }

    fn view(&self, rules: &PricingRules) -> CheckoutView {
        CheckoutView {
            stage: self.stage,
            cart: self.cart.clone(),
            shipping_address: self.address.clone(),
            shipping_options: self.options.clone(),
            selected_shipping_option_id: self.selected_option,
            coupon: self.coupon.clone(),
            pricing: self.basis,
            totals: self.totals,
            calculating: self.calculating,
            notice: self.notice.clone(),
            free_shipping_message: if self.basis.is_authoritative() {
                None
            } else {
                rules.free_shipping_message(self.cart.subtotal)
            },
            can_place_order: self.stage == Stage::Payment && !self.paying,
            order: self.order.clone(),
        }
    }
}

/// Drives one shopper's checkout from shipping to confirmation.
///
/// Methods take `&self`; share the orchestrator behind an `Arc` and call it
/// concurrently. Overlapping requests for the same input resolve
/// last-write-wins and the losers return [`CheckoutError::Superseded`].
pub struct CheckoutOrchestrator {
    services: CheckoutServices,
    quoter: ShippingQuoter,
    ledger: CouponLedger,
    processor: PaymentProcessor,
    rules: PricingRules,
    customer: Option<UserId>,
    state: Mutex<WizardState>,
}

impl std::fmt::Debug for CheckoutOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutOrchestrator")
            .field("customer", &self.customer)
            .field("rules", &self.rules)
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

impl CheckoutOrchestrator {
    /// Start a checkout from the current cart with estimated totals.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptyCart`] for an empty cart, or the cart source
    /// error.
    #[instrument(skip(services, rules))]
    pub async fn begin(
        services: CheckoutServices,
        rules: PricingRules,
        customer: Option<UserId>,
    ) -> Result<Self, CheckoutError> {
        let cart = services.cart.snapshot().await?.normalize();
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }

        let state = WizardState::new(cart, &rules);
        Ok(Self {
            quoter: ShippingQuoter::new(services.shipping.clone()),
            ledger: CouponLedger::new(services.coupons.clone()),
            processor: PaymentProcessor::new(services.payments.clone()),
            services,
            rules,
            customer,
            state: Mutex::new(state),
        })
    }

    fn state(&self) -> MutexGuard<'_, WizardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub const fn customer(&self) -> Option<UserId> {
        self.customer
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.state().stage
    }

    #[must_use]
    pub fn snapshot(&self) -> CheckoutView {
        self.state().view(&self.rules)
    }

    /// Store the address, move to review, and price shipping for it.
    ///
    /// The cart snapshot is refreshed, shipping options are fetched (the
    /// first one is selected if the current selection is not offered) and
    /// an authoritative quote is requested. Quote failures keep the current
    /// pricing and set a notice.
    ///
    /// # Errors
    ///
    /// Validation errors for incomplete addresses, `InvalidTransition` once
    /// payment has started, `Superseded` if a newer address or selection
    /// won the race.
    #[instrument(skip_all, fields(zip = %address.zip_code))]
    pub async fn submit_shipping_address(
        &self,
        address: ShippingAddress,
    ) -> Result<CheckoutView, CheckoutError> {
        let (address, address_generation, quote_generation) = {
            let mut state = self.state();
            state.ensure_stage(
                "change the shipping address",
                &[Stage::Shipping, Stage::Review],
            )?;
            let address = address.validated().inspect_err(|e| {
                tracing::debug!(error = %e, "Address rejected");
            })?;

            state.address_generation += 1;
            state.quote_generation += 1;
            state.address = Some(address.clone());
            state.stage = Stage::Review;
            state.calculating.shipping = true;
            state.calculating.totals = true;
            state.clear_shipping_notice();
            state.recompute_totals(Trigger::AddressChanged, &self.rules);
            (address, state.address_generation, state.quote_generation)
        };

        let refreshed = match self.services.cart.snapshot().await {
            Ok(cart) => Some(cart.normalize()),
            Err(e) => {
                tracing::warn!(error = %e, "Cart refresh failed, keeping previous snapshot");
                None
            }
        };

        let cart = {
            let mut state = self.state();
            if state.address_generation != address_generation {
                return Err(CheckoutError::Superseded);
            }
            if let Some(cart) = refreshed
                && cart != state.cart
            {
                state.cart = cart;
                state.recompute_totals(Trigger::CartRefreshed, &self.rules);
            }
            state.cart.clone()
        };

        let quote = self.quoter.get_options(&address, &cart).await;

        let selected = {
            let mut state = self.state();
            if state.address_generation != address_generation {
                return Err(CheckoutError::Superseded);
            }
            state.calculating.shipping = false;
            state.options = quote.options;
            let still_offered = state
                .options
                .iter()
                .any(|option| Some(option.id) == state.selected_option);
            if !still_offered {
                state.selected_option = state.options.first().map(|option| option.id);
            }

            if state.quote_generation != quote_generation {
                // A selection made meanwhile owns the totals quote.
                return Ok(state.view(&self.rules));
            }
            if quote.degraded || state.selected_option.is_none() {
                state.calculating.totals = false;
                if quote.degraded {
                    state.notice = Some(Notice::ShippingUnavailable(SHIPPING_UNAVAILABLE.to_string()));
                }
                return Ok(state.view(&self.rules));
            }
            state.selected_option
        };

        self.refresh_quote(&address, &cart, selected, quote_generation)
            .await
    }

    /// Choose one of the offered shipping options and re-quote.
    ///
    /// # Errors
    ///
    /// `TotalsPending` while options for a new address are loading,
    /// `UnknownShippingOption` if `id` is not offered for the current
    /// address, `InvalidTransition` once payment has started, `Superseded`
    /// if a newer selection or address won the race.
    #[instrument(skip(self))]
    pub async fn select_shipping_option(
        &self,
        id: ShippingOptionId,
    ) -> Result<CheckoutView, CheckoutError> {
        let (address, cart, generation) = {
            let mut state = self.state();
            state.ensure_stage(
                "change the shipping method",
                &[Stage::Shipping, Stage::Review],
            )?;
            // The offered list is about to be replaced.
            if state.calculating.shipping {
                return Err(ValidationError::TotalsPending.into());
            }
            let offered = state.options.iter().any(|option| option.id == id);
            let Some(address) = state.address.clone().filter(|_| offered) else {
                return Err(ValidationError::UnknownShippingOption(id).into());
            };

            state.selected_option = Some(id);
            state.quote_generation += 1;
            state.calculating.totals = true;
            state.recompute_totals(Trigger::OptionSelected, &self.rules);
            (address, state.cart.clone(), state.quote_generation)
        };

        self.refresh_quote(&address, &cart, Some(id), generation)
            .await
    }

    async fn refresh_quote(
        &self,
        address: &ShippingAddress,
        cart: &CartSnapshot,
        selected: Option<ShippingOptionId>,
        generation: u64,
    ) -> Result<CheckoutView, CheckoutError> {
        let result = self.quoter.quote_totals(address, cart, selected).await;

        let mut state = self.state();
        if state.quote_generation != generation {
            tracing::debug!(generation, "Dropping superseded totals quote");
            return Err(CheckoutError::Superseded);
        }
        state.calculating.totals = false;
        match result {
            Ok(quote) => {
                state.clear_shipping_notice();
                state.recompute_totals(Trigger::QuoteReceived(quote), &self.rules);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Totals quote failed, keeping current pricing");
                state.notice = Some(Notice::ShippingUnavailable(SHIPPING_UNAVAILABLE.to_string()));
            }
        }
        Ok(state.view(&self.rules))
    }

    /// Validate and apply a coupon code, replacing any applied coupon.
    ///
    /// # Errors
    ///
    /// `EmptyCouponCode`, `CouponRejected` (discount unchanged),
    /// `Integration` when the coupon service is unreachable, `Superseded`
    /// if another apply or remove followed.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str) -> Result<CouponApplication, CheckoutError> {
        let code = normalize_code(code);
        let (generation, applied, totals) = {
            let mut state = self.state();
            state.ensure_stage("change the coupon", &[Stage::Shipping, Stage::Review])?;
            if code.is_empty() {
                return Err(ValidationError::EmptyCouponCode.into());
            }
            state.coupon_generation += 1;
            state.calculating.coupon = true;
            (state.coupon_generation, state.coupon.clone(), state.totals)
        };

        let result = self.ledger.apply(&code, applied.as_ref(), &totals).await;

        let mut state = self.state();
        if state.coupon_generation != generation {
            return Err(CheckoutError::Superseded);
        }
        state.calculating.coupon = false;
        let application = result.inspect_err(|e| {
            tracing::debug!(error = %e, "Coupon not applied");
        })?;

        state.coupon = Some(application.coupon.clone());
        state.recompute_totals(Trigger::CouponChanged, &self.rules);
        Ok(CouponApplication {
            coupon: application.coupon,
            totals: state.totals,
        })
    }

    /// Drop the applied coupon. Also cancels an in-flight apply.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` once payment has started.
    pub fn remove_coupon(&self) -> Result<OrderTotals, CheckoutError> {
        let mut state = self.state();
        state.ensure_stage("change the coupon", &[Stage::Shipping, Stage::Review])?;
        state.coupon_generation += 1;
        state.calculating.coupon = false;
        state.coupon = None;
        state.recompute_totals(Trigger::CouponChanged, &self.rules);
        Ok(state.totals)
    }

    /// Accept the review and move to payment.
    ///
    /// # Errors
    ///
    /// `MissingAgreements` naming each unaccepted agreement, `TotalsPending`
    /// while anything is being recalculated, `EmptyCart`.
    pub fn confirm_review(&self, agreements: Agreements) -> Result<CheckoutView, CheckoutError> {
        let mut state = self.state();
        state.ensure_stage("confirm the review", &[Stage::Review])?;

        let missing = agreements.missing();
        if !missing.is_empty() {
            return Err(ValidationError::MissingAgreements(missing).into());
        }
        if state.cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        if state.calculating.any() {
            return Err(ValidationError::TotalsPending.into());
        }

        state.stage = Stage::Payment;
        Ok(state.view(&self.rules))
    }

    /// Charge the reviewed total through the payment gateway, then place
    /// the order.
    ///
    /// A failed attempt places no order: the wizard returns to review with a
    /// payment-failed notice.
    ///
    /// # Errors
    ///
    /// `PaymentDeclined` for failed attempts, otherwise as
    /// [`submit_payment`](Self::submit_payment).
    #[instrument(skip(self, billing))]
    pub async fn pay(
        &self,
        method: PaymentMethodKind,
        billing: BillingInfo,
    ) -> Result<Order, CheckoutError> {
        let request = {
            let mut state = self.state();
            state.begin_payment()?;
            PaymentRequest {
                amount: state.totals.total_amount,
                currency: CurrencyCode::USD,
                method,
                billing,
            }
        };

        let result = self.processor.execute(&request).await;
        if result.is_failure() {
            let message = result
                .error
                .clone()
                .unwrap_or_else(|| PAYMENT_DECLINED.to_string());
            let mut state = self.state();
            state.paying = false;
            state.stage = Stage::Review;
            state.notice = Some(Notice::PaymentFailed(message.clone()));
            return Err(CheckoutError::PaymentDeclined(message));
        }

        self.process_order(result).await
    }

    /// Place the order for a payment completed outside the orchestrator.
    ///
    /// The order status follows the payment status, so a failed payment
    /// yields a failed order. The result is consumed once: a concurrent
    /// second submission is refused.
    ///
    /// # Errors
    ///
    /// `PaymentInFlight`, `Submission` when the order service refuses,
    /// `Integration` when it is unreachable. The wizard stays at payment.
    #[instrument(skip_all, fields(status = ?payment.status))]
    pub async fn submit_payment(&self, payment: PaymentResult) -> Result<Order, CheckoutError> {
        self.state().begin_payment()?;
        self.process_order(payment).await
    }

    async fn process_order(&self, payment: PaymentResult) -> Result<Order, CheckoutError> {
        let outcome = self.place_order(payment).await;

        let mut state = self.state();
        state.paying = false;
        let order = outcome?;
        state.stage = Stage::Confirmation;
        state.notice = None;
        state.order = Some(order.clone());
        Ok(order)
    }

    async fn place_order(&self, payment: PaymentResult) -> Result<Order, CheckoutError> {
        let (cart, address, totals, request) = {
            let state = self.state();
            let address = state.address.clone().ok_or_else(|| {
                ValidationError::MissingAddressFields(vec!["city", "state", "zipCode"])
            })?;
            let request = build_create_order_request(
                self.customer,
                &state.cart,
                &address,
                &payment,
                &state.totals,
                state.coupon.as_ref(),
                state.selected_option(),
            );
            (state.cart.clone(), address, state.totals, request)
        };

        let response = self
            .services
            .orders
            .create_order(&request)
            .await
            .map_err(|e| CheckoutError::integration("create order", e))?;

        let placed = match response {
            CreateOrderResponse {
                success: true,
                order: Some(placed),
                ..
            } => placed,
            CreateOrderResponse { message, .. } => {
                let message = message.unwrap_or_else(|| "Failed to create order".to_string());
                tracing::warn!(%message, "Order service refused the order");
                return Err(CheckoutError::Submission(message));
            }
        };
        tracing::info!(
            order_number = %placed.order_number,
            order_id = %placed.id,
            status = payment.status.as_str(),
            "Order created"
        );

        let account_created = if self.customer.is_none() && address.create_account {
            // Registration never blocks the order.
            match register_guest(self.services.accounts.as_ref(), &address).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "Guest account registration failed");
                    false
                }
            }
        } else {
            false
        };

        Ok(Order::new(
            placed,
            &cart,
            address,
            payment,
            totals,
            account_created,
            Utc::now(),
        ))
    }

    /// Step back without discarding anything entered so far.
    ///
    /// Only review to shipping and payment to review are allowed.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for any other move or while a payment is being
    /// processed.
    pub fn go_back(&self, target: Stage) -> Result<CheckoutView, CheckoutError> {
        let mut state = self.state();
        let allowed = matches!(
            (state.stage, target),
            (Stage::Review, Stage::Shipping) | (Stage::Payment, Stage::Review)
        );
        if !allowed || state.paying {
            return Err(CheckoutError::InvalidTransition {
                action: "go back",
                stage: state.stage,
            });
        }
        state.stage = target;
        Ok(state.view(&self.rules))
    }
}
