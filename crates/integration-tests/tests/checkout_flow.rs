//! End-to-end checkout scenarios against in-memory collaborators.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::Ordering;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use segishop_core::{CartMode, OrderStatus, PaymentMethodKind, PaymentStatus, ShippingOptionId, UserId};
use segishop_integration_tests::{CouponRule, Harness, address, agreements, shipping_option};
use segishop_storefront::cart::{Cart, CartItem, CartSource, GuestCartItem};
use segishop_storefront::checkout::{
    Agreement, Agreements, BillingInfo, CheckoutError, Notice, PaymentResult, PricingBasis,
    RejectionReason, Stage, ValidationError,
};

fn paid(status: PaymentStatus, amount: Decimal) -> PaymentResult {
    PaymentResult {
        status,
        transaction_id: Some("txn_client".to_string()),
        payment_intent_id: Some("pi_client".to_string()),
        payment_method: PaymentMethodKind::CreditCard,
        amount,
        error: (status == PaymentStatus::Failed).then(|| "card_declined".to_string()),
    }
}

// =============================================================================
// Pricing
// =============================================================================

#[tokio::test]
async fn test_estimate_totals_without_address() {
    let harness = Harness::with_subtotal_100().await;
    let checkout = harness.begin().await.unwrap();

    let view = checkout.snapshot();
    assert_eq!(view.pricing, PricingBasis::Estimate);
    assert_eq!(view.totals.subtotal, dec!(100.00));
    assert_eq!(view.totals.shipping_amount, dec!(8.99));
    assert_eq!(view.totals.tax_amount, dec!(8.00));
    assert_eq!(view.totals.total_amount, dec!(116.99));
}

#[tokio::test]
async fn test_authoritative_quote_replaces_estimate() {
    let harness = Harness::with_subtotal_100().await;
    harness.shipping.quote("22201", dec!(5.00), dec!(7.25));
    let checkout = harness.begin().await.unwrap();

    let view = checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();

    assert_eq!(
        view.pricing,
        PricingBasis::Authoritative {
            shipping: dec!(5.00),
            tax: dec!(7.25)
        }
    );
    assert_eq!(view.totals.total_amount, dec!(112.25));
    assert_eq!(view.selected_shipping_option_id, Some(ShippingOptionId::new(1)));
    assert_eq!(view.shipping_options.len(), 2);
}

#[tokio::test]
async fn test_authoritative_never_reverts_to_estimate() {
    let harness = Harness::with_subtotal_100().await;
    let checkout = harness.begin().await.unwrap();
    checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();

    harness.shipping.fail_totals(true);
    let view = checkout
        .select_shipping_option(ShippingOptionId::new(2))
        .await
        .unwrap();

    assert!(view.pricing.is_authoritative());
    assert_eq!(view.totals.total_amount, dec!(112.25));
    assert!(matches!(view.notice, Some(Notice::ShippingUnavailable(_))));
    assert!(!view.calculating.any());
}

#[tokio::test]
async fn test_shipping_outage_keeps_estimate() {
    let harness = Harness::with_subtotal_100().await;
    harness.shipping.fail_options(true);
    let checkout = harness.begin().await.unwrap();

    let view = checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();

    assert_eq!(view.stage, Stage::Review);
    assert_eq!(view.pricing, PricingBasis::Estimate);
    assert_eq!(view.totals.total_amount, dec!(116.99));
    assert!(view.shipping_options.is_empty());
    assert!(matches!(view.notice, Some(Notice::ShippingUnavailable(_))));
    assert_eq!(harness.shipping.totals_calls.load(Ordering::SeqCst), 0);

    // Estimated pricing is still good enough to continue.
    checkout.confirm_review(agreements()).unwrap();
}

#[tokio::test]
async fn test_cart_refresh_on_address_submission() {
    let harness = Harness::with_subtotal_100().await;
    let checkout = harness.begin().await.unwrap();

    harness.add("Tea Tin", dec!(12.50), 2).await;
    let view = checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();

    assert_eq!(view.cart.subtotal, dec!(125.00));
    assert_eq!(view.totals.total_amount, dec!(137.25));
}

// =============================================================================
// Races
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_only_latest_address_quote_applies() {
    let harness = Harness::with_subtotal_100().await;
    harness.shipping.quote("10001", dec!(9.99), dec!(1.00));
    harness.shipping.delay("10001", Duration::from_millis(500));
    harness.shipping.quote("22201", dec!(5.00), dec!(7.25));
    harness.shipping.delay("22201", Duration::from_millis(10));
    let checkout = harness.begin().await.unwrap();

    let (first, second) = tokio::join!(
        checkout.submit_shipping_address(address("10001")),
        checkout.submit_shipping_address(address("22201")),
    );

    assert!(matches!(first, Err(CheckoutError::Superseded)));
    let second = second.unwrap();
    assert_eq!(second.totals.total_amount, dec!(112.25));

    let view = checkout.snapshot();
    assert_eq!(view.shipping_address.unwrap().zip_code, "22201");
    assert_eq!(
        view.pricing,
        PricingBasis::Authoritative {
            shipping: dec!(5.00),
            tax: dec!(7.25)
        }
    );
    assert!(!view.calculating.any());
}

#[tokio::test(start_paused = true)]
async fn test_stale_fast_response_is_dropped() {
    let harness = Harness::with_subtotal_100().await;
    harness.shipping.quote("10001", dec!(9.99), dec!(1.00));
    harness.shipping.delay("10001", Duration::from_millis(10));
    harness.shipping.quote("22201", dec!(5.00), dec!(7.25));
    harness.shipping.delay("22201", Duration::from_millis(300));
    let checkout = harness.begin().await.unwrap();

    let (first, second) = tokio::join!(
        checkout.submit_shipping_address(address("10001")),
        checkout.submit_shipping_address(address("22201")),
    );

    assert!(matches!(first, Err(CheckoutError::Superseded)));
    assert_eq!(second.unwrap().totals.total_amount, dec!(112.25));
    assert_eq!(checkout.snapshot().totals.total_amount, dec!(112.25));
}

#[tokio::test(start_paused = true)]
async fn test_review_blocked_while_recalculating() {
    let harness = Harness::with_subtotal_100().await;
    harness.shipping.delay("22201", Duration::from_millis(200));
    let checkout = harness.begin().await.unwrap();

    checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();

    let pending = {
        let checkout = checkout.clone();
        tokio::spawn(async move {
            checkout
                .select_shipping_option(ShippingOptionId::new(2))
                .await
        })
    };
    tokio::task::yield_now().await;

    assert!(checkout.snapshot().calculating.totals);
    assert!(matches!(
        checkout.confirm_review(agreements()),
        Err(CheckoutError::Validation(ValidationError::TotalsPending))
    ));

    pending.await.unwrap().unwrap();
    checkout.confirm_review(agreements()).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_selection_refused_while_options_load() {
    let harness = Harness::with_subtotal_100().await;
    harness.shipping.offer(
        "11111",
        vec![
            shipping_option(1, "Standard", dec!(5.00)),
            shipping_option(2, "Express", dec!(14.50)),
        ],
    );
    harness
        .shipping
        .offer("22222", vec![shipping_option(3, "Freight", dec!(3.00))]);
    harness.shipping.delay("22222", Duration::from_millis(500));
    let checkout = harness.begin().await.unwrap();
    checkout
        .submit_shipping_address(address("11111"))
        .await
        .unwrap();

    let moving = {
        let checkout = checkout.clone();
        tokio::spawn(async move { checkout.submit_shipping_address(address("22222")).await })
    };
    tokio::task::yield_now().await;

    assert!(checkout.snapshot().calculating.shipping);
    assert!(matches!(
        checkout
            .select_shipping_option(ShippingOptionId::new(2))
            .await,
        Err(CheckoutError::Validation(ValidationError::TotalsPending))
    ));

    let moved = moving.await.unwrap().unwrap();
    assert_eq!(moved.shipping_options.len(), 1);
    assert_eq!(moved.selected_shipping_option_id, Some(ShippingOptionId::new(3)));
    assert_eq!(moved.totals.shipping_amount, dec!(3.00));
    assert_eq!(moved.totals.total_amount, dec!(110.25));

    let view = checkout.snapshot();
    assert_eq!(view.totals, moved.totals);
    assert!(!view.calculating.any());

    let reviewed = checkout.confirm_review(agreements()).unwrap();
    assert_eq!(reviewed.totals.shipping_amount, dec!(3.00));
}

#[tokio::test(start_paused = true)]
async fn test_double_submission_places_one_order() {
    let harness = Harness::with_subtotal_100().await;
    harness.orders.delay(Duration::from_millis(100));
    let checkout = harness.begin().await.unwrap();
    checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();
    checkout.confirm_review(agreements()).unwrap();

    let payment = paid(PaymentStatus::Success, dec!(112.25));
    let (first, second) = tokio::join!(
        checkout.submit_payment(payment.clone()),
        checkout.submit_payment(payment),
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(CheckoutError::PaymentInFlight)));
    assert_eq!(harness.orders.calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Coupons
// =============================================================================

#[tokio::test]
async fn test_coupon_lowers_total_by_exact_discount() {
    let harness = Harness::with_subtotal_100().await;
    harness.coupons.rule("SAVE10", CouponRule::Fixed(dec!(10.00)));
    let checkout = harness.begin().await.unwrap();
    checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();

    let application = checkout.apply_coupon(" save10 ").await.unwrap();

    assert_eq!(application.coupon.code, "SAVE10");
    assert_eq!(application.totals.discount_amount, dec!(10.00));
    assert_eq!(application.totals.total_amount, dec!(102.25));
    assert_eq!(checkout.snapshot().totals, application.totals);
}

#[tokio::test]
async fn test_coupon_apply_remove_round_trip() {
    let harness = Harness::with_subtotal_100().await;
    harness.coupons.rule("SAVE10", CouponRule::Fixed(dec!(10.00)));
    let checkout = harness.begin().await.unwrap();
    let before = checkout.snapshot().totals;

    checkout.apply_coupon("SAVE10").await.unwrap();
    let after = checkout.remove_coupon().unwrap();

    assert_eq!(after, before);
}

#[tokio::test]
async fn test_rejected_coupon_keeps_discount() {
    let harness = Harness::with_subtotal_100().await;
    harness.coupons.rule("SAVE10", CouponRule::Fixed(dec!(10.00)));
    harness
        .coupons
        .rule("OLD", CouponRule::Refused("This coupon has expired".to_string()));
    let checkout = harness.begin().await.unwrap();
    checkout.apply_coupon("SAVE10").await.unwrap();

    let err = checkout.apply_coupon("OLD").await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::CouponRejected(RejectionReason::Expired)
    ));
    let err = checkout.apply_coupon("NOPE").await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::CouponRejected(RejectionReason::NotFound)
    ));

    let view = checkout.snapshot();
    assert_eq!(view.coupon.unwrap().code, "SAVE10");
    assert_eq!(view.totals.discount_amount, dec!(10.00));
    assert!(!view.calculating.coupon);
}

#[tokio::test]
async fn test_coupon_rejection_reasons() {
    let harness = Harness::with_subtotal_100().await;
    harness.coupons.rule(
        "BIGSPEND",
        CouponRule::MinimumSpend {
            minimum: dec!(200.00),
            discount: dec!(25.00),
        },
    );
    harness.coupons.rule("SAVE10", CouponRule::Fixed(dec!(10.00)));
    let checkout = harness.begin().await.unwrap();

    assert!(matches!(
        checkout.apply_coupon("BIGSPEND").await,
        Err(CheckoutError::CouponRejected(
            RejectionReason::MinimumSpendNotMet
        ))
    ));

    checkout.apply_coupon("SAVE10").await.unwrap();
    let calls = harness.coupons.calls.load(Ordering::SeqCst);
    assert!(matches!(
        checkout.apply_coupon("save10").await,
        Err(CheckoutError::CouponRejected(RejectionReason::AlreadyApplied))
    ));
    assert_eq!(harness.coupons.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_coupon_service_outage() {
    let harness = Harness::with_subtotal_100().await;
    harness.coupons.unreachable(true);
    let checkout = harness.begin().await.unwrap();

    let err = checkout.apply_coupon("SAVE10").await.unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Integration {
            operation: "apply coupon",
            ..
        }
    ));
    assert_eq!(checkout.snapshot().totals.discount_amount, Decimal::ZERO);
}

#[tokio::test]
async fn test_free_shipping_coupon_discounts_quoted_shipping() {
    let harness = Harness::with_subtotal_100().await;
    harness.coupons.rule("SHIPFREE", CouponRule::FreeShipping);
    let checkout = harness.begin().await.unwrap();
    checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();

    let application = checkout.apply_coupon("SHIPFREE").await.unwrap();

    assert!(application.coupon.waives_shipping);
    assert_eq!(application.totals.discount_amount, dec!(5.00));
    assert_eq!(application.totals.total_amount, dec!(107.25));
}

// =============================================================================
// Review
// =============================================================================

#[tokio::test]
async fn test_confirm_review_names_missing_agreements() {
    let harness = Harness::with_subtotal_100().await;
    let checkout = harness.begin().await.unwrap();
    checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();

    let err = checkout.confirm_review(Agreements::default()).unwrap_err();
    assert!(matches!(
        &err,
        CheckoutError::Validation(ValidationError::MissingAgreements(missing))
            if missing == &vec![Agreement::TermsOfSale, Agreement::PrivacyPolicy]
    ));
    assert_eq!(
        err.to_string(),
        "please accept the Terms of Sale and Privacy Policy"
    );

    let err = checkout
        .confirm_review(Agreements {
            terms_of_sale: true,
            privacy_policy: false,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Validation(ValidationError::MissingAgreements(missing))
            if missing == vec![Agreement::PrivacyPolicy]
    ));

    let view = checkout.confirm_review(agreements()).unwrap();
    assert_eq!(view.stage, Stage::Payment);
    assert!(view.can_place_order);
}

#[tokio::test]
async fn test_incomplete_address_rejected() {
    let harness = Harness::with_subtotal_100().await;
    let checkout = harness.begin().await.unwrap();
    let mut incomplete = address("22201");
    incomplete.city = String::new();
    incomplete.zip_code = " ".to_string();

    let err = checkout
        .submit_shipping_address(incomplete)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Validation(ValidationError::MissingAddressFields(fields))
            if fields == vec!["city", "zipCode"]
    ));
    assert_eq!(checkout.stage(), Stage::Shipping);
}

#[tokio::test]
async fn test_empty_cart_cannot_check_out() {
    let harness = Harness::default();
    assert!(matches!(
        harness.begin().await,
        Err(CheckoutError::Validation(ValidationError::EmptyCart))
    ));
}

// =============================================================================
// Payment and order placement
// =============================================================================

#[tokio::test]
async fn test_failed_payment_result_places_failed_order() {
    let harness = Harness::with_subtotal_100().await;
    let checkout = harness.begin().await.unwrap();
    checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();
    checkout.confirm_review(agreements()).unwrap();

    let order = checkout
        .submit_payment(paid(PaymentStatus::Failed, dec!(112.25)))
        .await
        .unwrap();

    assert_eq!(order.order_status, OrderStatus::Failed);
    assert_eq!(harness.orders.calls.load(Ordering::SeqCst), 1);
    assert_eq!(checkout.stage(), Stage::Confirmation);

    let request = &harness.orders.requests()[0];
    assert_eq!(request.payment_info.payment_status, PaymentStatus::Failed);
}

#[tokio::test]
async fn test_order_uses_reviewed_totals() {
    let harness = Harness::with_subtotal_100().await;
    harness.coupons.rule("SAVE10", CouponRule::Fixed(dec!(10.00)));
    let checkout = harness.begin().await.unwrap();
    checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();
    checkout.apply_coupon("SAVE10").await.unwrap();
    let reviewed = checkout.confirm_review(agreements()).unwrap().totals;

    let order = checkout
        .pay(PaymentMethodKind::CreditCard, BillingInfo::default())
        .await
        .unwrap();

    let request = &harness.orders.requests()[0];
    assert_eq!(request.totals.total_amount, reviewed.total_amount);
    assert_eq!(request.payment_info.amount, dec!(102.25));
    assert_eq!(request.coupon_code.as_deref(), Some("SAVE10"));
    assert_eq!(request.coupon_discount_amount, Some(dec!(10.00)));
    assert_eq!(request.shipping_method_title.as_deref(), Some("Standard"));
    assert_eq!(request.guest_email.as_deref(), Some("grace@example.com"));
    assert_eq!(request.user_id, None);
    assert_eq!(order.totals, reviewed);
    assert_eq!(order.order_status, OrderStatus::Confirmed);
    assert!(order.estimated_delivery > order.placed_at);
}

#[tokio::test]
async fn test_payment_failure_returns_to_review() {
    let harness = Harness::with_subtotal_100().await;
    harness.payments.answer(PaymentStatus::Failed);
    let checkout = harness.begin().await.unwrap();
    checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();
    checkout.confirm_review(agreements()).unwrap();

    let err = checkout
        .pay(PaymentMethodKind::CreditCard, BillingInfo::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::PaymentDeclined(_)));
    let view = checkout.snapshot();
    assert_eq!(view.stage, Stage::Review);
    assert!(matches!(view.notice, Some(Notice::PaymentFailed(_))));
    assert!(view.order.is_none());
    assert_eq!(harness.orders.calls.load(Ordering::SeqCst), 0);

    harness.payments.answer(PaymentStatus::Success);
    checkout.confirm_review(agreements()).unwrap();
    let order = checkout
        .pay(PaymentMethodKind::CreditCard, BillingInfo::default())
        .await
        .unwrap();
    assert_eq!(order.order_status, OrderStatus::Confirmed);
    assert!(checkout.snapshot().notice.is_none());
}

#[tokio::test]
async fn test_order_rejection_stays_at_payment() {
    let harness = Harness::with_subtotal_100().await;
    harness.orders.refuse_with(Some("Insufficient stock for Gift Hamper"));
    let checkout = harness.begin().await.unwrap();
    checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();
    checkout.confirm_review(agreements()).unwrap();

    let err = checkout
        .submit_payment(paid(PaymentStatus::Success, dec!(112.25)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Submission(ref message) if message == "Insufficient stock for Gift Hamper"
    ));
    let view = checkout.snapshot();
    assert_eq!(view.stage, Stage::Payment);
    assert!(view.order.is_none());
    assert!(view.can_place_order);

    harness.orders.refuse_with(None);
    checkout
        .submit_payment(paid(PaymentStatus::Success, dec!(112.25)))
        .await
        .unwrap();
    assert_eq!(checkout.stage(), Stage::Confirmation);
}

#[tokio::test]
async fn test_guest_registration_failure_still_confirms() {
    let harness = Harness::with_subtotal_100().await;
    harness.accounts.succeed(false);
    let checkout = harness.begin().await.unwrap();
    let mut guest = address("22201");
    guest.create_account = true;
    checkout.submit_shipping_address(guest).await.unwrap();
    checkout.confirm_review(agreements()).unwrap();

    let order = checkout
        .submit_payment(paid(PaymentStatus::Success, dec!(112.25)))
        .await
        .unwrap();

    assert_eq!(checkout.stage(), Stage::Confirmation);
    assert!(!order.account_created);
    assert_eq!(harness.accounts.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_guest_registration_outage_still_confirms() {
    let harness = Harness::with_subtotal_100().await;
    harness.accounts.unreachable(true);
    let checkout = harness.begin().await.unwrap();
    let mut guest = address("22201");
    guest.create_account = true;
    checkout.submit_shipping_address(guest).await.unwrap();
    checkout.confirm_review(agreements()).unwrap();

    let order = checkout
        .submit_payment(paid(PaymentStatus::Success, dec!(112.25)))
        .await
        .unwrap();

    assert!(!order.account_created);
    assert_eq!(order.order_status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_guest_registration_success() {
    let harness = Harness::with_subtotal_100().await;
    let checkout = harness.begin().await.unwrap();
    let mut guest = address("22201");
    guest.create_account = true;
    checkout.submit_shipping_address(guest).await.unwrap();
    checkout.confirm_review(agreements()).unwrap();

    let order = checkout
        .submit_payment(paid(PaymentStatus::Pending, dec!(112.25)))
        .await
        .unwrap();

    assert!(order.account_created);
    assert_eq!(order.order_status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_signed_in_customer_order() {
    let harness = Harness::with_subtotal_100().await;
    let checkout = harness.begin_as(Some(UserId::new(42))).await.unwrap();
    let mut shipping = address("22201");
    shipping.create_account = true;
    checkout.submit_shipping_address(shipping).await.unwrap();
    checkout.confirm_review(agreements()).unwrap();

    checkout
        .submit_payment(paid(PaymentStatus::Success, dec!(112.25)))
        .await
        .unwrap();

    let request = &harness.orders.requests()[0];
    assert_eq!(request.user_id, Some(UserId::new(42)));
    assert_eq!(request.guest_email, None);
    assert_eq!(harness.accounts.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_changes_after_confirmation() {
    let harness = Harness::with_subtotal_100().await;
    let checkout = harness.begin().await.unwrap();
    checkout
        .submit_shipping_address(address("22201"))
        .await
        .unwrap();
    checkout.confirm_review(agreements()).unwrap();
    checkout
        .submit_payment(paid(PaymentStatus::Success, dec!(112.25)))
        .await
        .unwrap();

    assert!(matches!(
        checkout.go_back(Stage::Review),
        Err(CheckoutError::InvalidTransition {
            stage: Stage::Confirmation,
            ..
        })
    ));
    assert!(
        checkout
            .submit_payment(paid(PaymentStatus::Success, dec!(112.25)))
            .await
            .is_err()
    );
    assert_eq!(harness.orders.calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Carts
// =============================================================================

#[test]
fn test_guest_and_server_carts_normalize_alike() {
    let guest = Cart::Guest(vec![GuestCartItem {
        id: "line-1".to_string(),
        product_id: segishop_core::ProductId::new(3),
        product_name: "Gift Box".to_string(),
        product_image: None,
        quantity: 2,
        unit_price: dec!(24.50),
        total_price: dec!(49.00),
        product_attributes: Some(r#"{"size":"L"}"#.to_string()),
    }]);
    let server = Cart::Authenticated(vec![CartItem {
        id: segishop_core::CartItemId::new(7),
        product_id: segishop_core::ProductId::new(3),
        product_name: "Gift Box".to_string(),
        product_slug: "gift-box".to_string(),
        product_price: dec!(24.50),
        product_image: None,
        product_attributes: Some(r#"{"size":"L"}"#.to_string()),
        quantity: 2,
        total_price: dec!(49.00),
        is_in_stock: true,
        stock_quantity: 10,
    }]);

    let guest = guest.normalize();
    let server = server.normalize();

    assert_eq!(guest.mode, CartMode::Guest);
    assert_eq!(server.mode, CartMode::Authenticated);
    assert_eq!(guest.subtotal, server.subtotal);
    assert_eq!(guest.total_items, server.total_items);
    let (g, s) = (&guest.lines[0], &server.lines[0]);
    assert_eq!(
        (g.product_id, &g.name, g.unit_price, g.quantity, g.total_price, &g.attributes),
        (s.product_id, &s.name, s.unit_price, s.quantity, s.total_price, &s.attributes)
    );
}

#[tokio::test]
async fn test_guest_cart_non_positive_quantity_removes_line() {
    let harness = Harness::with_subtotal_100().await;
    harness.add("Tea Tin", dec!(12.50), 1).await;
    let cart = harness.cart.snapshot().await.unwrap().normalize();
    let line_id = cart.lines[1].line_id.clone();

    let cart = harness.cart.update_quantity(&line_id, 0).await.unwrap().normalize();
    assert_eq!(cart.lines.len(), 1);

    let first = cart.lines[0].line_id.clone();
    let cart = harness.cart.update_quantity(&first, -3).await.unwrap().normalize();
    assert!(cart.is_empty());
    assert_eq!(cart.subtotal, Decimal::ZERO);
}
