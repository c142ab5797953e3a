//! Order total computation.
//!
//! Totals are always derived whole from their inputs:
//! `subtotal + shipping + tax - discount`, with the discount clamped so the
//! total never goes below zero. Nothing patches a single field of an existing
//! [`OrderTotals`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use segishop_core::{Price, round_money};

use super::coupon::AppliedCoupon;

/// Estimate-tier constants used before an authoritative quote exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingRules {
    /// Subtotals at or above this ship free.
    pub free_shipping_threshold: Decimal,
    pub flat_shipping_rate: Decimal,
    /// Fraction of the pre-discount subtotal, e.g. `0.08`.
    pub default_tax_rate: Decimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Decimal::new(120_00, 2),
            flat_shipping_rate: Decimal::new(8_99, 2),
            default_tax_rate: Decimal::new(8, 2),
        }
    }
}

impl PricingRules {
    #[must_use]
    pub fn estimate_shipping(&self, subtotal: Decimal) -> Decimal {
        if subtotal >= self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            round_money(self.flat_shipping_rate)
        }
    }

    #[must_use]
    pub fn estimate_tax(&self, subtotal: Decimal) -> Decimal {
        round_money(subtotal * self.default_tax_rate)
    }

    /// Amount still needed to reach free shipping; zero once reached.
    #[must_use]
    pub fn estimate_free_shipping_gap(&self, subtotal: Decimal) -> Decimal {
        round_money((self.free_shipping_threshold - subtotal).max(Decimal::ZERO))
    }

    /// Banner text for the cart preview, e.g. "Add $20.00 more for free shipping".
    #[must_use]
    pub fn free_shipping_message(&self, subtotal: Decimal) -> Option<String> {
        let gap = self.estimate_free_shipping_gap(subtotal);
        (!gap.is_zero()).then(|| format!("Add {} more for free shipping", Price::usd(gap).display()))
    }
}

/// Where shipping and tax come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "camelCase")]
pub enum PricingBasis {
    /// Derived from [`PricingRules`].
    Estimate,
    /// Quoted by the totals service for the current address and option.
    Authoritative { shipping: Decimal, tax: Decimal },
}

impl PricingBasis {
    #[must_use]
    pub const fn is_authoritative(&self) -> bool {
        matches!(self, Self::Authoritative { .. })
    }
}

fn non_negative(amount: Decimal) -> Decimal {
    round_money(amount).max(Decimal::ZERO)
}

/// The single source of truth for what the shopper will pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping_amount: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl OrderTotals {
    /// Assemble totals from components. Negative components count as zero
    /// and the discount never exceeds the gross, so the total is never
    /// negative.
    #[must_use]
    pub fn from_parts(
        subtotal: Decimal,
        shipping: Decimal,
        tax: Decimal,
        requested_discount: Decimal,
    ) -> Self {
        let subtotal = non_negative(subtotal);
        let shipping_amount = non_negative(shipping);
        let tax_amount = non_negative(tax);
        let gross = subtotal + shipping_amount + tax_amount;
        let discount_amount = non_negative(requested_discount).min(gross);

        Self {
            subtotal,
            shipping_amount,
            tax_amount,
            discount_amount,
            total_amount: gross - discount_amount,
        }
    }

    /// The same totals with a different discount term.
    #[must_use]
    pub fn with_discount(&self, requested_discount: Decimal) -> Self {
        Self::from_parts(
            self.subtotal,
            self.shipping_amount,
            self.tax_amount,
            requested_discount,
        )
    }
}

/// Compute totals for a subtotal under the given basis and coupon.
///
/// Estimate-tier tax is taken on the pre-discount subtotal. A coupon that
/// waives shipping adds the shipping amount to its discount.
#[must_use]
pub fn compute_totals(
    subtotal: Decimal,
    basis: PricingBasis,
    rules: &PricingRules,
    coupon: Option<&AppliedCoupon>,
) -> OrderTotals {
    let (shipping, tax) = match basis {
        PricingBasis::Estimate => (rules.estimate_shipping(subtotal), rules.estimate_tax(subtotal)),
        PricingBasis::Authoritative { shipping, tax } => (shipping, tax),
    };

    let discount = coupon.map_or(Decimal::ZERO, |coupon| {
        let waived = if coupon.waives_shipping {
            round_money(shipping)
        } else {
            Decimal::ZERO
        };
        coupon.discount_amount + waived
    });

    OrderTotals::from_parts(subtotal, shipping, tax, discount)
}
