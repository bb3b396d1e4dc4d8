// src/pos/checkout.rs
use crate::dtos::sale::{PaymentMethod, PaymentRequest, PaymentStatus};
use crate::error::AppError;

use super::cart::{Cart, CartItem, Totals};

// Absorbs f64 noise when comparing amounts typed by the cashier against
// derived totals.
const AMOUNT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSummary {
    pub received_amount: f64,
    pub paid_amount: f64,
    pub change: f64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
}

/// Everything the sale transaction needs, validated.
#[derive(Debug, Clone)]
pub struct SaleDraft {
    pub lines: Vec<CartItem>,
    pub totals: Totals,
    pub payment: PaymentSummary,
}

pub fn payment_status(paid: f64, grand_total: f64) -> PaymentStatus {
    if paid + AMOUNT_EPSILON >= grand_total {
        PaymentStatus::Paid
    } else if paid > 0.0 {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    }
}

/// Pre-submit guard. Runs before anything touches the database.
pub fn prepare_sale(cart: &Cart, payment: &PaymentRequest) -> Result<SaleDraft, AppError> {
    if cart.is_empty() {
        return Err(AppError::validation("Cart is empty. Add products before checkout."));
    }

    cart.adjustments().validate()?;

    let totals = cart.totals();
    if totals.grand_total < -AMOUNT_EPSILON {
        return Err(AppError::validation("Discount cannot exceed the order total"));
    }

    let PaymentRequest { received_amount, paid_amount, payment_method } = *payment;

    if !received_amount.is_finite() || received_amount < 0.0 {
        return Err(AppError::validation("Received amount must be a non-negative number"));
    }
    if !paid_amount.is_finite() || paid_amount < 0.0 {
        return Err(AppError::validation("Paid amount must be a non-negative number"));
    }
    if paid_amount > totals.grand_total + AMOUNT_EPSILON {
        return Err(AppError::validation(format!(
            "Paid amount ({paid_amount}) cannot exceed grand total ({})",
            totals.grand_total
        )));
    }
    if received_amount + AMOUNT_EPSILON < paid_amount {
        return Err(AppError::validation("Received amount cannot be less than paid amount"));
    }

    Ok(SaleDraft {
        lines: cart.items().to_vec(),
        totals,
        payment: PaymentSummary {
            received_amount,
            paid_amount,
            change: received_amount - paid_amount,
            method: payment_method,
            status: payment_status(paid_amount, totals.grand_total),
        },
    })
}
