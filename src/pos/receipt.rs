// src/pos/receipt.rs
use std::fmt::Write;

use crate::dtos::sale::SaleResponse;

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn money(amount: f64) -> String {
    format!("{amount:.2}")
}

/// Static, self-contained HTML for the print window.
pub fn render_html(sale: &SaleResponse) -> String {
    let mut rows = String::new();
    for item in &sale.items {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
            escape(&item.product_name),
            item.quantity,
            money(item.unit_price),
            money(item.line_total),
        );
    }

    let mut adjustments = String::new();
    for (label, amount) in [("Tax", sale.tax), ("Shipping", sale.shipping), ("Discount", -sale.discount)] {
        if amount != 0.0 {
            let _ = write!(adjustments, "<tr><td colspan=\"3\">{label}</td><td class=\"num\">{}</td></tr>", money(amount));
        }
    }

    let notes = sale
        .notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(|n| format!("<p class=\"notes\">{}</p>", escape(n)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Receipt {reference}</title>
<style>
body {{ font-family: monospace; width: 300px; margin: 0 auto; }}
table {{ width: 100%; border-collapse: collapse; }}
td {{ padding: 2px 0; }}
.num {{ text-align: right; }}
.total td {{ border-top: 1px dashed #000; font-weight: bold; }}
</style>
</head>
<body onload="window.print()">
<h3>Receipt {reference}</h3>
<p>Date: {date}<br>Customer: {customer}<br>Cashier: {cashier}<br>Warehouse: {warehouse}</p>
<table>
<tr><th>Item</th><th class="num">Qty</th><th class="num">Price</th><th class="num">Total</th></tr>
{rows}
<tr class="total"><td colspan="3">Subtotal</td><td class="num">{subtotal}</td></tr>
{adjustments}
<tr class="total"><td colspan="3">Grand total</td><td class="num">{grand_total}</td></tr>
<tr><td colspan="3">Paid ({method})</td><td class="num">{paid}</td></tr>
<tr><td colspan="3">Received</td><td class="num">{received}</td></tr>
<tr><td colspan="3">Change</td><td class="num">{change}</td></tr>
</table>
{notes}
<p>Thank you for your purchase!</p>
</body>
</html>
"#,
        reference = escape(&sale.reference),
        date = sale.created_at.format("%Y-%m-%d %H:%M"),
        customer = escape(&sale.customer_name),
        cashier = escape(&sale.cashier_username),
        warehouse = escape(&sale.warehouse_name),
        rows = rows,
        subtotal = money(sale.subtotal),
        adjustments = adjustments,
        grand_total = money(sale.grand_total),
        method = sale.payment_method.label(),
        paid = money(sale.paid_amount),
        received = money(sale.received_amount),
        change = money(sale.change),
        notes = notes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::sale::{PaymentMethod, PaymentStatus, SaleItemResponse, SaleSummary};
    use chrono::TimeZone;

    fn sample_sale() -> SaleResponse {
        SaleResponse {
            id: 7,
            reference: "SL-000007".into(),
            customer_id: 1,
            customer_name: "Walk-in Customer".into(),
            warehouse_id: 1,
            warehouse_name: "Main".into(),
            cashier_id: 3,
            cashier_username: "ana".into(),
            subtotal: 25.0,
            tax: 1.0,
            shipping: 2.0,
            discount: 3.0,
            grand_total: 25.0,
            received_amount: 30.0,
            paid_amount: 25.0,
            change: 5.0,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Paid,
            notes: None,
            created_at: chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            items: vec![SaleItemResponse {
                id: 1,
                product_id: 10,
                product_name: "Milk <1L>".into(),
                unit_price: 10.0,
                quantity: 2,
                returned_quantity: 0,
                line_total: 20.0,
            }],
            summary: SaleSummary { total_items: 2, balance_due: 0.0 },
        }
    }

    #[test]
    fn test_receipt_contains_totals() {
        let html = render_html(&sample_sale());
        assert!(html.contains("Receipt SL-000007"));
        assert!(html.contains("Grand total</td><td class=\"num\">25.00"));
        assert!(html.contains("Change</td><td class=\"num\">5.00"));
        assert!(html.contains("Discount</td><td class=\"num\">-3.00"));
        assert!(html.contains("2026-03-01 09:30"));
    }

    #[test]
    fn test_receipt_escapes_names() {
        let html = render_html(&sample_sale());
        assert!(html.contains("Milk &lt;1L&gt;"));
        assert!(!html.contains("Milk <1L>"));
    }

    #[test]
    fn test_zero_adjustments_omitted() {
        let mut sale = sample_sale();
        sale.tax = 0.0;
        sale.shipping = 0.0;
        sale.discount = 0.0;
        let html = render_html(&sale);
        assert!(!html.contains("Shipping"));
        assert!(!html.contains("Discount"));
    }
}
