use crate::models::OrderLine;

/// Sum of line subtotals. Pure and idempotent; the stored total is only a
/// cache of this value.
pub fn order_total(lines: &[OrderLine]) -> i64 {
    lines.iter().map(|line| line.subtotal_cents).sum()
}
