//! Purchase order models and the procurement state machine

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Status of a purchase order.
///
/// `DRAFT -> PENDING_APPROVAL -> APPROVED -> SENT ->
/// {PARTIALLY_RECEIVED -> RECEIVED} | CANCELLED`
///
/// `Cancelled` is reachable from every non-terminal state; `Received` and
/// `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    PendingApproval,
    Approved,
    Sent,
    PartiallyReceived,
    Received,
    Cancelled,
}

/// Operations that move a purchase order through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderAction {
    AddLine,
    SubmitForApproval,
    Approve,
    Send,
    ReceiveGoods,
    Cancel,
}

/// A transition attempted from a state that does not allow it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} a purchase order in {from} state")]
pub struct TransitionError {
    pub from: PurchaseOrderStatus,
    pub action: PurchaseOrderAction,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::PendingApproval => "pending_approval",
            PurchaseOrderStatus::Approved => "approved",
            PurchaseOrderStatus::Sent => "sent",
            PurchaseOrderStatus::PartiallyReceived => "partially_received",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PurchaseOrderStatus::Draft),
            "pending_approval" => Some(PurchaseOrderStatus::PendingApproval),
            "approved" => Some(PurchaseOrderStatus::Approved),
            "sent" => Some(PurchaseOrderStatus::Sent),
            "partially_received" => Some(PurchaseOrderStatus::PartiallyReceived),
            "received" => Some(PurchaseOrderStatus::Received),
            "cancelled" => Some(PurchaseOrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Received | PurchaseOrderStatus::Cancelled
        )
    }

    /// Whether `action` is legal from this state. Exhaustive on both axes so
    /// adding a state or an action revisits every combination.
    pub fn allows(&self, action: PurchaseOrderAction) -> bool {
        match action {
            PurchaseOrderAction::AddLine => matches!(self, PurchaseOrderStatus::Draft),
            PurchaseOrderAction::SubmitForApproval => matches!(self, PurchaseOrderStatus::Draft),
            PurchaseOrderAction::Approve => matches!(self, PurchaseOrderStatus::PendingApproval),
            PurchaseOrderAction::Send => matches!(self, PurchaseOrderStatus::Approved),
            PurchaseOrderAction::ReceiveGoods => matches!(
                self,
                PurchaseOrderStatus::Sent | PurchaseOrderStatus::PartiallyReceived
            ),
            PurchaseOrderAction::Cancel => !self.is_terminal(),
        }
    }

    /// Guard form of [`allows`](Self::allows).
    pub fn ensure(&self, action: PurchaseOrderAction) -> Result<(), TransitionError> {
        if self.allows(action) {
            Ok(())
        } else {
            Err(TransitionError {
                from: *self,
                action,
            })
        }
    }

    /// Status after a successful goods receipt.
    pub fn after_receipt(all_lines_complete: bool) -> Self {
        if all_lines_complete {
            PurchaseOrderStatus::Received
        } else {
            PurchaseOrderStatus::PartiallyReceived
        }
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for PurchaseOrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PurchaseOrderAction::AddLine => "add a line to",
            PurchaseOrderAction::SubmitForApproval => "submit",
            PurchaseOrderAction::Approve => "approve",
            PurchaseOrderAction::Send => "send",
            PurchaseOrderAction::ReceiveGoods => "receive goods against",
            PurchaseOrderAction::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// The procurement document driving the receiving workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Unique per tenant (e.g., "PO-2026-0042")
    pub po_number: String,
    pub vendor_id: Uuid,
    pub status: PurchaseOrderStatus,
    pub ordered_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub approved_by: Option<Uuid>,
    pub approval_notes: Option<String>,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub cancelled_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One ordered item on a purchase order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub item_id: Uuid,
    pub ordered_quantity: Decimal,
    /// Monotonically non-decreasing, never above `ordered_quantity`.
    pub received_quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub tax_percent: Decimal,
    pub line_total: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Why a receipt quantity cannot be applied to a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveIssue {
    NotPositive,
    ExceedsRemaining { remaining: Decimal },
}

impl PurchaseOrderLine {
    pub fn remaining_quantity(&self) -> Decimal {
        self.ordered_quantity - self.received_quantity
    }

    pub fn is_fully_received(&self) -> bool {
        self.received_quantity >= self.ordered_quantity
    }

    /// Check a further receipt of `quantity` against this line. A
    /// non-positive quantity is an input problem, not an over-receipt, and
    /// the two are reported apart.
    pub fn check_receive(&self, quantity: Decimal) -> Result<(), ReceiveIssue> {
        if quantity <= Decimal::ZERO {
            return Err(ReceiveIssue::NotPositive);
        }
        if self.received_quantity + quantity > self.ordered_quantity {
            return Err(ReceiveIssue::ExceedsRemaining {
                remaining: self.remaining_quantity(),
            });
        }
        Ok(())
    }

    /// Whether a further receipt of `quantity` stays within the ordered
    /// amount.
    pub fn can_receive(&self, quantity: Decimal) -> bool {
        self.check_receive(quantity).is_ok()
    }
}

/// `qty x price`, discounted, then taxed.
pub fn line_total(
    quantity: Decimal,
    unit_price: Decimal,
    discount_percent: Decimal,
    tax_percent: Decimal,
) -> Decimal {
    let hundred = Decimal::from(100);
    let discounted = quantity * unit_price * (hundred - discount_percent) / hundred;
    discounted * (hundred + tax_percent) / hundred
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use PurchaseOrderAction as Action;
    use PurchaseOrderStatus as Status;

    const ALL_STATUSES: [Status; 7] = [
        Status::Draft,
        Status::PendingApproval,
        Status::Approved,
        Status::Sent,
        Status::PartiallyReceived,
        Status::Received,
        Status::Cancelled,
    ];

    #[test]
    fn test_happy_path_is_legal() {
        assert!(Status::Draft.allows(Action::AddLine));
        assert!(Status::Draft.allows(Action::SubmitForApproval));
        assert!(Status::PendingApproval.allows(Action::Approve));
        assert!(Status::Approved.allows(Action::Send));
        assert!(Status::Sent.allows(Action::ReceiveGoods));
        assert!(Status::PartiallyReceived.allows(Action::ReceiveGoods));
    }

    #[test]
    fn test_cancel_from_every_non_terminal_state() {
        for status in ALL_STATUSES {
            assert_eq!(status.allows(Action::Cancel), !status.is_terminal());
        }
    }

    #[test]
    fn test_no_receipt_outside_sent_or_partial() {
        for status in ALL_STATUSES {
            let legal = matches!(status, Status::Sent | Status::PartiallyReceived);
            assert_eq!(status.allows(Action::ReceiveGoods), legal);
        }
    }

    #[test]
    fn test_no_receipt_against_cancelled() {
        let err = Status::Cancelled.ensure(Action::ReceiveGoods).unwrap_err();
        assert_eq!(err.from, Status::Cancelled);
        assert_eq!(err.action, Action::ReceiveGoods);
    }

    #[test]
    fn test_lines_only_in_draft() {
        for status in ALL_STATUSES {
            assert_eq!(status.allows(Action::AddLine), status == Status::Draft);
        }
    }

    #[test]
    fn test_status_round_trip() {
        for status in ALL_STATUSES {
            assert_eq!(Status::parse(status.as_str()), Some(status));
        }
        assert_eq!(Status::parse("unknown"), None);
    }

    #[test]
    fn test_after_receipt() {
        assert_eq!(Status::after_receipt(true), Status::Received);
        assert_eq!(Status::after_receipt(false), Status::PartiallyReceived);
    }

    #[test]
    fn test_line_total_with_discount_and_tax() {
        // 10 x 100, 10% discount -> 900, 7% tax -> 963
        let total = line_total(dec!(10), dec!(100), dec!(10), dec!(7));
        assert_eq!(total, dec!(963.00));
    }

    #[test]
    fn test_line_total_plain() {
        assert_eq!(line_total(dec!(3), dec!(2.50), dec!(0), dec!(0)), dec!(7.50));
    }

    fn line(ordered: Decimal, received: Decimal) -> PurchaseOrderLine {
        PurchaseOrderLine {
            id: Uuid::new_v4(),
            purchase_order_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            ordered_quantity: ordered,
            received_quantity: received,
            unit_price: dec!(1),
            discount_percent: dec!(0),
            tax_percent: dec!(0),
            line_total: ordered,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_line_receive_within_ordered() {
        let l = line(dec!(100), dec!(60));
        assert!(l.can_receive(dec!(40)));
        assert!(!l.can_receive(dec!(41)));
        assert!(!l.can_receive(dec!(0)));
        assert_eq!(l.remaining_quantity(), dec!(40));
        assert!(!l.is_fully_received());
    }

    #[test]
    fn test_line_fully_received() {
        let l = line(dec!(100), dec!(100));
        assert!(l.is_fully_received());
        assert!(!l.can_receive(dec!(1)));
    }

    #[test]
    fn test_check_receive_distinguishes_issues() {
        let l = line(dec!(100), dec!(60));

        assert_eq!(l.check_receive(dec!(0)), Err(ReceiveIssue::NotPositive));
        assert_eq!(l.check_receive(dec!(-5)), Err(ReceiveIssue::NotPositive));
        assert_eq!(
            l.check_receive(dec!(41)),
            Err(ReceiveIssue::ExceedsRemaining {
                remaining: dec!(40)
            })
        );
        assert_eq!(l.check_receive(dec!(40)), Ok(()));
    }
}
