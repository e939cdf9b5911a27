//! Order and booking status machines.
//!
//! ```text
//! pending -> accepted -> preparing -> ready -> served ----------> billed
//!    \           \            \          \--> out-for-delivery -> delivered -> billed
//!     \-----------\------------\----------\--> cancelled
//! ```
//!
//! `billed` is only ever entered through a bill, never by a staff status update.

use crate::server::controller::error::CoreError;
use crate::server::model::booking::BookingStatus;
use crate::server::model::order::{OrderStatus, OrderType};

impl OrderStatus {
    /// Statuses reachable in one step.
    pub fn successors(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Accepted, Cancelled],
            Accepted => &[Preparing, Cancelled],
            Preparing => &[Ready, Cancelled],
            Ready => &[Served, OutForDelivery, Cancelled],
            Served => &[Billed],
            OutForDelivery => &[Delivered],
            Delivered => &[Billed],
            Cancelled | Billed => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// May be absorbed into a bill.
    pub fn is_billable(self) -> bool {
        matches!(self, OrderStatus::Ready | OrderStatus::Served | OrderStatus::Delivered)
    }
}

impl BookingStatus {
    pub fn successors(self) -> &'static [BookingStatus] {
        use BookingStatus::*;
        match self {
            Pending => &[Confirmed, Rejected, Cancelled],
            Confirmed | Rejected | Cancelled => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }
}

/// Validates a staff-initiated order status change.
///
/// The order type only decides the `ready` fork; every move outside the
/// table is an invalid transition whatever the type.
pub(crate) fn check_order_transition(
    order_type: OrderType,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<(), CoreError> {
    if to == OrderStatus::Billed {
        return Err(CoreError::invalid_transition(
            "orders become billed only by being included in a bill",
        ));
    }
    if from.is_terminal() {
        return Err(CoreError::invalid_transition(format!(
            "order is {from} and can no longer change"
        )));
    }
    if !from.successors().contains(&to) {
        return Err(CoreError::invalid_transition(format!(
            "order cannot move from {from} to {to}"
        )));
    }
    match (order_type, to) {
        (OrderType::Table, OrderStatus::OutForDelivery) => {
            Err(CoreError::validation(format!("a table order cannot become {to}")))
        }
        (OrderType::Delivery, OrderStatus::Served) => {
            Err(CoreError::validation(format!("a delivery order cannot become {to}")))
        }
        _ => Ok(()),
    }
}

/// Validates a staff-initiated booking status change.
pub(crate) fn check_booking_transition(from: BookingStatus, to: BookingStatus) -> Result<(), CoreError> {
    if from.is_terminal() {
        return Err(CoreError::invalid_transition(format!(
            "booking is {from} and can no longer change"
        )));
    }
    if !from.successors().contains(&to) {
        return Err(CoreError::invalid_transition(format!(
            "booking cannot move from {from} to {to}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const STAFF_TABLE: [(OrderStatus, OrderStatus); 10] = [
        (Pending, Accepted),
        (Pending, Cancelled),
        (Accepted, Preparing),
        (Accepted, Cancelled),
        (Preparing, Ready),
        (Preparing, Cancelled),
        (Ready, Served),
        (Ready, Cancelled),
        (Ready, OutForDelivery),
        (OutForDelivery, Delivered),
    ];

    const BOTH_TYPES: [OrderType; 2] = [OrderType::Table, OrderType::Delivery];

    /// the `ready` fork is the only place the order type matters
    fn gated(order_type: OrderType, to: OrderStatus) -> bool {
        matches!(
            (order_type, to),
            (OrderType::Table, OutForDelivery) | (OrderType::Delivery, Served)
        )
    }

    #[test]
    fn allowed_moves_pass() {
        for order_type in BOTH_TYPES {
            for (from, to) in STAFF_TABLE {
                if gated(order_type, to) {
                    continue;
                }
                assert_eq!(check_order_transition(order_type, from, to), Ok(()), "{order_type}: {from} -> {to}");
            }
        }
    }

    #[test]
    fn every_other_pair_is_rejected() {
        for order_type in BOTH_TYPES {
            for from in OrderStatus::ALL {
                for to in OrderStatus::ALL {
                    if STAFF_TABLE.contains(&(from, to)) {
                        continue;
                    }
                    let result = check_order_transition(order_type, from, to);
                    assert!(
                        matches!(result, Err(CoreError::InvalidTransition { .. })),
                        "{order_type}: {from} -> {to} gave {result:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn terminal_orders_stay_put_whatever_the_type() {
        for (order_type, from, to) in [
            (OrderType::Table, Cancelled, OutForDelivery),
            (OrderType::Table, Pending, OutForDelivery),
            (OrderType::Table, Billed, Delivered),
            (OrderType::Delivery, Cancelled, Served),
        ] {
            assert!(matches!(
                check_order_transition(order_type, from, to),
                Err(CoreError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn order_type_gates_the_last_mile() {
        assert!(matches!(
            check_order_transition(OrderType::Table, Ready, OutForDelivery),
            Err(CoreError::Validation { .. })
        ));
        assert!(matches!(
            check_order_transition(OrderType::Delivery, Ready, Served),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn billed_is_not_a_staff_move() {
        let err = check_order_transition(OrderType::Table, Served, Billed).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert!(Served.successors().contains(&Billed));
    }

    #[test]
    fn billable_statuses() {
        let billable: Vec<_> = OrderStatus::ALL.into_iter().filter(|s| s.is_billable()).collect();
        assert_eq!(billable, vec![Ready, Served, Delivered]);
        assert!(Cancelled.is_terminal() && Billed.is_terminal());
    }

    #[test]
    fn bookings_leave_pending_once() {
        use BookingStatus as B;
        assert_eq!(check_booking_transition(B::Pending, B::Confirmed), Ok(()));
        assert_eq!(check_booking_transition(B::Pending, B::Rejected), Ok(()));
        assert_eq!(check_booking_transition(B::Pending, B::Cancelled), Ok(()));
        assert!(matches!(
            check_booking_transition(B::Confirmed, B::Pending),
            Err(CoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            check_booking_transition(B::Cancelled, B::Confirmed),
            Err(CoreError::InvalidTransition { .. })
        ));
    }
}
