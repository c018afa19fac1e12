//! Order status enum and its legal state transitions.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a shop order.
///
/// The legal transitions form a fixed state machine:
///
/// ```text
/// PaymentPending -> Placed -> { Cancelled, Delivered }
/// Delivered -> ReturnRequested -> { ReturnApproved -> Returned, ReturnCancelled }
/// ```
///
/// Anything else is rejected by the order orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    PaymentPending,
    Placed,
    Cancelled,
    Delivered,
    ReturnRequested,
    ReturnApproved,
    ReturnCancelled,
    Returned,
}

impl OrderStatus {
    /// Whether moving from `self` to `next` is a legal edge of the state
    /// machine.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::PaymentPending, Self::Placed)
                | (Self::Placed, Self::Cancelled | Self::Delivered)
                | (Self::Delivered, Self::ReturnRequested)
                | (
                    Self::ReturnRequested,
                    Self::ReturnApproved | Self::ReturnCancelled
                )
                | (Self::ReturnApproved, Self::Returned)
        )
    }

    /// Whether the order has reached a state it can never leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::ReturnCancelled | Self::Returned)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PaymentPending => "payment_pending",
            Self::Placed => "placed",
            Self::Cancelled => "cancelled",
            Self::Delivered => "delivered",
            Self::ReturnRequested => "return_requested",
            Self::ReturnApproved => "return_approved",
            Self::ReturnCancelled => "return_cancelled",
            Self::Returned => "returned",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment_pending" => Ok(Self::PaymentPending),
            "placed" => Ok(Self::Placed),
            "cancelled" => Ok(Self::Cancelled),
            "delivered" => Ok(Self::Delivered),
            "return_requested" => Ok(Self::ReturnRequested),
            "return_approved" => Ok(Self::ReturnApproved),
            "return_cancelled" => Ok(Self::ReturnCancelled),
            "returned" => Ok(Self::Returned),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_edges_are_legal() {
        assert!(OrderStatus::PaymentPending.can_transition_to(OrderStatus::Placed));
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Delivered));
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::ReturnRequested));
        assert!(OrderStatus::ReturnRequested.can_transition_to(OrderStatus::ReturnApproved));
        assert!(OrderStatus::ReturnRequested.can_transition_to(OrderStatus::ReturnCancelled));
        assert!(OrderStatus::ReturnApproved.can_transition_to(OrderStatus::Returned));
    }

    #[test]
    fn illegal_edges_are_rejected() {
        assert!(!OrderStatus::Placed.can_transition_to(OrderStatus::Returned));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Placed));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Returned.can_transition_to(OrderStatus::ReturnRequested));
        assert!(!OrderStatus::PaymentPending.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for terminal in [
            OrderStatus::Cancelled,
            OrderStatus::ReturnCancelled,
            OrderStatus::Returned,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                OrderStatus::PaymentPending,
                OrderStatus::Placed,
                OrderStatus::Cancelled,
                OrderStatus::Delivered,
                OrderStatus::ReturnRequested,
                OrderStatus::ReturnApproved,
                OrderStatus::ReturnCancelled,
                OrderStatus::Returned,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        let all = [
            OrderStatus::PaymentPending,
            OrderStatus::Placed,
            OrderStatus::Cancelled,
            OrderStatus::Delivered,
            OrderStatus::ReturnRequested,
            OrderStatus::ReturnApproved,
            OrderStatus::ReturnCancelled,
            OrderStatus::Returned,
        ];
        for status in all {
            let parsed: OrderStatus = status.to_string().parse().expect("valid status string");
            assert_eq!(parsed, status);
        }
    }
}
