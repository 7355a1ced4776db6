use std::collections::HashSet;

use crate::models::OrderState;

const FULFILMENT_STATES: [OrderState; 4] = [
    OrderState::Pending,
    OrderState::Processing,
    OrderState::Shipped,
    OrderState::Delivered,
];

/// Explicit allowed-pair set for `change_state`.
///
/// `Cart` is never a valid source or target here: confirmation is the only
/// exit from the cart, because it is also the point where stock gets
/// reserved.
#[derive(Debug, Clone)]
pub struct TransitionPolicy {
    allowed: HashSet<(OrderState, OrderState)>,
}

impl TransitionPolicy {
    /// Accepts any pair of fulfilment states, matching deployments that
    /// only validate the target state. `Pending` straight to `Delivered`
    /// passes here.
    pub fn membership() -> Self {
        let mut allowed = HashSet::new();
        for from in FULFILMENT_STATES {
            for to in FULFILMENT_STATES {
                allowed.insert((from, to));
            }
        }
        Self { allowed }
    }

    /// Strict stage order: Pending, Processing, Shipped, Delivered, one
    /// step at a time.
    pub fn sequential() -> Self {
        let allowed = FULFILMENT_STATES
            .windows(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        Self { allowed }
    }

    pub fn custom(pairs: impl IntoIterator<Item = (OrderState, OrderState)>) -> Self {
        Self {
            allowed: pairs.into_iter().collect(),
        }
    }

    pub fn allows(&self, from: OrderState, to: OrderState) -> bool {
        self.allowed.contains(&(from, to))
    }
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self::membership()
    }
}
