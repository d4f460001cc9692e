//! Execution policy: whether an order may trade at a candidate price

use common::decimal::Price;
use common::model::order::{Order, OrderType, Side};

/// Price acceptance rule carried by every order.
///
/// Market orders accept any price. A limit buy accepts prices at or below
/// its limit, a limit sell prices at or above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPolicy {
    Market,
    Limit { side: Side, limit: Price },
}

impl ExecutionPolicy {
    /// Policy for an order
    pub fn for_order(order: &Order) -> Self {
        match (order.order_type(), order.limit_price()) {
            (OrderType::Limit, Some(limit)) => ExecutionPolicy::Limit {
                side: order.side(),
                limit,
            },
            _ => ExecutionPolicy::Market,
        }
    }

    /// Whether the order may participate in a trade at `price`
    pub fn can_execute(&self, price: Price) -> bool {
        match *self {
            ExecutionPolicy::Market => true,
            ExecutionPolicy::Limit { side: Side::Buy, limit } => price <= limit,
            ExecutionPolicy::Limit { side: Side::Sell, limit } => price >= limit,
        }
    }
}

/// Shorthand for `ExecutionPolicy::for_order(order).can_execute(price)`
pub fn can_execute(order: &Order, price: Price) -> bool {
    ExecutionPolicy::for_order(order).can_execute(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::decimal::dec;
    use common::model::order::OrderBuilder;
    use common::AccountId;

    fn order(side: Side, limit: Option<Price>) -> Order {
        let builder = OrderBuilder::new().for_owner(AccountId::new()).with_symbol("AAPL").side(side, 1);
        let builder = match limit {
            Some(price) => builder.with_limit(price),
            None => builder.at_market_price(),
        };
        builder.build().unwrap()
    }

    #[test]
    fn market_orders_accept_any_price() {
        assert!(can_execute(&order(Side::Buy, None), dec!(1000000)));
        assert!(can_execute(&order(Side::Sell, None), dec!(0)));
    }

    #[test]
    fn limit_buy_accepts_at_or_below_limit() {
        let buy = order(Side::Buy, Some(dec!(150.50)));
        assert!(can_execute(&buy, dec!(150.50)));
        assert!(can_execute(&buy, dec!(150.49)));
        assert!(!can_execute(&buy, dec!(150.51)));
    }

    #[test]
    fn limit_sell_accepts_at_or_above_limit() {
        let sell = order(Side::Sell, Some(dec!(150.50)));
        assert!(can_execute(&sell, dec!(150.50)));
        assert!(can_execute(&sell, dec!(151)));
        assert!(!can_execute(&sell, dec!(150.49)));
    }

    #[test]
    fn policy_follows_order_kind() {
        assert_eq!(ExecutionPolicy::for_order(&order(Side::Buy, None)), ExecutionPolicy::Market);
        assert_eq!(
            ExecutionPolicy::for_order(&order(Side::Sell, Some(dec!(2)))),
            ExecutionPolicy::Limit { side: Side::Sell, limit: dec!(2) }
        );
    }
}
