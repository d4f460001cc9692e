use common::decimal::{notional, Amount, Quantity};
use common::model::order::{OrderBuilder, OrderType, Side, Status};
use common::AccountId;
use proptest::prelude::*;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
enum Step {
    Fill { quantity: Quantity, cents: i64 },
    Cancel,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        6 => (1u64..30, 1i64..20_000).prop_map(|(quantity, cents)| Step::Fill { quantity, cents }),
        1 => Just(Step::Cancel),
    ]
}

proptest! {
    #[test]
    fn prop_buy_escrow_is_fully_accounted(
        quantity in 1u64..100,
        limit_cents in 1i64..20_000,
        steps in prop::collection::vec(step(), 0..40),
    ) {
        let limit = Decimal::new(limit_cents, 2);
        let mut order = OrderBuilder::new()
            .for_owner(AccountId::new())
            .with_symbol("AAPL")
            .buy(quantity)
            .with_limit(limit)
            .build()
            .unwrap();
        let escrow = notional(limit, quantity).unwrap();
        order.accept(1, escrow);

        let mut spent = Amount::ZERO;
        let mut released = Amount::ZERO;
        for step in steps {
            let was_terminal = order.status().is_terminal();
            match step {
                Step::Fill { quantity, cents } => {
                    // Only prices the limit accepts ever reach a buy
                    let price = Decimal::new(cents, 2).min(limit);
                    match order.apply_fill(quantity, price) {
                        Ok(outcome) => {
                            prop_assert!(!was_terminal);
                            spent += outcome.cash_spent;
                            released += outcome.cash_released;
                        }
                        Err(_) => prop_assert!(was_terminal || quantity > order.remaining_quantity()),
                    }
                }
                Step::Cancel => match order.cancel() {
                    Ok(release) => {
                        prop_assert!(!was_terminal);
                        released += release.cash;
                    }
                    Err(_) => prop_assert!(was_terminal),
                },
            }

            prop_assert!(order.escrow() >= Amount::ZERO);
            prop_assert_eq!(spent + released + order.escrow(), escrow);
            prop_assert!(order.remaining_quantity() <= order.quantity());
            prop_assert_eq!(order.remaining_quantity() == 0, order.status() == Status::Filled);
            if order.is_active() {
                prop_assert!(order.escrow() >= notional(limit, order.remaining_quantity()).unwrap());
            } else {
                prop_assert_eq!(order.escrow(), Amount::ZERO);
            }
        }
    }

    #[test]
    fn prop_builder_accepts_only_well_formed_orders(
        quantity in 0u64..5,
        limit_cents in prop::option::of(-500i64..500),
        market in any::<bool>(),
    ) {
        let kind = if market { OrderType::Market } else { OrderType::Limit };
        let result = OrderBuilder::new()
            .for_owner(AccountId::new())
            .with_symbol("AAPL")
            .side(Side::Sell, quantity)
            .kind(kind, limit_cents.map(|cents| Decimal::new(cents, 2)))
            .build();
        let valid = quantity > 0 && (market || matches!(limit_cents, Some(cents) if cents >= 0));
        prop_assert_eq!(result.is_ok(), valid);
    }
}
