use proptest::prelude::*;

use veil_core::domain::coin_select::select_coins;
use veil_core::domain::model::{Coin, CoinId, CoinKeyType};

fn arbitrary_coins() -> impl Strategy<Value = Vec<Coin>> {
    prop::collection::vec((1u64..5_000, 0u64..50), 1..24).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(idx, (amount, maturity))| {
                Coin::available(CoinId::new(idx as u64 + 1, amount, 0, CoinKeyType::Regular), maturity)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn selection_covers_target_exactly_plus_change(coins in arbitrary_coins(), target in 1u64..8_000) {
        let tip = 100;
        match select_coins(&coins, target, 0, tip) {
            Ok(selection) => {
                let total: u64 = selection.coins.iter().map(|c| c.amount()).sum();
                prop_assert!(total >= target);
                prop_assert_eq!(total - target, selection.change);
                // No coin is redundant: dropping any one breaks coverage,
                // unless a single coin covers on its own.
                if selection.coins.len() > 1 {
                    for skip in 0..selection.coins.len() {
                        let rest: u64 = selection
                            .coins
                            .iter()
                            .enumerate()
                            .filter(|(pos, _)| *pos != skip)
                            .map(|(_, c)| c.amount())
                            .sum();
                        prop_assert!(rest < target);
                    }
                }
            }
            Err(_) => {
                let available: u64 = coins.iter().filter(|c| c.maturity <= tip).map(|c| c.amount()).sum();
                prop_assert!(available < target);
            }
        }
    }
}
