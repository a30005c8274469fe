//! Input selection policy (pure, no I/O).

use crate::domain::model::{Coin, CoinStatus};
use crate::foundation::{Amount, AssetId, Height, Result, WalletError};

#[derive(Clone, Debug, Default)]
pub struct Selection {
    pub coins: Vec<Coin>,
    pub change: Amount,
}

impl Selection {
    pub fn total(&self) -> Amount {
        self.coins.iter().map(Coin::amount).sum()
    }
}

/// Picks coins covering `target` out of `candidates`.
///
/// Policy: prefer the smallest set whose total is at least the target; on
/// ties prefer older coins (lower maturity, then lower key index). Only
/// `Available` coins matured at `tip` are considered.
pub fn select_coins(candidates: &[Coin], target: Amount, asset_id: AssetId, tip: Height) -> Result<Selection> {
    let mut usable: Vec<&Coin> = candidates
        .iter()
        .filter(|c| c.status == CoinStatus::Available && c.asset_id() == asset_id && c.maturity <= tip)
        .collect();

    let available: Amount = usable.iter().map(|c| c.amount()).sum();
    if available < target {
        return Err(WalletError::InsufficientFunds { requested: target, available, asset_id });
    }
    if target == 0 {
        return Ok(Selection::default());
    }

    // Oldest-first ordering used for all tie-breaks.
    usable.sort_by(|a, b| (a.maturity, a.id.idx).cmp(&(b.maturity, b.id.idx)));

    // A single coin covering the target beats any multi-coin set; pick the
    // tightest one, oldest on equal amounts.
    if let Some(single) = usable.iter().filter(|c| c.amount() >= target).min_by_key(|c| (c.amount(), c.maturity, c.id.idx)) {
        return Ok(Selection { coins: vec![(*single).clone()], change: single.amount() - target });
    }

    // Otherwise take the largest coins until covered (fewest coins), then
    // drop any that turned out redundant, smallest and youngest first.
    let mut by_amount: Vec<&Coin> = usable.clone();
    by_amount.sort_by(|a, b| b.amount().cmp(&a.amount()).then((a.maturity, a.id.idx).cmp(&(b.maturity, b.id.idx))));

    let mut picked: Vec<&Coin> = Vec::new();
    let mut total: Amount = 0;
    for coin in by_amount {
        picked.push(coin);
        total += coin.amount();
        if total >= target {
            break;
        }
    }

    let mut pruned: Vec<&Coin> = picked;
    pruned.sort_by(|a, b| a.amount().cmp(&b.amount()).then((b.maturity, b.id.idx).cmp(&(a.maturity, a.id.idx))));
    let mut kept: Vec<&Coin> = Vec::new();
    for (pos, coin) in pruned.iter().enumerate() {
        let rest: Amount = pruned[pos + 1..].iter().map(|c| c.amount()).sum::<Amount>()
            + kept.iter().map(|c| c.amount()).sum::<Amount>();
        if rest >= target {
            total -= coin.amount();
        } else {
            kept.push(coin);
        }
    }

    let mut coins: Vec<Coin> = kept.into_iter().cloned().collect();
    coins.sort_by(|a, b| (a.maturity, a.id.idx).cmp(&(b.maturity, b.id.idx)));
    Ok(Selection { change: total - target, coins })
}
