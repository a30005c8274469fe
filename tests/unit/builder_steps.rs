use std::sync::Arc;

use veil_core::application::{BaseTxBuilder, BuildStep};
use veil_core::domain::model::{Coin, CoinId, CoinKeyType, CoinStatus};
use veil_core::domain::params::TxParameterID;
use veil_core::foundation::TxId;
use veil_core::infrastructure::keykeeper::{LocalKeyKeeper, SyncKeeperExecutor};
use veil_core::infrastructure::storage::{CoinStore, MemoryWalletStore, ParameterStoreExt};

fn builder_with_funds() -> (Arc<MemoryWalletStore>, BaseTxBuilder, TxId) {
    let store = Arc::new(MemoryWalletStore::new());
    let keeper = Arc::new(LocalKeyKeeper::new([9u8; 32], store.clone()).expect("keeper"));
    let executor = Arc::new(SyncKeeperExecutor::new(keeper));

    for (idx, amount) in [(1u64, 400u64), (2, 300)] {
        store.store_coins(&[Coin::available(CoinId::new(idx, amount, 0, CoinKeyType::Regular), 0)]).expect("fund");
    }

    let tx_id = TxId::new([0xAA; 16]);
    store.set_param(&tx_id, TxParameterID::MinHeight, &10u64, 0).expect("set");
    store.set_param(&tx_id, TxParameterID::Lifetime, &240u64, 0).expect("set");

    let builder = BaseTxBuilder::new(store.clone(), executor, tx_id, 0, vec![500], 100, 0);
    (store, builder, tx_id)
}

#[test]
fn select_inputs_reserves_coins_once() {
    let (store, builder, tx_id) = builder_with_funds();

    builder.select_inputs(50).expect("select");
    let first: Vec<CoinId> = store.get_param(&tx_id, TxParameterID::InputCoins, 0).expect("get").expect("inputs");
    assert_eq!(first.iter().map(|c| c.amount).sum::<u64>(), 700);

    for coin in store.coins_by_tx(&tx_id).expect("coins") {
        if coin.spend_tx == Some(tx_id) {
            assert_eq!(coin.status, CoinStatus::Outgoing);
        }
    }

    // Re-entry is a no-op.
    builder.select_inputs(50).expect("select again");
    let second: Vec<CoinId> = store.get_param(&tx_id, TxParameterID::InputCoins, 0).expect("get").expect("inputs");
    assert_eq!(first, second);
}

#[test]
fn add_change_synthesizes_the_overshoot() {
    let (store, builder, tx_id) = builder_with_funds();
    builder.select_inputs(50).expect("select");
    builder.add_change().expect("change");

    let change: Vec<(u64, u64)> = store.get_param(&tx_id, TxParameterID::Change, 0).expect("get").expect("change");
    assert_eq!(change, vec![(0, 100)]);

    let outputs: Vec<CoinId> = store.get_param(&tx_id, TxParameterID::OutputCoins, 0).expect("get").expect("outputs");
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].amount, 100);
    assert_eq!(outputs[0].key_type, CoinKeyType::Change);

    builder.add_change().expect("change again");
    let outputs_again: Vec<CoinId> = store.get_param(&tx_id, TxParameterID::OutputCoins, 0).expect("get").expect("outputs");
    assert_eq!(outputs, outputs_again);
}

#[test]
fn keeper_steps_complete_inline_and_are_idempotent() {
    let (store, builder, tx_id) = builder_with_funds();
    builder.select_inputs(50).expect("select");
    builder.add_change().expect("change");

    assert_eq!(builder.generate_nonce().expect("nonce"), BuildStep::Ready);
    let slot: u64 = store.get_param(&tx_id, TxParameterID::NonceSlot, 0).expect("get").expect("slot");

    assert_eq!(builder.create_inputs().expect("inputs"), BuildStep::Ready);
    assert_eq!(builder.create_outputs().expect("outputs"), BuildStep::Ready);
    assert_eq!(builder.sign_sender(true).expect("sign"), BuildStep::Ready);

    assert!(store.has_param(&tx_id, TxParameterID::PublicExcess, 0).expect("has"));
    assert!(store.has_param(&tx_id, TxParameterID::PublicNonce, 0).expect("has"));
    assert!(store.has_param(&tx_id, TxParameterID::Offset, 0).expect("has"));

    // Re-running does not allocate a second slot.
    assert_eq!(builder.generate_nonce().expect("nonce"), BuildStep::Ready);
    let slot_again: u64 = store.get_param(&tx_id, TxParameterID::NonceSlot, 0).expect("get").expect("slot");
    assert_eq!(slot, slot_again);
}

#[test]
fn update_max_height_honors_peer_proposal_and_tip() {
    let (store, builder, tx_id) = builder_with_funds();

    store.set_param(&tx_id, TxParameterID::PeerMaxHeight, &120u64, 0).expect("set");
    assert!(builder.update_max_height(50).expect("update"));
    let max: u64 = store.get_param(&tx_id, TxParameterID::MaxHeight, 0).expect("get").expect("max");
    assert_eq!(max, 120);

    // Already fixed: a later, larger tip no longer changes it.
    assert!(builder.update_max_height(50).expect("update"));

    let (store2, builder2, tx_id2) = builder_with_funds();
    store2.set_param(&tx_id2, TxParameterID::PeerMaxHeight, &40u64, 0).expect("set");
    assert!(!builder2.update_max_height(50).expect("update"));
}
