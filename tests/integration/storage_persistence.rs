//! RocksDB-backed store: everything survives a close/reopen cycle.

use tempfile::TempDir;
use veil_core::domain::model::{Coin, CoinId, CoinKeyType, CoinStatus, WalletAddress};
use veil_core::domain::negotiation::TxStatus;
use veil_core::domain::params::TxParameterID;
use veil_core::foundation::{TxId, WalletId};
use veil_core::infrastructure::storage::{
    AddressStore, CoinStore, ParameterStore, ParameterStoreExt, RocksWalletStore, VariablesStore,
};

#[test]
fn parameters_coins_addresses_and_variables_survive_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let tx_id = TxId::new([5u8; 16]);

    {
        let store = RocksWalletStore::open(dir.path()).expect("open");
        store.set_param(&tx_id, TxParameterID::Amount, &1_000u64, 0).expect("set");
        store.set_param(&tx_id, TxParameterID::Status, &TxStatus::InProgress, 0).expect("set");
        store.set_param(&tx_id, TxParameterID::Amount, &2_000u64, 1).expect("set sub-tx");

        let mut coin = Coin::available(CoinId::new(1, 500, 0, CoinKeyType::Regular), 10);
        coin.status = CoinStatus::Outgoing;
        coin.spend_tx = Some(tx_id);
        store.store_coins(&[coin]).expect("coins");

        store
            .save_address(&WalletAddress {
                wallet_id: WalletId::new([9u8; 32]),
                own_id: 3,
                label: "hot".to_string(),
                create_time: 7,
                duration: 0,
            })
            .expect("address");
        store.set_var("keeper/nonce-slots", b"seed-material").expect("var");
    }

    let store = RocksWalletStore::open(dir.path()).expect("reopen");
    assert_eq!(store.get_param::<u64>(&tx_id, TxParameterID::Amount, 0).expect("get"), Some(1_000));
    assert_eq!(store.get_param::<u64>(&tx_id, TxParameterID::Amount, 1).expect("get"), Some(2_000));
    assert_eq!(
        store.get_param::<TxStatus>(&tx_id, TxParameterID::Status, 0).expect("get"),
        Some(TxStatus::InProgress)
    );

    let coins = store.coins_by_tx(&tx_id).expect("coins");
    assert_eq!(coins.len(), 1);
    assert_eq!(coins[0].status, CoinStatus::Outgoing);

    let address = store.get_address(&WalletId::new([9u8; 32])).expect("get").expect("address");
    assert_eq!(address.own_id, 3);
    assert_eq!(store.get_var("keeper/nonce-slots").expect("get"), Some(b"seed-material".to_vec()));

    assert!(store.next_coin_idx().expect("idx") >= 2);
    assert_eq!(store.list_tx_ids().expect("list"), vec![tx_id]);

    store.delete_tx(&tx_id).expect("purge");
    assert_eq!(store.get_param::<u64>(&tx_id, TxParameterID::Amount, 0).expect("get"), None);
}
