//! The same negotiation driven through the threaded key keeper: every
//! keeper-backed step suspends the driver, and the completion re-enters it.

use std::sync::Arc;
use std::time::Duration;

use crate::fixtures::TestGateway;
use veil_core::application::WalletService;
use veil_core::domain::model::{Coin, CoinId, CoinKeyType, RegisterResult, WalletAddress};
use veil_core::domain::negotiation::UserStatus;
use veil_core::domain::params::TxParameterID;
use veil_core::foundation::KernelId;
use veil_core::infrastructure::config::WalletConfig;
use veil_core::infrastructure::keykeeper::{KeyKeeper, LocalKeyKeeper, ThreadedKeyKeeper, WakeEvent};
use veil_core::infrastructure::storage::{AddressStore, CoinStore, MemoryWalletStore, ParameterStoreExt};

#[test]
fn split_completes_with_a_threaded_keeper() {
    let store = Arc::new(MemoryWalletStore::new());
    let local = Arc::new(LocalKeyKeeper::new([8u8; 32], store.clone()).expect("keeper"));
    let my_id = local.sbbs_public(1).expect("own id");
    store
        .save_address(&WalletAddress { wallet_id: my_id, own_id: 1, label: "own".to_string(), create_time: 1, duration: 0 })
        .expect("address");

    let idx = store.next_coin_idx().expect("idx");
    store.store_coins(&[Coin::available(CoinId::new(idx, 200, 0, CoinKeyType::Regular), 0)]).expect("fund");

    let wake = Arc::new(WakeEvent::new());
    let keeper = Arc::new(ThreadedKeyKeeper::new(local, Arc::clone(&wake)));
    let gateway = Arc::new(TestGateway::new());
    let mut service = WalletService::new(store.clone(), keeper.clone(), gateway.clone(), WalletConfig::default());

    service.on_tip(10).expect("tip");
    let tx_id = service.split(my_id, vec![100, 50], 10).expect("split");

    // The first update suspended on the keeper; drive completions until the
    // driver reaches the node submission.
    let mut registered = Vec::new();
    for _ in 0..16 {
        registered = gateway.drain_registered();
        if !registered.is_empty() {
            break;
        }
        assert!(wake.wait(Duration::from_secs(10)), "keeper worker should complete a request");
        for completion in keeper.drain_completions() {
            service.on_keeper_completion(completion).expect("completion");
        }
    }
    assert_eq!(registered.len(), 1, "driver should have submitted after keeper completions");

    service.on_register_verdict(&tx_id, RegisterResult::Ok).expect("verdict");
    let kernel_id: KernelId =
        store.get_param(&tx_id, TxParameterID::KernelId, 0).expect("get").expect("kernel id");
    assert!(!gateway.drain_confirms().is_empty());

    service.on_kernel_proof(&tx_id, 12).expect("proof");
    assert_eq!(service.user_status(&tx_id).expect("status"), UserStatus::Completed);

    // The kernel the node was asked to prove is the one that was finalized.
    let kernel: veil_core::domain::transaction::TxKernel =
        store.get_param(&tx_id, TxParameterID::Kernel, 0).expect("get").expect("kernel");
    assert_eq!(kernel.id(), kernel_id);
}
