//! The cooperative event loop: events dispatch into the service, keeper
//! completions drain through the wake event, and observers hear about
//! interesting parameter changes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use crate::fixtures::{test_wallet, TestGateway, TestWallet};
use veil_core::application::{Reactor, WalletEvent, WalletService};
use veil_core::domain::model::{Coin, CoinId, CoinKeyType, WalletAddress};
use veil_core::domain::params::TxParameterID;
use veil_core::foundation::TxId;
use veil_core::infrastructure::config::WalletConfig;
use veil_core::infrastructure::keykeeper::{KeyKeeper, LocalKeyKeeper, ThreadedKeyKeeper, WakeEvent};
use veil_core::infrastructure::storage::{
    AddressStore, CoinStore, MemoryWalletStore, ObservableStore, StoreObserver,
};

#[test]
fn reactor_processes_events_until_shutdown() {
    let TestWallet { service, .. } = test_wallet(5);
    let (sender, receiver) = mpsc::channel();
    sender.send(WalletEvent::Tip(42)).expect("queue tip");
    sender.send(WalletEvent::Shutdown).expect("queue shutdown");

    let mut reactor = Reactor::new(service, receiver);
    reactor.run();
    assert_eq!(reactor.service().tip(), 42);
}

#[test]
fn reactor_drains_threaded_keeper_completions() {
    let store = Arc::new(MemoryWalletStore::new());
    let local = Arc::new(LocalKeyKeeper::new([6u8; 32], store.clone()).expect("keeper"));
    let my_id = local.sbbs_public(1).expect("own id");
    store
        .save_address(&WalletAddress { wallet_id: my_id, own_id: 1, label: "own".to_string(), create_time: 1, duration: 0 })
        .expect("address");
    let idx = store.next_coin_idx().expect("idx");
    store.store_coins(&[Coin::available(CoinId::new(idx, 500, 0, CoinKeyType::Regular), 0)]).expect("fund");

    let wake = Arc::new(WakeEvent::new());
    let keeper = Arc::new(ThreadedKeyKeeper::new(local, wake));
    let gateway = Arc::new(TestGateway::new());
    let service = WalletService::new(store, keeper.clone(), gateway.clone(), WalletConfig::default());

    let (sender, receiver) = mpsc::channel();
    let mut reactor = Reactor::new(service, receiver).with_threaded_keeper(keeper);

    reactor.service_mut().on_tip(10).expect("tip");
    let tx_id = reactor.service_mut().split(my_id, vec![200, 100], 10).expect("split");

    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_secs(1));
        let _ = sender.send(WalletEvent::Shutdown);
    });
    reactor.run();

    // The loop fed every keeper completion back into the driver, which ended
    // at the node submission.
    let registered = gateway.drain_registered();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].0, tx_id);
}

struct InterestingCounter(AtomicUsize);

impl StoreObserver for InterestingCounter {
    fn on_tx_parameter_changed(&self, _tx_id: &TxId, id: TxParameterID) {
        assert!(id.is_interesting());
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn observers_hear_about_interesting_parameters() {
    let inner = Arc::new(MemoryWalletStore::new());
    let local = Arc::new(LocalKeyKeeper::new([7u8; 32], inner.clone()).expect("keeper"));
    let my_id = local.sbbs_public(1).expect("own id");
    inner
        .save_address(&WalletAddress { wallet_id: my_id, own_id: 1, label: "own".to_string(), create_time: 1, duration: 0 })
        .expect("address");

    let observable = Arc::new(ObservableStore::new(inner));
    let counter = Arc::new(InterestingCounter(AtomicUsize::new(0)));
    observable.subscribe(counter.clone());

    let executor = Arc::new(veil_core::infrastructure::keykeeper::SyncKeeperExecutor::new(local));
    let gateway = Arc::new(TestGateway::new());
    let mut service = WalletService::new(observable, executor, gateway, WalletConfig::default());

    // Not funded: the record fails at input selection, but creation alone
    // touches Amount, Fee, Status and friends.
    service.on_tip(10).expect("tip");
    let _ = service.split(my_id, vec![100], 10).expect("split");
    assert!(counter.0.load(Ordering::SeqCst) >= 5);
}
