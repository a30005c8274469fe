use crate::domain::model::{Coin, WalletAddress};
use crate::domain::params::TxParameterID;
use crate::foundation::{AssetId, Result, SubTxId, TxId, WalletId};
use crate::infrastructure::storage::traits::{AddressStore, CoinStore, ParameterStore, VariablesStore, WalletStorage};
use std::sync::{Arc, Mutex};

/// Subscriber to parameter-store changes. Notification is best-effort,
/// limited to the curated interesting subset, and may coalesce.
pub trait StoreObserver: Send + Sync {
    fn on_tx_parameter_changed(&self, tx_id: &TxId, id: TxParameterID);
}

/// Decorates a wallet store with change notifications.
pub struct ObservableStore {
    inner: Arc<dyn WalletStorage>,
    observers: Mutex<Vec<Arc<dyn StoreObserver>>>,
}

impl ObservableStore {
    pub fn new(inner: Arc<dyn WalletStorage>) -> Self {
        Self { inner, observers: Mutex::new(Vec::new()) }
    }

    pub fn subscribe(&self, observer: Arc<dyn StoreObserver>) {
        if let Ok(mut observers) = self.observers.lock() {
            observers.push(observer);
        }
    }

    fn notify(&self, tx_id: &TxId, raw_id: u8) {
        let Some(id) = TxParameterID::from_u8(raw_id) else {
            return;
        };
        if !id.is_interesting() {
            return;
        }
        let Ok(observers) = self.observers.lock() else {
            return;
        };
        for observer in observers.iter() {
            observer.on_tx_parameter_changed(tx_id, id);
        }
    }
}

impl ParameterStore for ObservableStore {
    fn set_raw(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8, value: &[u8]) -> Result<()> {
        self.inner.set_raw(tx_id, sub_tx, id, value)?;
        self.notify(tx_id, id);
        Ok(())
    }

    fn get_raw(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8) -> Result<Option<Vec<u8>>> {
        self.inner.get_raw(tx_id, sub_tx, id)
    }

    fn delete(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8) -> Result<()> {
        self.inner.delete(tx_id, sub_tx, id)
    }

    fn delete_tx(&self, tx_id: &TxId) -> Result<()> {
        self.inner.delete_tx(tx_id)
    }

    fn list_tx_ids(&self) -> Result<Vec<TxId>> {
        self.inner.list_tx_ids()
    }
}

impl CoinStore for ObservableStore {
    fn store_coins(&self, coins: &[Coin]) -> Result<()> {
        self.inner.store_coins(coins)
    }

    fn update_coins(&self, coins: &[Coin]) -> Result<()> {
        self.inner.update_coins(coins)
    }

    fn remove_coins(&self, coins: &[Coin]) -> Result<()> {
        self.inner.remove_coins(coins)
    }

    fn coins_by_asset(&self, asset_id: AssetId) -> Result<Vec<Coin>> {
        self.inner.coins_by_asset(asset_id)
    }

    fn coins_by_tx(&self, tx_id: &TxId) -> Result<Vec<Coin>> {
        self.inner.coins_by_tx(tx_id)
    }

    fn next_coin_idx(&self) -> Result<u64> {
        self.inner.next_coin_idx()
    }
}

impl AddressStore for ObservableStore {
    fn get_address(&self, wallet_id: &WalletId) -> Result<Option<WalletAddress>> {
        self.inner.get_address(wallet_id)
    }

    fn save_address(&self, address: &WalletAddress) -> Result<()> {
        self.inner.save_address(address)
    }
}

impl VariablesStore for ObservableStore {
    fn get_var(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get_var(name)
    }

    fn set_var(&self, name: &str, value: &[u8]) -> Result<()> {
        self.inner.set_var(name, value)
    }
}
