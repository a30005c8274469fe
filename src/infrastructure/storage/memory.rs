use crate::domain::model::{Coin, WalletAddress};
use crate::foundation::{AssetId, Result, SubTxId, TxId, WalletError, WalletId};
use crate::infrastructure::storage::traits::{AddressStore, CoinStore, ParameterStore, VariablesStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

struct MemoryInner {
    params: BTreeMap<(TxId, SubTxId, u8), Vec<u8>>,
    coins: BTreeMap<(u64, AssetId), Coin>,
    addresses: HashMap<WalletId, WalletAddress>,
    variables: HashMap<String, Vec<u8>>,
    next_coin_idx: u64,
}

impl MemoryInner {
    fn new() -> Self {
        Self {
            params: BTreeMap::new(),
            coins: BTreeMap::new(),
            addresses: HashMap::new(),
            variables: HashMap::new(),
            next_coin_idx: 1,
        }
    }
}

/// In-memory wallet database; the reference implementation of the storage
/// traits used by the test harness.
pub struct MemoryWalletStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(MemoryInner::new())) }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner.lock().map_err(|_| WalletError::StorageError {
            operation: "memory".to_string(),
            details: "lock poisoned".to_string(),
        })
    }
}

impl Default for MemoryWalletStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore for MemoryWalletStore {
    fn set_raw(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8, value: &[u8]) -> Result<()> {
        self.lock_inner()?.params.insert((*tx_id, sub_tx, id), value.to_vec());
        Ok(())
    }

    fn get_raw(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8) -> Result<Option<Vec<u8>>> {
        Ok(self.lock_inner()?.params.get(&(*tx_id, sub_tx, id)).cloned())
    }

    fn delete(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8) -> Result<()> {
        self.lock_inner()?.params.remove(&(*tx_id, sub_tx, id));
        Ok(())
    }

    fn delete_tx(&self, tx_id: &TxId) -> Result<()> {
        self.lock_inner()?.params.retain(|(id, _, _), _| id != tx_id);
        Ok(())
    }

    fn list_tx_ids(&self) -> Result<Vec<TxId>> {
        let inner = self.lock_inner()?;
        let mut ids: Vec<TxId> = inner.params.keys().map(|(id, _, _)| *id).collect();
        ids.dedup();
        Ok(ids)
    }
}

impl CoinStore for MemoryWalletStore {
    fn store_coins(&self, coins: &[Coin]) -> Result<()> {
        let mut inner = self.lock_inner()?;
        for coin in coins {
            inner.coins.insert((coin.id.idx, coin.id.asset_id), coin.clone());
            if coin.id.idx >= inner.next_coin_idx {
                inner.next_coin_idx = coin.id.idx + 1;
            }
        }
        Ok(())
    }

    fn update_coins(&self, coins: &[Coin]) -> Result<()> {
        let mut inner = self.lock_inner()?;
        for coin in coins {
            inner.coins.insert((coin.id.idx, coin.id.asset_id), coin.clone());
        }
        Ok(())
    }

    fn remove_coins(&self, coins: &[Coin]) -> Result<()> {
        let mut inner = self.lock_inner()?;
        for coin in coins {
            inner.coins.remove(&(coin.id.idx, coin.id.asset_id));
        }
        Ok(())
    }

    fn coins_by_asset(&self, asset_id: AssetId) -> Result<Vec<Coin>> {
        Ok(self.lock_inner()?.coins.values().filter(|c| c.id.asset_id == asset_id).cloned().collect())
    }

    fn coins_by_tx(&self, tx_id: &TxId) -> Result<Vec<Coin>> {
        Ok(self
            .lock_inner()?
            .coins
            .values()
            .filter(|c| c.create_tx.as_ref() == Some(tx_id) || c.spend_tx.as_ref() == Some(tx_id))
            .cloned()
            .collect())
    }

    fn next_coin_idx(&self) -> Result<u64> {
        let mut inner = self.lock_inner()?;
        let idx = inner.next_coin_idx;
        inner.next_coin_idx += 1;
        Ok(idx)
    }
}

impl AddressStore for MemoryWalletStore {
    fn get_address(&self, wallet_id: &WalletId) -> Result<Option<WalletAddress>> {
        Ok(self.lock_inner()?.addresses.get(wallet_id).cloned())
    }

    fn save_address(&self, address: &WalletAddress) -> Result<()> {
        self.lock_inner()?.addresses.insert(address.wallet_id, address.clone());
        Ok(())
    }
}

impl VariablesStore for MemoryWalletStore {
    fn get_var(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock_inner()?.variables.get(name).cloned())
    }

    fn set_var(&self, name: &str, value: &[u8]) -> Result<()> {
        self.lock_inner()?.variables.insert(name.to_string(), value.to_vec());
        Ok(())
    }
}
