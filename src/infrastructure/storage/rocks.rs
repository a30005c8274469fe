//! RocksDB-backed wallet store.

use crate::domain::model::{Coin, WalletAddress};
use crate::foundation::{AssetId, Result, SubTxId, TxId, WalletError, WalletId};
use crate::infrastructure::storage::traits::{AddressStore, CoinStore, ParameterStore, VariablesStore};
use crate::storage_err;
use log::{debug, info, warn};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options as RocksOptions, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

const CF_METADATA: &str = "metadata";
const CF_PARAMS: &str = "params";
const CF_COINS: &str = "coins";
const CF_ADDRESSES: &str = "addresses";
const CF_VARIABLES: &str = "variables";

const SCHEMA_VERSION: u32 = 1;

/// Helper to build storage keys consistently.
struct KeyBuilder {
    buf: Vec<u8>,
}

impl KeyBuilder {
    fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    fn bytes(mut self, value: &[u8]) -> Self {
        self.buf.extend_from_slice(value);
        self
    }

    fn u64_be(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn u32_be(mut self, value: u32) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn u8(mut self, value: u8) -> Self {
        self.buf.push(value);
        self
    }

    fn build(self) -> Vec<u8> {
        self.buf
    }
}

fn open_db_with_cfs(path: &Path) -> Result<DB> {
    let mut options = RocksOptions::default();
    options.create_if_missing(true);
    options.create_missing_column_families(true);
    options.set_use_fsync(true);
    options.set_paranoid_checks(true);
    options.optimize_for_point_lookup(64);

    let cfs = vec![
        ColumnFamilyDescriptor::new(CF_METADATA, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_PARAMS, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_COINS, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_ADDRESSES, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_VARIABLES, RocksOptions::default()),
    ];

    DB::open_cf_descriptors(&options, path, cfs).map_err(|err| WalletError::RocksDbOpenError { details: err.to_string() })
}

pub struct RocksWalletStore {
    db: DB,
    coin_idx_lock: Mutex<()>,
}

impl RocksWalletStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening RocksWalletStore path={}", path.display());
        let db = open_db_with_cfs(path)?;
        let store = Self { db, coin_idx_lock: Mutex::new(()) };
        store.check_schema_version()?;
        info!("RocksWalletStore opened path={}", path.display());
        Ok(store)
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| WalletError::StorageError {
            operation: "cf_handle".to_string(),
            details: format!("missing column family: {}", name),
        })
    }

    fn check_schema_version(&self) -> Result<()> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, b"schema_version").map_err(|e| storage_err!("rocksdb get schema_version", e))? {
            None => {
                info!("initializing fresh wallet db schema_version={}", SCHEMA_VERSION);
                self.db
                    .put_cf(cf, b"schema_version", SCHEMA_VERSION.to_be_bytes())
                    .map_err(|e| storage_err!("rocksdb put schema_version", e))?;
                Ok(())
            }
            Some(bytes) if bytes.len() == 4 => {
                let stored = u32::from_be_bytes(bytes.as_slice().try_into().expect("length checked"));
                if stored == SCHEMA_VERSION {
                    Ok(())
                } else {
                    warn!("wallet db schema version mismatch stored={} supported={}", stored, SCHEMA_VERSION);
                    Err(WalletError::StorageError {
                        operation: "schema".to_string(),
                        details: format!("schema version {} not supported (expected {})", stored, SCHEMA_VERSION),
                    })
                }
            }
            Some(_) => Err(WalletError::StorageError {
                operation: "schema".to_string(),
                details: "corrupt schema version".to_string(),
            }),
        }
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn key_param(tx_id: &TxId, sub_tx: SubTxId, id: u8) -> Vec<u8> {
        KeyBuilder::with_capacity(21).bytes(tx_id.as_ref()).u32_be(sub_tx).u8(id).build()
    }

    fn key_coin(idx: u64, asset_id: AssetId) -> Vec<u8> {
        KeyBuilder::with_capacity(16).u64_be(idx).u64_be(asset_id).build()
    }
}

impl ParameterStore for RocksWalletStore {
    fn set_raw(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8, value: &[u8]) -> Result<()> {
        let cf = self.cf_handle(CF_PARAMS)?;
        self.db.put_cf(cf, Self::key_param(tx_id, sub_tx, id), value).map_err(|e| storage_err!("rocksdb put param", e))
    }

    fn get_raw(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle(CF_PARAMS)?;
        self.db.get_cf(cf, Self::key_param(tx_id, sub_tx, id)).map_err(|e| storage_err!("rocksdb get param", e))
    }

    fn delete(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8) -> Result<()> {
        let cf = self.cf_handle(CF_PARAMS)?;
        self.db.delete_cf(cf, Self::key_param(tx_id, sub_tx, id)).map_err(|e| storage_err!("rocksdb delete param", e))
    }

    fn delete_tx(&self, tx_id: &TxId) -> Result<()> {
        let cf = self.cf_handle(CF_PARAMS)?;
        let prefix = tx_id.as_ref().to_vec();
        let iter = self.db.iterator_cf(cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward));
        for entry in iter {
            let (key, _) = entry.map_err(|e| storage_err!("rocksdb iterate params", e))?;
            if !key.starts_with(&prefix) {
                break;
            }
            self.db.delete_cf(cf, key).map_err(|e| storage_err!("rocksdb delete param", e))?;
        }
        Ok(())
    }

    fn list_tx_ids(&self) -> Result<Vec<TxId>> {
        let cf = self.cf_handle(CF_PARAMS)?;
        let mut ids: Vec<TxId> = Vec::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = entry.map_err(|e| storage_err!("rocksdb iterate params", e))?;
            if key.len() < 16 {
                continue;
            }
            let mut raw = [0u8; 16];
            raw.copy_from_slice(&key[..16]);
            let tx_id = TxId::new(raw);
            if ids.last() != Some(&tx_id) {
                ids.push(tx_id);
            }
        }
        Ok(ids)
    }
}

impl CoinStore for RocksWalletStore {
    fn store_coins(&self, coins: &[Coin]) -> Result<()> {
        self.update_coins(coins)
    }

    fn update_coins(&self, coins: &[Coin]) -> Result<()> {
        let cf = self.cf_handle(CF_COINS)?;
        for coin in coins {
            self.db
                .put_cf(cf, Self::key_coin(coin.id.idx, coin.id.asset_id), Self::encode(coin)?)
                .map_err(|e| storage_err!("rocksdb put coin", e))?;
        }
        // Keep the allocator ahead of externally-assigned indices.
        let _guard = self.coin_idx_lock.lock().map_err(|_| WalletError::StorageError {
            operation: "update_coins".to_string(),
            details: "lock poisoned".to_string(),
        })?;
        let meta = self.cf_handle(CF_METADATA)?;
        let stored = match self.db.get_cf(meta, b"next_coin_idx").map_err(|e| storage_err!("rocksdb get next_coin_idx", e))? {
            Some(bytes) if bytes.len() == 8 => u64::from_be_bytes(bytes.as_slice().try_into().expect("length checked")),
            _ => 1,
        };
        if let Some(max_idx) = coins.iter().map(|c| c.id.idx).max() {
            if max_idx >= stored {
                self.db
                    .put_cf(meta, b"next_coin_idx", (max_idx + 1).to_be_bytes())
                    .map_err(|e| storage_err!("rocksdb put next_coin_idx", e))?;
            }
        }
        Ok(())
    }

    fn remove_coins(&self, coins: &[Coin]) -> Result<()> {
        let cf = self.cf_handle(CF_COINS)?;
        for coin in coins {
            self.db
                .delete_cf(cf, Self::key_coin(coin.id.idx, coin.id.asset_id))
                .map_err(|e| storage_err!("rocksdb delete coin", e))?;
        }
        Ok(())
    }

    fn coins_by_asset(&self, asset_id: AssetId) -> Result<Vec<Coin>> {
        let cf = self.cf_handle(CF_COINS)?;
        let mut coins = Vec::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = entry.map_err(|e| storage_err!("rocksdb iterate coins", e))?;
            let coin: Coin = Self::decode(&value)?;
            if coin.id.asset_id == asset_id {
                coins.push(coin);
            }
        }
        Ok(coins)
    }

    fn coins_by_tx(&self, tx_id: &TxId) -> Result<Vec<Coin>> {
        let cf = self.cf_handle(CF_COINS)?;
        let mut coins = Vec::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = entry.map_err(|e| storage_err!("rocksdb iterate coins", e))?;
            let coin: Coin = Self::decode(&value)?;
            if coin.create_tx.as_ref() == Some(tx_id) || coin.spend_tx.as_ref() == Some(tx_id) {
                coins.push(coin);
            }
        }
        Ok(coins)
    }

    fn next_coin_idx(&self) -> Result<u64> {
        let _guard = self.coin_idx_lock.lock().map_err(|_| WalletError::StorageError {
            operation: "next_coin_idx".to_string(),
            details: "lock poisoned".to_string(),
        })?;
        let cf = self.cf_handle(CF_METADATA)?;
        let next = match self.db.get_cf(cf, b"next_coin_idx").map_err(|e| storage_err!("rocksdb get next_coin_idx", e))? {
            Some(bytes) if bytes.len() == 8 => u64::from_be_bytes(bytes.as_slice().try_into().expect("length checked")),
            _ => 1,
        };
        self.db
            .put_cf(cf, b"next_coin_idx", (next + 1).to_be_bytes())
            .map_err(|e| storage_err!("rocksdb put next_coin_idx", e))?;
        Ok(next)
    }
}

impl AddressStore for RocksWalletStore {
    fn get_address(&self, wallet_id: &WalletId) -> Result<Option<WalletAddress>> {
        let cf = self.cf_handle(CF_ADDRESSES)?;
        match self.db.get_cf(cf, wallet_id.as_ref()).map_err(|e| storage_err!("rocksdb get address", e))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save_address(&self, address: &WalletAddress) -> Result<()> {
        let cf = self.cf_handle(CF_ADDRESSES)?;
        self.db
            .put_cf(cf, address.wallet_id.as_ref(), Self::encode(address)?)
            .map_err(|e| storage_err!("rocksdb put address", e))
    }
}

impl VariablesStore for RocksWalletStore {
    fn get_var(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle(CF_VARIABLES)?;
        self.db.get_cf(cf, name.as_bytes()).map_err(|e| storage_err!("rocksdb get var", e))
    }

    fn set_var(&self, name: &str, value: &[u8]) -> Result<()> {
        let cf = self.cf_handle(CF_VARIABLES)?;
        self.db.put_cf(cf, name.as_bytes(), value).map_err(|e| storage_err!("rocksdb put var", e))
    }
}
