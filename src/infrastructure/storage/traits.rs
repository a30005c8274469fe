use crate::domain::model::{Coin, WalletAddress};
use crate::domain::params::codec::{decode_param, encode_param};
use crate::domain::params::TxParameterID;
use crate::foundation::{AssetId, Result, SubTxId, TxId, WalletError, WalletId};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Persistent typed key/value map per transaction id.
///
/// Values are opaque length-prefixed buffers; every call is durable and
/// atomic on its own. A missing key is not an error.
pub trait ParameterStore: Send + Sync {
    fn set_raw(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8, value: &[u8]) -> Result<()>;
    fn get_raw(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8) -> Result<Option<Vec<u8>>>;
    fn delete(&self, tx_id: &TxId, sub_tx: SubTxId, id: u8) -> Result<()>;
    /// Removes the whole record (explicit purge of terminal records only).
    fn delete_tx(&self, tx_id: &TxId) -> Result<()>;
    fn list_tx_ids(&self) -> Result<Vec<TxId>>;
}

/// Typed access over the raw buffers.
pub trait ParameterStoreExt: ParameterStore {
    fn get_param<T: DeserializeOwned>(&self, tx_id: &TxId, id: TxParameterID, sub_tx: SubTxId) -> Result<Option<T>> {
        Ok(self.get_raw(tx_id, sub_tx, id.as_u8())?.and_then(|buf| decode_param(&buf)))
    }

    fn get_mandatory<T: DeserializeOwned>(&self, tx_id: &TxId, id: TxParameterID, sub_tx: SubTxId) -> Result<T> {
        self.get_param(tx_id, id, sub_tx)?.ok_or_else(|| WalletError::missing_parameter(id.to_string()))
    }

    fn set_param<T: Serialize>(&self, tx_id: &TxId, id: TxParameterID, value: &T, sub_tx: SubTxId) -> Result<()> {
        self.set_raw(tx_id, sub_tx, id.as_u8(), &encode_param(value)?)
    }

    fn has_param(&self, tx_id: &TxId, id: TxParameterID, sub_tx: SubTxId) -> Result<bool> {
        Ok(self.get_raw(tx_id, sub_tx, id.as_u8())?.is_some())
    }
}

impl<S: ParameterStore + ?Sized> ParameterStoreExt for S {}

pub trait CoinStore: Send + Sync {
    fn store_coins(&self, coins: &[Coin]) -> Result<()>;
    fn update_coins(&self, coins: &[Coin]) -> Result<()>;
    fn remove_coins(&self, coins: &[Coin]) -> Result<()>;
    /// All coins of one asset, regardless of status.
    fn coins_by_asset(&self, asset_id: AssetId) -> Result<Vec<Coin>>;
    /// Coins created or reserved by the given record.
    fn coins_by_tx(&self, tx_id: &TxId) -> Result<Vec<Coin>>;
    fn next_coin_idx(&self) -> Result<u64>;
}

pub trait AddressStore: Send + Sync {
    fn get_address(&self, wallet_id: &WalletId) -> Result<Option<WalletAddress>>;
    fn save_address(&self, address: &WalletAddress) -> Result<()>;
}

/// Raw named blobs outside any transaction record (nonce-slot seeds and the
/// like).
pub trait VariablesStore: Send + Sync {
    fn get_var(&self, name: &str) -> Result<Option<Vec<u8>>>;
    fn set_var(&self, name: &str, value: &[u8]) -> Result<()>;
}

pub trait WalletStorage: ParameterStore + CoinStore + AddressStore + VariablesStore {}

impl<S: ParameterStore + CoinStore + AddressStore + VariablesStore> WalletStorage for S {}
