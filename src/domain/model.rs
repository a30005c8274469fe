use crate::foundation::{Amount, AssetId, Height, OwnAddressId, Timestamp, TxId, WalletId};
use serde::{Deserialize, Serialize};

/// Negotiation flavors dispatched by the driver table.
///
/// `Split` is the degenerate self-directed transfer (peer == self) and reuses
/// the `Simple` driver.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[repr(u8)]
pub enum TxKind {
    Simple = 0,
    Split = 1,
}

/// Role of this wallet in a record, derived from `IsSender` and whether the
/// peer address resolves to an owned one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxRole {
    Sender,
    Receiver,
    SelfTx,
}

/// Key derivation flavor of a coin.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[repr(u8)]
pub enum CoinKeyType {
    Regular = 0,
    Change = 1,
}

/// Identity of a coin key. The blinding factor and the commitment are
/// re-derivable from this id by the key keeper; the wallet database never
/// holds secret material.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct CoinId {
    pub idx: u64,
    pub amount: Amount,
    pub asset_id: AssetId,
    pub key_type: CoinKeyType,
}

impl CoinId {
    pub fn new(idx: u64, amount: Amount, asset_id: AssetId, key_type: CoinKeyType) -> Self {
        Self { idx, amount, asset_id, key_type }
    }

    /// Canonical bytes fed to key derivation. Stable across releases.
    pub fn to_kdf_bytes(&self) -> [u8; 25] {
        let mut out = [0u8; 25];
        out[0..8].copy_from_slice(&self.idx.to_le_bytes());
        out[8..16].copy_from_slice(&self.amount.to_le_bytes());
        out[16..24].copy_from_slice(&self.asset_id.to_le_bytes());
        out[24] = self.key_type as u8;
        out
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CoinStatus {
    /// Spendable.
    Available,
    /// Reserved by an in-flight outgoing record.
    Outgoing,
    /// Created by an in-flight record, not yet confirmed.
    Incoming,
    /// Consumed by a completed record.
    Spent,
}

/// One wallet coin (UTXO). A coin reserved for an in-flight record stays
/// `Outgoing` until that record completes or fails.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Coin {
    pub id: CoinId,
    pub status: CoinStatus,
    /// Height at which the coin became (or becomes) spendable.
    pub maturity: Height,
    pub create_tx: Option<TxId>,
    pub spend_tx: Option<TxId>,
    pub confirm_height: Option<Height>,
}

impl Coin {
    pub fn available(id: CoinId, maturity: Height) -> Self {
        Self { id, status: CoinStatus::Available, maturity, create_tx: None, spend_tx: None, confirm_height: None }
    }

    pub fn amount(&self) -> Amount {
        self.id.amount
    }

    pub fn asset_id(&self) -> AssetId {
        self.id.asset_id
    }
}

/// Address book entry. `own_id != 0` marks an owned address whose SBBS key the
/// keeper can derive.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WalletAddress {
    pub wallet_id: WalletId,
    pub own_id: OwnAddressId,
    pub label: String,
    pub create_time: Timestamp,
    /// Seconds the address stays valid; 0 means it never expires.
    pub duration: u64,
}

impl WalletAddress {
    pub fn foreign(wallet_id: WalletId, label: impl Into<String>, create_time: Timestamp) -> Self {
        Self { wallet_id, own_id: 0, label: label.into(), create_time, duration: 0 }
    }

    pub fn is_own(&self) -> bool {
        self.own_id != 0
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.duration != 0 && now >= self.create_time.saturating_add(self.duration)
    }
}

/// Verdicts the node returns for a submitted transaction.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[repr(u8)]
pub enum RegisterResult {
    Ok = 0,
    InvalidInput = 1,
    InvalidContext = 2,
    LowFee = 3,
    TooLarge = 4,
    Unspecified = 255,
}
