use serde::{Deserialize, Serialize};
use std::fmt;

/// Keys of the per-transaction parameter store.
///
/// Discriminants are part of the persisted format and of the peer wire; they
/// are append-only. Ids below 40 may appear in peer messages, the rest are
/// local to this wallet.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[repr(u8)]
pub enum TxParameterID {
    TransactionType = 0,
    IsSender = 1,
    Amount = 2,
    Fee = 3,
    MinHeight = 4,
    MaxHeight = 5,
    Lifetime = 6,
    AssetId = 7,
    PeerProtoVersion = 8,
    PeerPublicExcess = 9,
    PeerPublicNonce = 10,
    PeerSignature = 11,
    PeerInputs = 12,
    PeerOutputs = 13,
    PeerOffset = 14,
    PeerMaxHeight = 15,
    PaymentConfirmation = 16,
    TransactionRegistered = 17,

    MyId = 40,
    PeerId = 41,
    MySecureWalletId = 42,
    PeerSecureWalletId = 43,
    IsSelfTx = 44,
    Status = 45,
    State = 46,
    FailureReason = 47,
    CreateTime = 48,
    ModifyTime = 49,
    AmountList = 50,
    PeerResponseHeight = 51,
    KernelId = 52,
    KernelProofHeight = 53,
    KernelUnconfirmedHeight = 54,
    Message = 55,

    InputCoins = 60,
    OutputCoins = 61,
    Change = 62,
    NonceSlot = 63,
    PublicExcess = 64,
    PublicNonce = 65,
    PartialSignature = 66,
    Offset = 67,
    Inputs = 68,
    Outputs = 69,
    Kernel = 70,
}

impl TxParameterID {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        use TxParameterID::*;
        let id = match value {
            0 => TransactionType,
            1 => IsSender,
            2 => Amount,
            3 => Fee,
            4 => MinHeight,
            5 => MaxHeight,
            6 => Lifetime,
            7 => AssetId,
            8 => PeerProtoVersion,
            9 => PeerPublicExcess,
            10 => PeerPublicNonce,
            11 => PeerSignature,
            12 => PeerInputs,
            13 => PeerOutputs,
            14 => PeerOffset,
            15 => PeerMaxHeight,
            16 => PaymentConfirmation,
            17 => TransactionRegistered,
            40 => MyId,
            41 => PeerId,
            42 => MySecureWalletId,
            43 => PeerSecureWalletId,
            44 => IsSelfTx,
            45 => Status,
            46 => State,
            47 => FailureReason,
            48 => CreateTime,
            49 => ModifyTime,
            50 => AmountList,
            51 => PeerResponseHeight,
            52 => KernelId,
            53 => KernelProofHeight,
            54 => KernelUnconfirmedHeight,
            55 => Message,
            60 => InputCoins,
            61 => OutputCoins,
            62 => Change,
            63 => NonceSlot,
            64 => PublicExcess,
            65 => PublicNonce,
            66 => PartialSignature,
            67 => Offset,
            68 => Inputs,
            69 => Outputs,
            70 => Kernel,
            _ => return None,
        };
        Some(id)
    }

    /// Whether an inbound peer message is allowed to write this key.
    pub fn is_peer_writable(self) -> bool {
        use TxParameterID::*;
        matches!(
            self,
            Amount
                | Fee
                | MinHeight
                | Lifetime
                | AssetId
                | IsSender
                | PeerProtoVersion
                | PeerPublicExcess
                | PeerPublicNonce
                | PeerSignature
                | PeerInputs
                | PeerOutputs
                | PeerOffset
                | PeerMaxHeight
                | PaymentConfirmation
                | TransactionRegistered
        )
    }

    /// Curated subset whose changes are surfaced to observers.
    pub fn is_interesting(self) -> bool {
        use TxParameterID::*;
        matches!(
            self,
            Amount | Fee | MinHeight | PeerId | MyId | CreateTime | IsSender | Status | TransactionType | KernelId | AssetId
        )
    }
}

impl fmt::Display for TxParameterID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
