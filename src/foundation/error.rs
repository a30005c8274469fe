use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MissingParameter,
    InvalidParameterValue,
    InvalidTransactionParameters,
    AddressExpired,
    InsufficientFunds,
    StorageError,
    StorageLockTimeout,
    RocksDbOpenError,
    SerializationError,
    CryptoError,
    InvalidPoint,
    RangeProofError,
    KeyKeeperError,
    InvalidStateTransition,
    TransactionNotFound,
    CancelRefused,
    ConfigError,
    EncodingError,
    Message,
}

/// Terminal failure verdicts persisted on a negotiation record.
///
/// These are part of the on-disk format; the discriminants are stable.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[repr(u8)]
pub enum FailureReason {
    Unknown = 0,
    Canceled = 1,
    NoInputs = 2,
    MaxHeightIsUnacceptable = 3,
    InvalidPeerSignature = 4,
    NoPaymentProof = 5,
    InvalidKernelProof = 6,
    FailedToSendParameters = 7,
    FailedToRegister = 8,
    InvalidTransaction = 9,
    TransactionExpired = 10,
    NotEnoughDataForProof = 11,
    KeyKeeperError = 12,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::Unknown => "unexpected reason",
            FailureReason::Canceled => "transaction canceled",
            FailureReason::NoInputs => "no inputs to cover the requested value",
            FailureReason::MaxHeightIsUnacceptable => "kernel maximum height is unacceptable",
            FailureReason::InvalidPeerSignature => "peer partial signature is not valid",
            FailureReason::NoPaymentProof => "receiver payment proof is missing or not valid",
            FailureReason::InvalidKernelProof => "kernel inclusion proof is not valid",
            FailureReason::FailedToSendParameters => "failed to send parameters to the peer",
            FailureReason::FailedToRegister => "the node rejected the transaction",
            FailureReason::InvalidTransaction => "transaction is not valid",
            FailureReason::TransactionExpired => "transaction expired",
            FailureReason::NotEnoughDataForProof => "not enough data to build the kernel proof",
            FailureReason::KeyKeeperError => "key keeper reported an error",
        };
        f.write_str(text)
    }
}

/// Completion statuses of a key-keeper invocation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum KeeperStatus {
    Ok,
    InProgress,
    UserAbort,
    Unspecified,
    DeviceLost,
}

impl fmt::Display for KeeperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            KeeperStatus::Ok => "ok",
            KeeperStatus::InProgress => "in progress",
            KeeperStatus::UserAbort => "aborted by the user",
            KeeperStatus::Unspecified => "unspecified failure",
            KeeperStatus::DeviceLost => "device lost",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("missing mandatory parameter: {param}")]
    MissingParameter { param: String },

    #[error("invalid value for parameter {param}: {details}")]
    InvalidParameterValue { param: String, details: String },

    #[error("invalid transaction parameters: {0}")]
    InvalidTransactionParameters(String),

    #[error("cannot send to an expired address")]
    AddressExpired,

    #[error("insufficient funds: requested {requested}, available {available} (asset {asset_id})")]
    InsufficientFunds { requested: u64, available: u64, asset_id: u64 },

    #[error("storage error during {operation}: {details}")]
    StorageError { operation: String, details: String },

    #[error("storage lock timeout: {operation} (waited {timeout_secs}s)")]
    StorageLockTimeout { operation: String, timeout_secs: u64 },

    #[error("RocksDB open error: {details}")]
    RocksDbOpenError { details: String },

    #[error("{format} serialization error: {details}")]
    SerializationError { format: String, details: String },

    #[error("crypto error during {operation}: {details}")]
    CryptoError { operation: String, details: String },

    #[error("invalid group element: {context}")]
    InvalidPoint { context: String },

    #[error("range proof error during {operation}: {details}")]
    RangeProofError { operation: String, details: String },

    #[error("key keeper failed: {status}")]
    KeyKeeper { status: KeeperStatus },

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("transaction not found: {tx_id}")]
    TransactionNotFound { tx_id: String },

    #[error("cannot cancel transaction {tx_id}: already sent to the network")]
    CancelRefused { tx_id: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, WalletError>;

impl WalletError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WalletError::MissingParameter { .. } => ErrorCode::MissingParameter,
            WalletError::InvalidParameterValue { .. } => ErrorCode::InvalidParameterValue,
            WalletError::InvalidTransactionParameters(_) => ErrorCode::InvalidTransactionParameters,
            WalletError::AddressExpired => ErrorCode::AddressExpired,
            WalletError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            WalletError::StorageError { .. } => ErrorCode::StorageError,
            WalletError::StorageLockTimeout { .. } => ErrorCode::StorageLockTimeout,
            WalletError::RocksDbOpenError { .. } => ErrorCode::RocksDbOpenError,
            WalletError::SerializationError { .. } => ErrorCode::SerializationError,
            WalletError::CryptoError { .. } => ErrorCode::CryptoError,
            WalletError::InvalidPoint { .. } => ErrorCode::InvalidPoint,
            WalletError::RangeProofError { .. } => ErrorCode::RangeProofError,
            WalletError::KeyKeeper { .. } => ErrorCode::KeyKeeperError,
            WalletError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            WalletError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
            WalletError::CancelRefused { .. } => ErrorCode::CancelRefused,
            WalletError::ConfigError(_) => ErrorCode::ConfigError,
            WalletError::EncodingError(_) => ErrorCode::EncodingError,
            WalletError::Message(_) => ErrorCode::Message,
        }
    }

    pub fn missing_parameter(param: impl Into<String>) -> Self {
        WalletError::MissingParameter { param: param.into() }
    }

    pub fn invalid_point(context: impl Into<String>) -> Self {
        WalletError::InvalidPoint { context: context.into() }
    }

    pub fn crypto(operation: impl Into<String>, details: impl Into<String>) -> Self {
        WalletError::CryptoError { operation: operation.into(), details: details.into() }
    }

    /// Maps a keeper status to the failure verdict persisted on the record.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            WalletError::KeyKeeper { status: KeeperStatus::UserAbort } => FailureReason::Canceled,
            WalletError::KeyKeeper { .. } => FailureReason::KeyKeeperError,
            WalletError::InsufficientFunds { .. } => FailureReason::NoInputs,
            _ => FailureReason::Unknown,
        }
    }
}

impl From<io::Error> for WalletError {
    fn from(err: io::Error) -> Self {
        WalletError::StorageError { operation: "io".to_string(), details: err.to_string() }
    }
}

impl From<bincode::Error> for WalletError {
    fn from(err: bincode::Error) -> Self {
        WalletError::SerializationError { format: "bincode".to_string(), details: err.to_string() }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::SerializationError { format: "json".to_string(), details: err.to_string() }
    }
}

impl From<hex::FromHexError> for WalletError {
    fn from(err: hex::FromHexError) -> Self {
        WalletError::EncodingError(format!("hex decode error: {}", err))
    }
}

impl From<toml::de::Error> for WalletError {
    fn from(err: toml::de::Error) -> Self {
        WalletError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<rocksdb::Error> for WalletError {
    fn from(err: rocksdb::Error) -> Self {
        WalletError::StorageError { operation: "rocksdb".to_string(), details: err.to_string() }
    }
}

#[macro_export]
macro_rules! storage_err {
    ($op:expr, $err:expr) => {
        $crate::foundation::WalletError::StorageError { operation: $op.into(), details: $err.to_string() }
    };
}

// NOTE: Avoid adding generic "stringly" error conversions here.
// Use structured `WalletError` variants at the call site to preserve context.
