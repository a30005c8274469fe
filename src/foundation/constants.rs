use crate::foundation::types::{Amount, Height, SubTxId};

/// Negotiation protocol version advertised in invitations.
///
/// A peer that advertises any version is assumed to run the "new" flow where
/// the registering side owns kernel confirmation; legacy peers omit the
/// parameter entirely and wait for an explicit registered notification.
pub const PROTO_VERSION: u32 = 4;

/// Default kernel lifetime, in blocks, when the caller does not supply one.
pub const DEFAULT_TX_LIFETIME: Height = 1440;

/// Default fee floor accepted by the receiving side.
pub const DEFAULT_FEE_FLOOR: Amount = 100;

/// Sub-transaction index used by plain transfers.
pub const DEFAULT_SUB_TX_ID: SubTxId = 0;

/// Native asset id. Asset-tagged coins use any other value.
pub const NATIVE_ASSET_ID: u64 = 0;

/// Range proven by output range proofs, in bits.
pub const RANGE_PROOF_BITS: usize = 64;
