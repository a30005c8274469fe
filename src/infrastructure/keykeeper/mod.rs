//! Key keeper: the capability surface holding all secret material.
//!
//! The wallet never sees blinding factors or nonces; it hands the keeper coin
//! ids and kernel parameters and receives public points and partial
//! signatures. Every operation exists in a synchronous shape (the trait) and
//! an asynchronous shape (`ThreadedKeyKeeper` + `KeeperExecutor`), each
//! derivable from the other.

mod local;
mod threaded;

pub use local::LocalKeyKeeper;
pub use threaded::{KeeperCompletion, ThreadedKeyKeeper, WakeEvent};

use crate::domain::model::CoinId;
use crate::domain::payment_proof::PaymentConfirmation;
use crate::domain::transaction::TxOutput;
use crate::foundation::{Amount, AssetId, Height, KernelId, NonceSlot, OwnAddressId, Result, TxId, WalletId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kernel fields a signature binds to, plus the peer half of the aggregates
/// once it is known.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct KernelParameters {
    pub fee: Amount,
    pub min_height: Height,
    pub max_height: Height,
    pub asset_id: AssetId,
    pub peer_public_excess: Option<[u8; 32]>,
    pub peer_public_nonce: Option<[u8; 32]>,
}

impl KernelParameters {
    /// Canonical bytes fed to deterministic nonce derivation.
    pub fn to_kdf_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 * 4 + 64);
        out.extend_from_slice(&self.fee.to_le_bytes());
        out.extend_from_slice(&self.min_height.to_le_bytes());
        out.extend_from_slice(&self.max_height.to_le_bytes());
        out.extend_from_slice(&self.asset_id.to_le_bytes());
        out.extend_from_slice(self.peer_public_excess.as_ref().map(|b| &b[..]).unwrap_or(&[]));
        out.extend_from_slice(self.peer_public_nonce.as_ref().map(|b| &b[..]).unwrap_or(&[]));
        out
    }
}

/// Receiver-side inputs for the payment confirmation.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PaymentProofParameters {
    pub wallet_id_key: OwnAddressId,
    pub sender: WalletId,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SenderSignature {
    pub public_excess: [u8; 32],
    pub public_nonce: [u8; 32],
    pub offset: [u8; 32],
    /// Present only on the final round (`initial = false`).
    pub partial_signature: Option<[u8; 32]>,
    pub kernel_id: Option<KernelId>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReceiverSignature {
    pub public_excess: [u8; 32],
    pub public_nonce: [u8; 32],
    pub partial_signature: [u8; 32],
    pub kernel_id: KernelId,
    pub payment_proof: Option<PaymentConfirmation>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AssetKernelSignature {
    pub owner_id: WalletId,
    pub public_nonce: [u8; 32],
    pub signature: [u8; 32],
    pub offset: [u8; 32],
}

pub trait KeyKeeper: Send + Sync {
    /// Public identity of an owned address key.
    fn sbbs_public(&self, own_id: OwnAddressId) -> Result<WalletId>;

    /// Secret SBBS scalar for in-process trusted callers.
    fn derive_sbbs_key(&self, own_id: OwnAddressId) -> Result<crate::domain::crypto::SecretScalar>;

    /// Public points for coin ids: commitments when `create_coin_key`, bare
    /// blinding keys otherwise.
    fn generate_public_keys(&self, ids: &[CoinId], create_coin_key: bool) -> Result<Vec<[u8; 32]>>;

    /// Materialises outputs (commitment + range proof) for the given coins.
    fn generate_outputs(&self, scheme_height: Height, ids: &[CoinId]) -> Result<Vec<TxOutput>>;

    /// Reserves a fresh persisted nonce slot.
    fn allocate_nonce_slot(&self) -> Result<NonceSlot>;

    /// Public nonce of a slot. The slot's secret survives restarts.
    fn generate_nonce(&self, slot: NonceSlot) -> Result<[u8; 32]>;

    fn sign_sender(
        &self,
        inputs: &[CoinId],
        outputs: &[CoinId],
        nonce_slot: NonceSlot,
        kernel: &KernelParameters,
        initial: bool,
    ) -> Result<SenderSignature>;

    fn sign_receiver(
        &self,
        inputs: &[CoinId],
        outputs: &[CoinId],
        kernel: &KernelParameters,
        payment: Option<&PaymentProofParameters>,
    ) -> Result<ReceiverSignature>;

    /// Signs an asset-control kernel with the asset owner key.
    fn sign_asset_kernel(
        &self,
        inputs: &[CoinId],
        outputs: &[CoinId],
        fee: Amount,
        owner_idx: u64,
        min_height: Height,
        max_height: Height,
    ) -> Result<AssetKernelSignature>;
}

/// One queued keeper invocation, tagged by the record it belongs to.
#[derive(Clone, Debug)]
pub enum KeeperRequest {
    GeneratePublicKeys { ids: Vec<CoinId>, create_coin_key: bool },
    GenerateOutputs { scheme_height: Height, ids: Vec<CoinId> },
    AllocateNonceSlot,
    SignSender { inputs: Vec<CoinId>, outputs: Vec<CoinId>, nonce_slot: NonceSlot, kernel: KernelParameters, initial: bool },
    SignReceiver { inputs: Vec<CoinId>, outputs: Vec<CoinId>, kernel: KernelParameters, payment: Option<PaymentProofParameters> },
}

#[derive(Clone, Debug)]
pub enum KeeperResponse {
    PublicKeys(Vec<[u8; 32]>),
    Outputs(Vec<TxOutput>),
    NonceSlot(NonceSlot),
    SenderSigned(SenderSignature),
    ReceiverSigned(ReceiverSignature),
}

/// Executes a request against the synchronous surface.
pub fn execute(keeper: &dyn KeyKeeper, request: KeeperRequest) -> Result<KeeperResponse> {
    match request {
        KeeperRequest::GeneratePublicKeys { ids, create_coin_key } => {
            Ok(KeeperResponse::PublicKeys(keeper.generate_public_keys(&ids, create_coin_key)?))
        }
        KeeperRequest::GenerateOutputs { scheme_height, ids } => {
            Ok(KeeperResponse::Outputs(keeper.generate_outputs(scheme_height, &ids)?))
        }
        KeeperRequest::AllocateNonceSlot => Ok(KeeperResponse::NonceSlot(keeper.allocate_nonce_slot()?)),
        KeeperRequest::SignSender { inputs, outputs, nonce_slot, kernel, initial } => {
            Ok(KeeperResponse::SenderSigned(keeper.sign_sender(&inputs, &outputs, nonce_slot, &kernel, initial)?))
        }
        KeeperRequest::SignReceiver { inputs, outputs, kernel, payment } => {
            Ok(KeeperResponse::ReceiverSigned(keeper.sign_receiver(&inputs, &outputs, &kernel, payment.as_ref())?))
        }
    }
}

/// Outcome of handing a request to an executor.
pub enum SubmitOutcome {
    Completed(KeeperResponse),
    Queued,
}

/// Uniform submission surface for the builder: a local keeper completes
/// inline, a threaded keeper queues and completes through the reactor.
pub trait KeeperExecutor: Send + Sync {
    fn submit(&self, tx_id: TxId, request: KeeperRequest) -> Result<SubmitOutcome>;
}

/// Inline executor over a synchronous keeper.
pub struct SyncKeeperExecutor {
    keeper: Arc<dyn KeyKeeper>,
}

impl SyncKeeperExecutor {
    pub fn new(keeper: Arc<dyn KeyKeeper>) -> Self {
        Self { keeper }
    }
}

impl KeeperExecutor for SyncKeeperExecutor {
    fn submit(&self, _tx_id: TxId, request: KeeperRequest) -> Result<SubmitOutcome> {
        Ok(SubmitOutcome::Completed(execute(self.keeper.as_ref(), request)?))
    }
}
