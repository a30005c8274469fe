//! Transaction builder: assembles inputs, outputs, kernel and the aggregated
//! signature for one negotiation record.
//!
//! Every operation is idempotent and re-entrant: it re-checks the parameter
//! store before computing, so the driver can be re-invoked any number of
//! times after suspensions. Keeper-backed steps return `BuildStep::Pending`
//! when the executor queued the request; the completion writes the artefacts
//! back into the store and the next invocation finds them present.

use crate::domain::coin_select::select_coins;
use crate::domain::crypto;
use crate::domain::model::{Coin, CoinId, CoinKeyType, CoinStatus};
use crate::domain::params::TxParameterID;
use crate::domain::transaction::{kernel_id_from_parts, Transaction, TxInput, TxKernel, TxOutput};
use crate::foundation::{
    Amount, AssetId, Height, KernelId, NonceSlot, Result, SubTxId, TxId, WalletError, NATIVE_ASSET_ID,
};
use crate::infrastructure::keykeeper::{
    KeeperExecutor, KeeperRequest, KeeperResponse, KernelParameters, PaymentProofParameters, ReceiverSignature,
    SenderSignature, SubmitOutcome,
};
use crate::infrastructure::storage::{CoinStore, ParameterStoreExt, WalletStorage};
use log::{debug, info};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildStep {
    Ready,
    Pending,
}

pub struct BaseTxBuilder {
    tx_id: TxId,
    sub_tx: SubTxId,
    amount_list: Vec<Amount>,
    fee: Amount,
    asset_id: AssetId,
    store: Arc<dyn WalletStorage>,
    executor: Arc<dyn KeeperExecutor>,
}

impl BaseTxBuilder {
    pub fn new(
        store: Arc<dyn WalletStorage>,
        executor: Arc<dyn KeeperExecutor>,
        tx_id: TxId,
        sub_tx: SubTxId,
        amount_list: Vec<Amount>,
        fee: Amount,
        asset_id: AssetId,
    ) -> Self {
        Self { tx_id, sub_tx, amount_list, fee, asset_id, store, executor }
    }

    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    pub fn amount_total(&self) -> Amount {
        self.amount_list.iter().sum()
    }

    pub fn amount_list(&self) -> &[Amount] {
        &self.amount_list
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    pub fn asset_id(&self) -> AssetId {
        self.asset_id
    }

    fn get<T: serde::de::DeserializeOwned>(&self, id: TxParameterID) -> Result<Option<T>> {
        self.store.get_param(&self.tx_id, id, self.sub_tx)
    }

    fn get_mandatory<T: serde::de::DeserializeOwned>(&self, id: TxParameterID) -> Result<T> {
        self.store.get_mandatory(&self.tx_id, id, self.sub_tx)
    }

    fn set<T: serde::Serialize>(&self, id: TxParameterID, value: &T) -> Result<()> {
        self.store.set_param(&self.tx_id, id, value, self.sub_tx)
    }

    fn has(&self, id: TxParameterID) -> Result<bool> {
        self.store.has_param(&self.tx_id, id, self.sub_tx)
    }

    pub fn min_height(&self) -> Result<Height> {
        self.get_mandatory(TxParameterID::MinHeight)
    }

    pub fn lifetime(&self) -> Result<Height> {
        self.get_mandatory(TxParameterID::Lifetime)
    }

    /// Maximum height this side would propose: either the fixed one, or
    /// `min_height + lifetime` while negotiation is still open.
    pub fn max_height_proposal(&self) -> Result<Height> {
        if let Some(fixed) = self.get::<Height>(TxParameterID::MaxHeight)? {
            return Ok(fixed);
        }
        Ok(self.min_height()?.saturating_add(self.lifetime()?))
    }

    /// True once the input/output coin sets have been decided.
    pub fn get_initial_tx_params(&self) -> Result<bool> {
        Ok(self.has(TxParameterID::InputCoins)? || self.has(TxParameterID::OutputCoins)?)
    }

    pub fn input_coin_ids(&self) -> Result<Vec<CoinId>> {
        Ok(self.get(TxParameterID::InputCoins)?.unwrap_or_default())
    }

    pub fn output_coin_ids(&self) -> Result<Vec<CoinId>> {
        Ok(self.get(TxParameterID::OutputCoins)?.unwrap_or_default())
    }

    /// Selects inputs covering the target and reserves them. For asset
    /// transfers the fee is still paid in the native asset, so two
    /// selections run: asset coins for the amounts, native coins for the fee.
    pub fn select_inputs(&self, tip: Height) -> Result<()> {
        if self.has(TxParameterID::InputCoins)? {
            return Ok(());
        }

        let mut selected: Vec<Coin> = Vec::new();
        if self.asset_id == NATIVE_ASSET_ID {
            let candidates = self.store.coins_by_asset(NATIVE_ASSET_ID)?;
            let target = self.amount_total().saturating_add(self.fee);
            selected.extend(select_coins(&candidates, target, NATIVE_ASSET_ID, tip)?.coins);
        } else {
            let asset_candidates = self.store.coins_by_asset(self.asset_id)?;
            selected.extend(select_coins(&asset_candidates, self.amount_total(), self.asset_id, tip)?.coins);
            let native_candidates = self.store.coins_by_asset(NATIVE_ASSET_ID)?;
            selected.extend(select_coins(&native_candidates, self.fee, NATIVE_ASSET_ID, tip)?.coins);
        }

        let ids: Vec<CoinId> = selected.iter().map(|c| c.id).collect();
        for coin in &mut selected {
            coin.status = CoinStatus::Outgoing;
            coin.spend_tx = Some(self.tx_id);
        }
        // Reservation and the record of it go together.
        self.store.update_coins(&selected)?;
        self.set(TxParameterID::InputCoins, &ids)?;
        info!("txo {} selected inputs count={} total={}", self.tx_id, ids.len(), ids.iter().map(|c| c.amount).sum::<u64>());
        Ok(())
    }

    /// Synthesizes change coins for whatever the inputs overshoot.
    pub fn add_change(&self) -> Result<()> {
        if self.has(TxParameterID::Change)? {
            return Ok(());
        }
        let inputs = self.input_coin_ids()?;

        let mut change: Vec<(AssetId, Amount)> = Vec::new();
        let native_in: Amount = inputs.iter().filter(|c| c.asset_id == NATIVE_ASSET_ID).map(|c| c.amount).sum();
        if self.asset_id == NATIVE_ASSET_ID {
            let spent = self.amount_total().saturating_add(self.fee);
            if native_in > spent {
                change.push((NATIVE_ASSET_ID, native_in - spent));
            }
        } else {
            if native_in > self.fee {
                change.push((NATIVE_ASSET_ID, native_in - self.fee));
            }
            let asset_in: Amount = inputs.iter().filter(|c| c.asset_id == self.asset_id).map(|c| c.amount).sum();
            if asset_in > self.amount_total() {
                change.push((self.asset_id, asset_in - self.amount_total()));
            }
        }

        let mut outputs = self.output_coin_ids()?;
        for (asset_id, amount) in &change {
            let idx = self.store.next_coin_idx()?;
            let id = CoinId::new(idx, *amount, *asset_id, CoinKeyType::Change);
            let mut coin = Coin::available(id, 0);
            coin.status = CoinStatus::Incoming;
            coin.create_tx = Some(self.tx_id);
            self.store.store_coins(&[coin])?;
            outputs.push(id);
            debug!("txo {} change coin idx={} amount={} asset_id={}", self.tx_id, idx, amount, asset_id);
        }
        self.set(TxParameterID::OutputCoins, &outputs)?;
        self.set(TxParameterID::Change, &change)?;
        Ok(())
    }

    /// Creates the coins the receiving side keeps, one per amount. A self
    /// transaction shares `OutputCoins` with its change, so the guard is the
    /// presence of non-change coins rather than of the list itself.
    pub fn generate_receiver_coins(&self) -> Result<()> {
        let mut outputs = self.output_coin_ids()?;
        if outputs.iter().any(|c| c.key_type == CoinKeyType::Regular) {
            return Ok(());
        }
        for amount in &self.amount_list {
            let idx = self.store.next_coin_idx()?;
            let id = CoinId::new(idx, *amount, self.asset_id, CoinKeyType::Regular);
            let mut coin = Coin::available(id, 0);
            coin.status = CoinStatus::Incoming;
            coin.create_tx = Some(self.tx_id);
            self.store.store_coins(&[coin])?;
            outputs.push(id);
        }
        self.set(TxParameterID::OutputCoins, &outputs)?;
        debug!("txo {} receiver coins count={}", self.tx_id, outputs.len());
        Ok(())
    }

    fn submit(&self, request: KeeperRequest) -> Result<BuildStep> {
        match self.executor.submit(self.tx_id, request)? {
            SubmitOutcome::Completed(response) => {
                self.apply_response(response)?;
                Ok(BuildStep::Ready)
            }
            SubmitOutcome::Queued => Ok(BuildStep::Pending),
        }
    }

    /// Writes keeper artefacts into the store; shared by the inline path and
    /// the reactor's completion dispatch.
    pub fn apply_response(&self, response: KeeperResponse) -> Result<()> {
        match response {
            KeeperResponse::NonceSlot(slot) => self.set(TxParameterID::NonceSlot, &slot),
            KeeperResponse::PublicKeys(points) => {
                let inputs: Vec<TxInput> = points.into_iter().map(|commitment| TxInput { commitment }).collect();
                self.set(TxParameterID::Inputs, &inputs)
            }
            KeeperResponse::Outputs(outputs) => self.set(TxParameterID::Outputs, &outputs),
            KeeperResponse::SenderSigned(signature) => self.apply_sender_signature(signature),
            KeeperResponse::ReceiverSigned(signature) => self.apply_receiver_signature(signature),
        }
    }

    fn apply_sender_signature(&self, signature: SenderSignature) -> Result<()> {
        self.set(TxParameterID::PublicExcess, &signature.public_excess)?;
        self.set(TxParameterID::PublicNonce, &signature.public_nonce)?;
        self.set(TxParameterID::Offset, &signature.offset)?;
        if let Some(partial) = signature.partial_signature {
            self.set(TxParameterID::PartialSignature, &partial)?;
        }
        if let Some(kernel_id) = signature.kernel_id {
            if let Some(stored) = self.get::<KernelId>(TxParameterID::KernelId)? {
                if stored != kernel_id {
                    return Err(WalletError::crypto("kernel id", "keeper and builder disagree on the kernel id"));
                }
            }
            self.set(TxParameterID::KernelId, &kernel_id)?;
        }
        Ok(())
    }

    fn apply_receiver_signature(&self, signature: ReceiverSignature) -> Result<()> {
        self.set(TxParameterID::PublicExcess, &signature.public_excess)?;
        self.set(TxParameterID::PublicNonce, &signature.public_nonce)?;
        self.set(TxParameterID::PartialSignature, &signature.partial_signature)?;
        self.set(TxParameterID::KernelId, &signature.kernel_id)?;
        if let Some(proof) = signature.payment_proof {
            self.set(TxParameterID::PaymentConfirmation, &proof)?;
        }
        Ok(())
    }

    /// Reserves a nonce slot for the record.
    pub fn generate_nonce(&self) -> Result<BuildStep> {
        if self.has(TxParameterID::NonceSlot)? {
            return Ok(BuildStep::Ready);
        }
        self.submit(KeeperRequest::AllocateNonceSlot)
    }

    /// Materialises input commitments.
    pub fn create_inputs(&self) -> Result<BuildStep> {
        if self.has(TxParameterID::Inputs)? {
            return Ok(BuildStep::Ready);
        }
        let ids = self.input_coin_ids()?;
        if ids.is_empty() {
            self.set(TxParameterID::Inputs, &Vec::<TxInput>::new())?;
            return Ok(BuildStep::Ready);
        }
        self.submit(KeeperRequest::GeneratePublicKeys { ids, create_coin_key: true })
    }

    /// Materialises output commitments and range proofs.
    pub fn create_outputs(&self) -> Result<BuildStep> {
        if self.has(TxParameterID::Outputs)? {
            return Ok(BuildStep::Ready);
        }
        let ids = self.output_coin_ids()?;
        if ids.is_empty() {
            self.set(TxParameterID::Outputs, &Vec::<TxOutput>::new())?;
            return Ok(BuildStep::Ready);
        }
        let scheme_height = self.min_height()?;
        self.submit(KeeperRequest::GenerateOutputs { scheme_height, ids })
    }

    pub fn has_peer_public_excess_and_nonce(&self) -> Result<bool> {
        Ok(self.has(TxParameterID::PeerPublicExcess)? && self.has(TxParameterID::PeerPublicNonce)?)
    }

    pub fn has_peer_signature(&self) -> Result<bool> {
        self.has(TxParameterID::PeerSignature)
    }

    fn kernel_parameters(&self, with_peer: bool) -> Result<KernelParameters> {
        Ok(KernelParameters {
            fee: self.fee,
            min_height: self.min_height()?,
            max_height: self.max_height_proposal()?,
            asset_id: self.asset_id,
            peer_public_excess: if with_peer { self.get(TxParameterID::PeerPublicExcess)? } else { None },
            peer_public_nonce: if with_peer { self.get(TxParameterID::PeerPublicNonce)? } else { None },
        })
    }

    pub fn sign_sender(&self, initial: bool) -> Result<BuildStep> {
        let done = if initial {
            self.has(TxParameterID::PublicExcess)? && self.has(TxParameterID::Offset)?
        } else {
            self.has(TxParameterID::PartialSignature)?
        };
        if done {
            return Ok(BuildStep::Ready);
        }
        let nonce_slot: NonceSlot = self.get_mandatory(TxParameterID::NonceSlot)?;
        let kernel = self.kernel_parameters(!initial)?;
        self.submit(KeeperRequest::SignSender {
            inputs: self.input_coin_ids()?,
            outputs: self.output_coin_ids()?,
            nonce_slot,
            kernel,
            initial,
        })
    }

    pub fn sign_receiver(&self, payment: Option<PaymentProofParameters>) -> Result<BuildStep> {
        if self.has(TxParameterID::PartialSignature)? {
            return Ok(BuildStep::Ready);
        }
        let kernel = self.kernel_parameters(true)?;
        self.submit(KeeperRequest::SignReceiver {
            inputs: self.input_coin_ids()?,
            outputs: self.output_coin_ids()?,
            kernel,
            payment,
        })
    }

    /// Fixes the kernel maximum height:
    /// `min(own proposal, peer proposal, min_height + lifetime)`.
    /// Fails (returns `false`) when the result is already below the tip.
    pub fn update_max_height(&self, tip: Height) -> Result<bool> {
        if self.has(TxParameterID::MaxHeight)? {
            return Ok(true);
        }
        let mut max_height = self.min_height()?.saturating_add(self.lifetime()?);
        if let Some(peer_max) = self.get::<Height>(TxParameterID::PeerMaxHeight)? {
            max_height = max_height.min(peer_max);
        }
        if max_height < tip {
            return Ok(false);
        }
        self.set(TxParameterID::MaxHeight, &max_height)?;
        Ok(true)
    }

    /// Fixes the kernel id once both halves of the aggregates are known.
    /// A receiver gets the id from its signature instead; this is then a
    /// no-op.
    pub fn create_kernel(&self) -> Result<()> {
        if self.has(TxParameterID::KernelId)? {
            return Ok(());
        }
        let Some(own_excess) = self.get::<[u8; 32]>(TxParameterID::PublicExcess)? else {
            return Ok(());
        };
        let Some(own_nonce) = self.get::<[u8; 32]>(TxParameterID::PublicNonce)? else {
            return Ok(());
        };
        let Some((total_excess, total_nonce)) = self.aggregate_points(&own_excess, &own_nonce)? else {
            return Ok(());
        };
        let kernel_id = kernel_id_from_parts(
            &total_excess,
            &total_nonce,
            self.fee,
            self.min_height()?,
            self.get_mandatory::<Height>(TxParameterID::MaxHeight)?,
            self.asset_id,
        );
        self.set(TxParameterID::KernelId, &kernel_id)?;
        debug!("txo {} kernel id fixed kernel_id={}", self.tx_id, kernel_id);
        Ok(())
    }

    fn aggregate_points(&self, own_excess: &[u8; 32], own_nonce: &[u8; 32]) -> Result<Option<([u8; 32], [u8; 32])>> {
        let peer_excess = self.get::<[u8; 32]>(TxParameterID::PeerPublicExcess)?;
        let peer_nonce = self.get::<[u8; 32]>(TxParameterID::PeerPublicNonce)?;
        match (peer_excess, peer_nonce) {
            (Some(peer_excess), Some(peer_nonce)) => {
                let excess = crypto::decompress_point(own_excess, "own public excess")?
                    + crypto::decompress_point(&peer_excess, "peer public excess")?;
                let nonce = crypto::decompress_point(own_nonce, "own public nonce")?
                    + crypto::decompress_point(&peer_nonce, "peer public nonce")?;
                Ok(Some((crypto::point_bytes(&excess), crypto::point_bytes(&nonce))))
            }
            (None, None) => Ok(Some((*own_excess, *own_nonce))),
            _ => Ok(None),
        }
    }

    pub fn has_kernel_id(&self) -> Result<bool> {
        self.has(TxParameterID::KernelId)
    }

    pub fn kernel_id(&self) -> Result<KernelId> {
        self.get_mandatory(TxParameterID::KernelId)
    }

    /// Verifies the peer's partial signature:
    /// `s_peer * G == R_peer + c * X_peer` with `c = H(X, R, kernel_id)`.
    pub fn is_peer_signature_valid(&self) -> Result<bool> {
        let peer_signature: [u8; 32] = self.get_mandatory(TxParameterID::PeerSignature)?;
        let peer_excess: [u8; 32] = self.get_mandatory(TxParameterID::PeerPublicExcess)?;
        let peer_nonce: [u8; 32] = self.get_mandatory(TxParameterID::PeerPublicNonce)?;
        let own_excess: [u8; 32] = self.get_mandatory(TxParameterID::PublicExcess)?;
        let own_nonce: [u8; 32] = self.get_mandatory(TxParameterID::PublicNonce)?;
        let kernel_id = self.kernel_id()?;

        let Some((total_excess, total_nonce)) = self.aggregate_points(&own_excess, &own_nonce)? else {
            return Ok(false);
        };
        let challenge = crypto::kernel_challenge(&total_excess, &total_nonce, &kernel_id);
        let signature = match crypto::scalar_from_bytes(&peer_signature, "peer signature") {
            Ok(signature) => signature,
            Err(_) => return Ok(false),
        };
        Ok(crypto::verify_signature_part(
            &signature,
            &crypto::decompress_point(&peer_nonce, "peer public nonce")?,
            &crypto::decompress_point(&peer_excess, "peer public excess")?,
            &challenge,
        ))
    }

    /// Sets the final `s = s_me + s_peer` and persists the finished kernel.
    pub fn finalize_signature(&self) -> Result<()> {
        if self.has(TxParameterID::Kernel)? {
            return Ok(());
        }
        let own_partial: [u8; 32] = self.get_mandatory(TxParameterID::PartialSignature)?;
        let mut signature = crypto::scalar_from_bytes(&own_partial, "own partial signature")?;
        if let Some(peer_partial) = self.get::<[u8; 32]>(TxParameterID::PeerSignature)? {
            signature += crypto::scalar_from_bytes(&peer_partial, "peer partial signature")?;
        }

        let own_excess: [u8; 32] = self.get_mandatory(TxParameterID::PublicExcess)?;
        let own_nonce: [u8; 32] = self.get_mandatory(TxParameterID::PublicNonce)?;
        let Some((total_excess, total_nonce)) = self.aggregate_points(&own_excess, &own_nonce)? else {
            return Err(WalletError::missing_parameter("PeerPublicNonce"));
        };

        let kernel = TxKernel {
            excess: total_excess,
            nonce: total_nonce,
            signature: crypto::scalar_bytes(&signature),
            fee: self.fee,
            min_height: self.min_height()?,
            max_height: self.get_mandatory(TxParameterID::MaxHeight)?,
            asset_id: self.asset_id,
        };
        if !kernel.verify_signature()? {
            return Err(WalletError::crypto("finalize", "aggregated signature does not verify"));
        }
        self.set(TxParameterID::Kernel, &kernel)?;
        info!("txo {} signature finalized kernel_id={}", self.tx_id, kernel.id());
        Ok(())
    }

    pub fn load_kernel(&self) -> Result<Option<TxKernel>> {
        self.get(TxParameterID::Kernel)
    }

    /// Emits the full on-wire transaction.
    pub fn create_transaction(&self) -> Result<Transaction> {
        let kernel: TxKernel = self.get_mandatory(TxParameterID::Kernel)?;

        let mut inputs: Vec<TxInput> = self.get(TxParameterID::Inputs)?.unwrap_or_default();
        inputs.extend(self.get::<Vec<TxInput>>(TxParameterID::PeerInputs)?.unwrap_or_default());
        let mut outputs: Vec<TxOutput> = self.get(TxParameterID::Outputs)?.unwrap_or_default();
        outputs.extend(self.get::<Vec<TxOutput>>(TxParameterID::PeerOutputs)?.unwrap_or_default());

        let mut offset = crypto::SecretScalar::ZERO;
        if let Some(own) = self.get::<[u8; 32]>(TxParameterID::Offset)? {
            offset += crypto::scalar_from_bytes(&own, "own offset")?;
        }
        if let Some(peer) = self.get::<[u8; 32]>(TxParameterID::PeerOffset)? {
            offset += crypto::scalar_from_bytes(&peer, "peer offset")?;
        }

        let mut transaction = Transaction { inputs, outputs, kernel, offset: crypto::scalar_bytes(&offset) };
        transaction.normalize();
        Ok(transaction)
    }
}
