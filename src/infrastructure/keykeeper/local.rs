use crate::domain::crypto::{self, SecretScalar};
use crate::domain::model::CoinId;
use crate::domain::payment_proof;
use crate::domain::transaction::{kernel_id_from_parts, TxOutput};
use crate::foundation::{Amount, Height, KeeperStatus, NonceSlot, OwnAddressId, Result, WalletError, WalletId};
use crate::infrastructure::keykeeper::{
    AssetKernelSignature, KernelParameters, KeyKeeper, PaymentProofParameters, ReceiverSignature, SenderSignature,
};
use crate::infrastructure::storage::VariablesStore;
use log::debug;
use rand::RngCore;
use std::sync::{Arc, Mutex};
use zeroize::{Zeroize, ZeroizeOnDrop};

const NONCE_SLOTS_VAR: &str = "keeper/nonce-slots";

const CTX_COIN_KEY: &str = "veil.keeper.coin-key.v1";
const CTX_SBBS: &str = "veil.keeper.sbbs.v1";
const CTX_SLOT_NONCE: &str = "veil.keeper.slot-nonce.v1";
const CTX_RECEIVER_NONCE: &str = "veil.keeper.receiver-nonce.v1";
const CTX_OFFSET: &str = "veil.keeper.offset.v1";
const CTX_ASSET_OWNER: &str = "veil.keeper.asset-owner.v1";
const CTX_ASSET_NONCE: &str = "veil.keeper.asset-nonce.v1";

#[derive(Zeroize, ZeroizeOnDrop)]
struct MasterSeed([u8; 32]);

/// Key keeper over a local master seed.
///
/// Every derived scalar is a pure function of the seed and the canonical
/// encodings of its inputs, so re-running an operation with identical inputs
/// yields identical outputs. The only randomness is nonce-slot allocation;
/// slot seeds persist through the variables store and survive restarts.
pub struct LocalKeyKeeper {
    seed: MasterSeed,
    variables: Arc<dyn VariablesStore>,
    slots: Mutex<Vec<[u8; 32]>>,
}

impl LocalKeyKeeper {
    pub fn new(seed: [u8; 32], variables: Arc<dyn VariablesStore>) -> Result<Self> {
        let slots = match variables.get_var(NONCE_SLOTS_VAR)? {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => Vec::new(),
        };
        debug!("key keeper loaded nonce_slots={}", slots.len());
        Ok(Self { seed: MasterSeed(seed), variables, slots: Mutex::new(slots) })
    }

    fn kdf(&self, context: &str, parts: &[&[u8]]) -> SecretScalar {
        let mut all: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
        all.push(&self.seed.0);
        all.extend_from_slice(parts);
        crypto::kdf_scalar(context, &all)
    }

    fn coin_key(&self, id: &CoinId) -> SecretScalar {
        self.kdf(CTX_COIN_KEY, &[&id.to_kdf_bytes()])
    }

    fn sbbs_secret(&self, own_id: OwnAddressId) -> SecretScalar {
        self.kdf(CTX_SBBS, &[&own_id.to_le_bytes()])
    }

    fn slot_seed(&self, slot: NonceSlot) -> Result<[u8; 32]> {
        let slots = self.lock_slots()?;
        slots
            .get(slot as usize)
            .copied()
            .ok_or(WalletError::KeyKeeper { status: KeeperStatus::Unspecified })
    }

    fn slot_nonce(&self, slot: NonceSlot) -> Result<SecretScalar> {
        let seed = self.slot_seed(slot)?;
        Ok(crypto::kdf_scalar(CTX_SLOT_NONCE, &[&seed]))
    }

    fn lock_slots(&self) -> Result<std::sync::MutexGuard<'_, Vec<[u8; 32]>>> {
        self.slots.lock().map_err(|_| WalletError::StorageError {
            operation: "nonce slots".to_string(),
            details: "lock poisoned".to_string(),
        })
    }

    /// Blinding offset for a record; bound to the record's nonce slot so it is
    /// deterministic per record and never shared between records.
    fn offset(&self, slot: NonceSlot, inputs: &[CoinId], outputs: &[CoinId]) -> Result<SecretScalar> {
        let seed = self.slot_seed(slot)?;
        let mut material = Vec::with_capacity(32 + (inputs.len() + outputs.len()) * 25);
        material.extend_from_slice(&seed);
        for id in inputs.iter().chain(outputs) {
            material.extend_from_slice(&id.to_kdf_bytes());
        }
        Ok(crypto::kdf_scalar(CTX_OFFSET, &[&material]))
    }

    /// `sum(output blindings) - sum(input blindings) - offset`.
    fn excess(&self, inputs: &[CoinId], outputs: &[CoinId], offset: &SecretScalar) -> SecretScalar {
        let mut excess = -*offset;
        for id in outputs {
            excess += self.coin_key(id);
        }
        for id in inputs {
            excess -= self.coin_key(id);
        }
        excess
    }

    fn value_delta(inputs: &[CoinId], outputs: &[CoinId]) -> i128 {
        let incoming: i128 = outputs.iter().map(|c| c.amount as i128).sum();
        let outgoing: i128 = inputs.iter().map(|c| c.amount as i128).sum();
        incoming - outgoing
    }

    fn aggregate(own: &crypto::Point, peer: Option<&[u8; 32]>, context: &str) -> Result<[u8; 32]> {
        match peer {
            Some(bytes) => {
                let peer_point = crypto::decompress_point(bytes, context)?;
                Ok(crypto::point_bytes(&(own + peer_point)))
            }
            None => Ok(crypto::point_bytes(own)),
        }
    }
}

impl KeyKeeper for LocalKeyKeeper {
    fn sbbs_public(&self, own_id: OwnAddressId) -> Result<WalletId> {
        let secret = self.sbbs_secret(own_id);
        Ok(WalletId::new(crypto::point_bytes(&(secret * crypto::blinding_base()))))
    }

    fn derive_sbbs_key(&self, own_id: OwnAddressId) -> Result<SecretScalar> {
        Ok(self.sbbs_secret(own_id))
    }

    fn generate_public_keys(&self, ids: &[CoinId], create_coin_key: bool) -> Result<Vec<[u8; 32]>> {
        ids.iter()
            .map(|id| {
                let blinding = self.coin_key(id);
                let point = if create_coin_key {
                    crypto::commit(id.amount, &blinding)
                } else {
                    blinding * crypto::blinding_base()
                };
                Ok(crypto::point_bytes(&point))
            })
            .collect()
    }

    fn generate_outputs(&self, scheme_height: Height, ids: &[CoinId]) -> Result<Vec<TxOutput>> {
        debug!("generating outputs count={} scheme_height={}", ids.len(), scheme_height);
        ids.iter()
            .map(|id| {
                let blinding = self.coin_key(id);
                let (range_proof, commitment) = crypto::prove_range(id.amount, &blinding)?;
                Ok(TxOutput { commitment, range_proof, asset_id: id.asset_id })
            })
            .collect()
    }

    fn allocate_nonce_slot(&self) -> Result<NonceSlot> {
        let mut slots = self.lock_slots()?;
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        slots.push(seed);
        let encoded = bincode::serialize(&*slots)?;
        self.variables.set_var(NONCE_SLOTS_VAR, &encoded)?;
        let slot = (slots.len() - 1) as NonceSlot;
        debug!("allocated nonce slot={}", slot);
        Ok(slot)
    }

    fn generate_nonce(&self, slot: NonceSlot) -> Result<[u8; 32]> {
        let nonce = self.slot_nonce(slot)?;
        Ok(crypto::point_bytes(&(nonce * crypto::blinding_base())))
    }

    fn sign_sender(
        &self,
        inputs: &[CoinId],
        outputs: &[CoinId],
        nonce_slot: NonceSlot,
        kernel: &KernelParameters,
        initial: bool,
    ) -> Result<SenderSignature> {
        let nonce = self.slot_nonce(nonce_slot)?;
        let offset = self.offset(nonce_slot, inputs, outputs)?;
        let excess = self.excess(inputs, outputs, &offset);

        let public_excess = excess * crypto::blinding_base();
        let public_nonce = nonce * crypto::blinding_base();

        if initial {
            return Ok(SenderSignature {
                public_excess: crypto::point_bytes(&public_excess),
                public_nonce: crypto::point_bytes(&public_nonce),
                offset: crypto::scalar_bytes(&offset),
                partial_signature: None,
                kernel_id: None,
            });
        }

        let peer_excess = kernel
            .peer_public_excess
            .as_ref()
            .ok_or_else(|| WalletError::missing_parameter("PeerPublicExcess"))?;
        let peer_nonce = kernel
            .peer_public_nonce
            .as_ref()
            .ok_or_else(|| WalletError::missing_parameter("PeerPublicNonce"))?;

        let total_excess = Self::aggregate(&public_excess, Some(peer_excess), "peer public excess")?;
        let total_nonce = Self::aggregate(&public_nonce, Some(peer_nonce), "peer public nonce")?;
        let kernel_id =
            kernel_id_from_parts(&total_excess, &total_nonce, kernel.fee, kernel.min_height, kernel.max_height, kernel.asset_id);
        let challenge = crypto::kernel_challenge(&total_excess, &total_nonce, &kernel_id);
        let partial = crypto::partial_signature(&nonce, &excess, &challenge);

        Ok(SenderSignature {
            public_excess: crypto::point_bytes(&public_excess),
            public_nonce: crypto::point_bytes(&public_nonce),
            offset: crypto::scalar_bytes(&offset),
            partial_signature: Some(crypto::scalar_bytes(&partial)),
            kernel_id: Some(kernel_id),
        })
    }

    fn sign_receiver(
        &self,
        inputs: &[CoinId],
        outputs: &[CoinId],
        kernel: &KernelParameters,
        payment: Option<&PaymentProofParameters>,
    ) -> Result<ReceiverSignature> {
        let mut excess = SecretScalar::ZERO;
        for id in outputs {
            excess += self.coin_key(id);
        }
        for id in inputs {
            excess -= self.coin_key(id);
        }

        let mut nonce_material = kernel.to_kdf_bytes();
        for id in inputs.iter().chain(outputs) {
            nonce_material.extend_from_slice(&id.to_kdf_bytes());
        }
        let nonce = self.kdf(CTX_RECEIVER_NONCE, &[&nonce_material]);

        let public_excess = excess * crypto::blinding_base();
        let public_nonce = nonce * crypto::blinding_base();
        let total_excess = Self::aggregate(&public_excess, kernel.peer_public_excess.as_ref(), "peer public excess")?;
        let total_nonce = Self::aggregate(&public_nonce, kernel.peer_public_nonce.as_ref(), "peer public nonce")?;

        let kernel_id =
            kernel_id_from_parts(&total_excess, &total_nonce, kernel.fee, kernel.min_height, kernel.max_height, kernel.asset_id);
        let challenge = crypto::kernel_challenge(&total_excess, &total_nonce, &kernel_id);
        let partial = crypto::partial_signature(&nonce, &excess, &challenge);

        let payment_proof = match payment {
            Some(params) => {
                let value = Self::value_delta(inputs, outputs);
                if value <= 0 {
                    return Err(WalletError::InvalidTransactionParameters(
                        "receiver value must be positive for a payment confirmation".to_string(),
                    ));
                }
                let secret = self.sbbs_secret(params.wallet_id_key);
                Some(payment_proof::sign(&secret, &kernel_id, value as Amount, &params.sender))
            }
            None => None,
        };

        Ok(ReceiverSignature {
            public_excess: crypto::point_bytes(&public_excess),
            public_nonce: crypto::point_bytes(&public_nonce),
            partial_signature: crypto::scalar_bytes(&partial),
            kernel_id,
            payment_proof,
        })
    }

    fn sign_asset_kernel(
        &self,
        inputs: &[CoinId],
        outputs: &[CoinId],
        fee: Amount,
        owner_idx: u64,
        min_height: Height,
        max_height: Height,
    ) -> Result<AssetKernelSignature> {
        let owner_secret = self.kdf(CTX_ASSET_OWNER, &[&owner_idx.to_le_bytes()]);
        let owner_point = owner_secret * crypto::blinding_base();
        let owner_bytes = crypto::point_bytes(&owner_point);

        let nonce = self.kdf(
            CTX_ASSET_NONCE,
            &[&owner_idx.to_le_bytes(), &fee.to_le_bytes(), &min_height.to_le_bytes(), &max_height.to_le_bytes()],
        );
        let nonce_bytes = crypto::point_bytes(&(nonce * crypto::blinding_base()));

        let kernel_id = kernel_id_from_parts(&owner_bytes, &nonce_bytes, fee, min_height, max_height, owner_idx);
        let challenge = crypto::kernel_challenge(&owner_bytes, &nonce_bytes, &kernel_id);
        let signature = crypto::partial_signature(&nonce, &owner_secret, &challenge);

        let mut offset = SecretScalar::ZERO;
        for id in outputs {
            offset += self.coin_key(id);
        }
        for id in inputs {
            offset -= self.coin_key(id);
        }

        Ok(AssetKernelSignature {
            owner_id: WalletId::new(owner_bytes),
            public_nonce: nonce_bytes,
            signature: crypto::scalar_bytes(&signature),
            offset: crypto::scalar_bytes(&offset),
        })
    }
}

// Keep the seed out of Debug output.
impl std::fmt::Debug for LocalKeyKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeyKeeper").finish_non_exhaustive()
    }
}
