use crate::domain::crypto;
use crate::foundation::{Amount, AssetId, Height, KernelId, Result, WalletError};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::traits::Identity;
use serde::{Deserialize, Serialize};

/// Spent coin reference: the commitment being consumed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TxInput {
    pub commitment: [u8; 32],
}

/// Created coin: commitment plus the range proof attesting the value is
/// non-negative and bounded.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TxOutput {
    pub commitment: [u8; 32],
    pub range_proof: Vec<u8>,
    pub asset_id: AssetId,
}

/// The signed, non-confidential part of a transaction.
///
/// `excess` is the aggregated public excess `X`, `nonce` the aggregated
/// Schnorr nonce `R`, `signature` the aggregated scalar `s`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TxKernel {
    pub excess: [u8; 32],
    pub nonce: [u8; 32],
    pub signature: [u8; 32],
    pub fee: Amount,
    pub min_height: Height,
    pub max_height: Height,
    pub asset_id: AssetId,
}

/// Kernel id: `H(X, R, fee, min_height, max_height, asset_id)`.
pub fn kernel_id_from_parts(
    excess: &[u8; 32],
    nonce: &[u8; 32],
    fee: Amount,
    min_height: Height,
    max_height: Height,
    asset_id: AssetId,
) -> KernelId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"veil.kernel-id.v1");
    hasher.update(excess);
    hasher.update(nonce);
    hasher.update(&fee.to_le_bytes());
    hasher.update(&min_height.to_le_bytes());
    hasher.update(&max_height.to_le_bytes());
    hasher.update(&asset_id.to_le_bytes());
    KernelId::new(*hasher.finalize().as_bytes())
}

impl TxKernel {
    pub fn id(&self) -> KernelId {
        kernel_id_from_parts(&self.excess, &self.nonce, self.fee, self.min_height, self.max_height, self.asset_id)
    }

    /// Verifies the aggregated Schnorr signature against the kernel id.
    pub fn verify_signature(&self) -> Result<bool> {
        let excess = crypto::decompress_point(&self.excess, "kernel excess")?;
        let nonce = crypto::decompress_point(&self.nonce, "kernel nonce")?;
        let signature = crypto::scalar_from_bytes(&self.signature, "kernel signature")?;
        let challenge = crypto::kernel_challenge(&self.excess, &self.nonce, &self.id());
        Ok(crypto::verify_signature_part(&signature, &nonce, &excess, &challenge))
    }
}

/// The full on-wire transaction.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Transaction {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub kernel: TxKernel,
    pub offset: [u8; 32],
}

impl Transaction {
    /// Canonical ordering; both sides must emit the same bytes for the same
    /// transaction regardless of who contributed which coin.
    pub fn normalize(&mut self) {
        self.inputs.sort_by(|a, b| a.commitment.cmp(&b.commitment));
        self.outputs.sort_by(|a, b| a.commitment.cmp(&b.commitment));
    }

    /// The validation predicate shared with the node:
    /// range proofs verify, the kernel signature verifies, the height window
    /// is sane and contains `height`, and the commitments balance:
    /// `sum(outputs) - sum(inputs) + fee * H == X + offset * G`.
    pub fn validate(&self, height: Height) -> Result<()> {
        let kernel = &self.kernel;
        if kernel.min_height > kernel.max_height {
            return Err(WalletError::InvalidTransactionParameters(format!(
                "kernel height window is empty: {}..{}",
                kernel.min_height, kernel.max_height
            )));
        }
        if height < kernel.min_height || height > kernel.max_height {
            return Err(WalletError::InvalidTransactionParameters(format!(
                "height {} outside kernel window {}..{}",
                height, kernel.min_height, kernel.max_height
            )));
        }

        for output in &self.outputs {
            if !crypto::verify_range(&output.range_proof, &output.commitment) {
                return Err(WalletError::RangeProofError {
                    operation: "verify".to_string(),
                    details: format!("output {}", hex::encode(output.commitment)),
                });
            }
        }

        if !self.kernel.verify_signature()? {
            return Err(WalletError::crypto("kernel signature", "aggregated signature does not verify"));
        }

        let mut sum_out = RistrettoPoint::identity();
        for output in &self.outputs {
            sum_out += crypto::decompress_point(&output.commitment, "output commitment")?;
        }
        let mut sum_in = RistrettoPoint::identity();
        for input in &self.inputs {
            sum_in += crypto::decompress_point(&input.commitment, "input commitment")?;
        }

        let excess = crypto::decompress_point(&kernel.excess, "kernel excess")?;
        let offset = crypto::scalar_from_bytes(&self.offset, "offset")?;
        let fee_commitment = crypto::SecretScalar::from(kernel.fee) * crypto::value_base();
        let balance = sum_out - sum_in + fee_commitment;
        if balance != excess + offset * crypto::blinding_base() {
            return Err(WalletError::crypto("balance", "commitments do not balance against kernel excess"));
        }
        Ok(())
    }
}
