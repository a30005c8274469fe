//! Receiver-signed payment confirmation.
//!
//! The receiver signs `(kernel_id, amount, sender)` with its SBBS key; the
//! sender keeps the signature as proof the receiver accepted the payment.

use crate::domain::crypto;
use crate::foundation::{Amount, KernelId, Result, WalletId};
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PaymentConfirmation {
    pub nonce: [u8; 32],
    pub signature: [u8; 32],
}

fn challenge(nonce: &[u8; 32], signer: &WalletId, kernel_id: &KernelId, amount: Amount, sender: &WalletId) -> Scalar {
    crypto::hash_to_scalar(
        "veil.payment-confirmation.v1",
        &[nonce, signer.as_bytes(), kernel_id.as_bytes(), &amount.to_le_bytes(), sender.as_bytes()],
    )
}

/// Signs with a deterministic nonce derived from the secret and the message,
/// so re-signing the same confirmation never reuses a nonce under a new
/// challenge.
pub fn sign(secret: &Scalar, kernel_id: &KernelId, amount: Amount, sender: &WalletId) -> PaymentConfirmation {
    let nonce_scalar = crypto::hash_to_scalar(
        "veil.payment-nonce.v1",
        &[&crypto::scalar_bytes(secret), kernel_id.as_bytes(), &amount.to_le_bytes(), sender.as_bytes()],
    );
    let nonce = crypto::point_bytes(&(nonce_scalar * crypto::blinding_base()));
    let signer = WalletId::new(crypto::point_bytes(&(secret * crypto::blinding_base())));
    let c = challenge(&nonce, &signer, kernel_id, amount, sender);
    PaymentConfirmation { nonce, signature: crypto::scalar_bytes(&(nonce_scalar + c * secret)) }
}

/// Verifies against the signer's public identity (the receiver's wallet id).
pub fn verify(
    confirmation: &PaymentConfirmation,
    signer: &WalletId,
    kernel_id: &KernelId,
    amount: Amount,
    sender: &WalletId,
) -> Result<bool> {
    let signer_point = crypto::decompress_point(signer.as_bytes(), "payment proof signer")?;
    let nonce_point = crypto::decompress_point(&confirmation.nonce, "payment proof nonce")?;
    let signature = crypto::scalar_from_bytes(&confirmation.signature, "payment proof signature")?;
    let c = challenge(&confirmation.nonce, signer, kernel_id, amount, sender);
    Ok(crypto::verify_signature_part(&signature, &nonce_point, &signer_point, &c))
}
