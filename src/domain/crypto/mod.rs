//! Group arithmetic, Pedersen commitments, split-Schnorr helpers and range
//! proofs over Ristretto.
//!
//! Conventions: `G` is the Pedersen blinding base (all public excesses,
//! nonces and signatures live on it), `H` is the value base. A commitment is
//! `value * H + blinding * G`.

use crate::foundation::{Amount, KernelId, Result, WalletError, RANGE_PROOF_BITS};
use bulletproofs::{BulletproofGens, PedersenGens, RangeProof};
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use merlin::Transcript;
use once_cell::sync::Lazy;

pub use curve25519_dalek::ristretto::RistrettoPoint as Point;
pub use curve25519_dalek::scalar::Scalar as SecretScalar;

const RANGE_PROOF_LABEL: &[u8] = b"veil.range-proof.v1";

static PC_GENS: Lazy<PedersenGens> = Lazy::new(PedersenGens::default);
static BP_GENS: Lazy<BulletproofGens> = Lazy::new(|| BulletproofGens::new(RANGE_PROOF_BITS, 1));

pub fn pedersen_gens() -> &'static PedersenGens {
    &PC_GENS
}

/// Base of blinding factors and all Schnorr material.
pub fn blinding_base() -> RistrettoPoint {
    PC_GENS.B_blinding
}

/// Base of committed values.
pub fn value_base() -> RistrettoPoint {
    PC_GENS.B
}

/// Pedersen commitment `value * H + blinding * G`.
pub fn commit(value: Amount, blinding: &Scalar) -> RistrettoPoint {
    PC_GENS.commit(Scalar::from(value), *blinding)
}

pub fn point_bytes(point: &RistrettoPoint) -> [u8; 32] {
    point.compress().to_bytes()
}

pub fn decompress_point(bytes: &[u8; 32], context: &str) -> Result<RistrettoPoint> {
    CompressedRistretto::from_slice(bytes)
        .map_err(|_| WalletError::invalid_point(context))?
        .decompress()
        .ok_or_else(|| WalletError::invalid_point(context))
}

pub fn scalar_bytes(scalar: &Scalar) -> [u8; 32] {
    scalar.to_bytes()
}

pub fn scalar_from_bytes(bytes: &[u8; 32], context: &str) -> Result<Scalar> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(*bytes))
        .ok_or_else(|| WalletError::crypto("scalar decode", context))
}

/// Domain-separated hash to a scalar. Each part is length-prefixed so
/// concatenation ambiguity cannot produce colliding digests.
pub fn hash_to_scalar(domain: &str, parts: &[&[u8]]) -> Scalar {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    Scalar::from_bytes_mod_order(*hasher.finalize().as_bytes())
}

/// KDF over the keeper's master material.
pub fn kdf_scalar(context: &str, parts: &[&[u8]]) -> Scalar {
    let mut material = Vec::new();
    for part in parts {
        material.extend_from_slice(&(part.len() as u64).to_le_bytes());
        material.extend_from_slice(part);
    }
    Scalar::from_bytes_mod_order(blake3::derive_key(context, &material))
}

/// Challenge binding the aggregated commitment, the aggregated nonce and the
/// kernel id: `c = H(X, R, kernel_id)`.
pub fn kernel_challenge(public_excess: &[u8; 32], public_nonce: &[u8; 32], kernel_id: &KernelId) -> Scalar {
    hash_to_scalar("veil.kernel-challenge.v1", &[public_excess, public_nonce, kernel_id.as_bytes()])
}

/// One side's contribution: `s = k + c * x`.
pub fn partial_signature(nonce: &Scalar, excess: &Scalar, challenge: &Scalar) -> Scalar {
    nonce + challenge * excess
}

/// Verifies a (partial or aggregated) signature: `s * G == R + c * X`.
pub fn verify_signature_part(
    signature: &Scalar,
    public_nonce: &RistrettoPoint,
    public_excess: &RistrettoPoint,
    challenge: &Scalar,
) -> bool {
    signature * blinding_base() == public_nonce + challenge * public_excess
}

/// Builds a range proof for a single output; returns the proof bytes and the
/// commitment it attests to.
pub fn prove_range(value: Amount, blinding: &Scalar) -> Result<(Vec<u8>, [u8; 32])> {
    let mut transcript = Transcript::new(RANGE_PROOF_LABEL);
    let (proof, commitment) =
        RangeProof::prove_single(&BP_GENS, &PC_GENS, &mut transcript, value, blinding, RANGE_PROOF_BITS)
            .map_err(|err| WalletError::RangeProofError { operation: "prove".to_string(), details: err.to_string() })?;
    Ok((proof.to_bytes(), commitment.to_bytes()))
}

pub fn verify_range(proof_bytes: &[u8], commitment: &[u8; 32]) -> bool {
    let Ok(proof) = RangeProof::from_bytes(proof_bytes) else {
        return false;
    };
    let Ok(compressed) = CompressedRistretto::from_slice(commitment) else {
        return false;
    };
    let mut transcript = Transcript::new(RANGE_PROOF_LABEL);
    proof.verify_single(&BP_GENS, &PC_GENS, &mut transcript, &compressed, RANGE_PROOF_BITS).is_ok()
}
