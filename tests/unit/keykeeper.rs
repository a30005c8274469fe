use std::sync::Arc;

use veil_core::domain::crypto;
use veil_core::domain::model::{CoinId, CoinKeyType};
use veil_core::domain::payment_proof;
use veil_core::domain::transaction::kernel_id_from_parts;
use veil_core::infrastructure::keykeeper::{KernelParameters, KeyKeeper, LocalKeyKeeper, PaymentProofParameters};
use veil_core::infrastructure::storage::MemoryWalletStore;

fn keeper_over(store: Arc<MemoryWalletStore>) -> LocalKeyKeeper {
    LocalKeyKeeper::new([42u8; 32], store).expect("keeper")
}

fn kernel(peer_excess: Option<[u8; 32]>, peer_nonce: Option<[u8; 32]>) -> KernelParameters {
    KernelParameters { fee: 100, min_height: 10, max_height: 250, asset_id: 0, peer_public_excess: peer_excess, peer_public_nonce: peer_nonce }
}

#[test]
fn sender_signing_is_deterministic_across_restarts() {
    let store = Arc::new(MemoryWalletStore::new());
    let inputs = vec![CoinId::new(1, 1_000, 0, CoinKeyType::Regular)];
    let outputs = vec![CoinId::new(2, 900, 0, CoinKeyType::Change)];

    let keeper = keeper_over(store.clone());
    let slot = keeper.allocate_nonce_slot().expect("slot");
    let first = keeper.sign_sender(&inputs, &outputs, slot, &kernel(None, None), true).expect("sign");
    let second = keeper.sign_sender(&inputs, &outputs, slot, &kernel(None, None), true).expect("sign");
    assert_eq!(first.public_excess, second.public_excess);
    assert_eq!(first.public_nonce, second.public_nonce);
    assert_eq!(first.offset, second.offset);

    // A fresh keeper over the same variables store sees the same slot seed.
    drop(keeper);
    let restarted = keeper_over(store);
    let third = restarted.sign_sender(&inputs, &outputs, slot, &kernel(None, None), true).expect("sign");
    assert_eq!(first.public_nonce, third.public_nonce);
    assert_eq!(first.public_excess, third.public_excess);
}

#[test]
fn nonce_slots_are_never_shared() {
    let store = Arc::new(MemoryWalletStore::new());
    let keeper = keeper_over(store);
    let s1 = keeper.allocate_nonce_slot().expect("slot");
    let s2 = keeper.allocate_nonce_slot().expect("slot");
    assert_ne!(s1, s2);
    assert_ne!(keeper.generate_nonce(s1).expect("nonce"), keeper.generate_nonce(s2).expect("nonce"));
}

#[test]
fn sender_initial_round_withholds_partial_signature() {
    let keeper = keeper_over(Arc::new(MemoryWalletStore::new()));
    let slot = keeper.allocate_nonce_slot().expect("slot");
    let inputs = vec![CoinId::new(1, 500, 0, CoinKeyType::Regular)];

    let initial = keeper.sign_sender(&inputs, &[], slot, &kernel(None, None), true).expect("sign");
    assert!(initial.partial_signature.is_none());
    assert!(initial.kernel_id.is_none());

    // The final round requires the peer half of the aggregates.
    assert!(keeper.sign_sender(&inputs, &[], slot, &kernel(None, None), false).is_err());
}

#[test]
fn split_signature_aggregates_to_a_valid_kernel_signature() {
    let sender_store = Arc::new(MemoryWalletStore::new());
    let sender = LocalKeyKeeper::new([1u8; 32], sender_store).expect("keeper");
    let receiver = LocalKeyKeeper::new([2u8; 32], Arc::new(MemoryWalletStore::new())).expect("keeper");

    let sender_inputs = vec![CoinId::new(1, 1_200, 0, CoinKeyType::Regular)];
    let sender_change = vec![CoinId::new(2, 100, 0, CoinKeyType::Change)];
    let receiver_coins = vec![CoinId::new(1, 1_000, 0, CoinKeyType::Regular)];

    let slot = sender.allocate_nonce_slot().expect("slot");
    let invite = sender.sign_sender(&sender_inputs, &sender_change, slot, &kernel(None, None), true).expect("invite");

    let receiver_sig = receiver
        .sign_receiver(&[], &receiver_coins, &kernel(Some(invite.public_excess), Some(invite.public_nonce)), None)
        .expect("receiver");

    let final_sig = sender
        .sign_sender(
            &sender_inputs,
            &sender_change,
            slot,
            &kernel(Some(receiver_sig.public_excess), Some(receiver_sig.public_nonce)),
            false,
        )
        .expect("final");

    assert_eq!(final_sig.kernel_id, Some(receiver_sig.kernel_id));

    // s = s_me + s_peer verifies against the aggregates: s*G == R + c*X.
    let s_me = crypto::scalar_from_bytes(&final_sig.partial_signature.expect("partial"), "s_me").expect("scalar");
    let s_peer = crypto::scalar_from_bytes(&receiver_sig.partial_signature, "s_peer").expect("scalar");
    let x_total = crypto::decompress_point(&final_sig.public_excess, "x_me").expect("point")
        + crypto::decompress_point(&receiver_sig.public_excess, "x_peer").expect("point");
    let r_total = crypto::decompress_point(&final_sig.public_nonce, "r_me").expect("point")
        + crypto::decompress_point(&receiver_sig.public_nonce, "r_peer").expect("point");

    let kernel_id = kernel_id_from_parts(
        &crypto::point_bytes(&x_total),
        &crypto::point_bytes(&r_total),
        100,
        10,
        250,
        0,
    );
    assert_eq!(kernel_id, receiver_sig.kernel_id);
    let challenge = crypto::kernel_challenge(&crypto::point_bytes(&x_total), &crypto::point_bytes(&r_total), &kernel_id);
    assert!(crypto::verify_signature_part(&(s_me + s_peer), &r_total, &x_total, &challenge));
}

#[test]
fn receiver_payment_proof_binds_kernel_amount_and_sender() {
    let receiver = LocalKeyKeeper::new([3u8; 32], Arc::new(MemoryWalletStore::new())).expect("keeper");
    let sender = LocalKeyKeeper::new([4u8; 32], Arc::new(MemoryWalletStore::new())).expect("keeper");

    let sender_id = sender.sbbs_public(1).expect("sender id");
    let receiver_id = receiver.sbbs_public(1).expect("receiver id");

    let slot = sender.allocate_nonce_slot().expect("slot");
    let invite = sender
        .sign_sender(&[CoinId::new(1, 1_100, 0, CoinKeyType::Regular)], &[], slot, &kernel(None, None), true)
        .expect("invite");

    let sig = receiver
        .sign_receiver(
            &[],
            &[CoinId::new(1, 1_000, 0, CoinKeyType::Regular)],
            &kernel(Some(invite.public_excess), Some(invite.public_nonce)),
            Some(&PaymentProofParameters { wallet_id_key: 1, sender: sender_id }),
        )
        .expect("receiver");

    let proof = sig.payment_proof.expect("payment proof");
    assert!(payment_proof::verify(&proof, &receiver_id, &sig.kernel_id, 1_000, &sender_id).expect("verify"));
    assert!(!payment_proof::verify(&proof, &receiver_id, &sig.kernel_id, 1_001, &sender_id).expect("verify"));
    assert!(!payment_proof::verify(&proof, &receiver_id, &sig.kernel_id, 1_000, &receiver_id).expect("verify"));
}

#[test]
fn sbbs_key_matches_its_public_identity() {
    let keeper = keeper_over(Arc::new(MemoryWalletStore::new()));
    let secret = keeper.derive_sbbs_key(1).expect("secret");
    let public = keeper.sbbs_public(1).expect("public");
    assert_eq!(*public.as_bytes(), crypto::point_bytes(&(secret * crypto::blinding_base())));
    assert_ne!(public, keeper.sbbs_public(2).expect("public"));
}

#[test]
fn asset_kernel_signature_verifies_under_the_owner_key() {
    let keeper = keeper_over(Arc::new(MemoryWalletStore::new()));
    let inputs = vec![CoinId::new(1, 700, 7, CoinKeyType::Regular)];
    let outputs = vec![CoinId::new(2, 700, 7, CoinKeyType::Regular)];

    let signed = keeper.sign_asset_kernel(&inputs, &outputs, 100, 3, 10, 250).expect("sign");
    let kernel_id = kernel_id_from_parts(signed.owner_id.as_bytes(), &signed.public_nonce, 100, 10, 250, 3);
    let challenge = crypto::kernel_challenge(signed.owner_id.as_bytes(), &signed.public_nonce, &kernel_id);
    let signature = crypto::scalar_from_bytes(&signed.signature, "sig").expect("scalar");
    assert!(crypto::verify_signature_part(
        &signature,
        &crypto::decompress_point(&signed.public_nonce, "nonce").expect("point"),
        &crypto::decompress_point(signed.owner_id.as_bytes(), "owner").expect("point"),
        &challenge,
    ));
}

#[test]
fn generated_outputs_carry_valid_range_proofs() {
    let keeper = keeper_over(Arc::new(MemoryWalletStore::new()));
    let ids = vec![CoinId::new(1, 100, 0, CoinKeyType::Regular), CoinId::new(2, 50, 0, CoinKeyType::Regular)];
    let outputs = keeper.generate_outputs(10, &ids).expect("outputs");
    assert_eq!(outputs.len(), 2);
    for output in &outputs {
        assert!(crypto::verify_range(&output.range_proof, &output.commitment));
    }
    // Input commitments and output commitments derive from the same coin key.
    let commitments = keeper.generate_public_keys(&ids, true).expect("public keys");
    assert_eq!(commitments[0], outputs[0].commitment);
    assert_eq!(commitments[1], outputs[1].commitment);
}
