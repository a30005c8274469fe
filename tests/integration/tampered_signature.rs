//! A receiver that mutates its partial signature must be caught by the
//! sender, and the sender's coins must come back.

use crate::fixtures::*;
use veil_core::application::SendRequest;
use veil_core::domain::model::CoinStatus;
use veil_core::domain::negotiation::UserStatus;
use veil_core::foundation::FailureReason;

#[test]
fn sender_rejects_tampered_peer_signature_and_releases_coins() {
    let mut env = TestEnv::new();
    env.tamper_peer_signature = true;
    fund(&env.a, &[(1_500_000, 0)]);
    env.set_tip(100);

    let tx_id = env.send(SendRequest::new(env.a.id, env.b.id, 1_000_000, 100));

    assert_eq!(
        env.a.service.user_status(&tx_id).expect("status"),
        UserStatus::Failed(FailureReason::InvalidPeerSignature)
    );
    // Nothing was submitted to the node.
    assert!(env.submitted.is_empty());
    // The reservation is rolled back.
    assert!(coins_with_status(&env.a, 0, CoinStatus::Outgoing).is_empty());
    assert_eq!(available_total(&env.a, 0), 1_500_000);
}
