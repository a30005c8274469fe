//! Height-driven expiry of an unanswered invitation.

use crate::fixtures::*;
use veil_core::application::SendRequest;
use veil_core::domain::model::CoinStatus;
use veil_core::domain::negotiation::UserStatus;

#[test]
fn unanswered_invitation_expires_after_lifetime() {
    let mut env = TestEnv::new();
    env.drop_messages = true;
    fund(&env.a, &[(1_500_000, 0)]);
    env.set_tip(100);

    let mut request = SendRequest::new(env.a.id, env.b.id, 1_000_000, 100);
    request.lifetime = Some(10);
    let tx_id = env.send(request);

    // Within the lifetime nothing happens.
    env.set_tip(110);
    assert_eq!(env.a.service.user_status(&tx_id).expect("status"), UserStatus::InProgress);
    assert!(coins_with_status(&env.a, 0, CoinStatus::Available).is_empty());

    // One block past min_height + lifetime the record expires and the coins
    // come back.
    env.set_tip(111);
    assert_eq!(env.a.service.user_status(&tx_id).expect("status"), UserStatus::Expired);
    assert_eq!(available_total(&env.a, 0), 1_500_000);

    // Terminal: later tips change nothing.
    env.set_tip(500);
    assert_eq!(env.a.service.user_status(&tx_id).expect("status"), UserStatus::Expired);
}

#[test]
fn failed_transport_send_keeps_coins_reserved_until_cancel() {
    let mut env = TestEnv::new();
    fund(&env.a, &[(1_500_000, 0)]);
    env.a.gateway.set_fail_sends(true);
    env.set_tip(100);

    let tx_id = env.send(SendRequest::new(env.a.id, env.b.id, 1_000_000, 100));
    assert!(matches!(env.a.service.user_status(&tx_id).expect("status"), UserStatus::Failed(_)));

    // The peer may still hold enough state to complete: the reservation
    // stays until the user explicitly cancels.
    assert!(!coins_with_status(&env.a, 0, CoinStatus::Outgoing).is_empty());

    env.a.service.cancel(&tx_id).expect("cancel");
    assert_eq!(available_total(&env.a, 0), 1_500_000);
}
