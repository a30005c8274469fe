//! Receiver-side sanity checks on inbound invitations.

use crate::fixtures::*;
use veil_core::application::SendRequest;
use veil_core::domain::negotiation::UserStatus;
use veil_core::foundation::FailureReason;
use veil_core::infrastructure::config::WalletConfig;

#[test]
fn receiver_refuses_fee_below_floor() {
    let mut env = TestEnv::new();
    fund(&env.a, &[(1_500_000, 0)]);
    env.set_tip(100);

    let tx_id = env.send(SendRequest::new(env.a.id, env.b.id, 1_000_000, 50));

    assert_eq!(
        env.b.service.user_status(&tx_id).expect("status"),
        UserStatus::Failed(FailureReason::InvalidTransaction)
    );
    // The sender got no reply and is still waiting.
    assert_eq!(env.a.service.user_status(&tx_id).expect("status"), UserStatus::InProgress);
}

#[test]
fn receiver_refuses_amount_above_configured_cap() {
    let config_b = WalletConfig { max_receive_amount: Some(500_000), ..WalletConfig::default() };
    let mut env = TestEnv::with_configs(WalletConfig::default(), config_b);
    fund(&env.a, &[(1_500_000, 0)]);
    env.set_tip(100);

    let tx_id = env.send(SendRequest::new(env.a.id, env.b.id, 1_000_000, 100));

    assert_eq!(
        env.b.service.user_status(&tx_id).expect("status"),
        UserStatus::Failed(FailureReason::InvalidTransaction)
    );
}

#[test]
fn sending_to_expired_owned_address_is_refused() {
    let mut wallet = test_wallet(3);
    fund(&wallet, &[(1_000, 0)]);

    // Register a second owned address that is already expired.
    let expired_id = wallet.keeper_public(2);
    wallet
        .store
        .save_address(&veil_core::domain::model::WalletAddress {
            wallet_id: expired_id,
            own_id: 2,
            label: "stale".to_string(),
            create_time: 1,
            duration: 1,
        })
        .expect("save");

    let err = wallet.service.send(SendRequest::new(wallet.id, expired_id, 100, 100)).unwrap_err();
    assert!(matches!(err, veil_core::foundation::WalletError::AddressExpired));
}
