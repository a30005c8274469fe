//! Node `InvalidContext` verdicts: transient without a prior unconfirmed
//! sighting, permanent with one.

use crate::fixtures::*;
use veil_core::application::SendRequest;
use veil_core::domain::model::RegisterResult;
use veil_core::domain::negotiation::UserStatus;
use veil_core::domain::params::TxParameterID;
use veil_core::foundation::{FailureReason, KernelId};

#[test]
fn transient_invalid_context_retries_and_completes() {
    let mut env = TestEnv::new();
    fund(&env.a, &[(1_500_000, 0)]);
    env.verdicts.push_back(RegisterResult::InvalidContext);
    env.verdicts.push_back(RegisterResult::Ok);
    env.set_tip(100);

    let tx_id = env.send(SendRequest::new(env.a.id, env.b.id, 1_000_000, 100));

    // First verdict consumed, record still alive, waiting for the next tip.
    assert_eq!(env.submitted.len(), 1);
    assert_eq!(env.a.service.user_status(&tx_id).expect("status"), UserStatus::Registering);

    // The next tip resubmits the same transaction and gets Ok.
    env.set_tip(101);
    assert_eq!(env.submitted.len(), 2);

    let kernel_id: KernelId = param(&env.a, &tx_id, TxParameterID::KernelId).expect("kernel id");
    env.mine_kernel(kernel_id, 103);
    env.set_tip(103);
    assert_eq!(env.a.service.user_status(&tx_id).expect("status"), UserStatus::Completed);
}

#[test]
fn invalid_context_after_unconfirmed_sighting_is_permanent() {
    let mut env = TestEnv::new();
    fund(&env.a, &[(1_500_000, 0)]);
    env.verdicts.push_back(RegisterResult::InvalidContext);
    env.verdicts.push_back(RegisterResult::InvalidContext);
    env.set_tip(100);

    let tx_id = env.send(SendRequest::new(env.a.id, env.b.id, 1_000_000, 100));
    assert_eq!(env.a.service.user_status(&tx_id).expect("status"), UserStatus::Registering);

    // The node explicitly reported the kernel missing at a height; the next
    // InvalidContext is no longer treated as transient.
    env.a.service.on_kernel_unconfirmed(&tx_id, 100).expect("unconfirmed");
    env.set_tip(101);

    assert_eq!(
        env.a.service.user_status(&tx_id).expect("status"),
        UserStatus::Failed(FailureReason::FailedToRegister)
    );
}

#[test]
fn low_fee_verdict_fails_the_record() {
    let mut env = TestEnv::new();
    fund(&env.a, &[(1_500_000, 0)]);
    env.verdicts.push_back(RegisterResult::LowFee);
    env.set_tip(100);

    let tx_id = env.send(SendRequest::new(env.a.id, env.b.id, 1_000_000, 100));
    assert_eq!(
        env.a.service.user_status(&tx_id).expect("status"),
        UserStatus::Failed(FailureReason::FailedToRegister)
    );
    assert_eq!(available_total(&env.a, 0), 1_500_000);
}
