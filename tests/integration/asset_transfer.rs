//! Asset transfer: amounts move in the tagged asset, the fee in the native
//! one, and value is conserved per asset.

use crate::fixtures::*;
use veil_core::application::SendRequest;
use veil_core::domain::model::CoinStatus;
use veil_core::domain::negotiation::UserStatus;
use veil_core::domain::params::TxParameterID;
use veil_core::foundation::KernelId;

#[test]
fn asset_transfer_conserves_value_per_asset() {
    let mut env = TestEnv::new();
    fund(&env.a, &[(800, 7), (1_000, 0)]);
    env.set_tip(100);

    let mut request = SendRequest::new(env.a.id, env.b.id, 500, 100);
    request.asset_id = 7;
    let tx_id = env.send(request);

    let kernel_id: KernelId = param(&env.a, &tx_id, TxParameterID::KernelId).expect("kernel id");
    env.mine_kernel(kernel_id, 104);
    env.set_tip(104);

    assert_eq!(env.a.service.user_status(&tx_id).expect("status"), UserStatus::Completed);
    assert_eq!(env.b.service.user_status(&tx_id).expect("status"), UserStatus::Completed);

    // Receiver got the asset coin.
    let received = coins_with_status(&env.b, 7, CoinStatus::Available);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].amount(), 500);

    // Asset 7: 800 in = 500 sent + 300 change. Native: 1_000 in = 900
    // change + 100 fee.
    assert_eq!(available_total(&env.a, 7), 300);
    assert_eq!(available_total(&env.a, 0), 900);

    // The wire transaction declares the asset on exactly the asset outputs.
    let (_, transaction) = &env.submitted[0];
    let tagged = transaction.outputs.iter().filter(|o| o.asset_id == 7).count();
    assert_eq!(tagged, 2, "receiver coin and asset change");
    assert_eq!(transaction.kernel.asset_id, 7);
}
