//! Re-running the driver over identical store contents emits identical
//! outbound messages: every signing artefact is a pure function of the
//! record and the persisted nonce-slot seed.

use crate::fixtures::*;
use veil_core::application::SendRequest;
use veil_core::domain::negotiation::NegotiationState;
use veil_core::domain::params::TxParameterID;
use veil_core::foundation::{TxId, DEFAULT_SUB_TX_ID};
use veil_core::infrastructure::storage::{ParameterStore, ParameterStoreExt};

#[test]
fn rerunning_update_reproduces_the_invitation_byte_for_byte() {
    let mut wallet = test_wallet(1);
    fund(&wallet, &[(1_500_000, 0)]);
    wallet.service.on_tip(100).expect("tip");

    let mut request = SendRequest::new(wallet.id, veil_core::foundation::WalletId::new([0x11; 32]), 1_000_000, 100);
    request.tx_id = Some(TxId::new([0x22; 16]));
    request.lifetime = Some(240);
    let tx_id = wallet.service.send(request).expect("send");

    let first = wallet.gateway.drain_outbox();
    assert_eq!(first.len(), 1);

    // Roll the record back to the pre-invitation point and wipe the signing
    // artefacts; the keeper must re-derive the exact same values from the
    // record and its slot seed.
    let store = wallet.store.clone();
    store.set_param(&tx_id, TxParameterID::State, &NegotiationState::Initial, DEFAULT_SUB_TX_ID).expect("reset state");
    for id in [TxParameterID::PublicExcess, TxParameterID::PublicNonce, TxParameterID::Offset] {
        store.delete(&tx_id, DEFAULT_SUB_TX_ID, id.as_u8()).expect("wipe artefact");
    }
    wallet.service.update_tx(&tx_id).expect("re-run");

    let second = wallet.gateway.drain_outbox();
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].0, second[0].0);
    assert_eq!(
        bincode::serialize(&first[0].1).expect("encode"),
        bincode::serialize(&second[0].1).expect("encode"),
        "outbound invitation must be byte-identical"
    );
}
