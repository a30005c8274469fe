//! Negotiation driver for simple (and split) transfers.
//!
//! The driver is edge-triggered: `update` is called after any relevant
//! parameter change (local write, inbound peer message, tip advance, keeper
//! completion), re-reads everything from the store and re-derives what to do.
//! It holds no cross-call state besides the shared builder.

use crate::application::builder::{BaseTxBuilder, BuildStep};
use crate::domain::model::{CoinStatus, RegisterResult, TxKind};
use crate::domain::negotiation::{self, NegotiationState, TxStatus};
use crate::domain::params::{ParameterMessage, TxParameterID};
use crate::domain::payment_proof::{self, PaymentConfirmation};
use crate::domain::transaction::Transaction;
use crate::foundation::{
    Amount, FailureReason, Height, Result, TxId, WalletId, DEFAULT_SUB_TX_ID, PROTO_VERSION,
};
use crate::infrastructure::config::WalletConfig;
use crate::infrastructure::gateway::NegotiatorGateway;
use crate::infrastructure::keykeeper::PaymentProofParameters;
use crate::infrastructure::storage::{AddressStore, CoinStore, ParameterStore, ParameterStoreExt, WalletStorage};
use log::{debug, info, warn};
use std::sync::Arc;

/// What must happen for `update` to be worth calling again.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NextTrigger {
    KeyKeeperCompletion,
    PeerParamWrite,
    NextTip,
    Immediate,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateOutcome {
    Continue(NextTrigger),
    Done(TxStatus),
}

pub struct TxContext<'a> {
    pub tx_id: TxId,
    pub store: &'a Arc<dyn WalletStorage>,
    pub gateway: &'a Arc<dyn NegotiatorGateway>,
    pub config: &'a WalletConfig,
    pub tip: Height,
}

impl<'a> TxContext<'a> {
    fn get<T: serde::de::DeserializeOwned>(&self, id: TxParameterID) -> Result<Option<T>> {
        self.store.get_param(&self.tx_id, id, DEFAULT_SUB_TX_ID)
    }

    fn get_mandatory<T: serde::de::DeserializeOwned>(&self, id: TxParameterID) -> Result<T> {
        self.store.get_mandatory(&self.tx_id, id, DEFAULT_SUB_TX_ID)
    }

    fn set<T: serde::Serialize>(&self, id: TxParameterID, value: &T) -> Result<()> {
        self.store.set_param(&self.tx_id, id, value, DEFAULT_SUB_TX_ID)
    }

    fn has(&self, id: TxParameterID) -> Result<bool> {
        self.store.has_param(&self.tx_id, id, DEFAULT_SUB_TX_ID)
    }

    pub fn status(&self) -> Result<TxStatus> {
        Ok(self.get(TxParameterID::Status)?.unwrap_or(TxStatus::Pending))
    }

    pub fn state(&self) -> Result<NegotiationState> {
        Ok(self.get(TxParameterID::State)?.unwrap_or(NegotiationState::Initial))
    }

    fn set_state(&self, state: NegotiationState) -> Result<()> {
        debug!("txo {} negotiation state={:?}", self.tx_id, state);
        self.set(TxParameterID::State, &state)
    }

    fn set_status(&self, status: TxStatus) -> Result<()> {
        let current = self.status()?;
        negotiation::ensure_valid_status_transition(current, status)?;
        negotiation::log_status_transition(&self.tx_id, current, status);
        self.set(TxParameterID::Status, &status)?;
        self.set(TxParameterID::ModifyTime, &crate::foundation::util::time::current_timestamp_secs())
    }
}

pub fn update(ctx: &TxContext, builder: &BaseTxBuilder) -> Result<UpdateOutcome> {
    let status = ctx.status()?;
    if negotiation::is_terminal(status) {
        return Ok(UpdateOutcome::Done(status));
    }
    if check_expired(ctx)? {
        return Ok(UpdateOutcome::Done(TxStatus::Failed));
    }

    let is_sender: bool = ctx.get_mandatory(TxParameterID::IsSender)?;
    let is_self: bool = ctx.get(TxParameterID::IsSelfTx)?.unwrap_or(false);
    let state = ctx.state()?;

    let kernel_loaded = builder.load_kernel()?.is_some();
    let negotiating = (is_sender && !kernel_loaded)
        || (!is_sender && (!builder.has_kernel_id()? || state == NegotiationState::Initial));

    if negotiating {
        if !builder.get_initial_tx_params()? && state == NegotiationState::Initial {
            log_intent(ctx, builder, is_sender)?;
            ctx.set_status(TxStatus::InProgress)?;

            if !is_sender {
                if let Some(reason) = validate_invitation(ctx, builder)? {
                    return fail(ctx, reason);
                }
            }

            if is_sender {
                if let Some(response_height) = ctx.get::<Height>(TxParameterID::PeerResponseHeight)? {
                    info!("txo {} max height for response: {}", ctx.tx_id, response_height);
                }
                if let Err(err) = builder.select_inputs(ctx.tip) {
                    warn!("txo {} input selection failed: {}", ctx.tx_id, err);
                    return fail(ctx, FailureReason::NoInputs);
                }
                builder.add_change()?;
            }
            if is_self || !is_sender {
                builder.generate_receiver_coins()?;
            }
        }

        if is_sender {
            if builder.generate_nonce()? == BuildStep::Pending {
                return Ok(UpdateOutcome::Continue(NextTrigger::KeyKeeperCompletion));
            }
        }
        if builder.create_inputs()? == BuildStep::Pending {
            return Ok(UpdateOutcome::Continue(NextTrigger::KeyKeeperCompletion));
        }
        if builder.create_outputs()? == BuildStep::Pending {
            return Ok(UpdateOutcome::Continue(NextTrigger::KeyKeeperCompletion));
        }

        if !is_self && !builder.has_peer_public_excess_and_nonce()? {
            // Initiator side: emit the invitation once, then wait for the
            // peer while watching expiry on tips.
            if state == NegotiationState::Initial {
                if builder.sign_sender(true)? == BuildStep::Pending {
                    return Ok(UpdateOutcome::Continue(NextTrigger::KeyKeeperCompletion));
                }
                if !send_invitation(ctx, builder, is_sender)? {
                    return fail(ctx, FailureReason::FailedToSendParameters);
                }
                ctx.set_state(NegotiationState::Invitation)?;
            }
            return Ok(UpdateOutcome::Continue(NextTrigger::NextTip));
        }

        if !builder.update_max_height(ctx.tip)? {
            return fail(ctx, FailureReason::MaxHeightIsUnacceptable);
        }
        builder.create_kernel()?;

        if !is_self && !builder.has_peer_signature()? {
            if state == NegotiationState::Initial {
                // Invited participant: co-sign and reply.
                let payment = receiver_payment_params(ctx, is_sender)?;
                if builder.sign_receiver(payment)? == BuildStep::Pending {
                    return Ok(UpdateOutcome::Continue(NextTrigger::KeyKeeperCompletion));
                }
                ctx.set_status(TxStatus::Registering)?;
                if !confirm_invitation(ctx, builder, is_sender)? {
                    return fail(ctx, FailureReason::FailedToSendParameters);
                }

                if ctx.has(TxParameterID::PeerProtoVersion)? {
                    // New-flow peer: it owns registration, we only await the
                    // kernel proof from here on.
                    ctx.set(TxParameterID::TransactionRegistered, &RegisterResult::Ok)?;
                    ctx.set_state(NegotiationState::KernelConfirmation)?;
                    ctx.gateway.confirm_kernel(&ctx.tx_id, &builder.kernel_id()?);
                    return Ok(UpdateOutcome::Continue(NextTrigger::NextTip));
                }
                ctx.set_state(NegotiationState::InvitationConfirmation)?;
                return Ok(UpdateOutcome::Continue(NextTrigger::PeerParamWrite));
            }
            if is_sender {
                return Ok(UpdateOutcome::Continue(NextTrigger::PeerParamWrite));
            }
        }

        if !is_self {
            if builder.sign_sender(false)? == BuildStep::Pending {
                return Ok(UpdateOutcome::Continue(NextTrigger::KeyKeeperCompletion));
            }
        } else if builder.sign_receiver(None)? == BuildStep::Pending {
            return Ok(UpdateOutcome::Continue(NextTrigger::KeyKeeperCompletion));
        }

        if !is_self {
            if !builder.is_peer_signature_valid()? {
                return fail(ctx, FailureReason::InvalidPeerSignature);
            }
            if is_sender && !verify_payment_proof(ctx, builder)? {
                return fail(ctx, FailureReason::NoPaymentProof);
            }
        }
        builder.finalize_signature()?;
    }

    // Registration phase.
    let registered: Option<RegisterResult> = ctx.get(TxParameterID::TransactionRegistered)?;
    let Some(verdict) = registered else {
        if !is_sender && ctx.state()? == NegotiationState::InvitationConfirmation {
            // Legacy peer owns registration; wait for its notification.
            return Ok(UpdateOutcome::Continue(NextTrigger::PeerParamWrite));
        }
        let transaction = builder.create_transaction()?;
        if let Err(err) = offline_validate(&transaction, builder) {
            warn!("txo {} transaction failed offline validation: {}", ctx.tx_id, err);
            return fail(ctx, FailureReason::InvalidTransaction);
        }
        ctx.gateway.register_tx(&ctx.tx_id, &transaction);
        ctx.set_state(NegotiationState::Registration)?;
        if ctx.status()? != TxStatus::Registering {
            ctx.set_status(TxStatus::Registering)?;
        }
        return Ok(UpdateOutcome::Continue(NextTrigger::PeerParamWrite));
    };

    match verdict {
        RegisterResult::Ok => {}
        RegisterResult::InvalidContext => {
            // The kernel may simply not be visible at this tip yet. Only a
            // prior explicit "unconfirmed" sighting makes this permanent;
            // absence of the key, not its value, is what marks "never
            // observed".
            if ctx.has(TxParameterID::KernelUnconfirmedHeight)? {
                return fail(ctx, FailureReason::FailedToRegister);
            }
            info!("txo {} node returned a transient InvalidContext; retrying on next tip", ctx.tx_id);
            ctx.store.delete(&ctx.tx_id, DEFAULT_SUB_TX_ID, TxParameterID::TransactionRegistered.as_u8())?;
            return Ok(UpdateOutcome::Continue(NextTrigger::NextTip));
        }
        _ => return fail(ctx, FailureReason::FailedToRegister),
    }

    let proof_height = ctx.get::<Height>(TxParameterID::KernelProofHeight)?.filter(|h| *h > 0);
    let Some(proof_height) = proof_height else {
        if ctx.state()? != NegotiationState::KernelConfirmation {
            ctx.set_state(NegotiationState::KernelConfirmation)?;
            if is_sender && !is_self && !ctx.has(TxParameterID::PeerProtoVersion)? {
                notify_transaction_registered(ctx)?;
            }
        }
        ctx.gateway.confirm_kernel(&ctx.tx_id, &builder.kernel_id()?);
        return Ok(UpdateOutcome::Continue(NextTrigger::NextTip));
    };

    set_completed_coin_statuses(ctx, proof_height)?;
    ctx.set_status(TxStatus::Completed)?;
    info!("txo {} completed kernel_proof_height={}", ctx.tx_id, proof_height);
    Ok(UpdateOutcome::Done(TxStatus::Completed))
}

fn log_intent(ctx: &TxContext, builder: &BaseTxBuilder, is_sender: bool) -> Result<()> {
    let direction = if is_sender { "sending" } else { "receiving" };
    let asset_note = if builder.asset_id() != 0 { format!(" asset_id={}", builder.asset_id()) } else { String::new() };
    info!(
        "txo {} {} amount={}{} (fee: {})",
        ctx.tx_id,
        direction,
        builder.amount_total(),
        asset_note,
        builder.fee()
    );
    if let (Some(my), Some(peer)) = (
        ctx.get::<WalletId>(TxParameterID::MySecureWalletId)?,
        ctx.get::<WalletId>(TxParameterID::PeerSecureWalletId)?,
    ) {
        info!("txo {} my ID: {}, peer ID: {}", ctx.tx_id, my, peer);
    }
    Ok(())
}

/// Sanity checks an inbound invitation before auto-signing it.
fn validate_invitation(ctx: &TxContext, builder: &BaseTxBuilder) -> Result<Option<FailureReason>> {
    let amount = builder.amount_total();
    if amount == 0 {
        warn!("txo {} invitation rejected: zero amount", ctx.tx_id);
        return Ok(Some(FailureReason::InvalidTransaction));
    }
    if builder.fee() < ctx.config.fee_floor {
        warn!("txo {} invitation rejected: fee {} below floor {}", ctx.tx_id, builder.fee(), ctx.config.fee_floor);
        return Ok(Some(FailureReason::InvalidTransaction));
    }
    let min_height = builder.min_height()?;
    if min_height == 0 || min_height > ctx.tip.saturating_add(builder.lifetime()?).saturating_add(1) {
        warn!("txo {} invitation rejected: unreasonable min height {}", ctx.tx_id, min_height);
        return Ok(Some(FailureReason::InvalidTransaction));
    }
    if let Some(max_fee) = ctx.config.max_receive_fee {
        if builder.fee() > max_fee {
            warn!("txo {} invitation rejected: fee {} above cap {}", ctx.tx_id, builder.fee(), max_fee);
            return Ok(Some(FailureReason::InvalidTransaction));
        }
    }
    if let Some(max_amount) = ctx.config.max_receive_amount {
        if amount > max_amount {
            warn!("txo {} invitation rejected: amount {} above cap {}", ctx.tx_id, amount, max_amount);
            return Ok(Some(FailureReason::InvalidTransaction));
        }
    }
    Ok(None)
}

fn send_invitation(ctx: &TxContext, builder: &BaseTxBuilder, is_sender: bool) -> Result<bool> {
    let peer: WalletId = ctx.get_mandatory(TxParameterID::PeerId)?;
    let kind: TxKind = ctx.get_mandatory(TxParameterID::TransactionType)?;
    let public_excess: [u8; 32] = ctx.get_mandatory(TxParameterID::PublicExcess)?;
    let public_nonce: [u8; 32] = ctx.get_mandatory(TxParameterID::PublicNonce)?;

    let mut msg = ParameterMessage::new(ctx.tx_id, kind);
    msg.push(TxParameterID::Amount, &builder.amount_total())?;
    msg.push(TxParameterID::Fee, &builder.fee())?;
    msg.push(TxParameterID::MinHeight, &builder.min_height()?)?;
    msg.push(TxParameterID::Lifetime, &builder.lifetime()?)?;
    msg.push(TxParameterID::PeerMaxHeight, &builder.max_height_proposal()?)?;
    msg.push(TxParameterID::IsSender, &!is_sender)?;
    msg.push(TxParameterID::PeerProtoVersion, &PROTO_VERSION)?;
    msg.push(TxParameterID::PeerPublicExcess, &public_excess)?;
    msg.push(TxParameterID::PeerPublicNonce, &public_nonce)?;
    msg.push(TxParameterID::AssetId, &builder.asset_id())?;

    info!("txo {} sending invitation peer={}", ctx.tx_id, peer);
    Ok(ctx.gateway.send_tx_parameters(&peer, msg))
}

fn confirm_invitation(ctx: &TxContext, builder: &BaseTxBuilder, is_sender: bool) -> Result<bool> {
    info!("txo {} transaction accepted kernel_id={}", ctx.tx_id, builder.kernel_id()?);
    let peer: WalletId = ctx.get_mandatory(TxParameterID::PeerId)?;
    let kind: TxKind = ctx.get_mandatory(TxParameterID::TransactionType)?;
    let public_excess: [u8; 32] = ctx.get_mandatory(TxParameterID::PublicExcess)?;
    let public_nonce: [u8; 32] = ctx.get_mandatory(TxParameterID::PublicNonce)?;
    let partial: [u8; 32] = ctx.get_mandatory(TxParameterID::PartialSignature)?;

    let mut msg = ParameterMessage::new(ctx.tx_id, kind);
    msg.push(TxParameterID::PeerProtoVersion, &PROTO_VERSION)?;
    msg.push(TxParameterID::PeerPublicExcess, &public_excess)?;
    msg.push(TxParameterID::PeerSignature, &partial)?;
    msg.push(TxParameterID::PeerPublicNonce, &public_nonce)?;
    msg.push(TxParameterID::PeerMaxHeight, &builder.max_height_proposal()?)?;
    msg.push(TxParameterID::PeerInputs, &ctx.get::<Vec<crate::domain::transaction::TxInput>>(TxParameterID::Inputs)?.unwrap_or_default())?;
    msg.push(TxParameterID::PeerOutputs, &ctx.get::<Vec<crate::domain::transaction::TxOutput>>(TxParameterID::Outputs)?.unwrap_or_default())?;
    msg.push(TxParameterID::PeerOffset, &crypto_zero_scalar())?;

    if !is_sender {
        if let Some(proof) = ctx.get::<PaymentConfirmation>(TxParameterID::PaymentConfirmation)? {
            msg.push(TxParameterID::PaymentConfirmation, &proof)?;
        }
    }
    Ok(ctx.gateway.send_tx_parameters(&peer, msg))
}

fn crypto_zero_scalar() -> [u8; 32] {
    [0u8; 32]
}

fn notify_transaction_registered(ctx: &TxContext) -> Result<()> {
    let peer: WalletId = ctx.get_mandatory(TxParameterID::PeerId)?;
    let kind: TxKind = ctx.get_mandatory(TxParameterID::TransactionType)?;
    let mut msg = ParameterMessage::new(ctx.tx_id, kind);
    msg.push(TxParameterID::TransactionRegistered, &RegisterResult::Ok)?;
    debug!("txo {} notifying legacy peer of registration", ctx.tx_id);
    ctx.gateway.send_tx_parameters(&peer, msg);
    Ok(())
}

/// Receiver-side material for the payment confirmation; `None` when the
/// receiving address is not recognised as owned (the sender will then refuse
/// the record with `NoPaymentProof`).
fn receiver_payment_params(ctx: &TxContext, is_sender: bool) -> Result<Option<PaymentProofParameters>> {
    if is_sender {
        return Ok(None);
    }
    let Some(my_id) = ctx.get::<WalletId>(TxParameterID::MyId)? else {
        return Ok(None);
    };
    let Some(peer_id) = ctx.get::<WalletId>(TxParameterID::PeerId)? else {
        return Ok(None);
    };
    let Some(address) = ctx.store.get_address(&my_id)? else {
        return Ok(None);
    };
    if !address.is_own() {
        return Ok(None);
    }
    Ok(Some(PaymentProofParameters { wallet_id_key: address.own_id, sender: peer_id }))
}

/// Sender-side check that the receiver's confirmation binds
/// `(kernel_id, amount, my identity)` under the receiver's SBBS key.
fn verify_payment_proof(ctx: &TxContext, builder: &BaseTxBuilder) -> Result<bool> {
    let Some(proof) = ctx.get::<PaymentConfirmation>(TxParameterID::PaymentConfirmation)? else {
        warn!("txo {} receiver did not provide a payment confirmation", ctx.tx_id);
        return Ok(false);
    };
    let receiver: WalletId = ctx.get_mandatory(TxParameterID::PeerId)?;
    let my_id: WalletId = ctx.get_mandatory(TxParameterID::MyId)?;
    let amount: Amount = builder.amount_total();
    let kernel_id = builder.kernel_id()?;
    match payment_proof::verify(&proof, &receiver, &kernel_id, amount, &my_id) {
        Ok(valid) => Ok(valid),
        Err(err) => {
            warn!("txo {} payment confirmation malformed: {}", ctx.tx_id, err);
            Ok(false)
        }
    }
}

fn offline_validate(transaction: &Transaction, builder: &BaseTxBuilder) -> Result<()> {
    transaction.validate(builder.min_height()?)
}

/// Height-driven expiry. A record in kernel confirmation never expires by
/// height alone, and an arrived registration verdict pins the record too.
pub fn check_expired(ctx: &TxContext) -> Result<bool> {
    if ctx.state()? == NegotiationState::KernelConfirmation {
        return Ok(false);
    }
    if ctx.has(TxParameterID::TransactionRegistered)? {
        return Ok(false);
    }
    let Some(min_height) = ctx.get::<Height>(TxParameterID::MinHeight)? else {
        return Ok(false);
    };
    let max_height = match ctx.get::<Height>(TxParameterID::MaxHeight)? {
        Some(max_height) => max_height,
        None => {
            let lifetime = ctx.get::<Height>(TxParameterID::Lifetime)?.unwrap_or(0);
            min_height.saturating_add(lifetime)
        }
    };
    if ctx.tip > max_height {
        warn!("txo {} expired tip={} max_height={}", ctx.tx_id, ctx.tip, max_height);
        fail(ctx, FailureReason::TransactionExpired)?;
        return Ok(true);
    }
    Ok(false)
}

/// Terminal failure: persists the reason, rolls the status to `Failed` and
/// releases coins. Transport failures keep the reservation: the peer may
/// still complete from state it already holds, so only an explicit cancel
/// frees those coins.
pub fn fail(ctx: &TxContext, reason: FailureReason) -> Result<UpdateOutcome> {
    warn!("txo {} failed reason={:?} ({})", ctx.tx_id, reason, reason);
    ctx.set(TxParameterID::FailureReason, &reason)?;
    ctx.set_status(TxStatus::Failed)?;
    if reason != FailureReason::FailedToSendParameters {
        release_coins(ctx)?;
    }
    Ok(UpdateOutcome::Done(TxStatus::Failed))
}

/// Returns reserved inputs to `Available` and discards the coins this record
/// would have created.
pub fn release_coins(ctx: &TxContext) -> Result<()> {
    let coins = ctx.store.coins_by_tx(&ctx.tx_id)?;
    let mut released = Vec::new();
    let mut discarded = Vec::new();
    for mut coin in coins {
        if coin.spend_tx.as_ref() == Some(&ctx.tx_id) && coin.status == CoinStatus::Outgoing {
            coin.status = CoinStatus::Available;
            coin.spend_tx = None;
            released.push(coin);
        } else if coin.create_tx.as_ref() == Some(&ctx.tx_id) && coin.status == CoinStatus::Incoming {
            discarded.push(coin);
        }
    }
    if !released.is_empty() {
        debug!("txo {} released coins count={}", ctx.tx_id, released.len());
        ctx.store.update_coins(&released)?;
    }
    if !discarded.is_empty() {
        ctx.store.remove_coins(&discarded)?;
    }
    Ok(())
}

/// Marks spent inputs `Spent` and created coins `Available` at the proof
/// height.
fn set_completed_coin_statuses(ctx: &TxContext, proof_height: Height) -> Result<()> {
    let coins = ctx.store.coins_by_tx(&ctx.tx_id)?;
    let mut updated = Vec::new();
    for mut coin in coins {
        if coin.spend_tx.as_ref() == Some(&ctx.tx_id) && coin.status == CoinStatus::Outgoing {
            coin.status = CoinStatus::Spent;
            updated.push(coin);
        } else if coin.create_tx.as_ref() == Some(&ctx.tx_id) && coin.status == CoinStatus::Incoming {
            coin.status = CoinStatus::Available;
            coin.maturity = proof_height;
            coin.confirm_height = Some(proof_height);
            updated.push(coin);
        }
    }
    if !updated.is_empty() {
        ctx.store.update_coins(&updated)?;
    }
    Ok(())
}
