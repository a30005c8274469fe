//! Wallet service: owns the stores, the builder per record, and the dispatch
//! of events into the negotiation drivers.

use crate::application::builder::BaseTxBuilder;
use crate::application::simple::{self, NextTrigger, TxContext, UpdateOutcome};
use crate::domain::model::{RegisterResult, TxKind, TxRole, WalletAddress};
use crate::domain::negotiation::{self, NegotiationState, TxStatus, UserStatus};
use crate::domain::params::{ParameterMessage, TxParameterID};
use crate::foundation::util::time::current_timestamp_secs;
use crate::foundation::{
    Amount, AssetId, FailureReason, Height, Result, TxId, WalletError, WalletId, DEFAULT_SUB_TX_ID,
};
use crate::infrastructure::config::WalletConfig;
use crate::infrastructure::gateway::NegotiatorGateway;
use crate::infrastructure::keykeeper::{KeeperCompletion, KeeperExecutor};
use crate::infrastructure::storage::{AddressStore, ParameterStore, ParameterStoreExt, WalletStorage};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub use crate::infrastructure::storage::StoreObserver as WalletObserver;

/// Parameters of an outgoing transfer.
#[derive(Clone, Debug)]
pub struct SendRequest {
    pub tx_id: Option<TxId>,
    pub my_id: WalletId,
    pub peer_id: WalletId,
    pub amount_list: Vec<Amount>,
    pub fee: Amount,
    pub asset_id: AssetId,
    pub lifetime: Option<Height>,
    pub message: Option<String>,
    pub my_secure_id: Option<WalletId>,
    pub peer_secure_id: Option<WalletId>,
}

impl SendRequest {
    pub fn new(my_id: WalletId, peer_id: WalletId, amount: Amount, fee: Amount) -> Self {
        Self {
            tx_id: None,
            my_id,
            peer_id,
            amount_list: vec![amount],
            fee,
            asset_id: 0,
            lifetime: None,
            message: None,
            my_secure_id: None,
            peer_secure_id: None,
        }
    }
}

type UpdateFn = fn(&TxContext, &BaseTxBuilder) -> Result<UpdateOutcome>;

/// Per-kind driver dispatch. `Split` reuses the simple driver with
/// `PeerId == MyId`.
fn driver_for(kind: TxKind) -> UpdateFn {
    match kind {
        TxKind::Simple | TxKind::Split => simple::update,
    }
}

pub struct WalletService {
    store: Arc<dyn WalletStorage>,
    executor: Arc<dyn KeeperExecutor>,
    gateway: Arc<dyn NegotiatorGateway>,
    config: WalletConfig,
    tip: Height,
    builders: HashMap<TxId, Arc<BaseTxBuilder>>,
    in_flight: HashSet<TxId>,
}

impl WalletService {
    pub fn new(
        store: Arc<dyn WalletStorage>,
        executor: Arc<dyn KeeperExecutor>,
        gateway: Arc<dyn NegotiatorGateway>,
        config: WalletConfig,
    ) -> Self {
        Self { store, executor, gateway, config, tip: 0, builders: HashMap::new(), in_flight: HashSet::new() }
    }

    pub fn tip(&self) -> Height {
        self.tip
    }

    pub fn store(&self) -> &Arc<dyn WalletStorage> {
        &self.store
    }

    /// Starts an outgoing transfer. Resolving the peer address decides the
    /// role: an owned peer address makes this a self transaction.
    pub fn send(&mut self, request: SendRequest) -> Result<TxId> {
        self.create_tx(request, TxKind::Simple)
    }

    /// Splits owned value into the given amounts (self-directed transfer).
    pub fn split(&mut self, my_id: WalletId, amount_list: Vec<Amount>, fee: Amount) -> Result<TxId> {
        let mut request = SendRequest::new(my_id, my_id, 0, fee);
        request.amount_list = amount_list;
        self.create_tx(request, TxKind::Split)
    }

    fn create_tx(&mut self, request: SendRequest, kind: TxKind) -> Result<TxId> {
        if request.amount_list.is_empty() || request.amount_list.iter().any(|a| *a == 0) {
            return Err(WalletError::InvalidTransactionParameters("amounts must be positive".to_string()));
        }
        let now = current_timestamp_secs();

        let is_self = match self.store.get_address(&request.peer_id)? {
            Some(address) if address.is_own() => {
                if address.is_expired(now) {
                    return Err(WalletError::AddressExpired);
                }
                true
            }
            Some(mut address) => {
                // Refresh the label on re-contact.
                if let Some(message) = &request.message {
                    if *message != address.label {
                        address.label = message.clone();
                        self.store.save_address(&address)?;
                    }
                }
                false
            }
            None => {
                let label = request.message.clone().unwrap_or_default();
                self.store.save_address(&WalletAddress::foreign(request.peer_id, label, now))?;
                false
            }
        };
        if kind == TxKind::Split && !is_self {
            return Err(WalletError::InvalidTransactionParameters("split requires an owned address".to_string()));
        }

        let tx_id = request.tx_id.unwrap_or_else(TxId::generate);
        if self.store.has_param(&tx_id, TxParameterID::TransactionType, DEFAULT_SUB_TX_ID)? {
            return Err(WalletError::InvalidTransactionParameters(format!("transaction {} already exists", tx_id)));
        }

        let total: Amount = request.amount_list.iter().sum();
        let lifetime = request.lifetime.unwrap_or(self.config.default_lifetime);
        let min_height = self.tip.max(1);

        let s = &self.store;
        s.set_param(&tx_id, TxParameterID::TransactionType, &kind, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::IsSender, &true, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::IsSelfTx, &is_self, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::Amount, &total, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::AmountList, &request.amount_list, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::Fee, &request.fee, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::AssetId, &request.asset_id, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::MinHeight, &min_height, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::Lifetime, &lifetime, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::PeerResponseHeight, &min_height.saturating_add(lifetime), DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::MyId, &request.my_id, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::PeerId, &request.peer_id, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::CreateTime, &now, DEFAULT_SUB_TX_ID)?;
        s.set_param(&tx_id, TxParameterID::Status, &TxStatus::Pending, DEFAULT_SUB_TX_ID)?;
        if let Some(my_secure) = request.my_secure_id {
            s.set_param(&tx_id, TxParameterID::MySecureWalletId, &my_secure, DEFAULT_SUB_TX_ID)?;
        }
        if let Some(peer_secure) = request.peer_secure_id {
            s.set_param(&tx_id, TxParameterID::PeerSecureWalletId, &peer_secure, DEFAULT_SUB_TX_ID)?;
        }
        if let Some(message) = &request.message {
            s.set_param(&tx_id, TxParameterID::Message, message, DEFAULT_SUB_TX_ID)?;
        }

        self.update_tx(&tx_id)?;
        Ok(tx_id)
    }

    /// Applies an inbound peer message. Unknown records are created only for
    /// messages that look like an invitation; receipt is idempotent.
    pub fn on_tx_parameters(&mut self, my_id: WalletId, peer_id: WalletId, msg: ParameterMessage) -> Result<()> {
        let tx_id = msg.tx_id;
        let known = self.store.has_param(&tx_id, TxParameterID::TransactionType, DEFAULT_SUB_TX_ID)?;
        if !known {
            if !msg.contains(TxParameterID::IsSender) || !msg.contains(TxParameterID::Amount) {
                warn!("txo {} ignoring message for unknown record without invitation fields", tx_id);
                return Ok(());
            }
            debug!("txo {} creating record from peer invitation peer={}", tx_id, peer_id);
            if self.store.get_address(&peer_id)?.is_none() {
                self.store.save_address(&WalletAddress::foreign(peer_id, "", current_timestamp_secs()))?;
            }
            let s = &self.store;
            s.set_param(&tx_id, TxParameterID::TransactionType, &msg.kind, DEFAULT_SUB_TX_ID)?;
            s.set_param(&tx_id, TxParameterID::MyId, &my_id, DEFAULT_SUB_TX_ID)?;
            s.set_param(&tx_id, TxParameterID::PeerId, &peer_id, DEFAULT_SUB_TX_ID)?;
            s.set_param(&tx_id, TxParameterID::IsSelfTx, &false, DEFAULT_SUB_TX_ID)?;
            s.set_param(&tx_id, TxParameterID::CreateTime, &current_timestamp_secs(), DEFAULT_SUB_TX_ID)?;
            s.set_param(&tx_id, TxParameterID::Status, &TxStatus::Pending, DEFAULT_SUB_TX_ID)?;
        }

        let mut changed = !known;
        for (raw_id, bytes) in &msg.params {
            if let Some(id) = TxParameterID::from_u8(*raw_id) {
                if !id.is_peer_writable() {
                    debug!("txo {} dropping peer write of local parameter {}", tx_id, id);
                    continue;
                }
            }
            // Unknown ids are persisted but never drive state.
            let existing = self.store.get_raw(&tx_id, DEFAULT_SUB_TX_ID, *raw_id)?;
            if existing.as_deref() == Some(bytes.as_slice()) {
                continue;
            }
            self.store.set_raw(&tx_id, DEFAULT_SUB_TX_ID, *raw_id, bytes)?;
            changed = true;
        }

        if changed {
            self.update_tx(&tx_id)?;
        }
        Ok(())
    }

    pub fn on_tip(&mut self, height: Height) -> Result<()> {
        self.tip = height;
        for tx_id in self.active_tx_ids()? {
            self.update_tx(&tx_id)?;
        }
        Ok(())
    }

    pub fn on_register_verdict(&mut self, tx_id: &TxId, verdict: RegisterResult) -> Result<()> {
        debug!("txo {} register verdict={:?}", tx_id, verdict);
        self.store.set_param(tx_id, TxParameterID::TransactionRegistered, &verdict, DEFAULT_SUB_TX_ID)?;
        self.update_tx(tx_id)
    }

    pub fn on_kernel_proof(&mut self, tx_id: &TxId, height: Height) -> Result<()> {
        debug!("txo {} kernel proof height={}", tx_id, height);
        self.store.set_param(tx_id, TxParameterID::KernelProofHeight, &height, DEFAULT_SUB_TX_ID)?;
        self.update_tx(tx_id)
    }

    pub fn on_kernel_unconfirmed(&mut self, tx_id: &TxId, at_height: Height) -> Result<()> {
        debug!("txo {} kernel unconfirmed at height={}", tx_id, at_height);
        self.store.set_param(tx_id, TxParameterID::KernelUnconfirmedHeight, &at_height, DEFAULT_SUB_TX_ID)?;
        self.update_tx(tx_id)
    }

    pub fn on_keeper_completion(&mut self, completion: KeeperCompletion) -> Result<()> {
        let tx_id = completion.tx_id;
        match completion.result {
            Ok(response) => {
                let builder = self.builder_for(&tx_id)?;
                builder.apply_response(response)?;
                self.update_tx(&tx_id)
            }
            Err(err) => {
                warn!("txo {} keeper invocation failed: {}", tx_id, err);
                let ctx = self.tx_context(&tx_id);
                simple::fail(&ctx, err.failure_reason())?;
                self.builders.remove(&tx_id);
                Ok(())
            }
        }
    }

    /// User-initiated cancel. A transaction already handed to the network
    /// cannot be unilaterally undone; it resolves through completion or
    /// expiry instead.
    pub fn cancel(&mut self, tx_id: &TxId) -> Result<()> {
        let ctx = self.tx_context(tx_id);
        let status = ctx.status()?;
        if negotiation::is_terminal(status) {
            // A record that failed in transport kept its reservation alive
            // for the peer's sake; an explicit cancel finally frees it.
            let reason: Option<FailureReason> =
                self.store.get_param(tx_id, TxParameterID::FailureReason, DEFAULT_SUB_TX_ID)?;
            if status == TxStatus::Failed && reason == Some(FailureReason::FailedToSendParameters) {
                simple::release_coins(&ctx)?;
            }
            return Ok(());
        }
        if ctx.state()? >= NegotiationState::Registration {
            return Err(WalletError::CancelRefused { tx_id: tx_id.to_string() });
        }
        info!("txo {} canceled by user", tx_id);
        negotiation::ensure_valid_status_transition(status, TxStatus::Canceled)?;
        self.store.set_param(tx_id, TxParameterID::FailureReason, &FailureReason::Canceled, DEFAULT_SUB_TX_ID)?;
        self.store.set_param(tx_id, TxParameterID::Status, &TxStatus::Canceled, DEFAULT_SUB_TX_ID)?;
        simple::release_coins(&ctx)?;
        self.builders.remove(tx_id);
        Ok(())
    }

    /// Purges a terminal record.
    pub fn delete_tx(&mut self, tx_id: &TxId) -> Result<()> {
        let status = self.tx_context(tx_id).status()?;
        if !negotiation::is_terminal(status) {
            return Err(WalletError::InvalidTransactionParameters(format!(
                "transaction {} is still active ({:?})",
                tx_id, status
            )));
        }
        self.builders.remove(tx_id);
        self.store.delete_tx(tx_id)
    }

    /// Role of this wallet in a record, derived from `IsSender` and whether
    /// the peer resolves to an owned address.
    pub fn tx_role(&self, tx_id: &TxId) -> Result<TxRole> {
        let is_sender: bool = self.store.get_mandatory(tx_id, TxParameterID::IsSender, DEFAULT_SUB_TX_ID)?;
        let is_self: bool =
            self.store.get_param(tx_id, TxParameterID::IsSelfTx, DEFAULT_SUB_TX_ID)?.unwrap_or(false);
        Ok(if is_self {
            TxRole::SelfTx
        } else if is_sender {
            TxRole::Sender
        } else {
            TxRole::Receiver
        })
    }

    pub fn user_status(&self, tx_id: &TxId) -> Result<UserStatus> {
        let status: TxStatus =
            self.store.get_param(tx_id, TxParameterID::Status, DEFAULT_SUB_TX_ID)?.unwrap_or(TxStatus::Pending);
        let reason: Option<FailureReason> = self.store.get_param(tx_id, TxParameterID::FailureReason, DEFAULT_SUB_TX_ID)?;
        Ok(negotiation::user_status(status, reason))
    }

    pub fn active_tx_ids(&self) -> Result<Vec<TxId>> {
        let mut active = Vec::new();
        for tx_id in self.store.list_tx_ids()? {
            let status: TxStatus =
                self.store.get_param(&tx_id, TxParameterID::Status, DEFAULT_SUB_TX_ID)?.unwrap_or(TxStatus::Pending);
            if !negotiation::is_terminal(status) {
                active.push(tx_id);
            }
        }
        Ok(active)
    }

    fn tx_context<'a>(&'a self, tx_id: &TxId) -> TxContext<'a> {
        TxContext { tx_id: *tx_id, store: &self.store, gateway: &self.gateway, config: &self.config, tip: self.tip }
    }

    fn builder_for(&mut self, tx_id: &TxId) -> Result<Arc<BaseTxBuilder>> {
        if let Some(builder) = self.builders.get(tx_id) {
            return Ok(Arc::clone(builder));
        }
        let amount_list: Vec<Amount> =
            match self.store.get_param(tx_id, TxParameterID::AmountList, DEFAULT_SUB_TX_ID)? {
                Some(list) => list,
                None => vec![self.store.get_mandatory(tx_id, TxParameterID::Amount, DEFAULT_SUB_TX_ID)?],
            };
        let fee: Amount = self.store.get_mandatory(tx_id, TxParameterID::Fee, DEFAULT_SUB_TX_ID)?;
        let asset_id: AssetId =
            self.store.get_param(tx_id, TxParameterID::AssetId, DEFAULT_SUB_TX_ID)?.unwrap_or(0);
        let builder = Arc::new(BaseTxBuilder::new(
            Arc::clone(&self.store),
            Arc::clone(&self.executor),
            *tx_id,
            DEFAULT_SUB_TX_ID,
            amount_list,
            fee,
            asset_id,
        ));
        self.builders.insert(*tx_id, Arc::clone(&builder));
        Ok(builder)
    }

    /// Edge-triggered driver entry. Non-reentrant per record: a re-invocation
    /// while an earlier one is mid-flight is dropped (the pending completion
    /// re-invokes).
    pub fn update_tx(&mut self, tx_id: &TxId) -> Result<()> {
        if !self.in_flight.insert(*tx_id) {
            return Ok(());
        }
        let result = self.update_tx_inner(tx_id);
        self.in_flight.remove(tx_id);
        result
    }

    fn update_tx_inner(&mut self, tx_id: &TxId) -> Result<()> {
        let kind: Option<TxKind> = self.store.get_param(tx_id, TxParameterID::TransactionType, DEFAULT_SUB_TX_ID)?;
        let Some(kind) = kind else {
            return Err(WalletError::TransactionNotFound { tx_id: tx_id.to_string() });
        };
        let update = driver_for(kind);

        loop {
            let builder = self.builder_for(tx_id)?;
            let ctx = self.tx_context(tx_id);
            match update(&ctx, &builder) {
                Ok(UpdateOutcome::Continue(NextTrigger::Immediate)) => continue,
                Ok(UpdateOutcome::Continue(trigger)) => {
                    debug!("txo {} suspended until {:?}", tx_id, trigger);
                    return Ok(());
                }
                Ok(UpdateOutcome::Done(status)) => {
                    debug!("txo {} done status={:?}", tx_id, status);
                    self.builders.remove(tx_id);
                    return Ok(());
                }
                Err(err) => {
                    warn!("txo {} update failed: {}", tx_id, err);
                    simple::fail(&ctx, err.failure_reason())?;
                    self.builders.remove(tx_id);
                    return Ok(());
                }
            }
        }
    }
}
