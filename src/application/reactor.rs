//! Single-threaded cooperative event loop driving the wallet service.
//!
//! All driver work happens on this thread; the key-keeper worker is the only
//! other thread, and its completions are handed over through the coalescing
//! wake event (one wake may cover many completions).

use crate::application::wallet::WalletService;
use crate::domain::model::RegisterResult;
use crate::domain::params::ParameterMessage;
use crate::foundation::{Height, Result, TxId, WalletId};
use crate::infrastructure::keykeeper::ThreadedKeyKeeper;
use log::warn;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub enum WalletEvent {
    Tip(Height),
    PeerMessage { my_id: WalletId, peer_id: WalletId, msg: ParameterMessage },
    RegisterVerdict { tx_id: TxId, verdict: RegisterResult },
    KernelProof { tx_id: TxId, height: Height },
    KernelUnconfirmed { tx_id: TxId, at_height: Height },
    Cancel(TxId),
    Shutdown,
}

pub struct Reactor {
    service: WalletService,
    events: Receiver<WalletEvent>,
    keeper: Option<Arc<ThreadedKeyKeeper>>,
}

impl Reactor {
    pub fn new(service: WalletService, events: Receiver<WalletEvent>) -> Self {
        Self { service, events, keeper: None }
    }

    /// Attaches the threaded keeper whose completions this loop drains.
    pub fn with_threaded_keeper(mut self, keeper: Arc<ThreadedKeyKeeper>) -> Self {
        self.keeper = Some(keeper);
        self
    }

    pub fn service(&self) -> &WalletService {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut WalletService {
        &mut self.service
    }

    /// Runs until `Shutdown` or the event source disconnects.
    pub fn run(&mut self) {
        loop {
            self.drain_keeper_completions();
            match self.events.recv_timeout(Duration::from_millis(50)) {
                Ok(WalletEvent::Shutdown) => return,
                Ok(event) => {
                    if let Err(err) = self.dispatch(event) {
                        warn!("event dispatch failed: {}", err);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    fn drain_keeper_completions(&mut self) {
        let Some(keeper) = self.keeper.clone() else {
            return;
        };
        for completion in keeper.drain_completions() {
            if let Err(err) = self.service.on_keeper_completion(completion) {
                warn!("keeper completion dispatch failed: {}", err);
            }
        }
    }

    fn dispatch(&mut self, event: WalletEvent) -> Result<()> {
        match event {
            WalletEvent::Tip(height) => self.service.on_tip(height),
            WalletEvent::PeerMessage { my_id, peer_id, msg } => self.service.on_tx_parameters(my_id, peer_id, msg),
            WalletEvent::RegisterVerdict { tx_id, verdict } => self.service.on_register_verdict(&tx_id, verdict),
            WalletEvent::KernelProof { tx_id, height } => self.service.on_kernel_proof(&tx_id, height),
            WalletEvent::KernelUnconfirmed { tx_id, at_height } => self.service.on_kernel_unconfirmed(&tx_id, at_height),
            WalletEvent::Cancel(tx_id) => self.service.cancel(&tx_id),
            WalletEvent::Shutdown => Ok(()),
        }
    }
}
